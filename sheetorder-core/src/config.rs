//! Persisted configuration: template path, last-used values and order history

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::ser::PrettyFormatter;
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::ConfigError;
use crate::order::OrderCreated;

/// Directory created under the OS temp dir for the default store
pub const APP_DIR_NAME: &str = "SheetOrder";
pub const CONFIG_FILE_NAME: &str = "config.json";

/// Maximum number of entries kept in the history
pub const HISTORY_LIMIT: usize = 50;

/// Well-known keys of the configuration record
pub mod keys {
    pub const DEFAULT_TEMPLATE_PATH: &str = "default_template_path";
    pub const LAST_FOLDER: &str = "last_folder";
    pub const LAST_DEPARTMENT: &str = "last_department";
    pub const DARK_THEME: &str = "dark_theme";
    pub const HISTORY: &str = "history";
}

/// A generated order, stored as `[file_path, folder, department]`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "(String, String, String)", into = "(String, String, String)")]
pub struct HistoryEntry {
    pub file_path: String,
    pub folder: String,
    pub department: String,
}

impl HistoryEntry {
    pub fn new(
        file_path: impl Into<String>,
        folder: impl Into<String>,
        department: impl Into<String>,
    ) -> Self {
        Self {
            file_path: file_path.into(),
            folder: folder.into(),
            department: department.into(),
        }
    }

    /// File name part of `file_path`, for display
    pub fn file_name(&self) -> String {
        Path::new(&self.file_path)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.file_path.clone())
    }
}

impl From<(String, String, String)> for HistoryEntry {
    fn from((file_path, folder, department): (String, String, String)) -> Self {
        Self {
            file_path,
            folder,
            department,
        }
    }
}

impl From<HistoryEntry> for (String, String, String) {
    fn from(entry: HistoryEntry) -> Self {
        (entry.file_path, entry.folder, entry.department)
    }
}

impl From<HistoryEntry> for Value {
    fn from(entry: HistoryEntry) -> Self {
        Value::Array(vec![
            Value::String(entry.file_path),
            Value::String(entry.folder),
            Value::String(entry.department),
        ])
    }
}

/// JSON-backed key/value store, rewritten to disk after every change.
///
/// Loading never fails: a missing, unreadable or malformed file yields an
/// empty record. Saving failures are logged and reported as `false` by the
/// setters; the in-memory record stays authoritative either way.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
    record: Map<String, Value>,
}

impl ConfigStore {
    /// Load the store backed by `path`
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let record = load_record(&path);
        Self { path, record }
    }

    /// Load the store at `<temp dir>/SheetOrder/config.json`
    pub fn open_default() -> Self {
        let path = default_config_path();
        if let Some(parent) = path.parent() {
            if let Err(e) = fs::create_dir_all(parent) {
                warn!(dir = %parent.display(), error = %e, "could not create config directory");
            }
        }
        Self::open(path)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The raw record, as it would be written to disk
    pub fn record(&self) -> &Map<String, Value> {
        &self.record
    }

    /// Stored value for `key`, or `default` when absent
    pub fn get(&self, key: &str, default: Value) -> Value {
        self.record.get(key).cloned().unwrap_or(default)
    }

    /// Stored value for `key` deserialized as `T`; `None` if absent or of another shape
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.record
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Store `value` under `key` and persist. Returns whether the save succeeded.
    pub fn set(&mut self, key: &str, value: impl Into<Value>) -> bool {
        self.record.insert(key.to_string(), value.into());
        self.persist()
    }

    /// Write the whole record to disk
    pub fn save(&self) -> Result<(), ConfigError> {
        let mut buf = Vec::new();
        let formatter = PrettyFormatter::with_indent(b"    ");
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
        self.record.serialize(&mut ser)?;

        fs::write(&self.path, buf).map_err(|source| ConfigError::Io {
            path: self.path.clone(),
            source,
        })
    }

    fn persist(&self) -> bool {
        match self.save() {
            Ok(()) => {
                debug!(path = %self.path.display(), "configuration saved");
                true
            }
            Err(e) => {
                warn!(error = %e, "configuration not saved");
                false
            }
        }
    }

    pub fn default_template_path(&self) -> Option<PathBuf> {
        self.get_as::<String>(keys::DEFAULT_TEMPLATE_PATH)
            .filter(|p| !p.is_empty())
            .map(PathBuf::from)
    }

    /// Remember `path` as the template. Refused (nothing persisted) when it does not exist.
    pub fn set_default_template_path(&mut self, path: impl AsRef<Path>) -> bool {
        let path = path.as_ref();
        if !path.exists() {
            return false;
        }
        self.set(keys::DEFAULT_TEMPLATE_PATH, path_string(path))
    }

    /// Adopt `bundled` as the template on first run, when none is configured yet
    pub fn seed_default_template(&mut self, bundled: impl AsRef<Path>) -> bool {
        if self.default_template_path().is_some() {
            return false;
        }
        self.set_default_template_path(bundled)
    }

    pub fn last_department(&self) -> String {
        self.get_as::<String>(keys::LAST_DEPARTMENT)
            .unwrap_or_default()
    }

    pub fn set_last_department(&mut self, name: &str) -> bool {
        self.set(keys::LAST_DEPARTMENT, name)
    }

    pub fn last_folder(&self) -> Option<PathBuf> {
        self.get_as::<String>(keys::LAST_FOLDER)
            .filter(|p| !p.is_empty())
            .map(PathBuf::from)
    }

    pub fn set_last_folder(&mut self, folder: impl AsRef<Path>) -> bool {
        self.set(keys::LAST_FOLDER, path_string(folder.as_ref()))
    }

    pub fn dark_theme(&self) -> bool {
        self.get_as::<bool>(keys::DARK_THEME).unwrap_or(false)
    }

    pub fn set_dark_theme(&mut self, dark: bool) -> bool {
        self.set(keys::DARK_THEME, dark)
    }

    /// Flip the theme flag. Returns the new value and whether it was saved.
    pub fn toggle_dark_theme(&mut self) -> (bool, bool) {
        let dark = !self.dark_theme();
        let saved = self.set_dark_theme(dark);
        (dark, saved)
    }

    /// History, oldest first. Entries not shaped like `[path, folder, department]` are skipped.
    pub fn history(&self) -> Vec<HistoryEntry> {
        match self.record.get(keys::HISTORY) {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|item| serde_json::from_value(item.clone()).ok())
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Append `entry` as the most recent, moving it if already present and
    /// keeping only the last `HISTORY_LIMIT` entries.
    pub fn push_history(&mut self, entry: HistoryEntry) -> bool {
        let entry = Value::from(entry);
        let mut items = match self.record.get(keys::HISTORY) {
            Some(Value::Array(items)) => items.clone(),
            _ => Vec::new(),
        };

        items.retain(|item| item != &entry);
        items.push(entry);
        if items.len() > HISTORY_LIMIT {
            let excess = items.len() - HISTORY_LIMIT;
            items.drain(..excess);
        }

        self.set(keys::HISTORY, Value::Array(items))
    }

    pub fn clear_history(&mut self) -> bool {
        self.set(keys::HISTORY, Value::Array(Vec::new()))
    }

    /// Bookkeeping after a successful order: last department, last folder, history
    pub fn record_order(&mut self, created: &OrderCreated, folder: impl AsRef<Path>) -> bool {
        let folder = path_string(folder.as_ref());
        let saved_department = self.set_last_department(&created.department);
        let saved_folder = self.set(keys::LAST_FOLDER, folder.as_str());
        let saved_history = self.push_history(HistoryEntry::new(
            path_string(&created.path),
            folder,
            created.department.as_str(),
        ));
        saved_department && saved_folder && saved_history
    }
}

/// `<temp dir>/SheetOrder/config.json`
pub fn default_config_path() -> PathBuf {
    std::env::temp_dir()
        .join(APP_DIR_NAME)
        .join(CONFIG_FILE_NAME)
}

fn load_record(path: &Path) -> Map<String, Value> {
    if !path.exists() {
        return Map::new();
    }

    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "could not read configuration, starting empty");
            return Map::new();
        }
    };

    match serde_json::from_str::<Value>(&content) {
        Ok(Value::Object(record)) => record,
        Ok(_) => {
            warn!(path = %path.display(), "configuration is not a JSON object, starting empty");
            Map::new()
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "configuration is malformed, starting empty");
            Map::new()
        }
    }
}

fn path_string(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn store_in(dir: &tempfile::TempDir) -> ConfigStore {
        ConfigStore::open(dir.path().join(CONFIG_FILE_NAME))
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        assert!(store.record().is_empty());
        assert_eq!(store.default_template_path(), None);
        assert_eq!(store.last_department(), "");
        assert_eq!(store.last_folder(), None);
        assert!(!store.dark_theme());
        assert!(store.history().is_empty());
    }

    #[test]
    fn test_corrupt_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        fs::write(&path, "{ not json").unwrap();
        assert!(ConfigStore::open(&path).record().is_empty());

        fs::write(&path, "[1, 2, 3]").unwrap();
        assert!(ConfigStore::open(&path).record().is_empty());
    }

    #[test]
    fn test_set_persists_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store_in(&dir);

        assert!(store.set("custom", json!({"a": 1})));
        assert!(store.set_last_department("Almoxarifado"));
        assert!(store.set_dark_theme(true));

        let reloaded = store_in(&dir);
        assert_eq!(reloaded.get("custom", Value::Null), json!({"a": 1}));
        assert_eq!(reloaded.last_department(), "Almoxarifado");
        assert!(reloaded.dark_theme());
        assert_eq!(reloaded.get("absent", json!("fallback")), json!("fallback"));
    }

    #[test]
    fn test_saved_file_uses_four_space_indent() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store_in(&dir);
        store.set_last_department("Compras");

        let content = fs::read_to_string(store.path()).unwrap();
        assert!(content.contains("\n    \"last_department\": \"Compras\""));
    }

    #[test]
    fn test_get_as_ignores_wrong_shape() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store_in(&dir);
        store.set(keys::DARK_THEME, "yes");

        assert_eq!(store.get_as::<bool>(keys::DARK_THEME), None);
        assert!(!store.dark_theme());
    }

    #[test]
    fn test_set_default_template_requires_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store_in(&dir);

        assert!(!store.set_default_template_path(dir.path().join("missing.xlsx")));
        assert_eq!(store.default_template_path(), None);
        assert!(!store.path().exists());

        let template = dir.path().join("template.xlsx");
        fs::write(&template, b"x").unwrap();
        assert!(store.set_default_template_path(&template));
        assert_eq!(store_in(&dir).default_template_path(), Some(template));
    }

    #[test]
    fn test_seed_default_template_only_once() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store_in(&dir);
        let first = dir.path().join("first.xlsx");
        let second = dir.path().join("second.xlsx");
        fs::write(&first, b"x").unwrap();
        fs::write(&second, b"x").unwrap();

        assert!(!store.seed_default_template(dir.path().join("missing.xlsx")));
        assert!(store.seed_default_template(&first));
        assert!(!store.seed_default_template(&second));
        assert_eq!(store.default_template_path(), Some(first));
    }

    #[test]
    fn test_failed_save_keeps_memory_state() {
        let dir = tempfile::tempdir().unwrap();
        // Parent directory does not exist, so every write fails
        let mut store = ConfigStore::open(dir.path().join("missing").join(CONFIG_FILE_NAME));

        assert!(!store.set_last_department("Compras"));
        assert_eq!(store.last_department(), "Compras");
        assert!(matches!(store.save(), Err(ConfigError::Io { .. })));
    }

    #[test]
    fn test_toggle_dark_theme() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store_in(&dir);

        assert_eq!(store.toggle_dark_theme(), (true, true));
        assert!(store_in(&dir).dark_theme());
        assert_eq!(store.toggle_dark_theme(), (false, true));
        assert!(!store_in(&dir).dark_theme());
    }

    #[test]
    fn test_toggle_dark_theme_reports_failed_save() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = ConfigStore::open(dir.path().join("missing").join(CONFIG_FILE_NAME));

        assert_eq!(store.toggle_dark_theme(), (true, false));
        assert!(store.dark_theme());
    }

    #[test]
    fn test_history_moves_duplicates_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store_in(&dir);
        let a = HistoryEntry::new("/o/0001.xlsx", "/o", "Compras");
        let b = HistoryEntry::new("/o/0002.xlsx", "/o", "RH");

        store.push_history(a.clone());
        store.push_history(b.clone());
        store.push_history(a.clone());

        assert_eq!(store.history(), vec![b, a]);
    }

    #[test]
    fn test_history_keeps_last_fifty() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store_in(&dir);

        for i in 0..51 {
            store.push_history(HistoryEntry::new(format!("/o/{:04}.xlsx", i), "/o", "Compras"));
        }

        let history = store_in(&dir).history();
        assert_eq!(history.len(), HISTORY_LIMIT);
        assert_eq!(history[0].file_path, "/o/0001.xlsx");
        assert_eq!(history[49].file_path, "/o/0050.xlsx");
    }

    #[test]
    fn test_history_is_stored_as_arrays_and_skips_legacy_items() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        fs::write(
            &path,
            r#"{"history": ["0001.xlsx - old format", ["/o/0002.xlsx", "/o", "RH"]]}"#,
        )
        .unwrap();

        let mut store = ConfigStore::open(&path);
        assert_eq!(
            store.history(),
            vec![HistoryEntry::new("/o/0002.xlsx", "/o", "RH")]
        );

        store.push_history(HistoryEntry::new("/o/0003.xlsx", "/o", "TI"));
        let raw = store.get(keys::HISTORY, Value::Null);
        assert_eq!(
            raw,
            json!([
                "0001.xlsx - old format",
                ["/o/0002.xlsx", "/o", "RH"],
                ["/o/0003.xlsx", "/o", "TI"]
            ])
        );
    }

    #[test]
    fn test_record_order() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store_in(&dir);
        let created = OrderCreated {
            order_number: "0004".to_string(),
            department: "Almoxarifado".to_string(),
            file_name: "0004.xlsx".to_string(),
            path: PathBuf::from("/orders/0004.xlsx"),
        };

        assert!(store.record_order(&created, "/orders"));

        let reloaded = store_in(&dir);
        assert_eq!(reloaded.last_department(), "Almoxarifado");
        assert_eq!(reloaded.last_folder(), Some(PathBuf::from("/orders")));
        assert_eq!(
            reloaded.history(),
            vec![HistoryEntry::new("/orders/0004.xlsx", "/orders", "Almoxarifado")]
        );
    }

    #[test]
    fn test_history_entry_file_name() {
        let entry = HistoryEntry::new("/orders/0004.xlsx", "/orders", "RH");
        assert_eq!(entry.file_name(), "0004.xlsx");
    }
}
