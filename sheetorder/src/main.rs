use anyhow::{Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use sheetorder_core::{
    ConfigStore, OrderError, create_order, next_order_number, validate_template,
};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod formatter;
mod launcher;

/// Template shipped next to the executable, adopted on first run
const BUNDLED_TEMPLATE: &str = "resources/template.xlsx";

#[derive(Parser)]
#[command(name = "sheetorder")]
#[command(about = "Create numbered order sheets from an Excel template", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to the configuration file (defaults to the OS temp directory)
    #[arg(long, global = true, env = "SHEETORDER_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create the next order in a folder
    Create(CreateArgs),

    /// Print the next order number for a folder
    Next {
        /// Folder to scan (defaults to the last folder used)
        #[arg(short, long, value_name = "FOLDER")]
        folder: Option<PathBuf>,
    },

    /// Check whether a file can be used as the template
    Validate {
        /// Path to the Excel file
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Store the file as the default template when valid
        #[arg(long)]
        set_default: bool,
    },

    /// Show or manage the order history
    History {
        #[command(subcommand)]
        action: Option<HistoryAction>,
    },

    /// Show or change configuration values
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Args)]
struct CreateArgs {
    /// Department name (defaults to the last department used)
    #[arg(short, long, value_name = "NAME")]
    department: Option<String>,

    /// Destination folder (defaults to the last folder used)
    #[arg(short, long, value_name = "FOLDER")]
    folder: Option<PathBuf>,

    /// Template workbook (defaults to the configured template)
    #[arg(short, long, value_name = "FILE")]
    template: Option<PathBuf>,

    /// Open the new file once created
    #[arg(long)]
    open: bool,

    /// Show what would be done without making changes
    #[arg(long)]
    dry_run: bool,
}

#[derive(Subcommand)]
enum HistoryAction {
    /// List generated orders, most recent first
    List {
        /// Show at most N entries
        #[arg(short = 'n', long, value_name = "N")]
        limit: Option<usize>,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Open the file at INDEX in the listing (1 = most recent)
    Open {
        #[arg(value_name = "INDEX")]
        index: usize,
    },

    /// Forget all entries
    Clear,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the current configuration
    Show {
        /// Print the raw JSON record
        #[arg(long)]
        json: bool,
    },

    /// Print the value stored under KEY
    Get {
        #[arg(value_name = "KEY")]
        key: String,
    },

    /// Store VALUE under KEY (parsed as JSON, otherwise kept as a string)
    Set {
        #[arg(value_name = "KEY")]
        key: String,
        #[arg(value_name = "VALUE")]
        value: String,
    },

    /// Validate FILE and make it the default template
    Template {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Remember FOLDER as the destination for new orders
    Folder {
        #[arg(value_name = "FOLDER")]
        folder: PathBuf,
    },

    /// Set the UI theme flag
    Theme {
        #[arg(value_enum)]
        mode: ThemeMode,
    },
}

#[derive(Clone, ValueEnum)]
enum ThemeMode {
    Dark,
    Light,
    Toggle,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut store = match &cli.config {
        Some(path) => ConfigStore::open(path),
        None => ConfigStore::open_default(),
    };
    if let Some(bundled) = bundled_template() {
        if store.seed_default_template(&bundled) {
            info!(template = %bundled.display(), "adopted bundled template");
        }
    }

    match cli.command {
        Command::Create(args) => run_create(&mut store, args),
        Command::Next { folder } => {
            let folder = folder
                .or_else(|| store.last_folder())
                .context("No folder given and none remembered. Use --folder <FOLDER>.")?;
            println!("{}", next_order_number(&folder));
            Ok(())
        }
        Command::Validate { file, set_default } => run_validate(&mut store, &file, set_default),
        Command::History { action } => run_history(&mut store, action),
        Command::Config { action } => run_config(&mut store, action),
    }
}

fn init_tracing(verbose: u8) {
    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let filter = EnvFilter::new(log_directives(verbose, rust_log.as_deref()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// `-v` picks the level; without it RUST_LOG applies, falling back to warn
fn log_directives(verbose: u8, rust_log: Option<&str>) -> String {
    match (verbose, rust_log) {
        (0, Some(directives)) if !directives.trim().is_empty() => directives.to_string(),
        (0, _) => "warn".to_string(),
        (1, _) => "info".to_string(),
        _ => "debug".to_string(),
    }
}

fn bundled_template() -> Option<PathBuf> {
    let exe = std::env::current_exe().ok()?;
    Some(exe.parent()?.join(BUNDLED_TEMPLATE))
}

fn run_create(store: &mut ConfigStore, args: CreateArgs) -> Result<()> {
    let department = args
        .department
        .unwrap_or_else(|| store.last_department());
    let folder = args
        .folder
        .or_else(|| store.last_folder())
        .context("No destination folder given and none remembered. Use --folder <FOLDER>.")?;
    let template = args.template.or_else(|| store.default_template_path()).context(
        "Template not configured. Run `sheetorder config template <FILE>` or pass --template.",
    )?;

    if args.dry_run {
        let department = preview_department(&department)?;
        let order_number = next_order_number(&folder);
        let target = folder.join(format!("{}.xlsx", order_number));
        formatter::print_dry_run(&order_number, department, &target, &template);
        return Ok(());
    }

    let created = create_order(&department, &folder, &template)
        .with_context(|| "Failed to create order")?;

    if !store.record_order(&created, &folder) {
        warn!(path = %store.path().display(), "order created but configuration could not be saved");
    }

    formatter::print_created(&created);

    if args.open {
        launcher::open_path(&created.path)?;
    }
    Ok(())
}

/// The department a real run would stamp, rejected the same way when blank
fn preview_department(department: &str) -> Result<&str, OrderError> {
    match department.trim() {
        "" => Err(OrderError::MissingDepartment),
        trimmed => Ok(trimmed),
    }
}

fn run_validate(store: &mut ConfigStore, file: &Path, set_default: bool) -> Result<()> {
    validate_template(file).with_context(|| format!("Invalid template: {}", file.display()))?;
    println!("✓ Template is valid: {}", file.display());

    if set_default {
        if !store.set_default_template_path(file) {
            anyhow::bail!("Failed to save configuration to {}", store.path().display());
        }
        println!("Default template set.");
    }
    Ok(())
}

fn run_history(store: &mut ConfigStore, action: Option<HistoryAction>) -> Result<()> {
    let action = action.unwrap_or(HistoryAction::List {
        limit: None,
        json: false,
    });

    match action {
        HistoryAction::List { limit, json } => {
            let entries = store.history();
            if json {
                formatter::print_history_json(&entries, limit)?;
            } else {
                formatter::print_history(&entries, limit);
            }
        }
        HistoryAction::Open { index } => {
            let entries = store.history();
            let entry = index
                .checked_sub(1)
                .and_then(|i| entries.iter().rev().nth(i))
                .with_context(|| format!("No history entry at index {}", index))?;
            launcher::open_path(Path::new(&entry.file_path))?;
        }
        HistoryAction::Clear => {
            if !store.clear_history() {
                anyhow::bail!("Failed to save configuration to {}", store.path().display());
            }
            println!("History cleared.");
        }
    }
    Ok(())
}

fn run_config(store: &mut ConfigStore, action: ConfigAction) -> Result<()> {
    let saved = match action {
        ConfigAction::Show { json } => {
            if json {
                formatter::print_config_json(store)?;
            } else {
                formatter::print_config(store);
            }
            return Ok(());
        }
        ConfigAction::Get { key } => {
            let value = store.get(&key, serde_json::Value::Null);
            println!("{}", serde_json::to_string_pretty(&value)?);
            return Ok(());
        }
        ConfigAction::Set { key, value } => {
            let value = serde_json::from_str(&value).unwrap_or(serde_json::Value::String(value));
            store.set(&key, value)
        }
        ConfigAction::Template { file } => {
            validate_template(&file)
                .with_context(|| format!("Invalid template: {}", file.display()))?;
            store.set_default_template_path(&file)
        }
        ConfigAction::Folder { folder } => {
            if !folder.is_dir() {
                anyhow::bail!("Folder not found: {}", folder.display());
            }
            store.set_last_folder(&folder)
        }
        ConfigAction::Theme { mode } => match mode {
            ThemeMode::Dark => store.set_dark_theme(true),
            ThemeMode::Light => store.set_dark_theme(false),
            ThemeMode::Toggle => {
                let (dark, saved) = store.toggle_dark_theme();
                println!("Theme: {}", if dark { "dark" } else { "light" });
                saved
            }
        },
    };

    if !saved {
        anyhow::bail!("Failed to save configuration to {}", store.path().display());
    }
    println!("Configuration saved.");
    Ok(())
}
