//! Template reader using calamine, plus XLSX structure helpers

use anyhow::{Context, Result};
use calamine::{Reader, Sheets, open_workbook_auto};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use zip::ZipArchive;

pub mod parser_utils;
pub mod xlsx_parser;

pub use parser_utils::{format_cell_ref, parse_cell_ref};
pub use xlsx_parser::{SheetEntry, WorkbookStructure, read_workbook_structure};

/// What a template looks like from the outside
#[derive(Debug, Clone)]
pub struct TemplateInfo {
    pub path: PathBuf,
    pub sheet_names: Vec<String>,
    pub active_index: usize,
    pub active_sheet: String,
}

/// Open a template workbook and make sure its active sheet can be read
pub fn inspect_template<P: AsRef<Path>>(path: P) -> Result<TemplateInfo> {
    let path = path.as_ref();
    let mut excel: Sheets<_> = open_workbook_auto(path)
        .with_context(|| format!("Failed to open workbook: {}", path.display()))?;

    let sheet_names = excel.sheet_names();
    if sheet_names.is_empty() {
        anyhow::bail!("Workbook has no sheets: {}", path.display());
    }

    let active_index = if is_xlsx(path) {
        read_xlsx_structure(path)?.active_tab
    } else {
        0
    };

    let active_sheet = sheet_names
        .get(active_index)
        .cloned()
        .ok_or_else(|| anyhow::anyhow!("Workbook has no active sheet"))?;

    excel
        .worksheet_range(&active_sheet)
        .with_context(|| format!("Failed to read active sheet '{}'", active_sheet))?;

    Ok(TemplateInfo {
        path: path.to_path_buf(),
        sheet_names,
        active_index,
        active_sheet,
    })
}

/// Open an XLSX file as a zip archive and read its sheet layout
pub fn read_xlsx_structure<P: AsRef<Path>>(path: P) -> Result<WorkbookStructure> {
    let path = path.as_ref();
    let file =
        File::open(path).with_context(|| format!("Failed to open file: {}", path.display()))?;
    let mut archive =
        ZipArchive::new(BufReader::new(file)).context("Failed to open zip archive")?;
    read_workbook_structure(&mut archive)
}

fn is_xlsx(path: &Path) -> bool {
    path.extension()
        .and_then(|s| s.to_str())
        .map(|s| s.eq_ignore_ascii_case("xlsx"))
        .unwrap_or(false)
}
