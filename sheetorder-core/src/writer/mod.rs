// ! Writer module for stamping values into workbook copies

mod xlsx_writer;

pub use xlsx_writer::{CellStamps, stamp_sheet_xml, stamp_workbook_xlsx};

use anyhow::Result;

use std::path::Path;

/// Copy a workbook to `output_path` with `stamps` written into its active sheet
pub fn stamp_workbook<P: AsRef<Path>, Q: AsRef<Path>>(
    input_path: P,
    output_path: Q,
    stamps: &CellStamps,
) -> Result<()> {
    let input = input_path.as_ref();

    // Determine file type by extension
    let extension = input
        .extension()
        .and_then(|s| s.to_str())
        .map(|s| s.to_ascii_lowercase());
    match extension.as_deref() {
        Some("xlsx") => stamp_workbook_xlsx(input, output_path.as_ref(), stamps),
        Some("xls") => {
            anyhow::bail!("Legacy .xls templates cannot be written; save the template as .xlsx")
        }
        _ => anyhow::bail!("Unsupported file format"),
    }
}
