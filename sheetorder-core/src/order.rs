//! Order numbering, template validation and order creation

use chrono::{Local, NaiveDate};
use regex::Regex;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{debug, info, warn};

use crate::error::{OrderError, ValidationError};
use crate::reader;
use crate::writer::{self, CellStamps};

/// Number used when a folder holds no numbered spreadsheets
pub const FIRST_ORDER_NUMBER: &str = "0001";

/// Extensions counted when scanning a folder (case-sensitive)
pub const ORDER_EXTENSIONS: [&str; 2] = [".xlsx", ".xls"];

/// Cell layout every order template must follow
pub struct TemplateLayout;

impl TemplateLayout {
    /// Department name ("setor")
    pub const DEPARTMENT_CELL: &'static str = "C4";
    /// Order/requisition number
    pub const ORDER_NUMBER_CELL: &'static str = "H4";
    /// Creation date
    pub const DATE_CELL: &'static str = "B6";
    /// DD/MM/YYYY
    pub const DATE_FORMAT: &'static str = "%d/%m/%Y";
}

/// A freshly written order file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderCreated {
    pub order_number: String,
    pub department: String,
    pub file_name: String,
    pub path: PathBuf,
}

impl OrderCreated {
    /// Confirmation text for the user
    pub fn message(&self) -> String {
        format!(
            "Order created successfully!\n\nNumber: {}\nDepartment: {}\nFile: {}",
            self.order_number, self.department, self.file_name
        )
    }
}

impl fmt::Display for OrderCreated {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message())
    }
}

/// Compute the next order number for `folder`.
///
/// Only the leftmost run of four digits in each `.xlsx`/`.xls` name counts, so
/// `2024_0007.xlsx` contributes 2024. The result is padded to at least four
/// digits and is never capped (`9999` is followed by `10000`).
pub fn next_order_number<P: AsRef<Path>>(folder: P) -> String {
    let folder = folder.as_ref();
    if !folder.exists() {
        return FIRST_ORDER_NUMBER.to_string();
    }

    match scan_order_numbers(folder) {
        Ok(numbers) => next_after(&numbers),
        Err(e) => {
            warn!(folder = %folder.display(), error = %e, "could not read folder, numbering from the start");
            FIRST_ORDER_NUMBER.to_string()
        }
    }
}

fn scan_order_numbers(folder: &Path) -> io::Result<Vec<u32>> {
    let mut numbers = Vec::new();
    for entry in fs::read_dir(folder)? {
        let entry = entry?;
        let name = entry.file_name();
        if let Some(number) = order_number_in(&name.to_string_lossy()) {
            numbers.push(number);
        }
    }
    debug!(folder = %folder.display(), found = numbers.len(), "scanned folder for order numbers");
    Ok(numbers)
}

/// The number a spreadsheet file name contributes, if any
pub fn order_number_in(file_name: &str) -> Option<u32> {
    static FOUR_DIGITS: OnceLock<Regex> = OnceLock::new();

    if !ORDER_EXTENSIONS.iter().any(|ext| file_name.ends_with(ext)) {
        return None;
    }

    let re = FOUR_DIGITS.get_or_init(|| Regex::new(r"[0-9]{4}").unwrap());
    re.find(file_name).and_then(|m| m.as_str().parse().ok())
}

fn next_after(numbers: &[u32]) -> String {
    match numbers.iter().max() {
        Some(max) => format!("{:04}", u64::from(*max) + 1),
        None => FIRST_ORDER_NUMBER.to_string(),
    }
}

/// Create an order dated today (local time)
pub fn create_order<D, T>(
    department: &str,
    destination_folder: D,
    template_path: T,
) -> Result<OrderCreated, OrderError>
where
    D: AsRef<Path>,
    T: AsRef<Path>,
{
    create_order_on(
        department,
        destination_folder,
        template_path,
        Local::now().date_naive(),
    )
}

/// Copy the template into `destination_folder` as `<number>.xlsx`, stamped
/// with department, order number and `date`.
///
/// No rollback is attempted: if saving fails midway a partial file may remain.
pub fn create_order_on<D, T>(
    department: &str,
    destination_folder: D,
    template_path: T,
    date: NaiveDate,
) -> Result<OrderCreated, OrderError>
where
    D: AsRef<Path>,
    T: AsRef<Path>,
{
    let department = department.trim();
    let folder = destination_folder.as_ref();
    let template = template_path.as_ref();

    if department.is_empty() {
        return Err(OrderError::MissingDepartment);
    }
    if !folder.exists() {
        return Err(OrderError::FolderNotFound(folder.to_path_buf()));
    }
    if !template.exists() {
        return Err(OrderError::TemplateNotFound(template.to_path_buf()));
    }

    let numbers = scan_order_numbers(folder).map_err(|e| {
        OrderError::CreationFailed(format!("Failed to read folder {}: {}", folder.display(), e))
    })?;
    let order_number = next_after(&numbers);
    let file_name = format!("{}.xlsx", order_number);
    let path = folder.join(&file_name);

    if is_same_file(&path, template) {
        return Err(OrderError::CreationFailed(format!(
            "Refusing to overwrite the template {}",
            template.display()
        )));
    }

    let date_text = date.format(TemplateLayout::DATE_FORMAT).to_string();
    stamp_order(template, &path, department, &order_number, &date_text)
        .map_err(|e| OrderError::CreationFailed(format!("{:#}", e)))?;

    info!(
        order = %order_number,
        department,
        path = %path.display(),
        "order created"
    );

    Ok(OrderCreated {
        order_number,
        department: department.to_string(),
        file_name,
        path,
    })
}

fn stamp_order(
    template: &Path,
    output: &Path,
    department: &str,
    order_number: &str,
    date: &str,
) -> anyhow::Result<()> {
    let mut stamps = CellStamps::new();
    stamps
        .set(TemplateLayout::DEPARTMENT_CELL, department)?
        .set(TemplateLayout::ORDER_NUMBER_CELL, order_number)?
        .set(TemplateLayout::DATE_CELL, date)?;
    writer::stamp_workbook(template, output, &stamps)
}

fn is_same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Check that `path` can serve as an order template.
///
/// Cell layout is not checked; a workbook without the expected cells passes.
pub fn validate_template<P: AsRef<Path>>(path: P) -> Result<(), ValidationError> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(ValidationError::NotFound(path.to_path_buf()));
    }

    let name = path.to_string_lossy().to_lowercase();
    if !ORDER_EXTENSIONS.iter().any(|ext| name.ends_with(ext)) {
        return Err(ValidationError::WrongExtension(path.to_path_buf()));
    }
    // Readable, but orders can only be written as .xlsx
    if name.ends_with(".xls") {
        return Err(ValidationError::CorruptOrUnreadable(format!(
            "Legacy .xls workbooks cannot be used as templates, save {} as .xlsx",
            path.display()
        )));
    }

    let info = reader::inspect_template(path)
        .map_err(|e| ValidationError::CorruptOrUnreadable(format!("{:#}", e)))?;
    debug!(
        path = %path.display(),
        sheets = info.sheet_names.len(),
        active = %info.active_sheet,
        "template validated"
    );
    Ok(())
}
