//! Error types returned across the library boundary

use std::path::PathBuf;
use thiserror::Error;

/// Why an order could not be created
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderError {
    #[error("Department not provided")]
    MissingDepartment,

    #[error("Destination folder not found: {}", .0.display())]
    FolderNotFound(PathBuf),

    #[error("Template not found: {}", .0.display())]
    TemplateNotFound(PathBuf),

    /// Wraps the underlying I/O or format error text
    #[error("Error creating order: {0}")]
    CreationFailed(String),
}

/// Why a file cannot be used as a template
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("File not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("File must be an Excel workbook (.xlsx or .xls): {}", .0.display())]
    WrongExtension(PathBuf),

    #[error("Error validating template: {0}")]
    CorruptOrUnreadable(String),
}

/// Failure to persist the configuration file
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to write {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize configuration: {0}")]
    Json(#[from] serde_json::Error),
}
