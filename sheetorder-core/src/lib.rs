//! sheetorder-core: numbered order sheets from an Excel template
//!
//! The library keeps two concerns apart: a JSON configuration store holding
//! session state and the order history, and a stateless order service that
//! numbers a destination folder and stamps a copy of the template.

pub mod config;
pub mod error;
pub mod order;
pub mod reader;
pub mod writer;

pub use config::{ConfigStore, HISTORY_LIMIT, HistoryEntry};
pub use error::{ConfigError, OrderError, ValidationError};
pub use order::{
    OrderCreated, TemplateLayout, create_order, create_order_on, next_order_number,
    validate_template,
};
