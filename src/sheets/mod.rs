// src/sheets/mod.rs
//! Spreadsheet seam: read whole sheets, append rows, create sheets.

pub mod google;
pub mod memory;

use async_trait::async_trait;
use thiserror::Error;

pub use google::GoogleSheets;
pub use memory::MemorySheets;

/// Sheet contents, first row is the header when present.
pub type Rows = Vec<Vec<String>>;

#[derive(Debug, Error)]
pub enum SheetError {
    #[error("sheet {0:?} not found")]
    NotFound(String),
    #[error("network error: {0}")]
    Http(String),
    #[error("spreadsheet API returned {status}: {message}")]
    Api { status: u16, message: String },
    #[error("unexpected response: {0}")]
    Decode(String),
}

impl SheetError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, SheetError::NotFound(_))
    }
}

#[async_trait]
pub trait SpreadsheetClient: Send + Sync {
    /// All rows of the sheet. `SheetError::NotFound` when it does not exist.
    async fn read_sheet(&self, name: &str) -> Result<Rows, SheetError>;

    /// Append rows after the last non-empty row.
    async fn append_rows(&self, name: &str, rows: Rows) -> Result<(), SheetError>;

    /// Create the sheet with `header` as its first row when it is missing,
    /// or write the header into it when it is empty. `true` when anything was written.
    async fn ensure_sheet_exists(&self, name: &str, header: &[&str]) -> Result<bool, SheetError>;
}

pub(crate) fn header_row(header: &[&str]) -> Vec<String> {
    header.iter().map(|h| h.to_string()).collect()
}
