//! # Sheets
//!
//! Spreadsheet-as-database seam.
//!
//! Everything the server persists lives in a Google Sheets spreadsheet. This crate
//! owns the pieces that talk about that grid without knowing what the rows mean:
//!
//! - [`RangeAddress`]: `plan!A5:J5`-style region identifiers, row numbers 1-based
//! - [`cell`]: loose comparison of cell values (`"3"` equals `3`, whitespace ignored)
//! - [`RowStore`]: read a range, append rows, overwrite a range
//! - [`SheetsClient`]: the Google Sheets REST v4 implementation
//! - [`MemoryStore`]: an in-process grid, same semantics, used by tests and local runs
//!
//! ## Notes
//!
//! - A fetched range comes back as a list of rows where element 0 is the first row of
//!   the range. For whole-column ranges (`A:J`) that is sheet row 1.
//! - Google trims trailing empty cells and rows, so rows can be shorter than the range
//!   width. Callers must treat a missing cell as absent, not as an error.
//! - Nothing here is transactional. A read followed by a write can race another writer.
use async_trait::async_trait;
use serde::Serialize;

pub mod cell;
pub mod error;
pub mod memory;
pub mod range;
pub mod remote;

pub use error::SheetsError;
pub use memory::MemoryStore;
pub use range::RangeAddress;
pub use remote::SheetsClient;

/// A single cell as exchanged with the Sheets API.
pub type Cell = serde_json::Value;

/// One record: cells positionally mapped to named fields.
pub type Row = Vec<Cell>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppendResult {
    pub updated_range: String,
    pub row_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateResult {
    pub updated_range: String,
    pub cell_count: usize,
}

/// Tabular store addressed by spreadsheet id and range.
#[async_trait]
pub trait RowStore: Send + Sync {
    /// Every populated row in `range`. Empty when the range holds no data.
    async fn get_range(
        &self,
        spreadsheet_id: &str,
        range: &RangeAddress,
    ) -> Result<Vec<Row>, SheetsError>;

    /// Adds `rows` after the last populated row of `range`. The store picks the row numbers.
    async fn append_rows(
        &self,
        spreadsheet_id: &str,
        range: &RangeAddress,
        rows: &[Row],
    ) -> Result<AppendResult, SheetsError>;

    /// Overwrites the cells of `range` with `rows`, starting at its top-left corner.
    async fn update_range(
        &self,
        spreadsheet_id: &str,
        range: &RangeAddress,
        rows: &[Row],
    ) -> Result<UpdateResult, SheetsError>;
}
