//! External collaborators: the tabular document store and the file store.
//!
//! The ledger engine only ever sees these two traits; the production
//! implementations in [`client`] speak the Google Sheets v4 values API and
//! the Drive v3 upload API. Tests substitute in-memory fakes.

pub mod auth;
pub mod client;

use async_trait::async_trait;

use crate::errors::ServiceError;

/// Read/append/update named rectangular ranges of a tabular document.
/// Ranges are A1 labels including the sheet name, e.g. `"Inventory!A:J"`.
#[async_trait]
pub trait TabularStore: Send + Sync {
    /// Rows within the range. Trailing empty cells and trailing empty rows
    /// may be omitted, matching the remote API's behavior.
    async fn read_range(&self, range: &str) -> Result<Vec<Vec<String>>, ServiceError>;

    /// Append rows after the last data row of the range's table region.
    async fn append_rows(&self, range: &str, rows: Vec<Vec<String>>) -> Result<(), ServiceError>;

    /// Overwrite the cells of the range with the given rows.
    async fn update_range(&self, range: &str, rows: Vec<Vec<String>>) -> Result<(), ServiceError>;
}

/// Upload a binary blob with metadata, returning a durable shareable link.
#[async_trait]
pub trait FileStore: Send + Sync {
    async fn upload(
        &self,
        file_name: &str,
        mime_type: &str,
        bytes: Vec<u8>,
    ) -> Result<String, ServiceError>;
}
