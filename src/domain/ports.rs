use crate::domain::model::{CellValue, ColumnSet, TargetSchema};
use crate::utils::error::Result;
use async_trait::async_trait;
use std::path::Path;

/// Options for a server-side COPY of a delimited file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyFormat {
    pub delimiter: u8,
    /// First line holding data, 1-based.
    pub row_start: usize,
}

/// Everything the schema manager and the loaders need from the database.
#[async_trait]
pub trait Warehouse: Send + Sync {
    /// Drops and recreates the table/view pair in one transaction and
    /// returns the view's column order as read back from metadata.
    async fn replace_table_and_view(
        &self,
        target: &TargetSchema,
        columns: &ColumnSet,
    ) -> Result<Vec<String>>;

    /// Column names of the view in ordinal order.
    async fn view_columns(&self, target: &TargetSchema) -> Result<Vec<String>>;

    /// Inserts rows into the view inside one transaction, chunked to at
    /// most `batch_size` rows per statement. Returns the inserted count.
    async fn insert_rows(
        &self,
        target: &TargetSchema,
        columns: &[String],
        rows: &[Vec<CellValue>],
        batch_size: usize,
    ) -> Result<u64>;

    /// Server-side bulk copy of a file the database host can read.
    async fn copy_from_server_file(
        &self,
        target: &TargetSchema,
        columns: &[String],
        file: &Path,
        format: &CopyFormat,
    ) -> Result<u64>;
}

pub trait SecretProvider: Send + Sync {
    fn secret(&self, name: &str) -> Result<String>;
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, subject: &str, body: &str) -> Result<()>;
}
