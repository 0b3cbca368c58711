#![allow(dead_code)]

use async_trait::async_trait;
use small_ingest::core::loader::RowBufferLoad;
use small_ingest::core::parser::DelimitedTextParser;
use small_ingest::domain::model::{CellValue, ColumnSet, FilePattern, TargetSchema, IDENTITY_COLUMN};
use small_ingest::domain::ports::{CopyFormat, Notifier, Warehouse};
use small_ingest::{FormatParser, IngestError, IngestionPipeline, LoadStrategy, Result};
use std::path::Path;
use std::sync::{Arc, Mutex};

/// In-memory stand-in for the table/view pair. Writes are all-or-nothing
/// per call, like a committed transaction.
#[derive(Debug, Default, Clone)]
pub struct Tables {
    pub table_columns: Vec<String>,
    pub view_columns: Vec<String>,
    pub rows: Vec<(i64, Vec<Option<String>>)>,
    pub replacements: usize,
}

impl Tables {
    pub fn column(&self, name: &str) -> Vec<Option<String>> {
        let index = self
            .view_columns
            .iter()
            .position(|c| c == name)
            .expect("column exists");
        self.rows.iter().map(|(_, row)| row[index].clone()).collect()
    }
}

#[derive(Debug, Default)]
pub struct MemoryWarehouse {
    pub tables: Mutex<Tables>,
    /// Any row containing this cell makes the whole write fail.
    pub poison: Option<String>,
    pub fail_schema: bool,
}

impl MemoryWarehouse {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_poison(value: &str) -> Self {
        Self {
            poison: Some(value.to_string()),
            ..Default::default()
        }
    }

    pub fn snapshot(&self) -> Tables {
        self.tables.lock().unwrap().clone()
    }

    fn append(&self, incoming: Vec<Vec<Option<String>>>) -> Result<u64> {
        if let Some(poison) = &self.poison {
            if incoming
                .iter()
                .any(|row| row.iter().any(|cell| cell.as_deref() == Some(poison.as_str())))
            {
                return Err(IngestError::LoadError {
                    message: format!("value '{}' rejected", poison),
                });
            }
        }

        let mut tables = self.tables.lock().unwrap();
        let count = incoming.len() as u64;
        for row in incoming {
            let id = tables.rows.len() as i64 + 1;
            tables.rows.push((id, row));
        }
        Ok(count)
    }
}

#[async_trait]
impl Warehouse for MemoryWarehouse {
    async fn replace_table_and_view(
        &self,
        target: &TargetSchema,
        columns: &ColumnSet,
    ) -> Result<Vec<String>> {
        if self.fail_schema {
            return Err(IngestError::SchemaError {
                table: target.table.clone(),
                message: "permission denied for schema".to_string(),
            });
        }

        let mut tables = self.tables.lock().unwrap();
        tables.table_columns = std::iter::once(IDENTITY_COLUMN.to_string())
            .chain(columns.names().iter().cloned())
            .collect();
        tables.view_columns = columns.names().to_vec();
        tables.rows.clear();
        tables.replacements += 1;
        Ok(tables.view_columns.clone())
    }

    async fn view_columns(&self, target: &TargetSchema) -> Result<Vec<String>> {
        let tables = self.tables.lock().unwrap();
        if tables.view_columns.is_empty() {
            return Err(IngestError::SchemaError {
                table: target.table.clone(),
                message: "view does not exist".to_string(),
            });
        }
        Ok(tables.view_columns.clone())
    }

    async fn insert_rows(
        &self,
        target: &TargetSchema,
        columns: &[String],
        rows: &[Vec<CellValue>],
        _batch_size: usize,
    ) -> Result<u64> {
        let view_columns = self.view_columns(target).await?;
        let positions: Vec<Option<usize>> = view_columns
            .iter()
            .map(|vc| columns.iter().position(|c| c == vc))
            .collect();
        if let Some(unknown) = columns.iter().find(|c| !view_columns.contains(c)) {
            return Err(IngestError::LoadError {
                message: format!("column \"{}\" does not exist", unknown),
            });
        }

        let incoming = rows
            .iter()
            .map(|row| {
                positions
                    .iter()
                    .map(|p| p.and_then(|i| row[i].to_sql_text()))
                    .collect()
            })
            .collect();
        self.append(incoming)
    }

    async fn copy_from_server_file(
        &self,
        target: &TargetSchema,
        columns: &[String],
        file: &Path,
        format: &CopyFormat,
    ) -> Result<u64> {
        let view_columns = self.view_columns(target).await?;
        assert_eq!(columns, view_columns.as_slice());

        let mut reader = csv::ReaderBuilder::new()
            .delimiter(format.delimiter)
            .has_headers(format.row_start > 1)
            .from_path(file)?;
        let mut incoming = Vec::new();
        for record in reader.records() {
            let record = record?;
            incoming.push(
                record
                    .iter()
                    .map(|cell| (!cell.is_empty()).then(|| cell.to_string()))
                    .collect(),
            );
        }
        self.append(incoming)
    }
}

#[derive(Debug, Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<(String, String)>>,
}

impl RecordingNotifier {
    pub fn messages(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, subject: &str, body: &str) -> Result<()> {
        self.sent
            .lock()
            .unwrap()
            .push((subject.to_string(), body.to_string()));
        Ok(())
    }
}

pub fn csv_pattern() -> FilePattern {
    FilePattern {
        prefix: "orders_".to_string(),
        suffix: "_daily".to_string(),
        extensions: vec!["csv".to_string(), "zip".to_string()],
        file_type: "csv".to_string(),
    }
}

pub fn csv_parser() -> FormatParser {
    FormatParser::Delimited(DelimitedTextParser {
        delimiter: b',',
        has_header: true,
        column_names: None,
    })
}

pub fn row_buffer() -> LoadStrategy {
    LoadStrategy::RowBuffer(RowBufferLoad {
        batch_commit_size: 1000,
    })
}

pub fn target() -> TargetSchema {
    TargetSchema::new("public", "daily_orders")
}

pub fn pipeline(
    parser: FormatParser,
    strategy: LoadStrategy,
    pattern: FilePattern,
    archive_dir: &Path,
    warehouse: Arc<MemoryWarehouse>,
) -> IngestionPipeline {
    IngestionPipeline::new(parser, strategy, target(), pattern, archive_dir, warehouse)
}
