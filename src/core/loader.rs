use crate::adapters::database::{sql, ConnectionSettings};
use crate::config::{IngestConfig, LoadStrategyKind};
use crate::core::parser::FormatParser;
use crate::domain::model::{LoadResult, TargetSchema};
use crate::domain::ports::{CopyFormat, Warehouse};
use crate::utils::error::{IngestError, Result};
use std::path::Path;
use tokio::process::Command;
use tracing::{error, info};

/// How rows reach the database. Exactly one is active per run.
#[derive(Debug, Clone)]
pub enum LoadStrategy {
    BulkUtility(BulkUtilityLoad),
    NativeBulk(NativeBulkLoad),
    RowBuffer(RowBufferLoad),
}

impl LoadStrategy {
    pub fn from_config(config: &IngestConfig, connection: &ConnectionSettings) -> Result<Self> {
        let delimiter = config.delimiter()?;
        let row_start = config.row_start();
        let batch_commit_size = config.batch_commit_size();

        Ok(match config.load.strategy {
            LoadStrategyKind::BulkUtility => LoadStrategy::BulkUtility(BulkUtilityLoad {
                program: config.utility_program().to_string(),
                connection: connection.clone(),
                delimiter,
                row_start,
                batch_commit_size,
            }),
            LoadStrategyKind::NativeBulk => LoadStrategy::NativeBulk(NativeBulkLoad {
                delimiter,
                row_start,
                batch_commit_size,
            }),
            LoadStrategyKind::RowBuffer => {
                LoadStrategy::RowBuffer(RowBufferLoad { batch_commit_size })
            }
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            LoadStrategy::BulkUtility(_) => "bulk_utility",
            LoadStrategy::NativeBulk(_) => "native_bulk",
            LoadStrategy::RowBuffer(_) => "row_buffer",
        }
    }

    /// The row-buffer strategy with this strategy's commit size.
    pub fn row_buffer_fallback(&self) -> LoadStrategy {
        let batch_commit_size = match self {
            LoadStrategy::BulkUtility(load) => load.batch_commit_size,
            LoadStrategy::NativeBulk(load) => load.batch_commit_size,
            LoadStrategy::RowBuffer(load) => load.batch_commit_size,
        };
        LoadStrategy::RowBuffer(RowBufferLoad { batch_commit_size })
    }

    /// Never raises: every failure ends up in the returned result.
    pub async fn load(
        &self,
        file: &Path,
        target: &TargetSchema,
        parser: &FormatParser,
        warehouse: &dyn Warehouse,
    ) -> LoadResult {
        let outcome = match self {
            LoadStrategy::BulkUtility(load) => load.run(file, target, warehouse).await,
            LoadStrategy::NativeBulk(load) => load.run(file, target, warehouse).await,
            LoadStrategy::RowBuffer(load) => load.run(file, target, parser, warehouse).await,
        };

        match outcome {
            Ok(rows) => {
                info!("✅ {} loaded {} rows via {}", file.display(), rows, self.name());
                LoadResult::loaded(file, self.name(), rows)
            }
            Err(e) => {
                error!("❌ {} failed via {}: {}", file.display(), self.name(), e);
                LoadResult::failed(file, self.name(), e.to_string())
            }
        }
    }
}

/// Client-side copy through an external program (psql).
#[derive(Debug, Clone)]
pub struct BulkUtilityLoad {
    pub program: String,
    pub connection: ConnectionSettings,
    pub delimiter: u8,
    pub row_start: usize,
    pub batch_commit_size: usize,
}

impl BulkUtilityLoad {
    fn command(&self, copy: &str) -> Command {
        let mut command = Command::new(&self.program);
        command
            .arg("-h")
            .arg(&self.connection.host)
            .arg("-p")
            .arg(self.connection.port.to_string())
            .arg("-d")
            .arg(&self.connection.database)
            .arg("-v")
            .arg("ON_ERROR_STOP=1");
        if let Some((user, password)) = &self.connection.credentials {
            command.arg("-U").arg(user).env("PGPASSWORD", password);
        }
        command.arg("-c").arg(copy);
        command
    }

    async fn run(&self, file: &Path, target: &TargetSchema, warehouse: &dyn Warehouse) -> Result<u64> {
        let columns = warehouse.view_columns(target).await?;
        let absolute = std::path::absolute(file)?;
        let copy = sql::client_copy_command(target, &columns, &absolute, self.delimiter, self.row_start);

        let output = self
            .command(&copy)
            .output()
            .await
            .map_err(|e| IngestError::LoadError {
                message: format!("could not start {}: {}", self.program, e),
            })?;

        if !output.status.success() {
            return Err(IngestError::LoadError {
                message: format!(
                    "{} exited with {}: {}",
                    self.program,
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }

        Ok(copied_rows(&String::from_utf8_lossy(&output.stdout)).unwrap_or(0))
    }
}

/// Row count from a `COPY <n>` status line.
pub fn copied_rows(stdout: &str) -> Option<u64> {
    stdout
        .lines()
        .filter_map(|line| line.trim().strip_prefix("COPY "))
        .last()
        .and_then(|count| count.trim().parse().ok())
}

/// Server-side COPY of a file the database host can read.
#[derive(Debug, Clone)]
pub struct NativeBulkLoad {
    pub delimiter: u8,
    pub row_start: usize,
    pub batch_commit_size: usize,
}

impl NativeBulkLoad {
    async fn run(&self, file: &Path, target: &TargetSchema, warehouse: &dyn Warehouse) -> Result<u64> {
        let columns = warehouse.view_columns(target).await?;
        let absolute = std::path::absolute(file)?;
        let format = CopyFormat {
            delimiter: self.delimiter,
            row_start: self.row_start,
        };
        warehouse
            .copy_from_server_file(target, &columns, &absolute, &format)
            .await
    }
}

/// Reads the whole file, normalizes it and inserts through the view.
#[derive(Debug, Clone)]
pub struct RowBufferLoad {
    pub batch_commit_size: usize,
}

impl RowBufferLoad {
    async fn run(
        &self,
        file: &Path,
        target: &TargetSchema,
        parser: &FormatParser,
        warehouse: &dyn Warehouse,
    ) -> Result<u64> {
        let parsed = parser.read_rows(file)?;
        let columns = match parsed.columns {
            Some(columns) => columns.names().to_vec(),
            None => warehouse.view_columns(target).await?,
        };

        if let Some((index, row)) = parsed
            .rows
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() != columns.len())
        {
            return Err(IngestError::format(
                file,
                format!(
                    "row {} has {} cells, the view has {} columns",
                    index + 1,
                    row.len(),
                    columns.len()
                ),
            ));
        }

        warehouse
            .insert_rows(target, &columns, &parsed.rows, self.batch_commit_size)
            .await
    }
}
