use crate::domain::model::{ColumnSet, SchemaAction, SchemaState, TargetSchema};
use crate::domain::ports::Warehouse;
use crate::utils::error::Result;
use tracing::{debug, info};

/// Owns the drop/create decision for the table/view pair.
#[derive(Debug, Clone)]
pub struct SchemaManager {
    target: TargetSchema,
}

impl SchemaManager {
    pub fn new(target: TargetSchema) -> Self {
        Self { target }
    }

    pub fn target(&self) -> &TargetSchema {
        &self.target
    }

    /// Recreates the pair while a reset is pending, then does nothing for
    /// the rest of the run.
    pub async fn ensure_schema(
        &self,
        warehouse: &dyn Warehouse,
        columns: &ColumnSet,
        state: &mut SchemaState,
    ) -> Result<SchemaAction> {
        if state.created {
            debug!("Schema for {} already established", self.target.table);
            return Ok(SchemaAction::Unchanged);
        }

        let view_columns = warehouse.replace_table_and_view(&self.target, columns).await?;
        state.created = true;
        info!(
            "🏗️ Created table {} and view {} with {} columns",
            self.target.table,
            self.target.view(),
            view_columns.len()
        );

        Ok(SchemaAction::Created {
            columns: view_columns,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::CellValue;
    use crate::domain::ports::CopyFormat;
    use crate::utils::error::IngestError;
    use async_trait::async_trait;
    use std::path::Path;
    use std::sync::Mutex;

    #[derive(Default)]
    struct CountingWarehouse {
        replacements: Mutex<usize>,
        fail: bool,
    }

    #[async_trait]
    impl Warehouse for CountingWarehouse {
        async fn replace_table_and_view(
            &self,
            target: &TargetSchema,
            columns: &ColumnSet,
        ) -> Result<Vec<String>> {
            if self.fail {
                return Err(IngestError::SchemaError {
                    table: target.table.clone(),
                    message: "permission denied".to_string(),
                });
            }
            *self.replacements.lock().unwrap() += 1;
            Ok(columns.names().to_vec())
        }

        async fn view_columns(&self, _target: &TargetSchema) -> Result<Vec<String>> {
            Ok(Vec::new())
        }

        async fn insert_rows(
            &self,
            _target: &TargetSchema,
            _columns: &[String],
            _rows: &[Vec<CellValue>],
            _batch_size: usize,
        ) -> Result<u64> {
            Ok(0)
        }

        async fn copy_from_server_file(
            &self,
            _target: &TargetSchema,
            _columns: &[String],
            _file: &Path,
            _format: &CopyFormat,
        ) -> Result<u64> {
            Ok(0)
        }
    }

    #[tokio::test]
    async fn test_ensure_schema_runs_once_per_run() {
        let warehouse = CountingWarehouse::default();
        let manager = SchemaManager::new(TargetSchema::new("public", "orders"));
        let columns = ColumnSet::new(["id", "amount"]).unwrap();
        let mut state = SchemaState::new(true);

        let first = manager.ensure_schema(&warehouse, &columns, &mut state).await.unwrap();
        assert_eq!(
            first,
            SchemaAction::Created {
                columns: vec!["id".to_string(), "amount".to_string()]
            }
        );
        assert!(state.created);

        let second = manager.ensure_schema(&warehouse, &columns, &mut state).await.unwrap();
        assert_eq!(second, SchemaAction::Unchanged);
        assert_eq!(*warehouse.replacements.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_no_reset_issues_nothing() {
        let warehouse = CountingWarehouse::default();
        let manager = SchemaManager::new(TargetSchema::new("public", "orders"));
        let columns = ColumnSet::new(["id"]).unwrap();
        let mut state = SchemaState::new(false);

        let action = manager.ensure_schema(&warehouse, &columns, &mut state).await.unwrap();
        assert_eq!(action, SchemaAction::Unchanged);
        assert_eq!(*warehouse.replacements.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_failure_leaves_reset_pending() {
        let warehouse = CountingWarehouse {
            fail: true,
            ..Default::default()
        };
        let manager = SchemaManager::new(TargetSchema::new("public", "orders"));
        let columns = ColumnSet::new(["id"]).unwrap();
        let mut state = SchemaState::new(true);

        assert!(manager.ensure_schema(&warehouse, &columns, &mut state).await.is_err());
        assert!(state.reset_pending());
    }
}
