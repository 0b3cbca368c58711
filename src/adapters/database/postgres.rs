use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use sqlx::{Postgres, QueryBuilder, Row, Transaction};
use std::path::Path;
use tracing::{debug, info};

use super::sql;
use super::ConnectionSettings;
use crate::domain::model::{CellValue, ColumnSet, TargetSchema, IDENTITY_COLUMN};
use crate::domain::ports::{CopyFormat, Warehouse};
use crate::utils::error::{IngestError, Result};

/// PostgreSQL warehouse. The pool holds a single connection, every
/// operation runs sequentially on it.
pub struct PgWarehouse {
    pool: PgPool,
}

impl PgWarehouse {
    /// Connection is opened on first use, so construction never touches the network.
    pub fn connect_lazy(settings: &ConnectionSettings) -> Self {
        let mut options = PgConnectOptions::new()
            .host(&settings.host)
            .port(settings.port)
            .database(&settings.database);
        if let Some((user, password)) = &settings.credentials {
            options = options.username(user).password(password);
        }

        let pool = PgPoolOptions::new()
            .max_connections(1)
            .connect_lazy_with(options);

        Self { pool }
    }

    async fn relation_columns(
        executor: &mut Transaction<'_, Postgres>,
        schema: &str,
        relation: &str,
    ) -> Result<Vec<String>> {
        let rows = sqlx::query(sql::COLUMNS_QUERY)
            .bind(schema)
            .bind(relation)
            .fetch_all(&mut **executor)
            .await?;

        rows.iter()
            .map(|row| row.try_get::<String, _>(0).map_err(IngestError::from))
            .collect()
    }

    async fn recreate(&self, target: &TargetSchema, columns: &ColumnSet) -> Result<Vec<String>> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(&sql::drop_view(target)).execute(&mut *tx).await?;
        sqlx::query(&sql::drop_table(target)).execute(&mut *tx).await?;
        sqlx::query(&sql::create_table(target, columns.names()))
            .execute(&mut *tx)
            .await?;

        // 以資料庫實際欄位順序建立 view
        let table_columns: Vec<String> =
            Self::relation_columns(&mut tx, &target.schema, &target.table)
                .await?
                .into_iter()
                .filter(|c| c != IDENTITY_COLUMN)
                .collect();
        debug!("🔎 Live column order for {}: {:?}", target.table, table_columns);

        sqlx::query(&sql::drop_view(target)).execute(&mut *tx).await?;
        sqlx::query(&sql::create_view(target, &table_columns))
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(table_columns)
    }
}

#[async_trait]
impl Warehouse for PgWarehouse {
    async fn replace_table_and_view(
        &self,
        target: &TargetSchema,
        columns: &ColumnSet,
    ) -> Result<Vec<String>> {
        // 交易在錯誤時隨 drop 自動 rollback
        self.recreate(target, columns)
            .await
            .map_err(|e| IngestError::SchemaError {
                table: target.table.clone(),
                message: e.to_string(),
            })
    }

    async fn view_columns(&self, target: &TargetSchema) -> Result<Vec<String>> {
        let mut tx = self.pool.begin().await?;
        let columns = Self::relation_columns(&mut tx, &target.schema, &target.view()).await?;
        tx.commit().await?;

        if columns.is_empty() {
            return Err(IngestError::SchemaError {
                table: target.table.clone(),
                message: format!("view {} has no columns or does not exist", target.view()),
            });
        }
        Ok(columns)
    }

    async fn insert_rows(
        &self,
        target: &TargetSchema,
        columns: &[String],
        rows: &[Vec<CellValue>],
        batch_size: usize,
    ) -> Result<u64> {
        if rows.is_empty() {
            return Ok(0);
        }

        let per_statement = sql::rows_per_statement(columns.len(), batch_size);
        let insert_head = format!(
            "INSERT INTO {} ({}) ",
            sql::view_name(target),
            sql::column_list(columns)
        );

        let mut tx = self.pool.begin().await?;
        let mut inserted = 0u64;

        for chunk in rows.chunks(per_statement) {
            let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(&insert_head);
            builder.push_values(chunk, |mut b, row| {
                for cell in row {
                    b.push_bind(cell.to_sql_text());
                }
            });
            let result = builder.build().execute(&mut *tx).await?;
            inserted += result.rows_affected();
            debug!("📝 Inserted chunk of {} rows into {}", chunk.len(), target.view());
        }

        tx.commit().await?;
        info!("✅ Committed {} rows into {}", inserted, target.view());
        Ok(inserted)
    }

    async fn copy_from_server_file(
        &self,
        target: &TargetSchema,
        columns: &[String],
        file: &Path,
        format: &CopyFormat,
    ) -> Result<u64> {
        let statement = sql::copy_from_file(target, columns, file, format);
        debug!("📥 {}", statement);

        let mut tx = self.pool.begin().await?;
        let result = sqlx::query(&statement).execute(&mut *tx).await?;
        tx.commit().await?;

        Ok(result.rows_affected())
    }
}
