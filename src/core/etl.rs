use crate::adapters::sources::SourceConnector;
use crate::adapters::staging::StagingArea;
use crate::core::pipeline::{BatchReport, IngestionPipeline};
use crate::domain::model::{RunOutcome, SchemaState};
use crate::domain::ports::Notifier;
use crate::utils::error::Result;
use crate::utils::monitor::RunMonitor;
use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

pub const SUCCESS_SUBJECT: &str = "ETL Process Successful";
pub const FAILURE_SUBJECT: &str = "ETL Process Failed";

/// One run: clear staging, fetch, process the batch, clear again, then
/// send exactly one notification.
pub struct IngestEngine {
    staging: StagingArea,
    source: SourceConnector,
    pipeline: IngestionPipeline,
    notifier: Arc<dyn Notifier>,
    reset_table: bool,
    monitor: RunMonitor,
}

impl IngestEngine {
    pub fn new(
        staging: StagingArea,
        source: SourceConnector,
        pipeline: IngestionPipeline,
        notifier: Arc<dyn Notifier>,
        reset_table: bool,
    ) -> Self {
        Self {
            staging,
            source,
            pipeline,
            notifier,
            reset_table,
            monitor: RunMonitor::default(),
        }
    }

    pub fn with_monitor(mut self, monitor: RunMonitor) -> Self {
        self.monitor = monitor;
        self
    }

    pub async fn run(&mut self) -> Result<RunOutcome> {
        let started_at = Utc::now();
        let start = Instant::now();
        info!("🚀 Starting ingestion run from {} source", self.source.name());

        let result = self.execute().await;
        let elapsed = start.elapsed();

        let (subject, body) = match &result {
            Ok(_) => (
                SUCCESS_SUBJECT,
                format!(
                    "The ETL process completed successfully in {:.3} seconds.",
                    elapsed.as_secs_f64()
                ),
            ),
            Err(e) => {
                error!("❌ ETL process failed: {}", e);
                (FAILURE_SUBJECT, format!("ETL process failed with error: {}", e))
            }
        };
        if let Err(e) = self.notifier.notify(subject, &body).await {
            warn!("⚠️ Notification could not be sent: {}", e);
        }

        let batch = result?;
        let outcome = RunOutcome {
            started_at,
            elapsed,
            results: batch.results,
            skipped: batch.skipped,
        };
        info!(
            "🎉 Run finished in {:?}: {} files loaded, {} failed, {} skipped, {} rows",
            outcome.elapsed,
            outcome.loaded_files(),
            outcome.failed_files(),
            outcome.skipped,
            outcome.total_rows()
        );
        Ok(outcome)
    }

    async fn execute(&mut self) -> Result<BatchReport> {
        self.staging.clear()?;
        self.monitor.log_phase("staging cleared");

        let pattern = self.pipeline.pattern().clone();
        match self.source.fetch(&self.staging, &pattern).await {
            Ok(files) => info!("📥 Fetched {} files", files.len()),
            // 取檔失敗不中止，已在暫存區的檔案照常處理
            Err(e) => error!("❌ Fetch from {} failed: {}", self.source.name(), e),
        }
        self.monitor.log_phase("fetch");

        let landing_dir = self.source.landing_dir(&self.staging);
        let mut state = SchemaState::new(self.reset_table);
        let batch = self.pipeline.process_batch(&landing_dir, &mut state).await;
        self.monitor.log_phase("load");

        // 中止的批次也要清空暫存區
        self.final_sweep();
        batch
    }

    fn final_sweep(&self) {
        match self.staging.clear() {
            Ok(report) if !report.is_clean() => {
                warn!("⚠️ {} staging entries could not be removed", report.failures.len())
            }
            Ok(_) => {}
            Err(e) => warn!("⚠️ Final staging clear failed: {}", e),
        }
    }
}
