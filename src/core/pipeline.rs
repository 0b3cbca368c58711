use crate::adapters::archive::{is_zip_container, ArchiveExpander, ArchiveMover};
use crate::adapters::staging::StagingArea;
use crate::core::loader::LoadStrategy;
use crate::core::parser::FormatParser;
use crate::core::schema::SchemaManager;
use crate::domain::model::{
    FileCandidate, FilePattern, LoadResult, SchemaAction, SchemaState, TargetSchema,
};
use crate::domain::ports::Warehouse;
use crate::utils::error::Result;
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Per-file results of one batch plus the ineligible files it skipped.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub results: Vec<LoadResult>,
    pub skipped: usize,
}

/// Expand, walk, then derive → load → archive for each eligible file.
pub struct IngestionPipeline {
    parser: FormatParser,
    strategy: LoadStrategy,
    schema: SchemaManager,
    expander: ArchiveExpander,
    mover: ArchiveMover,
    pattern: FilePattern,
    warehouse: Arc<dyn Warehouse>,
}

impl IngestionPipeline {
    pub fn new(
        parser: FormatParser,
        strategy: LoadStrategy,
        target: TargetSchema,
        pattern: FilePattern,
        archive_dir: impl Into<std::path::PathBuf>,
        warehouse: Arc<dyn Warehouse>,
    ) -> Self {
        let mover = ArchiveMover::new(archive_dir);
        Self {
            parser,
            strategy,
            schema: SchemaManager::new(target),
            expander: ArchiveExpander::new(mover.clone()),
            mover,
            pattern,
            warehouse,
        }
    }

    pub fn pattern(&self) -> &FilePattern {
        &self.pattern
    }

    pub fn target(&self) -> &TargetSchema {
        self.schema.target()
    }

    /// Errors only when the schema cannot be established while a reset is
    /// pending, or the landing directory cannot be read. Any later failure
    /// is contained to its file.
    pub async fn process_batch(
        &self,
        landing_dir: &Path,
        state: &mut SchemaState,
    ) -> Result<BatchReport> {
        self.expand_containers(landing_dir)?;

        let candidates = StagingArea::walk(landing_dir, &self.pattern);
        let mut report = BatchReport::default();

        for candidate in candidates {
            if !candidate.matches_pattern {
                info!(
                    "⏭️ Skipping {} (expected name ending {})",
                    candidate.file_name,
                    self.pattern.expected_ending()
                );
                report.skipped += 1;
                continue;
            }

            let result = self.process_file(&candidate, state).await?;
            report.results.push(result);
        }

        info!(
            "📊 Batch done: {} loaded, {} failed, {} skipped",
            report.results.iter().filter(|r| r.is_success()).count(),
            report.results.iter().filter(|r| !r.is_success()).count(),
            report.skipped
        );
        Ok(report)
    }

    fn expand_containers(&self, landing_dir: &Path) -> Result<()> {
        let mut containers: Vec<_> = std::fs::read_dir(landing_dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file() && is_zip_container(path))
            .collect();
        containers.sort();

        for container in containers {
            if let Err(e) = self.expander.expand_if_archive(&container) {
                error!("❌ Could not expand {}: {}", container.display(), e);
            }
        }
        Ok(())
    }

    async fn process_file(
        &self,
        candidate: &FileCandidate,
        state: &mut SchemaState,
    ) -> Result<LoadResult> {
        let path = candidate.path.as_path();
        info!("📄 Processing {}", path.display());

        let columns = match self.parser.derive_schema(path) {
            Ok(columns) => columns,
            Err(e) if state.reset_pending() => return Err(e),
            Err(e) => {
                error!("❌ Could not read columns of {}: {}", path.display(), e);
                return Ok(LoadResult::failed(path, self.strategy.name(), e.to_string()));
            }
        };

        if state.reset_pending() {
            let action = self
                .schema
                .ensure_schema(self.warehouse.as_ref(), &columns, state)
                .await?;
            if let SchemaAction::Created { columns: view_columns } = action {
                info!("🧱 {} columns: {}", self.target().view(), view_columns.join(", "));
            }
        }

        let result = self
            .parser
            .load(path, self.target(), &self.strategy, self.warehouse.as_ref())
            .await;

        if result.is_success() {
            if let Err(e) = self.mover.archive(path) {
                warn!("⚠️ Loaded but could not archive {}: {}", path.display(), e);
            }
        } else {
            warn!("⚠️ Leaving {} in place after failed load", path.display());
        }

        Ok(result)
    }
}
