use crate::adapters::staging::StagingArea;
use crate::domain::model::{FileCandidate, FilePattern};
use crate::utils::error::Result;
use std::path::{Path, PathBuf};
use tracing::info;

/// Files already sitting in a local folder. Nothing is fetched and nothing
/// is filtered; the pipeline walks the folder itself.
#[derive(Debug, Clone)]
pub struct LocalSource {
    folder: PathBuf,
}

impl LocalSource {
    pub fn new(folder: impl Into<PathBuf>) -> Self {
        Self {
            folder: folder.into(),
        }
    }

    pub fn folder(&self) -> &Path {
        &self.folder
    }

    pub fn fetch(&self, pattern: &FilePattern) -> Result<Vec<FileCandidate>> {
        std::fs::create_dir_all(&self.folder)?;
        let candidates = StagingArea::walk(&self.folder, pattern);
        info!(
            "📁 Local source {} holds {} files",
            self.folder.display(),
            candidates.len()
        );
        Ok(candidates)
    }
}
