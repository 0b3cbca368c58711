use crate::domain::model::{FileCandidate, FilePattern, SweepReport};
use crate::utils::error::Result;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Extensions removed in the first sweep pass.
const SWEEP_EXTENSIONS: &[&str] = &["zip", "csv", "txt", "tsv"];

/// Local working directory that receives fetched files.
#[derive(Debug, Clone)]
pub struct StagingArea {
    root: PathBuf,
}

impl StagingArea {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Empties the directory, creating it when missing. Every entry is
    /// attempted; failures are collected rather than returned. Only an
    /// unusable directory is an error.
    pub fn clear(&self) -> Result<SweepReport> {
        self.clear_with(remove_entry)
    }

    /// `clear` with the per-entry removal supplied by the caller. The
    /// second argument tells the remover whether the entry is a directory.
    pub fn clear_with(&self, remove: impl Fn(&Path, bool) -> io::Result<()>) -> Result<SweepReport> {
        fs::create_dir_all(&self.root)?;
        let mut report = SweepReport::default();

        // 第一輪：已知的壓縮檔與文字檔
        for entry in fs::read_dir(&self.root)? {
            let path = match entry {
                Ok(entry) => entry.path(),
                Err(e) => {
                    report.failures.push((self.root.clone(), e));
                    continue;
                }
            };
            if path.is_file() && has_sweep_extension(&path) {
                match remove(&path, false) {
                    Ok(()) => report.removed.push(path),
                    Err(e) => report.failures.push((path, e)),
                }
            }
        }

        // 第二輪：其餘所有項目
        for entry in fs::read_dir(&self.root)? {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    report.failures.push((self.root.clone(), e));
                    continue;
                }
            };
            let path = entry.path();
            // 第一輪已失敗的項目不再重試
            if report.failures.iter().any(|(failed, _)| failed == &path) {
                continue;
            }
            let is_dir = entry
                .file_type()
                .map(|t| t.is_dir())
                .unwrap_or(false);
            match remove(&path, is_dir) {
                Ok(()) => report.removed.push(path),
                Err(e) => report.failures.push((path, e)),
            }
        }

        fs::create_dir_all(&self.root)?;

        for (path, error) in &report.failures {
            warn!("⚠️ Could not remove {}: {}", path.display(), error);
        }
        debug!(
            "🧹 Cleared {} ({} removed, {} failed)",
            self.root.display(),
            report.removed.len(),
            report.failures.len()
        );
        Ok(report)
    }

    /// Recursive listing of regular files under `root`, sorted by path.
    pub fn walk(root: &Path, pattern: &FilePattern) -> Vec<FileCandidate> {
        let mut candidates: Vec<FileCandidate> = WalkDir::new(root)
            .min_depth(1)
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!("⚠️ Skipping unreadable entry under {}: {}", root.display(), e);
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| FileCandidate::from_path(entry.into_path(), pattern))
            .collect();

        candidates.sort_by(|a, b| a.path.cmp(&b.path));
        info!("📂 Found {} files under {}", candidates.len(), root.display());
        candidates
    }
}

fn remove_entry(path: &Path, is_dir: bool) -> io::Result<()> {
    if is_dir {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    }
}

fn has_sweep_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            SWEEP_EXTENSIONS
                .iter()
                .any(|known| known.eq_ignore_ascii_case(ext))
        })
        .unwrap_or(false)
}
