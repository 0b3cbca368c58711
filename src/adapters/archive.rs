use crate::domain::model::is_archive_name;
use crate::utils::error::Result;
use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use zip::ZipArchive;

const ZIP_MAGIC: &[u8; 4] = b"PK\x03\x04";

/// Zip by extension (any case) or by the local-header magic.
pub fn is_zip_container(path: &Path) -> bool {
    let by_name = path
        .file_name()
        .map(|name| is_archive_name(&name.to_string_lossy()))
        .unwrap_or(false);
    if by_name {
        return true;
    }

    let mut magic = [0u8; 4];
    File::open(path)
        .and_then(|mut file| file.read_exact(&mut magic))
        .map(|()| &magic == ZIP_MAGIC)
        .unwrap_or(false)
}

/// Extracts every entry of `archive` into `directory`. Entry names that
/// would escape the directory are rejected by the zip reader.
pub fn extract_to(archive: &Path, directory: &Path) -> Result<()> {
    fs::create_dir_all(directory)?;
    let mut zip = ZipArchive::new(File::open(archive)?)?;
    debug!(
        "📦 Extracting {} entries from {} into {}",
        zip.len(),
        archive.display(),
        directory.display()
    );
    zip.extract(directory)?;
    Ok(())
}

/// Extracts into a scratch directory beside the container and moves the
/// entries into `directory` only once every entry has been read back
/// intact. A failed extraction leaves nothing behind.
pub fn extract_atomically(archive: &Path, directory: &Path) -> Result<()> {
    fs::create_dir_all(directory)?;
    let scratch = tempfile::Builder::new()
        .prefix(".extract-")
        .tempdir_in(directory)?;
    extract_to(archive, scratch.path())?;

    for entry in fs::read_dir(scratch.path())? {
        let entry = entry?;
        let destination = directory.join(entry.file_name());
        if destination.is_dir() {
            fs::remove_dir_all(&destination)?;
        }
        fs::rename(entry.path(), &destination)?;
    }
    Ok(())
}

/// Moves `source` into `directory`, replacing a same-named file there.
pub fn move_with_overwrite(source: &Path, directory: &Path) -> Result<PathBuf> {
    fs::create_dir_all(directory)?;
    let file_name = source.file_name().ok_or_else(|| {
        std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("{} has no file name", source.display()),
        )
    })?;
    let destination = directory.join(file_name);

    if destination.exists() {
        fs::remove_file(&destination)?;
    }

    // rename 無法跨檔案系統，失敗時改用複製
    if fs::rename(source, &destination).is_err() {
        fs::copy(source, &destination)?;
        fs::remove_file(source)?;
    }

    Ok(destination)
}

/// Relocates processed files into the flat archive directory.
#[derive(Debug, Clone)]
pub struct ArchiveMover {
    archive_dir: PathBuf,
}

impl ArchiveMover {
    pub fn new(archive_dir: impl Into<PathBuf>) -> Self {
        Self {
            archive_dir: archive_dir.into(),
        }
    }

    pub fn archive_dir(&self) -> &Path {
        &self.archive_dir
    }

    pub fn archive(&self, file: &Path) -> Result<PathBuf> {
        let destination = move_with_overwrite(file, &self.archive_dir)?;
        info!("🗄️ Archived {} to {}", file.display(), destination.display());
        Ok(destination)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expansion {
    NotArchive,
    /// Entries were written next to the container.
    Extracted { into: PathBuf },
    /// A sibling directory named after the container already held its
    /// entries, so nothing was extracted again.
    AlreadyExpanded { into: PathBuf },
}

#[derive(Debug, Clone)]
pub struct ArchiveExpander {
    mover: ArchiveMover,
}

impl ArchiveExpander {
    pub fn new(mover: ArchiveMover) -> Self {
        Self { mover }
    }

    pub fn expand_if_archive(&self, path: &Path) -> Result<Expansion> {
        if !is_zip_container(path) {
            return Ok(Expansion::NotArchive);
        }

        let parent = path.parent().unwrap_or_else(|| Path::new("."));
        let expanded_dir = path.file_stem().map(|stem| parent.join(stem));

        let expansion = match expanded_dir {
            Some(dir) if dir.is_dir() => {
                info!("📦 {} was already expanded into {}", path.display(), dir.display());
                Expansion::AlreadyExpanded { into: dir }
            }
            _ => {
                extract_atomically(path, parent)?;
                info!("📦 Extracted {}", path.display());
                Expansion::Extracted {
                    into: parent.to_path_buf(),
                }
            }
        };

        if let Err(e) = self.mover.archive(path) {
            warn!("⚠️ Could not archive container {}: {}", path.display(), e);
        }

        Ok(expansion)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;
    use zip::write::{SimpleFileOptions, ZipWriter};

    fn write_zip(path: &Path, entries: &[(&str, &str)]) {
        let mut zip = ZipWriter::new(File::create(path).unwrap());
        for (name, content) in entries {
            zip.start_file(*name, SimpleFileOptions::default()).unwrap();
            zip.write_all(content.as_bytes()).unwrap();
        }
        zip.finish().unwrap();
    }

    #[test]
    fn test_detects_zip_by_magic_without_extension() {
        let temp = TempDir::new().unwrap();
        let disguised = temp.path().join("payload.bin");
        write_zip(&disguised, &[("a.csv", "id\n1\n")]);
        let plain = temp.path().join("plain.csv");
        fs::write(&plain, "id\n1\n").unwrap();

        assert!(is_zip_container(&disguised));
        assert!(!is_zip_container(&plain));
        assert!(is_zip_container(Path::new("missing/upper.ZIP")));
    }

    #[test]
    fn test_move_overwrites_existing_destination() {
        let temp = TempDir::new().unwrap();
        let archive_dir = temp.path().join("archive");
        fs::create_dir_all(&archive_dir).unwrap();
        fs::write(archive_dir.join("orders.csv"), "old").unwrap();

        let source = temp.path().join("orders.csv");
        fs::write(&source, "new").unwrap();

        let destination = move_with_overwrite(&source, &archive_dir).unwrap();
        assert_eq!(fs::read_to_string(destination).unwrap(), "new");
        assert!(!source.exists());
    }

    #[test]
    fn test_expand_extracts_beside_container_and_archives_it() {
        let temp = TempDir::new().unwrap();
        let landing = temp.path().join("landing");
        fs::create_dir_all(&landing).unwrap();
        let container = landing.join("batch.zip");
        write_zip(&container, &[("orders_daily.csv", "id\n1\n")]);

        let expander = ArchiveExpander::new(ArchiveMover::new(temp.path().join("archive")));
        let expansion = expander.expand_if_archive(&container).unwrap();

        assert_eq!(expansion, Expansion::Extracted { into: landing.clone() });
        assert!(landing.join("orders_daily.csv").is_file());
        assert!(!container.exists());
        assert!(temp.path().join("archive/batch.zip").is_file());
    }

    #[test]
    fn test_failed_extraction_leaves_no_entries_behind() {
        let temp = TempDir::new().unwrap();
        let landing = temp.path().join("landing");
        fs::create_dir_all(&landing).unwrap();
        let container = landing.join("batch.zip");
        write_corrupt_zip(&container);

        let expander = ArchiveExpander::new(ArchiveMover::new(temp.path().join("archive")));
        assert!(expander.expand_if_archive(&container).is_err());

        let left: Vec<String> = fs::read_dir(&landing)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(left, vec!["batch.zip"]);
        assert!(!temp.path().join("archive/batch.zip").exists());
    }

    /// Two stored entries; the second one's bytes no longer match its CRC.
    fn write_corrupt_zip(path: &Path) {
        let options =
            SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
        let mut zip = ZipWriter::new(File::create(path).unwrap());
        zip.start_file("a_daily.csv", options).unwrap();
        zip.write_all(b"id,amount\n1,10\n").unwrap();
        zip.start_file("b_daily.csv", options).unwrap();
        zip.write_all(b"id,amount\n2,BROKEN\n").unwrap();
        zip.finish().unwrap();

        let mut bytes = fs::read(path).unwrap();
        let at = bytes
            .windows(6)
            .position(|w| w == b"BROKEN")
            .unwrap();
        bytes[at..at + 6].copy_from_slice(b"YZZZZZ");
        fs::write(path, bytes).unwrap();
    }

    #[test]
    fn test_expand_skips_already_expanded_container() {
        let temp = TempDir::new().unwrap();
        let container = temp.path().join("batch.zip");
        write_zip(&container, &[("orders_daily.csv", "id\n1\n")]);
        fs::create_dir_all(temp.path().join("batch")).unwrap();

        let expander = ArchiveExpander::new(ArchiveMover::new(temp.path().join("archive")));
        let expansion = expander.expand_if_archive(&container).unwrap();

        assert!(matches!(expansion, Expansion::AlreadyExpanded { .. }));
        assert!(!temp.path().join("orders_daily.csv").exists());
        assert!(!container.exists());
    }

    #[test]
    fn test_plain_file_is_not_expanded() {
        let temp = TempDir::new().unwrap();
        let plain = temp.path().join("orders_daily.csv");
        fs::write(&plain, "id\n1\n").unwrap();

        let expander = ArchiveExpander::new(ArchiveMover::new(temp.path().join("archive")));
        assert_eq!(expander.expand_if_archive(&plain).unwrap(), Expansion::NotArchive);
        assert!(plain.exists());
    }
}
