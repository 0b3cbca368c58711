use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::utils::error::{IngestError, Result};

/// Surrogate key prepended to every target table and hidden by its view.
pub const IDENTITY_COLUMN: &str = "RecId";

/// Extensions of the zip containers the expander understands.
pub const ARCHIVE_EXTENSIONS: &[&str] = &["zip"];

/// File-name rules shared by the source filters and the pipeline's
/// eligibility check.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilePattern {
    pub prefix: String,
    pub suffix: String,
    /// Allowed extensions for fetching, without the dot.
    pub extensions: Vec<String>,
    /// Extension of the files that are actually loaded (`csv`, `txt`, `json`...).
    pub file_type: String,
}

impl FilePattern {
    /// Object-store rule: prefix AND extension.
    pub fn matches_object_store(&self, file_name: &str) -> bool {
        file_name.starts_with(&self.prefix)
            && extension_of(file_name)
                .map(|ext| self.extensions.iter().any(|allowed| allowed == &ext))
                .unwrap_or(false)
    }

    /// SFTP rule: prefix OR `<suffix>.<ext>` for any allowed extension.
    pub fn matches_sftp(&self, file_name: &str) -> bool {
        file_name.starts_with(&self.prefix)
            || self
                .extensions
                .iter()
                .any(|ext| file_name.ends_with(&format!("{}.{}", self.suffix, ext)))
    }

    /// Whether a walked file should be loaded.
    pub fn is_eligible(&self, file_name: &str) -> bool {
        file_name.ends_with(&format!("{}.{}", self.suffix, self.file_type))
            && !is_archive_name(file_name)
    }

    pub fn expected_ending(&self) -> String {
        format!("{}.{}", self.suffix, self.file_type)
    }
}

pub fn extension_of(file_name: &str) -> Option<String> {
    Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_string())
}

pub fn is_archive_name(file_name: &str) -> bool {
    extension_of(file_name)
        .map(|ext| {
            ARCHIVE_EXTENSIONS
                .iter()
                .any(|archive| archive.eq_ignore_ascii_case(&ext))
        })
        .unwrap_or(false)
}

/// A discovered file plus what the pipeline needs to know about its name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileCandidate {
    pub path: PathBuf,
    pub file_name: String,
    pub extension: Option<String>,
    pub matches_pattern: bool,
}

impl FileCandidate {
    pub fn from_path(path: impl Into<PathBuf>, pattern: &FilePattern) -> Self {
        let path = path.into();
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let extension = extension_of(&file_name);
        let matches_pattern = pattern.is_eligible(&file_name);

        Self {
            path,
            file_name,
            extension,
            matches_pattern,
        }
    }
}

/// Ordered, validated column names. Every column is stored as text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSet {
    names: Vec<String>,
}

impl ColumnSet {
    /// Normalizes raw header cells and enforces the set's invariants.
    pub fn new<I, S>(raw: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut names = Vec::new();
        let mut seen = HashSet::new();

        for (position, cell) in raw.into_iter().enumerate() {
            let name = normalize_column_name(cell.as_ref());
            if name.is_empty() {
                return Err(column_error(format!("column {} has an empty name", position + 1)));
            }
            if name.eq_ignore_ascii_case(IDENTITY_COLUMN) {
                return Err(column_error(format!(
                    "column '{}' collides with the identity column",
                    name
                )));
            }
            if !seen.insert(name.to_lowercase()) {
                return Err(column_error(format!("duplicate column '{}'", name)));
            }
            names.push(name);
        }

        if names.is_empty() {
            return Err(column_error("no columns found".to_string()));
        }

        Ok(Self { names })
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

fn column_error(message: String) -> IngestError {
    IngestError::ConfigValidationError {
        field: "columns".to_string(),
        message,
    }
}

fn normalize_column_name(raw: &str) -> String {
    let trimmed = raw.trim_start_matches('\u{feff}').trim();
    let unquoted = trimmed
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
        .unwrap_or(trimmed);
    unquoted.trim().to_string()
}

/// The table/view pair a run loads into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetSchema {
    pub schema: String,
    pub table: String,
}

impl TargetSchema {
    pub fn new(schema: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            table: table.into(),
        }
    }

    pub fn view(&self) -> String {
        format!("{}_View", self.table)
    }
}

/// A normalized cell, ready to be bound as nullable text.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Null,
    Text(String),
    Number(f64),
}

impl CellValue {
    /// Text form sent to the database; numbers drop a zero fraction.
    pub fn to_sql_text(&self) -> Option<String> {
        match self {
            CellValue::Null => None,
            CellValue::Text(text) => Some(text.clone()),
            CellValue::Number(n) if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 => {
                Some(format!("{}", *n as i64))
            }
            CellValue::Number(n) => Some(n.to_string()),
        }
    }
}

pub type Row = Vec<CellValue>;

/// Rows read from one file. `columns` is set when the rows carry their own
/// column names (structured records); delimited rows are positional.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedRows {
    pub columns: Option<ColumnSet>,
    pub rows: Vec<Row>,
}

/// Per-file outcome of a load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadResult {
    pub file: PathBuf,
    pub strategy: &'static str,
    pub rows: u64,
    pub error: Option<String>,
}

impl LoadResult {
    pub fn loaded(file: impl Into<PathBuf>, strategy: &'static str, rows: u64) -> Self {
        Self {
            file: file.into(),
            strategy,
            rows,
            error: None,
        }
    }

    pub fn failed(file: impl Into<PathBuf>, strategy: &'static str, error: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            strategy,
            rows: 0,
            error: Some(error.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Aggregate of one run, handed to the notifier.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub started_at: DateTime<Utc>,
    pub elapsed: Duration,
    pub results: Vec<LoadResult>,
    pub skipped: usize,
}

impl RunOutcome {
    pub fn loaded_files(&self) -> usize {
        self.results.iter().filter(|r| r.is_success()).count()
    }

    pub fn failed_files(&self) -> usize {
        self.results.iter().filter(|r| !r.is_success()).count()
    }

    pub fn total_rows(&self) -> u64 {
        self.results.iter().map(|r| r.rows).sum()
    }
}

/// Run-scoped schema flag. `created == false` means a reset is pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchemaState {
    pub created: bool,
}

impl SchemaState {
    pub fn new(reset_table: bool) -> Self {
        Self {
            created: !reset_table,
        }
    }

    pub fn reset_pending(&self) -> bool {
        !self.created
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaAction {
    /// Table and view were recreated; carries the view's column order.
    Created { columns: Vec<String> },
    Unchanged,
}

/// What a staging clear removed and what it could not.
#[derive(Debug, Default)]
pub struct SweepReport {
    pub removed: Vec<PathBuf>,
    pub failures: Vec<(PathBuf, std::io::Error)>,
}

impl SweepReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pattern() -> FilePattern {
        FilePattern {
            prefix: "orders_".to_string(),
            suffix: "_daily".to_string(),
            extensions: vec!["csv".to_string(), "zip".to_string()],
            file_type: "csv".to_string(),
        }
    }

    #[test]
    fn test_object_store_filter_requires_prefix_and_extension() {
        let pattern = pattern();
        assert!(pattern.matches_object_store("orders_2024.csv"));
        assert!(pattern.matches_object_store("orders_2024.zip"));
        assert!(!pattern.matches_object_store("orders_2024.json"));
        assert!(!pattern.matches_object_store("returns_daily.csv"));
    }

    #[test]
    fn test_sftp_filter_accepts_prefix_or_suffix() {
        let pattern = pattern();
        // prefix alone is enough, whatever the extension
        assert!(pattern.matches_sftp("orders_notes.pdf"));
        // suffix + extension is enough without the prefix
        assert!(pattern.matches_sftp("returns_daily.csv"));
        assert!(pattern.matches_sftp("returns_daily.zip"));
        assert!(!pattern.matches_sftp("returns.csv"));
    }

    #[test]
    fn test_eligibility_uses_suffix_and_file_type() {
        let pattern = pattern();
        assert!(pattern.is_eligible("anything_daily.csv"));
        assert!(!pattern.is_eligible("anything.csv"));
        assert!(!pattern.is_eligible("anything_daily.zip"));

        let candidate = FileCandidate::from_path("/staging/x/anything_daily.csv", &pattern);
        assert!(candidate.matches_pattern);
        assert_eq!(candidate.extension.as_deref(), Some("csv"));
        assert_eq!(candidate.file_name, "anything_daily.csv");
    }

    #[test]
    fn test_column_set_normalizes_and_rejects_duplicates() {
        let columns = ColumnSet::new(["\u{feff}id", " \"amount\" ", "note"]).unwrap();
        assert_eq!(columns.names(), &["id", "amount", "note"]);

        assert!(ColumnSet::new(["id", "ID"]).is_err());
        assert!(ColumnSet::new(["id", ""]).is_err());
        assert!(ColumnSet::new(["recid"]).is_err());
        assert!(ColumnSet::new(Vec::<String>::new()).is_err());
    }

    #[test]
    fn test_number_cells_render_without_zero_fraction() {
        assert_eq!(CellValue::Number(-42.0).to_sql_text().as_deref(), Some("-42"));
        assert_eq!(CellValue::Number(-4.5).to_sql_text().as_deref(), Some("-4.5"));
        assert_eq!(CellValue::Null.to_sql_text(), None);
    }

    #[test]
    fn test_target_schema_view_name() {
        let target = TargetSchema::new("public", "orders");
        assert_eq!(target.view(), "orders_View");
    }
}
