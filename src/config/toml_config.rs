use crate::domain::model::{FilePattern, TargetSchema};
use crate::utils::error::{IngestError, Result};
use crate::utils::validation::{self, Validate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    pub pipeline: PipelineSection,
    pub source: SourceSection,
    pub staging: StagingSection,
    pub files: FilesSection,
    pub database: DatabaseSection,
    pub load: LoadSection,
    pub notification: Option<NotificationSection>,
    pub logging: Option<LoggingSection>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSection {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Local,
    Url,
    S3,
    Sftp,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceSection {
    pub kind: SourceKind,
    /// local: 已存在檔案的資料夾
    pub folder: Option<String>,
    /// url: 逐一下載
    pub urls: Option<Vec<String>>,
    /// s3
    pub bucket: Option<String>,
    pub prefix: Option<String>,
    pub region: Option<String>,
    pub endpoint: Option<String>,
    /// sftp
    pub host: Option<String>,
    pub port: Option<u16>,
    pub username: Option<String>,
    pub password_secret: Option<String>,
    pub remote_path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StagingSection {
    pub download_path: String,
    pub archive_path: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FileKind {
    Delimited,
    Structured,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilesSection {
    pub file_type: String,
    pub kind: Option<FileKind>,
    pub prefix: Option<String>,
    pub suffix: Option<String>,
    pub extensions: Option<Vec<String>>,
    pub delimiter: Option<String>,
    pub has_header: Option<bool>,
    pub column_names: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSection {
    pub host: String,
    pub port: Option<u16>,
    pub database: String,
    pub user: Option<String>,
    pub password_secret: Option<String>,
    pub schema: Option<String>,
    pub table: String,
    pub reset_table: Option<bool>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LoadStrategyKind {
    BulkUtility,
    NativeBulk,
    RowBuffer,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadSection {
    pub strategy: LoadStrategyKind,
    pub row_start: Option<usize>,
    pub batch_commit_size: Option<usize>,
    pub row_terminator: Option<String>,
    pub utility_program: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationSection {
    pub subject_prefix: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSection {
    pub level: Option<String>,
    pub format: Option<LogFormat>,
    pub file: Option<String>,
}

const DELIMITED_FILE_TYPES: &[&str] = &["csv", "txt", "tsv"];
const STRUCTURED_FILE_TYPES: &[&str] = &["json"];

impl IngestConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| IngestError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${SFTP_HOST})，未設定的變數保持原樣
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| IngestError::ConfigError {
            message: format!("Invalid substitution pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    /// 檔案種類：明確設定優先，否則由 file_type 推斷
    pub fn file_kind(&self) -> Result<FileKind> {
        if let Some(kind) = self.files.kind {
            return Ok(kind);
        }

        let file_type = self.files.file_type.to_ascii_lowercase();
        if DELIMITED_FILE_TYPES.contains(&file_type.as_str()) {
            Ok(FileKind::Delimited)
        } else if STRUCTURED_FILE_TYPES.contains(&file_type.as_str()) {
            Ok(FileKind::Structured)
        } else {
            Err(IngestError::InvalidConfigValueError {
                field: "files.file_type".to_string(),
                value: self.files.file_type.clone(),
                reason: format!(
                    "Unknown file type. Use one of {} or set files.kind",
                    [DELIMITED_FILE_TYPES, STRUCTURED_FILE_TYPES].concat().join(", ")
                ),
            })
        }
    }

    /// 分隔字元：去除引號，`\t` 代表 tab，必須是單一位元組
    pub fn delimiter(&self) -> Result<u8> {
        let raw = self.files.delimiter.as_deref().unwrap_or(",");
        parse_delimiter(raw).ok_or_else(|| IngestError::InvalidConfigValueError {
            field: "files.delimiter".to_string(),
            value: raw.to_string(),
            reason: "Delimiter must be a single byte character (\\t allowed)".to_string(),
        })
    }

    pub fn has_header(&self) -> bool {
        self.files.has_header.unwrap_or(true)
    }

    pub fn column_names(&self) -> Option<&[String]> {
        self.files.column_names.as_deref()
    }

    pub fn file_pattern(&self) -> FilePattern {
        let file_type = self.files.file_type.clone();
        FilePattern {
            prefix: self.files.prefix.clone().unwrap_or_default(),
            suffix: self.files.suffix.clone().unwrap_or_default(),
            extensions: self
                .files
                .extensions
                .clone()
                .unwrap_or_else(|| vec![file_type.clone(), "zip".to_string()]),
            file_type,
        }
    }

    pub fn target(&self) -> TargetSchema {
        TargetSchema::new(
            self.database.schema.as_deref().unwrap_or("public"),
            self.database.table.as_str(),
        )
    }

    pub fn database_port(&self) -> u16 {
        self.database.port.unwrap_or(5432)
    }

    /// 空白使用者代表信任連線（不帶帳密）
    pub fn database_user(&self) -> Option<&str> {
        self.database
            .user
            .as_deref()
            .map(str::trim)
            .filter(|user| !user.is_empty())
    }

    pub fn database_password_secret(&self) -> &str {
        self.database
            .password_secret
            .as_deref()
            .unwrap_or("sql_password")
    }

    pub fn reset_table(&self) -> bool {
        self.database.reset_table.unwrap_or(true)
    }

    pub fn row_start(&self) -> usize {
        self.load.row_start.unwrap_or(2)
    }

    pub fn batch_commit_size(&self) -> usize {
        self.load.batch_commit_size.unwrap_or(1000)
    }

    pub fn row_terminator(&self) -> String {
        match self.load.row_terminator.as_deref() {
            None => "\n".to_string(),
            Some(raw) => raw.replace("\\r", "\r").replace("\\n", "\n"),
        }
    }

    pub fn utility_program(&self) -> &str {
        self.load.utility_program.as_deref().unwrap_or("psql")
    }

    pub fn sftp_port(&self) -> u16 {
        self.source.port.unwrap_or(22)
    }

    pub fn sftp_password_secret(&self) -> &str {
        self.source
            .password_secret
            .as_deref()
            .unwrap_or("sftp_password")
    }

    pub fn download_path(&self) -> PathBuf {
        PathBuf::from(&self.staging.download_path)
    }

    pub fn archive_path(&self) -> PathBuf {
        PathBuf::from(&self.staging.archive_path)
    }

    pub fn subject_prefix(&self) -> Option<&str> {
        self.notification
            .as_ref()
            .and_then(|n| n.subject_prefix.as_deref())
    }

    pub fn log_level(&self) -> Option<&str> {
        self.logging.as_ref().and_then(|l| l.level.as_deref())
    }

    pub fn json_logs(&self) -> bool {
        self.logging
            .as_ref()
            .and_then(|l| l.format)
            .map(|f| f == LogFormat::Json)
            .unwrap_or(false)
    }

    pub fn log_file(&self) -> Option<&Path> {
        self.logging
            .as_ref()
            .and_then(|l| l.file.as_deref())
            .map(Path::new)
    }

    fn require<'a>(field: &str, value: Option<&'a str>) -> Result<&'a str> {
        match value {
            Some(v) if !v.trim().is_empty() => Ok(v),
            _ => Err(IngestError::MissingConfigError {
                field: field.to_string(),
            }),
        }
    }

    fn validate_source(&self) -> Result<()> {
        match self.source.kind {
            SourceKind::Local => {
                let folder = Self::require("source.folder", self.source.folder.as_deref())?;
                validation::validate_path("source.folder", folder)?;
            }
            SourceKind::Url => {
                let urls = self.source.urls.as_deref().unwrap_or_default();
                if urls.is_empty() {
                    return Err(IngestError::MissingConfigError {
                        field: "source.urls".to_string(),
                    });
                }
                // 個別網址格式錯誤於下載時略過，這裡只檢查清單不為空
            }
            SourceKind::S3 => {
                Self::require("source.bucket", self.source.bucket.as_deref())?;
                if let Some(endpoint) = &self.source.endpoint {
                    validation::validate_url("source.endpoint", endpoint)?;
                }
            }
            SourceKind::Sftp => {
                Self::require("source.host", self.source.host.as_deref())?;
                Self::require("source.username", self.source.username.as_deref())?;
                Self::require("source.remote_path", self.source.remote_path.as_deref())?;
                validation::validate_range("source.port", self.sftp_port(), 1, u16::MAX)?;
            }
        }
        Ok(())
    }

    /// 驗證配置的合理性
    pub fn validate_config(&self) -> Result<()> {
        validation::validate_non_empty_string("pipeline.name", &self.pipeline.name)?;
        self.validate_source()?;

        validation::validate_path("staging.download_path", &self.staging.download_path)?;
        validation::validate_path("staging.archive_path", &self.staging.archive_path)?;
        self.validate_directory_layout()?;

        let kind = self.file_kind()?;
        self.delimiter()?;
        validation::validate_extension_list("files.extensions", &self.file_pattern().extensions)?;
        if kind == FileKind::Delimited && !self.has_header() && self.column_names().is_none() {
            return Err(IngestError::ConfigValidationError {
                field: "files.column_names".to_string(),
                message: "column_names is required when has_header = false".to_string(),
            });
        }

        validation::validate_non_empty_string("database.host", &self.database.host)?;
        validation::validate_range("database.port", self.database_port(), 1, u16::MAX)?;
        validation::validate_non_empty_string("database.database", &self.database.database)?;
        validation::validate_identifier("database.table", &self.database.table)?;
        validation::validate_identifier("database.schema", &self.target().schema)?;

        validation::validate_positive_number("load.batch_commit_size", self.batch_commit_size(), 1)?;
        validation::validate_positive_number("load.row_start", self.row_start(), 1)?;
        if self.load.strategy == LoadStrategyKind::NativeBulk {
            // COPY 只能略過一行標題
            validation::validate_range("load.row_start", self.row_start(), 1, 2)?;
        }
        if self.load.strategy != LoadStrategyKind::RowBuffer {
            let terminator = self.row_terminator();
            if terminator != "\n" && terminator != "\r\n" {
                return Err(IngestError::InvalidConfigValueError {
                    field: "load.row_terminator".to_string(),
                    value: terminator.escape_debug().to_string(),
                    reason: "COPY only understands \\n or \\r\\n line endings".to_string(),
                });
            }
            validation::validate_non_empty_string("load.utility_program", self.utility_program())?;
        }

        Ok(())
    }
}

impl IngestConfig {
    /// 暫存區每次執行前後都會清空，封存區與本機來源不可位於其中
    fn validate_directory_layout(&self) -> Result<()> {
        let staging = resolve_path(&self.download_path());

        if resolve_path(&self.archive_path()).starts_with(&staging) {
            return Err(IngestError::ConfigValidationError {
                field: "staging.archive_path".to_string(),
                message: format!(
                    "archive directory must not be inside the staging directory {}",
                    staging.display()
                ),
            });
        }

        if self.source.kind == SourceKind::Local {
            if let Some(folder) = &self.source.folder {
                if resolve_path(Path::new(folder)).starts_with(&staging) {
                    return Err(IngestError::ConfigValidationError {
                        field: "source.folder".to_string(),
                        message: format!(
                            "local folder must not be inside the staging directory {}",
                            staging.display()
                        ),
                    });
                }
            }
        }

        Ok(())
    }
}

/// Absolute, `.`/`..`-free form of `path`, with symlinks resolved for the
/// part of it that already exists.
fn resolve_path(path: &Path) -> PathBuf {
    let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    let mut normalized = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other),
        }
    }

    let mut missing = Vec::new();
    let mut existing = normalized.as_path();
    loop {
        if let Ok(canonical) = existing.canonicalize() {
            return missing
                .iter()
                .rev()
                .fold(canonical, |acc: PathBuf, part| acc.join(part));
        }
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                missing.push(name.to_os_string());
                existing = parent;
            }
            _ => return normalized.clone(),
        }
    }
}

fn parse_delimiter(raw: &str) -> Option<u8> {
    let trimmed = raw
        .strip_prefix('"')
        .and_then(|r| r.strip_suffix('"'))
        .or_else(|| raw.strip_prefix('\'').and_then(|r| r.strip_suffix('\'')))
        .unwrap_or(raw);

    match trimmed {
        "\\t" | "\t" => Some(b'\t'),
        other if other.len() == 1 => other.bytes().next(),
        _ => None,
    }
}

impl Validate for IngestConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}
