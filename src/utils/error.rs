use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Zip operation failed: {0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Directory traversal failed: {0}")]
    WalkError(#[from] walkdir::Error),

    #[error("JSON error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("SFTP error: {0}")]
    SftpError(#[from] ssh2::Error),

    #[error("Transport error for {target}: {message}")]
    TransportError { target: String, message: String },

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Configuration validation failed for '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration '{field}'")]
    MissingConfigError { field: String },

    #[error("Format error in {}: {message}", .path.display())]
    FormatError { path: PathBuf, message: String },

    #[error("Schema error for table {table}: {message}")]
    SchemaError { table: String, message: String },

    #[error("Load error: {message}")]
    LoadError { message: String },

    #[error("Secret '{name}' unavailable: {message}")]
    SecretError { name: String, message: String },

    #[error("Notification failed: {message}")]
    NotificationError { message: String },
}

pub type Result<T> = std::result::Result<T, IngestError>;

/// Where in the run an error belongs. Drives how far it is allowed to propagate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Transport,
    Format,
    Load,
    /// Local directories (staging, landing, archive) unusable.
    Storage,
    /// Only ever logged: notification delivery and similar chores.
    Housekeeping,
    Configuration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl ErrorSeverity {
    /// Process exit status for a run that ended with this severity.
    pub fn exit_code(self) -> i32 {
        match self {
            ErrorSeverity::Low => 0,      // 警告，但成功
            ErrorSeverity::Medium => 2,   // 來源錯誤，可重試
            ErrorSeverity::High => 1,     // 處理錯誤
            ErrorSeverity::Critical => 3, // 配置錯誤
        }
    }
}

impl IngestError {
    pub fn format(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        IngestError::FormatError {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn transport(target: impl Into<String>, message: impl std::fmt::Display) -> Self {
        IngestError::TransportError {
            target: target.into(),
            message: message.to_string(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            IngestError::HttpError(_)
            | IngestError::SftpError(_)
            | IngestError::TransportError { .. } => ErrorCategory::Transport,
            IngestError::ZipError(_)
            | IngestError::CsvError(_)
            | IngestError::SerializationError(_)
            | IngestError::FormatError { .. } => ErrorCategory::Format,
            IngestError::DatabaseError(_)
            | IngestError::SchemaError { .. }
            | IngestError::LoadError { .. } => ErrorCategory::Load,
            IngestError::IoError(_) | IngestError::WalkError(_) => ErrorCategory::Storage,
            IngestError::NotificationError { .. } => ErrorCategory::Housekeeping,
            IngestError::ConfigError { .. }
            | IngestError::ConfigValidationError { .. }
            | IngestError::InvalidConfigValueError { .. }
            | IngestError::MissingConfigError { .. }
            | IngestError::SecretError { .. } => ErrorCategory::Configuration,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Housekeeping => ErrorSeverity::Low,
            ErrorCategory::Transport => ErrorSeverity::Medium,
            ErrorCategory::Format | ErrorCategory::Load | ErrorCategory::Storage => {
                ErrorSeverity::High
            }
            ErrorCategory::Configuration => ErrorSeverity::Critical,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            IngestError::TransportError { .. } | IngestError::HttpError(_) => {
                "Check network connectivity and the source location, then re-run"
            }
            IngestError::SftpError(_) => {
                "Verify the SFTP host, port, credentials and remote path"
            }
            IngestError::DatabaseError(_) => {
                "Verify the database connection settings and that the server is reachable"
            }
            IngestError::SchemaError { .. } => {
                "Check that the header row is valid and the database user may create tables and views"
            }
            IngestError::FormatError { .. }
            | IngestError::CsvError(_)
            | IngestError::SerializationError(_) => {
                "Inspect the file: delimiter, header flag and file type must match the configuration"
            }
            IngestError::ZipError(_) => "The archive is corrupt or unsupported; re-fetch it",
            IngestError::LoadError { .. } => {
                "Check the load strategy settings (row_start, delimiter, utility program)"
            }
            IngestError::SecretError { .. } => {
                "Export the secret as an environment variable or fix its logical name"
            }
            IngestError::ConfigError { .. }
            | IngestError::ConfigValidationError { .. }
            | IngestError::InvalidConfigValueError { .. }
            | IngestError::MissingConfigError { .. } => {
                "Fix the configuration file and run again (use --dry-run to check it)"
            }
            IngestError::IoError(_) | IngestError::WalkError(_) => {
                "Check permissions on the staging and archive directories"
            }
            IngestError::NotificationError { .. } => "Check the notification channel settings",
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Configuration => format!("Configuration problem: {}", self),
            ErrorCategory::Transport => format!("Could not fetch source files: {}", self),
            ErrorCategory::Format => format!("A source file could not be read: {}", self),
            ErrorCategory::Load => format!("Loading into the database failed: {}", self),
            ErrorCategory::Storage => format!("A local directory could not be used: {}", self),
            ErrorCategory::Housekeeping => format!("Housekeeping failed: {}", self),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_follows_taxonomy() {
        let transport = IngestError::transport("https://example.com/a.csv", "connection refused");
        assert_eq!(transport.category(), ErrorCategory::Transport);

        let format = IngestError::format("/tmp/a.csv", "empty header");
        assert_eq!(format.category(), ErrorCategory::Format);
        assert_eq!(format.severity(), ErrorSeverity::High);

        let schema = IngestError::SchemaError {
            table: "orders".to_string(),
            message: "permission denied".to_string(),
        };
        assert_eq!(schema.category(), ErrorCategory::Load);

        let io = IngestError::IoError(std::io::Error::new(std::io::ErrorKind::Other, "busy"));
        assert_eq!(io.category(), ErrorCategory::Storage);
        assert_eq!(io.severity(), ErrorSeverity::High);

        let notify = IngestError::NotificationError {
            message: "smtp down".to_string(),
        };
        assert_eq!(notify.severity(), ErrorSeverity::Low);

        let missing = IngestError::MissingConfigError {
            field: "database.table".to_string(),
        };
        assert_eq!(missing.severity(), ErrorSeverity::Critical);
    }

    #[test]
    fn test_only_low_severity_exits_zero() {
        assert_eq!(ErrorSeverity::Low.exit_code(), 0);
        assert_eq!(ErrorSeverity::Medium.exit_code(), 2);
        assert_eq!(ErrorSeverity::High.exit_code(), 1);
        assert_eq!(ErrorSeverity::Critical.exit_code(), 3);

        let io = IngestError::IoError(std::io::Error::new(std::io::ErrorKind::AlreadyExists, "staging"));
        assert_ne!(io.severity().exit_code(), 0);
    }

    #[test]
    fn test_user_friendly_message_mentions_cause() {
        let err = IngestError::format("/data/orders.csv", "no header row");
        let message = err.user_friendly_message();
        assert!(message.contains("/data/orders.csv"));
        assert!(message.contains("no header row"));
    }
}
