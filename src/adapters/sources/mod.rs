pub mod local;
pub mod object_store;
pub mod sftp;
pub mod url;

pub use local::LocalSource;
pub use object_store::ObjectStoreSource;
pub use sftp::SftpSource;
pub use self::url::UrlSource;

use crate::adapters::staging::StagingArea;
use crate::config::{IngestConfig, SourceKind};
use crate::domain::model::{FileCandidate, FilePattern};
use crate::domain::ports::SecretProvider;
use crate::utils::error::{IngestError, Result};
use std::path::PathBuf;

/// Where the raw files come from. Chosen once at startup.
#[derive(Debug, Clone)]
pub enum SourceConnector {
    Local(LocalSource),
    Url(UrlSource),
    ObjectStore(ObjectStoreSource),
    Sftp(SftpSource),
}

impl SourceConnector {
    pub async fn from_config(config: &IngestConfig, secrets: &dyn SecretProvider) -> Result<Self> {
        let source = &config.source;
        let missing = |field: &str| IngestError::MissingConfigError {
            field: field.to_string(),
        };

        let connector = match source.kind {
            SourceKind::Local => {
                let folder = source.folder.clone().ok_or_else(|| missing("source.folder"))?;
                SourceConnector::Local(LocalSource::new(folder))
            }
            SourceKind::Url => {
                SourceConnector::Url(UrlSource::new(source.urls.clone().unwrap_or_default()))
            }
            SourceKind::S3 => {
                let bucket = source.bucket.clone().ok_or_else(|| missing("source.bucket"))?;
                SourceConnector::ObjectStore(
                    ObjectStoreSource::connect(
                        bucket,
                        source.prefix.clone(),
                        source.region.clone(),
                        source.endpoint.clone(),
                    )
                    .await,
                )
            }
            SourceKind::Sftp => {
                let host = source.host.clone().ok_or_else(|| missing("source.host"))?;
                let username = source
                    .username
                    .clone()
                    .ok_or_else(|| missing("source.username"))?;
                let remote_path = source
                    .remote_path
                    .clone()
                    .ok_or_else(|| missing("source.remote_path"))?;
                let password = secrets.secret(config.sftp_password_secret())?;
                SourceConnector::Sftp(SftpSource::new(
                    host,
                    config.sftp_port(),
                    username,
                    password,
                    remote_path,
                ))
            }
        };

        Ok(connector)
    }

    pub fn name(&self) -> &'static str {
        match self {
            SourceConnector::Local(_) => "local",
            SourceConnector::Url(_) => "url",
            SourceConnector::ObjectStore(_) => "s3",
            SourceConnector::Sftp(_) => "sftp",
        }
    }

    /// Brings raw files into the staging area and returns what arrived.
    pub async fn fetch(
        &self,
        staging: &StagingArea,
        pattern: &FilePattern,
    ) -> Result<Vec<FileCandidate>> {
        match self {
            SourceConnector::Local(source) => source.fetch(pattern),
            SourceConnector::Url(source) => source.fetch(staging, pattern).await,
            SourceConnector::ObjectStore(source) => source.fetch(staging, pattern).await,
            SourceConnector::Sftp(source) => source.fetch(staging, pattern).await,
        }
    }

    /// Directory the pipeline walks after fetching.
    pub fn landing_dir(&self, staging: &StagingArea) -> PathBuf {
        match self {
            SourceConnector::Local(source) => source.folder().to_path_buf(),
            _ => staging.root().to_path_buf(),
        }
    }
}
