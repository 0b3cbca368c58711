use crate::adapters::staging::StagingArea;
use crate::domain::model::{FileCandidate, FilePattern};
use crate::utils::error::{IngestError, Result};
use reqwest::Client;
use std::path::PathBuf;
use tracing::{debug, error, info, warn};
use url::Url;

const FALLBACK_FILE_NAME: &str = "download";

/// One GET per configured URL. A bad URL only costs that URL.
#[derive(Debug, Clone)]
pub struct UrlSource {
    urls: Vec<String>,
    client: Client,
}

impl UrlSource {
    pub fn new(urls: Vec<String>) -> Self {
        Self {
            urls,
            client: Client::new(),
        }
    }

    pub fn urls(&self) -> &[String] {
        &self.urls
    }

    pub async fn fetch(
        &self,
        staging: &StagingArea,
        pattern: &FilePattern,
    ) -> Result<Vec<FileCandidate>> {
        let mut fetched = Vec::new();

        for raw in &self.urls {
            let url = match parse_download_url(raw) {
                Some(url) => url,
                None => {
                    warn!("⚠️ Skipping malformed URL: {}", raw);
                    continue;
                }
            };

            match self.download(&url, staging).await {
                Ok(path) => {
                    info!("⬇️ Downloaded {} to {}", url, path.display());
                    fetched.push(FileCandidate::from_path(path, pattern));
                }
                Err(e) => error!("❌ Download failed for {}: {}", url, e),
            }
        }

        Ok(fetched)
    }

    async fn download(&self, url: &Url, staging: &StagingArea) -> Result<PathBuf> {
        debug!("🌐 GET {}", url);
        let response = self.client.get(url.clone()).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(IngestError::transport(url.as_str(), format!("HTTP status {}", status)));
        }

        let bytes = response.bytes().await?;
        let destination = staging.root().join(file_name_for(url));
        tokio::fs::write(&destination, &bytes).await?;
        Ok(destination)
    }
}

fn parse_download_url(raw: &str) -> Option<Url> {
    Url::parse(raw.trim())
        .ok()
        .filter(|url| matches!(url.scheme(), "http" | "https"))
}

/// Last non-empty path segment, or a fixed fallback.
pub fn file_name_for(url: &Url) -> String {
    url.path_segments()
        .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
        .map(|segment| segment.to_string())
        .unwrap_or_else(|| FALLBACK_FILE_NAME.to_string())
}
