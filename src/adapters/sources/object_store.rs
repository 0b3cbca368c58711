use crate::adapters::staging::StagingArea;
use crate::domain::model::{FileCandidate, FilePattern};
use crate::utils::error::{IngestError, Result};
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::Client as S3Client;
use std::path::PathBuf;
use tracing::{debug, error, info};

/// S3 (or S3-compatible) bucket listing under a prefix.
#[derive(Debug, Clone)]
pub struct ObjectStoreSource {
    client: S3Client,
    bucket: String,
    prefix: Option<String>,
}

impl ObjectStoreSource {
    pub fn new(client: S3Client, bucket: impl Into<String>, prefix: Option<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
            prefix,
        }
    }

    /// Credentials come from the default AWS chain. A custom endpoint
    /// switches to path-style addressing.
    pub async fn connect(
        bucket: impl Into<String>,
        prefix: Option<String>,
        region: Option<String>,
        endpoint: Option<String>,
    ) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = region {
            loader = loader.region(Region::new(region));
        }
        let shared = loader.load().await;

        let mut builder = aws_sdk_s3::config::Builder::from(&shared);
        if let Some(endpoint) = endpoint {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        Self::new(S3Client::from_conf(builder.build()), bucket, prefix)
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub async fn fetch(
        &self,
        staging: &StagingArea,
        pattern: &FilePattern,
    ) -> Result<Vec<FileCandidate>> {
        let mut fetched = Vec::new();
        let mut pages = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .set_prefix(self.prefix.clone())
            .into_paginator()
            .send();

        while let Some(page) = pages.next().await {
            let page = match page {
                Ok(page) => page,
                Err(e) => {
                    error!("❌ Listing s3://{} failed: {}", self.bucket, e);
                    break;
                }
            };

            for object in page.contents() {
                let Some(key) = object.key() else { continue };
                let Some(file_name) = object_file_name(key) else {
                    continue;
                };
                if !pattern.matches_object_store(file_name) {
                    debug!("⏭️ Ignoring s3://{}/{}", self.bucket, key);
                    continue;
                }

                match self.download(key, staging.root().join(file_name)).await {
                    Ok(path) => {
                        info!("⬇️ Downloaded s3://{}/{}", self.bucket, key);
                        fetched.push(FileCandidate::from_path(path, pattern));
                    }
                    Err(e) => error!("❌ Download failed for s3://{}/{}: {}", self.bucket, key, e),
                }
            }
        }

        Ok(fetched)
    }

    async fn download(&self, key: &str, destination: PathBuf) -> Result<PathBuf> {
        let target = format!("s3://{}/{}", self.bucket, key);
        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| IngestError::transport(&target, e))?;

        let data = response
            .body
            .collect()
            .await
            .map_err(|e| IngestError::transport(&target, e))?
            .into_bytes();

        tokio::fs::write(&destination, &data).await?;
        Ok(destination)
    }
}

/// Last key segment; `None` for "directory" keys ending in `/`.
pub fn object_file_name(key: &str) -> Option<&str> {
    if key.is_empty() || key.ends_with('/') {
        return None;
    }
    key.rsplit('/').next()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_file_name() {
        assert_eq!(object_file_name("inbound/2024/orders_1.csv"), Some("orders_1.csv"));
        assert_eq!(object_file_name("orders_1.csv"), Some("orders_1.csv"));
        assert_eq!(object_file_name("inbound/2024/"), None);
    }
}
