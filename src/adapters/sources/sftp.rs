use crate::adapters::archive::extract_to;
use crate::adapters::staging::StagingArea;
use crate::domain::model::{is_archive_name, FileCandidate, FilePattern};
use crate::utils::error::{IngestError, Result};
use ssh2::{Session, Sftp};
use std::fs::File;
use std::net::TcpStream;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

#[derive(Clone)]
pub struct SftpSource {
    host: String,
    port: u16,
    username: String,
    password: String,
    remote_path: String,
}

// 不輸出密碼
impl std::fmt::Debug for SftpSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SftpSource")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("remote_path", &self.remote_path)
            .finish()
    }
}

/// Disconnects the session on every exit path.
struct SessionGuard(Session);

impl Drop for SessionGuard {
    fn drop(&mut self) {
        if let Err(e) = self.0.disconnect(None, "small-ingest done", None) {
            debug!("SFTP disconnect: {}", e);
        }
    }
}

impl SftpSource {
    pub fn new(
        host: impl Into<String>,
        port: u16,
        username: impl Into<String>,
        password: impl Into<String>,
        remote_path: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            username: username.into(),
            password: password.into(),
            remote_path: remote_path.into(),
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Runs the blocking session off the async workers and waits for it.
    pub async fn fetch(
        &self,
        staging: &StagingArea,
        pattern: &FilePattern,
    ) -> Result<Vec<FileCandidate>> {
        let source = self.clone();
        let destination = staging.root().to_path_buf();
        let pattern_owned = pattern.clone();

        let paths = tokio::task::spawn_blocking(move || {
            source.fetch_blocking(&destination, &pattern_owned)
        })
        .await
        .map_err(|e| IngestError::transport(&self.host, e))??;

        Ok(paths
            .into_iter()
            .map(|path| FileCandidate::from_path(path, pattern))
            .collect())
    }

    fn connect(&self) -> Result<SessionGuard> {
        let tcp = TcpStream::connect((self.host.as_str(), self.port))
            .map_err(|e| IngestError::transport(format!("{}:{}", self.host, self.port), e))?;

        let mut session = Session::new()?;
        session.set_tcp_stream(tcp);
        session.handshake()?;
        // 主機金鑰不做驗證
        session.userauth_password(&self.username, &self.password)?;
        if !session.authenticated() {
            return Err(IngestError::transport(
                &self.host,
                format!("authentication failed for user {}", self.username),
            ));
        }

        Ok(SessionGuard(session))
    }

    fn fetch_blocking(&self, destination: &Path, pattern: &FilePattern) -> Result<Vec<PathBuf>> {
        let guard = self.connect()?;
        let sftp = guard.0.sftp()?;
        info!("🔐 Connected to sftp://{}:{}{}", self.host, self.port, self.remote_path);

        let entries = sftp.readdir(Path::new(&self.remote_path))?;
        let mut fetched = Vec::new();

        for (remote, stat) in entries {
            if stat.is_dir() {
                continue;
            }
            let Some(file_name) = remote.file_name().map(|n| n.to_string_lossy().into_owned())
            else {
                continue;
            };
            if !pattern.matches_sftp(&file_name) {
                debug!("⏭️ Ignoring remote file {}", file_name);
                continue;
            }

            let local = destination.join(&file_name);
            if let Err(e) = download(&sftp, &remote, &local) {
                error!("❌ Download failed for {}: {}", remote.display(), e);
                continue;
            }
            info!("⬇️ Downloaded {}", remote.display());

            if is_archive_name(&file_name) {
                expand_beside(&local);
            }
            fetched.push(local);
        }

        Ok(fetched)
    }
}

fn download(sftp: &Sftp, remote: &Path, local: &Path) -> Result<()> {
    let mut remote_file = sftp.open(remote)?;
    let mut local_file = File::create(local)?;
    std::io::copy(&mut remote_file, &mut local_file)?;
    Ok(())
}

/// Containers are opened right away into `<dir>/<stem>/`.
fn expand_beside(container: &Path) {
    let (Some(parent), Some(stem)) = (container.parent(), container.file_stem()) else {
        return;
    };
    let target = parent.join(stem);
    match extract_to(container, &target) {
        Ok(()) => info!("📦 Extracted {} to {}", container.display(), target.display()),
        Err(e) => {
            warn!("⚠️ Could not extract {}: {}", container.display(), e);
            // 留下半成品目錄會讓之後的展開步驟誤判為已展開
            if target.is_dir() {
                if let Err(e) = std::fs::remove_dir_all(&target) {
                    warn!("⚠️ Could not remove {}: {}", target.display(), e);
                }
            }
        }
    }
}
