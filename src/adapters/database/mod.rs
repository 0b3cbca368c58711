pub mod postgres;
pub mod sql;

use crate::config::IngestConfig;
use crate::domain::ports::SecretProvider;
use crate::utils::error::Result;

pub use postgres::PgWarehouse;

/// Resolved connection parameters, shared by the driver and the psql utility.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionSettings {
    pub host: String,
    pub port: u16,
    pub database: String,
    /// `None` means the ambient trusted context (no user, no password).
    pub credentials: Option<(String, String)>,
}

impl ConnectionSettings {
    pub fn from_config(config: &IngestConfig, secrets: &dyn SecretProvider) -> Result<Self> {
        let credentials = match config.database_user() {
            Some(user) => {
                let password = secrets.secret(config.database_password_secret())?;
                Some((user.to_string(), password))
            }
            None => None,
        };

        Ok(Self {
            host: config.database.host.clone(),
            port: config.database_port(),
            database: config.database.database.clone(),
            credentials,
        })
    }
}

// 避免密碼出現在日誌
impl std::fmt::Debug for ConnectionSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.credentials.as_ref().map(|(user, _)| user))
            .finish()
    }
}
