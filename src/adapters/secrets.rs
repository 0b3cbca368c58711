use crate::domain::ports::SecretProvider;
use crate::utils::error::{IngestError, Result};

/// Resolves logical secret names from environment variables:
/// `sql_password` becomes `SQL_PASSWORD`, or `<PREFIX>_SQL_PASSWORD`.
#[derive(Debug, Clone, Default)]
pub struct EnvSecretProvider {
    prefix: Option<String>,
}

impl EnvSecretProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: Some(prefix.into()),
        }
    }

    pub fn variable_name(&self, name: &str) -> String {
        let base = name.trim().replace(['-', '.', '/'], "_").to_uppercase();
        match &self.prefix {
            Some(prefix) => format!("{}_{}", prefix.to_uppercase(), base),
            None => base,
        }
    }
}

impl SecretProvider for EnvSecretProvider {
    fn secret(&self, name: &str) -> Result<String> {
        let variable = self.variable_name(name);
        std::env::var(&variable).map_err(|e| IngestError::SecretError {
            name: name.to_string(),
            message: format!("{} ({})", e, variable),
        })
    }
}
