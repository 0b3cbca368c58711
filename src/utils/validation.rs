use crate::utils::error::{IngestError, Result};
use url::Url;

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

fn invalid(field_name: &str, value: impl Into<String>, reason: impl Into<String>) -> IngestError {
    IngestError::InvalidConfigValueError {
        field: field_name.to_string(),
        value: value.into(),
        reason: reason.into(),
    }
}

pub fn validate_url(field_name: &str, url_str: &str) -> Result<()> {
    if url_str.is_empty() {
        return Err(invalid(field_name, url_str, "URL cannot be empty"));
    }

    match Url::parse(url_str) {
        Ok(url) => match url.scheme() {
            "http" | "https" => Ok(()),
            scheme => Err(invalid(
                field_name,
                url_str,
                format!("Unsupported URL scheme: {}", scheme),
            )),
        },
        Err(e) => Err(invalid(
            field_name,
            url_str,
            format!("Invalid URL format: {}", e),
        )),
    }
}

pub fn validate_path(field_name: &str, path: &str) -> Result<()> {
    if path.is_empty() {
        return Err(invalid(field_name, path, "Path cannot be empty"));
    }

    if path.contains('\0') {
        return Err(invalid(field_name, path, "Path contains null bytes"));
    }

    Ok(())
}

pub fn validate_positive_number(field_name: &str, value: usize, min_value: usize) -> Result<()> {
    if value < min_value {
        return Err(invalid(
            field_name,
            value.to_string(),
            format!("Value must be at least {}", min_value),
        ));
    }
    Ok(())
}

/// Extensions are compared without the leading dot, e.g. `csv` not `.csv`.
pub fn validate_extension_list(field_name: &str, extensions: &[String]) -> Result<()> {
    if extensions.is_empty() {
        return Err(invalid(field_name, "[]", "At least one extension is required"));
    }

    for extension in extensions {
        if extension.trim().is_empty() {
            return Err(invalid(field_name, extension.clone(), "Extension cannot be empty"));
        }
        if extension.contains('.') || extension.contains('/') {
            return Err(invalid(
                field_name,
                extension.clone(),
                "Extension must not contain '.' or '/' (write 'csv', not '.csv')",
            ));
        }
    }

    Ok(())
}

pub fn validate_non_empty_string(field_name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(invalid(
            field_name,
            value,
            "Value cannot be empty or whitespace-only",
        ));
    }
    Ok(())
}

/// Table and schema names are interpolated into DDL, so only plain
/// identifiers are accepted.
pub fn validate_identifier(field_name: &str, value: &str) -> Result<()> {
    validate_non_empty_string(field_name, value)?;

    let mut chars = value.chars();
    let starts_ok = chars
        .next()
        .map(|c| c.is_ascii_alphabetic() || c == '_')
        .unwrap_or(false);
    if !starts_ok || !value.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(invalid(
            field_name,
            value,
            "Identifier may only contain letters, digits and '_' and must not start with a digit",
        ));
    }

    // PostgreSQL truncates identifiers at 63 bytes; leave room for the "_View" suffix.
    if value.len() > 58 {
        return Err(invalid(field_name, value, "Identifier is longer than 58 characters"));
    }

    Ok(())
}

pub fn validate_range<T: PartialOrd + std::fmt::Display + Copy>(
    field_name: &str,
    value: T,
    min: T,
    max: T,
) -> Result<()> {
    if value < min || value > max {
        return Err(invalid(
            field_name,
            value.to_string(),
            format!("Value must be between {} and {}", min, max),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_url() {
        assert!(validate_url("source.endpoint", "https://example.com").is_ok());
        assert!(validate_url("source.endpoint", "http://localhost:9000").is_ok());
        assert!(validate_url("source.endpoint", "").is_err());
        assert!(validate_url("source.endpoint", "invalid-url").is_err());
        assert!(validate_url("source.endpoint", "ftp://example.com").is_err());
    }

    #[test]
    fn test_validate_positive_number() {
        assert!(validate_positive_number("load.batch_commit_size", 5, 1).is_ok());
        assert!(validate_positive_number("load.batch_commit_size", 0, 1).is_err());
    }

    #[test]
    fn test_validate_extension_list() {
        let extensions = vec!["csv".to_string(), "zip".to_string()];
        assert!(validate_extension_list("files.extensions", &extensions).is_ok());

        let dotted = vec![".csv".to_string()];
        assert!(validate_extension_list("files.extensions", &dotted).is_err());
        assert!(validate_extension_list("files.extensions", &[]).is_err());
    }

    #[test]
    fn test_validate_identifier() {
        assert!(validate_identifier("database.table", "daily_orders").is_ok());
        assert!(validate_identifier("database.table", "_staging2").is_ok());
        assert!(validate_identifier("database.table", "2024_orders").is_err());
        assert!(validate_identifier("database.table", "orders; DROP TABLE x").is_err());
        assert!(validate_identifier("database.table", "").is_err());
    }

    #[test]
    fn test_validate_range() {
        assert!(validate_range("source.port", 22u16, 1, 65535).is_ok());
        assert!(validate_range("source.port", 0u16, 1, 65535).is_err());
    }
}
