use crate::domain::model::CellValue;
use thiserror::Error;

/// Cell markers that load as SQL NULL.
const NULL_MARKERS: &[&str] = &["-", "<NA>", ""];

#[derive(Debug, Error, PartialEq, Eq)]
#[error("'{0}' is wrapped in parentheses but is not a number")]
pub struct CellError(pub String);

/// Accounting-style cleanup of one delimited cell.
///
/// Surrounding whitespace and one layer of double quotes go first. Then
/// `(12.5)` becomes `-12.5`, the null markers become NULL and anything
/// else is kept as text.
pub fn normalize_cell(raw: &str) -> Result<CellValue, CellError> {
    let trimmed = raw.trim();
    let value = trimmed
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
        .unwrap_or(trimmed);

    if let Some(inner) = value.strip_prefix('(').and_then(|rest| rest.strip_suffix(')')) {
        return inner
            .trim()
            .parse::<f64>()
            .map(|n| CellValue::Number(-n))
            .map_err(|_| CellError(value.to_string()));
    }

    if NULL_MARKERS.contains(&value) {
        return Ok(CellValue::Null);
    }

    Ok(CellValue::Text(value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parentheses_become_negative_numbers() {
        assert_eq!(normalize_cell("(42)"), Ok(CellValue::Number(-42.0)));
        assert_eq!(normalize_cell("\"(3.5)\""), Ok(CellValue::Number(-3.5)));
        assert_eq!(
            normalize_cell("(42)").unwrap().to_sql_text().as_deref(),
            Some("-42")
        );
    }

    #[test]
    fn test_null_markers() {
        assert_eq!(normalize_cell("-"), Ok(CellValue::Null));
        assert_eq!(normalize_cell("<NA>"), Ok(CellValue::Null));
        assert_eq!(normalize_cell("   "), Ok(CellValue::Null));
        assert_eq!(normalize_cell("\"-\""), Ok(CellValue::Null));
    }

    #[test]
    fn test_whitespace_and_one_quote_layer_are_stripped() {
        assert_eq!(
            normalize_cell("  \"abc\"  "),
            Ok(CellValue::Text("abc".to_string()))
        );
        assert_eq!(
            normalize_cell("\"\"abc\"\""),
            Ok(CellValue::Text("\"abc\"".to_string()))
        );
        assert_eq!(normalize_cell("-5"), Ok(CellValue::Text("-5".to_string())));
    }

    #[test]
    fn test_unparseable_parentheses_are_rejected() {
        assert_eq!(
            normalize_cell("(n/a)"),
            Err(CellError("(n/a)".to_string()))
        );
    }
}
