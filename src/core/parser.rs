use crate::config::{FileKind, IngestConfig};
use crate::core::loader::LoadStrategy;
use crate::core::normalize::normalize_cell;
use crate::domain::model::{CellValue, ColumnSet, LoadResult, ParsedRows, Row, TargetSchema};
use crate::domain::ports::Warehouse;
use crate::utils::error::{IngestError, Result};
use csv::ReaderBuilder;
use serde_json::{Map, Value};
use std::path::Path;
use tracing::{debug, warn};

/// Turns a file into a column set and rows. Chosen once from the file kind.
#[derive(Debug, Clone)]
pub enum FormatParser {
    Delimited(DelimitedTextParser),
    Structured(StructuredRecordParser),
}

impl FormatParser {
    pub fn from_config(config: &IngestConfig) -> Result<Self> {
        Ok(match config.file_kind()? {
            FileKind::Delimited => FormatParser::Delimited(DelimitedTextParser {
                delimiter: config.delimiter()?,
                has_header: config.has_header(),
                column_names: config.column_names().map(<[String]>::to_vec),
            }),
            FileKind::Structured => FormatParser::Structured(StructuredRecordParser),
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            FormatParser::Delimited(_) => "delimited",
            FormatParser::Structured(_) => "structured",
        }
    }

    pub fn derive_schema(&self, path: &Path) -> Result<ColumnSet> {
        match self {
            FormatParser::Delimited(parser) => parser.derive_schema(path),
            FormatParser::Structured(parser) => parser.derive_schema(path),
        }
    }

    pub fn read_rows(&self, path: &Path) -> Result<ParsedRows> {
        match self {
            FormatParser::Delimited(parser) => parser.read_rows(path),
            FormatParser::Structured(parser) => parser.read_rows(path),
        }
    }

    /// Structured records always go through the row buffer, whatever
    /// strategy is configured.
    pub async fn load(
        &self,
        path: &Path,
        target: &TargetSchema,
        strategy: &LoadStrategy,
        warehouse: &dyn Warehouse,
    ) -> LoadResult {
        match self {
            FormatParser::Delimited(_) => strategy.load(path, target, self, warehouse).await,
            FormatParser::Structured(_) => {
                let fallback = strategy.row_buffer_fallback();
                if fallback.name() != strategy.name() {
                    debug!("🔁 {} loads through {}", path.display(), fallback.name());
                }
                fallback.load(path, target, self, warehouse).await
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct DelimitedTextParser {
    pub delimiter: u8,
    pub has_header: bool,
    /// Used when the file has no header row.
    pub column_names: Option<Vec<String>>,
}

impl DelimitedTextParser {
    fn reader(&self, path: &Path) -> Result<csv::Reader<std::fs::File>> {
        Ok(ReaderBuilder::new()
            .delimiter(self.delimiter)
            .has_headers(false)
            .flexible(true)
            .from_path(path)?)
    }

    pub fn derive_schema(&self, path: &Path) -> Result<ColumnSet> {
        if !self.has_header {
            return match &self.column_names {
                Some(names) => ColumnSet::new(names),
                None => Err(IngestError::format(
                    path,
                    "file has no header and no column names are configured",
                )),
            };
        }

        let mut reader = self.reader(path)?;
        let header = match reader.records().next() {
            Some(record) => record?,
            None => return Err(IngestError::format(path, "file is empty, expected a header row")),
        };

        ColumnSet::new(header.iter()).map_err(|e| IngestError::format(path, e.to_string()))
    }

    pub fn read_rows(&self, path: &Path) -> Result<ParsedRows> {
        let mut reader = self.reader(path)?;
        let mut rows = Vec::new();
        let skip = usize::from(self.has_header);

        for (index, record) in reader.records().enumerate().skip(skip) {
            let record = record?;
            let row = record
                .iter()
                .map(normalize_cell)
                .collect::<std::result::Result<Row, _>>()
                .map_err(|e| IngestError::format(path, format!("line {}: {}", index + 1, e)))?;
            rows.push(row);
        }

        Ok(ParsedRows {
            columns: None,
            rows,
        })
    }
}

/// A JSON array of flat objects. The first record fixes the columns.
#[derive(Debug, Clone, Default)]
pub struct StructuredRecordParser;

impl StructuredRecordParser {
    fn read_records(&self, path: &Path) -> Result<Vec<Map<String, Value>>> {
        let content = std::fs::read_to_string(path)?;
        let document: Value =
            serde_json::from_str(&content).map_err(|e| IngestError::format(path, e.to_string()))?;

        let Value::Array(items) = document else {
            return Err(IngestError::format(path, "expected a JSON array of records"));
        };

        items
            .into_iter()
            .enumerate()
            .map(|(index, item)| match item {
                Value::Object(record) => Ok(record),
                other => Err(IngestError::format(
                    path,
                    format!("record {} is not an object: {}", index + 1, type_name(&other)),
                )),
            })
            .collect()
    }

    pub fn derive_schema(&self, path: &Path) -> Result<ColumnSet> {
        let records = self.read_records(path)?;
        let first = records
            .first()
            .ok_or_else(|| IngestError::format(path, "no records found"))?;
        ColumnSet::new(first.keys()).map_err(|e| IngestError::format(path, e.to_string()))
    }

    pub fn read_rows(&self, path: &Path) -> Result<ParsedRows> {
        let records = self.read_records(path)?;
        let Some(first) = records.first() else {
            return Err(IngestError::format(path, "no records found"));
        };

        // 以原始 key 查值，欄位名稱則使用正規化後的版本
        let keys: Vec<String> = first.keys().cloned().collect();
        let columns =
            ColumnSet::new(&keys).map_err(|e| IngestError::format(path, e.to_string()))?;

        let mut rows = Vec::with_capacity(records.len());
        for (index, record) in records.iter().enumerate() {
            let extra: Vec<&str> = record
                .keys()
                .filter(|key| !keys.contains(key))
                .map(String::as_str)
                .collect();
            if !extra.is_empty() {
                return Err(IngestError::format(
                    path,
                    format!(
                        "record {} has keys outside the first record's columns: {}",
                        index + 1,
                        extra.join(", ")
                    ),
                ));
            }

            let missing: Vec<&str> = keys
                .iter()
                .filter(|key| !record.contains_key(*key))
                .map(String::as_str)
                .collect();
            if !missing.is_empty() {
                warn!(
                    "⚠️ {} record {} lacks {}; loading NULL",
                    path.display(),
                    index + 1,
                    missing.join(", ")
                );
            }

            rows.push(
                keys.iter()
                    .map(|key| record.get(key).map(json_cell).unwrap_or(CellValue::Null))
                    .collect(),
            );
        }

        Ok(ParsedRows {
            columns: Some(columns),
            rows,
        })
    }
}

fn json_cell(value: &Value) -> CellValue {
    match value {
        Value::Null => CellValue::Null,
        Value::String(text) => CellValue::Text(text.clone()),
        Value::Bool(flag) => CellValue::Text(flag.to_string()),
        Value::Number(number) => CellValue::Text(number.to_string()),
        nested => CellValue::Text(nested.to_string()),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn delimited(has_header: bool) -> DelimitedTextParser {
        DelimitedTextParser {
            delimiter: b',',
            has_header,
            column_names: None,
        }
    }

    #[test]
    fn test_header_becomes_column_set() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("orders.csv");
        fs::write(&path, "\u{feff}id,\"amount\"\n1,(5)\n2,-\n").unwrap();

        let columns = delimited(true).derive_schema(&path).unwrap();
        assert_eq!(columns.names(), &["id", "amount"]);

        let parsed = delimited(true).read_rows(&path).unwrap();
        assert_eq!(
            parsed.rows,
            vec![
                vec![CellValue::Text("1".into()), CellValue::Number(-5.0)],
                vec![CellValue::Text("2".into()), CellValue::Null],
            ]
        );
    }

    #[test]
    fn test_headerless_file_uses_configured_names() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("orders.txt");
        fs::write(&path, "1|a\n2|b\n").unwrap();

        let parser = DelimitedTextParser {
            delimiter: b'|',
            has_header: false,
            column_names: Some(vec!["id".into(), "code".into()]),
        };
        assert_eq!(parser.derive_schema(&path).unwrap().names(), &["id", "code"]);
        assert_eq!(parser.read_rows(&path).unwrap().rows.len(), 2);

        assert!(delimited(false).derive_schema(&path).is_err());
    }

    #[test]
    fn test_bad_negative_is_a_format_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("bad.csv");
        fs::write(&path, "id,amount\n1,(oops)\n").unwrap();

        let err = delimited(true).read_rows(&path).unwrap_err();
        assert!(matches!(err, IngestError::FormatError { .. }));
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn test_structured_records_keep_first_record_order() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("orders.json");
        fs::write(
            &path,
            r#"[{"zeta": "a", "alpha": 1.5, "flag": true, "tags": ["x"]},
                {"zeta": null, "alpha": 2}]"#,
        )
        .unwrap();

        let parser = StructuredRecordParser;
        assert_eq!(parser.derive_schema(&path).unwrap().names(), &["zeta", "alpha", "flag", "tags"]);

        let parsed = parser.read_rows(&path).unwrap();
        assert_eq!(
            parsed.rows[0],
            vec![
                CellValue::Text("a".into()),
                CellValue::Text("1.5".into()),
                CellValue::Text("true".into()),
                CellValue::Text("[\"x\"]".into()),
            ]
        );
        assert_eq!(
            parsed.rows[1],
            vec![
                CellValue::Null,
                CellValue::Text("2".into()),
                CellValue::Null,
                CellValue::Null,
            ]
        );
    }

    #[test]
    fn test_structured_extra_keys_fail_the_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("orders.json");
        fs::write(&path, r#"[{"a": 1}, {"a": 2, "b": 3}]"#).unwrap();

        let err = StructuredRecordParser.read_rows(&path).unwrap_err();
        assert!(err.to_string().contains("record 2"));
        assert!(err.to_string().contains('b'));
    }

    #[test]
    fn test_structured_requires_array_of_objects() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("orders.json");
        fs::write(&path, r#"{"a": 1}"#).unwrap();
        assert!(StructuredRecordParser.derive_schema(&path).is_err());

        fs::write(&path, "[]").unwrap();
        assert!(StructuredRecordParser.derive_schema(&path).is_err());
    }
}
