//! Statement text for the table/view pair. Identifiers are always quoted so
//! header names with spaces or mixed case survive unchanged.

use crate::domain::model::{TargetSchema, IDENTITY_COLUMN};
use crate::domain::ports::CopyFormat;
use std::path::Path;

/// PostgreSQL caps bind parameters per statement at 65535.
pub const MAX_BIND_PARAMS: usize = 65_535;

pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

pub fn qualified(schema: &str, name: &str) -> String {
    format!("{}.{}", quote_ident(schema), quote_ident(name))
}

pub fn table_name(target: &TargetSchema) -> String {
    qualified(&target.schema, &target.table)
}

pub fn view_name(target: &TargetSchema) -> String {
    qualified(&target.schema, &target.view())
}

pub fn column_list(columns: &[String]) -> String {
    columns
        .iter()
        .map(|c| quote_ident(c))
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn drop_view(target: &TargetSchema) -> String {
    format!("DROP VIEW IF EXISTS {}", view_name(target))
}

pub fn drop_table(target: &TargetSchema) -> String {
    format!("DROP TABLE IF EXISTS {}", table_name(target))
}

pub fn create_table(target: &TargetSchema, columns: &[String]) -> String {
    let mut definitions = vec![format!(
        "{} INTEGER GENERATED ALWAYS AS IDENTITY PRIMARY KEY",
        quote_ident(IDENTITY_COLUMN)
    )];
    definitions.extend(columns.iter().map(|c| format!("{} TEXT", quote_ident(c))));

    format!(
        "CREATE TABLE {} ({})",
        table_name(target),
        definitions.join(", ")
    )
}

pub fn create_view(target: &TargetSchema, columns: &[String]) -> String {
    format!(
        "CREATE VIEW {} AS SELECT {} FROM {}",
        view_name(target),
        column_list(columns),
        table_name(target)
    )
}

/// Columns of a relation in ordinal order; binds `$1` schema and `$2` name.
pub const COLUMNS_QUERY: &str = "SELECT column_name::text FROM information_schema.columns \
     WHERE table_schema = $1 AND table_name = $2 ORDER BY ordinal_position";

/// COPY cannot write through a view, so it targets the table with the
/// view's column list and the identity column fills itself.
pub fn copy_from_file(
    target: &TargetSchema,
    columns: &[String],
    file: &Path,
    format: &CopyFormat,
) -> String {
    format!(
        "COPY {} ({}) FROM {} WITH (FORMAT csv, DELIMITER {}, HEADER {})",
        table_name(target),
        column_list(columns),
        quote_literal(&file.to_string_lossy()),
        quote_literal(&(format.delimiter as char).to_string()),
        if format.row_start > 1 { "true" } else { "false" }
    )
}

/// Client-side `\copy` for psql. Lines before `row_start` are skipped by
/// `tail`, which also avoids needing server file access.
pub fn client_copy_command(
    target: &TargetSchema,
    columns: &[String],
    file: &Path,
    delimiter: u8,
    row_start: usize,
) -> String {
    let program = format!(
        "tail -n +{} {}",
        row_start.max(1),
        shell_quote(&file.to_string_lossy())
    );
    format!(
        "\\copy {} ({}) FROM PROGRAM {} WITH (FORMAT csv, DELIMITER {})",
        table_name(target),
        column_list(columns),
        quote_literal(&program),
        quote_literal(&(delimiter as char).to_string())
    )
}

fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "'\\''"))
}

/// Rows per INSERT statement given the column count and the configured cap.
pub fn rows_per_statement(column_count: usize, batch_size: usize) -> usize {
    let by_params = MAX_BIND_PARAMS / column_count.max(1);
    batch_size.min(by_params).max(1)
}
