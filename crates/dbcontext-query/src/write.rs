//! INSERT, UPDATE and DELETE statement rendering.

use dbcontext_core::{Dialect, FieldData};

/// Render an INSERT for the given field data.
///
/// `returning` appends a `RETURNING` clause naming that column, for
/// dialects that read generated keys back in the same round trip. An
/// entity with no persistable columns renders the dialect's
/// all-defaults form.
#[must_use]
pub fn build_insert(
    dialect: Dialect,
    table: &str,
    data: &FieldData,
    returning: Option<&str>,
) -> String {
    let table = dialect.quote_identifier(table);
    let mut sql = if data.is_empty() {
        match dialect {
            Dialect::Postgres | Dialect::Sqlite => {
                format!("INSERT INTO {table} DEFAULT VALUES")
            }
            Dialect::Mysql => format!("INSERT INTO {table} () VALUES ()"),
        }
    } else {
        let columns = data
            .columns
            .iter()
            .map(|c| dialect.quote_identifier(c))
            .collect::<Vec<_>>()
            .join(", ");
        let placeholders = data.placeholders.join(", ");
        format!("INSERT INTO {table} ({columns}) VALUES ({placeholders})")
    };
    if let Some(column) = returning {
        sql.push_str(" RETURNING ");
        sql.push_str(&dialect.quote_identifier(column));
    }
    sql
}

/// Render an UPDATE setting every column in the field data, keyed by
/// `id_column`.
///
/// The key placeholder is numbered after the SET list, matching the
/// parameter order `data.values` followed by the key value.
#[must_use]
pub fn build_update(dialect: Dialect, table: &str, data: &FieldData, id_column: &str) -> String {
    let table = dialect.quote_identifier(table);
    let assignments = data
        .columns
        .iter()
        .zip(&data.placeholders)
        .map(|(column, placeholder)| {
            format!("{} = {placeholder}", dialect.quote_identifier(column))
        })
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "UPDATE {table} SET {assignments} WHERE {} = {}",
        dialect.quote_identifier(id_column),
        dialect.placeholder(data.len() + 1)
    )
}

/// Render a DELETE keyed by `id_column`.
#[must_use]
pub fn build_delete(dialect: Dialect, table: &str, id_column: &str) -> String {
    format!(
        "DELETE FROM {} WHERE {} = {}",
        dialect.quote_identifier(table),
        dialect.quote_identifier(id_column),
        dialect.placeholder(1)
    )
}
