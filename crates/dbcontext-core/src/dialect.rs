//! SQL dialect differences and runtime dialect detection.

use crate::connection::Connection;
use serde::{Deserialize, Serialize};

/// The SQL dialects the engine can generate statements for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    /// PostgreSQL: `$N` placeholders, double-quoted identifiers, RETURNING.
    Postgres,
    /// MySQL: `?` placeholders, backtick identifiers, last-insert-id.
    #[default]
    Mysql,
    /// SQLite: `?` placeholders, double-quoted identifiers, last-insert-id.
    Sqlite,
}

impl Dialect {
    /// Render the placeholder for the 1-based parameter `index`.
    #[must_use]
    pub fn placeholder(self, index: usize) -> String {
        match self {
            Dialect::Postgres => format!("${index}"),
            Dialect::Mysql | Dialect::Sqlite => "?".to_string(),
        }
    }

    /// Quote an identifier (table or column name) for this dialect.
    ///
    /// Quote characters inside the identifier are doubled.
    #[must_use]
    pub fn quote_identifier(self, name: &str) -> String {
        match self {
            Dialect::Postgres | Dialect::Sqlite => {
                format!("\"{}\"", name.replace('"', "\"\""))
            }
            Dialect::Mysql => format!("`{}`", name.replace('`', "``")),
        }
    }

    /// Whether INSERT statements should carry a `RETURNING` clause to read
    /// back the generated key, instead of relying on last-insert-id.
    #[must_use]
    pub const fn uses_returning(self) -> bool {
        matches!(self, Dialect::Postgres)
    }

    /// Rewrite `?` placeholders for this dialect, numbering from `offset + 1`.
    ///
    /// Question marks inside single-quoted string literals are left alone.
    /// Dialects that bind with `?` natively return the statement unchanged.
    #[must_use]
    pub fn rewrite_placeholders(self, sql: &str, offset: usize) -> String {
        match self {
            Dialect::Postgres => {
                let mut out = String::with_capacity(sql.len() + 8);
                let mut index = offset;
                let mut in_string = false;
                for ch in sql.chars() {
                    match ch {
                        '\'' => {
                            in_string = !in_string;
                            out.push(ch);
                        }
                        '?' if !in_string => {
                            index += 1;
                            out.push('$');
                            out.push_str(&index.to_string());
                        }
                        _ => out.push(ch),
                    }
                }
                out
            }
            Dialect::Mysql | Dialect::Sqlite => sql.to_string(),
        }
    }

    /// Human-readable dialect name used in log output.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Dialect::Postgres => "postgres",
            Dialect::Mysql => "mysql",
            Dialect::Sqlite => "sqlite",
        }
    }
}

/// Probe statements that each succeed on exactly one backend.
const PROBES: &[(Dialect, &str)] = &[
    (Dialect::Postgres, "SELECT pg_backend_pid()"),
    (Dialect::Mysql, "SELECT @@version_comment"),
    (Dialect::Sqlite, "SELECT sqlite_version()"),
];

/// Detect the dialect of a live connection by issuing backend-specific
/// probe queries.
///
/// Returns `None` when no probe succeeds; callers fall back to
/// [`Dialect::default`] and should report the fallback.
pub fn detect_dialect<C: Connection + ?Sized>(conn: &C) -> Option<Dialect> {
    for (dialect, probe) in PROBES {
        if conn.query_one(probe, &[]).is_ok() {
            tracing::debug!(dialect = dialect.name(), "dialect detected");
            return Some(*dialect);
        }
    }
    None
}
