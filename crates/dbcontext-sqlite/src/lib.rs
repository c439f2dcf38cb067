//! SQLite driver for dbcontext.
//!
//! Wraps a `rusqlite` connection behind the engine's synchronous
//! `Connection` trait. Timestamps are stored as TEXT in the engine's fixed
//! layout; booleans as integers, following SQLite's own affinity rules.

use dbcontext_core::{Connection, Error, Result, Row, Value, format_timestamp};
use rusqlite::params_from_iter;
use std::path::Path;
use std::sync::Arc;

/// A synchronous SQLite connection.
pub struct SqliteConnection {
    conn: rusqlite::Connection,
}

impl SqliteConnection {
    /// Open (or create) a database file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = rusqlite::Connection::open(path)
            .map_err(|e| Error::connection("failed to open sqlite database", e))?;
        Ok(Self { conn })
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        let conn = rusqlite::Connection::open_in_memory()
            .map_err(|e| Error::connection("failed to open in-memory sqlite database", e))?;
        Ok(Self { conn })
    }

    /// Run a batch of semicolon-separated statements, without parameters.
    ///
    /// Intended for schema setup and PRAGMA configuration.
    pub fn execute_batch(&self, sql: &str) -> Result<()> {
        self.conn
            .execute_batch(sql)
            .map_err(|e| Error::query("execute", sql, e))
    }

    /// Begin an explicit transaction.
    pub fn begin(&self) -> Result<()> {
        self.execute_batch("BEGIN")
    }

    /// Commit the current transaction.
    pub fn commit(&self) -> Result<()> {
        self.execute_batch("COMMIT")
    }

    /// Roll back the current transaction.
    pub fn rollback(&self) -> Result<()> {
        self.execute_batch("ROLLBACK")
    }
}

/// Convert an engine value into the owned form rusqlite binds.
fn bind_value(value: &Value) -> rusqlite::types::Value {
    match value {
        Value::Null => rusqlite::types::Value::Null,
        Value::Bool(v) => rusqlite::types::Value::Integer(i64::from(*v)),
        Value::TinyInt(v) => rusqlite::types::Value::Integer(i64::from(*v)),
        Value::SmallInt(v) => rusqlite::types::Value::Integer(i64::from(*v)),
        Value::Int(v) => rusqlite::types::Value::Integer(i64::from(*v)),
        Value::BigInt(v) => rusqlite::types::Value::Integer(*v),
        Value::Float(v) => rusqlite::types::Value::Real(f64::from(*v)),
        Value::Double(v) => rusqlite::types::Value::Real(*v),
        Value::Text(v) => rusqlite::types::Value::Text(v.clone()),
        Value::Bytes(v) => rusqlite::types::Value::Blob(v.clone()),
        Value::Timestamp(ts) => rusqlite::types::Value::Text(format_timestamp(*ts)),
    }
}

/// Convert a stored SQLite value back into an engine value.
fn read_value(value: rusqlite::types::Value) -> Value {
    match value {
        rusqlite::types::Value::Null => Value::Null,
        rusqlite::types::Value::Integer(v) => Value::BigInt(v),
        rusqlite::types::Value::Real(v) => Value::Double(v),
        rusqlite::types::Value::Text(v) => Value::Text(v),
        rusqlite::types::Value::Blob(v) => Value::Bytes(v),
    }
}

impl Connection for SqliteConnection {
    fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        let mut stmt = self
            .conn
            .prepare(sql)
            .map_err(|e| Error::query("query", sql, e))?;
        let column_names: Vec<String> =
            stmt.column_names().iter().map(ToString::to_string).collect();
        let column_count = column_names.len();
        let columns = Arc::new(dbcontext_core::ColumnInfo::new(column_names));

        let bound = params.iter().map(bind_value);
        let mut raw = stmt
            .query(params_from_iter(bound))
            .map_err(|e| Error::query("query", sql, e))?;

        let mut rows = Vec::new();
        loop {
            let raw_row = match raw.next() {
                Ok(Some(row)) => row,
                Ok(None) => break,
                Err(e) => return Err(Error::query("query", sql, e)),
            };
            let mut values = Vec::with_capacity(column_count);
            for i in 0..column_count {
                let value: rusqlite::types::Value = raw_row
                    .get(i)
                    .map_err(|e| Error::query("query", sql, e))?;
                values.push(read_value(value));
            }
            rows.push(Row::with_columns(Arc::clone(&columns), values));
        }
        Ok(rows)
    }

    fn execute(&self, sql: &str, params: &[Value]) -> Result<u64> {
        let bound = params.iter().map(bind_value);
        let affected = self
            .conn
            .execute(sql, params_from_iter(bound))
            .map_err(|e| Error::query("execute", sql, e))?;
        Ok(affected as u64)
    }

    fn insert(&self, sql: &str, params: &[Value]) -> Result<i64> {
        let bound = params.iter().map(bind_value);
        self.conn
            .execute(sql, params_from_iter(bound))
            .map_err(|e| Error::query("insert", sql, e))?;
        Ok(self.conn.last_insert_rowid())
    }
}
