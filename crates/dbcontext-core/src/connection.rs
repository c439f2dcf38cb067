//! Database connection abstraction.

use crate::error::Result;
use crate::row::Row;
use crate::value::Value;

/// A synchronous database connection.
///
/// Drivers implement this trait to expose raw statement execution to the
/// engine. SQL is written with `?` placeholders; drivers whose wire protocol
/// uses a different placeholder style rewrite statements before sending them
/// (see `Dialect::rewrite_placeholders`).
pub trait Connection {
    /// Execute a query and return all matching rows.
    fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>>;

    /// Execute a query expected to return at most one row.
    fn query_one(&self, sql: &str, params: &[Value]) -> Result<Option<Row>> {
        let rows = self.query(sql, params)?;
        Ok(rows.into_iter().next())
    }

    /// Execute a statement and return the number of affected rows.
    fn execute(&self, sql: &str, params: &[Value]) -> Result<u64>;

    /// Execute an INSERT and return the generated row id.
    ///
    /// Drivers without last-insert-id support return 0; callers then rely on
    /// `RETURNING` clauses instead.
    fn insert(&self, sql: &str, params: &[Value]) -> Result<i64>;
}

/// A borrowed connection is itself a connection, so one handle (or an
/// ambient transaction) can back several short-lived contexts in turn.
impl<C: Connection + ?Sized> Connection for &C {
    fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        (**self).query(sql, params)
    }

    fn query_one(&self, sql: &str, params: &[Value]) -> Result<Option<Row>> {
        (**self).query_one(sql, params)
    }

    fn execute(&self, sql: &str, params: &[Value]) -> Result<u64> {
        (**self).execute(sql, params)
    }

    fn insert(&self, sql: &str, params: &[Value]) -> Result<i64> {
        (**self).insert(sql, params)
    }
}
