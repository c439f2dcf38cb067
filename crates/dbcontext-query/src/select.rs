//! SELECT statement builder.

use dbcontext_core::{Dialect, Value};

/// A SELECT statement under construction.
///
/// Conditions are appended as raw fragments written with `?` placeholders;
/// the builder rewrites them for the dialect as they arrive, numbering
/// placeholders by the running parameter count so fragments compose in any
/// order.
#[derive(Debug, Clone)]
pub struct SelectBuilder {
    table: String,
    dialect: Dialect,
    /// WHERE fragments, already rewritten for the dialect
    conditions: Vec<String>,
    /// Parameters bound so far, aligned with the rewritten fragments
    params: Vec<Value>,
    /// ORDER BY term, already quoted; later calls overwrite
    order_by: Option<String>,
    limit: Option<u64>,
    offset: Option<u64>,
}

impl SelectBuilder {
    /// Start a SELECT against the given table.
    #[must_use]
    pub fn new(table: impl Into<String>, dialect: Dialect) -> Self {
        Self {
            table: table.into(),
            dialect,
            conditions: Vec::new(),
            params: Vec::new(),
            order_by: None,
            limit: None,
            offset: None,
        }
    }

    /// The dialect this builder renders for.
    #[must_use]
    pub const fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Number of parameters bound so far.
    #[must_use]
    pub fn param_count(&self) -> usize {
        self.params.len()
    }

    /// Append a WHERE fragment written with `?` placeholders.
    ///
    /// The fragment is ANDed with any existing conditions. `values` must
    /// carry one value per placeholder in the fragment.
    pub fn push_condition(&mut self, fragment: &str, values: Vec<Value>) {
        let rewritten = self.dialect.rewrite_placeholders(fragment, self.params.len());
        self.conditions.push(rewritten);
        self.params.extend(values);
    }

    /// Append a `column IN (...)` condition.
    ///
    /// An empty value list leaves the builder unchanged; rendering an
    /// `IN ()` clause would be invalid SQL.
    pub fn push_in(&mut self, column: &str, values: Vec<Value>) {
        if values.is_empty() {
            return;
        }
        let column = self.dialect.quote_identifier(column);
        let placeholders = vec!["?"; values.len()].join(", ");
        let fragment = format!("{column} IN ({placeholders})");
        self.push_condition(&fragment, values);
    }

    /// Set the ORDER BY term, replacing any previous ordering.
    pub fn set_order(&mut self, column: &str, descending: bool) {
        let column = self.dialect.quote_identifier(column);
        self.order_by = Some(if descending {
            format!("{column} DESC")
        } else {
            column
        });
    }

    /// Cap the number of rows returned.
    pub fn set_limit(&mut self, n: u64) {
        self.limit = Some(n);
    }

    /// Skip the first `n` rows.
    pub fn set_offset(&mut self, n: u64) {
        self.offset = Some(n);
    }

    fn push_where(&self, sql: &mut String) {
        if !self.conditions.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&self.conditions.join(" AND "));
        }
    }

    fn push_paging(&self, sql: &mut String) {
        match (self.limit, self.offset) {
            (Some(limit), offset) => {
                sql.push_str(&format!(" LIMIT {limit}"));
                if let Some(offset) = offset {
                    sql.push_str(&format!(" OFFSET {offset}"));
                }
            }
            (None, Some(offset)) => {
                // MySQL and SQLite cannot express OFFSET without LIMIT.
                match self.dialect {
                    Dialect::Postgres => {}
                    Dialect::Mysql => sql.push_str(" LIMIT 18446744073709551615"),
                    Dialect::Sqlite => sql.push_str(" LIMIT -1"),
                }
                sql.push_str(&format!(" OFFSET {offset}"));
            }
            (None, None) => {}
        }
    }

    /// Render the SELECT statement and its parameters.
    #[must_use]
    pub fn build_select(&self) -> (String, Vec<Value>) {
        let mut sql = String::from("SELECT * FROM ");
        sql.push_str(&self.dialect.quote_identifier(&self.table));
        self.push_where(&mut sql);
        if let Some(order) = &self.order_by {
            sql.push_str(" ORDER BY ");
            sql.push_str(order);
        }
        self.push_paging(&mut sql);
        (sql, self.params.clone())
    }

    /// Render a COUNT over the same conditions.
    ///
    /// Ordering and paging do not affect the count and are omitted.
    #[must_use]
    pub fn build_count(&self) -> (String, Vec<Value>) {
        let mut sql = String::from("SELECT COUNT(*) FROM ");
        sql.push_str(&self.dialect.quote_identifier(&self.table));
        self.push_where(&mut sql);
        (sql, self.params.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_select_reads_the_whole_table() {
        let builder = SelectBuilder::new("users", Dialect::Sqlite);
        let (sql, params) = builder.build_select();
        assert_eq!(sql, "SELECT * FROM \"users\"");
        assert!(params.is_empty());
    }

    #[test]
    fn conditions_are_anded_in_order() {
        let mut builder = SelectBuilder::new("users", Dialect::Sqlite);
        builder.push_condition("age > ?", vec![Value::Int(18)]);
        builder.push_condition("name = ?", vec![Value::Text("alice".into())]);
        let (sql, params) = builder.build_select();
        assert_eq!(sql, "SELECT * FROM \"users\" WHERE age > ? AND name = ?");
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn postgres_placeholders_number_across_fragments() {
        let mut builder = SelectBuilder::new("users", Dialect::Postgres);
        builder.push_condition("age > ? AND age < ?", vec![Value::Int(18), Value::Int(65)]);
        builder.push_condition("name = ?", vec![Value::Text("alice".into())]);
        let (sql, _) = builder.build_select();
        assert_eq!(
            sql,
            "SELECT * FROM \"users\" WHERE age > $1 AND age < $2 AND name = $3"
        );
    }

    #[test]
    fn in_condition_expands_placeholders() {
        let mut builder = SelectBuilder::new("users", Dialect::Postgres);
        builder.push_condition("active = ?", vec![Value::Bool(true)]);
        builder.push_in("id", vec![Value::BigInt(1), Value::BigInt(2)]);
        let (sql, params) = builder.build_select();
        assert_eq!(
            sql,
            "SELECT * FROM \"users\" WHERE active = $1 AND \"id\" IN ($2, $3)"
        );
        assert_eq!(params.len(), 3);
    }

    #[test]
    fn empty_in_is_a_no_op() {
        let mut builder = SelectBuilder::new("users", Dialect::Sqlite);
        builder.push_in("id", vec![]);
        let (sql, params) = builder.build_select();
        assert_eq!(sql, "SELECT * FROM \"users\"");
        assert!(params.is_empty());
    }

    #[test]
    fn ordering_and_paging_render_after_conditions() {
        let mut builder = SelectBuilder::new("users", Dialect::Sqlite);
        builder.push_condition("age > ?", vec![Value::Int(18)]);
        builder.set_order("name", false);
        builder.set_limit(10);
        builder.set_offset(20);
        let (sql, _) = builder.build_select();
        assert_eq!(
            sql,
            "SELECT * FROM \"users\" WHERE age > ? ORDER BY \"name\" LIMIT 10 OFFSET 20"
        );
    }

    #[test]
    fn a_later_order_overwrites_the_earlier_one() {
        let mut builder = SelectBuilder::new("users", Dialect::Sqlite);
        builder.set_order("name", false);
        builder.set_order("age", true);
        let (sql, _) = builder.build_select();
        assert_eq!(sql, "SELECT * FROM \"users\" ORDER BY \"age\" DESC");
    }

    #[test]
    fn offset_without_limit_is_dialect_specific() {
        let mut pg = SelectBuilder::new("users", Dialect::Postgres);
        pg.set_offset(5);
        assert_eq!(pg.build_select().0, "SELECT * FROM \"users\" OFFSET 5");

        let mut my = SelectBuilder::new("users", Dialect::Mysql);
        my.set_offset(5);
        assert_eq!(
            my.build_select().0,
            "SELECT * FROM `users` LIMIT 18446744073709551615 OFFSET 5"
        );

        let mut sq = SelectBuilder::new("users", Dialect::Sqlite);
        sq.set_offset(5);
        assert_eq!(sq.build_select().0, "SELECT * FROM \"users\" LIMIT -1 OFFSET 5");
    }

    #[test]
    fn count_drops_ordering_and_paging() {
        let mut builder = SelectBuilder::new("users", Dialect::Mysql);
        builder.push_condition("age > ?", vec![Value::Int(18)]);
        builder.set_order("name", false);
        builder.set_limit(10);
        let (sql, params) = builder.build_count();
        assert_eq!(sql, "SELECT COUNT(*) FROM `users` WHERE age > ?");
        assert_eq!(params, vec![Value::Int(18)]);
    }

    #[test]
    fn question_marks_in_literals_survive_rewriting() {
        let mut builder = SelectBuilder::new("notes", Dialect::Postgres);
        builder.push_condition(
            "body = ? OR body = 'why?'",
            vec![Value::Text("hello".into())],
        );
        let (sql, _) = builder.build_select();
        assert_eq!(
            sql,
            "SELECT * FROM \"notes\" WHERE body = $1 OR body = 'why?'"
        );
    }
}
