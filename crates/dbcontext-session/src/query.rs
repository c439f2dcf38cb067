//! The fluent query layer.

use crate::context::EntityContext;
use crate::tracked::Tracked;
use dbcontext_core::{Connection, Entity, Error, Result, Row, Value, id_column};
use dbcontext_query::SelectBuilder;
use std::marker::PhantomData;

/// A composable, immutable query over one entity type.
///
/// Chaining methods return a new query and leave the receiver untouched,
/// so a base query can branch into several refinements. Terminal methods
/// run the statement and materialize results; loaded entities are tracked
/// as Unchanged unless [`as_no_tracking`](QuerySet::as_no_tracking) was
/// applied.
pub struct QuerySet<'a, T: Entity, C: Connection> {
    ctx: &'a EntityContext<C>,
    builder: SelectBuilder,
    no_tracking: bool,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Entity, C: Connection> Clone for QuerySet<'_, T, C> {
    fn clone(&self) -> Self {
        Self {
            ctx: self.ctx,
            builder: self.builder.clone(),
            no_tracking: self.no_tracking,
            _marker: PhantomData,
        }
    }
}

impl<'a, T: Entity, C: Connection> QuerySet<'a, T, C> {
    pub(crate) fn new(ctx: &'a EntityContext<C>) -> Self {
        Self {
            ctx,
            builder: SelectBuilder::new(T::table_name(), ctx.dialect()),
            no_tracking: false,
            _marker: PhantomData,
        }
    }

    /// Add a WHERE fragment written with `?` placeholders.
    #[must_use]
    pub fn filter(&self, fragment: &str, params: Vec<Value>) -> Self {
        let mut next = self.clone();
        next.builder.push_condition(fragment, params);
        next
    }

    /// Add a `column IN (...)` condition. An empty list adds nothing, so
    /// the query behaves as if this call never happened.
    #[must_use]
    pub fn filter_in(&self, column: &str, values: Vec<Value>) -> Self {
        let mut next = self.clone();
        next.builder.push_in(column, values);
        next
    }

    /// Sort ascending by a column. A later ordering call replaces this one.
    #[must_use]
    pub fn order_by(&self, column: &str) -> Self {
        let mut next = self.clone();
        next.builder.set_order(column, false);
        next
    }

    /// Sort descending by a column. A later ordering call replaces this one.
    #[must_use]
    pub fn order_by_desc(&self, column: &str) -> Self {
        let mut next = self.clone();
        next.builder.set_order(column, true);
        next
    }

    /// Cap the number of rows returned.
    #[must_use]
    pub fn take(&self, n: u64) -> Self {
        let mut next = self.clone();
        next.builder.set_limit(n);
        next
    }

    /// Skip the first `n` rows.
    #[must_use]
    pub fn skip(&self, n: u64) -> Self {
        let mut next = self.clone();
        next.builder.set_offset(n);
        next
    }

    /// Materialize results without registering them with the tracker.
    #[must_use]
    pub fn as_no_tracking(&self) -> Self {
        let mut next = self.clone();
        next.no_tracking = true;
        next
    }

    fn materialize(&self, rows: Vec<Row>) -> Vec<Tracked<T>> {
        rows.iter()
            .map(|row| {
                let handle = Tracked::new(T::from_row(row));
                if !self.no_tracking {
                    self.ctx.track_loaded(&handle);
                }
                handle
            })
            .collect()
    }

    /// Run the query and return all matching entities.
    pub fn to_list(&self) -> Result<Vec<Tracked<T>>> {
        let (sql, params) = self.builder.build_select();
        tracing::debug!(sql = %sql, "running query");
        let rows = self.ctx.connection().query(&sql, &params)?;
        Ok(self.materialize(rows))
    }

    /// The first matching entity, or `None` when nothing matches.
    pub fn first_or_default(&self) -> Result<Option<Tracked<T>>> {
        let results = self.take(1).to_list()?;
        Ok(results.into_iter().next())
    }

    /// The first matching entity; an error when nothing matches.
    pub fn first(&self) -> Result<Tracked<T>> {
        self.first_or_default()?.ok_or_else(|| Error::NoRows {
            table: T::table_name(),
        })
    }

    /// Exactly one matching entity; errors on zero or multiple matches.
    pub fn single(&self) -> Result<Tracked<T>> {
        let mut results = self.take(2).to_list()?;
        match results.len() {
            0 => Err(Error::NoRows {
                table: T::table_name(),
            }),
            1 => Ok(results.remove(0)),
            _ => Err(Error::MultipleRows {
                table: T::table_name(),
            }),
        }
    }

    /// Count the matching rows without materializing them.
    ///
    /// Ordering and paging applied to this query do not affect the count.
    pub fn count(&self) -> Result<u64> {
        let (sql, params) = self.builder.build_count();
        tracing::debug!(sql = %sql, "running count");
        let row = self.ctx.connection().query_one(&sql, &params)?;
        match row {
            Some(row) => row.get_as::<u64>(0),
            None => Ok(0),
        }
    }

    /// Whether any row matches the query.
    ///
    /// Runs as a count, so no entities are materialized or tracked.
    pub fn any(&self) -> Result<bool> {
        Ok(self.count()? > 0)
    }

    /// Look up an entity by primary key.
    pub fn find(&self, id: i64) -> Result<Option<Tracked<T>>> {
        let id_col = id_column::<T>().ok_or_else(|| {
            Error::query_message(
                "query",
                format!("table '{}' has no key column", T::table_name()),
            )
        })?;
        let quoted = self.ctx.dialect().quote_identifier(id_col);
        self.filter(&format!("{quoted} = ?"), vec![Value::BigInt(id)])
            .first_or_default()
    }
}
