//! The entity context: unit-of-work over a single connection.

use crate::query::QuerySet;
use crate::tracked::{EntityState, Tracked};
use crate::tracker::{ChangeTracker, PendingHandle};
use dbcontext_core::{
    Connection, Dialect, Entity, Error, Result, Value, detect_dialect, now,
};
use dbcontext_query::{build_delete, build_insert, build_update};
use std::cell::RefCell;

/// A unit of work over one database connection.
///
/// The context tracks entity handles, translates fluent queries into SQL
/// for the connection's dialect, and flushes pending inserts, updates and
/// deletes on [`save_changes`](EntityContext::save_changes).
///
/// The context is single-threaded; handles it returns share state through
/// `Rc` and are not `Send`.
pub struct EntityContext<C: Connection> {
    conn: C,
    dialect: Dialect,
    tracker: RefCell<ChangeTracker>,
}

impl<C: Connection> EntityContext<C> {
    /// Open a context, detecting the connection's dialect with probe
    /// queries.
    ///
    /// When no probe succeeds the context falls back to
    /// [`Dialect::default`] and logs a warning; use
    /// [`with_dialect`](EntityContext::with_dialect) to pin the dialect
    /// explicitly.
    pub fn new(conn: C) -> Self {
        let dialect = detect_dialect(&conn).unwrap_or_else(|| {
            let fallback = Dialect::default();
            tracing::warn!(
                fallback = fallback.name(),
                "dialect detection failed; assuming fallback dialect"
            );
            fallback
        });
        Self::with_dialect(conn, dialect)
    }

    /// Open a context with a known dialect, skipping detection.
    pub fn with_dialect(conn: C, dialect: Dialect) -> Self {
        Self {
            conn,
            dialect,
            tracker: RefCell::new(ChangeTracker::new()),
        }
    }

    /// The dialect statements are rendered for.
    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// The underlying connection.
    pub fn connection(&self) -> &C {
        &self.conn
    }

    /// Start a fluent query over an entity type.
    pub fn set<T: Entity>(&self) -> QuerySet<'_, T, C> {
        QuerySet::new(self)
    }

    /// Track a new entity for insertion on the next save.
    pub fn add<T: Entity>(&self, entity: T) -> Tracked<T> {
        let handle = Tracked::new(entity);
        self.tracker.borrow_mut().track(
            handle.key(),
            EntityState::Added,
            Box::new(PendingHandle::new(handle.clone())),
        );
        handle
    }

    /// Track an existing entity as already persisted (no pending work).
    pub fn attach<T: Entity>(&self, entity: T) -> Tracked<T> {
        let handle = Tracked::new(entity);
        self.tracker.borrow_mut().track(
            handle.key(),
            EntityState::Unchanged,
            Box::new(PendingHandle::new(handle.clone())),
        );
        handle
    }

    /// Register a handle materialized by a query as Unchanged.
    pub(crate) fn track_loaded<T: Entity>(&self, handle: &Tracked<T>) {
        self.tracker.borrow_mut().track(
            handle.key(),
            EntityState::Unchanged,
            Box::new(PendingHandle::new(handle.clone())),
        );
    }

    /// Overwrite (or start) tracking for a handle with the given state.
    ///
    /// Last write wins; there is no merge logic between states. The same
    /// entry point serves the read path (registering loaded entities as
    /// Unchanged) and the mutation surface.
    pub fn track<T: Entity>(&self, handle: &Tracked<T>, state: EntityState) {
        let mut tracker = self.tracker.borrow_mut();
        if !tracker.set_state(handle.key(), state) {
            tracker.track(
                handle.key(),
                state,
                Box::new(PendingHandle::new(handle.clone())),
            );
        }
    }

    /// Mark a handle dirty so the next save issues an UPDATE.
    pub fn update<T: Entity>(&self, handle: &Tracked<T>) {
        self.track(handle, EntityState::Modified);
    }

    /// Mark a handle for deletion on the next save.
    ///
    /// The entity must carry a key by save time.
    pub fn delete<T: Entity>(&self, handle: &Tracked<T>) {
        self.track(handle, EntityState::Deleted);
    }

    /// The tracking state of a handle. Untracked handles report Unchanged.
    pub fn state_of<T>(&self, handle: &Tracked<T>) -> EntityState {
        self.tracker
            .borrow()
            .state_of(handle.key())
            .unwrap_or(EntityState::Unchanged)
    }

    /// Whether the handle is registered with the tracker.
    pub fn is_tracked<T>(&self, handle: &Tracked<T>) -> bool {
        self.tracker.borrow().contains(handle.key())
    }

    /// Number of tracked handles.
    pub fn tracked_count(&self) -> usize {
        self.tracker.borrow().len()
    }

    /// Forget all tracked handles without touching the database.
    pub fn clear_tracking(&self) {
        self.tracker.borrow_mut().clear();
    }

    /// Flush pending operations in tracking order.
    ///
    /// Returns the number of entities persisted or deleted. On failure the
    /// already-applied operations are not rolled back; the error reports
    /// how many completed so callers inside an explicit transaction can
    /// react.
    pub fn save_changes(&self) -> Result<u64> {
        let keys = self.tracker.borrow().keys();
        let mut completed = 0_u64;

        for key in keys {
            let Some(state) = self.tracker.borrow().state_of(key) else {
                continue;
            };
            let result = match state {
                EntityState::Unchanged => continue,
                EntityState::Added => self.flush_insert(key),
                EntityState::Modified => self.flush_update(key),
                EntityState::Deleted => self.flush_delete(key),
            };
            match result {
                Ok(()) => completed += 1,
                Err(source) => {
                    return Err(Error::Save {
                        completed,
                        source: Box::new(source),
                    });
                }
            }
        }

        tracing::debug!(completed, "save completed");
        Ok(completed)
    }

    fn flush_insert(&self, key: crate::tracked::EntityKey) -> Result<()> {
        let at = now();
        let (sql, params, id_col) = {
            let tracker = self.tracker.borrow();
            let entry = tracker
                .entry(key)
                .ok_or_else(|| Error::query_message("insert", "entity is no longer tracked"))?;
            entry.pending.stamp_insert(at);
            let data = entry.pending.field_data(true, self.dialect);
            let id_col = entry.pending.id_column();
            let returning = if self.dialect.uses_returning() {
                id_col
            } else {
                None
            };
            let sql = build_insert(self.dialect, &entry.pending.table(), &data, returning);
            (sql, data.values, id_col)
        };

        tracing::debug!(sql = %sql, "flushing insert");
        let id = if self.dialect.uses_returning() && id_col.is_some() {
            let row = self.conn.query_one(&sql, &params)?;
            row.and_then(|r| r.get(0).and_then(Value::as_i64))
                .unwrap_or(0)
        } else {
            self.conn.insert(&sql, &params)?
        };

        {
            let tracker = self.tracker.borrow();
            if let Some(entry) = tracker.entry(key) {
                if id > 0 && id_col.is_some() {
                    entry.pending.assign_id(id);
                }
            }
        }
        self.tracker.borrow_mut().set_state(key, EntityState::Unchanged);
        Ok(())
    }

    fn flush_update(&self, key: crate::tracked::EntityKey) -> Result<()> {
        let at = now();
        let (sql, params) = {
            let tracker = self.tracker.borrow();
            let entry = tracker
                .entry(key)
                .ok_or_else(|| Error::query_message("update", "entity is no longer tracked"))?;
            let table = entry.pending.table();
            let id_col = entry.pending.id_column().ok_or_else(|| {
                Error::query_message("update", format!("table '{table}' has no key column"))
            })?;
            let id = entry.pending.id_value().ok_or_else(|| {
                Error::query_message("update", format!("entity in table '{table}' has no key"))
            })?;
            entry.pending.stamp_update(at);
            let data = entry.pending.field_data(true, self.dialect);
            let sql = build_update(self.dialect, &table, &data, id_col);
            let mut params = data.values;
            params.push(Value::BigInt(id));
            (sql, params)
        };

        tracing::debug!(sql = %sql, "flushing update");
        self.conn.execute(&sql, &params)?;
        self.tracker.borrow_mut().set_state(key, EntityState::Unchanged);
        Ok(())
    }

    fn flush_delete(&self, key: crate::tracked::EntityKey) -> Result<()> {
        let (sql, params) = {
            let tracker = self.tracker.borrow();
            let entry = tracker
                .entry(key)
                .ok_or_else(|| Error::query_message("delete", "entity is no longer tracked"))?;
            let table = entry.pending.table();
            let id_col = entry.pending.id_column().ok_or_else(|| {
                Error::query_message("delete", format!("table '{table}' has no key column"))
            })?;
            let id = entry.pending.id_value().ok_or_else(|| {
                Error::query_message("delete", format!("entity in table '{table}' has no key"))
            })?;
            let sql = build_delete(self.dialect, &table, id_col);
            (sql, vec![Value::BigInt(id)])
        };

        tracing::debug!(sql = %sql, "flushing delete");
        self.conn.execute(&sql, &params)?;
        self.tracker.borrow_mut().remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dbcontext_core::{
        BaseEntity, EntityPart, FieldMeta, PrimitiveDateTime, Row, apply_column,
    };
    use std::cell::{Cell, RefCell};

    #[derive(Default, Clone)]
    struct User {
        base: BaseEntity,
        name: String,
    }

    impl EntityPart for User {
        fn part_fields() -> Vec<FieldMeta> {
            let mut fields = BaseEntity::part_fields();
            fields.push(FieldMeta::new("name", "name"));
            fields
        }

        fn part_values(&self) -> Vec<Value> {
            let mut values = self.base.part_values();
            values.push(Value::from(self.name.clone()));
            values
        }

        fn apply_row(&mut self, row: &Row) {
            self.base.apply_row(row);
            apply_column(&mut self.name, row, "name");
        }

        fn id_value(&self) -> Option<i64> {
            self.base.id_value()
        }

        fn set_id(&mut self, id: i64) -> bool {
            self.base.set_id(id)
        }

        fn touch_created(&mut self, at: PrimitiveDateTime) -> bool {
            self.base.touch_created(at)
        }

        fn touch_updated(&mut self, at: PrimitiveDateTime) -> bool {
            self.base.touch_updated(at)
        }
    }

    impl Entity for User {
        fn table_name() -> String {
            "user".to_string()
        }
    }

    /// Records every statement and serves canned rows.
    struct MockConnection {
        log: RefCell<Vec<(String, Vec<Value>)>>,
        rows: RefCell<Vec<Row>>,
        next_id: Cell<i64>,
        /// Statements containing this substring fail.
        fail_on: Option<&'static str>,
        /// The probe statement this backend answers, if any.
        probe: Option<&'static str>,
    }

    impl MockConnection {
        fn new() -> Self {
            Self {
                log: RefCell::new(Vec::new()),
                rows: RefCell::new(Vec::new()),
                next_id: Cell::new(0),
                fail_on: None,
                probe: None,
            }
        }

        fn check(&self, sql: &str) -> Result<()> {
            if let Some(pattern) = self.fail_on {
                if sql.contains(pattern) {
                    return Err(Error::query_message("query", "injected failure"));
                }
            }
            Ok(())
        }

        fn statements(&self) -> Vec<String> {
            self.log.borrow().iter().map(|(sql, _)| sql.clone()).collect()
        }
    }

    impl Connection for MockConnection {
        fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
            if sql.starts_with("SELECT pg_backend_pid")
                || sql.starts_with("SELECT @@version_comment")
                || sql.starts_with("SELECT sqlite_version")
            {
                return if self.probe == Some(sql) {
                    Ok(vec![Row::new(vec!["v".into()], vec![Value::BigInt(1)])])
                } else {
                    Err(Error::query_message("query", "unknown function"))
                };
            }
            self.check(sql)?;
            self.log.borrow_mut().push((sql.to_string(), params.to_vec()));
            Ok(self.rows.borrow().clone())
        }

        fn execute(&self, sql: &str, params: &[Value]) -> Result<u64> {
            self.check(sql)?;
            self.log.borrow_mut().push((sql.to_string(), params.to_vec()));
            Ok(1)
        }

        fn insert(&self, sql: &str, params: &[Value]) -> Result<i64> {
            self.check(sql)?;
            self.log.borrow_mut().push((sql.to_string(), params.to_vec()));
            self.next_id.set(self.next_id.get() + 1);
            Ok(self.next_id.get())
        }
    }

    fn sqlite_ctx() -> EntityContext<MockConnection> {
        EntityContext::with_dialect(MockConnection::new(), Dialect::Sqlite)
    }

    #[test]
    fn add_then_save_assigns_key_and_settles_state() {
        let ctx = sqlite_ctx();
        let user = ctx.add(User {
            name: "alice".to_string(),
            ..User::default()
        });
        assert_eq!(ctx.state_of(&user), EntityState::Added);

        let saved = ctx.save_changes().unwrap();
        assert_eq!(saved, 1);
        assert_eq!(ctx.state_of(&user), EntityState::Unchanged);
        assert!(ctx.is_tracked(&user));
        assert_eq!(user.borrow().base.id, 1);
        assert!(user.borrow().base.created_at.is_some());
        assert_eq!(
            user.borrow().base.created_at,
            user.borrow().base.updated_at
        );

        let statements = ctx.connection().statements();
        assert_eq!(statements.len(), 1);
        assert!(statements[0].starts_with("INSERT INTO \"user\""));
    }

    #[test]
    fn second_save_is_a_no_op() {
        let ctx = sqlite_ctx();
        ctx.add(User::default());
        assert_eq!(ctx.save_changes().unwrap(), 1);
        assert_eq!(ctx.save_changes().unwrap(), 0);
        assert_eq!(ctx.connection().statements().len(), 1);
    }

    #[test]
    fn save_flushes_in_tracking_order() {
        let ctx = sqlite_ctx();
        let existing = ctx.attach(User {
            base: BaseEntity {
                id: 7,
                ..BaseEntity::default()
            },
            name: "old".to_string(),
        });
        let fresh = ctx.add(User {
            name: "new".to_string(),
            ..User::default()
        });
        ctx.delete(&existing);

        assert_eq!(ctx.save_changes().unwrap(), 2);
        let statements = ctx.connection().statements();
        assert!(statements[0].starts_with("DELETE FROM"));
        assert!(statements[1].starts_with("INSERT INTO"));
        assert!(!ctx.is_tracked(&existing));
        assert_eq!(ctx.state_of(&existing), EntityState::Unchanged);
        assert_eq!(ctx.state_of(&fresh), EntityState::Unchanged);
    }

    #[test]
    fn update_renders_set_list_then_key() {
        let ctx = sqlite_ctx();
        let user = ctx.attach(User {
            base: BaseEntity {
                id: 5,
                ..BaseEntity::default()
            },
            name: "before".to_string(),
        });
        user.borrow_mut().name = "after".to_string();
        ctx.update(&user);
        assert_eq!(ctx.state_of(&user), EntityState::Modified);

        assert_eq!(ctx.save_changes().unwrap(), 1);
        let log = ctx.connection().log.borrow();
        let (sql, params) = &log[0];
        assert_eq!(
            sql,
            "UPDATE \"user\" SET \"created_at\" = ?, \"updated_at\" = ?, \"name\" = ? \
             WHERE \"id\" = ?"
        );
        assert_eq!(params.last(), Some(&Value::BigInt(5)));
        assert_eq!(params[2], Value::Text("after".to_string()));
        drop(log);
        assert_eq!(ctx.state_of(&user), EntityState::Unchanged);
        assert!(user.borrow().base.updated_at.is_some());
        assert!(user.borrow().base.created_at.is_none());
    }

    #[test]
    fn last_write_wins_between_states() {
        let ctx = sqlite_ctx();
        let user = ctx.add(User::default());
        assert_eq!(ctx.state_of(&user), EntityState::Added);

        ctx.update(&user);
        assert_eq!(ctx.state_of(&user), EntityState::Modified);

        ctx.delete(&user);
        assert_eq!(ctx.state_of(&user), EntityState::Deleted);

        ctx.track(&user, EntityState::Added);
        assert_eq!(ctx.state_of(&user), EntityState::Added);
        assert_eq!(ctx.tracked_count(), 1);
    }

    #[test]
    fn untracked_handles_report_unchanged() {
        let ctx = sqlite_ctx();
        let user = Tracked::new(User::default());
        assert_eq!(ctx.state_of(&user), EntityState::Unchanged);
        assert!(!ctx.is_tracked(&user));
    }

    #[test]
    fn save_error_reports_completed_operations() {
        let mut conn = MockConnection::new();
        conn.fail_on = Some("DELETE");
        let ctx = EntityContext::with_dialect(conn, Dialect::Sqlite);

        ctx.add(User::default());
        let doomed = ctx.attach(User {
            base: BaseEntity {
                id: 3,
                ..BaseEntity::default()
            },
            ..User::default()
        });
        ctx.delete(&doomed);

        let err = ctx.save_changes().unwrap_err();
        match err {
            Error::Save { completed, .. } => assert_eq!(completed, 1),
            other => panic!("expected Save error, got {other}"),
        }
        // The delete is still pending; the insert settled.
        assert_eq!(ctx.state_of(&doomed), EntityState::Deleted);
    }

    #[test]
    fn update_without_a_key_fails_the_save() {
        let ctx = sqlite_ctx();
        let user = ctx.attach(User::default());
        ctx.update(&user);
        let err = ctx.save_changes().unwrap_err();
        assert!(err.to_string().contains("no key"));
    }

    #[test]
    fn query_chaining_leaves_the_base_untouched() {
        let ctx = sqlite_ctx();
        let base = ctx.set::<User>().filter("name = ?", vec!["a".into()]);
        let narrowed = base.take(1);

        base.to_list().unwrap();
        narrowed.to_list().unwrap();

        let statements = ctx.connection().statements();
        assert_eq!(statements[0], "SELECT * FROM \"user\" WHERE name = ?");
        assert_eq!(
            statements[1],
            "SELECT * FROM \"user\" WHERE name = ? LIMIT 1"
        );
    }

    #[test]
    fn loaded_entities_are_tracked_unless_opted_out() {
        let ctx = sqlite_ctx();
        ctx.connection().rows.borrow_mut().push(Row::new(
            vec!["id".into(), "name".into()],
            vec![Value::BigInt(4), Value::Text("bea".into())],
        ));

        let loaded = ctx.set::<User>().to_list().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].borrow().name, "bea");
        assert_eq!(ctx.state_of(&loaded[0]), EntityState::Unchanged);
        assert_eq!(ctx.tracked_count(), 1);

        let detached = ctx.set::<User>().as_no_tracking().to_list().unwrap();
        assert!(!ctx.is_tracked(&detached[0]));
        assert_eq!(ctx.tracked_count(), 1);
    }

    #[test]
    fn find_filters_by_the_key_column() {
        let ctx = sqlite_ctx();
        let missing = ctx.set::<User>().find(3).unwrap();
        assert!(missing.is_none());
        let statements = ctx.connection().statements();
        assert_eq!(
            statements[0],
            "SELECT * FROM \"user\" WHERE \"id\" = ? LIMIT 1"
        );
    }

    #[test]
    fn detection_falls_back_to_the_default_dialect() {
        let ctx = EntityContext::new(MockConnection::new());
        assert_eq!(ctx.dialect(), Dialect::default());

        let mut conn = MockConnection::new();
        conn.probe = Some("SELECT sqlite_version()");
        let ctx = EntityContext::new(conn);
        assert_eq!(ctx.dialect(), Dialect::Sqlite);
    }

    #[test]
    fn postgres_inserts_read_the_key_via_returning() {
        let conn = MockConnection::new();
        conn.rows.borrow_mut().push(Row::new(
            vec!["id".into()],
            vec![Value::BigInt(21)],
        ));
        let ctx = EntityContext::with_dialect(conn, Dialect::Postgres);

        let user = ctx.add(User::default());
        assert_eq!(ctx.save_changes().unwrap(), 1);
        assert_eq!(user.borrow().base.id, 21);

        let statements = ctx.connection().statements();
        assert!(statements[0].ends_with("RETURNING \"id\""));
        assert!(statements[0].contains("$1"));
    }
}
