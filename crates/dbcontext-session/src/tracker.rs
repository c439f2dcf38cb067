//! The change tracker.
//!
//! Entries are kept in the order entities were first tracked, and the save
//! pipeline flushes them in that same order, so statement order is
//! deterministic and matches what the application did.

use crate::tracked::{EntityKey, EntityState, Tracked};
use dbcontext_core::{Dialect, Entity, FieldData, PrimitiveDateTime, field_data, id_column};

/// Type-erased access to one tracked entity, enough for the save pipeline
/// to render and apply statements without knowing the entity type.
pub trait PendingEntity {
    /// The table the entity persists to.
    fn table(&self) -> String;

    /// The primary key column, if the entity declares one.
    fn id_column(&self) -> Option<&'static str>;

    /// The assigned key value, if any.
    fn id_value(&self) -> Option<i64>;

    /// Write a generated key back into the entity.
    fn assign_id(&self, id: i64);

    /// Stamp audit timestamps for an insert (creation and update).
    fn stamp_insert(&self, at: PrimitiveDateTime);

    /// Stamp the update audit timestamp.
    fn stamp_update(&self, at: PrimitiveDateTime);

    /// Reflect the entity's current columns and values.
    fn field_data(&self, exclude_id: bool, dialect: Dialect) -> FieldData;
}

/// [`PendingEntity`] implementation wrapping a typed handle.
pub struct PendingHandle<T: Entity> {
    handle: Tracked<T>,
}

impl<T: Entity> PendingHandle<T> {
    pub fn new(handle: Tracked<T>) -> Self {
        Self { handle }
    }
}

impl<T: Entity> PendingEntity for PendingHandle<T> {
    fn table(&self) -> String {
        T::table_name()
    }

    fn id_column(&self) -> Option<&'static str> {
        id_column::<T>()
    }

    fn id_value(&self) -> Option<i64> {
        self.handle.borrow().id_value()
    }

    fn assign_id(&self, id: i64) {
        self.handle.borrow_mut().set_id(id);
    }

    fn stamp_insert(&self, at: PrimitiveDateTime) {
        let mut entity = self.handle.borrow_mut();
        entity.touch_created(at);
        entity.touch_updated(at);
    }

    fn stamp_update(&self, at: PrimitiveDateTime) {
        self.handle.borrow_mut().touch_updated(at);
    }

    fn field_data(&self, exclude_id: bool, dialect: Dialect) -> FieldData {
        field_data(&*self.handle.borrow(), exclude_id, dialect)
    }
}

/// One tracked entity and its lifecycle state.
pub struct TrackedEntry {
    pub key: EntityKey,
    pub state: EntityState,
    pub pending: Box<dyn PendingEntity>,
}

/// Tracks entity handles and their pending operations, in insertion order.
#[derive(Default)]
pub struct ChangeTracker {
    entries: Vec<TrackedEntry>,
    index: std::collections::HashMap<EntityKey, usize>,
}

impl ChangeTracker {
    /// Create an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of tracked entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no entities are tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether the given handle is tracked.
    #[must_use]
    pub fn contains(&self, key: EntityKey) -> bool {
        self.index.contains_key(&key)
    }

    /// The state of a tracked handle.
    #[must_use]
    pub fn state_of(&self, key: EntityKey) -> Option<EntityState> {
        self.index.get(&key).map(|&i| self.entries[i].state)
    }

    /// Track a new entry. Returns false (and changes nothing) if the key is
    /// already tracked.
    pub fn track(&mut self, key: EntityKey, state: EntityState, pending: Box<dyn PendingEntity>) -> bool {
        if self.index.contains_key(&key) {
            return false;
        }
        self.index.insert(key, self.entries.len());
        self.entries.push(TrackedEntry {
            key,
            state,
            pending,
        });
        true
    }

    /// Overwrite the state of a tracked entry. Returns false if untracked.
    pub fn set_state(&mut self, key: EntityKey, state: EntityState) -> bool {
        if let Some(&i) = self.index.get(&key) {
            self.entries[i].state = state;
            true
        } else {
            false
        }
    }

    /// Stop tracking a handle.
    pub fn remove(&mut self, key: EntityKey) -> bool {
        let Some(position) = self.index.remove(&key) else {
            return false;
        };
        self.entries.remove(position);
        for (i, entry) in self.entries.iter().enumerate().skip(position) {
            self.index.insert(entry.key, i);
        }
        true
    }

    /// Keys in tracking order.
    #[must_use]
    pub fn keys(&self) -> Vec<EntityKey> {
        self.entries.iter().map(|e| e.key).collect()
    }

    /// Borrow a tracked entry.
    #[must_use]
    pub fn entry(&self, key: EntityKey) -> Option<&TrackedEntry> {
        self.index.get(&key).map(|&i| &self.entries[i])
    }

    /// Drop all tracked entries.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.index.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dbcontext_core::BaseEntity;

    fn pending(handle: &Tracked<TestEntity>) -> Box<dyn PendingEntity> {
        Box::new(PendingHandle::new(handle.clone()))
    }

    #[derive(Default, Clone)]
    struct TestEntity {
        base: BaseEntity,
        name: String,
    }

    impl dbcontext_core::EntityPart for TestEntity {
        fn part_fields() -> Vec<dbcontext_core::FieldMeta> {
            let mut fields = BaseEntity::part_fields();
            fields.push(dbcontext_core::FieldMeta::new("name", "name"));
            fields
        }

        fn part_values(&self) -> Vec<dbcontext_core::Value> {
            let mut values = self.base.part_values();
            values.push(dbcontext_core::Value::from(self.name.clone()));
            values
        }

        fn apply_row(&mut self, row: &dbcontext_core::Row) {
            self.base.apply_row(row);
            dbcontext_core::apply_column(&mut self.name, row, "name");
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

    impl Entity for TestEntity {
        fn table_name() -> String {
            "test_entity".to_string()
        }
    }

    #[test]
    fn entries_keep_insertion_order() {
        let mut tracker = ChangeTracker::new();
        let first = Tracked::new(TestEntity::default());
        let second = Tracked::new(TestEntity::default());
        let third = Tracked::new(TestEntity::default());

        tracker.track(first.key(), EntityState::Added, pending(&first));
        tracker.track(second.key(), EntityState::Added, pending(&second));
        tracker.track(third.key(), EntityState::Added, pending(&third));
        tracker.set_state(second.key(), EntityState::Deleted);

        assert_eq!(
            tracker.keys(),
            vec![first.key(), second.key(), third.key()]
        );
    }

    #[test]
    fn retracking_a_key_is_a_no_op() {
        let mut tracker = ChangeTracker::new();
        let handle = Tracked::new(TestEntity::default());
        assert!(tracker.track(handle.key(), EntityState::Added, pending(&handle)));
        assert!(!tracker.track(handle.key(), EntityState::Deleted, pending(&handle)));
        assert_eq!(tracker.state_of(handle.key()), Some(EntityState::Added));
    }

    #[test]
    fn removal_keeps_remaining_order_intact() {
        let mut tracker = ChangeTracker::new();
        let handles: Vec<_> = (0..4).map(|_| Tracked::new(TestEntity::default())).collect();
        for handle in &handles {
            tracker.track(handle.key(), EntityState::Unchanged, pending(handle));
        }

        assert!(tracker.remove(handles[1].key()));
        assert!(!tracker.remove(handles[1].key()));
        assert_eq!(
            tracker.keys(),
            vec![handles[0].key(), handles[2].key(), handles[3].key()]
        );
        assert_eq!(
            tracker.state_of(handles[3].key()),
            Some(EntityState::Unchanged)
        );
    }

    #[test]
    fn pending_handle_reflects_the_live_entity() {
        let handle = Tracked::new(TestEntity {
            name: "alice".to_string(),
            ..TestEntity::default()
        });
        let pending = PendingHandle::new(handle.clone());

        assert_eq!(pending.table(), "test_entity");
        assert_eq!(pending.id_column(), Some("id"));
        assert_eq!(pending.id_value(), None);

        pending.assign_id(9);
        assert_eq!(handle.borrow().base.id, 9);

        let data = pending.field_data(true, Dialect::Sqlite);
        assert_eq!(data.columns, vec!["created_at", "updated_at", "name"]);
    }
}
