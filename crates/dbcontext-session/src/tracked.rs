//! Shared entity handles and tracking states.
//!
//! Tracking is keyed by handle identity, not by primary key: two loads of
//! the same database row produce two independent handles. A [`Tracked<T>`]
//! is a cheap clone of a shared cell, so application code and the change
//! tracker observe the same instance.

use serde::{Deserialize, Serialize};
use std::cell::{Ref, RefCell, RefMut};
use std::rc::Rc;

/// Lifecycle state of a tracked entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntityState {
    /// New entity; INSERT on the next save.
    Added,
    /// Loaded or attached; nothing to do on save.
    Unchanged,
    /// Marked dirty; UPDATE on the next save.
    Modified,
    /// Marked for removal; DELETE on the next save.
    Deleted,
}

/// Identity of a tracked handle.
///
/// Derived from the shared cell's address, so clones of one handle compare
/// equal and separately constructed entities never collide while tracked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntityKey(usize);

/// A shared, mutable handle to an entity instance.
pub struct Tracked<T> {
    inner: Rc<RefCell<T>>,
}

impl<T> Tracked<T> {
    /// Wrap an entity in a fresh shared cell.
    #[must_use]
    pub fn new(entity: T) -> Self {
        Self {
            inner: Rc::new(RefCell::new(entity)),
        }
    }

    /// The identity key of this handle.
    #[must_use]
    pub fn key(&self) -> EntityKey {
        EntityKey(Rc::as_ptr(&self.inner) as usize)
    }

    /// Immutably borrow the entity.
    ///
    /// # Panics
    ///
    /// Panics if the entity is currently borrowed mutably.
    #[must_use]
    pub fn borrow(&self) -> Ref<'_, T> {
        self.inner.borrow()
    }

    /// Mutably borrow the entity.
    ///
    /// # Panics
    ///
    /// Panics if the entity is currently borrowed.
    #[must_use]
    pub fn borrow_mut(&self) -> RefMut<'_, T> {
        self.inner.borrow_mut()
    }

    /// Clone the current entity state out of the handle.
    #[must_use]
    pub fn snapshot(&self) -> T
    where
        T: Clone,
    {
        self.inner.borrow().clone()
    }
}

impl<T> Clone for Tracked<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Tracked<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Tracked").field(&self.inner.borrow()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_identity_and_state() {
        let a = Tracked::new(String::from("one"));
        let b = a.clone();
        assert_eq!(a.key(), b.key());

        *b.borrow_mut() = String::from("two");
        assert_eq!(*a.borrow(), "two");
    }

    #[test]
    fn separate_handles_have_distinct_keys() {
        let a = Tracked::new(42_i64);
        let b = Tracked::new(42_i64);
        assert_ne!(a.key(), b.key());
    }

    #[test]
    fn snapshot_detaches_from_the_cell() {
        let a = Tracked::new(vec![1, 2]);
        let copy = a.snapshot();
        a.borrow_mut().push(3);
        assert_eq!(copy, vec![1, 2]);
        assert_eq!(*a.borrow(), vec![1, 2, 3]);
    }
}
