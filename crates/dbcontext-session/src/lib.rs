//! Entity context and change tracking for dbcontext.
//!
//! `dbcontext-session` is the unit-of-work layer. It coordinates tracked
//! entity handles, pending-operation bookkeeping, and statement execution
//! over a `Connection`.
//!
//! # Role In The Architecture
//!
//! - **Change tracking**: records inserts, updates, and deletes per handle,
//!   in the order entities were first tracked.
//! - **Fluent queries**: `QuerySet` composes SELECTs and materializes
//!   tracked handles.
//! - **Save pipeline**: `save_changes` renders dialect-correct statements
//!   and applies generated keys and audit timestamps back to entities.
//!
//! # Design Philosophy
//!
//! - **Explicit over implicit**: nothing touches the database until
//!   `save_changes` or a query terminal runs.
//! - **Handle identity**: tracking is keyed by handle, not primary key;
//!   clones of a handle refer to the same tracked instance.
//! - **Type erasure**: the tracker stores `Box<dyn PendingEntity>` so one
//!   context tracks heterogeneous entity types.
//!
//! # Example
//!
//! ```ignore
//! let ctx = EntityContext::new(conn);
//!
//! // Track a new entity (INSERTed on save)
//! let hero = ctx.add(Hero { name: "Deadpond".into(), ..Hero::default() });
//!
//! // Query with a fluent chain
//! let adults = ctx.set::<Hero>()
//!     .filter("age >= ?", params![18])
//!     .order_by("name")
//!     .to_list()?;
//!
//! // Mutate and mark dirty
//! hero.borrow_mut().name = "Deadpond II".into();
//! ctx.update(&hero);
//!
//! // Flush pending changes
//! let saved = ctx.save_changes()?;
//! ```

pub mod context;
pub mod query;
pub mod tracked;
pub mod tracker;

pub use context::EntityContext;
pub use query::QuerySet;
pub use tracked::{EntityKey, EntityState, Tracked};
pub use tracker::{ChangeTracker, PendingEntity, PendingHandle, TrackedEntry};
