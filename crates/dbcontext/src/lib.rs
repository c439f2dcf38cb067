//! dbcontext - change tracking and query translation for SQL databases.
//!
//! dbcontext brings the DbContext working pattern to Rust:
//!
//! - ORM-style struct mapping with a derive macro
//! - A unit-of-work context that tracks adds, updates and deletes
//! - A fluent, immutable query builder
//! - Dialect-aware SQL generation (PostgreSQL, MySQL, SQLite)
//! - Automatic surrogate keys and audit timestamps
//!
//! # Quick Start
//!
//! ```ignore
//! use dbcontext::prelude::*;
//!
//! #[derive(Entity, Default, Debug, Clone)]
//! struct Hero {
//!     #[entity(embed)]
//!     base: BaseEntity,
//!     name: String,
//!     age: Option<i32>,
//! }
//!
//! fn example() -> Result<()> {
//!     let conn = SqliteConnection::open_in_memory()?;
//!     let ctx = EntityContext::with_dialect(conn, Dialect::Sqlite);
//!
//!     // Track a new hero; INSERT happens on save
//!     let hero = ctx.add(Hero {
//!         name: "Spider-Man".to_string(),
//!         age: Some(25),
//!         ..Hero::default()
//!     });
//!     ctx.save_changes()?;
//!
//!     // Query with a fluent chain
//!     let adults = ctx.set::<Hero>()
//!         .filter("age >= ?", params![18])
//!         .order_by("name")
//!         .to_list()?;
//!
//!     // Mutate through the handle, mark dirty, save
//!     hero.borrow_mut().age = Some(26);
//!     ctx.update(&hero);
//!     ctx.save_changes()?;
//!
//!     // Mark for deletion
//!     ctx.delete(&hero);
//!     ctx.save_changes()?;
//!     Ok(())
//! }
//! ```

pub use dbcontext_core::{
    BaseEntity,
    ColumnInfo,
    Connection,
    ConnectionError,
    Dialect,
    // Entity mapping (Entity is the trait; the derive comes from the
    // macros crate below)
    Entity,
    EntityPart,
    Error,
    FieldData,
    FieldMeta,
    FromValue,
    IdField,
    PrimitiveDateTime,
    QueryError,
    Result,
    Row,
    TimestampField,
    TypeError,
    Value,
    apply_column,
    detect_dialect,
    field_data,
    format_timestamp,
    id_column,
    now,
    parse_timestamp,
};

pub use dbcontext_macros::Entity;

pub use dbcontext_query::{SelectBuilder, build_delete, build_insert, build_update};

pub use dbcontext_session::{
    ChangeTracker, EntityContext, EntityKey, EntityState, QuerySet, Tracked,
};

pub use dbcontext_sqlite::SqliteConnection;

/// Prelude module for convenient imports.
///
/// ```ignore
/// use dbcontext::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        BaseEntity, Connection, Dialect, Entity, EntityContext, EntityState, Error, QuerySet,
        Result, Row, SqliteConnection, Tracked, Value,
    };
    pub use dbcontext_core::params;
}

// ============================================================================
// Derive Macro Support Tests
// ============================================================================
//
// Compile-time checks that the Entity derive handles the attribute surface:
// embedded parts, column overrides, skipped fields, and the id/created_at/
// updated_at naming conventions.
