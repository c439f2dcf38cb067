//! Entity metadata traits.
//!
//! Entities are plain structs mapped onto tables. The derive macro in
//! `dbcontext-macros` implements [`EntityPart`] and [`Entity`] for user
//! types; [`BaseEntity`] is the hand-written bookkeeping struct most
//! entities embed for their key and audit timestamps.

use crate::row::{FromValue, Row};
use crate::value::Value;
use time::PrimitiveDateTime;

/// Static metadata for one mapped field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldMeta {
    /// Rust field name.
    pub name: &'static str,
    /// Column name the field maps to.
    pub column: &'static str,
    /// Whether this field is the surrogate primary key.
    pub primary_key: bool,
    /// Whether this field is excluded from persistence.
    pub skip: bool,
}

impl FieldMeta {
    /// Create metadata for a field whose column matches its name.
    #[must_use]
    pub const fn new(name: &'static str, column: &'static str) -> Self {
        Self {
            name,
            column,
            primary_key: false,
            skip: false,
        }
    }

    /// Mark this field as the primary key.
    #[must_use]
    pub const fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    /// Exclude this field from persistence.
    #[must_use]
    pub const fn skip(mut self) -> Self {
        self.skip = true;
        self
    }
}

/// A struct (or embedded fragment of one) whose fields map onto columns.
///
/// Field order is significant: `part_values` must yield values in the same
/// order as `part_fields`. Embedded parts splice their fields into the
/// owner's lists, so a whole entity always presents one flat column set.
pub trait EntityPart {
    /// Metadata for the mapped fields, in declaration order.
    fn part_fields() -> Vec<FieldMeta>
    where
        Self: Sized;

    /// Current values, aligned with `part_fields`.
    fn part_values(&self) -> Vec<Value>;

    /// Copy matching columns from a result row into this struct.
    ///
    /// Columns absent from the row and values that fail to coerce are
    /// skipped; fields keep their current value.
    fn apply_row(&mut self, row: &Row);

    /// The primary key value, if one has been assigned.
    fn id_value(&self) -> Option<i64>;

    /// Assign a generated key. Returns true if this part owns the key field.
    fn set_id(&mut self, id: i64) -> bool;

    /// Stamp the creation timestamp. Returns true if this part owns one.
    fn touch_created(&mut self, at: PrimitiveDateTime) -> bool;

    /// Stamp the update timestamp. Returns true if this part owns one.
    fn touch_updated(&mut self, at: PrimitiveDateTime) -> bool;
}

/// A persistable entity rooted at a table.
pub trait Entity: EntityPart + Default + 'static {
    /// The table this entity maps to.
    fn table_name() -> String;

    /// Materialize an entity from a result row.
    ///
    /// Starts from `Default` and applies whatever columns the row carries,
    /// so projections with missing columns still materialize.
    fn from_row(row: &Row) -> Self {
        let mut entity = Self::default();
        entity.apply_row(row);
        entity
    }
}

/// Storage types usable as a surrogate primary key.
///
/// Plain integers treat zero as "not yet assigned"; `Option` types use
/// `None`.
pub trait IdField {
    /// The assigned key, or `None` when the entity has not been persisted.
    fn as_id(&self) -> Option<i64>;

    /// Store a generated key.
    fn assign(&mut self, id: i64);
}

impl IdField for i64 {
    fn as_id(&self) -> Option<i64> {
        if *self == 0 { None } else { Some(*self) }
    }

    fn assign(&mut self, id: i64) {
        *self = id;
    }
}

impl IdField for Option<i64> {
    fn as_id(&self) -> Option<i64> {
        *self
    }

    fn assign(&mut self, id: i64) {
        *self = Some(id);
    }
}

impl IdField for u64 {
    fn as_id(&self) -> Option<i64> {
        if *self == 0 {
            None
        } else {
            i64::try_from(*self).ok()
        }
    }

    fn assign(&mut self, id: i64) {
        *self = u64::try_from(id).unwrap_or_default();
    }
}

impl IdField for Option<u64> {
    fn as_id(&self) -> Option<i64> {
        self.and_then(|v| i64::try_from(v).ok())
    }

    fn assign(&mut self, id: i64) {
        *self = Some(u64::try_from(id).unwrap_or_default());
    }
}

/// Storage types usable as an automatic audit timestamp.
pub trait TimestampField {
    /// Write the given instant into the field.
    fn stamp(&mut self, at: PrimitiveDateTime);

    /// The stored instant, if any.
    fn value(&self) -> Option<PrimitiveDateTime>;
}

impl TimestampField for PrimitiveDateTime {
    fn stamp(&mut self, at: PrimitiveDateTime) {
        *self = at;
    }

    fn value(&self) -> Option<PrimitiveDateTime> {
        Some(*self)
    }
}

impl TimestampField for Option<PrimitiveDateTime> {
    fn stamp(&mut self, at: PrimitiveDateTime) {
        *self = Some(at);
    }

    fn value(&self) -> Option<PrimitiveDateTime> {
        *self
    }
}

/// Coerce a row column into a field, leaving the field untouched when the
/// column is missing or the value does not convert.
pub fn apply_column<T: FromValue>(target: &mut T, row: &Row, column: &str) {
    if let Some(value) = row.get_by_name(column) {
        if let Ok(converted) = T::from_value(value) {
            *target = converted;
        }
    }
}

/// Standard bookkeeping fields most entities embed: a surrogate key and
/// creation/update audit timestamps.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BaseEntity {
    /// Surrogate primary key; zero until the first save assigns it.
    pub id: i64,
    /// Set once, on first insert.
    pub created_at: Option<PrimitiveDateTime>,
    /// Refreshed on every insert and update.
    pub updated_at: Option<PrimitiveDateTime>,
}

impl EntityPart for BaseEntity {
    fn part_fields() -> Vec<FieldMeta> {
        vec![
            FieldMeta::new("id", "id").primary_key(),
            FieldMeta::new("created_at", "created_at"),
            FieldMeta::new("updated_at", "updated_at"),
        ]
    }

    fn part_values(&self) -> Vec<Value> {
        vec![
            Value::from(self.id),
            Value::from(self.created_at),
            Value::from(self.updated_at),
        ]
    }

    fn apply_row(&mut self, row: &Row) {
        apply_column(&mut self.id, row, "id");
        apply_column(&mut self.created_at, row, "created_at");
        apply_column(&mut self.updated_at, row, "updated_at");
    }

    fn id_value(&self) -> Option<i64> {
        self.id.as_id()
    }

    fn set_id(&mut self, id: i64) -> bool {
        self.id.assign(id);
        true
    }

    fn touch_created(&mut self, at: PrimitiveDateTime) -> bool {
        self.created_at.stamp(at);
        true
    }

    fn touch_updated(&mut self, at: PrimitiveDateTime) -> bool {
        self.updated_at.stamp(at);
        true
    }
}
