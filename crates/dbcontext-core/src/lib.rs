//! Core types and traits for dbcontext.
//!
//! This crate provides the foundational abstractions the engine builds on:
//!
//! - `Entity` and `EntityPart` traits for struct-to-table mapping
//! - `Value` dynamic SQL values and the `FromValue` coercions
//! - `Connection` trait for synchronous database drivers
//! - `Dialect` for placeholder, quoting and key read-back differences
//! - schema reflection turning field metadata into statement inputs

pub mod connection;
pub mod dialect;
pub mod entity;
pub mod error;
pub mod row;
pub mod schema;
pub mod value;

pub use connection::Connection;
pub use dialect::{Dialect, detect_dialect};
pub use entity::{BaseEntity, Entity, EntityPart, FieldMeta, IdField, TimestampField, apply_column};
pub use error::{ConnectionError, Error, QueryError, Result, TypeError};
pub use row::{ColumnInfo, FromValue, Row};
pub use schema::{FieldData, field_data, id_column};
pub use value::{
    TIMESTAMP_FORMAT, TIMESTAMP_FORMAT_SECONDS, Value, format_timestamp, now, parse_timestamp,
};

// Re-exported so derive-generated code can name the timestamp type without
// requiring a direct `time` dependency in user crates.
pub use time::PrimitiveDateTime;
