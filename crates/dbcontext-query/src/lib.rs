//! SQL statement builders for dbcontext.
//!
//! This crate renders dialect-correct SQL text from the metadata the core
//! crate reflects: SELECT statements for the fluent query layer, and the
//! INSERT/UPDATE/DELETE statements the change tracker flushes. Builders
//! are pure; execution happens in the session layer.

pub mod select;
pub mod write;

pub use select::SelectBuilder;
pub use write::{build_delete, build_insert, build_update};
