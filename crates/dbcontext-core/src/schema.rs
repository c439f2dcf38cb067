//! Schema reflection over entity metadata.
//!
//! Turns the static field lists entities expose into the column/value/
//! placeholder triples statement builders consume.

use crate::dialect::Dialect;
use crate::entity::EntityPart;
use crate::value::Value;

/// The persisted columns of one entity instance, ready for statement
/// assembly.
#[derive(Debug, Clone)]
pub struct FieldData {
    /// Column names, in field declaration order.
    pub columns: Vec<&'static str>,
    /// Bound values, aligned with `columns`.
    pub values: Vec<Value>,
    /// Dialect-specific placeholders, aligned with `columns`.
    pub placeholders: Vec<String>,
}

impl FieldData {
    /// Whether no columns survived filtering.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Number of persisted columns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.columns.len()
    }
}

/// Collect the persistable columns and current values of an entity.
///
/// Skip-marked fields are always excluded; the primary key is excluded when
/// `exclude_id` is set (inserts and the SET list of updates). Placeholders
/// are numbered from 1 in the order the columns appear.
pub fn field_data<T: EntityPart>(entity: &T, exclude_id: bool, dialect: Dialect) -> FieldData {
    let fields = T::part_fields();
    let values = entity.part_values();
    debug_assert_eq!(fields.len(), values.len());

    let mut data = FieldData {
        columns: Vec::with_capacity(fields.len()),
        values: Vec::with_capacity(fields.len()),
        placeholders: Vec::with_capacity(fields.len()),
    };
    for (meta, value) in fields.iter().zip(values) {
        if meta.skip || (exclude_id && meta.primary_key) {
            continue;
        }
        data.placeholders
            .push(dialect.placeholder(data.columns.len() + 1));
        data.columns.push(meta.column);
        data.values.push(value);
    }
    data
}

/// The primary key column of an entity type, if it declares one.
#[must_use]
pub fn id_column<T: EntityPart>() -> Option<&'static str> {
    T::part_fields()
        .iter()
        .find(|meta| meta.primary_key && !meta.skip)
        .map(|meta| meta.column)
}
