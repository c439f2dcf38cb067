//! Dynamic SQL values.

use serde::{Deserialize, Serialize};
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use time::{OffsetDateTime, PrimitiveDateTime};

/// The fixed textual layout used when binding timestamps and when coercing
/// text columns back into timestamps.
pub const TIMESTAMP_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second].[subsecond digits:6]");

/// Secondary layout accepted on the read path for rows written without
/// subsecond precision (for example by external tooling).
pub const TIMESTAMP_FORMAT_SECONDS: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");

/// Render a timestamp in the fixed layout.
pub fn format_timestamp(ts: PrimitiveDateTime) -> String {
    ts.format(TIMESTAMP_FORMAT).unwrap_or_default()
}

/// Parse a timestamp from the fixed layout (subseconds optional).
pub fn parse_timestamp(s: &str) -> Option<PrimitiveDateTime> {
    PrimitiveDateTime::parse(s, TIMESTAMP_FORMAT)
        .or_else(|_| PrimitiveDateTime::parse(s, TIMESTAMP_FORMAT_SECONDS))
        .ok()
}

/// Current wall-clock time (UTC) as the naive timestamp entities carry.
///
/// Truncated to microseconds, the precision the fixed layout persists, so
/// a stamped value compares equal after a round trip through the database.
pub fn now() -> PrimitiveDateTime {
    let utc = OffsetDateTime::now_utc();
    let ts = PrimitiveDateTime::new(utc.date(), utc.time());
    ts.replace_nanosecond(ts.nanosecond() - ts.nanosecond() % 1000)
        .unwrap_or(ts)
}

/// A dynamically-typed SQL value.
///
/// This enum represents the scalar values the engine binds as statement
/// parameters and reads back from result rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// NULL value
    Null,

    /// Boolean value
    Bool(bool),

    /// 8-bit signed integer
    TinyInt(i8),

    /// 16-bit signed integer
    SmallInt(i16),

    /// 32-bit signed integer
    Int(i32),

    /// 64-bit signed integer
    BigInt(i64),

    /// 32-bit floating point
    Float(f32),

    /// 64-bit floating point
    Double(f64),

    /// Text string
    Text(String),

    /// Binary data
    Bytes(Vec<u8>),

    /// Timestamp without timezone
    Timestamp(PrimitiveDateTime),
}

impl Value {
    /// Check if this value is NULL.
    pub const fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Get the SQL type name of this value.
    pub const fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "NULL",
            Value::Bool(_) => "BOOLEAN",
            Value::TinyInt(_) => "TINYINT",
            Value::SmallInt(_) => "SMALLINT",
            Value::Int(_) => "INTEGER",
            Value::BigInt(_) => "BIGINT",
            Value::Float(_) => "REAL",
            Value::Double(_) => "DOUBLE",
            Value::Text(_) => "TEXT",
            Value::Bytes(_) => "BLOB",
            Value::Timestamp(_) => "TIMESTAMP",
        }
    }

    /// Try to convert this value to a bool.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            Value::TinyInt(v) => Some(*v != 0),
            Value::SmallInt(v) => Some(*v != 0),
            Value::Int(v) => Some(*v != 0),
            Value::BigInt(v) => Some(*v != 0),
            _ => None,
        }
    }

    /// Try to convert this value to an i64.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::TinyInt(v) => Some(i64::from(*v)),
            Value::SmallInt(v) => Some(i64::from(*v)),
            Value::Int(v) => Some(i64::from(*v)),
            Value::BigInt(v) => Some(*v),
            Value::Bool(v) => Some(i64::from(*v)),
            _ => None,
        }
    }

    /// Try to convert this value to an f64.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(f64::from(*v)),
            Value::Double(v) => Some(*v),
            Value::TinyInt(v) => Some(f64::from(*v)),
            Value::SmallInt(v) => Some(f64::from(*v)),
            Value::Int(v) => Some(f64::from(*v)),
            Value::BigInt(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// Try to get this value as a string reference.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Try to interpret this value as a timestamp.
    ///
    /// Text values are parsed with the fixed layout, which is how rows read
    /// back from drivers that store timestamps textually are coerced.
    pub fn as_timestamp(&self) -> Option<PrimitiveDateTime> {
        match self {
            Value::Timestamp(ts) => Some(*ts),
            Value::Text(s) => parse_timestamp(s),
            _ => None,
        }
    }

    /// Convert a `u64` to `Value`, clamping to `i64::MAX` if it overflows.
    ///
    /// A warning is logged when clamping occurs.
    #[must_use]
    pub fn from_u64_clamped(v: u64) -> Self {
        if let Ok(signed) = i64::try_from(v) {
            Value::BigInt(signed)
        } else {
            tracing::warn!(value = v, "u64 value exceeds i64::MAX; clamping");
            Value::BigInt(i64::MAX)
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i8> for Value {
    fn from(v: i8) -> Self {
        Value::TinyInt(v)
    }
}

impl From<i16> for Value {
    fn from(v: i16) -> Self {
        Value::SmallInt(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::BigInt(v)
    }
}

impl From<u8> for Value {
    fn from(v: u8) -> Self {
        Value::SmallInt(i16::from(v))
    }
}

impl From<u16> for Value {
    fn from(v: u16) -> Self {
        Value::Int(i32::from(v))
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::BigInt(i64::from(v))
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::from_u64_clamped(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

impl From<PrimitiveDateTime> for Value {
    fn from(v: PrimitiveDateTime) -> Self {
        Value::Timestamp(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

/// Build a `Vec<Value>` from heterogeneous parameters.
///
/// ```
/// use dbcontext_core::{params, Value};
///
/// let p = params!["alice", 30_i64, true];
/// assert_eq!(p[0], Value::Text("alice".into()));
/// ```
#[macro_export]
macro_rules! params {
    () => {
        Vec::<$crate::Value>::new()
    };
    ($($v:expr),+ $(,)?) => {
        vec![$($crate::Value::from($v)),+]
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn from_impls_pick_natural_variants() {
        assert_eq!(Value::from(true), Value::Bool(true));
        assert_eq!(Value::from(7_i8), Value::TinyInt(7));
        assert_eq!(Value::from(7_i32), Value::Int(7));
        assert_eq!(Value::from(7_u32), Value::BigInt(7));
        assert_eq!(Value::from("hi"), Value::Text("hi".into()));
        assert_eq!(Value::from(None::<i64>), Value::Null);
        assert_eq!(Value::from(Some(5_i64)), Value::BigInt(5));
    }

    #[test]
    fn u64_clamps_instead_of_wrapping() {
        assert_eq!(Value::from(42_u64), Value::BigInt(42));
        assert_eq!(Value::from(u64::MAX), Value::BigInt(i64::MAX));
    }

    #[test]
    fn as_i64_spans_integer_family() {
        assert_eq!(Value::TinyInt(3).as_i64(), Some(3));
        assert_eq!(Value::SmallInt(3).as_i64(), Some(3));
        assert_eq!(Value::Int(3).as_i64(), Some(3));
        assert_eq!(Value::BigInt(3).as_i64(), Some(3));
        assert_eq!(Value::Text("3".into()).as_i64(), None);
    }

    #[test]
    fn timestamp_round_trips_through_fixed_layout() {
        let ts = datetime!(2024-05-17 09:30:01.250000);
        let text = format_timestamp(ts);
        assert_eq!(text, "2024-05-17 09:30:01.250000");
        assert_eq!(parse_timestamp(&text), Some(ts));
    }

    #[test]
    fn now_survives_the_fixed_layout() {
        let ts = now();
        assert_eq!(ts.nanosecond() % 1000, 0);
        assert_eq!(parse_timestamp(&format_timestamp(ts)), Some(ts));
    }

    #[test]
    fn timestamp_parse_accepts_missing_subseconds() {
        let ts = parse_timestamp("2024-05-17 09:30:01").unwrap();
        assert_eq!(ts, datetime!(2024-05-17 09:30:01));
        assert_eq!(parse_timestamp("not a timestamp"), None);
    }

    #[test]
    fn text_values_coerce_to_timestamps() {
        let v = Value::Text("2024-05-17 09:30:01.000000".into());
        assert_eq!(v.as_timestamp(), Some(datetime!(2024-05-17 09:30:01)));
        assert_eq!(Value::BigInt(5).as_timestamp(), None);
    }

    #[test]
    fn params_macro_converts_each_argument() {
        let p = params![1_i64, "x", Some(2.5_f64), None::<String>];
        assert_eq!(
            p,
            vec![
                Value::BigInt(1),
                Value::Text("x".into()),
                Value::Double(2.5),
                Value::Null,
            ]
        );
        assert!(params!().is_empty());
    }
}
