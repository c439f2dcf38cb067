//! Error types for dbcontext operations.

use std::fmt;

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, Error>;

/// The primary error type for all dbcontext operations.
#[derive(Debug)]
pub enum Error {
    /// Connection-level failures (connect, disconnect, driver setup).
    Connection(ConnectionError),
    /// A statement failed at the driver level.
    Query(QueryError),
    /// A value could not be converted to the requested Rust type.
    Type(TypeError),
    /// A query that required at least one row matched none.
    NoRows {
        /// Table the query ran against.
        table: String,
    },
    /// A query that required exactly one row matched more than one.
    MultipleRows {
        /// Table the query ran against.
        table: String,
    },
    /// SaveChanges aborted partway through its pending operations.
    ///
    /// Operations persisted before the failure are NOT rolled back by the
    /// context; `completed` reports how many succeeded so callers running
    /// inside an explicit transaction can decide what to do.
    Save {
        /// Number of entities persisted or deleted before the failure.
        completed: u64,
        /// The underlying per-entity error.
        source: Box<Error>,
    },
    /// Custom error with message.
    Custom(String),
}

/// Connection-related error payload.
#[derive(Debug)]
pub struct ConnectionError {
    pub message: String,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

/// Statement execution error payload.
///
/// `operation` names the logical operation that failed ("insert", "update",
/// "delete", "query") so callers can identify which step of a save or read
/// went wrong; `statement` carries the generated SQL when available.
#[derive(Debug)]
pub struct QueryError {
    pub operation: &'static str,
    pub statement: Option<String>,
    pub message: String,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

/// Value-to-type conversion error payload.
#[derive(Debug)]
pub struct TypeError {
    /// The Rust type that was requested.
    pub expected: &'static str,
    /// Description of the actual value encountered.
    pub actual: String,
    /// Column name, when the conversion happened during row access.
    pub column: Option<String>,
}

impl Error {
    /// Build a connection error from a message and an optional driver error.
    pub fn connection(
        message: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Error::Connection(ConnectionError {
            message: message.into(),
            source: Some(source.into()),
        })
    }

    /// Build a query error wrapping a driver-level failure.
    pub fn query(
        operation: &'static str,
        statement: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        let source = source.into();
        Error::Query(QueryError {
            operation,
            statement: Some(statement.into()),
            message: source.to_string(),
            source: Some(source),
        })
    }

    /// Build a query error with a message only (no underlying driver error).
    pub fn query_message(operation: &'static str, message: impl Into<String>) -> Self {
        Error::Query(QueryError {
            operation,
            statement: None,
            message: message.into(),
            source: None,
        })
    }

    /// Build a custom error from a message.
    pub fn custom(message: impl Into<String>) -> Self {
        Error::Custom(message.into())
    }

    /// Check whether this is a zero-rows cardinality error.
    pub const fn is_no_rows(&self) -> bool {
        matches!(self, Error::NoRows { .. })
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Connection(e) => write!(f, "connection error: {}", e.message),
            Error::Query(e) => {
                write!(f, "{} failed: {}", e.operation, e.message)?;
                if let Some(sql) = &e.statement {
                    write!(f, " (statement: {sql})")?;
                }
                Ok(())
            }
            Error::Type(e) => {
                write!(f, "cannot convert {} to {}", e.actual, e.expected)?;
                if let Some(col) = &e.column {
                    write!(f, " (column '{col}')")?;
                }
                Ok(())
            }
            Error::NoRows { table } => {
                write!(f, "no rows matched in table '{table}'")
            }
            Error::MultipleRows { table } => {
                write!(f, "more than one row matched in table '{table}'")
            }
            Error::Save { completed, source } => {
                write!(f, "save aborted after {completed} operations: {source}")
            }
            Error::Custom(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Connection(e) => e.source.as_deref().map(|e| e as _),
            Error::Query(e) => e.source.as_deref().map(|e| e as _),
            Error::Save { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}
