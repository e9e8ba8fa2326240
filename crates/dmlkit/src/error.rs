//! Error types for dmlkit

use std::time::Duration;
use thiserror::Error;

/// Result type alias for dmlkit operations
pub type DmlResult<T> = Result<T, DmlError>;

/// Boxed error returned by driver implementations.
pub type DriverError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Error types for statement compilation and execution
#[derive(Debug, Error)]
pub enum DmlError {
    /// A required part of the statement is missing (table, columns, values).
    #[error("Empty: {0}")]
    Empty(String),

    /// Statement configuration is invalid (duplicate columns, bad identifiers).
    #[error("Validation error: {0}")]
    Validation(String),

    /// Placeholder, value or tuple counts do not line up.
    #[error("Mismatch: {0}")]
    Mismatch(String),

    /// A record was asked for a column it does not map.
    #[error("Column {column:?} not found in {record}")]
    ColumnNotFound { column: String, record: String },

    /// A scanned value cannot be converted into the target field.
    #[error("Type mismatch on column '{column}': expected {expected}, found {found}")]
    TypeMismatch {
        column: String,
        expected: &'static str,
        found: &'static str,
    },

    /// The record or builder does not support the requested operation.
    #[error("Not supported: {0}")]
    NotSupported(String),

    /// A statement, transaction or connection has already been closed.
    #[error("Already closed: {0}")]
    AlreadyClosed(String),

    /// Driver failure, wrapped with the operation and table it happened in.
    #[error("{context}: {source}")]
    Driver {
        context: String,
        #[source]
        source: DriverError,
    },

    /// Pool error
    #[error("Pool error: {0}")]
    Pool(String),

    /// Query timeout error
    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    /// Rolling back after a failed unit of work failed as well.
    #[error("{error} (rollback failed: {rollback})")]
    Rollback {
        error: Box<DmlError>,
        rollback: Box<DmlError>,
    },

    /// Other errors
    #[error("{0}")]
    Other(String),
}

impl DmlError {
    /// Create an empty-configuration error
    pub fn empty(message: impl Into<String>) -> Self {
        Self::Empty(message.into())
    }

    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a count mismatch error
    pub fn mismatch(message: impl Into<String>) -> Self {
        Self::Mismatch(message.into())
    }

    /// Create a column-not-found error for a record type
    pub fn column_not_found(column: impl Into<String>, record: impl Into<String>) -> Self {
        Self::ColumnNotFound {
            column: column.into(),
            record: record.into(),
        }
    }

    /// Create a not-supported error
    pub fn not_supported(message: impl Into<String>) -> Self {
        Self::NotSupported(message.into())
    }

    /// Create an already-closed error
    pub fn already_closed(what: impl Into<String>) -> Self {
        Self::AlreadyClosed(what.into())
    }

    /// Wrap a driver error with the operation context it failed in.
    pub fn driver(context: impl Into<String>, source: DriverError) -> Self {
        Self::Driver {
            context: context.into(),
            source,
        }
    }

    /// Check if this is a column-not-found error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::ColumnNotFound { .. })
    }

    /// Check if this is an already-closed error
    pub fn is_already_closed(&self) -> bool {
        matches!(self, Self::AlreadyClosed(_))
    }

    /// Check if this is a timeout error
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }

    /// Check if this is an empty-configuration error
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty(_))
    }

    /// Check if this is a count mismatch error
    pub fn is_mismatch(&self) -> bool {
        matches!(self, Self::Mismatch(_))
    }

    /// Returns the driver error if this error came from the driver.
    pub fn driver_source(&self) -> Option<&(dyn std::error::Error + Send + Sync + 'static)> {
        match self {
            Self::Driver { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}

impl From<deadpool::managed::PoolError<DriverError>> for DmlError {
    fn from(err: deadpool::managed::PoolError<DriverError>) -> Self {
        use deadpool::managed::{PoolError, TimeoutType};
        match err {
            PoolError::Backend(source) => Self::driver("connect", source),
            PoolError::Timeout(TimeoutType::Wait) => {
                Self::Pool("timed out waiting for a connection".into())
            }
            other => Self::Pool(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_not_found_message_names_record() {
        let err = DmlError::column_not_found("unknown", "dml_person");
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "Column \"unknown\" not found in dml_person");
    }

    #[test]
    fn rollback_error_keeps_both_messages() {
        let err = DmlError::Rollback {
            error: Box::new(DmlError::validation("boom")),
            rollback: Box::new(DmlError::already_closed("transaction")),
        };
        assert_eq!(
            err.to_string(),
            "Validation error: boom (rollback failed: Already closed: transaction)"
        );
    }

    #[test]
    fn driver_error_exposes_source() {
        let err = DmlError::driver("exec insert `a`", "connection reset".into());
        assert_eq!(err.to_string(), "exec insert `a`: connection reset");
        assert!(err.driver_source().is_some());
    }
}
