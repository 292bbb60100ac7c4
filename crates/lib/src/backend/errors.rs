//! Storage error types for the credstore backends.
//!
//! Backend errors reach callers unchanged: the provider adds no retry, no
//! backoff and no translation on top of them.

use thiserror::Error;

/// Errors that can occur during backend operations.
///
/// # Stability
///
/// - New variants may be added in minor versions (enum is `#[non_exhaustive]`)
/// - Existing variants will not be removed in minor versions
/// - Field additions/changes require a major version bump
/// - Helper methods like `is_*()` provide stable APIs
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum BackendError {
    /// SQL driver error, with the operation that failed.
    #[cfg(any(feature = "sqlite", feature = "postgres"))]
    #[error("SQL error: {reason}")]
    SqlxError {
        /// Context and driver message
        reason: String,
        /// The underlying driver error, when there is one
        #[source]
        source: Option<sqlx::Error>,
    },

    /// Serialization failed.
    #[error("Serialization failed")]
    SerializationFailed {
        /// The underlying serialization error
        #[source]
        source: serde_json::Error,
    },

    /// Deserialization failed.
    #[error("Deserialization failed")]
    DeserializationFailed {
        /// The underlying deserialization error
        #[source]
        source: serde_json::Error,
    },

    /// File I/O error.
    #[error("File I/O error")]
    FileIo {
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// A value cannot be written to this backend.
    #[error("Unsupported value for field '{field}': {reason}")]
    UnsupportedValue {
        /// The field holding the value
        field: String,
        /// Why the value was rejected
        reason: String,
    },

    /// A stored column has a type this backend cannot turn into JSON.
    #[error("Unsupported column type in '{collection}.{column}'")]
    UnsupportedColumn {
        /// The collection read from
        collection: String,
        /// The column that failed to decode
        column: String,
    },

    /// A collection or field name cannot be quoted safely.
    #[error("Invalid identifier {identifier:?}: {reason}")]
    InvalidIdentifier {
        /// The rejected identifier
        identifier: String,
        /// Why it was rejected
        reason: String,
    },
}

impl BackendError {
    /// Check if this error is related to I/O operations.
    pub fn is_io_error(&self) -> bool {
        matches!(
            self,
            BackendError::FileIo { .. }
                | BackendError::SerializationFailed { .. }
                | BackendError::DeserializationFailed { .. }
        )
    }

    /// Check if this error is about data the backend cannot represent.
    pub fn is_data_error(&self) -> bool {
        matches!(
            self,
            BackendError::UnsupportedValue { .. }
                | BackendError::UnsupportedColumn { .. }
                | BackendError::InvalidIdentifier { .. }
        )
    }
}

#[cfg(any(feature = "sqlite", feature = "postgres"))]
impl BackendError {
    /// Check if this error came from the SQL driver.
    pub fn is_sql_error(&self) -> bool {
        matches!(self, BackendError::SqlxError { .. })
    }

    /// Check if the database rejected a write that broke a UNIQUE constraint.
    pub fn is_unique_violation(&self) -> bool {
        match self {
            BackendError::SqlxError {
                source: Some(sqlx::Error::Database(db_err)),
                ..
            } => db_err.is_unique_violation(),
            _ => false,
        }
    }
}

#[cfg(not(any(feature = "sqlite", feature = "postgres")))]
impl BackendError {
    /// Check if this error came from the SQL driver.
    pub fn is_sql_error(&self) -> bool {
        false
    }

    /// Check if the database rejected a write that broke a UNIQUE constraint.
    pub fn is_unique_violation(&self) -> bool {
        false
    }
}

// Conversion from BackendError to the main Error type
impl From<BackendError> for crate::Error {
    fn from(err: BackendError) -> Self {
        crate::Error::Backend(err)
    }
}
