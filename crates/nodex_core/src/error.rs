//! Error types for Nodex core.

use std::io;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in Nodex core operations.
///
/// A field that is simply not indexed is never an error; operations on such
/// fields return `Ok(false)` instead.
#[derive(Debug, Error)]
pub enum CoreError {
    /// I/O error (reading configuration files).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// An index type name did not match any known type.
    #[error("unknown index type: {name}")]
    UnknownIndexType {
        /// The name that was requested.
        name: String,
    },

    /// No engine settings are configured for the requested index type.
    #[error("no engine configuration for index type '{index_type}'")]
    MissingEngineConfig {
        /// The index type that has no settings.
        index_type: String,
    },

    /// An entity of the wrong kind was handed to an index.
    #[error("index '{index}' holds {expected} entities, got a {actual}")]
    EntityKindMismatch {
        /// Index name.
        index: String,
        /// Kind the index was opened for.
        expected: String,
        /// Kind of the offending entity.
        actual: String,
    },

    /// A value could not be converted for the field's declared kind.
    #[error("invalid value for field '{field}': {message}")]
    InvalidValue {
        /// Field name.
        field: String,
        /// Description of the problem.
        message: String,
    },

    /// The index handle has been deleted.
    #[error("index '{name}' has been deleted")]
    IndexDeleted {
        /// Index name.
        name: String,
    },

    /// The transaction is no longer active.
    #[error("transaction {txid} is not active")]
    TransactionNotActive {
        /// Transaction identifier.
        txid: u64,
    },

    /// A query was used after it was released.
    #[error("query on index '{index}' has been closed")]
    QueryClosed {
        /// Index name.
        index: String,
    },

    /// The index configuration is malformed.
    #[error("invalid index configuration: {message}")]
    InvalidConfig {
        /// Description of the problem.
        message: String,
    },
}

impl CoreError {
    /// Creates an unknown index type error.
    pub fn unknown_index_type(name: impl Into<String>) -> Self {
        Self::UnknownIndexType { name: name.into() }
    }

    /// Creates a missing engine configuration error.
    pub fn missing_engine_config(index_type: impl ToString) -> Self {
        Self::MissingEngineConfig {
            index_type: index_type.to_string(),
        }
    }

    /// Creates an invalid value error.
    pub fn invalid_value(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Creates an index deleted error.
    pub fn index_deleted(name: impl Into<String>) -> Self {
        Self::IndexDeleted { name: name.into() }
    }

    /// Creates an invalid configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Returns true for errors caused by configuration rather than data.
    #[must_use]
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            Self::UnknownIndexType { .. } | Self::MissingEngineConfig { .. } | Self::InvalidConfig { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages() {
        let err = CoreError::missing_engine_config("fulltext");
        assert_eq!(
            err.to_string(),
            "no engine configuration for index type 'fulltext'"
        );

        let err = CoreError::invalid_value("age", "expected a number");
        assert_eq!(err.to_string(), "invalid value for field 'age': expected a number");
    }

    #[test]
    fn config_errors_are_classified() {
        assert!(CoreError::unknown_index_type("spatial").is_config_error());
        assert!(CoreError::invalid_config("empty base name").is_config_error());
        assert!(!CoreError::index_deleted("Person_exact").is_config_error());
    }
}
