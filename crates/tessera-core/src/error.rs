//! Unified error types for every Tessera layer.

use serde::{Deserialize, Serialize};
use std::fmt::{self, Debug};
use thiserror::Error;

/// Which side of an entity/DTO pairing a shape belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShapeSide {
    /// Persisted record shape.
    Entity,
    /// Transfer object shape.
    Dto,
}

impl fmt::Display for ShapeSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Entity => f.write_str("entity"),
            Self::Dto => f.write_str("dto"),
        }
    }
}

/// Coarse classification of a [`TesseraError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Raised while building a DAO; the DAO is never usable.
    Configuration,
    /// The caller passed something malformed.
    Usage,
    /// The storage backend or a value conversion failed during a call.
    Operational,
}

/// Unified error type for Tessera.
///
/// Variants are grouped by [`ErrorKind`]: configuration errors abort DAO
/// construction, usage errors point at a programming mistake in the caller,
/// and operational errors come from the storage backend at call time.
#[derive(Error, Debug)]
pub enum TesseraError {
    // ============ Configuration Errors ============
    /// Generic configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// No key field could be discovered for a shape
    #[error("No primary key field found for {shape}")]
    MissingKey { shape: String },

    /// A concrete shape has no counterpart on the other side of the pairing
    #[error("No matching {side} shape for {shape}")]
    UnmatchedShape { shape: String, side: ShapeSide },

    // ============ Usage Errors ============
    /// A field is referenced that the shape does not declare
    #[error("Unknown field '{field}' on {shape}")]
    UnknownField { shape: String, field: String },

    /// A key has the wrong number of components
    #[error("Key arity mismatch: expected {expected} component(s), got {actual}")]
    KeyArity { expected: usize, actual: usize },

    /// Any other caller mistake
    #[error("Invalid usage: {0}")]
    Usage(String),

    // ============ Operational Errors ============
    /// Database error
    #[error("Database error: {0}")]
    Database(String),

    /// Conflict error (e.g., duplicate key)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// A stored value could not be converted to or from a field
    #[error("Mapping error: {0}")]
    Mapping(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// Generic error wrapper
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl TesseraError {
    /// Returns the taxonomy bucket of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Configuration(_) | Self::MissingKey { .. } | Self::UnmatchedShape { .. } => {
                ErrorKind::Configuration
            }
            Self::UnknownField { .. } | Self::KeyArity { .. } | Self::Usage(_) => ErrorKind::Usage,
            Self::Database(_)
            | Self::Conflict(_)
            | Self::Mapping(_)
            | Self::Internal(_)
            | Self::Other(_) => ErrorKind::Operational,
        }
    }

    /// Returns a machine-readable error code.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "CONFIGURATION_ERROR",
            Self::MissingKey { .. } => "MISSING_KEY",
            Self::UnmatchedShape { .. } => "UNMATCHED_SHAPE",
            Self::UnknownField { .. } => "UNKNOWN_FIELD",
            Self::KeyArity { .. } => "KEY_ARITY",
            Self::Usage(_) => "INVALID_USAGE",
            Self::Database(_) => "DATABASE_ERROR",
            Self::Conflict(_) => "CONFLICT",
            Self::Mapping(_) => "MAPPING_ERROR",
            Self::Internal(_) | Self::Other(_) => "INTERNAL_ERROR",
        }
    }

    /// Creates a configuration error.
    #[must_use]
    pub fn configuration<T: Into<String>>(message: T) -> Self {
        Self::Configuration(message.into())
    }

    /// Creates an unknown field error.
    #[must_use]
    pub fn unknown_field(shape: impl Into<String>, field: impl Into<String>) -> Self {
        Self::UnknownField {
            shape: shape.into(),
            field: field.into(),
        }
    }

    /// Creates a mapping error.
    #[must_use]
    pub fn mapping<T: Into<String>>(message: T) -> Self {
        Self::Mapping(message.into())
    }

    /// Creates a conflict error.
    #[must_use]
    pub fn conflict<T: Into<String>>(message: T) -> Self {
        Self::Conflict(message.into())
    }

    /// Creates an internal error.
    #[must_use]
    pub fn internal<T: Into<String>>(message: T) -> Self {
        Self::Internal(message.into())
    }

    /// Returns true if the caller made a mistake.
    #[must_use]
    pub const fn is_usage_error(&self) -> bool {
        matches!(self.kind(), ErrorKind::Usage)
    }

    /// Checks if this error is retriable.
    #[must_use]
    pub const fn is_retriable(&self) -> bool {
        matches!(self, Self::Database(_) | Self::Conflict(_))
    }
}

#[cfg(feature = "sqlx")]
impl From<sqlx::Error> for TesseraError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::ColumnNotFound(column) => Self::Mapping(format!("column not found: {column}")),
            sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => Self::Mapping(err.to_string()),
            sqlx::Error::Database(db_err) => {
                if let Some(code) = db_err.code() {
                    // SQLite primary key / unique, PostgreSQL, MySQL
                    if code == "1555" || code == "2067" || code == "23505" || code == "1062" {
                        return Self::Conflict(db_err.message().to_string());
                    }
                }
                Self::Database(err.to_string())
            }
            _ => Self::Database(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for TesseraError {
    fn from(err: serde_json::Error) -> Self {
        Self::Internal(format!("JSON serialization error: {}", err))
    }
}
