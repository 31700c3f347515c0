//! Error types for the ORM.

use quarry_sql::BuildError;
use thiserror::Error;

/// ORM-specific errors.
///
/// Absence of a row is never an error: lookups return `Option` and
/// mutations return `false`.
#[derive(Debug, Error)]
pub enum OrmError {
    /// The driver rejected the statement or its parameters.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Invalid or missing configuration.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// No usable connection (nested transaction, finished handle, ...).
    #[error("connection error: {0}")]
    Connection(String),

    /// A query could not be assembled.
    #[error(transparent)]
    Build(#[from] BuildError),

    /// A lifecycle hook aborted the operation.
    #[error("hook failed: {0}")]
    Hook(String),

    /// IO error (reading configuration files).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed JSON configuration.
    #[error("invalid configuration file: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias for ORM operations.
pub type Result<T> = std::result::Result<T, OrmError>;
