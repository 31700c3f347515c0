//! Error types for the migration system.

use std::path::PathBuf;

use quarry_orm::OrmError;

/// Errors that can occur during migration operations.
#[derive(Debug, thiserror::Error)]
pub enum MigrateError {
    /// Error from the connection layer (ledger reads and writes, statements).
    #[error(transparent)]
    Orm(#[from] OrmError),

    /// IO error (reading/writing migration files).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A migration's `up` or `down` failed. Migrations before it in the batch
    /// stay applied.
    #[error("Migration '{name}' failed: {source}")]
    Migration {
        /// The migration that failed.
        name: String,
        /// What went wrong.
        #[source]
        source: Box<MigrateError>,
    },

    /// Two definitions share a name.
    #[error("Duplicate migration '{0}'")]
    DuplicateMigration(String),

    /// Failed to parse migration file.
    #[error("Failed to parse migration file '{path}': {message}")]
    InvalidMigrationFile {
        /// Path to the migration file.
        path: PathBuf,
        /// Error message.
        message: String,
    },

    /// Migration file already exists.
    #[error("Migration file already exists: {0}")]
    MigrationExists(PathBuf),

    /// Invalid arguments or settings.
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl MigrateError {
    /// Wraps `self` as the failure of migration `name`.
    pub fn in_migration(self, name: impl Into<String>) -> Self {
        Self::Migration {
            name: name.into(),
            source: Box::new(self),
        }
    }
}

/// Result type for migration operations.
pub type Result<T> = std::result::Result<T, MigrateError>;
