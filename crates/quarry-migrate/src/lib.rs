//! Ordered, ledger-tracked database migrations.
//!
//! `quarry-migrate` applies schema changes in name order and records each one
//! in a `quarry_migrations` ledger table, so every database knows exactly
//! which changes it has seen.
//!
//! # Architecture
//!
//! - **Definitions** ([`migration`]): SQL files with `-- migrate:up` /
//!   `-- migrate:down` sections, or Rust types implementing [`Migration`]
//! - **Discovery** ([`source`]): scans a directory for
//!   `<YYYYMMDDHHMMSS>_<slug>.sql` files and merges in registered migrations
//! - **Ledger** ([`history`]): which migrations have run, and when
//! - **Runner** ([`runner`]): applies pending migrations and rolls back the
//!   most recent ones
//! - **Scaffolding** ([`scaffold`]): creates new, empty migration files
//!
//! # Example
//!
//! ```rust,no_run
//! use async_trait::async_trait;
//! use quarry_migrate::prelude::*;
//! use quarry_orm::{Connection, DatabaseConfig};
//!
//! struct SeedRoles;
//!
//! #[async_trait]
//! impl Migration for SeedRoles {
//!     fn name(&self) -> &str {
//!         "20240102000000_seed_roles"
//!     }
//!
//!     async fn up(&self, conn: &Connection) -> quarry_migrate::Result<()> {
//!         conn.execute("INSERT INTO roles (name) VALUES ('admin')", &[]).await?;
//!         Ok(())
//!     }
//!
//!     async fn down(&self, conn: &Connection) -> quarry_migrate::Result<()> {
//!         conn.execute("DELETE FROM roles WHERE name = 'admin'", &[]).await?;
//!         Ok(())
//!     }
//! }
//!
//! # async fn run() -> quarry_migrate::Result<()> {
//! let conn = Connection::connect(&DatabaseConfig::new("sqlite:app.db")).await?;
//! let migrator = Migrator::new(conn)
//!     .with_directory("migrations")
//!     .with_migration(SeedRoles);
//! let applied = migrator.migrate_up().await?;
//! let reverted = migrator.migrate_down(1).await?;
//! # let _ = (applied, reverted);
//! # Ok(())
//! # }
//! ```
//!
//! # CLI Usage
//!
//! ```bash
//! # Create the ledger table
//! quarry-migrate init
//!
//! # Create migrations/<timestamp>_create_users.sql
//! quarry-migrate make "create users"
//!
//! # Apply pending migrations
//! quarry-migrate up
//!
//! # Show applied, pending and missing migrations
//! quarry-migrate status
//!
//! # Roll back the last two migrations
//! quarry-migrate down --steps 2
//! ```

pub mod error;
pub mod history;
pub mod migration;
pub mod runner;
pub mod scaffold;
pub mod source;

pub use error::{MigrateError, Result};
pub use history::{AppliedMigration, MigrationHistory, LEDGER_TABLE};
pub use migration::{Migration, MigrationRegistry, SqlMigration};
pub use runner::{MigrationStatus, Migrator};
pub use scaffold::create_migration_file;
pub use source::MigrationSet;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::error::{MigrateError, Result};
    pub use crate::migration::{Migration, MigrationRegistry, SqlMigration};
    pub use crate::runner::{MigrationStatus, Migrator};
    pub use crate::source::MigrationSet;
}
