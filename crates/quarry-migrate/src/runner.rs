//! Applies and reverts migrations against the ledger.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use quarry_orm::Connection;
use tracing::{info, warn};

use crate::error::Result;
use crate::history::{AppliedMigration, MigrationHistory};
use crate::migration::{Migration, MigrationRegistry};
use crate::source::MigrationSet;

/// Ledger state compared with the available definitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationStatus {
    /// Applied migrations, ascending.
    pub applied: Vec<AppliedMigration>,
    /// Available but not applied, ascending.
    pub pending: Vec<String>,
    /// Applied but no longer defined, ascending.
    pub missing: Vec<String>,
}

/// Runs migrations in name order and keeps the ledger in step.
///
/// The migrations directory is rescanned and merged with the registry on
/// every operation, so files added after construction are picked up.
///
/// Each migration is recorded right after its `up` succeeds and removed
/// right after its `down` succeeds, so a failure mid-batch leaves the ledger
/// describing exactly what ran.
#[derive(Debug, Clone)]
pub struct Migrator {
    connection: Connection,
    history: MigrationHistory,
    directory: Option<PathBuf>,
    registry: MigrationRegistry,
}

impl Migrator {
    /// Creates a runner over `connection` with no migration sources.
    pub fn new(connection: Connection) -> Self {
        Self {
            history: MigrationHistory::new(connection.clone()),
            connection,
            directory: None,
            registry: MigrationRegistry::new(),
        }
    }

    /// Reads SQL migration files from `dir`.
    #[must_use]
    pub fn with_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.directory = Some(dir.into());
        self
    }

    /// Adds Rust-defined migrations alongside the directory's files.
    #[must_use]
    pub fn with_registry(mut self, registry: MigrationRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Registers a single Rust-defined migration.
    #[must_use]
    pub fn with_migration<M: Migration + 'static>(mut self, migration: M) -> Self {
        self.registry.register(migration);
        self
    }

    /// Returns the ledger.
    pub const fn history(&self) -> &MigrationHistory {
        &self.history
    }

    /// Returns the migrations directory, if any.
    pub fn directory(&self) -> Option<&Path> {
        self.directory.as_deref()
    }

    /// Collects the currently available migrations.
    ///
    /// # Errors
    ///
    /// Fails if a migration file cannot be read or parsed, or if two
    /// migrations share a name.
    pub fn available(&self) -> Result<MigrationSet> {
        MigrationSet::collect(self.directory(), &self.registry)
    }

    /// Creates the ledger table if needed.
    pub async fn ensure_ledger(&self) -> Result<()> {
        self.history.ensure_ledger().await
    }

    /// Names of available migrations not yet applied, ascending.
    pub async fn pending(&self) -> Result<Vec<String>> {
        let available = self.available()?;
        self.pending_in(&available).await
    }

    async fn pending_in(&self, available: &MigrationSet) -> Result<Vec<String>> {
        self.ensure_ledger().await?;
        let applied: BTreeSet<String> =
            self.history.applied_names().await?.into_iter().collect();
        Ok(available
            .names()
            .filter(|name| !applied.contains(*name))
            .map(str::to_string)
            .collect())
    }

    /// Compares the ledger with the available migrations.
    pub async fn status(&self) -> Result<MigrationStatus> {
        let available = self.available()?;
        self.ensure_ledger().await?;
        let applied = self.history.applied().await?;
        let applied_names: BTreeSet<&str> = applied.iter().map(|m| m.name.as_str()).collect();

        let pending = available
            .names()
            .filter(|name| !applied_names.contains(name))
            .map(str::to_string)
            .collect();
        let missing = applied
            .iter()
            .filter(|m| available.get(&m.name).is_none())
            .map(|m| m.name.clone())
            .collect();

        Ok(MigrationStatus {
            applied,
            pending,
            missing,
        })
    }

    /// Applies every pending migration in ascending order.
    ///
    /// Stops at the first failure; migrations applied before it stay applied
    /// and recorded. Returns the names applied.
    pub async fn migrate_up(&self) -> Result<Vec<String>> {
        let available = self.available()?;
        let pending = self.pending_in(&available).await?;
        if pending.is_empty() {
            info!("No pending migrations");
            return Ok(pending);
        }

        let mut applied = Vec::with_capacity(pending.len());
        for name in pending {
            let Some(migration) = available.get(&name) else {
                continue;
            };
            info!(name = %name, "Applying migration");
            migration
                .up(&self.connection)
                .await
                .map_err(|err| err.in_migration(&name))?;
            self.history.record_applied(&name).await?;
            applied.push(name);
        }

        info!(count = applied.len(), "Migrations applied");
        Ok(applied)
    }

    /// Reverts the last `steps` applied migrations, most recent first.
    ///
    /// An applied migration with no definition is skipped and stays in the
    /// ledger. Returns the names reverted.
    pub async fn migrate_down(&self, steps: usize) -> Result<Vec<String>> {
        let available = self.available()?;
        self.ensure_ledger().await?;
        let applied = self.history.applied_names().await?;
        let targets: Vec<String> = applied.into_iter().rev().take(steps).collect();

        let mut reverted = Vec::with_capacity(targets.len());
        for name in targets {
            let Some(migration) = available.get(&name) else {
                warn!(name = %name, "No definition for applied migration, skipping rollback");
                continue;
            };
            info!(name = %name, "Rolling back migration");
            migration
                .down(&self.connection)
                .await
                .map_err(|err| err.in_migration(&name))?;
            self.history.record_rolled_back(&name).await?;
            reverted.push(name);
        }

        info!(count = reverted.len(), "Migrations rolled back");
        Ok(reverted)
    }
}
