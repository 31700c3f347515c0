//! Discovery of available migrations.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, OnceLock};

use regex::Regex;
use tracing::debug;

use crate::error::{MigrateError, Result};
use crate::migration::{Migration, MigrationRegistry, SqlMigration};

/// Returns `true` for `<14 digits>_<slug>.sql`.
pub fn is_migration_file_name(file_name: &str) -> bool {
    static FILE_NAME_RE: OnceLock<Regex> = OnceLock::new();
    FILE_NAME_RE
        .get_or_init(|| {
            Regex::new(r"^\d{14}_[A-Za-z0-9_]+\.sql$")
                .expect("invalid built-in migration file regex")
        })
        .is_match(file_name)
}

/// Reads every migration file in `dir`, sorted by name.
///
/// A missing directory holds no migrations. Other entries are skipped.
pub fn scan_directory(dir: &Path) -> Result<Vec<SqlMigration>> {
    if !dir.is_dir() {
        debug!(dir = %dir.display(), "Migrations directory not found, nothing to scan");
        return Ok(Vec::new());
    }

    let mut migrations = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if !path.is_file() || !is_migration_file_name(file_name) {
            debug!(file = %path.display(), "Ignoring non-migration file");
            continue;
        }
        migrations.push(SqlMigration::from_file(&path)?);
    }
    migrations.sort_by(|a, b| a.name().cmp(b.name()));
    Ok(migrations)
}

/// The available migrations, unique by name and sorted ascending.
#[derive(Debug, Clone, Default)]
pub struct MigrationSet {
    migrations: BTreeMap<String, Arc<dyn Migration>>,
}

impl MigrationSet {
    /// Merges the files in `dir` (if any) with `registry`.
    pub fn collect(dir: Option<&Path>, registry: &MigrationRegistry) -> Result<Self> {
        let mut set = Self::default();
        if let Some(dir) = dir {
            for migration in scan_directory(dir)? {
                set.insert(Arc::new(migration))?;
            }
        }
        for migration in registry.migrations() {
            set.insert(Arc::clone(migration))?;
        }
        debug!(count = set.len(), "Collected migrations");
        Ok(set)
    }

    /// Adds a migration. Names must be unique.
    pub fn insert(&mut self, migration: Arc<dyn Migration>) -> Result<()> {
        let name = migration.name().to_string();
        if self.migrations.contains_key(&name) {
            return Err(MigrateError::DuplicateMigration(name));
        }
        self.migrations.insert(name, migration);
        Ok(())
    }

    /// Looks up a migration by name.
    pub fn get(&self, name: &str) -> Option<&Arc<dyn Migration>> {
        self.migrations.get(name)
    }

    /// Names in ascending order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.migrations.keys().map(String::as_str)
    }

    /// Migrations in ascending name order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Migration>> {
        self.migrations.values()
    }

    /// Number of available migrations.
    pub fn len(&self) -> usize {
        self.migrations.len()
    }

    /// Returns `true` if no migration is available.
    pub fn is_empty(&self) -> bool {
        self.migrations.is_empty()
    }
}
