//! Creating new migration files.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::info;

use crate::error::{MigrateError, Result};
use crate::migration::{DOWN_MARKER, UP_MARKER};

/// Turns a free-form description into a file-name slug.
///
/// Lowercases ASCII letters and digits and collapses every other run of
/// characters into a single `_`.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('_') {
            slug.push('_');
        }
    }
    slug.trim_end_matches('_').to_string()
}

/// File name for migration `name` created at `at`.
pub fn migration_file_name(at: DateTime<Utc>, name: &str) -> Result<String> {
    let slug = slugify(name);
    if slug.is_empty() {
        return Err(MigrateError::Configuration(format!(
            "migration name {name:?} has no letters or digits"
        )));
    }
    Ok(format!("{}_{slug}.sql", at.format("%Y%m%d%H%M%S")))
}

/// Writes an empty migration into `dir`, creating the directory if needed.
///
/// Returns the new file's path. An existing file is never overwritten.
pub fn create_migration_file(dir: &Path, name: &str) -> Result<PathBuf> {
    create_migration_file_at(dir, name, Utc::now())
}

/// [`create_migration_file`] with an explicit timestamp.
pub fn create_migration_file_at(dir: &Path, name: &str, at: DateTime<Utc>) -> Result<PathBuf> {
    let path = dir.join(migration_file_name(at, name)?);
    if path.exists() {
        return Err(MigrateError::MigrationExists(path));
    }
    std::fs::create_dir_all(dir)?;
    std::fs::write(&path, format!("{UP_MARKER}\n\n\n{DOWN_MARKER}\n\n"))?;
    info!(path = %path.display(), "Created migration");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    use crate::migration::{Migration, SqlMigration};
    use crate::source::is_migration_file_name;

    fn fixed_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 17, 9, 3, 7).unwrap()
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Create users"), "create_users");
        assert_eq!(slugify("  add index: users(email)!"), "add_index_users_email");
        assert_eq!(slugify("v2"), "v2");
        assert_eq!(slugify("--"), "");
    }

    #[test]
    fn test_file_name() {
        let name = migration_file_name(fixed_time(), "Create users").unwrap();
        assert_eq!(name, "20240517090307_create_users.sql");
        assert!(is_migration_file_name(&name));
    }

    #[test]
    fn test_empty_slug_rejected() {
        let err = migration_file_name(fixed_time(), "???").unwrap_err();
        assert!(matches!(err, MigrateError::Configuration(_)));
    }

    #[test]
    fn test_created_file_parses() {
        let dir = tempfile::tempdir().unwrap();
        let migrations_dir = dir.path().join("db").join("migrations");
        let path = create_migration_file_at(&migrations_dir, "create users", fixed_time()).unwrap();

        let migration = SqlMigration::from_file(&path).unwrap();
        assert_eq!(migration.name(), "20240517090307_create_users");
        assert!(migration.up_statements().is_empty());
        assert!(migration.down_statements().is_empty());
    }

    #[test]
    fn test_refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = create_migration_file_at(dir.path(), "init", fixed_time()).unwrap();
        std::fs::write(&path, "-- migrate:up\nSELECT 1;\n").unwrap();

        let err = create_migration_file_at(dir.path(), "init", fixed_time()).unwrap_err();
        assert!(matches!(err, MigrateError::MigrationExists(ref p) if *p == path));
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "-- migrate:up\nSELECT 1;\n"
        );
    }
}
