//! Migration definitions.
//!
//! A migration is anything implementing [`Migration`]: a uniquely named pair
//! of `up`/`down` procedures run against a [`Connection`]. Two sources exist:
//!
//! - [`SqlMigration`], parsed from a `.sql` file with `-- migrate:up` and
//!   `-- migrate:down` sections;
//! - Rust types registered in a [`MigrationRegistry`].
//!
//! Names sort chronologically because they start with a 14-digit UTC
//! timestamp (`20240131120000_create_users`).

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use quarry_orm::Connection;
use tracing::debug;

use crate::error::{MigrateError, Result};

/// Marker line opening the forward section of a SQL migration.
pub const UP_MARKER: &str = "-- migrate:up";

/// Marker line opening the rollback section of a SQL migration.
pub const DOWN_MARKER: &str = "-- migrate:down";

/// A schema change that can be applied and reverted.
#[async_trait]
pub trait Migration: Send + Sync {
    /// Unique name; determines apply order.
    fn name(&self) -> &str;

    /// Applies the change.
    async fn up(&self, conn: &Connection) -> Result<()>;

    /// Reverts the change.
    async fn down(&self, conn: &Connection) -> Result<()>;
}

impl fmt::Debug for dyn Migration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Migration").field("name", &self.name()).finish()
    }
}

/// A migration read from a SQL file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlMigration {
    name: String,
    path: Option<PathBuf>,
    up: Vec<String>,
    down: Vec<String>,
}

impl SqlMigration {
    /// Parses `contents` as migration `name`.
    ///
    /// Anything before `-- migrate:up` is ignored. The down section is
    /// optional; without it, rolling back runs no statements.
    pub fn parse(name: impl Into<String>, contents: &str) -> Result<Self> {
        let name = name.into();
        let mut up = None::<String>;
        let mut down = None::<String>;

        for line in contents.lines() {
            let marker = line.trim().to_ascii_lowercase();
            if marker == UP_MARKER {
                if up.is_some() {
                    return Err(invalid(&name, "more than one `-- migrate:up` section"));
                }
                up = Some(String::new());
                continue;
            }
            if marker == DOWN_MARKER {
                if down.is_some() {
                    return Err(invalid(&name, "more than one `-- migrate:down` section"));
                }
                if up.is_none() {
                    return Err(invalid(&name, "`-- migrate:down` before `-- migrate:up`"));
                }
                down = Some(String::new());
                continue;
            }
            // The down section, once opened, runs to the end of the file.
            if let Some(section) = down.as_mut().or(up.as_mut()) {
                section.push_str(line);
                section.push('\n');
            }
        }

        let Some(up) = up else {
            return Err(invalid(&name, "missing `-- migrate:up` section"));
        };
        Ok(Self {
            name,
            path: None,
            up: split_statements(&up),
            down: down.as_deref().map(split_statements).unwrap_or_default(),
        })
    }

    /// Reads and parses a migration file. The name is the file stem.
    pub fn from_file(path: &Path) -> Result<Self> {
        let name = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .ok_or_else(|| MigrateError::InvalidMigrationFile {
                path: path.to_path_buf(),
                message: "file name is not valid UTF-8".into(),
            })?
            .to_string();
        let contents = std::fs::read_to_string(path)?;
        let mut migration = Self::parse(name, &contents).map_err(|err| match err {
            MigrateError::InvalidMigrationFile { message, .. } => {
                MigrateError::InvalidMigrationFile {
                    path: path.to_path_buf(),
                    message,
                }
            }
            other => other,
        })?;
        migration.path = Some(path.to_path_buf());
        Ok(migration)
    }

    /// The file this migration was read from, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Forward statements in execution order.
    pub fn up_statements(&self) -> &[String] {
        &self.up
    }

    /// Rollback statements in execution order.
    pub fn down_statements(&self) -> &[String] {
        &self.down
    }

    async fn run(&self, conn: &Connection, statements: &[String]) -> Result<()> {
        for sql in statements {
            debug!(migration = %self.name, sql = %sql, "Executing migration statement");
            conn.execute(sql, &[]).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl Migration for SqlMigration {
    fn name(&self) -> &str {
        &self.name
    }

    async fn up(&self, conn: &Connection) -> Result<()> {
        self.run(conn, &self.up).await
    }

    async fn down(&self, conn: &Connection) -> Result<()> {
        self.run(conn, &self.down).await
    }
}

fn invalid(name: &str, message: &str) -> MigrateError {
    MigrateError::InvalidMigrationFile {
        path: PathBuf::from(name),
        message: message.to_string(),
    }
}

/// Splits a script into statements on `;`.
///
/// Semicolons inside quotes, `--` and `/* */` comments, and the
/// `BEGIN ... END` body of a `CREATE TRIGGER` (including nested
/// `CASE ... END`) do not split. Statements are trimmed; empty and
/// comment-only statements are dropped.
pub fn split_statements(script: &str) -> Vec<String> {
    let mut splitter = StatementSplitter::default();
    let mut chars = script.chars().peekable();

    while let Some(c) = chars.next() {
        if c.is_ascii_alphanumeric() || c == '_' {
            splitter.word.push(c);
            splitter.current.push(c);
            continue;
        }
        splitter.end_word();
        match c {
            '\'' | '"' | '`' => {
                splitter.current.push(c);
                for next in chars.by_ref() {
                    splitter.current.push(next);
                    if next == c {
                        break;
                    }
                }
            }
            '-' if chars.peek() == Some(&'-') => {
                splitter.current.push(c);
                for next in chars.by_ref() {
                    splitter.current.push(next);
                    if next == '\n' {
                        break;
                    }
                }
            }
            '/' if chars.peek() == Some(&'*') => {
                splitter.current.push(c);
                splitter.current.extend(chars.next());
                let mut previous = ' ';
                for next in chars.by_ref() {
                    splitter.current.push(next);
                    if previous == '*' && next == '/' {
                        break;
                    }
                    previous = next;
                }
            }
            ';' if splitter.depth == 0 => splitter.push_statement(),
            _ => splitter.current.push(c),
        }
    }
    splitter.end_word();
    splitter.push_statement();
    splitter.statements
}

#[derive(Default)]
struct StatementSplitter {
    statements: Vec<String>,
    current: String,
    word: String,
    depth: usize,
}

impl StatementSplitter {
    fn end_word(&mut self) {
        if self.word.is_empty() {
            return;
        }
        let word = std::mem::take(&mut self.word).to_ascii_uppercase();
        match word.as_str() {
            "BEGIN" if self.depth > 0 || self.in_create_trigger() => self.depth += 1,
            "CASE" if self.depth > 0 => self.depth += 1,
            "END" => self.depth = self.depth.saturating_sub(1),
            _ => {}
        }
    }

    fn in_create_trigger(&self) -> bool {
        let mut words = strip_leading_comments(&self.current)
            .split(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .filter(|w| !w.is_empty());
        words
            .next()
            .is_some_and(|w| w.eq_ignore_ascii_case("CREATE"))
            && words.any(|w| w.eq_ignore_ascii_case("TRIGGER"))
    }

    fn push_statement(&mut self) {
        let statement = std::mem::take(&mut self.current);
        self.depth = 0;
        if !strip_leading_comments(&statement).is_empty() {
            self.statements.push(statement.trim().to_string());
        }
    }
}

/// Skips leading whitespace and comments.
fn strip_leading_comments(mut sql: &str) -> &str {
    loop {
        sql = sql.trim_start();
        if let Some(rest) = sql.strip_prefix("--") {
            sql = rest.split_once('\n').map_or("", |(_, tail)| tail);
        } else if let Some(rest) = sql.strip_prefix("/*") {
            sql = rest.split_once("*/").map_or("", |(_, tail)| tail);
        } else {
            return sql;
        }
    }
}

/// Migrations written in Rust.
#[derive(Debug, Default, Clone)]
pub struct MigrationRegistry {
    migrations: Vec<Arc<dyn Migration>>,
}

impl MigrationRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a migration.
    #[must_use]
    pub fn with<M: Migration + 'static>(mut self, migration: M) -> Self {
        self.register(migration);
        self
    }

    /// Adds a migration.
    pub fn register<M: Migration + 'static>(&mut self, migration: M) {
        self.migrations.push(Arc::new(migration));
    }

    /// Registered migrations in registration order.
    pub fn migrations(&self) -> &[Arc<dyn Migration>] {
        &self.migrations
    }

    /// Number of registered migrations.
    pub fn len(&self) -> usize {
        self.migrations.len()
    }

    /// Returns `true` if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.migrations.is_empty()
    }
}
