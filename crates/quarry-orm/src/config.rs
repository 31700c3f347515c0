//! Connection pool configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{OrmError, Result};

/// Environment variable holding the database URL.
pub const DATABASE_URL_ENV: &str = "DATABASE_URL";

/// Environment variable overriding the pool size.
pub const MAX_CONNECTIONS_ENV: &str = "DATABASE_MAX_CONNECTIONS";

/// Settings for a pool-backed [`Connection`](crate::Connection).
///
/// ```
/// use quarry_orm::DatabaseConfig;
///
/// let config = DatabaseConfig::new("sqlite::memory:").max_connections(1);
/// assert!(config.validate().is_ok());
/// assert!(DatabaseConfig::new("").validate().is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Database URL, e.g. `sqlite:app.db` or `sqlite::memory:`.
    pub url: String,
    /// Upper bound on concurrently checked-out connections.
    pub max_connections: u32,
    /// Connections kept open while idle.
    pub min_connections: u32,
    /// Seconds to wait for a free connection before failing.
    pub acquire_timeout_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: 5,
            min_connections: 0,
            acquire_timeout_secs: 30,
        }
    }
}

impl DatabaseConfig {
    /// Creates a configuration for `url` with default pool settings.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    /// Sets the pool size.
    #[must_use]
    pub const fn max_connections(mut self, n: u32) -> Self {
        self.max_connections = n;
        self
    }

    /// Reads `DATABASE_URL` and the optional `DATABASE_MAX_CONNECTIONS`.
    pub fn from_env() -> Result<Self> {
        let url = std::env::var(DATABASE_URL_ENV).unwrap_or_default();
        let mut config = Self::new(url);
        if let Ok(raw) = std::env::var(MAX_CONNECTIONS_ENV) {
            config.max_connections = raw.trim().parse().map_err(|_| {
                OrmError::Configuration(format!(
                    "{MAX_CONNECTIONS_ENV} must be a number, got {raw:?}"
                ))
            })?;
        }
        config.validate()?;
        Ok(config)
    }

    /// Loads a JSON configuration file. Missing fields take their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that a database is named and the pool can hold a connection.
    pub fn validate(&self) -> Result<()> {
        let name = self
            .url
            .trim()
            .trim_start_matches("sqlite://")
            .trim_start_matches("sqlite:");
        if name.is_empty() {
            return Err(OrmError::Configuration("missing database name".into()));
        }
        if self.max_connections == 0 {
            return Err(OrmError::Configuration(
                "max_connections must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
