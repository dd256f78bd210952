//! SQLite driver implementation

use async_trait::async_trait;
use sqlrun_core::{Connection, ConnectionConfig, DatabaseDriver, Result, SqlrunError};
use std::sync::Arc;

use crate::SqliteConnection;

/// SQLite database driver
pub struct SqliteDriver;

impl SqliteDriver {
    /// Create a new SQLite driver instance
    pub fn new() -> Self {
        tracing::debug!("SQLite driver initialized");
        Self
    }
}

impl Default for SqliteDriver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DatabaseDriver for SqliteDriver {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn aliases(&self) -> &'static [&'static str] {
        &["sqlite3"]
    }

    fn display_name(&self) -> &'static str {
        "SQLite"
    }

    fn connection_string_help(&self) -> &'static str {
        "path to the database file, or :memory:"
    }

    #[tracing::instrument(skip(self, config), fields(path = %config.connection_string))]
    async fn connect(&self, config: &ConnectionConfig) -> Result<Arc<dyn Connection>> {
        let path = config
            .get_string("path")
            .filter(|p| !p.trim().is_empty())
            .ok_or_else(|| {
                SqlrunError::Configuration(
                    "SQLite requires a database path, e.g. /path/to/database.db or :memory:".into(),
                )
            })?;

        if config.username.is_some() || config.password.is_some() {
            tracing::debug!("SQLite ignores user and password");
        }

        let conn = SqliteConnection::open(&path).map_err(|e| {
            tracing::error!(error = %e, "failed to connect to SQLite database");
            match e {
                SqlrunError::Connection(_) | SqlrunError::Configuration(_) => e,
                other => SqlrunError::Connection(format!(
                    "Failed to connect to SQLite database: {}",
                    other
                )),
            }
        })?;

        tracing::info!(path = %path, "SQLite connection created");
        Ok(Arc::new(conn))
    }
}
