//! PostgreSQL driver implementation

use async_trait::async_trait;
use sqlrun_core::{Connection, ConnectionConfig, DatabaseDriver, Result, SqlrunError};
use std::sync::Arc;

use crate::PostgresConnection;

/// PostgreSQL database driver
pub struct PostgresDriver;

impl PostgresDriver {
    /// Create a new PostgreSQL driver instance
    pub fn new() -> Self {
        tracing::debug!("PostgreSQL driver initialized");
        Self
    }
}

impl Default for PostgresDriver {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse a URL or key/value connection string, applying explicit credentials on top
pub(crate) fn build_config(config: &ConnectionConfig) -> Result<tokio_postgres::Config> {
    let raw = config.connection_string.trim();
    let mut pg_config = if raw.is_empty() {
        tokio_postgres::Config::new()
    } else {
        raw.parse::<tokio_postgres::Config>().map_err(|e| {
            SqlrunError::Configuration(format!("Invalid PostgreSQL connection string: {}", e))
        })?
    };

    if pg_config.get_hosts().is_empty() {
        pg_config.host("localhost");
    }
    if let Some(user) = config.get_string("user") {
        pg_config.user(&user);
    }
    if let Some(password) = config.get_string("password") {
        pg_config.password(password);
    }
    if pg_config.get_application_name().is_none() {
        pg_config.application_name("sqlrun");
    }

    Ok(pg_config)
}

#[async_trait]
impl DatabaseDriver for PostgresDriver {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn aliases(&self) -> &'static [&'static str] {
        &["postgresql", "pg"]
    }

    fn display_name(&self) -> &'static str {
        "PostgreSQL"
    }

    fn connection_string_help(&self) -> &'static str {
        "postgres://host:port/dbname or \"host=... port=... dbname=...\""
    }

    #[tracing::instrument(skip(self, config))]
    async fn connect(&self, config: &ConnectionConfig) -> Result<Arc<dyn Connection>> {
        let pg_config = build_config(config)?;

        let conn = PostgresConnection::connect(pg_config).await.map_err(|e| {
            tracing::error!(error = %e, "failed to connect to PostgreSQL database");
            match e {
                SqlrunError::Connection(_) | SqlrunError::Configuration(_) => e,
                other => SqlrunError::Connection(format!(
                    "Failed to connect to PostgreSQL database: {}",
                    other
                )),
            }
        })?;

        tracing::info!("PostgreSQL connection created");
        Ok(Arc::new(conn))
    }
}
