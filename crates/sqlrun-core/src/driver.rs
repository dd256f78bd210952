//! Database driver trait definition

use crate::{Connection, Result};
use async_trait::async_trait;
use std::sync::Arc;

/// Core driver trait that all database drivers must implement
#[async_trait]
pub trait DatabaseDriver: Send + Sync {
    /// Unique identifier for this driver (e.g., "postgres", "sqlite")
    fn name(&self) -> &'static str;

    /// Alternative names accepted on the command line
    fn aliases(&self) -> &'static [&'static str] {
        &[]
    }

    /// Human-readable name (e.g., "PostgreSQL", "SQLite")
    fn display_name(&self) -> &'static str {
        self.name()
    }

    /// Connection string format help text
    fn connection_string_help(&self) -> &'static str {
        ""
    }

    /// Create a new connection
    async fn connect(&self, config: &ConnectionConfig) -> Result<Arc<dyn Connection>>;
}

/// Connection configuration
#[derive(Clone, Default)]
pub struct ConnectionConfig {
    /// Driver name as given by the operator
    pub driver: String,
    /// Driver-specific connection string (file path, URL, key/value list)
    pub connection_string: String,
    /// Username
    pub username: Option<String>,
    /// Password
    pub password: Option<String>,
}

impl ConnectionConfig {
    /// Create a new configuration
    pub fn new(driver: &str, connection_string: &str) -> Self {
        Self {
            driver: driver.to_string(),
            connection_string: connection_string.to_string(),
            ..Self::default()
        }
    }

    /// Set credentials. Empty strings are treated as absent.
    pub fn with_credentials(mut self, username: &str, password: &str) -> Self {
        self.username = Some(username.to_string()).filter(|u| !u.is_empty());
        self.password = Some(password.to_string()).filter(|p| !p.is_empty());
        self
    }

    /// Look up a setting by any of its accepted names
    pub fn get_string(&self, key: &str) -> Option<String> {
        match key {
            "connection_string" | "path" | "url" => Some(self.connection_string.clone()),
            "username" | "user" => self.username.clone(),
            "password" => self.password.clone(),
            _ => None,
        }
    }
}

impl std::fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("driver", &self.driver)
            .field("connection_string", &self.connection_string)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}
