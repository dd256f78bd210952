//! Driver registry for managing available database drivers

use sqlrun_core::{Connection, ConnectionConfig, DatabaseDriver, Result, SqlrunError};
use std::collections::HashMap;
use std::sync::Arc;

/// Registry of available database drivers
///
/// Drivers are keyed by lower-cased name; aliases resolve to the same driver.
pub struct DriverRegistry {
    drivers: HashMap<String, Arc<dyn DatabaseDriver>>,
    aliases: HashMap<String, String>,
}

impl DriverRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            drivers: HashMap::new(),
            aliases: HashMap::new(),
        }
    }

    /// Create a registry with all built-in drivers registered
    pub fn with_defaults() -> Self {
        #[allow(unused_mut)]
        let mut registry = Self::new();

        #[cfg(feature = "sqlite")]
        registry.register(Arc::new(crate::sqlite::SqliteDriver::new()));
        #[cfg(feature = "postgres")]
        registry.register(Arc::new(crate::postgres::PostgresDriver::new()));

        registry
    }

    /// Register a new driver
    pub fn register(&mut self, driver: Arc<dyn DatabaseDriver>) {
        let name = driver.name().to_lowercase();
        tracing::debug!(driver = %name, "registering database driver");
        for alias in driver.aliases() {
            self.aliases.insert(alias.to_lowercase(), name.clone());
        }
        self.drivers.insert(name, driver);
    }

    /// Get a driver by name or alias, ignoring case
    pub fn get(&self, name: &str) -> Option<Arc<dyn DatabaseDriver>> {
        let key = name.trim().to_lowercase();
        let key = self.aliases.get(&key).unwrap_or(&key);
        let driver = self.drivers.get(key).cloned();
        if driver.is_none() {
            tracing::warn!(driver = %name, "driver not found in registry");
        }
        driver
    }

    /// List all registered driver names, sorted
    pub fn list(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.drivers.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    /// One line per registered driver: name, display name and connection string format
    pub fn describe(&self) -> Vec<String> {
        self.list()
            .into_iter()
            .filter_map(|name| self.drivers.get(name))
            .map(|driver| {
                let mut line = format!("{} ({})", driver.name(), driver.display_name());
                if !driver.aliases().is_empty() {
                    line.push_str(&format!(", also {}", driver.aliases().join(", ")));
                }
                let help = driver.connection_string_help();
                if !help.is_empty() {
                    line.push_str(&format!(": {}", help));
                }
                line
            })
            .collect()
    }

    /// Check if a driver is registered
    pub fn has(&self, name: &str) -> bool {
        let key = name.trim().to_lowercase();
        self.drivers.contains_key(&key) || self.aliases.contains_key(&key)
    }

    /// Resolve the configured driver and open a connection with it
    #[tracing::instrument(skip(self, config), fields(driver = %config.driver))]
    pub async fn connect(&self, config: &ConnectionConfig) -> Result<Arc<dyn Connection>> {
        let driver = self.get(&config.driver).ok_or_else(|| {
            SqlrunError::Connection(format!(
                "Unknown driver '{}', available drivers:\n  {}",
                config.driver,
                self.describe().join("\n  ")
            ))
        })?;
        driver.connect(config).await
    }
}

impl Default for DriverRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}
