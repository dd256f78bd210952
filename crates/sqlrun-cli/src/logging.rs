//! Diagnostic logging setup
//!
//! Tracing output always goes to stderr so it never mixes with results on
//! stdout.

use std::io::IsTerminal;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Filter used when neither `--log-level` nor `RUST_LOG` is set
pub const DEFAULT_FILTER: &str = "warn";

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Filter directive, in `EnvFilter` syntax
    pub filter: String,
    /// Whether to include file/line information in logs
    pub include_location: bool,
    /// Whether to colour output
    pub ansi: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: DEFAULT_FILTER.to_string(),
            include_location: false,
            ansi: std::io::stderr().is_terminal(),
        }
    }
}

impl LoggingConfig {
    /// Debug output from every sqlrun crate
    pub fn verbose() -> Self {
        Self {
            filter: "warn,sqlrun_cli=debug,sqlrun_runner=debug,sqlrun_drivers=debug,sqlrun_driver_sqlite=debug,sqlrun_driver_postgres=debug".to_string(),
            include_location: true,
            ..Self::default()
        }
    }

    /// Resolve the filter: an explicit `--log-level` wins, then `RUST_LOG`, then the default
    pub fn from_cli(log_level: Option<&str>) -> Self {
        Self {
            filter: resolve_filter(log_level, std::env::var("RUST_LOG").ok()),
            ..Self::default()
        }
    }
}

fn resolve_filter(explicit: Option<&str>, env: Option<String>) -> String {
    explicit
        .map(str::to_string)
        .or(env)
        .map(|f| f.trim().to_string())
        .filter(|f| !f.is_empty())
        .unwrap_or_else(|| DEFAULT_FILTER.to_string())
}

/// Initialize the logging system with the given configuration
pub fn init(config: &LoggingConfig) -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_new(&config.filter)
        .map_err(|e| anyhow::anyhow!("invalid log filter '{}': {}", config.filter, e))?;

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_file(config.include_location)
        .with_line_number(config.include_location)
        .with_ansi(config.ansi);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .try_init()?;

    tracing::debug!(filter = %config.filter, "logging initialized");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_level_wins() {
        assert_eq!(resolve_filter(Some("debug"), Some("info".into())), "debug");
    }

    #[test]
    fn test_env_used_without_explicit_level() {
        assert_eq!(resolve_filter(None, Some("sqlrun_runner=trace".into())), "sqlrun_runner=trace");
    }

    #[test]
    fn test_falls_back_to_warn() {
        assert_eq!(resolve_filter(None, None), "warn");
        assert_eq!(resolve_filter(Some("  "), None), "warn");
    }

    #[test]
    fn test_verbose_enables_debug() {
        let config = LoggingConfig::verbose();
        assert!(config.filter.contains("sqlrun_runner=debug"));
        assert!(config.include_location);
    }
}
