//! Errors raised before a run starts

use sqlrun_core::SqlrunError;
use sqlrun_runner::RunError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("file does not exist: {0}")]
    MissingInput(String),

    #[error("could not open file {path}: {source}")]
    Input {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("could not connect - exiting: {0}")]
    Connection(#[source] SqlrunError),

    #[error(transparent)]
    Run(#[from] RunError),
}

impl CliError {
    pub fn open_input(path: &str, source: std::io::Error) -> Self {
        if source.kind() == std::io::ErrorKind::NotFound {
            CliError::MissingInput(path.to_string())
        } else {
            CliError::Input {
                path: path.to_string(),
                source,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_input_classification() {
        let missing = CliError::open_input(
            "load.sql",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        assert_eq!(missing.to_string(), "file does not exist: load.sql");

        let denied = CliError::open_input(
            "load.sql",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(matches!(denied, CliError::Input { .. }));
    }

    #[test]
    fn test_run_errors_are_transparent() {
        let err: CliError = RunError::Config("start line must be at least 1".into()).into();
        assert_eq!(err.to_string(), "Configuration error: start line must be at least 1");
    }
}
