//! Runner errors

use sqlrun_core::SqlrunError;
use thiserror::Error;

pub type RunResult<T> = Result<T, RunError>;

/// Errors raised while preparing or driving a run
#[derive(Debug, Error)]
pub enum RunError {
    /// Malformed or missing configuration, raised before connecting
    #[error("Configuration error: {0}")]
    Config(String),

    /// The back end could not be reached or the driver is unknown
    #[error("Connection error: {0}")]
    Connection(#[source] SqlrunError),

    /// A statement, unit of work or input read failed after the run started
    #[error("{source}")]
    Execution {
        line: u64,
        #[source]
        source: SqlrunError,
    },

    /// Releasing a handle or rolling back failed
    #[error("Cleanup failed while {action}: {source}")]
    Cleanup {
        action: &'static str,
        #[source]
        source: SqlrunError,
    },
}

impl RunError {
    /// Whether the error must abort the run
    pub fn is_fatal(&self) -> bool {
        !matches!(self, RunError::Cleanup { .. })
    }

    /// Line the failure is attributed to, when it happened mid-run
    pub fn line(&self) -> Option<u64> {
        match self {
            RunError::Execution { line, .. } => Some(*line),
            _ => None,
        }
    }

    pub(crate) fn execution(line: u64, source: impl Into<SqlrunError>) -> Self {
        RunError::Execution {
            line,
            source: source.into(),
        }
    }
}

/// Swallow the failure of a best-effort cleanup action, logging it at `warn`.
///
/// This is the only place where errors are discarded.
pub fn suppress_cleanup(action: &'static str, result: sqlrun_core::Result<()>) {
    if let Err(source) = result {
        let err = RunError::Cleanup { action, source };
        debug_assert!(!err.is_fatal());
        tracing::warn!(error = %err, "suppressed cleanup failure");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(RunError::Config("bad".into()).is_fatal());
        assert!(RunError::Connection(SqlrunError::Connection("refused".into())).is_fatal());
        assert!(RunError::execution(3, SqlrunError::Query("boom".into())).is_fatal());
        assert!(
            !RunError::Cleanup {
                action: "closing the statement",
                source: SqlrunError::Closed,
            }
            .is_fatal()
        );
    }

    #[test]
    fn test_execution_display_is_cause() {
        let err = RunError::execution(5, SqlrunError::Query("no such table: t".into()));
        assert_eq!(err.to_string(), "Query error: no such table: t");
        assert_eq!(err.line(), Some(5));
    }

    #[test]
    fn test_io_errors_become_execution_errors() {
        let io = std::io::Error::new(std::io::ErrorKind::InvalidData, "not utf-8");
        let err = RunError::execution(9, io);
        assert!(matches!(
            err,
            RunError::Execution {
                line: 9,
                source: SqlrunError::Io(_)
            }
        ));
    }

    #[test]
    fn test_suppress_cleanup_never_panics() {
        suppress_cleanup("closing the connection", Err(SqlrunError::Closed));
        suppress_cleanup("closing the connection", Ok(()));
    }
}
