//! Error types for sqlrun

use thiserror::Error;

/// Core error type raised by drivers and connections
#[derive(Error, Debug)]
pub enum SqlrunError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Query error: {0}")]
    Query(String),

    #[error("Transaction error: {0}")]
    Transaction(String),

    #[error("Driver error: {0}")]
    Driver(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Not supported: {0}")]
    NotSupported(String),

    #[error("Connection is closed")]
    Closed,
}

/// Result type alias for sqlrun operations
pub type Result<T> = std::result::Result<T, SqlrunError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SqlrunError::Query("no such table: t".into());
        assert_eq!(err.to_string(), "Query error: no such table: t");
        assert_eq!(SqlrunError::Closed.to_string(), "Connection is closed");
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: SqlrunError = io.into();
        assert!(matches!(err, SqlrunError::Io(_)));
        assert!(err.to_string().contains("gone"));
    }
}
