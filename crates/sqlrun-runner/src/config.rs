//! Run configuration

use crate::error::{RunError, RunResult};

/// How statements are grouped into units of work
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BatchMode {
    /// Every statement is its own unit, run under auto-commit
    #[default]
    None,
    /// Up to N statements per unit, each unit in its own transaction
    Fixed(usize),
    /// Every statement is its own unit, all inside one transaction
    WholeFile,
}

impl BatchMode {
    /// Map a numeric batch size; zero means no batching
    pub fn from_size(size: usize) -> Self {
        if size == 0 {
            BatchMode::None
        } else {
            BatchMode::Fixed(size)
        }
    }

    pub fn is_batched(&self) -> bool {
        matches!(self, BatchMode::Fixed(_))
    }
}

impl std::fmt::Display for BatchMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BatchMode::None => f.write_str("none"),
            BatchMode::Fixed(n) => write!(f, "{}", n),
            BatchMode::WholeFile => f.write_str("all"),
        }
    }
}

/// Settings for one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    /// Name of the input, as shown in diagnostics
    pub input_name: String,
    /// First line to execute (1-based)
    pub start_line: u64,
    /// Number of lines to consider from `start_line`; `None` means all
    pub line_count: Option<u64>,
    pub batch_mode: BatchMode,
    /// Skip the "no data" marker for statements without a result set
    pub ignore_no_data: bool,
    /// Echo statements on the primary channel
    pub log_queries: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            input_name: "-".to_string(),
            start_line: 1,
            line_count: None,
            batch_mode: BatchMode::None,
            ignore_no_data: false,
            log_queries: false,
        }
    }
}

impl RunConfig {
    pub fn new(input_name: impl Into<String>) -> Self {
        Self {
            input_name: input_name.into(),
            ..Self::default()
        }
    }

    pub fn with_start_line(mut self, start_line: u64) -> Self {
        self.start_line = start_line;
        self
    }

    pub fn with_line_count(mut self, line_count: Option<u64>) -> Self {
        self.line_count = line_count;
        self
    }

    pub fn with_batch_mode(mut self, batch_mode: BatchMode) -> Self {
        self.batch_mode = batch_mode;
        self
    }

    pub fn with_ignore_no_data(mut self, ignore_no_data: bool) -> Self {
        self.ignore_no_data = ignore_no_data;
        self
    }

    pub fn with_log_queries(mut self, log_queries: bool) -> Self {
        self.log_queries = log_queries;
        self
    }

    /// Check the settings before anything touches the back end
    pub fn validate(&self) -> RunResult<()> {
        if self.start_line == 0 {
            return Err(RunError::Config(
                "start line must be at least 1 (line numbers start from 1)".into(),
            ));
        }
        if self.line_count == Some(0) {
            return Err(RunError::Config("number of lines must be greater than 0".into()));
        }
        if self.batch_mode == BatchMode::Fixed(0) {
            return Err(RunError::Config("fixed batch size must be greater than 0".into()));
        }
        if self.input_name.trim().is_empty() {
            return Err(RunError::Config("input file name is empty".into()));
        }
        Ok(())
    }

    /// Exclusive upper bound of the line window
    pub fn end_line(&self) -> Option<u64> {
        self.line_count.map(|count| self.start_line.saturating_add(count))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = RunConfig::new("script.sql");
        assert!(config.validate().is_ok());
        assert_eq!(config.start_line, 1);
        assert_eq!(config.batch_mode, BatchMode::None);
        assert_eq!(config.end_line(), None);
    }

    #[test]
    fn test_batch_mode_from_size() {
        assert_eq!(BatchMode::from_size(0), BatchMode::None);
        assert_eq!(BatchMode::from_size(500), BatchMode::Fixed(500));
        assert!(BatchMode::Fixed(2).is_batched());
        assert!(!BatchMode::WholeFile.is_batched());
        assert_eq!(BatchMode::WholeFile.to_string(), "all");
    }

    #[test]
    fn test_rejects_zero_start_line() {
        let err = RunConfig::new("x.sql").with_start_line(0).validate().unwrap_err();
        assert!(matches!(err, RunError::Config(_)));
    }

    #[test]
    fn test_rejects_zero_line_count() {
        let err = RunConfig::new("x.sql")
            .with_line_count(Some(0))
            .validate()
            .unwrap_err();
        assert!(err.to_string().contains("greater than 0"));
    }

    #[test]
    fn test_rejects_zero_fixed_batch() {
        assert!(
            RunConfig::new("x.sql")
                .with_batch_mode(BatchMode::Fixed(0))
                .validate()
                .is_err()
        );
    }

    #[test]
    fn test_window_end() {
        let config = RunConfig::new("x.sql")
            .with_start_line(10)
            .with_line_count(Some(5));
        assert_eq!(config.end_line(), Some(15));
    }
}
