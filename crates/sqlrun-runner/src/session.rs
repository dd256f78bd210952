//! Per-run session state

/// Mutable state of one run, owned by the runner
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    /// Number of the last line read from the input (0 before the first read)
    pub current_line: u64,
    /// End line of the most recently committed unit
    pub last_committed_line: u64,
    /// Statements in the currently open unit
    pub batch_count: usize,
    pub errored: bool,
    pub statements_executed: u64,
    pub units_committed: u64,
}

impl SessionState {
    /// Start a session. Everything before `start_line` counts as already committed.
    pub fn new(start_line: u64) -> Self {
        Self {
            current_line: 0,
            last_committed_line: start_line.saturating_sub(1),
            batch_count: 0,
            errored: false,
            statements_executed: 0,
            units_committed: 0,
        }
    }

    /// Record that a unit ending at `end_line` was committed
    pub fn record_commit(&mut self, end_line: u64) {
        debug_assert!(end_line <= self.current_line);
        if end_line > self.last_committed_line {
            self.last_committed_line = end_line;
        }
        self.units_committed += 1;
    }

    /// Line a subsequent run should start from
    pub fn resume_line(&self) -> u64 {
        self.last_committed_line + 1
    }
}
