//! Line numbering and windowing

use crate::config::RunConfig;
use crate::session::SessionState;
use crate::source::LineSource;
use std::io;

/// A non-blank, trimmed statement and the line it came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatementLine {
    pub line_number: u64,
    pub text: String,
}

/// Numbers raw lines from 1 and forwards only non-blank lines inside the
/// `[start_line, start_line + line_count)` window.
///
/// The upper bound is checked before reading, so no line past the window is
/// ever consumed from the source.
#[derive(Debug, Clone)]
pub struct LineFilter {
    start_line: u64,
    end_line: Option<u64>,
    last_consumed: Option<u64>,
    exhausted: bool,
}

impl LineFilter {
    pub fn new(config: &RunConfig) -> Self {
        Self {
            start_line: config.start_line,
            end_line: config.end_line(),
            last_consumed: None,
            exhausted: false,
        }
    }

    /// Last line read inside the window, blank or not
    pub fn last_consumed(&self) -> Option<u64> {
        self.last_consumed
    }

    fn bound_reached(&self, next_line: u64) -> bool {
        self.end_line.is_some_and(|end| next_line >= end)
    }

    /// Pull the next statement, advancing `session.current_line` for every raw line read
    pub fn next_statement(
        &mut self,
        source: &mut dyn LineSource,
        session: &mut SessionState,
    ) -> io::Result<Option<StatementLine>> {
        while !self.exhausted {
            let next_line = session.current_line + 1;
            if self.bound_reached(next_line) {
                tracing::debug!(line = next_line, "line window exhausted");
                self.exhausted = true;
                break;
            }

            let Some(raw) = source.read_line()? else {
                self.exhausted = true;
                break;
            };
            session.current_line = next_line;

            if next_line < self.start_line {
                continue;
            }
            self.last_consumed = Some(next_line);

            let text = raw.trim();
            if text.is_empty() {
                tracing::trace!(line = next_line, "skipping blank line");
                continue;
            }

            return Ok(Some(StatementLine {
                line_number: next_line,
                text: text.to_string(),
            }));
        }
        Ok(None)
    }
}
