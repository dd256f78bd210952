//! Grouping statements into units of work

use crate::config::BatchMode;
use crate::filter::StatementLine;
use crate::report::Tag;

/// Appended after every statement of a fixed-size batch. The leading newline
/// ends a trailing `--` comment or a `GO`-style line before the terminator.
pub const STATEMENT_SEPARATOR: &str = "\n;\n";

/// A group of statements executed and committed together
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitOfWork {
    pub start_line: u64,
    pub end_line: u64,
    pub statements: Vec<String>,
    pub mode: BatchMode,
    text: String,
}

impl UnitOfWork {
    /// Text sent to the back end
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn len(&self) -> usize {
        self.statements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    /// Tag for everything reported about this unit
    pub fn tag(&self) -> Tag {
        match self.mode {
            BatchMode::Fixed(_) => Tag::Range(self.start_line, self.end_line),
            BatchMode::None | BatchMode::WholeFile => Tag::Line(self.end_line),
        }
    }
}

/// Observable state of the accumulator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccumulatorState {
    Empty,
    Accumulating,
    Full,
}

/// Collects statements until a unit is complete
#[derive(Debug)]
pub struct BatchAccumulator {
    mode: BatchMode,
    start_line: Option<u64>,
    statements: Vec<String>,
    buffer: String,
}

impl BatchAccumulator {
    pub fn new(mode: BatchMode) -> Self {
        Self {
            mode,
            start_line: None,
            statements: Vec::new(),
            buffer: String::new(),
        }
    }

    pub fn state(&self) -> AccumulatorState {
        match self.mode {
            _ if self.statements.is_empty() => AccumulatorState::Empty,
            BatchMode::Fixed(size) if self.statements.len() >= size => AccumulatorState::Full,
            _ => AccumulatorState::Accumulating,
        }
    }

    /// Statements currently buffered
    pub fn pending(&self) -> usize {
        self.statements.len()
    }

    /// Add a statement; returns the unit once it is complete
    pub fn push(&mut self, line: StatementLine) -> Option<UnitOfWork> {
        if self.statements.is_empty() {
            self.start_line = Some(line.line_number);
        }
        self.buffer.push_str(&line.text);
        if self.mode.is_batched() {
            self.buffer.push_str(STATEMENT_SEPARATOR);
        }
        self.statements.push(line.text);

        match self.state() {
            AccumulatorState::Full => self.flush(line.line_number),
            AccumulatorState::Accumulating if !self.mode.is_batched() => {
                self.flush(line.line_number)
            }
            _ => None,
        }
    }

    /// Flush a partially filled unit at end of input. `end_line` is the last
    /// line consumed, which may be a blank line after the final statement.
    pub fn finish(&mut self, end_line: u64) -> Option<UnitOfWork> {
        self.flush(end_line)
    }

    fn flush(&mut self, end_line: u64) -> Option<UnitOfWork> {
        let start_line = self.start_line.take()?;
        if self.statements.is_empty() {
            return None;
        }
        Some(UnitOfWork {
            start_line,
            end_line: end_line.max(start_line),
            statements: std::mem::take(&mut self.statements),
            mode: self.mode,
            text: std::mem::take(&mut self.buffer),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(n: u64, text: &str) -> StatementLine {
        StatementLine {
            line_number: n,
            text: text.to_string(),
        }
    }

    #[test]
    fn test_unbatched_flushes_every_statement() {
        let mut acc = BatchAccumulator::new(BatchMode::None);
        let unit = acc.push(line(4, "SELECT 1")).expect("flushed");

        assert_eq!((unit.start_line, unit.end_line), (4, 4));
        assert_eq!(unit.text(), "SELECT 1");
        assert_eq!(unit.tag(), Tag::Line(4));
        assert_eq!(acc.state(), AccumulatorState::Empty);
    }

    #[test]
    fn test_whole_file_flushes_every_statement() {
        let mut acc = BatchAccumulator::new(BatchMode::WholeFile);
        let unit = acc.push(line(1, "DELETE FROM t")).expect("flushed");
        assert_eq!(unit.text(), "DELETE FROM t");
        assert_eq!(unit.mode, BatchMode::WholeFile);
    }

    #[test]
    fn test_fixed_batch_fills_then_flushes() {
        let mut acc = BatchAccumulator::new(BatchMode::Fixed(2));

        assert!(acc.push(line(1, "SELECT 1")).is_none());
        assert_eq!(acc.state(), AccumulatorState::Accumulating);
        assert_eq!(acc.pending(), 1);

        let unit = acc.push(line(3, "INSERT INTO t VALUES (1)")).expect("full");
        assert_eq!((unit.start_line, unit.end_line), (1, 3));
        assert_eq!(unit.len(), 2);
        assert_eq!(unit.text(), "SELECT 1\n;\nINSERT INTO t VALUES (1)\n;\n");
        assert_eq!(unit.tag(), Tag::Range(1, 3));
        assert_eq!(acc.state(), AccumulatorState::Empty);
    }

    #[test]
    fn test_fixed_batch_sizes() {
        let mut acc = BatchAccumulator::new(BatchMode::Fixed(3));
        let mut units = Vec::new();
        for n in 1..=8 {
            units.extend(acc.push(line(n, "SELECT 1")));
        }
        units.extend(acc.finish(8));

        let sizes: Vec<usize> = units.iter().map(UnitOfWork::len).collect();
        assert_eq!(sizes, vec![3, 3, 2]);
        assert_eq!((units[2].start_line, units[2].end_line), (7, 8));
    }

    #[test]
    fn test_finish_uses_last_consumed_line() {
        let mut acc = BatchAccumulator::new(BatchMode::Fixed(10));
        acc.push(line(2, "SELECT 1"));
        acc.push(line(5, "SELECT 2"));

        let unit = acc.finish(7).expect("partial unit");
        assert_eq!((unit.start_line, unit.end_line), (2, 7));
        assert!(acc.finish(9).is_none());
    }

    #[test]
    fn test_finish_on_empty_is_noop() {
        let mut acc = BatchAccumulator::new(BatchMode::Fixed(2));
        assert!(acc.finish(10).is_none());
    }
}
