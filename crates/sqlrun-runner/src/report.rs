//! Rendering results and progress

use sqlrun_core::{ColumnMeta, Row};
use std::fmt;
use std::io::{self, Write};

/// Prefix of every progress and error line on the diagnostic channel
pub const DIAGNOSTIC_PREFIX: &str = "[sqlrun]";

/// Line attribution for reported output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tag {
    /// A single statement
    Line(u64),
    /// A fixed-size batch
    Range(u64, u64),
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tag::Line(n) => write!(f, "[{}]", n),
            Tag::Range(start, end) => write!(f, "[{}-{}]", start, end),
        }
    }
}

/// Writes results to the primary channel and progress to the diagnostic channel
pub struct ResultReporter<O, D> {
    primary: O,
    diagnostic: D,
}

impl<O: Write, D: Write> ResultReporter<O, D> {
    pub fn new(primary: O, diagnostic: D) -> Self {
        Self {
            primary,
            diagnostic,
        }
    }

    /// Echo the text about to be executed
    pub fn echo(&mut self, tag: Tag, text: &str) -> io::Result<()> {
        writeln!(self.primary, "{} {}", tag, text)
    }

    /// Start a result set: marker, then the header or the empty-recordset marker
    pub fn result_header(&mut self, tag: Tag, columns: &[ColumnMeta]) -> io::Result<()> {
        writeln!(self.primary, "{} -- results follow --", tag)?;

        if columns.is_empty() {
            return writeln!(self.primary, "{} -- query returned empty recordset --", tag);
        }

        let header: Vec<&str> = columns.iter().map(|c| c.name.as_str()).collect();
        writeln!(self.primary, "{}", header.join("\t"))
    }

    /// One tab-separated row
    pub fn result_row(&mut self, row: &Row) -> io::Result<()> {
        let mut first = true;
        for value in &row.values {
            if !first {
                self.primary.write_all(b"\t")?;
            }
            write!(self.primary, "{}", value)?;
            first = false;
        }
        writeln!(self.primary)
    }

    /// Close a result set that had columns; marks it when no row was written
    pub fn result_end(&mut self, tag: Tag, rows: u64) -> io::Result<()> {
        if rows == 0 {
            writeln!(self.primary, "{} -- query returned no rows --", tag)?;
        }
        Ok(())
    }

    /// Mark an execution that produced no result set at all
    pub fn no_data(&mut self, tag: Tag) -> io::Result<()> {
        writeln!(self.primary, "{} -- query returned no data --", tag)
    }

    pub fn connected(&mut self, input: &str, start_line: u64, line_count: Option<u64>) {
        let lines = line_count.map_or_else(|| "all".to_string(), |n| n.to_string());
        self.note(format_args!(
            "Connected, file: {}, start: {}, lines: {}",
            input, start_line, lines
        ));
    }

    pub fn ran_batch(&mut self, start_line: u64, end_line: u64) {
        self.note(format_args!("Ran batch {}-{}", start_line, end_line));
    }

    pub fn exception(&mut self, line: u64, cause: &dyn fmt::Display) {
        self.note(format_args!("Exception at line {}: {}", line, cause));
    }

    pub fn committed(&mut self) {
        self.note(format_args!("Committed"));
    }

    pub fn done(&mut self) {
        self.note(format_args!("Done"));
    }

    pub fn rolled_back(&mut self) {
        self.note(format_args!("Errors occurred - changes rolled back"));
    }

    pub fn resume_hint(&mut self, resume_line: u64) {
        self.note(format_args!(
            "Errors occurred - exiting, start next run from line {} with the argument --start {}",
            resume_line, resume_line
        ));
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.primary.flush()?;
        self.diagnostic.flush()
    }

    /// Give back both channels
    pub fn into_inner(self) -> (O, D) {
        (self.primary, self.diagnostic)
    }

    fn note(&mut self, message: fmt::Arguments<'_>) {
        if let Err(e) = writeln!(self.diagnostic, "{} {}", DIAGNOSTIC_PREFIX, message) {
            tracing::warn!(error = %e, "failed to write diagnostic message");
        }
    }
}
