//! Input line sources

use std::collections::VecDeque;
use std::io::{self, BufRead};

/// Ordered supply of raw input lines
pub trait LineSource {
    /// Read the next line without its terminator, or `None` at end of input
    fn read_line(&mut self) -> io::Result<Option<String>>;
}

/// Line source over any buffered reader, accepting `\n` and `\r\n` endings
pub struct ReaderLineSource<R> {
    reader: R,
    buf: String,
}

impl<R: BufRead> ReaderLineSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buf: String::new(),
        }
    }
}

impl<R: BufRead> LineSource for ReaderLineSource<R> {
    fn read_line(&mut self) -> io::Result<Option<String>> {
        self.buf.clear();
        if self.reader.read_line(&mut self.buf)? == 0 {
            return Ok(None);
        }
        if self.buf.ends_with('\n') {
            self.buf.pop();
            if self.buf.ends_with('\r') {
                self.buf.pop();
            }
        }
        Ok(Some(self.buf.clone()))
    }
}

/// In-memory line source
#[derive(Debug, Default, Clone)]
pub struct VecLineSource {
    lines: VecDeque<String>,
    reads: usize,
}

impl VecLineSource {
    pub fn new<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            lines: lines.into_iter().map(Into::into).collect(),
            reads: 0,
        }
    }

    /// Number of lines handed out so far
    pub fn reads(&self) -> usize {
        self.reads
    }
}

impl LineSource for VecLineSource {
    fn read_line(&mut self) -> io::Result<Option<String>> {
        let line = self.lines.pop_front();
        if line.is_some() {
            self.reads += 1;
        }
        Ok(line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(source: &mut dyn LineSource) -> Vec<String> {
        let mut lines = Vec::new();
        while let Some(line) = source.read_line().expect("read") {
            lines.push(line);
        }
        lines
    }

    #[test]
    fn test_reader_strips_terminators() {
        let mut source = ReaderLineSource::new("SELECT 1\r\n\nSELECT 2\nSELECT 3".as_bytes());
        assert_eq!(collect(&mut source), vec!["SELECT 1", "", "SELECT 2", "SELECT 3"]);
    }

    #[test]
    fn test_reader_keeps_inner_whitespace() {
        let mut source = ReaderLineSource::new("  SELECT 1 \t\n".as_bytes());
        assert_eq!(collect(&mut source), vec!["  SELECT 1 \t"]);
    }

    #[test]
    fn test_reader_rejects_invalid_utf8() {
        let bytes: &[u8] = &[0x53, 0xff, 0xfe, b'\n'];
        let mut source = ReaderLineSource::new(bytes);
        let err = source.read_line().unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn test_vec_source_counts_reads() {
        let mut source = VecLineSource::new(["a", "b"]);
        assert_eq!(collect(&mut source), vec!["a", "b"]);
        assert_eq!(source.reads(), 2);
        assert!(source.read_line().expect("read").is_none());
        assert_eq!(source.reads(), 2);
    }
}
