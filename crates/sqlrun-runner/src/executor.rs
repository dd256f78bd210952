//! Statement execution and result draining

use crate::error::suppress_cleanup;
use crate::report::{ResultReporter, Tag};
use sqlrun_core::{ColumnMeta, Result, Row, Statement, StatementOutcome};
use std::io::Write;

/// Lazy, finite and non-restartable sequence of the result sets produced by
/// one execution. Update counts in between are skipped.
pub struct ResultSets<'a> {
    statement: &'a mut dyn Statement,
    finished: bool,
    seen: usize,
}

impl<'a> ResultSets<'a> {
    pub fn new(statement: &'a mut dyn Statement) -> Self {
        Self {
            statement,
            finished: false,
            seen: 0,
        }
    }

    /// Poll the statement until the next result set or the end of results.
    /// Returns the columns; rows follow through `next_row`.
    pub async fn next(&mut self) -> Result<Option<Vec<ColumnMeta>>> {
        while !self.finished {
            match self.statement.next_outcome().await {
                Ok(Some(StatementOutcome::Rows(columns))) => {
                    self.seen += 1;
                    return Ok(Some(columns));
                }
                Ok(Some(StatementOutcome::Affected(count))) => {
                    tracing::trace!(rows_affected = count, "skipping update count");
                }
                Ok(None) => self.finished = true,
                Err(e) => {
                    self.finished = true;
                    return Err(e);
                }
            }
        }
        Ok(None)
    }

    /// Next row of the result set last returned by `next`
    pub async fn next_row(&mut self) -> Result<Option<Row>> {
        if self.finished {
            return Ok(None);
        }
        self.statement.next_row().await.inspect_err(|_| self.finished = true)
    }

    /// Number of result sets returned so far
    pub fn seen(&self) -> usize {
        self.seen
    }
}

/// Sends unit text to the back end and reports every result set
pub struct StatementExecutor {
    statement: Box<dyn Statement>,
    ignore_no_data: bool,
}

impl StatementExecutor {
    pub fn new(statement: Box<dyn Statement>, ignore_no_data: bool) -> Self {
        Self {
            statement,
            ignore_no_data,
        }
    }

    /// Execute `text` and report its results under `tag`, row by row as the
    /// back end produces them.
    ///
    /// Returns the number of result sets reported.
    pub async fn execute<O: Write, D: Write>(
        &mut self,
        text: &str,
        tag: Tag,
        reporter: &mut ResultReporter<O, D>,
    ) -> Result<usize> {
        self.statement.execute(text).await?;

        let mut results = ResultSets::new(self.statement.as_mut());
        while let Some(columns) = results.next().await? {
            reporter.result_header(tag, &columns)?;

            let mut rows = 0u64;
            while let Some(row) = results.next_row().await? {
                // Rows of a column-less result have nothing to show
                if !columns.is_empty() {
                    reporter.result_row(&row)?;
                }
                rows += 1;
            }
            if !columns.is_empty() {
                reporter.result_end(tag, rows)?;
            }

            tracing::debug!(%tag, columns = columns.len(), rows, "result set reported");
        }

        let seen = results.seen();
        if seen == 0 && !self.ignore_no_data {
            reporter.no_data(tag)?;
        }
        Ok(seen)
    }

    /// Release the statement handle, suppressing any failure
    pub async fn close(self) {
        suppress_cleanup("closing the statement", self.statement.close().await);
    }
}
