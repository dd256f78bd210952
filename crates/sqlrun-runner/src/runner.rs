//! The run controller

use crate::batch::{BatchAccumulator, UnitOfWork};
use crate::config::{BatchMode, RunConfig};
use crate::error::{RunError, RunResult, suppress_cleanup};
use crate::executor::StatementExecutor;
use crate::filter::LineFilter;
use crate::report::{ResultReporter, Tag};
use crate::session::SessionState;
use crate::source::LineSource;
use crate::transaction::TransactionController;
use sqlrun_core::Connection;
use std::io::Write;
use std::sync::Arc;

/// Terminal state of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every line in the window was executed and committed
    Completed { last_committed_line: u64 },
    /// The run stopped at `failed_line`; nothing after `resume_line - 1` was kept
    Failed { failed_line: u64, resume_line: u64 },
}

impl RunOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, RunOutcome::Completed { .. })
    }

    /// Process exit code for this outcome
    pub fn exit_code(&self) -> i32 {
        if self.is_success() { 0 } else { 1 }
    }
}

/// Drives one pass over the input against an open connection.
///
/// Results go to the primary channel `O`, progress and errors to the
/// diagnostic channel `D`.
pub struct Runner<O, D> {
    config: RunConfig,
    connection: Arc<dyn Connection>,
    reporter: ResultReporter<O, D>,
    session: SessionState,
}

impl<O: Write, D: Write> Runner<O, D> {
    pub fn new(
        config: RunConfig,
        connection: Arc<dyn Connection>,
        primary: O,
        diagnostic: D,
    ) -> RunResult<Self> {
        config.validate()?;
        let session = SessionState::new(config.start_line);
        Ok(Self {
            config,
            connection,
            reporter: ResultReporter::new(primary, diagnostic),
            session,
        })
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub fn session(&self) -> &SessionState {
        &self.session
    }

    /// Give back the primary and diagnostic channels
    pub fn into_channels(self) -> (O, D) {
        self.reporter.into_inner()
    }

    /// Execute the input.
    ///
    /// Mid-run failures are reported and returned as `RunOutcome::Failed`.
    /// `Err` is only returned when no statement handle could be obtained.
    #[tracing::instrument(
        skip_all,
        fields(input = %self.config.input_name, batch = %self.config.batch_mode)
    )]
    pub async fn run(&mut self, source: &mut dyn LineSource) -> RunResult<RunOutcome> {
        let statement = match self.connection.create_statement().await {
            Ok(statement) => statement,
            Err(e) => {
                suppress_cleanup("closing the connection", self.connection.close().await);
                return Err(RunError::Connection(e));
            }
        };
        self.reporter.connected(
            &self.config.input_name,
            self.config.start_line,
            self.config.line_count,
        );
        let mut executor = StatementExecutor::new(statement, self.config.ignore_no_data);
        let mut transactions = TransactionController::new(Arc::clone(&self.connection));

        let outcome = match self.drive(source, &mut executor, &mut transactions).await {
            Ok(()) => {
                self.cleanup(executor).await;
                if self.config.batch_mode == BatchMode::WholeFile {
                    self.reporter.committed();
                }
                self.reporter.done();
                tracing::info!(
                    statements = self.session.statements_executed,
                    units = self.session.units_committed,
                    last_committed_line = self.session.last_committed_line,
                    "run completed"
                );
                RunOutcome::Completed {
                    last_committed_line: self.session.last_committed_line,
                }
            }
            Err(err) => {
                self.session.errored = true;
                let failed_line = err.line().unwrap_or(self.session.current_line + 1);
                tracing::error!(line = failed_line, error = %err, "run failed");
                self.reporter.exception(failed_line, &err);

                let rolled_back = transactions.rollback_quietly().await;
                self.cleanup(executor).await;
                if rolled_back {
                    self.reporter.rolled_back();
                }

                let resume_line = self.session.resume_line();
                self.reporter.resume_hint(resume_line);
                RunOutcome::Failed {
                    failed_line,
                    resume_line,
                }
            }
        };

        if let Err(e) = self.reporter.flush() {
            tracing::warn!(error = %e, "failed to flush output");
        }
        Ok(outcome)
    }

    async fn drive(
        &mut self,
        source: &mut dyn LineSource,
        executor: &mut StatementExecutor,
        transactions: &mut TransactionController,
    ) -> RunResult<()> {
        let mut filter = LineFilter::new(&self.config);
        let mut accumulator = BatchAccumulator::new(self.config.batch_mode);
        let whole_file = self.config.batch_mode == BatchMode::WholeFile;

        if whole_file {
            transactions
                .begin()
                .await
                .map_err(|e| RunError::execution(self.config.start_line, e))?;
        }

        loop {
            let line = filter
                .next_statement(source, &mut self.session)
                .map_err(|e| RunError::execution(self.session.current_line + 1, e))?;
            let Some(line) = line else {
                break;
            };

            if self.config.log_queries && !self.config.batch_mode.is_batched() {
                self.reporter
                    .echo(Tag::Line(line.line_number), &line.text)
                    .map_err(|e| RunError::execution(line.line_number, e))?;
            }

            let unit = accumulator.push(line);
            self.session.batch_count = accumulator.pending();
            if let Some(unit) = unit {
                self.run_unit(unit, executor, transactions).await?;
            }
        }

        if let Some(unit) = filter.last_consumed().and_then(|end| accumulator.finish(end)) {
            tracing::debug!(statements = unit.len(), "flushing final partial batch");
            self.run_unit(unit, executor, transactions).await?;
        }
        self.session.batch_count = 0;

        if whole_file {
            let end_line = filter.last_consumed();
            transactions.commit().await.map_err(|e| {
                RunError::execution(end_line.unwrap_or(self.session.current_line), e)
            })?;
            if let Some(end_line) = end_line {
                self.session.record_commit(end_line);
            }
        }

        Ok(())
    }

    async fn run_unit(
        &mut self,
        unit: UnitOfWork,
        executor: &mut StatementExecutor,
        transactions: &mut TransactionController,
    ) -> RunResult<()> {
        let tag = unit.tag();
        let end_line = unit.end_line;
        tracing::debug!(
            start_line = unit.start_line,
            end_line,
            statements = unit.len(),
            "executing unit of work"
        );

        match unit.mode {
            BatchMode::Fixed(_) => {
                if self.config.log_queries {
                    self.reporter
                        .echo(tag, unit.text())
                        .map_err(|e| RunError::execution(end_line, e))?;
                }
                transactions
                    .begin()
                    .await
                    .map_err(|e| RunError::execution(end_line, e))?;
                executor
                    .execute(unit.text(), tag, &mut self.reporter)
                    .await
                    .map_err(|e| RunError::execution(end_line, e))?;
                transactions
                    .commit()
                    .await
                    .map_err(|e| RunError::execution(end_line, e))?;
                self.session.record_commit(end_line);
                self.reporter.ran_batch(unit.start_line, end_line);
            }
            BatchMode::None => {
                executor
                    .execute(unit.text(), tag, &mut self.reporter)
                    .await
                    .map_err(|e| RunError::execution(end_line, e))?;
                self.session.record_commit(end_line);
            }
            // Committed once, after the last line
            BatchMode::WholeFile => {
                executor
                    .execute(unit.text(), tag, &mut self.reporter)
                    .await
                    .map_err(|e| RunError::execution(end_line, e))?;
            }
        }

        self.session.statements_executed += unit.len() as u64;
        Ok(())
    }

    async fn cleanup(&mut self, executor: StatementExecutor) {
        executor.close().await;
        suppress_cleanup("closing the connection", self.connection.close().await);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::VecLineSource;
    use pretty_assertions::assert_eq;
    use sqlrun_driver_sqlite::SqliteConnection;

    fn sqlite() -> Arc<dyn Connection> {
        Arc::new(SqliteConnection::open(":memory:").expect("open"))
    }

    async fn run(config: RunConfig, lines: &[&str]) -> (RunOutcome, SessionState, String, String) {
        let mut runner =
            Runner::new(config, sqlite(), Vec::new(), Vec::new()).expect("valid config");
        let mut source = VecLineSource::new(lines.iter().copied());
        let outcome = runner.run(&mut source).await.expect("statement handle");
        let session = runner.session().clone();
        let (out, diag) = runner.into_channels();
        (
            outcome,
            session,
            String::from_utf8(out).expect("utf-8"),
            String::from_utf8(diag).expect("utf-8"),
        )
    }

    #[tokio::test]
    async fn test_unbatched_scenario() {
        let (outcome, session, out, diag) = run(
            RunConfig::new("in.sql"),
            &["CREATE TABLE t (id INTEGER)", "SELECT 1", "", "INSERT INTO t VALUES (1)"],
        )
        .await;

        assert_eq!(outcome, RunOutcome::Completed { last_committed_line: 4 });
        assert_eq!(session.current_line, 4);
        assert_eq!(session.statements_executed, 3);
        assert_eq!(
            out,
            "[1] -- query returned no data --\n\
             [2] -- results follow --\n1\n1\n\
             [4] -- query returned no data --\n"
        );
        assert_eq!(
            diag,
            "[sqlrun] Connected, file: in.sql, start: 1, lines: all\n[sqlrun] Done\n"
        );
    }

    #[tokio::test]
    async fn test_fixed_batch_tags_results_with_range() {
        let (outcome, session, out, diag) = run(
            RunConfig::new("in.sql").with_batch_mode(BatchMode::Fixed(2)),
            &["SELECT 1", "", "SELECT 2"],
        )
        .await;

        assert_eq!(outcome, RunOutcome::Completed { last_committed_line: 3 });
        assert_eq!(session.units_committed, 1);
        assert_eq!(
            out,
            "[1-3] -- results follow --\n1\n1\n[1-3] -- results follow --\n2\n2\n"
        );
        assert!(diag.contains("[sqlrun] Ran batch 1-3\n"));
    }

    #[tokio::test]
    async fn test_log_queries_echoes_statements() {
        let (_, _, out, _) = run(
            RunConfig::new("in.sql")
                .with_log_queries(true)
                .with_ignore_no_data(true),
            &["CREATE TABLE t (id INTEGER)", "  ", " INSERT INTO t VALUES (1) "],
        )
        .await;

        assert_eq!(
            out,
            "[1] CREATE TABLE t (id INTEGER)\n[3] INSERT INTO t VALUES (1)\n"
        );
    }

    #[tokio::test]
    async fn test_log_queries_echoes_batches() {
        let (_, _, out, _) = run(
            RunConfig::new("in.sql")
                .with_batch_mode(BatchMode::Fixed(5))
                .with_log_queries(true)
                .with_ignore_no_data(true),
            &["CREATE TABLE t (id INTEGER)", "INSERT INTO t VALUES (1)"],
        )
        .await;

        assert_eq!(
            out,
            "[1-2] CREATE TABLE t (id INTEGER)\n;\nINSERT INTO t VALUES (1)\n;\n\n"
        );
    }

    #[tokio::test]
    async fn test_failure_reports_resume_hint() {
        let (outcome, session, _, diag) = run(
            RunConfig::new("in.sql"),
            &["SELECT 1", "SELECT 2", "SELECT * FROM missing", "SELECT 4"],
        )
        .await;

        assert_eq!(
            outcome,
            RunOutcome::Failed {
                failed_line: 3,
                resume_line: 3
            }
        );
        assert!(session.errored);
        assert_eq!(outcome.exit_code(), 1);
        assert!(diag.contains("[sqlrun] Exception at line 3: "));
        assert!(diag.ends_with(
            "[sqlrun] Errors occurred - exiting, start next run from line 3 with the argument --start 3\n"
        ));
        assert!(!diag.contains("changes rolled back"));
    }

    #[tokio::test]
    async fn test_invalid_config_is_rejected() {
        let result = Runner::new(
            RunConfig::new("in.sql").with_start_line(0),
            sqlite(),
            Vec::new(),
            Vec::new(),
        );
        assert!(matches!(result, Err(RunError::Config(_))));
    }
}
