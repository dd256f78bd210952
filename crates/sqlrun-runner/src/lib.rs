//! sqlrun runner
//!
//! Executes statements read line by line from an input, grouping them into
//! units of work and committing each unit atomically. A failed run reports
//! the line to resume from, so the operator can restart with `--start`
//! without re-running committed work.

mod batch;
mod config;
mod error;
mod executor;
mod filter;
mod report;
mod runner;
mod session;
mod source;
mod transaction;

pub use batch::{AccumulatorState, BatchAccumulator, STATEMENT_SEPARATOR, UnitOfWork};
pub use config::{BatchMode, RunConfig};
pub use error::{RunError, suppress_cleanup};
pub use executor::{ResultSets, StatementExecutor};
pub use filter::{LineFilter, StatementLine};
pub use report::{DIAGNOSTIC_PREFIX, ResultReporter, Tag};
pub use runner::{RunOutcome, Runner};
pub use session::SessionState;
pub use source::{LineSource, ReaderLineSource, VecLineSource};
pub use transaction::TransactionController;
