//! Connection, statement and transaction traits

use crate::{Result, Row, StatementOutcome};
use async_trait::async_trait;

/// A database connection
///
/// A connection runs in the back end's default commit mode (auto-commit for
/// every driver shipped with sqlrun) until `begin_transaction` is called.
/// While a `Transaction` is open, everything executed through the
/// connection's statement handles belongs to it.
#[async_trait]
pub trait Connection: Send + Sync {
    /// Get the driver name (e.g., "sqlite", "postgres")
    fn driver_name(&self) -> &str;

    /// Create a statement handle bound to this connection
    async fn create_statement(&self) -> Result<Box<dyn Statement>>;

    /// Turn auto-commit off until the returned transaction is committed or
    /// rolled back
    async fn begin_transaction(&self) -> Result<Box<dyn Transaction>>;

    /// Close the connection
    async fn close(&self) -> Result<()>;

    /// Check if the connection is closed
    fn is_closed(&self) -> bool;
}

/// A statement handle
///
/// `execute` sends text to the back end as-is. The text may contain several
/// statements; their outcomes are then retrieved in order with
/// `next_outcome` until it returns `None`, and the rows of a result set with
/// `next_row`. Outcomes and rows are produced on demand, never collected up
/// front. Results of one execution cannot be replayed:
/// calling `execute` again discards whatever was not read.
#[async_trait]
pub trait Statement: Send {
    /// Execute the text. A failure of its first statement is returned here.
    async fn execute(&mut self, sql: &str) -> Result<()>;

    /// Advance to the next outcome of the last execution, skipping any rows
    /// of the current result set that were not read.
    ///
    /// Returns `Ok(None)` once every outcome has been returned. An error
    /// raised by a later statement in the text surfaces here, after the
    /// outcomes of the statements that ran before it.
    async fn next_outcome(&mut self) -> Result<Option<StatementOutcome>>;

    /// Fetch the next row of the current result set.
    ///
    /// Returns `Ok(None)` at the end of the result set, or when the current
    /// outcome is not a result set.
    async fn next_row(&mut self) -> Result<Option<Row>>;

    /// Release the handle
    async fn close(self: Box<Self>) -> Result<()>;
}

/// A database transaction
///
/// Implementations roll back when dropped without an explicit commit or
/// rollback, so an abandoned unit of work never becomes visible.
#[async_trait]
pub trait Transaction: Send + Sync {
    /// Commit the transaction
    async fn commit(self: Box<Self>) -> Result<()>;

    /// Rollback the transaction
    async fn rollback(self: Box<Self>) -> Result<()>;
}
