//! Transaction boundaries around units of work

use crate::error::suppress_cleanup;
use sqlrun_core::{Connection, Result, SqlrunError, Transaction};
use std::sync::Arc;

/// Owns the open transaction, if any, on behalf of the runner
pub struct TransactionController {
    connection: Arc<dyn Connection>,
    active: Option<Box<dyn Transaction>>,
    /// Set by a successful begin, cleared only by a successful commit
    in_flight: bool,
}

impl TransactionController {
    pub fn new(connection: Arc<dyn Connection>) -> Self {
        Self {
            connection,
            active: None,
            in_flight: false,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    /// Turn auto-commit off until the next commit or rollback
    pub async fn begin(&mut self) -> Result<()> {
        if self.active.is_some() {
            return Err(SqlrunError::Transaction("A transaction is already open".into()));
        }
        self.active = Some(self.connection.begin_transaction().await?);
        self.in_flight = true;
        tracing::debug!("transaction opened");
        Ok(())
    }

    /// Commit the open transaction
    pub async fn commit(&mut self) -> Result<()> {
        let tx = self
            .active
            .take()
            .ok_or_else(|| SqlrunError::Transaction("No transaction to commit".into()))?;
        tx.commit().await?;
        self.in_flight = false;
        tracing::debug!("transaction committed");
        Ok(())
    }

    /// Roll back the open transaction, suppressing any failure.
    ///
    /// Returns whether work was left uncommitted, which includes a
    /// transaction whose commit failed.
    pub async fn rollback_quietly(&mut self) -> bool {
        if let Some(tx) = self.active.take() {
            suppress_cleanup("rolling back", tx.rollback().await);
            tracing::debug!("transaction rolled back");
        }
        std::mem::take(&mut self.in_flight)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlrun_core::StatementOutcome;
    use sqlrun_driver_sqlite::SqliteConnection;

    async fn count_rows(conn: &Arc<dyn Connection>) -> i64 {
        let mut stmt = conn.create_statement().await.expect("statement");
        stmt.execute("SELECT COUNT(*) FROM t").await.expect("count");
        match stmt.next_outcome().await.expect("outcome") {
            Some(StatementOutcome::Rows(_)) => {}
            other => panic!("expected rows, got {:?}", other),
        }
        let row = stmt.next_row().await.expect("row").expect("one row");
        row.get(0).and_then(|v| v.as_i64()).expect("integer")
    }

    async fn setup() -> Arc<dyn Connection> {
        let conn: Arc<dyn Connection> =
            Arc::new(SqliteConnection::open(":memory:").expect("open"));
        let mut stmt = conn.create_statement().await.expect("statement");
        stmt.execute("CREATE TABLE t (id INTEGER)").await.expect("create");
        conn
    }

    #[tokio::test]
    async fn test_commit_makes_work_visible() {
        let conn = setup().await;
        let mut controller = TransactionController::new(Arc::clone(&conn));

        controller.begin().await.expect("begin");
        assert!(controller.is_active());
        let mut stmt = conn.create_statement().await.expect("statement");
        stmt.execute("INSERT INTO t VALUES (1)").await.expect("insert");
        controller.commit().await.expect("commit");

        assert!(!controller.is_active());
        assert_eq!(count_rows(&conn).await, 1);
    }

    #[tokio::test]
    async fn test_rollback_discards_work() {
        let conn = setup().await;
        let mut controller = TransactionController::new(Arc::clone(&conn));

        controller.begin().await.expect("begin");
        let mut stmt = conn.create_statement().await.expect("statement");
        stmt.execute("INSERT INTO t VALUES (1)").await.expect("insert");

        assert!(controller.rollback_quietly().await);
        assert!(!controller.rollback_quietly().await);
        assert_eq!(count_rows(&conn).await, 0);
    }

    #[tokio::test]
    async fn test_double_begin_and_stray_commit_fail() {
        let conn = setup().await;
        let mut controller = TransactionController::new(conn);

        assert!(controller.commit().await.is_err());
        controller.begin().await.expect("begin");
        assert!(controller.begin().await.is_err());
        assert!(controller.rollback_quietly().await);
    }

    #[tokio::test]
    async fn test_failed_commit_still_counts_as_rolled_back() {
        let conn: Arc<dyn Connection> =
            Arc::new(SqliteConnection::open(":memory:").expect("open"));
        let mut stmt = conn.create_statement().await.expect("statement");
        stmt.execute(
            "CREATE TABLE parent (id INTEGER PRIMARY KEY);\n\
             CREATE TABLE child (parent_id INTEGER REFERENCES parent(id) DEFERRABLE INITIALLY DEFERRED);",
        )
        .await
        .expect("schema");
        while stmt.next_outcome().await.expect("schema outcome").is_some() {}

        let mut controller = TransactionController::new(Arc::clone(&conn));
        controller.begin().await.expect("begin");
        stmt.execute("INSERT INTO child VALUES (42)").await.expect("deferred check");

        assert!(controller.commit().await.is_err());
        assert!(!controller.is_active());
        assert!(controller.rollback_quietly().await);
        assert!(!controller.rollback_quietly().await);
    }
}
