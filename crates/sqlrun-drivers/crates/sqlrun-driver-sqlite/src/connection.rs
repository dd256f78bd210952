//! SQLite connection implementation
//!
//! rusqlite handles are blocking and a statement cursor borrows its
//! connection, so the connection lives on a dedicated worker thread. Handles
//! talk to it over a request channel; an open cursor stays on the worker's
//! stack between requests, which lets rows and statements be produced one at
//! a time.

use async_trait::async_trait;
use rusqlite::{Batch, Connection as RusqliteConnection, OpenFlags};
use sqlrun_core::{
    ColumnMeta, Connection, Result, Row, SqlrunError, Statement, StatementOutcome, Transaction,
    Value,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::{mpsc, oneshot};

type Reply<T> = oneshot::Sender<Result<T>>;

/// Work sent to the connection's worker thread
enum Request {
    Execute {
        statement: u64,
        sql: String,
        reply: Reply<()>,
    },
    NextOutcome {
        statement: u64,
        reply: Reply<Option<StatementOutcome>>,
    },
    NextRow {
        statement: u64,
        reply: Reply<Option<Row>>,
    },
    Begin(Reply<()>),
    Commit(Reply<()>),
    /// `None` when issued from a dropped transaction
    Rollback(Option<Reply<()>>),
}

/// Async handle to the worker thread
#[derive(Clone)]
struct Worker {
    requests: mpsc::UnboundedSender<Request>,
}

impl Worker {
    fn spawn(conn: RusqliteConnection) -> Result<Self> {
        let (requests, receiver) = mpsc::unbounded_channel();
        std::thread::Builder::new()
            .name("sqlite-worker".to_string())
            .spawn(move || serve(conn, receiver))
            .map_err(|e| {
                SqlrunError::Connection(format!("Failed to start SQLite worker thread: {}", e))
            })?;
        Ok(Self { requests })
    }

    async fn call<T: Send>(&self, request: impl FnOnce(Reply<T>) -> Request + Send) -> Result<T> {
        let (reply, response) = oneshot::channel();
        self.requests
            .send(request(reply))
            .map_err(|_| SqlrunError::Closed)?;
        response
            .await
            .map_err(|_| SqlrunError::Driver("SQLite worker stopped unexpectedly".into()))?
    }

    fn post(&self, request: Request) {
        if self.requests.send(request).is_err() {
            tracing::debug!("SQLite worker already stopped");
        }
    }
}

/// SQLite connection wrapper
pub struct SqliteConnection {
    worker: Worker,
    closed: Arc<AtomicBool>,
    next_statement: AtomicU64,
}

impl SqliteConnection {
    /// Open a SQLite database
    pub fn open(path: &str) -> Result<Self> {
        tracing::info!(path = %path, "opening SQLite database");
        // Expand path to handle ~ and relative paths
        let expanded_path = Self::expand_path(path)?;

        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_URI
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;

        let conn = if path == ":memory:" {
            RusqliteConnection::open_in_memory().map_err(|e| {
                SqlrunError::Connection(format!("Failed to open in-memory database: {}", e))
            })?
        } else {
            // Validate that parent directory exists for non-URI paths
            if !expanded_path.starts_with("file:") {
                let file_path = std::path::Path::new(&expanded_path);
                if let Some(parent) = file_path.parent()
                    && !parent.exists()
                {
                    return Err(SqlrunError::Connection(format!(
                        "Parent directory does not exist: {}",
                        parent.display()
                    )));
                }
            }

            RusqliteConnection::open_with_flags(&expanded_path, flags).map_err(|e| {
                SqlrunError::Connection(format!(
                    "Failed to open SQLite database at '{}': {}",
                    expanded_path, e
                ))
            })?
        };

        conn.pragma_update(None, "foreign_keys", "ON").map_err(|e| {
            SqlrunError::Connection(format!("Failed to enable foreign keys: {}", e))
        })?;

        let worker = Worker::spawn(conn)?;
        tracing::info!(path = %expanded_path, "SQLite database connection established");
        Ok(Self {
            worker,
            closed: Arc::new(AtomicBool::new(false)),
            next_statement: AtomicU64::new(1),
        })
    }

    /// Expand path to handle ~ (home directory) and relative paths
    fn expand_path(path: &str) -> Result<String> {
        if path == ":memory:" || path.starts_with("file:") {
            return Ok(path.to_string());
        }

        let expanded = if let Some(rest) = path.strip_prefix("~/") {
            if let Some(home) = std::env::var_os("HOME") {
                let home_path = std::path::PathBuf::from(home);
                home_path.join(rest).to_string_lossy().to_string()
            } else {
                return Err(SqlrunError::Configuration(
                    "Unable to determine HOME directory".into(),
                ));
            }
        } else if path.starts_with('~') {
            return Err(SqlrunError::Configuration(
                "User-specific home directories (~user) are not supported".into(),
            ));
        } else {
            path.to_string()
        };

        let path_buf = std::path::PathBuf::from(&expanded);
        let result = if path_buf.is_relative() {
            std::env::current_dir()
                .map_err(SqlrunError::Io)?
                .join(path_buf)
                .to_string_lossy()
                .to_string()
        } else {
            expanded
        };

        Ok(result)
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(SqlrunError::Closed);
        }
        Ok(())
    }
}

#[async_trait]
impl Connection for SqliteConnection {
    fn driver_name(&self) -> &str {
        "sqlite"
    }

    async fn create_statement(&self) -> Result<Box<dyn Statement>> {
        self.ensure_open()?;
        Ok(Box::new(SqliteStatement {
            id: self.next_statement.fetch_add(1, Ordering::Relaxed),
            worker: self.worker.clone(),
            closed: Arc::clone(&self.closed),
        }))
    }

    async fn begin_transaction(&self) -> Result<Box<dyn Transaction>> {
        self.ensure_open()?;
        tracing::debug!("beginning SQLite transaction");
        self.worker.call(Request::Begin).await?;
        tracing::debug!("SQLite transaction started");
        Ok(Box::new(SqliteTransaction {
            worker: self.worker.clone(),
            committed: false,
            rolled_back: false,
        }))
    }

    async fn close(&self) -> Result<()> {
        tracing::info!("closing SQLite connection");
        self.closed.store(true, Ordering::Release);
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

/// SQLite statement handle.
///
/// SQLite has no multi-result protocol, so the text is split with rusqlite's
/// `Batch`. Each statement runs when its outcome is requested, and rows are
/// stepped as they are fetched. Executing anything else on the connection,
/// including a transaction boundary, abandons the unread remainder.
pub struct SqliteStatement {
    id: u64,
    worker: Worker,
    closed: Arc<AtomicBool>,
}

impl SqliteStatement {
    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(SqlrunError::Closed);
        }
        Ok(())
    }
}

#[async_trait]
impl Statement for SqliteStatement {
    #[tracing::instrument(skip(self, sql), fields(sql_preview = %sql.chars().take(100).collect::<String>()))]
    async fn execute(&mut self, sql: &str) -> Result<()> {
        self.ensure_open()?;
        let statement = self.id;
        let sql = sql.to_string();
        self.worker
            .call(move |reply| Request::Execute {
                statement,
                sql,
                reply,
            })
            .await?;
        tracing::debug!("statement executed");
        Ok(())
    }

    async fn next_outcome(&mut self) -> Result<Option<StatementOutcome>> {
        self.ensure_open()?;
        let statement = self.id;
        self.worker
            .call(move |reply| Request::NextOutcome { statement, reply })
            .await
    }

    async fn next_row(&mut self) -> Result<Option<Row>> {
        self.ensure_open()?;
        let statement = self.id;
        self.worker
            .call(move |reply| Request::NextRow { statement, reply })
            .await
    }

    async fn close(self: Box<Self>) -> Result<()> {
        tracing::trace!(statement = self.id, "closing SQLite statement");
        Ok(())
    }
}

/// SQLite transaction wrapper.
///
/// Issues raw `BEGIN DEFERRED` / `COMMIT` / `ROLLBACK` SQL on the worker so
/// that statements executed through any handle of the connection take part.
pub struct SqliteTransaction {
    worker: Worker,
    committed: bool,
    rolled_back: bool,
}

impl Drop for SqliteTransaction {
    fn drop(&mut self) {
        if !self.committed && !self.rolled_back {
            tracing::warn!(
                "SQLite transaction dropped without commit or rollback, issuing automatic rollback"
            );
            self.worker.post(Request::Rollback(None));
        }
    }
}

#[async_trait]
impl Transaction for SqliteTransaction {
    async fn commit(mut self: Box<Self>) -> Result<()> {
        tracing::debug!("committing SQLite transaction");

        if self.rolled_back {
            return Err(SqlrunError::Transaction("Transaction already rolled back".into()));
        }
        if self.committed {
            return Err(SqlrunError::Transaction("Transaction already committed".into()));
        }

        // A failed COMMIT leaves the transaction open; Drop rolls it back
        self.worker.call(Request::Commit).await?;

        self.committed = true;
        tracing::debug!("SQLite transaction committed successfully");
        Ok(())
    }

    async fn rollback(mut self: Box<Self>) -> Result<()> {
        tracing::debug!("rolling back SQLite transaction");

        if self.committed {
            return Err(SqlrunError::Transaction("Transaction already committed".into()));
        }
        if self.rolled_back {
            return Ok(());
        }

        // Mark first so a failed ROLLBACK is not retried from Drop
        self.rolled_back = true;
        self.worker
            .call(|reply| Request::Rollback(Some(reply)))
            .await?;

        tracing::debug!("SQLite transaction rolled back successfully");
        Ok(())
    }
}

/// Worker loop. Ends when every handle to the connection is gone.
fn serve(conn: RusqliteConnection, mut requests: mpsc::UnboundedReceiver<Request>) {
    tracing::debug!("SQLite worker started");
    let mut next = requests.blocking_recv();
    while let Some(request) = next {
        next = match request {
            Request::Execute {
                statement,
                sql,
                reply,
            } => run_script(&conn, statement, &sql, reply, &mut requests),
            other => {
                handle_outside_script(&conn, other);
                requests.blocking_recv()
            }
        };
    }
    tracing::debug!("SQLite worker stopped");
}

/// Serve a request while no cursor is open
fn handle_outside_script(conn: &RusqliteConnection, request: Request) {
    match request {
        Request::Execute { reply, .. } => {
            let _ = reply.send(Err(SqlrunError::Driver(
                "execute must start a script".into(),
            )));
        }
        Request::NextOutcome { reply, .. } => {
            let _ = reply.send(Ok(None));
        }
        Request::NextRow { reply, .. } => {
            let _ = reply.send(Ok(None));
        }
        Request::Begin(reply) => {
            let _ = reply.send(conn.execute_batch("BEGIN DEFERRED").map_err(|e| {
                SqlrunError::Transaction(format!("Failed to begin transaction: {}", e))
            }));
        }
        Request::Commit(reply) => {
            let _ = reply.send(conn.execute_batch("COMMIT").map_err(|e| {
                SqlrunError::Transaction(format!("Failed to commit transaction: {}", e))
            }));
        }
        Request::Rollback(reply) => {
            // Some errors make SQLite end the transaction on its own
            let result = if conn.is_autocommit() {
                tracing::debug!("SQLite transaction already ended by the engine");
                Ok(())
            } else {
                conn.execute_batch("ROLLBACK").map_err(|e| {
                    SqlrunError::Transaction(format!("Failed to rollback transaction: {}", e))
                })
            };
            match reply {
                Some(reply) => {
                    let _ = reply.send(result);
                }
                None => {
                    if let Err(e) = result {
                        tracing::error!(error = %e, "automatic rollback on drop failed");
                    }
                }
            }
        }
    }
}

/// Who receives the outcome of the statement about to run
enum Waiter {
    Execute(Reply<()>),
    Outcome(Reply<Option<StatementOutcome>>),
}

impl Waiter {
    /// Deliver an outcome. The first statement's outcome is held back until
    /// it is asked for; `execute` itself only reports success.
    fn deliver(self, outcome: Option<StatementOutcome>) -> Option<StatementOutcome> {
        match self {
            Waiter::Execute(reply) => {
                let _ = reply.send(Ok(()));
                outcome
            }
            Waiter::Outcome(reply) => {
                let _ = reply.send(Ok(outcome));
                None
            }
        }
    }

    fn fail(self, error: SqlrunError) {
        match self {
            Waiter::Execute(reply) => {
                let _ = reply.send(Err(error));
            }
            Waiter::Outcome(reply) => {
                let _ = reply.send(Err(error));
            }
        }
    }
}

/// What the worker does after serving the current statement
enum Next {
    Advance(Reply<Option<StatementOutcome>>),
    Leave(Option<Request>),
}

/// Run `sql` one statement at a time, serving outcome and row requests for
/// `id` until the text is exhausted or another request takes over.
///
/// Returns the request that ended the script, if any.
fn run_script(
    conn: &RusqliteConnection,
    id: u64,
    sql: &str,
    reply: Reply<()>,
    requests: &mut mpsc::UnboundedReceiver<Request>,
) -> Option<Request> {
    let mut batch = Batch::new(conn, sql);
    let mut waiter = Waiter::Execute(reply);

    loop {
        let mut stmt = match batch.next() {
            Ok(Some(stmt)) => stmt,
            Ok(None) => {
                waiter.deliver(None);
                return requests.blocking_recv();
            }
            Err(e) => {
                waiter.fail(SqlrunError::Query(format!("Failed to prepare statement: {}", e)));
                return requests.blocking_recv();
            }
        };

        let next = if stmt.column_count() == 0 {
            match stmt.execute([]) {
                Ok(affected) => {
                    let staged = waiter.deliver(Some(StatementOutcome::Affected(affected as u64)));
                    serve_statement(id, staged, None, requests)
                }
                Err(e) => {
                    waiter.fail(SqlrunError::Query(format!("Failed to execute statement: {}", e)));
                    return requests.blocking_recv();
                }
            }
        } else {
            // decl_type comes from the CREATE TABLE definition when there is one
            let columns: Vec<ColumnMeta> = stmt
                .columns()
                .iter()
                .enumerate()
                .map(|(idx, col)| {
                    ColumnMeta::new(col.name(), col.decl_type().unwrap_or("DYNAMIC"), idx)
                })
                .collect();
            let width = columns.len();
            match stmt.query([]) {
                Ok(mut rows) => {
                    let staged = waiter.deliver(Some(StatementOutcome::Rows(columns)));
                    serve_statement(id, staged, Some((&mut rows, width)), requests)
                }
                Err(e) => {
                    waiter.fail(SqlrunError::Query(format!("Failed to execute query: {}", e)));
                    return requests.blocking_recv();
                }
            }
        };

        match next {
            Next::Advance(reply) => waiter = Waiter::Outcome(reply),
            Next::Leave(request) => return request,
        }
    }
}

/// Serve requests against the current statement until its successor is asked for
fn serve_statement(
    id: u64,
    mut staged: Option<StatementOutcome>,
    mut rows: Option<(&mut rusqlite::Rows<'_>, usize)>,
    requests: &mut mpsc::UnboundedReceiver<Request>,
) -> Next {
    loop {
        let Some(request) = requests.blocking_recv() else {
            return Next::Leave(None);
        };

        match request {
            Request::NextOutcome { statement, reply } if statement == id => {
                if let Some(outcome) = staged.take() {
                    let _ = reply.send(Ok(Some(outcome)));
                    continue;
                }
                return Next::Advance(reply);
            }
            Request::NextRow { statement, reply } if statement == id => {
                let Some((cursor, width)) = rows.as_mut().filter(|_| staged.is_none()) else {
                    let _ = reply.send(Ok(None));
                    continue;
                };
                match next_row(cursor, *width) {
                    Ok(Some(row)) => {
                        let _ = reply.send(Ok(Some(row)));
                    }
                    Ok(None) => {
                        rows = None;
                        let _ = reply.send(Ok(None));
                    }
                    Err(e) => {
                        let _ = reply.send(Err(e));
                        return Next::Leave(requests.blocking_recv());
                    }
                }
            }
            Request::NextOutcome { reply, .. } => {
                let _ = reply.send(Ok(None));
            }
            Request::NextRow { reply, .. } => {
                let _ = reply.send(Ok(None));
            }
            other => {
                tracing::trace!(statement = id, "abandoning unread results");
                return Next::Leave(Some(other));
            }
        }
    }
}

fn next_row(rows: &mut rusqlite::Rows<'_>, width: usize) -> Result<Option<Row>> {
    let Some(row) = rows
        .next()
        .map_err(|e| SqlrunError::Query(format!("Failed to fetch row: {}", e)))?
    else {
        return Ok(None);
    };

    let mut values = Vec::with_capacity(width);
    for i in 0..width {
        values.push(rusqlite_to_value(row, i)?);
    }
    Ok(Some(Row::new(values)))
}

/// Convert rusqlite row value to our Value type
fn rusqlite_to_value(row: &rusqlite::Row, idx: usize) -> Result<Value> {
    use rusqlite::types::ValueRef;

    let value_ref = row
        .get_ref(idx)
        .map_err(|e| SqlrunError::Query(e.to_string()))?;

    let value = match value_ref {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Int64(i),
        ValueRef::Real(f) => Value::Float64(f),
        ValueRef::Text(s) => Value::String(String::from_utf8_lossy(s).to_string()),
        // BLOBs written from text-typed input still decode as strings
        ValueRef::Blob(b) => match std::str::from_utf8(b) {
            Ok(s) => Value::String(s.to_string()),
            Err(_) => Value::Bytes(b.to_vec()),
        },
    };

    Ok(value)
}
