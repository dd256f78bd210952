//! PostgreSQL connection implementation

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::{StreamExt, future};
use sqlrun_core::{
    ColumnMeta, Connection, Result, Row, SqlrunError, Statement, StatementOutcome, Transaction,
    Value,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;
use tokio_postgres::{Client, NoTls, SimpleQueryMessage};

/// Format PostgreSQL errors with user-facing detail while preserving SQLSTATE when present.
fn format_postgres_error(error: &tokio_postgres::Error) -> String {
    let Some(db_error) = error.as_db_error() else {
        return error.to_string();
    };

    let code = db_error.code();
    let mut message = db_error.message().to_string();

    if let Some(detail) = db_error.detail()
        && !detail.trim().is_empty()
    {
        message.push_str(&format!(" (detail: {})", detail));
    }

    if let Some(hint) = db_error.hint()
        && !hint.trim().is_empty()
    {
        message.push_str(&format!(" (hint: {})", hint));
    }

    if let Some(position) = db_error.position() {
        match position {
            tokio_postgres::error::ErrorPosition::Original(pos) => {
                message.push_str(&format!(" (position: {})", pos));
            }
            tokio_postgres::error::ErrorPosition::Internal { position, .. } => {
                message.push_str(&format!(" (internal position: {})", position));
            }
        }
    }

    format!("{} (SQLSTATE {})", message, code.code())
}

/// PostgreSQL connection wrapper
pub struct PostgresConnection {
    client: Arc<Mutex<Client>>,
    closed: Arc<AtomicBool>,
}

impl PostgresConnection {
    /// Connect using a parsed configuration
    pub async fn connect(config: tokio_postgres::Config) -> Result<Self> {
        tracing::info!(
            hosts = config.get_hosts().len(),
            dbname = ?config.get_dbname(),
            user = ?config.get_user(),
            "connecting to PostgreSQL database"
        );

        let (client, connection) = config
            .connect(NoTls)
            .await
            .map_err(|e| SqlrunError::Connection(format!("Failed to connect to PostgreSQL: {}", format_postgres_error(&e))))?;

        let closed = Arc::new(AtomicBool::new(false));
        let task_closed = Arc::clone(&closed);
        // Drive the connection until the client is dropped
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::error!(error = %e, "PostgreSQL connection error");
            }
            task_closed.store(true, Ordering::Release);
        });

        tracing::info!("PostgreSQL connection established");
        Ok(Self {
            client: Arc::new(Mutex::new(client)),
            closed,
        })
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(SqlrunError::Closed);
        }
        Ok(())
    }
}

#[async_trait]
impl Connection for PostgresConnection {
    fn driver_name(&self) -> &str {
        "postgres"
    }

    async fn create_statement(&self) -> Result<Box<dyn Statement>> {
        self.ensure_open()?;
        Ok(Box::new(PostgresStatement {
            client: Arc::clone(&self.client),
            closed: Arc::clone(&self.closed),
            cursor: None,
        }))
    }

    async fn begin_transaction(&self) -> Result<Box<dyn Transaction>> {
        self.ensure_open()?;
        tracing::debug!("beginning PostgreSQL transaction");
        {
            let client = self.client.lock().await;
            client.batch_execute("BEGIN").await.map_err(|e| {
                SqlrunError::Transaction(format!(
                    "Failed to begin transaction: {}",
                    format_postgres_error(&e)
                ))
            })?;
        }
        Ok(Box::new(PostgresTransaction {
            client: Arc::clone(&self.client),
            committed: false,
            rolled_back: false,
        }))
    }

    async fn close(&self) -> Result<()> {
        tracing::info!("closing PostgreSQL connection");
        self.closed.store(true, Ordering::Release);
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

/// Wire-level message, decoupled from tokio-postgres so the cursor is testable
#[derive(Debug, Clone, PartialEq)]
enum WireMessage {
    Columns(Vec<String>),
    Row {
        columns: Vec<String>,
        values: Vec<Option<String>>,
    },
    Complete(u64),
}

fn to_wire(message: SimpleQueryMessage) -> Option<WireMessage> {
    match message {
        SimpleQueryMessage::RowDescription(columns) => Some(WireMessage::Columns(
            columns.iter().map(|c| c.name().to_string()).collect(),
        )),
        SimpleQueryMessage::Row(row) => Some(WireMessage::Row {
            columns: row.columns().iter().map(|c| c.name().to_string()).collect(),
            values: (0..row.len())
                .map(|i| row.get(i).map(str::to_string))
                .collect(),
        }),
        SimpleQueryMessage::CommandComplete(count) => Some(WireMessage::Complete(count)),
        _ => None,
    }
}

fn columns_from_names(names: &[String]) -> Vec<ColumnMeta> {
    names
        .iter()
        .enumerate()
        .map(|(idx, name)| ColumnMeta::new(name.as_str(), "text", idx))
        .collect()
}

fn row_from_values(values: Vec<Option<String>>) -> Row {
    Row::new(
        values
            .into_iter()
            .map(|v| v.map(Value::String).unwrap_or(Value::Null))
            .collect(),
    )
}

/// Folds the simple-query message stream into outcomes and rows as they are read
struct MessageCursor {
    messages: BoxStream<'static, Result<WireMessage>>,
    lookahead: Option<WireMessage>,
    in_rows: bool,
    done: bool,
}

impl MessageCursor {
    fn new(messages: BoxStream<'static, Result<WireMessage>>) -> Self {
        Self {
            messages,
            lookahead: None,
            in_rows: false,
            done: false,
        }
    }

    /// Wait for the first message so a failing first statement is reported now
    async fn prime(&mut self) -> Result<()> {
        self.lookahead = self.pull().await?;
        Ok(())
    }

    async fn pull(&mut self) -> Result<Option<WireMessage>> {
        if let Some(message) = self.lookahead.take() {
            return Ok(Some(message));
        }
        if self.done {
            return Ok(None);
        }
        match self.messages.next().await {
            Some(Ok(message)) => Ok(Some(message)),
            Some(Err(e)) => {
                self.done = true;
                Err(e)
            }
            None => {
                self.done = true;
                Ok(None)
            }
        }
    }

    async fn next_outcome(&mut self) -> Result<Option<StatementOutcome>> {
        while self.in_rows {
            self.next_row().await?;
        }

        match self.pull().await? {
            None => Ok(None),
            Some(WireMessage::Columns(names)) => {
                self.in_rows = true;
                Ok(Some(StatementOutcome::Rows(columns_from_names(&names))))
            }
            // Servers that skip the row description still name the columns on each row
            Some(WireMessage::Row { columns, values }) => {
                let meta = columns_from_names(&columns);
                self.lookahead = Some(WireMessage::Row { columns, values });
                self.in_rows = true;
                Ok(Some(StatementOutcome::Rows(meta)))
            }
            Some(WireMessage::Complete(count)) => Ok(Some(StatementOutcome::Affected(count))),
        }
    }

    async fn next_row(&mut self) -> Result<Option<Row>> {
        if !self.in_rows {
            return Ok(None);
        }

        let message = match self.pull().await {
            Ok(message) => message,
            Err(e) => {
                self.in_rows = false;
                return Err(e);
            }
        };
        match message {
            Some(WireMessage::Row { values, .. }) => Ok(Some(row_from_values(values))),
            Some(next @ WireMessage::Columns(_)) => {
                self.lookahead = Some(next);
                self.in_rows = false;
                Ok(None)
            }
            Some(WireMessage::Complete(_)) | None => {
                self.in_rows = false;
                Ok(None)
            }
        }
    }
}

/// PostgreSQL statement handle.
///
/// Text goes through the simple query protocol, which accepts several
/// statements at once. Responses are streamed: outcomes and rows are decoded
/// as they are asked for. The server stops at the first failing statement and
/// discards the implicit transaction.
pub struct PostgresStatement {
    client: Arc<Mutex<Client>>,
    closed: Arc<AtomicBool>,
    cursor: Option<MessageCursor>,
}

#[async_trait]
impl Statement for PostgresStatement {
    #[tracing::instrument(skip(self, sql), fields(sql_preview = %sql.chars().take(100).collect::<String>()))]
    async fn execute(&mut self, sql: &str) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(SqlrunError::Closed);
        }
        self.cursor = None;

        let stream = {
            let client = self.client.lock().await;
            client
                .simple_query_raw(sql)
                .await
                .map_err(|e| SqlrunError::Query(format_postgres_error(&e)))?
        };

        let messages = stream
            .filter_map(|message| {
                future::ready(match message {
                    Ok(message) => to_wire(message).map(Ok),
                    Err(e) => Some(Err(SqlrunError::Query(format_postgres_error(&e)))),
                })
            })
            .boxed();

        let mut cursor = MessageCursor::new(messages);
        cursor.prime().await?;
        self.cursor = Some(cursor);
        tracing::debug!("statement executed");
        Ok(())
    }

    async fn next_outcome(&mut self) -> Result<Option<StatementOutcome>> {
        match self.cursor.as_mut() {
            Some(cursor) => cursor.next_outcome().await,
            None => Ok(None),
        }
    }

    async fn next_row(&mut self) -> Result<Option<Row>> {
        match self.cursor.as_mut() {
            Some(cursor) => cursor.next_row().await,
            None => Ok(None),
        }
    }

    async fn close(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}

/// PostgreSQL transaction wrapper
pub struct PostgresTransaction {
    client: Arc<Mutex<Client>>,
    committed: bool,
    rolled_back: bool,
}

impl Drop for PostgresTransaction {
    fn drop(&mut self) {
        if self.committed || self.rolled_back {
            return;
        }
        tracing::warn!("PostgreSQL transaction dropped without commit or rollback");
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            tracing::error!("no runtime available to roll back dropped transaction");
            return;
        };
        let client = Arc::clone(&self.client);
        handle.spawn(async move {
            let client = client.lock().await;
            if let Err(e) = client.batch_execute("ROLLBACK").await {
                tracing::error!(error = %e, "automatic rollback on drop failed");
            }
        });
    }
}

#[async_trait]
impl Transaction for PostgresTransaction {
    async fn commit(mut self: Box<Self>) -> Result<()> {
        tracing::debug!("committing PostgreSQL transaction");
        if self.rolled_back {
            return Err(SqlrunError::Transaction("Transaction already rolled back".into()));
        }

        // COMMIT ends the transaction on the server even when it reports failure
        self.committed = true;
        let client = self.client.lock().await;
        client.batch_execute("COMMIT").await.map_err(|e| {
            SqlrunError::Transaction(format!(
                "Failed to commit transaction: {}",
                format_postgres_error(&e)
            ))
        })?;
        tracing::debug!("PostgreSQL transaction committed successfully");
        Ok(())
    }

    async fn rollback(mut self: Box<Self>) -> Result<()> {
        tracing::debug!("rolling back PostgreSQL transaction");
        if self.committed {
            return Err(SqlrunError::Transaction("Transaction already committed".into()));
        }

        self.rolled_back = true;
        let client = self.client.lock().await;
        client.batch_execute("ROLLBACK").await.map_err(|e| {
            SqlrunError::Transaction(format!(
                "Failed to rollback transaction: {}",
                format_postgres_error(&e)
            ))
        })?;
        tracing::debug!("PostgreSQL transaction rolled back successfully");
        Ok(())
    }
}
