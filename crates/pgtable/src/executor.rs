//! The execution surface statements are dispatched to.
//!
//! Both the shared pool ([`PoolExecutor`](crate::PoolExecutor)) and a single
//! checked-out connection ([`Connection`](crate::Connection), and through it
//! [`Transaction`](crate::Transaction)) implement [`Executor`], so every
//! builder and table façade works the same way inside or outside a transaction.

use crate::error::{OrmError, OrmResult};
use crate::row::Record;
use crate::value::Value;
use futures_util::TryStreamExt;
use std::future::Future;
use tokio_postgres::types::ToSql;

/// The statement keyword of an executed command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Command {
    #[default]
    Select,
    Insert,
    Update,
    Delete,
    Create,
    Other,
}

impl Command {
    /// Detect the command from the leading keyword of a SQL string.
    pub fn from_sql(sql: &str) -> Self {
        let keyword = sql
            .trim_start_matches(|c: char| c.is_whitespace() || c == '(')
            .split(|c: char| !c.is_ascii_alphabetic())
            .next()
            .unwrap_or("");
        match keyword.to_ascii_uppercase().as_str() {
            "SELECT" | "WITH" | "VALUES" => Command::Select,
            "INSERT" => Command::Insert,
            "UPDATE" => Command::Update,
            "DELETE" => Command::Delete,
            "CREATE" => Command::Create,
            _ => Command::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Command::Select => "SELECT",
            Command::Insert => "INSERT",
            Command::Update => "UPDATE",
            Command::Delete => "DELETE",
            Command::Create => "CREATE",
            Command::Other => "OTHER",
        }
    }
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw outcome of one executed statement.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryOutput {
    /// Returned rows, detached from the driver.
    pub rows: Vec<Record>,
    /// Rows affected (DML) or returned (SELECT).
    pub row_count: u64,
    pub command: Command,
}

impl QueryOutput {
    /// The outcome of a statement that had nothing to do (e.g. an empty insert batch).
    pub fn empty(command: Command) -> Self {
        Self {
            rows: Vec::new(),
            row_count: 0,
            command,
        }
    }

    pub fn first(&self) -> Option<&Record> {
        self.rows.first()
    }
}

/// Something that can run one parameterized statement.
pub trait Executor: Send + Sync {
    /// Execute `sql` with positional parameters bound to `$1..$n`.
    fn execute(
        &self,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = OrmResult<QueryOutput>> + Send;
}

/// Run a statement on a driver client, collecting rows and the affected count.
pub(crate) async fn run_on_client(
    client: &tokio_postgres::Client,
    sql: &str,
    params: &[Value],
) -> OrmResult<QueryOutput> {
    let refs: Vec<&(dyn ToSql + Sync)> = params.iter().map(|p| p as &(dyn ToSql + Sync)).collect();
    let stream = client
        .query_raw(sql, refs.iter().copied())
        .await
        .map_err(OrmError::from_db_error)?;
    tokio::pin!(stream);

    let mut rows = Vec::new();
    while let Some(row) = stream.try_next().await.map_err(OrmError::from_db_error)? {
        rows.push(Record::from_row(&row)?);
    }
    let row_count = stream.rows_affected().unwrap_or(rows.len() as u64);

    Ok(QueryOutput {
        rows,
        row_count,
        command: Command::from_sql(sql),
    })
}
