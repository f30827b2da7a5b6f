//! Transactions on one checked-out connection.
//!
//! A [`Transaction`] holds a single pooled connection from
//! [`Client::transaction`](crate::Client::transaction) until it is released.
//! It implements [`Executor`], so [`Transaction::table`] yields façades whose
//! statements run inside the transaction instead of on the pool.
//!
//! Callers must pair [`begin`](Transaction::begin) with
//! [`commit`](Transaction::commit) or [`rollback`](Transaction::rollback) on
//! every exit path and then [`release`](Transaction::release). The
//! [`transaction!`] macro does all of that.
//!
//! # Example
//!
//! ```ignore
//! use pgtable::record;
//!
//! pgtable::transaction!(client, tx, {
//!     let users = tx.table("users");
//!     users.update(record! { "account" => "a" }, record! { "age" => 1 })?.await?;
//!     users.update(record! { "account" => "b" }, record! { "age" => 2 })?.await?;
//!     Ok(())
//! })?;
//! ```

use crate::error::{OrmError, OrmResult};
use crate::executor::{Executor, QueryOutput};
use crate::hook::HookRegistry;
use crate::pool::Connection;
use crate::schema::SchemaRegistry;
use crate::table::Table;
use crate::value::Value;
use std::sync::Arc;

/// Runs the given block inside a database transaction.
///
/// - Checks out a connection via `$client.transaction().await` and begins.
/// - Commits on `Ok(_)`.
/// - Rolls back on `Err(_)`.
/// - Releases the connection in every case.
///
/// The block must evaluate to `pgtable::OrmResult<T>`.
#[macro_export]
macro_rules! transaction {
    ($client:expr, $tx:ident, $body:block) => {{
        let mut $tx = ($client).transaction().await?;
        let __pgtable_tx_result = match $tx.begin().await {
            Ok(()) => {
                let __pgtable_tx_body_result = async { $body }.await;
                match __pgtable_tx_body_result {
                    Ok(value) => $tx.commit().await.map(|()| value),
                    Err(error) => match $tx.rollback().await {
                        Ok(()) => Err(error),
                        Err(rollback_err) => Err($crate::OrmError::Other(format!(
                            "{error} (rollback failed: {rollback_err})"
                        ))),
                    },
                }
            }
            Err(error) => Err(error),
        };
        $tx.release();
        __pgtable_tx_result
    }};
}

/// One connection plus transaction state.
pub struct Transaction {
    conn: Option<Connection>,
    schemas: Arc<SchemaRegistry>,
    hooks: Arc<HookRegistry>,
    active: bool,
}

impl Transaction {
    pub(crate) fn new(conn: Connection, schemas: Arc<SchemaRegistry>, hooks: Arc<HookRegistry>) -> Self {
        Self {
            conn: Some(conn),
            schemas,
            hooks,
            active: false,
        }
    }

    fn conn(&self) -> OrmResult<&Connection> {
        self.conn
            .as_ref()
            .ok_or_else(|| OrmError::Other("transaction already released".to_string()))
    }

    /// Whether `BEGIN` has run without a matching commit or rollback.
    pub fn is_active(&self) -> bool {
        self.active
    }

    pub async fn begin(&mut self) -> OrmResult<()> {
        if self.active {
            return Err(OrmError::validation("transaction already begun"));
        }
        self.conn()?.batch_execute("BEGIN").await?;
        self.active = true;
        #[cfg(feature = "tracing")]
        tracing::debug!(target: "pgtable.tx", "begin");
        Ok(())
    }

    /// Commit. The transaction is over once this returns, whatever the outcome.
    pub async fn commit(&mut self) -> OrmResult<()> {
        if !self.active {
            return Err(OrmError::validation("no transaction in progress"));
        }
        self.active = false;
        let result = self.conn()?.batch_execute("COMMIT").await;
        #[cfg(feature = "tracing")]
        tracing::debug!(target: "pgtable.tx", ok = result.is_ok(), "commit");
        result
    }

    /// Roll back. A no-op when no transaction is in progress.
    pub async fn rollback(&mut self) -> OrmResult<()> {
        if !self.active {
            return Ok(());
        }
        self.active = false;
        let result = self.conn()?.batch_execute("ROLLBACK").await;
        #[cfg(feature = "tracing")]
        tracing::debug!(target: "pgtable.tx", ok = result.is_ok(), "rollback");
        result
    }

    /// Hand the connection back to the pool.
    ///
    /// A transaction still in progress is never returned to the pool: its
    /// connection is closed, which makes the server roll it back.
    pub fn release(mut self) {
        self.release_conn();
    }

    fn release_conn(&mut self) {
        let Some(conn) = self.conn.take() else {
            return;
        };
        if self.active {
            #[cfg(feature = "tracing")]
            tracing::warn!(
                target: "pgtable.tx",
                "transaction released while still in progress, closing its connection"
            );
            self.active = false;
            conn.detach();
        } else {
            #[cfg(feature = "tracing")]
            tracing::debug!(target: "pgtable.tx", "release");
            drop(conn);
        }
    }

    /// A façade for `name` whose statements run inside this transaction.
    pub fn table(&self, name: &str) -> Table<'_, Transaction> {
        Table::new(self, name, self.schemas.lookup(name), self.hooks.clone())
    }
}

impl Executor for Transaction {
    async fn execute(&self, sql: &str, params: &[Value]) -> OrmResult<QueryOutput> {
        self.conn()?.execute(sql, params).await
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        if self.conn.is_some() {
            #[cfg(feature = "tracing")]
            tracing::warn!(target: "pgtable.tx", "transaction dropped without release");
            self.release_conn();
        }
    }
}
