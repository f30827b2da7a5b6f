//! Connection pool utilities and the pool-backed execution surface.

use crate::config::ClientConfig;
use crate::error::{OrmError, OrmResult};
use crate::executor::{Executor, QueryOutput, run_on_client};
use crate::value::Value;
use deadpool_postgres::{Manager, ManagerConfig, Object, Pool, RecyclingMethod};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio_postgres::NoTls;

/// Capacity of the lifecycle event channel; slow subscribers observe `Lagged`.
const EVENT_CAPACITY: usize = 64;

/// Pool lifecycle notifications, re-broadcast to subscribers without interpretation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PoolEvent {
    /// A new physical connection was opened.
    Connect,
    /// A connection was checked out.
    Acquire,
    /// A connection was dropped from the pool (closed or idle-evicted).
    Remove,
    /// Checking out or keeping a connection failed.
    Error(String),
}

/// Create a connection pool from parsed configuration.
///
/// Uses `NoTls` and fast recycling.
pub fn create_pool(config: &ClientConfig) -> OrmResult<Pool> {
    let manager = Manager::from_config(
        config.to_pg_config(),
        NoTls,
        ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        },
    );
    Pool::builder(manager)
        .max_size(config.max_size)
        .build()
        .map_err(|e| OrmError::config(e.to_string()))
}

/// The shared pool as an [`Executor`]: each statement checks out its own
/// connection and returns it as soon as the statement completes.
#[derive(Clone)]
pub struct PoolExecutor {
    pool: Pool,
    events: broadcast::Sender<PoolEvent>,
}

impl PoolExecutor {
    pub fn new(pool: Pool) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self { pool, events }
    }

    pub fn pool(&self) -> &Pool {
        &self.pool
    }

    /// Subscribe to pool lifecycle events.
    pub fn subscribe(&self) -> broadcast::Receiver<PoolEvent> {
        self.events.subscribe()
    }

    fn emit(&self, event: PoolEvent) {
        emit(&self.events, event);
    }

    /// Check out one connection. It goes back to the pool when dropped.
    pub async fn acquire(&self) -> OrmResult<Connection> {
        let size_before = self.pool.status().size;
        let object = match self.pool.get().await {
            Ok(object) => object,
            Err(err) => {
                self.emit(PoolEvent::Error(err.to_string()));
                return Err(err.into());
            }
        };
        if self.pool.status().size > size_before {
            self.emit(PoolEvent::Connect);
        }
        self.emit(PoolEvent::Acquire);
        Ok(Connection {
            object: Some(object),
            events: self.events.clone(),
        })
    }

    /// Drop pooled connections whose last checkout is older than `idle_timeout`.
    ///
    /// deadpool stamps `last_used` when a connection is handed out, so time
    /// spent checked out counts as idle time. Connections currently checked
    /// out are not in the pool and are never touched here.
    ///
    /// Returns the number of evicted connections.
    pub fn evict_idle(&self, idle_timeout: Duration) -> usize {
        let result = self
            .pool
            .retain(|_, metrics| metrics.last_used() < idle_timeout);
        let removed = result.removed.len();
        for _ in 0..removed {
            self.emit(PoolEvent::Remove);
        }
        removed
    }
}

impl Executor for PoolExecutor {
    async fn execute(&self, sql: &str, params: &[Value]) -> OrmResult<QueryOutput> {
        let conn = self.acquire().await?;
        conn.execute(sql, params).await
    }
}

/// A single checked-out connection.
///
/// Statements run on the same session, which is what a transaction needs.
/// A connection found closed on drop is detached from the pool instead of
/// being recycled.
pub struct Connection {
    object: Option<Object>,
    events: broadcast::Sender<PoolEvent>,
}

impl Connection {
    fn client(&self) -> OrmResult<&tokio_postgres::Client> {
        match &self.object {
            Some(object) => {
                let client: &tokio_postgres::Client = object;
                Ok(client)
            }
            None => Err(OrmError::Connection("connection already released".to_string())),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.object.as_ref().is_none_or(|object| object.is_closed())
    }

    /// Run one or more parameterless statements (e.g. `BEGIN`).
    pub async fn batch_execute(&self, sql: &str) -> OrmResult<()> {
        self.client()?
            .batch_execute(sql)
            .await
            .map_err(OrmError::from_db_error)
    }

    /// Close the session instead of handing it back to the pool.
    pub(crate) fn detach(mut self) {
        if let Some(object) = self.object.take() {
            emit(&self.events, PoolEvent::Remove);
            drop(Object::take(object));
        }
    }
}

impl Executor for Connection {
    async fn execute(&self, sql: &str, params: &[Value]) -> OrmResult<QueryOutput> {
        run_on_client(self.client()?, sql, params).await
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        let Some(object) = self.object.take() else {
            return;
        };
        if object.is_closed() {
            emit(&self.events, PoolEvent::Error("connection closed".to_string()));
            emit(&self.events, PoolEvent::Remove);
            drop(Object::take(object));
        }
    }
}

fn emit(events: &broadcast::Sender<PoolEvent>, event: PoolEvent) {
    #[cfg(feature = "tracing")]
    tracing::trace!(target: "pgtable.pool", event = ?event, "pool event");
    // No subscribers is fine.
    let _ = events.send(event);
}
