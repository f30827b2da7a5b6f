//! The top-level client: pool, schemas and hooks in one place.
//!
//! # Example
//!
//! ```ignore
//! use pgtable::{Client, ClientConfig, ColumnSchema, Operation, record};
//!
//! let mut client = Client::new(ClientConfig::from_env()?)?;
//! client.register_table(
//!     "users",
//!     ColumnSchema::new()
//!         .column("account", "varchar(80) unique")
//!         .column("age", "smallint"),
//!     ["CHECK (age >= 0)"],
//! )?;
//! client.register_hook(Operation::Insert, |options, _table| {
//!     for row in &mut options.inserts {
//!         row.insert("age", 0);
//!     }
//! });
//!
//! let users = client.table("users");
//! users.create(None)?.await?;
//! users.insert(record! { "account" => "a" }, "")?.await?;
//! ```

use crate::config::ClientConfig;
use crate::error::OrmResult;
use crate::executor::{Executor, QueryOutput};
use crate::hook::{HookRegistry, Operation};
use crate::pool::{Connection, PoolEvent, PoolExecutor, create_pool};
use crate::schema::{ColumnSchema, SchemaRegistry};
use crate::sql::QueryOptions;
use crate::table::Table;
use crate::transaction::Transaction;
use crate::value::Value;
use deadpool_postgres::Pool;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Shortest interval between idle-eviction sweeps.
const MIN_REAP_INTERVAL: Duration = Duration::from_secs(1);

/// Aborts the idle reaper once the last client clone is gone.
struct Reaper(JoinHandle<()>);

impl Drop for Reaper {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Pool-backed entry point. Cheap to clone; clones share the pool, the
/// registries and the event channel.
#[derive(Clone)]
pub struct Client {
    executor: PoolExecutor,
    schemas: Arc<SchemaRegistry>,
    hooks: Arc<HookRegistry>,
    config: Option<ClientConfig>,
    _reaper: Option<Arc<Reaper>>,
}

impl Client {
    /// Build the pool described by `config`.
    ///
    /// No connection is opened until the first statement runs. When
    /// `idle_timeout` is set and a Tokio runtime is available, a background
    /// task sweeps the pool every half timeout (at least once a second) with
    /// [`PoolExecutor::evict_idle`].
    pub fn new(config: ClientConfig) -> OrmResult<Self> {
        let executor = PoolExecutor::new(create_pool(&config)?);
        let reaper = config
            .idle_timeout
            .and_then(|idle| spawn_reaper(executor.clone(), idle))
            .map(Arc::new);
        Ok(Self {
            executor,
            schemas: Arc::new(SchemaRegistry::new()),
            hooks: Arc::new(HookRegistry::new()),
            config: Some(config),
            _reaper: reaper,
        })
    }

    /// Parse `database_url` and build the pool.
    pub fn connect(database_url: &str) -> OrmResult<Self> {
        Self::new(ClientConfig::from_url(database_url)?)
    }

    /// Wrap an existing pool.
    pub fn from_pool(pool: Pool) -> Self {
        Self {
            executor: PoolExecutor::new(pool),
            schemas: Arc::new(SchemaRegistry::new()),
            hooks: Arc::new(HookRegistry::new()),
            config: None,
            _reaper: None,
        }
    }

    pub fn with_schemas(mut self, schemas: SchemaRegistry) -> Self {
        self.schemas = Arc::new(schemas);
        self
    }

    pub fn with_hooks(mut self, hooks: HookRegistry) -> Self {
        self.hooks = Arc::new(hooks);
        self
    }

    /// Register (or replace) a table schema. Intended for setup, before
    /// statements are in flight; clones made earlier keep the old registry.
    pub fn register_table<C, S>(&mut self, table: &str, columns: ColumnSchema, constraints: C) -> OrmResult<()>
    where
        C: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Arc::make_mut(&mut self.schemas).register(table, columns, constraints)
    }

    /// Append a hook for `operation`. Same setup-time caveat as
    /// [`Client::register_table`].
    pub fn register_hook<F>(&mut self, operation: Operation, hook: F) -> &mut Self
    where
        F: Fn(&mut QueryOptions, &str) + Send + Sync + 'static,
    {
        Arc::make_mut(&mut self.hooks).register(operation, hook);
        self
    }

    pub fn schemas(&self) -> &SchemaRegistry {
        &self.schemas
    }

    pub fn hooks(&self) -> &HookRegistry {
        &self.hooks
    }

    /// The configuration the pool was built from, if built by this crate.
    pub fn config(&self) -> Option<&ClientConfig> {
        self.config.as_ref()
    }

    pub fn pool(&self) -> &Pool {
        self.executor.pool()
    }

    pub fn executor(&self) -> &PoolExecutor {
        &self.executor
    }

    /// Subscribe to pool lifecycle events.
    pub fn subscribe(&self) -> broadcast::Receiver<PoolEvent> {
        self.executor.subscribe()
    }

    /// Run arbitrary SQL on a pooled connection.
    pub async fn query(&self, sql: &str, params: &[Value]) -> OrmResult<QueryOutput> {
        self.executor.execute(sql, params).await
    }

    /// Check out a connection for manual use.
    pub async fn acquire(&self) -> OrmResult<Connection> {
        self.executor.acquire().await
    }

    /// A façade for `name` running on the pool. Verbs fail with a validation
    /// error if `name` has no registered schema.
    pub fn table(&self, name: &str) -> Table<'_, PoolExecutor> {
        Table::new(&self.executor, name, self.schemas.lookup(name), self.hooks.clone())
    }

    /// Check out a connection for a transaction. Call
    /// [`Transaction::begin`] next.
    pub async fn transaction(&self) -> OrmResult<Transaction> {
        let conn = self.executor.acquire().await?;
        Ok(Transaction::new(conn, self.schemas.clone(), self.hooks.clone()))
    }
}

impl Executor for Client {
    async fn execute(&self, sql: &str, params: &[Value]) -> OrmResult<QueryOutput> {
        self.executor.execute(sql, params).await
    }
}

fn spawn_reaper(executor: PoolExecutor, idle_timeout: Duration) -> Option<Reaper> {
    let runtime = tokio::runtime::Handle::try_current().ok()?;
    let period = (idle_timeout / 2).max(MIN_REAP_INTERVAL);
    let handle = runtime.spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            let _removed = executor.evict_idle(idle_timeout);
            #[cfg(feature = "tracing")]
            if _removed > 0 {
                tracing::trace!(target: "pgtable.pool", removed = _removed, "evicted idle connections");
            }
        }
    });
    Some(Reaper(handle))
}
