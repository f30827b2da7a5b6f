//! Deferred statement builder.
//!
//! A [`Statement`] accumulates [`QueryOptions`] through chainable calls and
//! does no I/O until it is resolved, either with `.await` or
//! [`Statement::resolve`]. Resolution runs the registered hooks, renders
//! parameterized SQL, executes it once, and memoizes the outcome: resolving
//! the same statement again (or awaiting it through a shared reference from
//! several places) yields the same result without a second round trip.
//!
//! # Example
//!
//! ```ignore
//! use pgtable::{Statement, Mode};
//!
//! let rows = Statement::new(&executor, "users", registry.lookup("users"))?
//!     .where_eq("age", 24)
//!     .add_order_by("-account")
//!     .limit(10)
//!     .await?;
//! ```

mod render;
mod shape;


pub use render::Rendered;
pub use shape::{Affected, Counted, FirstRow, InsertedRows, Raw, Rows, Shape};

use crate::error::{OrmError, OrmResult};
use crate::executor::{Command, Executor, QueryOutput};
use crate::hook::{HookRegistry, Operation};
use crate::ident::Ident;
use crate::row::Record;
use crate::schema::TableSchema;
use crate::value::Value;
use std::fmt;
use std::future::{Future, IntoFuture};
use std::marker::PhantomData;
use std::ops::Deref;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::OnceCell;

/// Longest SQL text written to the statement log.
#[cfg(feature = "tracing")]
const SQL_LOG_MAX_LENGTH: usize = 200;

/// What the statement renders to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    Select,
    Insert,
    Update,
    Count,
    Create,
    Index,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Select => "select",
            Mode::Insert => "insert",
            Mode::Update => "update",
            Mode::Count => "count",
            Mode::Create => "create",
            Mode::Index => "index",
        }
    }

    /// The command reported when the statement had nothing to execute.
    pub(crate) fn command(&self) -> Command {
        match self {
            Mode::Select | Mode::Count => Command::Select,
            Mode::Insert => Command::Insert,
            Mode::Update => Command::Update,
            Mode::Create | Mode::Index => Command::Create,
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An ordered list of strings that ignores repeated entries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UniqueList(Vec<String>);

impl UniqueList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `item` unless it is already present. Returns whether it was added.
    pub fn push(&mut self, item: impl Into<String>) -> bool {
        let item = item.into();
        if self.0.contains(&item) {
            return false;
        }
        self.0.push(item);
        true
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }
}

impl Deref for UniqueList {
    type Target = [String];

    fn deref(&self) -> &[String] {
        &self.0
    }
}

impl<S: Into<String>> Extend<S> for UniqueList {
    fn extend<I: IntoIterator<Item = S>>(&mut self, iter: I) {
        for item in iter {
            self.push(item);
        }
    }
}

impl<S: Into<String>> FromIterator<S> for UniqueList {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut list = UniqueList::new();
        list.extend(iter);
        list
    }
}

/// The pending description of a statement.
///
/// Hooks receive a mutable reference to a copy of this just before rendering.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryOptions {
    /// Column equality conditions; a [`Value::List`] renders as `IN (...)`.
    pub conditions: Record,
    /// Raw predicates ANDed after the structured conditions.
    pub raw_conditions: Vec<String>,
    /// Projection (SELECT list or RETURNING list for inserts).
    pub fields: UniqueList,
    /// Order keys; a leading `-` means descending.
    pub orders: UniqueList,
    pub groups: UniqueList,
    pub havings: UniqueList,
    /// Extra clauses appended to `CREATE TABLE`.
    pub constraints: UniqueList,
    /// Index columns; a leading `-` means descending.
    pub indexes: UniqueList,
    /// `0` means no LIMIT clause.
    pub limit: u64,
    /// `0` means no OFFSET clause.
    pub offset: u64,
    pub inserts: Vec<Record>,
    pub updates: Record,
    /// Aggregate expression used by count statements.
    pub count: String,
    pub mode: Mode,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            conditions: Record::new(),
            raw_conditions: Vec::new(),
            fields: UniqueList::new(),
            orders: UniqueList::new(),
            groups: UniqueList::new(),
            havings: UniqueList::new(),
            constraints: UniqueList::new(),
            indexes: UniqueList::new(),
            limit: 0,
            offset: 0,
            inserts: Vec::new(),
            updates: Record::new(),
            count: "count(*)".to_string(),
            mode: Mode::Select,
        }
    }
}

/// Values accepted by [`Statement::limit`] and [`Statement::offset`].
///
/// Negative numbers and text that does not start with digits are ignored.
pub trait IntoCount {
    fn into_count(self) -> Option<u64>;
}

macro_rules! impl_into_count {
    ($($t:ty),*) => {$(
        impl IntoCount for $t {
            fn into_count(self) -> Option<u64> {
                u64::try_from(self).ok()
            }
        }
    )*};
}

impl_into_count!(u8, u16, u32, u64, usize, i32, i64, isize);

impl IntoCount for &str {
    fn into_count(self) -> Option<u64> {
        let s = self.trim();
        let end = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
        s[..end].parse().ok()
    }
}

impl IntoCount for String {
    fn into_count(self) -> Option<u64> {
        self.as_str().into_count()
    }
}

/// A deferred, memoized statement against one table.
///
/// `S` selects how the result is shaped; see [`Shape`].
pub struct Statement<'a, E, S = Raw> {
    executor: &'a E,
    table: String,
    ident: Ident,
    schema: Arc<TableSchema>,
    options: QueryOptions,
    hooks: Option<Arc<HookRegistry>>,
    operations: Vec<Operation>,
    outcome: OnceCell<OrmResult<QueryOutput>>,
    shape: PhantomData<fn() -> S>,
}

impl<'a, E> Statement<'a, E, Raw> {
    /// Create a statement for `table`.
    ///
    /// Fails with a validation error when the table name is not a valid
    /// identifier or when no (non-empty) schema is given. The schema's
    /// constraint clauses seed [`QueryOptions::constraints`].
    pub fn new(executor: &'a E, table: &str, schema: Option<Arc<TableSchema>>) -> OrmResult<Self> {
        if table.trim().is_empty() {
            return Err(OrmError::validation("table name can not be empty"));
        }
        let ident = Ident::parse(table)?;
        let schema = match schema {
            Some(schema) if !schema.columns.is_empty() => schema,
            _ => {
                return Err(OrmError::validation(format!(
                    "table '{table}' has no registered schema"
                )));
            }
        };

        let mut options = QueryOptions::default();
        options.constraints.extend(schema.constraints.iter().cloned());

        Ok(Self {
            executor,
            table: table.to_string(),
            ident,
            schema,
            options,
            hooks: None,
            operations: Vec::new(),
            outcome: OnceCell::new(),
            shape: PhantomData,
        })
    }
}

impl<'a, E, S> Statement<'a, E, S> {
    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    /// The options as built so far (before hooks run).
    pub fn options(&self) -> &QueryOptions {
        &self.options
    }

    pub fn mode(&self) -> Mode {
        self.options.mode
    }

    /// Whether the statement has already been resolved.
    pub fn is_resolved(&self) -> bool {
        self.outcome.initialized()
    }

    /// Add an equality condition. A list value becomes `IN (...)`, `Null`
    /// becomes `IS NULL`. Setting the same column again replaces its value.
    pub fn where_eq(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.options.conditions.insert(column, value);
        self
    }

    /// Merge a whole condition map.
    pub fn where_all(mut self, conditions: Record) -> Self {
        self.options.conditions.merge(conditions);
        self
    }

    /// Add a raw predicate. Blank predicates are ignored.
    pub fn where_raw(mut self, predicate: impl Into<String>) -> Self {
        let predicate = predicate.into();
        if !predicate.trim().is_empty() {
            self.options.raw_conditions.push(predicate);
        }
        self
    }

    pub fn add_field(mut self, field: impl Into<String>) -> Self {
        self.options.fields.push(field);
        self
    }

    pub fn add_fields<I, T>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.options.fields.extend(fields);
        self
    }

    /// `"col"` sorts ascending, `"-col"` descending.
    pub fn add_order_by(mut self, key: impl Into<String>) -> Self {
        self.options.orders.push(key);
        self
    }

    pub fn add_group_by(mut self, column: impl Into<String>) -> Self {
        self.options.groups.push(column);
        self
    }

    /// Add a HAVING predicate; only rendered together with GROUP BY.
    pub fn add_having(mut self, predicate: impl Into<String>) -> Self {
        self.options.havings.push(predicate);
        self
    }

    pub fn add_constraint(mut self, clause: impl Into<String>) -> Self {
        self.options.constraints.push(clause);
        self
    }

    /// Add an index column; `"-col"` indexes descending.
    pub fn add_index(mut self, column: impl Into<String>) -> Self {
        self.options.indexes.push(column);
        self
    }

    pub fn limit(mut self, n: impl IntoCount) -> Self {
        if let Some(n) = n.into_count() {
            self.options.limit = n;
        }
        self
    }

    pub fn offset(mut self, n: impl IntoCount) -> Self {
        if let Some(n) = n.into_count() {
            self.options.offset = n;
        }
        self
    }

    /// Queue rows for insertion. Every row must carry the same columns.
    pub fn insert<I>(mut self, rows: I) -> Self
    where
        I: IntoIterator<Item = Record>,
    {
        self.options.inserts.extend(rows);
        self
    }

    pub fn update(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.options.updates.insert(column, value);
        self
    }

    pub fn update_all(mut self, values: Record) -> Self {
        self.options.updates.merge(values);
        self
    }

    /// Replace the aggregate used by count statements (default `count(*)`).
    pub fn count_expr(mut self, expr: impl Into<String>) -> Self {
        self.options.count = expr.into();
        self
    }

    pub fn set_mode(mut self, mode: Mode) -> Self {
        self.options.mode = mode;
        self
    }

    /// Give up the verb's result shape and resolve to the raw [`QueryOutput`].
    pub fn raw(self) -> Statement<'a, E, Raw> {
        self.shaped()
    }

    pub(crate) fn shaped<T>(self) -> Statement<'a, E, T> {
        Statement {
            executor: self.executor,
            table: self.table,
            ident: self.ident,
            schema: self.schema,
            options: self.options,
            hooks: self.hooks,
            operations: self.operations,
            outcome: self.outcome,
            shape: PhantomData,
        }
    }

    /// Run `hooks` for `operations`, in order, at resolution time.
    pub(crate) fn with_hooks(mut self, hooks: Arc<HookRegistry>, operations: &[Operation]) -> Self {
        self.hooks = Some(hooks);
        self.operations = operations.to_vec();
        self
    }

    /// Render the current options without running hooks.
    ///
    /// `Ok(None)` means resolving would not touch the database.
    pub fn render(&self) -> OrmResult<Option<Rendered>> {
        render::render(&self.ident, &self.schema, &self.options)
    }
}

impl<'a, E: Executor, S: Shape> Statement<'a, E, S> {
    /// Execute the statement (once) and shape the outcome.
    ///
    /// Later calls return the memoized outcome, including a memoized error.
    /// Mutations made after the first resolution are not applied.
    pub async fn resolve(&self) -> OrmResult<S::Output> {
        match self.outcome.get_or_init(|| self.run()).await {
            Ok(output) => Ok(S::shape(output)),
            Err(err) => S::recover(err.clone()),
        }
    }

    async fn run(&self) -> OrmResult<QueryOutput> {
        let mut options = self.options.clone();
        if let Some(hooks) = &self.hooks {
            for operation in &self.operations {
                hooks.run(*operation, &mut options, &self.table);
            }
        }

        let Some(rendered) = render::render(&self.ident, &self.schema, &options)? else {
            #[cfg(feature = "tracing")]
            tracing::debug!(
                target: "pgtable.sql",
                mode = %options.mode,
                table = %self.table,
                "nothing to execute"
            );
            return Ok(QueryOutput::empty(options.mode.command()));
        };

        #[cfg(feature = "tracing")]
        tracing::debug!(
            target: "pgtable.sql",
            mode = %options.mode,
            table = %self.table,
            param_count = rendered.params.len(),
            sql = %truncate_sql(&rendered.sql, SQL_LOG_MAX_LENGTH),
            "executing statement"
        );

        self.executor.execute(&rendered.sql, &rendered.params).await
    }
}

impl<E, S> fmt::Debug for Statement<'_, E, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Statement")
            .field("table", &self.table)
            .field("options", &self.options)
            .field("operations", &self.operations)
            .field("resolved", &self.outcome.initialized())
            .finish_non_exhaustive()
    }
}

impl<'s, 'a, E, S> IntoFuture for &'s Statement<'a, E, S>
where
    E: Executor,
    S: Shape,
{
    type Output = OrmResult<S::Output>;
    type IntoFuture = Pin<Box<dyn Future<Output = Self::Output> + Send + 's>>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(self.resolve())
    }
}

impl<'a, E, S> IntoFuture for Statement<'a, E, S>
where
    E: Executor + 'a,
    S: Shape + 'a,
{
    type Output = OrmResult<S::Output>;
    type IntoFuture = Pin<Box<dyn Future<Output = Self::Output> + Send + 'a>>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(async move { self.resolve().await })
    }
}

#[cfg(feature = "tracing")]
fn truncate_sql(sql: &str, max_bytes: usize) -> String {
    if sql.len() <= max_bytes {
        return sql.to_string();
    }
    let mut end = max_bytes;
    while end > 0 && !sql.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &sql[..end])
}
