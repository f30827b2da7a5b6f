//! Schema-bound table façade.
//!
//! A [`Table`] pairs one table name with its registered schema, the client's
//! hooks, and an [`Executor`] (the pool, or a transaction's connection). Each
//! verb returns a deferred [`Statement`] whose result is already shaped for
//! the caller; chain more builder calls onto it, then `.await` it. Use
//! [`Statement::raw`] to get the unshaped [`QueryOutput`](crate::QueryOutput)
//! instead.
//!
//! # Example
//!
//! ```ignore
//! use pgtable::record;
//!
//! let users = client.table("users");
//! let inserted = users.insert(record! { "account" => "a", "age" => 24 }, "account")?.await?;
//! let rows = users.find(record! { "age" => 24 }, "account age")?.add_order_by("account").await?;
//! let updated: u64 = users.update(record! { "account" => "a" }, record! { "age" => 25 })?.await?;
//! let total: i64 = users.count(record! {})?.await?;
//! ```

use crate::error::OrmResult;
use crate::executor::Executor;
use crate::hook::{HookRegistry, Operation};
use crate::row::Record;
use crate::schema::TableSchema;
use crate::sql::{
    Affected, Counted, FirstRow, InsertedRows, Mode, Raw, Rows, Shape, Statement,
};
use crate::value::Value;
use std::sync::Arc;

/// Column used by [`Table::find_by_id_and_update`] unless overridden.
pub const DEFAULT_ID_COLUMN: &str = "id";

/// Insert payloads: one row resolves to one optional row, a batch resolves to
/// one record per inserted row.
pub trait InsertInput {
    type Shape: Shape;

    fn into_rows(self) -> Vec<Record>;
}

impl InsertInput for Record {
    type Shape = FirstRow;

    fn into_rows(self) -> Vec<Record> {
        vec![self]
    }
}

impl InsertInput for Vec<Record> {
    type Shape = InsertedRows;

    fn into_rows(self) -> Vec<Record> {
        self
    }
}

impl<const N: usize> InsertInput for [Record; N] {
    type Shape = InsertedRows;

    fn into_rows(self) -> Vec<Record> {
        self.into()
    }
}

/// High-level verbs for one table.
pub struct Table<'a, E> {
    executor: &'a E,
    name: String,
    schema: Option<Arc<TableSchema>>,
    hooks: Arc<HookRegistry>,
    id_column: String,
}

impl<'a, E> Clone for Table<'a, E> {
    fn clone(&self) -> Self {
        Self {
            executor: self.executor,
            name: self.name.clone(),
            schema: self.schema.clone(),
            hooks: self.hooks.clone(),
            id_column: self.id_column.clone(),
        }
    }
}

impl<'a, E: Executor> Table<'a, E> {
    /// Bind a table to an executor.
    ///
    /// Nothing is validated here; every verb fails with a validation error if
    /// the name is invalid or the schema is missing.
    pub fn new(
        executor: &'a E,
        name: impl Into<String>,
        schema: Option<Arc<TableSchema>>,
        hooks: Arc<HookRegistry>,
    ) -> Self {
        Self {
            executor,
            name: name.into(),
            schema,
            hooks,
            id_column: DEFAULT_ID_COLUMN.to_string(),
        }
    }

    pub fn with_id_column(mut self, column: impl Into<String>) -> Self {
        self.id_column = column.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> Option<&TableSchema> {
        self.schema.as_deref()
    }

    fn statement(&self, mode: Mode, operations: &[Operation]) -> OrmResult<Statement<'a, E, Raw>> {
        let stmt = Statement::new(self.executor, &self.name, self.schema.clone())?.set_mode(mode);
        Ok(if operations.is_empty() {
            stmt
        } else {
            stmt.with_hooks(self.hooks.clone(), operations)
        })
    }

    /// Rows matching `conditions`. `fields` is a whitespace-separated
    /// projection; empty selects `*`.
    pub fn find(&self, conditions: Record, fields: &str) -> OrmResult<Statement<'a, E, Rows>> {
        Ok(self
            .statement(Mode::Select, &[Operation::Find])?
            .where_all(conditions)
            .add_fields(fields.split_whitespace())
            .shaped())
    }

    /// The first row matching `conditions`, or `None`.
    ///
    /// Runs the `FindOne` hooks, then the `Find` hooks.
    pub fn find_one(&self, conditions: Record, fields: &str) -> OrmResult<Statement<'a, E, FirstRow>> {
        Ok(self
            .statement(Mode::Select, &[Operation::FindOne, Operation::Find])?
            .where_all(conditions)
            .add_fields(fields.split_whitespace())
            .limit(1_u64)
            .shaped())
    }

    /// Insert one row or a batch. `fields` becomes the RETURNING list.
    pub fn insert<I: InsertInput>(
        &self,
        data: I,
        fields: &str,
    ) -> OrmResult<Statement<'a, E, I::Shape>> {
        Ok(self
            .statement(Mode::Insert, &[Operation::Insert])?
            .insert(data.into_rows())
            .add_fields(fields.split_whitespace())
            .shaped())
    }

    /// Set `data` on every row matching `conditions`; resolves to the
    /// affected-row count. Empty conditions update every row.
    pub fn update(&self, conditions: Record, data: Record) -> OrmResult<Statement<'a, E, Affected>> {
        Ok(self
            .statement(Mode::Update, &[Operation::Update])?
            .where_all(conditions)
            .update_all(data)
            .shaped())
    }

    /// [`Table::update`] keyed on the id column only.
    pub fn find_by_id_and_update(
        &self,
        id: impl Into<Value>,
        data: Record,
    ) -> OrmResult<Statement<'a, E, Affected>> {
        let mut conditions = Record::new();
        conditions.insert(self.id_column.clone(), id);
        self.update(conditions, data)
    }

    /// Number of rows matching `conditions`. A non-integer aggregate resolves to 0.
    pub fn count(&self, conditions: Record) -> OrmResult<Statement<'a, E, Counted>> {
        Ok(self
            .statement(Mode::Count, &[Operation::Count])?
            .where_all(conditions)
            .shaped())
    }

    /// `CREATE TABLE` from the registered schema, or from `schema` when given.
    pub fn create(&self, schema: Option<TableSchema>) -> OrmResult<Statement<'a, E, Raw>> {
        let schema = schema.map(Arc::new).or_else(|| self.schema.clone());
        Ok(Statement::new(self.executor, &self.name, schema)?.set_mode(Mode::Create))
    }

    /// `CREATE INDEX` over `columns`; a leading `-` indexes descending.
    pub fn create_index<I, T>(&self, columns: I) -> OrmResult<Statement<'a, E, Raw>>
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        let mut stmt = self.statement(Mode::Index, &[])?;
        for column in columns {
            stmt = stmt.add_index(column);
        }
        Ok(stmt)
    }
}

#[cfg(test)]
mod tests;
