//! Table schema registry.
//!
//! Schemas are registered once at setup and handed to the client; every
//! statement built for a table reads the same `Arc<TableSchema>`.

use crate::error::{OrmError, OrmResult};
use std::collections::HashMap;
use std::sync::Arc;

/// Ordered column definitions: column name -> native type definition
/// (e.g. `"varchar(80) unique"`, `"smallint CHECK (age > 0)"`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnSchema {
    columns: Vec<(String, String)>,
}

impl ColumnSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a column definition. A repeated name replaces the earlier definition.
    pub fn column(mut self, name: impl Into<String>, definition: impl Into<String>) -> Self {
        let name = name.into();
        let definition = definition.into();
        match self.columns.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = definition,
            None => self.columns.push((name, definition)),
        }
        self
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|(n, _)| n == name)
    }

    pub fn definition(&self, name: &str) -> Option<&str> {
        self.columns
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, d)| d.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.columns.iter().map(|(n, d)| (n.as_str(), d.as_str()))
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ColumnSchema {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        iter.into_iter()
            .fold(ColumnSchema::new(), |schema, (k, v)| schema.column(k, v))
    }
}

/// Columns plus table-level constraint clauses for one table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableSchema {
    pub columns: ColumnSchema,
    /// Free-form clauses appended verbatim after the column definitions
    /// at `CREATE TABLE` time (e.g. `CHECK (a < b)`).
    pub constraints: Vec<String>,
}

impl TableSchema {
    pub fn new(columns: ColumnSchema) -> Self {
        Self {
            columns,
            constraints: Vec::new(),
        }
    }

    pub fn with_constraint(mut self, clause: impl Into<String>) -> Self {
        self.constraints.push(clause.into());
        self
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.has_column(name)
    }
}

/// Mapping from table name to its registered schema.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    tables: HashMap<String, Arc<TableSchema>>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the schema for `table`.
    ///
    /// Fails with a validation error when the table name or the column schema
    /// is empty. Registering the same table again overwrites the previous entry
    /// without merging.
    pub fn register<C, S>(
        &mut self,
        table: &str,
        columns: ColumnSchema,
        constraints: C,
    ) -> OrmResult<()>
    where
        C: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if table.trim().is_empty() {
            return Err(OrmError::validation("table name can not be empty"));
        }
        if columns.is_empty() {
            return Err(OrmError::validation(format!(
                "schema for table '{table}' can not be empty"
            )));
        }
        let schema = TableSchema {
            columns,
            constraints: constraints.into_iter().map(Into::into).collect(),
        };
        self.tables.insert(table.to_string(), Arc::new(schema));
        Ok(())
    }

    /// Consuming variant of [`SchemaRegistry::register`] for setup chains.
    pub fn with_table(mut self, table: &str, columns: ColumnSchema) -> OrmResult<Self> {
        self.register(table, columns, std::iter::empty::<String>())?;
        Ok(self)
    }

    pub fn lookup(&self, table: &str) -> Option<Arc<TableSchema>> {
        self.tables.get(table).cloned()
    }

    pub fn contains(&self, table: &str) -> bool {
        self.tables.contains_key(table)
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}
