//! Convenient imports for typical `pgtable` usage.
//!
//! ```ignore
//! use pgtable::prelude::*;
//! ```

pub use crate::{
    Client, ClientConfig, ColumnSchema, HookRegistry, Operation, OrmError, OrmResult, QueryOptions,
    Record, SchemaRegistry, Table, TableSchema, Transaction, Value, record,
};
