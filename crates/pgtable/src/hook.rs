//! Operation hooks.
//!
//! A hook is a callback registered for one [`Operation`]. Just before a table
//! statement renders, every hook registered for its operation runs in
//! registration order with the statement's pending [`QueryOptions`] and the
//! table name, so it can stamp timestamps into pending inserts, add audit
//! columns to updates, or narrow conditions.
//!
//! # Example
//!
//! ```ignore
//! use pgtable::{HookRegistry, Operation};
//!
//! let mut hooks = HookRegistry::new();
//! hooks.register(Operation::Insert, |options, _table| {
//!     let now = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true);
//!     for row in &mut options.inserts {
//!         row.insert("createdAt", now.clone());
//!     }
//! });
//! ```

use crate::sql::QueryOptions;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// The table operations hooks can attach to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Insert,
    Update,
    Find,
    FindOne,
    Count,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Insert => "insert",
            Operation::Update => "update",
            Operation::Find => "find",
            Operation::FindOne => "findOne",
            Operation::Count => "count",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A registered hook: receives the pending options and the table name.
pub type Hook = Arc<dyn Fn(&mut QueryOptions, &str) + Send + Sync>;

/// Operation -> ordered hooks. Populated at setup, read on every operation.
#[derive(Clone, Default)]
pub struct HookRegistry {
    hooks: HashMap<Operation, Vec<Hook>>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a hook to `operation`'s list.
    pub fn register<F>(&mut self, operation: Operation, hook: F) -> &mut Self
    where
        F: Fn(&mut QueryOptions, &str) + Send + Sync + 'static,
    {
        self.register_arc(operation, Arc::new(hook))
    }

    /// Append a shared hook to `operation`'s list.
    pub fn register_arc(&mut self, operation: Operation, hook: Hook) -> &mut Self {
        self.hooks.entry(operation).or_default().push(hook);
        self
    }

    /// Consuming variant of [`HookRegistry::register`] for setup chains.
    pub fn with<F>(mut self, operation: Operation, hook: F) -> Self
    where
        F: Fn(&mut QueryOptions, &str) + Send + Sync + 'static,
    {
        self.register(operation, hook);
        self
    }

    /// Number of hooks registered for `operation`.
    pub fn count(&self, operation: Operation) -> usize {
        self.hooks.get(&operation).map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.values().all(Vec::is_empty)
    }

    /// Run `operation`'s hooks in registration order. No hooks is a no-op.
    pub fn run(&self, operation: Operation, options: &mut QueryOptions, table: &str) {
        let Some(hooks) = self.hooks.get(&operation) else {
            return;
        };
        for hook in hooks {
            hook(options, table);
        }
    }
}

impl fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (op, hooks) in &self.hooks {
            map.entry(op, &hooks.len());
        }
        map.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    #[test]
    fn hooks_run_in_registration_order() {
        let mut hooks = HookRegistry::new();
        hooks
            .register(Operation::Insert, |opts, _| {
                opts.updates.insert("step", "first");
            })
            .register(Operation::Insert, |opts, _| {
                let seen = opts.updates.get("step").cloned().unwrap_or(Value::Null);
                opts.updates.insert("seen_by_second", seen);
            });

        let mut options = QueryOptions::default();
        hooks.run(Operation::Insert, &mut options, "users");
        assert_eq!(
            options.updates.get("seen_by_second"),
            Some(&Value::Text("first".into()))
        );
    }

    #[test]
    fn hooks_receive_table_name() {
        let hooks = HookRegistry::new().with(Operation::Count, |opts, table| {
            opts.raw_conditions.push(format!("tbl = '{table}'"));
        });
        let mut options = QueryOptions::default();
        hooks.run(Operation::Count, &mut options, "users");
        assert_eq!(options.raw_conditions, vec!["tbl = 'users'".to_string()]);
    }

    #[test]
    fn missing_operation_is_noop() {
        let hooks = HookRegistry::new();
        let mut options = QueryOptions::default();
        hooks.run(Operation::Update, &mut options, "users");
        assert_eq!(options, QueryOptions::default());
        assert_eq!(hooks.count(Operation::Update), 0);
        assert!(hooks.is_empty());
    }
}
