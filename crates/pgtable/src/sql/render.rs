//! Pure rendering of [`QueryOptions`] into parameterized SQL.
//!
//! Placeholders are numbered from `$1` by a single counter per statement, in
//! the order values are written: SET values, then condition values for
//! updates; row values for inserts; condition values otherwise.

use super::{Mode, QueryOptions};
use crate::error::{OrmError, OrmResult};
use crate::ident::{Ident, quote};
use crate::schema::TableSchema;
use crate::value::Value;
use std::fmt::Write as _;

/// Rendered statement text plus its positional parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Rendered {
    pub sql: String,
    pub params: Vec<Value>,
}

#[derive(Default)]
struct Writer {
    sql: String,
    params: Vec<Value>,
}

impl Writer {
    fn push(&mut self, sql: &str) -> &mut Self {
        self.sql.push_str(sql);
        self
    }

    fn push_bind(&mut self, value: Value) -> &mut Self {
        self.params.push(value);
        // Writing to a String cannot fail.
        let _ = write!(self.sql, "${}", self.params.len());
        self
    }

    fn finish(self) -> Rendered {
        Rendered {
            sql: self.sql,
            params: self.params,
        }
    }
}

/// Quote `name` when it is a known column; expressions, aggregates, `*` and
/// qualified names pass through untouched.
fn column_or_expr(schema: &TableSchema, name: &str) -> String {
    if schema.has_column(name) {
        quote(name)
    } else {
        name.to_string()
    }
}

/// A leading `-` marks descending order; the marker is stripped before quoting.
fn order_key(schema: &TableSchema, key: &str) -> String {
    match key.strip_prefix('-') {
        Some(name) => format!("{} DESC", column_or_expr(schema, name)),
        None => column_or_expr(schema, key),
    }
}

fn join_mapped<'s>(items: impl IntoIterator<Item = &'s String>, f: impl Fn(&str) -> String) -> String {
    items
        .into_iter()
        .map(|s| f(s))
        .collect::<Vec<_>>()
        .join(",")
}

fn push_where(w: &mut Writer, options: &QueryOptions) {
    let raws: Vec<&str> = options
        .raw_conditions
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect();
    if options.conditions.is_empty() && raws.is_empty() {
        return;
    }

    w.push(" WHERE ");
    let mut first = true;
    for (column, value) in options.conditions.iter() {
        if !first {
            w.push(" AND ");
        }
        first = false;
        w.push(&quote(column));
        match value {
            Value::List(items) if items.is_empty() => {
                w.push(" IN (NULL)");
            }
            Value::List(items) => {
                w.push(" IN (");
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        w.push(",");
                    }
                    w.push_bind(item.clone());
                }
                w.push(")");
            }
            Value::Null => {
                w.push(" IS NULL");
            }
            other => {
                w.push(" = ").push_bind(other.clone());
            }
        }
    }
    for raw in raws {
        if !first {
            w.push(" AND ");
        }
        first = false;
        w.push("(").push(raw).push(")");
    }
}

fn push_limit_offset(w: &mut Writer, options: &QueryOptions) {
    if options.limit > 0 {
        let _ = write!(w.sql, " LIMIT {}", options.limit);
    }
    if options.offset > 0 {
        let _ = write!(w.sql, " OFFSET {}", options.offset);
    }
}

fn select(table: &str, schema: &TableSchema, options: &QueryOptions) -> Rendered {
    let mut w = Writer::default();
    let fields = join_mapped(options.fields.iter(), |f| column_or_expr(schema, f));
    w.push("SELECT ")
        .push(if fields.is_empty() { "*" } else { &fields })
        .push(" FROM ")
        .push(table);
    push_where(&mut w, options);
    if !options.groups.is_empty() {
        w.push(" GROUP BY ")
            .push(&join_mapped(options.groups.iter(), |g| column_or_expr(schema, g)));
        if !options.havings.is_empty() {
            w.push(" HAVING ").push(&options.havings.join(" AND "));
        }
    }
    if !options.orders.is_empty() {
        w.push(" ORDER BY ")
            .push(&join_mapped(options.orders.iter(), |o| order_key(schema, o)));
    }
    push_limit_offset(&mut w, options);
    w.finish()
}

fn count(table: &str, options: &QueryOptions) -> Rendered {
    let mut w = Writer::default();
    w.push("SELECT ").push(&options.count).push(" FROM ").push(table);
    push_where(&mut w, options);
    w.finish()
}

fn insert(table: &str, schema: &TableSchema, options: &QueryOptions) -> OrmResult<Option<Rendered>> {
    let Some(first) = options.inserts.first() else {
        return Ok(None);
    };
    if first.is_empty() {
        return Err(OrmError::validation("insert row has no columns"));
    }
    let columns: Vec<&str> = first.keys().collect();
    for (i, row) in options.inserts.iter().enumerate().skip(1) {
        if !row.same_columns(first) {
            return Err(OrmError::validation(format!(
                "insert row {i} has columns [{}] but the first row has [{}]; all rows in a batch must share the same columns",
                row.keys().collect::<Vec<_>>().join(", "),
                columns.join(", "),
            )));
        }
    }

    let mut w = Writer::default();
    w.push("INSERT INTO ")
        .push(table)
        .push(" (")
        .push(&columns.iter().map(|c| quote(c)).collect::<Vec<_>>().join(","))
        .push(") VALUES ");
    for (i, row) in options.inserts.iter().enumerate() {
        if i > 0 {
            w.push(",");
        }
        w.push("(");
        for (j, column) in columns.iter().enumerate() {
            if j > 0 {
                w.push(",");
            }
            w.push_bind(row.get(column).cloned().unwrap_or(Value::Null));
        }
        w.push(")");
    }
    if !options.fields.is_empty() {
        w.push(" RETURNING ")
            .push(&join_mapped(options.fields.iter(), |f| column_or_expr(schema, f)));
    }
    Ok(Some(w.finish()))
}

fn update(table: &str, options: &QueryOptions) -> Option<Rendered> {
    if options.updates.is_empty() {
        return None;
    }
    let mut w = Writer::default();
    w.push("UPDATE ").push(table).push(" SET ");
    for (i, (column, value)) in options.updates.iter().enumerate() {
        if i > 0 {
            w.push(",");
        }
        w.push(&quote(column)).push(" = ").push_bind(value.clone());
    }
    push_where(&mut w, options);
    Some(w.finish())
}

fn create(table: &str, schema: &TableSchema, options: &QueryOptions) -> Rendered {
    let mut defs: Vec<String> = schema
        .columns
        .iter()
        .map(|(name, definition)| format!("{} {}", quote(name), definition))
        .collect();
    defs.extend(options.constraints.iter().cloned());

    let mut w = Writer::default();
    w.push("CREATE TABLE ")
        .push(table)
        .push(" (")
        .push(&defs.join(","))
        .push(")");
    w.finish()
}

fn index(table: &Ident, options: &QueryOptions) -> Option<Rendered> {
    if options.indexes.is_empty() {
        return None;
    }
    let mut name = table.to_flat_name();
    let mut columns = Vec::with_capacity(options.indexes.len());
    for key in options.indexes.iter() {
        let (column, desc) = match key.strip_prefix('-') {
            Some(column) => (column, true),
            None => (key.as_str(), false),
        };
        name.push('_');
        name.extend(column.chars().map(|c| if c.is_ascii_alphanumeric() { c } else { '_' }));
        columns.push(if desc {
            format!("{} DESC", quote(column))
        } else {
            quote(column)
        });
    }
    name.push_str("_idx");

    let mut w = Writer::default();
    w.push("CREATE INDEX ")
        .push(&quote(&name))
        .push(" ON ")
        .push(&table.to_sql())
        .push(" (")
        .push(&columns.join(","))
        .push(")");
    Some(w.finish())
}

/// Render the statement for `options.mode`.
///
/// `Ok(None)` means there is nothing to execute (an empty insert batch, an
/// empty SET list or no index columns).
pub(crate) fn render(
    table: &Ident,
    schema: &TableSchema,
    options: &QueryOptions,
) -> OrmResult<Option<Rendered>> {
    let table_sql = table.to_sql();
    let rendered = match options.mode {
        Mode::Select => Some(select(&table_sql, schema, options)),
        Mode::Count => Some(count(&table_sql, options)),
        Mode::Insert => insert(&table_sql, schema, options)?,
        Mode::Update => update(&table_sql, options),
        Mode::Create => Some(create(&table_sql, schema, options)),
        Mode::Index => index(table, options),
    };
    Ok(rendered)
}
