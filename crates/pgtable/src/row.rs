//! Ordered row mappings and decoding of driver rows.

use crate::error::{OrmError, OrmResult};
use crate::value::Value;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use serde::ser::{Serialize, SerializeMap, Serializer};
use tokio_postgres::Row;
use tokio_postgres::types::{FromSql, Type};

/// An insertion-ordered mapping from column name to [`Value`].
///
/// Used for conditions, pending updates, rows to insert and decoded result rows.
/// Inserting an existing key overwrites the value in place, so the column keeps
/// its original position (and therefore its placeholder number).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    entries: Vec<(String, Value)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite a column value.
    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<Value>) {
        let column = column.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == column) {
            Some(slot) => slot.1 = value,
            None => self.entries.push((column, value)),
        }
    }

    /// Consuming variant of [`Record::insert`].
    pub fn with(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(column, value);
        self
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.entries.iter().find(|(k, _)| k == column).map(|(_, v)| v)
    }

    pub fn get_mut(&mut self, column: &str) -> Option<&mut Value> {
        self.entries
            .iter_mut()
            .find(|(k, _)| k == column)
            .map(|(_, v)| v)
    }

    pub fn contains_key(&self, column: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == column)
    }

    pub fn remove(&mut self, column: &str) -> Option<Value> {
        let pos = self.entries.iter().position(|(k, _)| k == column)?;
        Some(self.entries.remove(pos).1)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Merge another record key-wise; overlapping keys take the other value.
    pub fn merge(&mut self, other: Record) {
        for (k, v) in other.entries {
            self.insert(k, v);
        }
    }

    /// True when both records carry exactly the same set of columns.
    pub fn same_columns(&self, other: &Record) -> bool {
        self.len() == other.len() && self.keys().all(|k| other.contains_key(k))
    }

    /// Detach a driver row into a plain record.
    pub fn from_row(row: &Row) -> OrmResult<Self> {
        let mut record = Record::new();
        for (idx, column) in row.columns().iter().enumerate() {
            let value = decode_column(row, idx, column.name(), column.type_())?;
            record.entries.push((column.name().to_string(), value));
        }
        Ok(record)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut record = Record::new();
        for (k, v) in iter {
            record.insert(k, v);
        }
        record
    }
}

impl IntoIterator for Record {
    type Item = (String, Value);
    type IntoIter = std::vec::IntoIter<(String, Value)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (k, v) in &self.entries {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

/// Build a [`Record`] from `column => value` pairs.
///
/// ```ignore
/// let row = pgtable::record! { "account" => "a", "age" => 30 };
/// ```
#[macro_export]
macro_rules! record {
    () => { $crate::Record::new() };
    ($($column:expr => $value:expr),+ $(,)?) => {{
        let mut __pgtable_record = $crate::Record::new();
        $( __pgtable_record.insert($column, $value); )+
        __pgtable_record
    }};
}

fn get<'a, T: FromSql<'a>>(row: &'a Row, idx: usize, name: &str) -> OrmResult<Option<T>> {
    row.try_get::<_, Option<T>>(idx)
        .map_err(|e| OrmError::decode(name, e.to_string()))
}

fn decode_column(row: &Row, idx: usize, name: &str, ty: &Type) -> OrmResult<Value> {
    let value = match *ty {
        Type::BOOL => get::<bool>(row, idx, name)?.map(Value::Bool),
        Type::INT2 => get::<i16>(row, idx, name)?.map(Value::from),
        Type::INT4 => get::<i32>(row, idx, name)?.map(Value::from),
        Type::INT8 => get::<i64>(row, idx, name)?.map(Value::Int),
        Type::OID => get::<u32>(row, idx, name)?.map(Value::from),
        Type::FLOAT4 => get::<f32>(row, idx, name)?.map(Value::from),
        Type::FLOAT8 => get::<f64>(row, idx, name)?.map(Value::Float),
        // Text keeps scale and precision; `Value::to_integer` still reads it.
        Type::NUMERIC => get::<Decimal>(row, idx, name)?.map(|d| Value::Text(d.to_string())),
        Type::JSON | Type::JSONB => get::<serde_json::Value>(row, idx, name)?.map(Value::Json),
        Type::TIMESTAMPTZ => get::<DateTime<Utc>>(row, idx, name)?.map(Value::Timestamp),
        Type::TIMESTAMP => get::<NaiveDateTime>(row, idx, name)?.map(|t| Value::Timestamp(t.and_utc())),
        Type::DATE => get::<NaiveDate>(row, idx, name)?.map(|d| Value::Text(d.to_string())),
        Type::UUID => get::<uuid::Uuid>(row, idx, name)?.map(Value::from),
        _ if <String as FromSql<'_>>::accepts(ty) => get::<String>(row, idx, name)?.map(Value::Text),
        _ => {
            return Err(OrmError::decode(
                name,
                format!("unsupported column type {ty}; cast it to text in the field list"),
            ));
        }
    };
    Ok(value.unwrap_or(Value::Null))
}
