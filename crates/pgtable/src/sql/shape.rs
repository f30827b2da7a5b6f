//! How a statement's raw [`QueryOutput`] is presented to the caller.
//!
//! Each table verb fixes a shape at construction; [`Statement::raw`] switches
//! any statement back to [`Raw`].
//!
//! [`Statement::raw`]: super::Statement::raw

use crate::error::{OrmError, OrmResult};
use crate::executor::QueryOutput;
use crate::row::Record;

/// Converts the memoized output of a statement into the caller-facing value.
pub trait Shape {
    type Output: Send;

    fn shape(output: &QueryOutput) -> Self::Output;

    /// Called with the memoized error instead of [`Shape::shape`] when the
    /// statement failed. Most shapes pass it through.
    fn recover(err: OrmError) -> OrmResult<Self::Output> {
        Err(err)
    }
}

/// The unshaped output: rows, row count and command.
#[derive(Debug)]
pub enum Raw {}

/// Every returned row.
#[derive(Debug)]
pub enum Rows {}

/// The first returned row, if any.
#[derive(Debug)]
pub enum FirstRow {}

/// One record per affected row. Rows not returned by the database (no
/// RETURNING list) are represented by empty records.
#[derive(Debug)]
pub enum InsertedRows {}

/// The affected-row count.
#[derive(Debug)]
pub enum Affected {}

/// The first column of the first row as an integer.
#[derive(Debug)]
pub enum Counted {}

impl Shape for Raw {
    type Output = QueryOutput;

    fn shape(output: &QueryOutput) -> QueryOutput {
        output.clone()
    }
}

impl Shape for Rows {
    type Output = Vec<Record>;

    fn shape(output: &QueryOutput) -> Vec<Record> {
        output.rows.clone()
    }
}

impl Shape for FirstRow {
    type Output = Option<Record>;

    fn shape(output: &QueryOutput) -> Option<Record> {
        output.rows.first().cloned()
    }
}

impl Shape for InsertedRows {
    type Output = Vec<Record>;

    fn shape(output: &QueryOutput) -> Vec<Record> {
        let mut rows = output.rows.clone();
        let affected = usize::try_from(output.row_count).unwrap_or(usize::MAX);
        if rows.len() < affected {
            rows.resize_with(affected, Record::new);
        }
        rows
    }
}

impl Shape for Affected {
    type Output = u64;

    fn shape(output: &QueryOutput) -> u64 {
        output.row_count
    }
}

impl Shape for Counted {
    type Output = i64;

    fn shape(output: &QueryOutput) -> i64 {
        let first = output
            .rows
            .first()
            .and_then(|row| row.iter().next().map(|(_, value)| value));
        match first.and_then(|value| value.to_integer()) {
            Some(count) => count,
            None => {
                #[cfg(feature = "tracing")]
                tracing::warn!(
                    target: "pgtable.sql",
                    value = ?first,
                    "count result is not an integer, using 0"
                );
                0
            }
        }
    }

    /// An aggregate whose column cannot be decoded still counts as 0.
    fn recover(err: OrmError) -> OrmResult<i64> {
        match err {
            OrmError::Decode {
                column: _column,
                message: _message,
            } => {
                #[cfg(feature = "tracing")]
                tracing::warn!(
                    target: "pgtable.sql",
                    column = %_column,
                    error = %_message,
                    "count result could not be decoded, using 0"
                );
                Ok(0)
            }
            err => Err(err),
        }
    }
}
