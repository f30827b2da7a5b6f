//! Error types for pgtable

use std::sync::Arc;
use thiserror::Error;
use tokio_postgres::error::{DbError, SqlState};

/// Result type alias for pgtable operations
pub type OrmResult<T> = Result<T, OrmError>;

/// Error types for database operations.
///
/// The type is `Clone` so a memoized statement outcome can be handed to every
/// observer of the same builder. Driver errors are shared behind an `Arc`.
#[derive(Debug, Clone, Error)]
pub enum OrmError {
    /// Database connection error
    #[error("Connection error: {0}")]
    Connection(String),

    /// Query execution error, forwarded unchanged from the driver
    #[error("Query error: {0}")]
    Query(#[source] Arc<tokio_postgres::Error>),

    /// Unique constraint violation (SQLSTATE 23505)
    #[error("Unique constraint violation: {0}")]
    UniqueViolation(#[source] Arc<tokio_postgres::Error>),

    /// Foreign key constraint violation (SQLSTATE 23503)
    #[error("Foreign key violation: {0}")]
    ForeignKeyViolation(#[source] Arc<tokio_postgres::Error>),

    /// Check constraint violation (SQLSTATE 23514)
    #[error("Check constraint violation: {0}")]
    CheckViolation(#[source] Arc<tokio_postgres::Error>),

    /// Row decode error
    #[error("Decode error on column '{column}': {message}")]
    Decode { column: String, message: String },

    /// Missing or malformed construction arguments
    #[error("Validation error: {0}")]
    Validation(String),

    /// Connection string / pool configuration error
    #[error("Config error: {0}")]
    Config(String),

    /// Checking a connection out of the pool failed
    #[error("Pool error: {0}")]
    Pool(#[source] Arc<deadpool_postgres::PoolError>),

    /// Other errors
    #[error("{0}")]
    Other(String),
}

impl OrmError {
    /// Create a decode error for a specific column
    pub fn decode(column: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            column: column.into(),
            message: message.into(),
        }
    }

    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Check if this is a validation error
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Check if this is a unique violation error
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, Self::UniqueViolation(_))
    }

    /// Check if this is a check constraint violation
    pub fn is_check_violation(&self) -> bool {
        matches!(self, Self::CheckViolation(_))
    }

    /// The driver error behind this one, if any.
    pub fn driver_error(&self) -> Option<&tokio_postgres::Error> {
        match self {
            Self::Query(err)
            | Self::UniqueViolation(err)
            | Self::ForeignKeyViolation(err)
            | Self::CheckViolation(err) => Some(err.as_ref()),
            Self::Pool(err) => match err.as_ref() {
                deadpool_postgres::PoolError::Backend(err) => Some(err),
                _ => None,
            },
            _ => None,
        }
    }

    /// The server-reported error (code, detail, constraint, table, column).
    pub fn db_error(&self) -> Option<&DbError> {
        self.driver_error().and_then(|err| err.as_db_error())
    }

    /// The server-reported SQLSTATE.
    pub fn code(&self) -> Option<&SqlState> {
        self.db_error().map(DbError::code)
    }

    /// Classify a driver error by SQLSTATE. The driver error is kept as is.
    pub fn from_db_error(err: tokio_postgres::Error) -> Self {
        let code = err.as_db_error().map(|db_err| db_err.code().clone());
        let err = Arc::new(err);
        match code {
            Some(code) if code == SqlState::UNIQUE_VIOLATION => Self::UniqueViolation(err),
            Some(code) if code == SqlState::FOREIGN_KEY_VIOLATION => Self::ForeignKeyViolation(err),
            Some(code) if code == SqlState::CHECK_VIOLATION => Self::CheckViolation(err),
            _ => Self::Query(err),
        }
    }
}

impl From<tokio_postgres::Error> for OrmError {
    fn from(err: tokio_postgres::Error) -> Self {
        Self::from_db_error(err)
    }
}

impl From<deadpool_postgres::PoolError> for OrmError {
    fn from(err: deadpool_postgres::PoolError) -> Self {
        Self::Pool(Arc::new(err))
    }
}
