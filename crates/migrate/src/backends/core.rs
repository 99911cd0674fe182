//! Core Database Backend Traits
//!
//! The migration engine talks to a database only through [`DatabasePool`]
//! and [`DatabaseTransaction`]. Production code uses the SQLite backend;
//! tests can substitute any implementation that records or scripts calls.

use async_trait::async_trait;
use thiserror::Error;

/// Result type alias for backend operations
pub type DatabaseResult<T> = Result<T, DatabaseError>;

/// Errors raised by a database backend
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Error reported by the sqlx driver
    #[error("{0}")]
    Driver(#[from] sqlx::Error),

    /// A column value could not be converted to a [`DatabaseValue`]
    #[error("Failed to decode column '{column}': {message}")]
    Decode { column: String, message: String },

    /// Backend-specific failure without a driver error attached
    #[error("{0}")]
    Other(String),
}

impl DatabaseError {
    /// Check if the error is a primary key or unique constraint violation
    pub fn is_unique_violation(&self) -> bool {
        match self {
            DatabaseError::Driver(sqlx::Error::Database(err)) => err.is_unique_violation(),
            _ => false,
        }
    }
}

/// Value used for parameter binding and row decoding
#[derive(Debug, Clone, PartialEq)]
pub enum DatabaseValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
}

impl DatabaseValue {
    /// Check if the value is null
    pub fn is_null(&self) -> bool {
        matches!(self, DatabaseValue::Null)
    }

    /// Borrow the value as text, if it is text
    pub fn as_text(&self) -> Option<&str> {
        match self {
            DatabaseValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for DatabaseValue {
    fn from(value: &str) -> Self {
        DatabaseValue::Text(value.to_string())
    }
}

impl From<String> for DatabaseValue {
    fn from(value: String) -> Self {
        DatabaseValue::Text(value)
    }
}

impl From<i64> for DatabaseValue {
    fn from(value: i64) -> Self {
        DatabaseValue::Integer(value)
    }
}

/// A decoded result row, columns kept in select order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DatabaseRow {
    columns: Vec<(String, DatabaseValue)>,
}

impl DatabaseRow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a column value
    pub fn push(&mut self, column: impl Into<String>, value: DatabaseValue) {
        self.columns.push((column.into(), value));
    }

    /// Builder-style variant of [`DatabaseRow::push`]
    pub fn with(mut self, column: impl Into<String>, value: impl Into<DatabaseValue>) -> Self {
        self.push(column, value.into());
        self
    }

    /// Get a column value by name
    pub fn get(&self, column: &str) -> Option<&DatabaseValue> {
        self.columns
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    /// Get a non-null text column by name
    pub fn get_text(&self, column: &str) -> DatabaseResult<&str> {
        match self.get(column) {
            Some(DatabaseValue::Text(s)) => Ok(s),
            Some(other) => Err(DatabaseError::Decode {
                column: column.to_string(),
                message: format!("expected text, found {:?}", other),
            }),
            None => Err(DatabaseError::Decode {
                column: column.to_string(),
                message: "column not present in row".to_string(),
            }),
        }
    }

    /// Get column count
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }
}

/// Abstract database connection pool trait
#[async_trait]
pub trait DatabasePool: Send + Sync {
    /// Execute a single statement and return the affected row count
    async fn execute(&self, sql: &str, params: &[DatabaseValue]) -> DatabaseResult<u64>;

    /// Execute a query and return all result rows
    async fn fetch_all(&self, sql: &str, params: &[DatabaseValue]) -> DatabaseResult<Vec<DatabaseRow>>;

    /// Begin a transaction
    async fn begin_transaction(&self) -> DatabaseResult<Box<dyn DatabaseTransaction>>;

    /// Close the pool
    async fn close(&self) {}
}

/// Abstract database transaction trait
///
/// A transaction that is dropped without [`commit`](DatabaseTransaction::commit)
/// must not persist any of its changes.
#[async_trait]
pub trait DatabaseTransaction: Send {
    /// Execute a single statement within the transaction
    async fn execute(&mut self, sql: &str, params: &[DatabaseValue]) -> DatabaseResult<u64>;

    /// Execute a script of zero or more statements within the transaction
    async fn execute_script(&mut self, script: &str) -> DatabaseResult<()>;

    /// Commit the transaction
    async fn commit(self: Box<Self>) -> DatabaseResult<()>;

    /// Rollback the transaction
    async fn rollback(self: Box<Self>) -> DatabaseResult<()>;
}
