//! SQLite Backend Implementation
//!
//! Implements the backend traits on top of a sqlx SQLite pool.

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::query::Query;
use sqlx::sqlite::{SqliteArguments, SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Column, Row, Sqlite, SqlitePool, Transaction, TypeInfo, ValueRef};
use tracing::debug;

use super::core::*;
use crate::error::{MigrationError, MigrationResult};

/// SQLite database implementing [`DatabasePool`]
#[derive(Debug, Clone)]
pub struct SqliteDatabase {
    pool: SqlitePool,
}

impl SqliteDatabase {
    /// Open (creating if missing) the database at `url`
    ///
    /// The pool holds exactly one long-lived connection so that
    /// `sqlite::memory:` databases keep their contents between calls.
    pub async fn connect(url: &str) -> MigrationResult<Self> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| MigrationError::Connection(format!("Invalid SQLite URL '{}': {}", url, e)))?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(Option::<Duration>::None)
            .max_lifetime(Option::<Duration>::None)
            .connect_with(options)
            .await
            .map_err(|e| MigrationError::Connection(format!("Failed to open SQLite database '{}': {}", url, e)))?;

        debug!(url, "Opened SQLite database");
        Ok(Self::from_pool(pool))
    }

    /// Wrap an existing sqlx pool
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Get the underlying sqlx pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl DatabasePool for SqliteDatabase {
    async fn execute(&self, sql: &str, params: &[DatabaseValue]) -> DatabaseResult<u64> {
        let result = build_query(sql, params).execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    async fn fetch_all(&self, sql: &str, params: &[DatabaseValue]) -> DatabaseResult<Vec<DatabaseRow>> {
        let rows = build_query(sql, params).fetch_all(&self.pool).await?;
        rows.iter().map(decode_row).collect()
    }

    async fn begin_transaction(&self) -> DatabaseResult<Box<dyn DatabaseTransaction>> {
        let inner = self.pool.begin().await?;
        Ok(Box::new(SqliteTransaction { inner }))
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

/// Transaction handed out by [`SqliteDatabase`]
///
/// sqlx rolls the transaction back when it is dropped uncommitted.
pub struct SqliteTransaction {
    inner: Transaction<'static, Sqlite>,
}

#[async_trait]
impl DatabaseTransaction for SqliteTransaction {
    async fn execute(&mut self, sql: &str, params: &[DatabaseValue]) -> DatabaseResult<u64> {
        let result = build_query(sql, params).execute(&mut *self.inner).await?;
        Ok(result.rows_affected())
    }

    async fn execute_script(&mut self, script: &str) -> DatabaseResult<()> {
        let conn: &mut sqlx::SqliteConnection = &mut self.inner;
        sqlx::Executor::execute(conn, sqlx::raw_sql(script)).await?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> DatabaseResult<()> {
        self.inner.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> DatabaseResult<()> {
        self.inner.rollback().await?;
        Ok(())
    }
}

fn build_query<'q>(sql: &'q str, params: &[DatabaseValue]) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    params.iter().fold(sqlx::query(sql), bind_value)
}

fn bind_value<'q>(
    query: Query<'q, Sqlite, SqliteArguments<'q>>,
    value: &DatabaseValue,
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    match value {
        DatabaseValue::Null => query.bind(Option::<String>::None),
        DatabaseValue::Integer(v) => query.bind(*v),
        DatabaseValue::Real(v) => query.bind(*v),
        DatabaseValue::Text(v) => query.bind(v.clone()),
    }
}

fn decode_row(row: &SqliteRow) -> DatabaseResult<DatabaseRow> {
    let mut decoded = DatabaseRow::new();

    for column in row.columns() {
        let index = column.ordinal();
        let raw = row.try_get_raw(index)?;

        let value = if raw.is_null() {
            DatabaseValue::Null
        } else {
            match raw.type_info().name() {
                "INTEGER" => DatabaseValue::Integer(row.try_get(index)?),
                "REAL" => DatabaseValue::Real(row.try_get(index)?),
                "TEXT" => DatabaseValue::Text(row.try_get(index)?),
                other => {
                    return Err(DatabaseError::Decode {
                        column: column.name().to_string(),
                        message: format!("unsupported SQLite storage class {}", other),
                    })
                }
            }
        };

        decoded.push(column.name(), value);
    }

    Ok(decoded)
}
