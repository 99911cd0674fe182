//! Database testing utilities
//!
//! [`TestDatabase`] opens a private in-memory SQLite database per test and
//! offers assertions over its schema and ledger.

use async_trait::async_trait;
use strata_migrate::{
    DatabasePool, DatabaseResult, DatabaseRow, DatabaseTransaction, DatabaseValue, SqliteDatabase,
    DEFAULT_MIGRATIONS_TABLE,
};

use crate::{TestError, TestResult};

/// In-memory SQLite database for tests
#[derive(Debug, Clone)]
pub struct TestDatabase {
    db: SqliteDatabase,
}

impl TestDatabase {
    /// Open a fresh in-memory database
    pub async fn new() -> TestResult<Self> {
        Self::from_url("sqlite::memory:").await
    }

    /// Open a database at `url`
    pub async fn from_url(url: &str) -> TestResult<Self> {
        let db = SqliteDatabase::connect(url).await?;
        Ok(Self { db })
    }

    /// Get the underlying SQLite database
    pub fn database(&self) -> &SqliteDatabase {
        &self.db
    }

    /// Execute raw SQL (for test setup)
    pub async fn execute(&self, sql: &str) -> TestResult<()> {
        self.db.execute(sql, &[]).await?;
        Ok(())
    }

    /// Check if a table exists
    pub async fn table_exists(&self, table: &str) -> TestResult<bool> {
        let rows = self
            .db
            .fetch_all(
                "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?1",
                &[DatabaseValue::from(table)],
            )
            .await?;
        Ok(!rows.is_empty())
    }

    /// Column names of `table`, in declaration order
    pub async fn column_names(&self, table: &str) -> TestResult<Vec<String>> {
        let rows = self
            .db
            .fetch_all("SELECT name FROM pragma_table_info(?1) ORDER BY cid", &[DatabaseValue::from(table)])
            .await?;

        rows.iter()
            .map(|row| row.get_text("name").map(str::to_string).map_err(TestError::from))
            .collect()
    }

    /// Count rows in a table
    pub async fn count_rows(&self, table: &str) -> TestResult<i64> {
        let rows = self
            .db
            .fetch_all(&format!("SELECT COUNT(*) AS count FROM \"{}\"", table), &[])
            .await?;

        match rows.first().and_then(|row| row.get("count")) {
            Some(DatabaseValue::Integer(count)) => Ok(*count),
            other => Err(TestError::assertion(format!("unexpected COUNT(*) result: {:?}", other))),
        }
    }

    /// Names recorded in the default ledger table, ascending
    pub async fn ledger_names(&self) -> TestResult<Vec<String>> {
        self.ledger_names_in(DEFAULT_MIGRATIONS_TABLE).await
    }

    /// Names recorded in ledger table `table`, ascending
    pub async fn ledger_names_in(&self, table: &str) -> TestResult<Vec<String>> {
        let rows = self
            .db
            .fetch_all(&format!("SELECT name FROM \"{}\" ORDER BY name", table), &[])
            .await?;

        rows.iter()
            .map(|row| row.get_text("name").map(str::to_string).map_err(TestError::from))
            .collect()
    }

    /// Assert that a table exists
    pub async fn assert_table_exists(&self, table: &str) -> TestResult<()> {
        if !self.table_exists(table).await? {
            return Err(TestError::assertion(format!("expected table '{}' to exist", table)));
        }
        Ok(())
    }

    /// Assert that a table does not exist
    pub async fn assert_table_missing(&self, table: &str) -> TestResult<()> {
        if self.table_exists(table).await? {
            return Err(TestError::assertion(format!("expected table '{}' not to exist", table)));
        }
        Ok(())
    }

    /// Assert the exact column list of a table
    pub async fn assert_columns(&self, table: &str, expected: &[&str]) -> TestResult<()> {
        let actual = self.column_names(table).await?;
        if actual != expected {
            return Err(TestError::assertion(format!(
                "expected columns {:?} in '{}', found {:?}",
                expected, table, actual
            )));
        }
        Ok(())
    }

    /// Assert the exact contents of the default ledger
    pub async fn assert_ledger(&self, expected: &[&str]) -> TestResult<()> {
        let actual = self.ledger_names().await?;
        if actual != expected {
            return Err(TestError::assertion(format!(
                "expected ledger {:?}, found {:?}",
                expected, actual
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl DatabasePool for TestDatabase {
    async fn execute(&self, sql: &str, params: &[DatabaseValue]) -> DatabaseResult<u64> {
        self.db.execute(sql, params).await
    }

    async fn fetch_all(&self, sql: &str, params: &[DatabaseValue]) -> DatabaseResult<Vec<DatabaseRow>> {
        self.db.fetch_all(sql, params).await
    }

    async fn begin_transaction(&self) -> DatabaseResult<Box<dyn DatabaseTransaction>> {
        self.db.begin_transaction().await
    }

    async fn close(&self) {
        self.db.close().await;
    }
}
