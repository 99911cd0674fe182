//! Ledger Accessor - the table recording which migrations are applied
//!
//! The ledger is the only record of what has been applied. Rows are written
//! and removed inside the same transaction as the migration SQL they track.

use chrono::{DateTime, NaiveDateTime, Utc};
use tracing::debug;

use super::definitions::LedgerEntry;
use crate::backends::{DatabaseError, DatabasePool, DatabaseRow, DatabaseTransaction, DatabaseValue};
use crate::error::{MigrationError, MigrationResult};

/// Text format of `applied_at`
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Access to the ledger table
#[derive(Debug, Clone)]
pub struct Ledger {
    table: String,
}

impl Ledger {
    pub fn new(table: impl Into<String>) -> Self {
        Self { table: table.into() }
    }

    /// Ledger table name
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Create the ledger table unless it already exists
    pub async fn ensure_table_exists(&self, db: &dyn DatabasePool) -> MigrationResult<()> {
        db.execute(&self.create_table_sql(true), &[])
            .await
            .map_err(|e| MigrationError::ledger(format!("Failed to create ledger table {}", self.table), e))?;
        Ok(())
    }

    /// Create the ledger table, failing if it already exists
    pub async fn create_table(&self, db: &dyn DatabasePool) -> MigrationResult<()> {
        db.execute(&self.create_table_sql(false), &[])
            .await
            .map_err(|e| MigrationError::ledger(format!("Failed to create ledger table {}", self.table), e))?;
        debug!(table = %self.table, "Created ledger table");
        Ok(())
    }

    /// Names of all applied migrations, ascending
    pub async fn list_applied_names(&self, db: &dyn DatabasePool) -> MigrationResult<Vec<String>> {
        let sql = format!("SELECT name FROM {} ORDER BY name ASC", self.quoted_table());
        let rows = db
            .fetch_all(&sql, &[])
            .await
            .map_err(|e| MigrationError::ledger("Failed to query applied migrations", e))?;

        rows.iter()
            .map(|row| {
                row.get_text("name")
                    .map(str::to_string)
                    .map_err(|e| MigrationError::ledger("Failed to read migration name", e))
            })
            .collect()
    }

    /// All ledger rows, ascending by name
    pub async fn list_applied(&self, db: &dyn DatabasePool) -> MigrationResult<Vec<LedgerEntry>> {
        let sql = format!("SELECT name, applied_at FROM {} ORDER BY name ASC", self.quoted_table());
        let rows = db
            .fetch_all(&sql, &[])
            .await
            .map_err(|e| MigrationError::ledger("Failed to query applied migrations", e))?;

        rows.iter().map(entry_from_row).collect()
    }

    /// The applied migration with the greatest name
    pub async fn most_recent_applied(&self, db: &dyn DatabasePool) -> MigrationResult<Option<LedgerEntry>> {
        let sql = format!(
            "SELECT name, applied_at FROM {} ORDER BY name DESC LIMIT 1",
            self.quoted_table()
        );
        let rows = db
            .fetch_all(&sql, &[])
            .await
            .map_err(|e| MigrationError::ledger("Failed to query most recent migration", e))?;

        rows.first().map(entry_from_row).transpose()
    }

    /// Insert a ledger row inside `tx`
    ///
    /// A name that is already recorded is a ledger error.
    pub async fn record_applied(
        &self,
        tx: &mut dyn DatabaseTransaction,
        name: &str,
        applied_at: DateTime<Utc>,
    ) -> MigrationResult<()> {
        let sql = format!("INSERT INTO {} (name, applied_at) VALUES (?1, ?2)", self.quoted_table());
        let params = [
            DatabaseValue::from(name),
            DatabaseValue::from(format_timestamp(&applied_at)),
        ];

        match tx.execute(&sql, &params).await {
            Ok(_) => Ok(()),
            Err(e) if e.is_unique_violation() => Err(MigrationError::ledger(
                format!("Migration {} is already recorded as applied", name),
                e,
            )),
            Err(e) => Err(MigrationError::ledger(format!("Failed to record migration {}", name), e)),
        }
    }

    /// Delete a ledger row inside `tx`; a missing row is not an error
    pub async fn remove_applied(&self, tx: &mut dyn DatabaseTransaction, name: &str) -> MigrationResult<()> {
        let sql = format!("DELETE FROM {} WHERE name = ?1", self.quoted_table());
        let removed = tx
            .execute(&sql, &[DatabaseValue::from(name)])
            .await
            .map_err(|e| MigrationError::ledger(format!("Failed to remove migration {}", name), e))?;

        debug!(migration = %name, removed, "Removed ledger row");
        Ok(())
    }

    fn create_table_sql(&self, if_not_exists: bool) -> String {
        format!(
            "CREATE TABLE {}{} (\n    \
                name TEXT NOT NULL PRIMARY KEY,\n    \
                applied_at TEXT NOT NULL\n\
            ) WITHOUT ROWID",
            if if_not_exists { "IF NOT EXISTS " } else { "" },
            self.quoted_table()
        )
    }

    fn quoted_table(&self) -> String {
        quote_identifier(&self.table)
    }
}

fn quote_identifier(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}

fn entry_from_row(row: &DatabaseRow) -> MigrationResult<LedgerEntry> {
    let read = |row: &DatabaseRow| -> Result<LedgerEntry, DatabaseError> {
        let name = row.get_text("name")?.to_string();
        let applied_at = parse_timestamp(row.get_text("applied_at")?)?;
        Ok(LedgerEntry { name, applied_at })
    };

    read(row).map_err(|e| MigrationError::ledger("Failed to read ledger row", e))
}

pub(crate) fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.format(TIMESTAMP_FORMAT).to_string()
}

pub(crate) fn parse_timestamp(text: &str) -> Result<DateTime<Utc>, DatabaseError> {
    NaiveDateTime::parse_from_str(text, TIMESTAMP_FORMAT)
        .map(|naive| naive.and_utc())
        .or_else(|_| DateTime::parse_from_rfc3339(text).map(|dt| dt.with_timezone(&Utc)))
        .map_err(|e| DatabaseError::Decode {
            column: "applied_at".to_string(),
            message: format!("invalid timestamp '{}': {}", text, e),
        })
}
