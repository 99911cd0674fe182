//! Migration Rollback - Reverting the most recently applied migration
//!
//! Rollback always targets the ledger entry with the greatest name and
//! reverts exactly one migration per call.

use async_trait::async_trait;
use std::time::Instant;
use tracing::{debug, error, info};

use super::definitions::{FileMigration, MigrationDirection, RollbackResult};
use super::runner::{finish_transaction, MigrationRunner};
use crate::backends::{DatabasePool, DatabaseTransaction};
use crate::error::{MigrationError, MigrationResult};

/// Extension trait for MigrationRunner to add rollback functionality
#[async_trait]
pub trait MigrationRollback {
    /// Revert the most recently applied migration
    ///
    /// Runs its down-body (if the file exists and has one) and removes its
    /// ledger row in a single transaction. An empty ledger is a no-op.
    async fn rollback(&self, db: &dyn DatabasePool) -> MigrationResult<RollbackResult>;
}

#[async_trait]
impl MigrationRollback for MigrationRunner {
    async fn rollback(&self, db: &dyn DatabasePool) -> MigrationResult<RollbackResult> {
        let start_time = Instant::now();
        info!("Rollback");

        self.ledger().ensure_table_exists(db).await?;

        let Some(entry) = self.ledger().most_recent_applied(db).await? else {
            info!("No migrations to roll back");
            return Ok(RollbackResult {
                rolled_back: None,
                executed_sql: false,
                execution_time_ms: start_time.elapsed().as_millis(),
            });
        };

        let migration = self
            .manager()
            .load(FileMigration::from_name(entry.name), MigrationDirection::Down)?;
        info!(migration = %migration.name, "Rolling back migration");

        let mut transaction = db.begin_transaction().await.map_err(|e| {
            MigrationError::transaction(format!("Failed to start rollback transaction for {}", migration.name), e)
        })?;

        let outcome = revert_in_transaction(self, transaction.as_mut(), &migration).await;
        let executed_sql = match finish_transaction(transaction, outcome, &migration.name).await {
            Ok(executed_sql) => executed_sql,
            Err(e) => {
                error!(migration = %migration.name, error = %e, "Rollback failed");
                return Err(e);
            }
        };

        let execution_time_ms = start_time.elapsed().as_millis();
        info!(migration = %migration.name, execution_time_ms, "Rolled back migration");

        Ok(RollbackResult {
            rolled_back: Some(migration.name),
            executed_sql,
            execution_time_ms,
        })
    }
}

/// Run the down-body and drop the ledger row; reports whether SQL ran
async fn revert_in_transaction(
    runner: &MigrationRunner,
    transaction: &mut dyn DatabaseTransaction,
    migration: &FileMigration,
) -> MigrationResult<bool> {
    let executed_sql = migration.has_sql();
    if executed_sql {
        transaction
            .execute_script(migration.content())
            .await
            .map_err(|source| MigrationError::SqlExecution {
                migration: migration.name.clone(),
                source,
            })?;
    } else {
        debug!(migration = %migration.name, "No down-body, removing ledger row only");
    }

    runner.ledger().remove_applied(transaction, &migration.name).await?;
    Ok(executed_sql)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::SqliteDatabase;
    use crate::migrations::definitions::MigrationConfig;
    use crate::migrations::source::MemoryFileSystem;
    use std::sync::Arc;

    const CREATE_T: &str = "-- migration:up\nCREATE TABLE t(x int);\n-- migration:down\nDROP TABLE t;\n";

    async fn setup(fs: &MemoryFileSystem) -> (SqliteDatabase, MigrationRunner) {
        let db = SqliteDatabase::connect("sqlite::memory:").await.unwrap();
        let runner =
            MigrationRunner::with_file_system(MigrationConfig::new("migrations"), Arc::new(fs.clone())).unwrap();
        (db, runner)
    }

    #[tokio::test]
    async fn test_empty_ledger_is_noop() {
        let fs = MemoryFileSystem::new();
        fs.add_dir("migrations");
        let (db, runner) = setup(&fs).await;

        let result = runner.rollback(&db).await.unwrap();
        assert!(result.is_noop());
        assert!(!result.executed_sql);
    }

    #[tokio::test]
    async fn test_rollback_runs_down_body() {
        let fs = MemoryFileSystem::new().with_file("migrations/20230101_a.sql", CREATE_T);
        let (db, runner) = setup(&fs).await;
        runner.migrate(&db).await.unwrap();

        let result = runner.rollback(&db).await.unwrap();
        assert_eq!(result.rolled_back.as_deref(), Some("20230101_a"));
        assert!(result.executed_sql);

        let tables = db
            .fetch_all("SELECT name FROM sqlite_master WHERE name = 't'", &[])
            .await
            .unwrap();
        assert!(tables.is_empty());
        assert!(runner.ledger().list_applied_names(&db).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_file_is_ledger_only_rollback() {
        let fs = MemoryFileSystem::new().with_file("migrations/20230101_a.sql", CREATE_T);
        let (db, runner) = setup(&fs).await;
        runner.migrate(&db).await.unwrap();
        fs.remove_file("migrations/20230101_a.sql");

        let result = runner.rollback(&db).await.unwrap();
        assert_eq!(result.rolled_back.as_deref(), Some("20230101_a"));
        assert!(!result.executed_sql);

        let tables = db
            .fetch_all("SELECT name FROM sqlite_master WHERE name = 't'", &[])
            .await
            .unwrap();
        assert_eq!(tables.len(), 1);
    }

    #[tokio::test]
    async fn test_failed_down_body_keeps_ledger_row() {
        let fs = MemoryFileSystem::new().with_file(
            "migrations/20230101_a.sql",
            "-- migration:up\nCREATE TABLE t(x int);\n-- migration:down\nDROP TABLE nope;\n",
        );
        let (db, runner) = setup(&fs).await;
        runner.migrate(&db).await.unwrap();

        let err = runner.rollback(&db).await.unwrap_err();
        assert_eq!(err.failed_migration(), Some("20230101_a"));
        assert_eq!(runner.ledger().list_applied_names(&db).await.unwrap(), vec!["20230101_a"]);
    }
}
