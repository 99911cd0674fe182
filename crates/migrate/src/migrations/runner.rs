//! Migration Runner - Executes migrations against the database
//!
//! Reconciles the migration files with the ledger and applies whatever is
//! pending, strictly in name order and one transaction per migration.

use chrono::Utc;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

use super::definitions::{FileMigration, MigrationConfig, MigrationDirection, MigrationRunResult, MigrationState};
use super::diff::pending_names;
use super::ledger::Ledger;
use super::manager::MigrationManager;
use super::source::{MigrationFileSystem, OsFileSystem};
use crate::backends::{DatabasePool, DatabaseTransaction};
use crate::error::{MigrationError, MigrationResult};

/// Migration runner that executes migrations against a database
#[derive(Debug, Clone)]
pub struct MigrationRunner {
    manager: MigrationManager,
    ledger: Ledger,
}

impl MigrationRunner {
    /// Create a runner reading migrations from the OS filesystem
    pub fn new(config: MigrationConfig) -> MigrationResult<Self> {
        Self::with_file_system(config, Arc::new(OsFileSystem))
    }

    /// Create a runner reading migrations through `fs`
    pub fn with_file_system(config: MigrationConfig, fs: Arc<dyn MigrationFileSystem>) -> MigrationResult<Self> {
        config.validate()?;
        let ledger = Ledger::new(config.migrations_table.clone());

        Ok(Self {
            manager: MigrationManager::with_file_system(config, fs),
            ledger,
        })
    }

    /// Get the migration manager
    pub fn manager(&self) -> &MigrationManager {
        &self.manager
    }

    /// Get the ledger accessor
    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// Apply all pending migrations in ascending name order
    ///
    /// Stops at the first failure. Migrations applied before it stay
    /// committed; the failing one leaves neither schema changes nor a
    /// ledger row behind.
    pub async fn migrate(&self, db: &dyn DatabasePool) -> MigrationResult<MigrationRunResult> {
        let start_time = Instant::now();
        info!(dir = %self.manager.config().migrations_dir().display(), "Migrate");

        self.ledger.ensure_table_exists(db).await?;

        let files = self.manager.discover()?;
        let applied = self.ledger.list_applied_names(db).await?;

        let file_names: Vec<String> = files.iter().map(|m| m.name.clone()).collect();
        let pending = pending_names(&file_names, &applied);

        if pending.is_empty() {
            info!("No pending migrations");
            return Ok(MigrationRunResult {
                applied_migrations: Vec::new(),
                skipped_count: applied.len(),
                execution_time_ms: start_time.elapsed().as_millis(),
            });
        }

        info!(count = pending.len(), migrations = ?pending, "Pending migrations");

        // Every body is loaded before anything runs, so an unreadable file
        // aborts the run with the database untouched.
        let mut to_apply = Vec::with_capacity(pending.len());
        for migration in files.into_iter().filter(|m| pending.contains(&m.name)) {
            to_apply.push(self.manager.load(migration, MigrationDirection::Up)?);
        }

        let mut applied_migrations = Vec::with_capacity(to_apply.len());
        for migration in &to_apply {
            info!(migration = %migration.name, "Running migration");

            if let Err(e) = self.apply_migration(db, migration).await {
                error!(migration = %migration.name, error = %e, "Migration failed");
                return Err(e);
            }

            applied_migrations.push(migration.name.clone());
        }

        let execution_time_ms = start_time.elapsed().as_millis();
        info!(count = applied_migrations.len(), execution_time_ms, "Migrations applied");

        Ok(MigrationRunResult {
            applied_migrations,
            skipped_count: applied.len(),
            execution_time_ms,
        })
    }

    /// Applied and pending state of every known migration, sorted by name
    pub async fn status(&self, db: &dyn DatabasePool) -> MigrationResult<Vec<MigrationState>> {
        self.ledger.ensure_table_exists(db).await?;

        let files = self.manager.discover()?;
        let applied = self.ledger.list_applied(db).await?;

        let mut states: BTreeMap<String, MigrationState> = BTreeMap::new();
        for migration in files {
            states.insert(
                migration.name.clone(),
                MigrationState {
                    name: migration.name,
                    applied_at: None,
                    file_present: true,
                },
            );
        }
        for entry in applied {
            states
                .entry(entry.name.clone())
                .or_insert_with(|| MigrationState {
                    name: entry.name,
                    applied_at: None,
                    file_present: false,
                })
                .applied_at = Some(entry.applied_at);
        }

        Ok(states.into_values().collect())
    }

    /// Create the migrations directory, a sample migration and the ledger table
    ///
    /// Fails if the directory or the table already exists.
    pub async fn init(&self, db: &dyn DatabasePool) -> MigrationResult<PathBuf> {
        let sample = self.manager.init_directory()?;
        self.ledger.create_table(db).await?;

        info!(
            dir = %self.manager.config().migrations_dir().display(),
            table = %self.ledger.table(),
            "Initialized migrations"
        );
        Ok(sample)
    }

    /// Apply a single migration whose up-body is already loaded
    async fn apply_migration(&self, db: &dyn DatabasePool, migration: &FileMigration) -> MigrationResult<()> {
        let mut transaction = db.begin_transaction().await.map_err(|e| {
            MigrationError::transaction(format!("Failed to start transaction for migration {}", migration.name), e)
        })?;

        let outcome = self.apply_in_transaction(transaction.as_mut(), migration).await;
        finish_transaction(transaction, outcome, &migration.name).await
    }

    async fn apply_in_transaction(
        &self,
        transaction: &mut dyn DatabaseTransaction,
        migration: &FileMigration,
    ) -> MigrationResult<()> {
        if migration.has_sql() {
            transaction
                .execute_script(migration.content())
                .await
                .map_err(|source| MigrationError::SqlExecution {
                    migration: migration.name.clone(),
                    source,
                })?;
        } else {
            debug!(migration = %migration.name, "Empty up-body, recording only");
        }

        self.ledger
            .record_applied(transaction, &migration.name, Utc::now())
            .await
    }
}

/// Commit on success, roll back on failure
///
/// A failed rollback is logged and the original error is returned.
pub(crate) async fn finish_transaction<T>(
    transaction: Box<dyn DatabaseTransaction>,
    outcome: MigrationResult<T>,
    migration: &str,
) -> MigrationResult<T> {
    match outcome {
        Ok(value) => {
            transaction
                .commit()
                .await
                .map_err(|e| MigrationError::transaction(format!("Failed to commit migration {}", migration), e))?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = transaction.rollback().await {
                warn!(migration, error = %rollback_err, "Failed to roll back transaction");
            }
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::SqliteDatabase;
    use crate::migrations::source::MemoryFileSystem;

    const DIR: &str = "migrations";

    fn runner(fs: &MemoryFileSystem) -> MigrationRunner {
        MigrationRunner::with_file_system(MigrationConfig::new(DIR), Arc::new(fs.clone())).unwrap()
    }

    async fn memory_db() -> SqliteDatabase {
        SqliteDatabase::connect("sqlite::memory:").await.unwrap()
    }

    #[test]
    fn test_invalid_table_is_rejected_at_construction() {
        let config = MigrationConfig::new(DIR).with_table("bad name");
        let err = MigrationRunner::new(config).unwrap_err();
        assert!(matches!(err, MigrationError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_migrate_applies_in_order() {
        let fs = MemoryFileSystem::new()
            .with_file("migrations/20230102_b.sql", "-- migration:up\nALTER TABLE t ADD COLUMN y int;\n")
            .with_file("migrations/20230101_a.sql", "-- migration:up\nCREATE TABLE t(x int);\n");
        let db = memory_db().await;

        let result = runner(&fs).migrate(&db).await.unwrap();
        assert_eq!(result.applied_migrations, vec!["20230101_a", "20230102_b"]);
        assert_eq!(result.skipped_count, 0);
    }

    #[tokio::test]
    async fn test_second_migrate_is_up_to_date() {
        let fs = MemoryFileSystem::new().with_file("migrations/20230101_a.sql", "-- migration:up\nCREATE TABLE t(x int);");
        let db = memory_db().await;
        let runner = runner(&fs);

        runner.migrate(&db).await.unwrap();
        let result = runner.migrate(&db).await.unwrap();
        assert!(result.is_up_to_date());
        assert_eq!(result.skipped_count, 1);
    }

    #[tokio::test]
    async fn test_status_merges_files_and_ledger() {
        let fs = MemoryFileSystem::new()
            .with_file("migrations/20230101_a.sql", "-- migration:up\n")
            .with_file("migrations/20230102_b.sql", "-- migration:up\n");
        let db = memory_db().await;
        let runner = runner(&fs);

        runner.migrate(&db).await.unwrap();
        fs.remove_file("migrations/20230101_a.sql");
        fs.add_file("migrations/20230103_c.sql", "-- migration:up\n");

        let states = runner.status(&db).await.unwrap();
        let summary: Vec<(&str, bool, bool)> = states
            .iter()
            .map(|s| (s.name.as_str(), s.is_applied(), s.file_present))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("20230101_a", true, false),
                ("20230102_b", true, true),
                ("20230103_c", false, true),
            ]
        );
    }
}
