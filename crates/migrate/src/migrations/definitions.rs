//! Migration Definitions - Core types and structures for migrations
//!
//! Defines the fundamental types used throughout the migration system including
//! FileMigration, LedgerEntry, MigrationConfig and the run results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{MigrationError, MigrationResult};

/// Marker line that starts the up-body of a migration file
pub const UP_MARKER: &str = "-- migration:up";

/// Marker line that starts the down-body of a migration file
pub const DOWN_MARKER: &str = "-- migration:down";

/// Extension appended to a migration name to find its file
pub const MIGRATION_EXTENSION: &str = "sql";

/// Directory used when none is configured
pub const DEFAULT_MIGRATIONS_DIR: &str = "migrations";

/// Ledger table used when none is configured
pub const DEFAULT_MIGRATIONS_TABLE: &str = "migrations";

/// A migration file on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMigration {
    /// File name up to its first `.`; the ordering key
    pub name: String,
    /// Full file name inside the migrations directory
    pub file_name: String,
    /// Up- or down-body, loaded only for migrations about to run
    pub content: Option<String>,
}

impl FileMigration {
    /// Build from a directory entry name
    pub fn from_file_name(file_name: impl Into<String>) -> Self {
        let file_name = file_name.into();
        let name = file_name
            .split('.')
            .next()
            .unwrap_or_default()
            .to_string();

        Self {
            name,
            file_name,
            content: None,
        }
    }

    /// Build from a ledger name, assuming the standard extension
    pub fn from_name(name: impl Into<String>) -> Self {
        let name = name.into();
        let file_name = format!("{}.{}", name, MIGRATION_EXTENSION);

        Self {
            name,
            file_name,
            content: None,
        }
    }

    /// Attach the loaded body
    pub fn with_content(mut self, content: String) -> Self {
        self.content = Some(content);
        self
    }

    /// The loaded body, empty when nothing was loaded
    pub fn content(&self) -> &str {
        self.content.as_deref().unwrap_or_default()
    }

    /// Check whether the loaded body contains any SQL to run
    pub fn has_sql(&self) -> bool {
        !self.content().trim().is_empty()
    }
}

/// One row of the ledger table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub name: String,
    pub applied_at: DateTime<Utc>,
}

/// Configuration for the migration system
#[derive(Debug, Clone)]
pub struct MigrationConfig {
    /// Directory where migration files are stored
    pub migrations_dir: PathBuf,
    /// Table name for tracking migrations
    pub migrations_table: String,
}

impl MigrationConfig {
    /// Configuration for `migrations_dir`; an empty path selects the default directory
    pub fn new(migrations_dir: impl Into<PathBuf>) -> Self {
        let migrations_dir = migrations_dir.into();
        let migrations_dir = if migrations_dir.as_os_str().is_empty() {
            PathBuf::from(DEFAULT_MIGRATIONS_DIR)
        } else {
            migrations_dir
        };

        Self {
            migrations_dir,
            migrations_table: DEFAULT_MIGRATIONS_TABLE.to_string(),
        }
    }

    /// Use a different ledger table
    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.migrations_table = table.into();
        self
    }

    /// Path of a file inside the migrations directory
    pub fn file_path(&self, file_name: &str) -> PathBuf {
        self.migrations_dir.join(file_name)
    }

    pub fn migrations_dir(&self) -> &Path {
        &self.migrations_dir
    }

    /// Check that the ledger table name is a plain SQL identifier
    pub fn validate(&self) -> MigrationResult<()> {
        let table = &self.migrations_table;
        let mut chars = table.chars();
        let valid = match chars.next() {
            Some(first) => {
                (first.is_ascii_alphabetic() || first == '_')
                    && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
            }
            None => false,
        };

        if valid {
            Ok(())
        } else {
            Err(MigrationError::Configuration(format!(
                "Invalid migrations table name '{}': expected letters, digits and underscores",
                table
            )))
        }
    }
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self::new(DEFAULT_MIGRATIONS_DIR)
    }
}

/// Migration direction for execution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationDirection {
    /// Apply the migration (run UP statements)
    Up,
    /// Rollback the migration (run DOWN statements)
    Down,
}

impl MigrationDirection {
    /// Marker line that opens this direction's body
    pub fn marker(&self) -> &'static str {
        match self {
            MigrationDirection::Up => UP_MARKER,
            MigrationDirection::Down => DOWN_MARKER,
        }
    }
}

/// Result of running migrations
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationRunResult {
    /// Names of migrations that were applied, in application order
    pub applied_migrations: Vec<String>,
    /// Number of migrations that were already recorded in the ledger
    pub skipped_count: usize,
    /// Total execution time in milliseconds
    pub execution_time_ms: u128,
}

impl MigrationRunResult {
    /// Number of migrations that were applied
    pub fn applied_count(&self) -> usize {
        self.applied_migrations.len()
    }

    /// True when there was nothing pending
    pub fn is_up_to_date(&self) -> bool {
        self.applied_migrations.is_empty()
    }
}

/// Result of rolling back a migration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RollbackResult {
    /// Name of the migration removed from the ledger
    pub rolled_back: Option<String>,
    /// Whether a down-body was executed (false for ledger-only rollbacks)
    pub executed_sql: bool,
    /// Total execution time in milliseconds
    pub execution_time_ms: u128,
}

impl RollbackResult {
    /// True when the ledger was empty
    pub fn is_noop(&self) -> bool {
        self.rolled_back.is_none()
    }
}

/// Migration status in the system
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationState {
    pub name: String,
    /// When the migration was applied; `None` while pending
    pub applied_at: Option<DateTime<Utc>>,
    /// Whether a file for this migration is present in the directory
    pub file_present: bool,
}

impl MigrationState {
    pub fn is_applied(&self) -> bool {
        self.applied_at.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_is_prefix_before_first_dot() {
        let migration = FileMigration::from_file_name("20230101120000_create_users.sql");
        assert_eq!(migration.name, "20230101120000_create_users");
        assert_eq!(migration.file_name, "20230101120000_create_users.sql");

        let migration = FileMigration::from_file_name("20230101_a.up.sql");
        assert_eq!(migration.name, "20230101_a");

        let migration = FileMigration::from_file_name("README");
        assert_eq!(migration.name, "README");
    }

    #[test]
    fn test_from_name_appends_extension() {
        let migration = FileMigration::from_name("20230102_b");
        assert_eq!(migration.file_name, "20230102_b.sql");
        assert!(migration.content.is_none());
        assert_eq!(migration.content(), "");
        assert!(!migration.has_sql());
    }

    #[test]
    fn test_whitespace_body_has_no_sql() {
        let migration = FileMigration::from_name("a").with_content("\n  \n".to_string());
        assert!(!migration.has_sql());

        let migration = FileMigration::from_name("a").with_content("SELECT 1;".to_string());
        assert!(migration.has_sql());
    }

    #[test]
    fn test_empty_dir_falls_back_to_default() {
        let config = MigrationConfig::new("");
        assert_eq!(config.migrations_dir, PathBuf::from("migrations"));
        assert_eq!(config.migrations_table, "migrations");

        let config = MigrationConfig::new("db/migrations").with_table("schema_ledger");
        assert_eq!(config.file_path("a.sql"), PathBuf::from("db/migrations/a.sql"));
        assert_eq!(config.migrations_table, "schema_ledger");
    }

    #[test]
    fn test_table_name_validation() {
        assert!(MigrationConfig::default().validate().is_ok());
        assert!(MigrationConfig::default().with_table("_schema_v2").validate().is_ok());

        for bad in ["", "2fast", "drop table", "ledger;--", "a.b"] {
            let err = MigrationConfig::default().with_table(bad).validate().unwrap_err();
            assert!(matches!(err, MigrationError::Configuration(_)), "{bad}");
        }
    }

    #[test]
    fn test_run_results() {
        let result = MigrationRunResult {
            applied_migrations: Vec::new(),
            skipped_count: 2,
            execution_time_ms: 0,
        };
        assert!(result.is_up_to_date());
        assert_eq!(result.applied_count(), 0);

        let result = RollbackResult {
            rolled_back: Some("20230102_b".to_string()),
            executed_sql: true,
            execution_time_ms: 0,
        };
        assert!(!result.is_noop());
    }
}
