//! Migration Manager - File system operations for migrations
//!
//! Handles creating migration files and locating and loading the ones the
//! runner needs. Reads go through the configured [`MigrationFileSystem`];
//! new files are always written to the OS filesystem.

use chrono::Utc;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use super::definitions::{FileMigration, MigrationConfig, MigrationDirection, DOWN_MARKER, UP_MARKER};
use super::source::{list_up_migrations, load_body, MigrationFileSystem, OsFileSystem};
use crate::error::{MigrationError, MigrationResult};

/// Name of the sample migration written by `init`
pub const SAMPLE_MIGRATION_NAME: &str = "initial";

const SAMPLE_MIGRATION: &str = "\
-- Migrations are applied in the order of their file names.
-- The statements after the up marker run on `strata migrate`,
-- the statements after the down marker run on `strata rollback`.
-- Each migration runs in its own transaction.

-- migration:up

-- migration:down
";

/// Migration manager for creating and loading migrations
#[derive(Clone)]
pub struct MigrationManager {
    config: MigrationConfig,
    fs: Arc<dyn MigrationFileSystem>,
}

impl MigrationManager {
    /// Manager reading from the OS filesystem
    pub fn new(config: MigrationConfig) -> Self {
        Self::with_file_system(config, Arc::new(OsFileSystem))
    }

    /// Manager reading through a custom filesystem
    pub fn with_file_system(config: MigrationConfig, fs: Arc<dyn MigrationFileSystem>) -> Self {
        Self { config, fs }
    }

    /// Get the configuration
    pub fn config(&self) -> &MigrationConfig {
        &self.config
    }

    /// All migrations in the configured directory, sorted by name
    pub fn discover(&self) -> MigrationResult<Vec<FileMigration>> {
        list_up_migrations(self.fs.as_ref(), self.config.migrations_dir())
    }

    /// Load the `direction` body of `migration` into its content
    pub fn load(&self, migration: FileMigration, direction: MigrationDirection) -> MigrationResult<FileMigration> {
        let body = load_body(self.fs.as_ref(), self.config.migrations_dir(), &migration, direction)?;
        Ok(migration.with_content(body))
    }

    /// Create a new migration file in the configured directory
    pub fn create_migration(&self, name: &str, content: Option<&str>) -> MigrationResult<PathBuf> {
        create_migration_file(self.config.migrations_dir(), name, content)
    }

    /// Create the migrations directory together with a sample migration
    pub fn init_directory(&self) -> MigrationResult<PathBuf> {
        let dir = self.config.migrations_dir();
        if dir.exists() {
            return Err(MigrationError::AlreadyInitialized(dir.to_path_buf()));
        }

        create_migration_file(dir, SAMPLE_MIGRATION_NAME, Some(SAMPLE_MIGRATION))
    }
}

impl std::fmt::Debug for MigrationManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MigrationManager")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Write `<timestamp>_<name>.sql` into `dir` and return its path
///
/// The timestamp is the current UTC time as `YYYYMMDDHHMMSS`. Spaces in
/// `name` become underscores. Without content the file gets empty up and
/// down sections.
pub fn create_migration_file(dir: &Path, name: &str, content: Option<&str>) -> MigrationResult<PathBuf> {
    let name = validate_name(name)?;

    fs::create_dir_all(dir).map_err(|source| MigrationError::Write {
        path: dir.to_path_buf(),
        source,
    })?;

    let timestamp = Utc::now().format("%Y%m%d%H%M%S");
    let path = dir.join(format!("{}_{}.sql", timestamp, name));

    let template = default_template();
    let content = match content {
        Some(text) if !text.is_empty() => text,
        _ => template.as_str(),
    };

    OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&path)
        .and_then(|mut file| file.write_all(content.as_bytes()))
        .map_err(|source| MigrationError::Write {
            path: path.clone(),
            source,
        })?;

    info!(path = %path.display(), "Created migration");
    Ok(path)
}

fn default_template() -> String {
    format!("{}\n\n{}", UP_MARKER, DOWN_MARKER)
}

fn validate_name(name: &str) -> MigrationResult<String> {
    let name = name.trim();
    let invalid = |reason: &str| MigrationError::InvalidName(name.to_string(), reason.to_string());

    if name.is_empty() {
        return Err(invalid("name must not be empty"));
    }
    if name.contains('.') {
        return Err(invalid("name must not contain '.'"));
    }
    if name.contains(['/', '\\']) {
        return Err(invalid("name must not contain path separators"));
    }

    Ok(name.replace(' ', "_"))
}
