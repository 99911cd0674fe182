//! Error types for the migration engine
//!
//! Every stage of a migrate or rollback run reports failures through
//! [`MigrationError`]. Database-level failures are wrapped with the context
//! of the step that produced them (running migration SQL, touching the
//! ledger, or driving a transaction).

use std::path::PathBuf;
use thiserror::Error;

use crate::backends::DatabaseError;

/// Result type alias for migration operations
pub type MigrationResult<T> = Result<T, MigrationError>;

/// Error types for migration operations
#[derive(Debug, Error)]
pub enum MigrationError {
    /// The migrations directory could not be listed
    #[error("Failed to read migrations directory '{}': {source}", .path.display())]
    Discovery {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A migration file exists but could not be read
    #[error("Failed to read migration file '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A migration file could not be written
    #[error("Failed to write migration file '{}': {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The body of a migration failed to execute
    #[error("Failed to execute migration {migration}: {source}")]
    SqlExecution {
        migration: String,
        #[source]
        source: DatabaseError,
    },

    /// Reading or writing the ledger table failed
    #[error("Ledger error: {message}: {source}")]
    Ledger {
        message: String,
        #[source]
        source: DatabaseError,
    },

    /// Beginning or committing a transaction failed
    #[error("Transaction error: {message}: {source}")]
    Transaction {
        message: String,
        #[source]
        source: DatabaseError,
    },

    /// Opening the database failed
    #[error("Connection error: {0}")]
    Connection(String),

    /// The migration configuration is unusable
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A migration name cannot be turned into a file name
    #[error("Invalid migration name '{0}': {1}")]
    InvalidName(String, String),

    /// `init` was asked to create a directory that already exists
    #[error("The migrations directory '{}' already exists", .0.display())]
    AlreadyInitialized(PathBuf),
}

impl MigrationError {
    pub(crate) fn ledger(message: impl Into<String>, source: DatabaseError) -> Self {
        Self::Ledger {
            message: message.into(),
            source,
        }
    }

    pub(crate) fn transaction(message: impl Into<String>, source: DatabaseError) -> Self {
        Self::Transaction {
            message: message.into(),
            source,
        }
    }

    /// Name of the migration whose SQL failed, if this is an execution error
    pub fn failed_migration(&self) -> Option<&str> {
        match self {
            Self::SqlExecution { migration, .. } => Some(migration),
            _ => None,
        }
    }

    /// Check if the error came from the ledger table
    pub fn is_ledger(&self) -> bool {
        matches!(self, Self::Ledger { .. })
    }
}
