//! Database Backend Abstractions
//!
//! This module provides the database capability consumed by the migration
//! engine together with the drivers that implement it.

pub mod core;
pub mod sqlite;

use std::sync::Arc;

pub use self::core::*;
pub use sqlite::{SqliteDatabase, SqliteTransaction};

use crate::error::{MigrationError, MigrationResult};

/// Database backend type enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DatabaseBackendType {
    SQLite,
}

impl DatabaseBackendType {
    /// Detect the backend from a database URL scheme
    pub fn from_url(url: &str) -> MigrationResult<Self> {
        let scheme = url.split(':').next().unwrap_or_default();
        scheme.parse().map_err(MigrationError::Connection)
    }
}

impl std::fmt::Display for DatabaseBackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DatabaseBackendType::SQLite => write!(f, "sqlite"),
        }
    }
}

impl std::str::FromStr for DatabaseBackendType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sqlite" => Ok(DatabaseBackendType::SQLite),
            _ => Err(format!("Unsupported database backend: '{}' (supported: sqlite)", s)),
        }
    }
}

/// Open a database pool for `url`, picking the backend from its scheme
pub async fn connect(url: &str) -> MigrationResult<Arc<dyn DatabasePool>> {
    match DatabaseBackendType::from_url(url)? {
        DatabaseBackendType::SQLite => Ok(Arc::new(SqliteDatabase::connect(url).await?)),
    }
}
