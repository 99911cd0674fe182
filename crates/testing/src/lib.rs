//! # strata-testing - Test helpers for strata migrations
//!
//! - [`TestDatabase`]: an in-memory SQLite database with schema and ledger
//!   assertions
//! - [`MigrationFixture`]: a temporary migrations directory on disk
//! - [`FakeDatabase`]: a scripted database that records every call
//!
//! ```rust,no_run
//! use strata_testing::prelude::*;
//!
//! async fn applies_migrations() -> TestResult<()> {
//!     let fixture = MigrationFixture::new()?;
//!     fixture.write("20230101_a.sql", "-- migration:up\nCREATE TABLE t(x int);")?;
//!
//!     let db = TestDatabase::new().await?;
//!     fixture.runner()?.migrate(&db).await?;
//!     db.assert_table_exists("t").await
//! }
//! ```

pub mod database;
pub mod fake;
pub mod fixtures;

pub use database::TestDatabase;
pub use fake::{FakeDatabase, FakeEvent};
pub use fixtures::MigrationFixture;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{FakeDatabase, FakeEvent, MigrationFixture, TestDatabase, TestError, TestResult};
    pub use strata_migrate::prelude::*;
}

#[derive(thiserror::Error, Debug)]
pub enum TestError {
    #[error("Database error: {0}")]
    Database(#[from] strata_migrate::DatabaseError),

    #[error("Migration error: {0}")]
    Migration(#[from] strata_migrate::MigrationError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Assertion failed: {message}")]
    Assertion { message: String },
}

impl TestError {
    pub(crate) fn assertion(message: impl Into<String>) -> Self {
        TestError::Assertion {
            message: message.into(),
        }
    }
}

pub type TestResult<T> = Result<T, TestError>;
