//! # strata-migrate: file-driven SQL schema migrations
//!
//! Migrations are plain `.sql` files holding an up section and an optional
//! down section:
//!
//! ```sql
//! -- migration:up
//! CREATE TABLE users (id INTEGER PRIMARY KEY, email TEXT NOT NULL);
//!
//! -- migration:down
//! DROP TABLE users;
//! ```
//!
//! Applied migrations are recorded in a ledger table inside the target
//! database. [`MigrationRunner::migrate`] applies everything that is not in
//! the ledger yet, in file name order; [`MigrationRollback::rollback`]
//! reverts the most recent one.
//!
//! ```no_run
//! use strata_migrate::prelude::*;
//!
//! # async fn run() -> MigrationResult<()> {
//! let db = SqliteDatabase::connect("sqlite://app.db").await?;
//! let runner = MigrationRunner::new(MigrationConfig::new("migrations"))?;
//!
//! let result = runner.migrate(&db).await?;
//! println!("applied {} migrations", result.applied_count());
//! # Ok(())
//! # }
//! ```

pub mod backends;
pub mod error;
pub mod migrations;

pub use backends::{
    connect, DatabaseBackendType, DatabaseError, DatabasePool, DatabaseResult, DatabaseRow,
    DatabaseTransaction, DatabaseValue, SqliteDatabase,
};
pub use error::{MigrationError, MigrationResult};
pub use migrations::*;

/// Commonly used items
pub mod prelude {
    pub use crate::backends::{DatabasePool, SqliteDatabase};
    pub use crate::error::{MigrationError, MigrationResult};
    pub use crate::migrations::{
        MigrationConfig, MigrationRollback, MigrationRunResult, MigrationRunner, MigrationState, RollbackResult,
    };
}
