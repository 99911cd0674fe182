//! Migration System
//!
//! Discovery, parsing, ledger bookkeeping and transactional execution of
//! file-based SQL migrations.

pub mod definitions;
pub mod diff;
pub mod ledger;
pub mod manager;
pub mod parser;
pub mod rollback;
pub mod runner;
pub mod source;

pub use definitions::*;
pub use diff::pending_names;
pub use ledger::Ledger;
pub use manager::{create_migration_file, MigrationManager, SAMPLE_MIGRATION_NAME};
pub use parser::extract_body;
pub use rollback::MigrationRollback;
pub use runner::MigrationRunner;
pub use source::{list_up_migrations, load_body, MemoryFileSystem, MigrationFileSystem, OsFileSystem};
