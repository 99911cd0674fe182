//! # strata-core
//!
//! Configuration loading and logging setup shared by the strata binary and
//! anything embedding the migration engine.

pub mod config;
pub mod logging;

pub use config::validation::ConfigError;
pub use config::{AppConfigTrait, ConfigSource, StrataConfig};
pub use logging::{init_logging, LoggingConfig};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get the crate version
pub fn version() -> &'static str {
    VERSION
}
