//! Logging setup
//!
//! The engine only emits `tracing` events. Programs embedding it install
//! whatever subscriber they like; the strata binary uses [`init_logging`].

use std::io;
use tracing_subscriber::{fmt::Layer, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "warn")
    pub level: String,
    /// Enable JSON structured logging (vs plain text)
    pub json_format: bool,
    /// Include file and line number information
    pub include_location: bool,
    /// Environment filter (supports complex filters like "strata_migrate=debug,sqlx=warn")
    pub env_filter: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
            include_location: false,
            env_filter: None,
        }
    }
}

impl LoggingConfig {
    /// Configuration at `level`
    pub fn with_level(level: impl Into<String>) -> Self {
        Self {
            level: level.into(),
            ..Self::default()
        }
    }

    /// Debug output with source locations
    pub fn verbose() -> Self {
        Self {
            level: "debug".to_string(),
            include_location: true,
            ..Self::default()
        }
    }

    /// Switch to JSON lines
    pub fn json(mut self) -> Self {
        self.json_format = true;
        self
    }

    /// Set environment filter
    pub fn with_env_filter<S: Into<String>>(mut self, filter: S) -> Self {
        self.env_filter = Some(filter.into());
        self
    }

    /// Filter directive used when `RUST_LOG` is not set
    ///
    /// sqlx statement logging is kept at warn unless asked for explicitly.
    pub fn directive(&self) -> String {
        match &self.env_filter {
            Some(filter) => filter.clone(),
            None => format!("{},sqlx=warn", self.level),
        }
    }
}

/// Install a stdout subscriber for `config`
///
/// `RUST_LOG` takes precedence over the configured level. Fails if a global
/// subscriber is already installed.
pub fn init_logging(config: LoggingConfig) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(config.directive()))?;

    let layer = Layer::new()
        .with_writer(io::stdout)
        .with_target(false)
        .with_file(config.include_location)
        .with_line_number(config.include_location);

    if config.json_format {
        tracing_subscriber::registry()
            .with(filter)
            .with(layer.json())
            .try_init()?;
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(layer)
            .try_init()?;
    }

    tracing::debug!(
        level = %config.level,
        format = if config.json_format { "json" } else { "text" },
        "Logging initialized"
    );
    Ok(())
}
