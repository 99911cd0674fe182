use crate::config::{ConfigError, ConfigSource, ConfigValidator, IdentifierValidator, OneOfValidator, UrlValidator};
use std::collections::{HashMap, HashSet};
use std::env;
use std::path::PathBuf;

pub const DATABASE_URL_VAR: &str = "DATABASE_URL";
pub const MIGRATIONS_DIR_VAR: &str = "STRATA_MIGRATIONS_DIR";
pub const MIGRATIONS_TABLE_VAR: &str = "STRATA_MIGRATIONS_TABLE";
pub const LOG_LEVEL_VAR: &str = "STRATA_LOG_LEVEL";

const DEFAULT_MIGRATIONS_DIR: &str = "migrations";
const DEFAULT_MIGRATIONS_TABLE: &str = "migrations";
const DEFAULT_LOG_LEVEL: &str = "info";
const LOG_LEVELS: &[&str] = &["error", "warn", "info", "debug", "trace"];

/// Configuration trait for application configuration
pub trait AppConfigTrait: Sized {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self, ConfigError>;

    /// Validate the configuration
    fn validate(&self) -> Result<(), ConfigError>;

    /// Get configuration source information for debugging
    fn config_sources(&self) -> HashMap<String, ConfigSource>;
}

/// Settings for the strata tool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrataConfig {
    pub database_url: Option<String>,
    pub migrations_dir: PathBuf,
    pub migrations_table: String,
    pub log_level: String,
    overridden: HashSet<&'static str>,
}

impl StrataConfig {
    /// Create a new default configuration
    pub fn new() -> Self {
        Self {
            database_url: None,
            migrations_dir: PathBuf::from(DEFAULT_MIGRATIONS_DIR),
            migrations_table: DEFAULT_MIGRATIONS_TABLE.to_string(),
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            overridden: HashSet::new(),
        }
    }

    pub fn with_database_url(mut self, url: impl Into<String>) -> Self {
        self.database_url = Some(url.into());
        self.overridden.insert("database_url");
        self
    }

    pub fn with_migrations_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.migrations_dir = dir.into();
        self.overridden.insert("migrations_dir");
        self
    }

    pub fn with_migrations_table(mut self, table: impl Into<String>) -> Self {
        self.migrations_table = table.into();
        self.overridden.insert("migrations_table");
        self
    }

    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self.overridden.insert("log_level");
        self
    }

    /// The database URL, or an error naming the variable to set
    pub fn require_database_url(&self) -> Result<&str, ConfigError> {
        self.database_url.as_deref().ok_or_else(|| {
            ConfigError::missing_required(
                "database_url",
                format!("Set {} or pass --database-url", DATABASE_URL_VAR),
            )
        })
    }

    fn source_of(&self, field: &'static str, var: &str, default: Option<&str>) -> ConfigSource {
        if self.overridden.contains(field) {
            ConfigSource::Programmatic
        } else if env::var(var).is_ok() {
            ConfigSource::EnvVar(var.to_string())
        } else {
            match default {
                Some(value) => ConfigSource::Default(value.to_string()),
                None => ConfigSource::Unset,
            }
        }
    }
}

impl Default for StrataConfig {
    fn default() -> Self {
        Self::new()
    }
}

fn read_var(name: &str) -> Result<Option<String>, ConfigError> {
    match env::var(name) {
        Ok(value) if value.is_empty() => Ok(None),
        Ok(value) => Ok(Some(value)),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(env::VarError::NotUnicode(_)) => Err(ConfigError::environment_error(format!(
            "{} is not valid unicode",
            name
        ))),
    }
}

impl AppConfigTrait for StrataConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::new();

        config.database_url = read_var(DATABASE_URL_VAR)?;

        if let Some(dir) = read_var(MIGRATIONS_DIR_VAR)? {
            config.migrations_dir = PathBuf::from(dir);
        }

        if let Some(table) = read_var(MIGRATIONS_TABLE_VAR)? {
            config.migrations_table = table;
        }

        if let Some(level) = read_var(LOG_LEVEL_VAR)? {
            config.log_level = level.to_lowercase();
        }

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.migrations_dir.as_os_str().is_empty() {
            return Err(ConfigError::invalid_value(
                "migrations_dir",
                "",
                "a directory path",
            ));
        }

        IdentifierValidator.validate("migrations_table", &self.migrations_table)?;
        OneOfValidator { allowed: LOG_LEVELS }.validate("log_level", &self.log_level)?;

        if let Some(url) = &self.database_url {
            UrlValidator::default().validate("database_url", url)?;
        }

        Ok(())
    }

    fn config_sources(&self) -> HashMap<String, ConfigSource> {
        let mut sources = HashMap::new();

        sources.insert(
            "database_url".to_string(),
            self.source_of("database_url", DATABASE_URL_VAR, None),
        );
        sources.insert(
            "migrations_dir".to_string(),
            self.source_of("migrations_dir", MIGRATIONS_DIR_VAR, Some(DEFAULT_MIGRATIONS_DIR)),
        );
        sources.insert(
            "migrations_table".to_string(),
            self.source_of("migrations_table", MIGRATIONS_TABLE_VAR, Some(DEFAULT_MIGRATIONS_TABLE)),
        );
        sources.insert(
            "log_level".to_string(),
            self.source_of("log_level", LOG_LEVEL_VAR, Some(DEFAULT_LOG_LEVEL)),
        );

        sources
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const VARS: [&str; 4] = [DATABASE_URL_VAR, MIGRATIONS_DIR_VAR, MIGRATIONS_TABLE_VAR, LOG_LEVEL_VAR];

    fn clear_env() {
        for var in VARS {
            env::remove_var(var);
        }
    }

    #[test]
    #[serial]
    fn test_defaults_without_environment() {
        clear_env();

        let config = StrataConfig::from_env().unwrap();
        assert_eq!(config.database_url, None);
        assert_eq!(config.migrations_dir, PathBuf::from("migrations"));
        assert_eq!(config.migrations_table, "migrations");
        assert_eq!(config.log_level, "info");

        let sources = config.config_sources();
        assert!(sources["migrations_dir"].is_default());
        assert_eq!(sources["database_url"], ConfigSource::Unset);
    }

    #[test]
    #[serial]
    fn test_values_from_environment() {
        clear_env();
        env::set_var(DATABASE_URL_VAR, "sqlite://app.db");
        env::set_var(MIGRATIONS_DIR_VAR, "db/migrations");
        env::set_var(MIGRATIONS_TABLE_VAR, "schema_history");
        env::set_var(LOG_LEVEL_VAR, "DEBUG");

        let config = StrataConfig::from_env().unwrap();
        assert_eq!(config.require_database_url().unwrap(), "sqlite://app.db");
        assert_eq!(config.migrations_dir, PathBuf::from("db/migrations"));
        assert_eq!(config.migrations_table, "schema_history");
        assert_eq!(config.log_level, "debug");

        let sources = config.config_sources();
        assert_eq!(sources["migrations_table"], ConfigSource::EnvVar(MIGRATIONS_TABLE_VAR.to_string()));
        clear_env();
    }

    #[test]
    #[serial]
    fn test_invalid_table_from_environment() {
        clear_env();
        env::set_var(MIGRATIONS_TABLE_VAR, "bad table");

        let err = StrataConfig::from_env().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref field, .. } if field == "migrations_table"));
        clear_env();
    }

    #[test]
    #[serial]
    fn test_programmatic_values_win_in_sources() {
        clear_env();
        env::set_var(MIGRATIONS_DIR_VAR, "from_env");

        let config = StrataConfig::from_env().unwrap().with_migrations_dir("from_flag");
        assert_eq!(config.migrations_dir, PathBuf::from("from_flag"));
        assert_eq!(config.config_sources()["migrations_dir"], ConfigSource::Programmatic);
        clear_env();
    }

    #[test]
    fn test_validation() {
        assert!(StrataConfig::new().validate().is_ok());
        assert!(StrataConfig::new().with_log_level("loud").validate().is_err());
        assert!(StrataConfig::new().with_migrations_dir("").validate().is_err());
        assert!(StrataConfig::new()
            .with_database_url("mysql://localhost/db")
            .validate()
            .is_err());
    }

    #[test]
    fn test_missing_database_url() {
        let err = StrataConfig::new().require_database_url().unwrap_err();
        assert!(err.to_string().contains("DATABASE_URL"));
    }
}
