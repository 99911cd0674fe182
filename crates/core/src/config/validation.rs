use thiserror::Error;

/// Configuration error type
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required field: {field}. {hint}")]
    MissingRequired { field: String, hint: String },

    #[error("Invalid value for field '{field}': '{value}'. Expected: {expected}")]
    InvalidValue {
        field: String,
        value: String,
        expected: String,
    },

    #[error("Environment variable error: {message}")]
    EnvironmentError { message: String },
}

impl ConfigError {
    /// Create a missing required field error
    pub fn missing_required(field: impl Into<String>, hint: impl Into<String>) -> Self {
        Self::MissingRequired {
            field: field.into(),
            hint: hint.into(),
        }
    }

    /// Create an invalid value error
    pub fn invalid_value(
        field: impl Into<String>,
        value: impl Into<String>,
        expected: impl Into<String>,
    ) -> Self {
        Self::InvalidValue {
            field: field.into(),
            value: value.into(),
            expected: expected.into(),
        }
    }

    /// Create an environment error
    pub fn environment_error(message: impl Into<String>) -> Self {
        Self::EnvironmentError {
            message: message.into(),
        }
    }
}

/// Trait for validating configuration values
pub trait ConfigValidator<T: ?Sized> {
    /// Validate a configuration value
    fn validate(&self, field: &str, value: &T) -> Result<(), ConfigError>;
}

/// Accepts plain SQL identifiers: a letter or `_`, then letters, digits or `_`
pub struct IdentifierValidator;

impl ConfigValidator<str> for IdentifierValidator {
    fn validate(&self, field: &str, value: &str) -> Result<(), ConfigError> {
        let mut chars = value.chars();
        let valid = match chars.next() {
            Some(first) => {
                (first.is_ascii_alphabetic() || first == '_')
                    && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
            }
            None => false,
        };

        if !valid {
            return Err(ConfigError::invalid_value(
                field,
                value,
                "a SQL identifier (letters, digits and underscores)",
            ));
        }
        Ok(())
    }
}

/// Accepts one of a fixed set of values, ignoring case
pub struct OneOfValidator {
    pub allowed: &'static [&'static str],
}

impl ConfigValidator<str> for OneOfValidator {
    fn validate(&self, field: &str, value: &str) -> Result<(), ConfigError> {
        if !self.allowed.iter().any(|allowed| allowed.eq_ignore_ascii_case(value)) {
            return Err(ConfigError::invalid_value(
                field,
                value,
                format!("one of: {}", self.allowed.join(", ")),
            ));
        }
        Ok(())
    }
}

/// Database URL validator
pub struct UrlValidator {
    pub schemes: &'static [&'static str],
}

impl Default for UrlValidator {
    fn default() -> Self {
        Self { schemes: &["sqlite"] }
    }
}

impl ConfigValidator<str> for UrlValidator {
    fn validate(&self, field: &str, value: &str) -> Result<(), ConfigError> {
        if value.is_empty() {
            return Err(ConfigError::invalid_value(field, value, "non-empty URL"));
        }

        let has_valid_scheme = self
            .schemes
            .iter()
            .any(|scheme| value.starts_with(&format!("{}:", scheme)));

        if !has_valid_scheme {
            return Err(ConfigError::invalid_value(
                field,
                value,
                format!("URL with scheme: {}", self.schemes.join(", ")),
            ));
        }
        Ok(())
    }
}
