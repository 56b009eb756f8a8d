//! Configuration types.
//!
//! [`KilnConfig`] is the root; every section falls back to its defaults
//! when absent, and unknown fields are rejected.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ConfigError;

/// Log levels accepted by `log_level`, compared case-insensitively.
pub const LOG_LEVELS: [&str; 7] = [
    "TRACE", "DEBUG", "INFO", "WARN", "WARNING", "ERROR", "CRITICAL",
];

/// Complete application configuration.
///
/// # Example
///
/// ```
/// use kiln_config::KilnConfig;
///
/// let config = KilnConfig::default();
/// assert!(!config.debug);
/// assert_eq!(config.http.port, 8000);
/// assert_eq!(config.get("database.pool_size"), Some(serde_json::json!(5)));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields, default)]
pub struct KilnConfig {
    /// Include diagnostic detail in error responses.
    pub debug: bool,

    /// Deployment environment name.
    pub env: String,

    /// Application secret. Required in production.
    pub secret_key: String,

    /// Default timezone name.
    pub timezone: String,

    /// Minimum log level.
    pub log_level: String,

    /// HTTP binding settings.
    pub http: HttpConfig,

    /// Database settings.
    pub database: DatabaseConfig,
}

impl Default for KilnConfig {
    fn default() -> Self {
        Self {
            debug: false,
            env: "development".to_string(),
            secret_key: String::new(),
            timezone: "UTC".to_string(),
            log_level: "INFO".to_string(),
            http: HttpConfig::default(),
            database: DatabaseConfig::default(),
        }
    }
}

impl KilnConfig {
    /// Returns true if `env` is `production`.
    pub fn is_production(&self) -> bool {
        self.env.eq_ignore_ascii_case("production")
    }

    /// Reads a value by dotted path, e.g. `"http.port"`.
    ///
    /// Returns `None` for unknown paths.
    pub fn get(&self, path: &str) -> Option<Value> {
        let root = serde_json::to_value(self).ok()?;
        path.split('.')
            .try_fold(&root, |value, key| value.get(key))
            .cloned()
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] if `secret_key` is empty in
    /// production, or [`ConfigError::InvalidValue`] if:
    /// - `http.host` is empty
    /// - `http.port`, `http.workers` or `database.pool_size` is zero
    /// - `log_level` is not a known level
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.is_production() && self.secret_key.is_empty() {
            return Err(ConfigError::missing_field("secret_key"));
        }

        if self.http.host.trim().is_empty() {
            return Err(ConfigError::invalid_value("http.host", "must not be empty"));
        }
        if self.http.port == 0 {
            return Err(ConfigError::invalid_value("http.port", "must be non-zero"));
        }
        if self.http.workers == 0 {
            return Err(ConfigError::invalid_value("http.workers", "must be at least 1"));
        }
        if self.database.pool_size == 0 {
            return Err(ConfigError::invalid_value(
                "database.pool_size",
                "must be at least 1",
            ));
        }

        if !LOG_LEVELS
            .iter()
            .any(|level| level.eq_ignore_ascii_case(&self.log_level))
        {
            return Err(ConfigError::invalid_value(
                "log_level",
                format!("unknown level '{}', expected one of {}", self.log_level, LOG_LEVELS.join(", ")),
            ));
        }

        Ok(())
    }
}

/// HTTP binding settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields, default)]
pub struct HttpConfig {
    /// Bind host.
    pub host: String,
    /// Bind port.
    pub port: u16,
    /// Worker count.
    pub workers: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            workers: 1,
        }
    }
}

/// Database settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields, default)]
pub struct DatabaseConfig {
    /// Connection URL.
    pub url: Option<String>,
    /// Connection pool size.
    pub pool_size: u32,
    /// Connection timeout in seconds.
    pub timeout: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            pool_size: 5,
            timeout: 30,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults() {
        let config = KilnConfig::default();

        assert!(!config.debug);
        assert_eq!(config.env, "development");
        assert_eq!(config.timezone, "UTC");
        assert_eq!(config.log_level, "INFO");
        assert_eq!(config.database.pool_size, 5);
        assert_eq!(config.database.url, None);
        assert_eq!(config.http.port, 8000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_get_dotted_path() {
        let config = KilnConfig::default();

        assert_eq!(config.get("http.port"), Some(json!(8000)));
        assert_eq!(config.get("debug"), Some(json!(false)));
        assert_eq!(config.get("database.url"), Some(Value::Null));
        assert_eq!(config.get("http.missing"), None);
        assert_eq!(config.get("nope"), None);
    }

    #[test]
    fn test_production_requires_secret() {
        let mut config = KilnConfig {
            env: "production".to_string(),
            ..KilnConfig::default()
        };

        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::MissingField { ref field } if field == "secret_key"));

        config.secret_key = "s3cret".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_values() {
        let mut config = KilnConfig::default();
        config.http.port = 0;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidValue { .. })));

        let mut config = KilnConfig::default();
        config.database.pool_size = 0;
        assert!(config.validate().is_err());

        let mut config = KilnConfig::default();
        config.log_level = "loud".to_string();
        assert!(config.validate().is_err());

        let mut config = KilnConfig::default();
        config.log_level = "warning".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_sections_keep_defaults() {
        let config: KilnConfig = toml::from_str("[http]\nport = 9000\n").unwrap();

        assert_eq!(config.http.port, 9000);
        assert_eq!(config.http.host, "0.0.0.0");
        assert_eq!(config.database.pool_size, 5);
    }

    #[test]
    fn test_unknown_fields_rejected() {
        let result: Result<KilnConfig, _> = toml::from_str("[http]\nprot = 9000\n");
        assert!(result.is_err());
    }
}
