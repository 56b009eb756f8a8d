//! Configuration loader with layered approach.
//!
//! This module provides the [`ConfigLoader`] for loading configuration from
//! multiple sources: defaults, files, `.env` files and environment variables.

use serde_json::Value;
use std::env;
use std::fs;
use std::path::Path;

use crate::{ConfigError, KilnConfig};

/// Default environment variable prefix.
pub const DEFAULT_ENV_PREFIX: &str = "KILN";

/// Separator between the prefix, sections and keys of an environment variable.
pub const ENV_SEPARATOR: &str = "__";

#[derive(Debug)]
enum EnvSource {
    Process,
    Vars(Vec<(String, String)>),
    Disabled,
}

/// Configuration loader with layered approach.
///
/// The loader applies configuration in layers, with later layers overriding
/// earlier ones:
/// 1. Default values
/// 2. Configuration files and inline strings (TOML or JSON), in call order
/// 3. Variables from a `.env` file
/// 4. Environment variables
///
/// Files only need to mention the values they change; nested sections are
/// merged key by key.
///
/// # Example
///
/// ```no_run
/// use kiln_config::ConfigLoader;
///
/// # fn main() -> Result<(), kiln_config::ConfigError> {
/// let config = ConfigLoader::new()
///     .with_optional_file("kiln.toml")?
///     .with_dotenv()?
///     .with_env_prefix("KILN")
///     .load()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ConfigLoader {
    config: KilnConfig,
    env_prefix: String,
    env: EnvSource,
    dotenv: Vec<(String, String)>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Create a loader reading the process environment with the `KILN`
    /// prefix.
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: KilnConfig::default(),
            env_prefix: DEFAULT_ENV_PREFIX.to_string(),
            env: EnvSource::Process,
            dotenv: Vec::new(),
        }
    }

    /// Reset to default configuration values.
    #[must_use]
    pub fn with_defaults(mut self) -> Self {
        self.config = KilnConfig::default();
        self
    }

    /// Load configuration from a file.
    ///
    /// The format is determined by the file extension (`.toml` or `.json`).
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - The file does not exist or cannot be read
    /// - The extension is not supported
    /// - The file contains invalid TOML/JSON, unknown fields or values of
    ///   the wrong type
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::file_not_found(path));
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::read_error(path, e))?;

        let format = path
            .extension()
            .and_then(|e| e.to_str())
            .ok_or_else(|| ConfigError::unsupported_format(path.display().to_string()))?;

        let layer = parse(&content, format)?;
        self.merge(layer)?;
        tracing::debug!(path = %path.display(), "loaded configuration file");

        Ok(self)
    }

    /// Load configuration from a file if it exists.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file exists but cannot be loaded.
    pub fn with_optional_file<P: AsRef<Path>>(self, path: P) -> Result<Self, ConfigError> {
        if path.as_ref().exists() {
            self.with_file(path)
        } else {
            Ok(self)
        }
    }

    /// Load configuration from a string in the given format (`"toml"` or
    /// `"json"`).
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if parsing fails or the format is unsupported.
    ///
    /// # Example
    ///
    /// ```
    /// use kiln_config::ConfigLoader;
    ///
    /// let config = ConfigLoader::new()
    ///     .without_env()
    ///     .with_string("debug = true\n[http]\nport = 3000\n", "toml")
    ///     .unwrap()
    ///     .load()
    ///     .unwrap();
    ///
    /// assert!(config.debug);
    /// assert_eq!(config.http.port, 3000);
    /// assert_eq!(config.http.host, "0.0.0.0");
    /// ```
    pub fn with_string(mut self, content: &str, format: &str) -> Result<Self, ConfigError> {
        let layer = parse(content, format)?;
        self.merge(layer)?;
        Ok(self)
    }

    /// Set the environment variable prefix.
    ///
    /// Variables use the format `PREFIX__SECTION__KEY`, e.g.
    /// `KILN__HTTP__PORT=9000` or `KILN__DEBUG=yes`.
    #[must_use]
    pub fn with_env_prefix(mut self, prefix: &str) -> Self {
        self.env_prefix = prefix.to_uppercase();
        self
    }

    /// Read overrides from `vars` instead of the process environment.
    #[must_use]
    pub fn with_env_vars<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.env = EnvSource::Vars(vars.into_iter().map(|(k, v)| (k.into(), v.into())).collect());
        self
    }

    /// Skip environment variable overrides.
    #[must_use]
    pub fn without_env(mut self) -> Self {
        self.env = EnvSource::Disabled;
        self
    }

    /// Read variables from `.env` in the working directory, if present.
    ///
    /// Variables from the file sit below the real environment: a variable
    /// set in both places takes the environment's value.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file exists but cannot be parsed.
    pub fn with_dotenv(self) -> Result<Self, ConfigError> {
        if Path::new(".env").exists() {
            self.with_dotenv_file(".env")
        } else {
            Ok(self)
        }
    }

    /// Read variables from a specific `.env` file.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file cannot be read or parsed.
    pub fn with_dotenv_file<P: AsRef<Path>>(mut self, path: P) -> Result<Self, ConfigError> {
        for item in dotenvy::from_path_iter(path.as_ref())? {
            self.dotenv.push(item?);
        }
        Ok(self)
    }

    /// Apply environment overrides and validate.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if an environment value has the wrong type or
    /// validation fails.
    pub fn load(self) -> Result<KilnConfig, ConfigError> {
        let config = self.load_unvalidated()?;
        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides without validating.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if an environment value has the wrong type.
    pub fn load_unvalidated(mut self) -> Result<KilnConfig, ConfigError> {
        let mut vars = std::mem::take(&mut self.dotenv);
        match std::mem::replace(&mut self.env, EnvSource::Disabled) {
            EnvSource::Process => vars.extend(env::vars()),
            EnvSource::Vars(explicit) => vars.extend(explicit),
            EnvSource::Disabled => {}
        }
        self.apply_env(&vars)?;
        Ok(self.config)
    }

    fn merge(&mut self, layer: Value) -> Result<(), ConfigError> {
        let mut base = serde_json::to_value(&self.config)?;
        merge_values(&mut base, layer);
        self.config = serde_json::from_value(base)?;
        Ok(())
    }

    fn apply_env(&mut self, vars: &[(String, String)]) -> Result<(), ConfigError> {
        let prefix = format!("{}{ENV_SEPARATOR}", self.env_prefix);
        let mut root = serde_json::to_value(&self.config)?;
        let mut applied = 0usize;

        for (key, raw) in vars {
            let Some(rest) = key.strip_prefix(&prefix) else {
                continue;
            };
            let path: Vec<String> = rest.split(ENV_SEPARATOR).map(str::to_lowercase).collect();
            let slot = path
                .iter()
                .try_fold(&mut root, |value, part| value.get_mut(part.as_str()));

            match slot {
                Some(slot) => {
                    *slot = env_value(key, raw, slot)?;
                    applied += 1;
                }
                None => tracing::debug!(var = %key, "ignoring unknown configuration variable"),
            }
        }

        if applied > 0 {
            tracing::debug!(count = applied, "applied environment overrides");
            self.config = serde_json::from_value(root)?;
        }
        Ok(())
    }
}

fn parse(content: &str, format: &str) -> Result<Value, ConfigError> {
    match format.to_lowercase().as_str() {
        "toml" => Ok(toml::from_str(content)?),
        "json" => Ok(serde_json::from_str(content)?),
        _ => Err(ConfigError::unsupported_format(format)),
    }
}

fn merge_values(base: &mut Value, layer: Value) {
    match (base, layer) {
        (Value::Object(base), Value::Object(layer)) => {
            for (key, value) in layer {
                match base.get_mut(&key) {
                    Some(slot) => merge_values(slot, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (slot, layer) => *slot = layer,
    }
}

/// Converts a raw variable into the JSON type of the value it replaces.
fn env_value(var: &str, raw: &str, current: &Value) -> Result<Value, ConfigError> {
    match current {
        Value::Bool(_) => parse_bool(raw)
            .map(Value::Bool)
            .ok_or_else(|| ConfigError::env_parse_error(var, "expected boolean")),
        Value::Number(number) if number.is_f64() => raw
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number)
            .ok_or_else(|| ConfigError::env_parse_error(var, "expected float")),
        Value::Number(_) => raw
            .trim()
            .parse::<u64>()
            .map(Value::from)
            .map_err(|_| ConfigError::env_parse_error(var, "expected non-negative integer")),
        Value::Null if raw.is_empty() => Ok(Value::Null),
        Value::Null | Value::String(_) => Ok(Value::String(raw.to_string())),
        Value::Array(_) | Value::Object(_) => Err(ConfigError::env_parse_error(
            var,
            "cannot override a whole section",
        )),
    }
}

/// Parse a boolean from a string.
fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}
