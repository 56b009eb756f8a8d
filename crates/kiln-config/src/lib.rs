//! Typed configuration for Kiln applications.
//!
//! - TOML and JSON configuration files, merged key by key over defaults
//! - `.env` files and environment variable overrides
//! - Strict validation (fails on unknown fields)
//!
//! # Example
//!
//! ```no_run
//! use kiln_config::ConfigLoader;
//!
//! # fn main() -> Result<(), kiln_config::ConfigError> {
//! let config = ConfigLoader::new()
//!     .with_optional_file("kiln.toml")?
//!     .with_dotenv()?
//!     .load()?;
//!
//! println!("listening on {}:{}", config.http.host, config.http.port);
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration File Format
//!
//! ```toml
//! debug = false
//! env = "production"
//! secret_key = "change-me"
//! log_level = "INFO"
//!
//! [http]
//! host = "0.0.0.0"
//! port = 8000
//! workers = 4
//!
//! [database]
//! url = "postgres://localhost/app"
//! pool_size = 10
//! ```
//!
//! # Environment Variable Overrides
//!
//! Every value can be overridden with `PREFIX__SECTION__KEY`:
//!
//! - `KILN__DEBUG=true`
//! - `KILN__HTTP__PORT=9000`
//! - `KILN__DATABASE__URL=postgres://db/app`

#![warn(missing_docs)]

mod config;
mod error;
mod loader;

pub use config::{DatabaseConfig, HttpConfig, KilnConfig, LOG_LEVELS};
pub use error::ConfigError;
pub use loader::{ConfigLoader, DEFAULT_ENV_PREFIX, ENV_SEPARATOR};
