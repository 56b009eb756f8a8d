//! Structured logging for Kiln applications.
//!
//! Kiln crates emit `tracing` events; this crate installs the subscriber
//! that renders them, as JSON for production or pretty-printed for
//! development.
//!
//! # Example
//!
//! ```rust,ignore
//! use kiln_config::KilnConfig;
//! use kiln_telemetry::{init_logging, LogConfig};
//!
//! let config = KilnConfig::default();
//! init_logging(&LogConfig::from_config(&config))?;
//!
//! tracing::info!(port = config.http.port, "starting");
//! ```

#![doc(html_root_url = "https://docs.rs/kiln-telemetry/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod error;
pub mod logging;

pub use error::TelemetryError;
pub use logging::{create_env_filter, init_logging, level_directive, LogConfig};

/// Result type for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;
