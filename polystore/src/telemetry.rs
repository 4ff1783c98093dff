//! Tracing Setup
//!
//! `TigerStyle`: One call installs the subscriber; a second call is an
//! error, never a panic.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use polystore::telemetry::{init_tracing, TelemetryConfig};
//!
//! init_tracing(TelemetryConfig::builder().log_filter("polystore=debug").build())
//!     .expect("tracing init");
//! ```
//!
//! ## Environment Variables
//!
//! - `RUST_LOG` - Log filter directives (default: "info")

use thiserror::Error;
use tracing_subscriber::EnvFilter;

use crate::constants::TELEMETRY_LOG_FILTER_DEFAULT;

/// Tracing setup errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    /// Subscriber could not be installed
    #[error("tracing initialization failed: {reason}")]
    InitFailed {
        /// The reason for the failure
        reason: String,
    },

    /// Filter directives did not parse
    #[error("invalid log filter {filter:?}: {reason}")]
    InvalidFilter {
        /// The rejected directives
        filter: String,
        /// Parser message
        reason: String,
    },
}

/// Result type for telemetry operations
pub type Result<T> = std::result::Result<T, TelemetryError>;

/// Configuration for the fmt subscriber
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryConfig {
    /// `EnvFilter` directives, e.g. `"info,polystore=debug"`
    pub log_filter: String,

    /// Emit ANSI colors
    pub ansi: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_filter: std::env::var(EnvFilter::DEFAULT_ENV)
                .unwrap_or_else(|_| TELEMETRY_LOG_FILTER_DEFAULT.to_string()),
            ansi: true,
        }
    }
}

impl TelemetryConfig {
    /// Create a new builder for `TelemetryConfig`
    #[must_use]
    pub fn builder() -> TelemetryConfigBuilder {
        TelemetryConfigBuilder::default()
    }

    fn env_filter(&self) -> Result<EnvFilter> {
        EnvFilter::try_new(&self.log_filter).map_err(|e| TelemetryError::InvalidFilter {
            filter: self.log_filter.clone(),
            reason: e.to_string(),
        })
    }
}

/// Builder for `TelemetryConfig`
#[derive(Default)]
pub struct TelemetryConfigBuilder {
    log_filter: Option<String>,
    ansi: Option<bool>,
}

impl TelemetryConfigBuilder {
    /// Set the filter directives
    #[must_use]
    pub fn log_filter(mut self, filter: impl Into<String>) -> Self {
        self.log_filter = Some(filter.into());
        self
    }

    /// Enable or disable ANSI colors
    #[must_use]
    pub fn ansi(mut self, ansi: bool) -> Self {
        self.ansi = Some(ansi);
        self
    }

    /// Build the `TelemetryConfig`
    #[must_use]
    pub fn build(self) -> TelemetryConfig {
        let default = TelemetryConfig::default();
        TelemetryConfig {
            log_filter: self.log_filter.unwrap_or(default.log_filter),
            ansi: self.ansi.unwrap_or(default.ansi),
        }
    }
}

/// Install a global fmt subscriber filtered by `config.log_filter`.
///
/// # Errors
///
/// Returns `TelemetryError::InvalidFilter` if the directives do not parse.
/// Returns `TelemetryError::InitFailed` if a global subscriber is already set.
pub fn init_tracing(config: TelemetryConfig) -> Result<()> {
    let filter = config.env_filter()?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(config.ansi)
        .try_init()
        .map_err(|e| TelemetryError::InitFailed {
            reason: e.to_string(),
        })?;

    tracing::debug!(filter = %config.log_filter, "tracing initialized");
    Ok(())
}
