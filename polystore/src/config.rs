//! Polystore Configuration
//!
//! `TigerStyle`: Sensible defaults, builder pattern, explicit over implicit.
//!
//! Connection strings are not configured here: each adapter receives an
//! already-connected client.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::constants::{
    CALL_TIMEOUT_MS_DEFAULT, CALL_TIMEOUT_MS_MAX, INSERT_BATCH_COUNT_DEFAULT,
    INSERT_BATCH_COUNT_MAX, KEYSPACE_NAME_DEFAULT, REPLICATION_FACTOR_DEFAULT,
    REPLICATION_FACTOR_MAX, SOURCE_PATH_DEFAULT,
};

/// Environment variable overriding [`PolystoreConfig::source_path`].
pub const ENV_SOURCE_PATH: &str = "POLYSTORE_SOURCE_PATH";
/// Environment variable overriding [`PolystoreConfig::call_timeout`].
pub const ENV_CALL_TIMEOUT_MS: &str = "POLYSTORE_CALL_TIMEOUT_MS";
/// Environment variable overriding [`PolystoreConfig::insert_batch_size`].
pub const ENV_INSERT_BATCH_SIZE: &str = "POLYSTORE_INSERT_BATCH_SIZE";
/// Environment variable overriding [`PolystoreConfig::keyspace`].
pub const ENV_KEYSPACE: &str = "POLYSTORE_KEYSPACE";
/// Environment variable overriding [`PolystoreConfig::replication_factor`].
pub const ENV_REPLICATION_FACTOR: &str = "POLYSTORE_REPLICATION_FACTOR";

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// Environment variable is not a valid number
    #[error("{var} must be an unsigned integer, got {value:?}")]
    NotANumber {
        /// Variable name
        var: &'static str,
        /// Raw value
        value: String,
    },

    /// Value is outside its allowed range
    #[error("{field} must be in [{min}, {max}], got {value}")]
    OutOfRange {
        /// Field name
        field: &'static str,
        /// Provided value
        value: u64,
        /// Minimum allowed
        min: u64,
        /// Maximum allowed
        max: u64,
    },

    /// Keyspace is empty or not a plain identifier
    #[error("invalid keyspace name: {0:?}")]
    InvalidKeyspace(String),
}

// =============================================================================
// PolystoreConfig
// =============================================================================

/// Settings shared by the facade and the adapters.
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use polystore::PolystoreConfig;
///
/// let config = PolystoreConfig::default()
///     .with_source_path("/tmp/industrial_production.csv")
///     .with_call_timeout(Duration::from_secs(2));
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolystoreConfig {
    /// CSV file every load streams from.
    ///
    /// Default: `/app/data/industrial_production.csv`
    pub source_path: PathBuf,

    /// Timeout applied to every individual backend call.
    ///
    /// Default: 5 seconds
    pub call_timeout: Duration,

    /// Documents per insert batch on the indexed document-table backend.
    ///
    /// Default: 200
    pub insert_batch_size: usize,

    /// Keyspace owned by the wide-column backend.
    ///
    /// Default: `industrial_production`
    pub keyspace: String,

    /// Wide-column `SimpleStrategy` replication factor.
    ///
    /// Default: 1
    pub replication_factor: u32,
}

impl Default for PolystoreConfig {
    fn default() -> Self {
        Self {
            source_path: PathBuf::from(SOURCE_PATH_DEFAULT),
            call_timeout: Duration::from_millis(CALL_TIMEOUT_MS_DEFAULT),
            insert_batch_size: INSERT_BATCH_COUNT_DEFAULT,
            keyspace: KEYSPACE_NAME_DEFAULT.to_string(),
            replication_factor: REPLICATION_FACTOR_DEFAULT,
        }
    }
}

impl PolystoreConfig {
    /// Create a new config with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults overridden by `POLYSTORE_*` environment variables.
    ///
    /// # Errors
    /// Returns `ConfigError` if a variable is present but invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| env::var(var).ok())
    }

    /// Defaults overridden through an arbitrary variable lookup.
    ///
    /// # Errors
    /// Returns `ConfigError` if a variable is present but invalid.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&'static str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(path) = lookup(ENV_SOURCE_PATH) {
            config.source_path = PathBuf::from(path);
        }
        if let Some(ms) = parse_var(&lookup, ENV_CALL_TIMEOUT_MS)? {
            config.call_timeout = Duration::from_millis(ms);
        }
        if let Some(size) = parse_var(&lookup, ENV_INSERT_BATCH_SIZE)? {
            config.insert_batch_size = usize::try_from(size).unwrap_or(usize::MAX);
        }
        if let Some(keyspace) = lookup(ENV_KEYSPACE) {
            config.keyspace = keyspace;
        }
        if let Some(factor) = parse_var(&lookup, ENV_REPLICATION_FACTOR)? {
            config.replication_factor = u32::try_from(factor).unwrap_or(u32::MAX);
        }

        config.validate()?;
        Ok(config)
    }

    /// Check every field against its limits.
    ///
    /// # Errors
    /// Returns the first violated limit.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let timeout_ms = u64::try_from(self.call_timeout.as_millis()).unwrap_or(u64::MAX);
        check_range("call_timeout_ms", timeout_ms, 1, CALL_TIMEOUT_MS_MAX)?;
        check_range(
            "insert_batch_size",
            self.insert_batch_size as u64,
            1,
            INSERT_BATCH_COUNT_MAX as u64,
        )?;
        check_range(
            "replication_factor",
            u64::from(self.replication_factor),
            1,
            u64::from(REPLICATION_FACTOR_MAX),
        )?;

        // Keyspace names are interpolated into DDL.
        let valid_keyspace = !self.keyspace.is_empty()
            && self
                .keyspace
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_');
        if !valid_keyspace {
            return Err(ConfigError::InvalidKeyspace(self.keyspace.clone()));
        }

        Ok(())
    }

    /// Set the CSV source path.
    #[must_use]
    pub fn with_source_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.source_path = path.into();
        self
    }

    /// Set the per-call timeout.
    #[must_use]
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    /// Set the indexed-table insert batch size.
    #[must_use]
    pub fn with_insert_batch_size(mut self, size: usize) -> Self {
        self.insert_batch_size = size;
        self
    }

    /// Set the wide-column keyspace.
    #[must_use]
    pub fn with_keyspace(mut self, keyspace: impl Into<String>) -> Self {
        self.keyspace = keyspace.into();
        self
    }

    /// Set the wide-column replication factor.
    #[must_use]
    pub fn with_replication_factor(mut self, factor: u32) -> Self {
        self.replication_factor = factor;
        self
    }
}

fn parse_var<F>(lookup: &F, var: &'static str) -> Result<Option<u64>, ConfigError>
where
    F: Fn(&'static str) -> Option<String>,
{
    lookup(var)
        .map(|value| {
            value
                .trim()
                .parse::<u64>()
                .map_err(|_| ConfigError::NotANumber { var, value })
        })
        .transpose()
}

fn check_range(field: &'static str, value: u64, min: u64, max: u64) -> Result<(), ConfigError> {
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            field,
            value,
            min,
            max,
        })
    }
}

// =============================================================================
// Tests
// =============================================================================
