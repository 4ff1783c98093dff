//! Key-Value Backend
//!
//! `TigerStyle`: Flat keys, no secondary index.
//!
//! # Layout
//!
//! ```text
//! USA_1966-01  -> {"country":"USA","time":"1966-01","value":"50.04211"}
//! USA_1966-02  -> {...}
//! countries    -> ["SWE","USA"]
//! ```
//!
//! Country-filtered reads have nothing to look up: they scan the whole
//! keyspace for the `USA_*` prefix and fetch each match.

mod sim;

#[cfg(feature = "redis")]
mod redis;

use async_trait::async_trait;

use super::adapter::{stream_datapoints, BackendKind, CallPolicy, LoadReport, StorageAdapter};
use super::error::{ClientResult, Phase, StorageError, StorageResult};
use crate::config::PolystoreConfig;
use crate::constants::{COUNTRIES_KEY_NAME, DATAPOINT_KEY_SEPARATOR};
use crate::model::{country_key_prefix, CountrySet, Datapoint};
use crate::source::CsvSource;

pub use sim::SimKvClient;

#[cfg(feature = "redis")]
pub use self::redis::RedisKvClient;

// =============================================================================
// KvClient
// =============================================================================

/// Native operations of a key-value engine.
#[async_trait]
pub trait KvClient: Send + Sync {
    /// Get the value under `key`.
    async fn get(&self, key: &str) -> ClientResult<Option<String>>;

    /// Set `key` to `value`, overwriting.
    async fn set(&self, key: &str, value: &str) -> ClientResult<()>;

    /// Enumerate every key matching a glob `pattern` (`*` wildcard only).
    async fn scan_match(&self, pattern: &str) -> ClientResult<Vec<String>>;

    /// Delete `keys`, returning how many existed.
    async fn delete(&self, keys: &[String]) -> ClientResult<u64>;
}

// =============================================================================
// KeyValueAdapter
// =============================================================================

/// Adapter storing datapoints as serialized values under `country_time` keys.
pub struct KeyValueAdapter<C: KvClient> {
    client: C,
    policy: CallPolicy,
}

impl<C: KvClient> KeyValueAdapter<C> {
    /// Wrap a connected client.
    #[must_use]
    pub fn new(client: C, config: &PolystoreConfig) -> Self {
        Self {
            client,
            policy: CallPolicy::from_config(BackendKind::KeyValue, config),
        }
    }

    /// The underlying client.
    #[must_use]
    pub fn client(&self) -> &C {
        &self.client
    }

    /// Delete every datapoint key and the country list.
    async fn reset(&self) -> StorageResult<()> {
        let pattern = format!("*{DATAPOINT_KEY_SEPARATOR}*");
        let mut keys = self
            .policy
            .call(Phase::Reset, "kv_scan", self.client.scan_match(&pattern))
            .await?;
        keys.push(COUNTRIES_KEY_NAME.to_string());

        let removed = self
            .policy
            .call(Phase::Reset, "kv_delete", self.client.delete(&keys))
            .await?;
        tracing::debug!(backend = self.policy.backend(), removed, "cleared keyspace");
        Ok(())
    }
}

#[async_trait]
impl<C: KvClient> StorageAdapter for KeyValueAdapter<C> {
    fn kind(&self) -> BackendKind {
        BackendKind::KeyValue
    }

    #[tracing::instrument(skip(self, source), fields(backend = self.policy.backend()))]
    async fn load(&self, source: &CsvSource) -> StorageResult<LoadReport> {
        let datapoints = stream_datapoints(source)?;
        self.reset().await?;

        let mut countries = CountrySet::new();
        let mut written = 0u64;
        for datapoint in datapoints {
            let datapoint = datapoint?;
            let payload = serde_json::to_string(&datapoint)
                .map_err(|e| StorageError::write(self.policy.backend(), e.to_string()))?;

            self.policy
                .call(
                    Phase::Write,
                    "kv_set",
                    self.client.set(&datapoint.key(), &payload),
                )
                .await?;
            countries.observe(&datapoint);
            written += 1;
        }

        let payload = serde_json::to_string(&countries.to_vec())
            .map_err(|e| StorageError::write(self.policy.backend(), e.to_string()))?;
        self.policy
            .call(
                Phase::Write,
                "kv_set",
                self.client.set(COUNTRIES_KEY_NAME, &payload),
            )
            .await?;

        tracing::info!(written, countries = countries.len(), "load complete");
        Ok(LoadReport {
            datapoints_written: written,
            countries: countries.len(),
        })
    }

    #[tracing::instrument(skip(self), fields(backend = self.policy.backend()))]
    async fn query_countries(&self) -> StorageResult<Vec<String>> {
        let payload = self
            .policy
            .call(Phase::Query, "kv_get", self.client.get(COUNTRIES_KEY_NAME))
            .await?;

        match payload {
            Some(payload) => serde_json::from_str(&payload)
                .map_err(|e| StorageError::read(self.policy.backend(), e.to_string())),
            None => Ok(Vec::new()),
        }
    }

    #[tracing::instrument(skip(self), fields(backend = self.policy.backend()))]
    async fn query_data(&self, country: &str) -> StorageResult<Vec<Datapoint>> {
        let prefix = country_key_prefix(country);
        let keys = self
            .policy
            .call(
                Phase::Query,
                "kv_scan",
                self.client.scan_match(&format!("{}*", glob_escape(&prefix))),
            )
            .await?;

        let mut data = Vec::with_capacity(keys.len());
        for key in keys.into_iter().filter(|k| k.starts_with(&prefix)) {
            let payload = self
                .policy
                .call(Phase::Query, "kv_get", self.client.get(&key))
                .await?;
            // Deleted between scan and get.
            let Some(payload) = payload else { continue };

            let datapoint: Datapoint = serde_json::from_str(&payload).map_err(|e| {
                StorageError::read(self.policy.backend(), format!("{key}: {e}"))
            })?;
            // `A_B_2000-01` shares the `A_` prefix but belongs to `A_B`.
            if datapoint.country == country {
                data.push(datapoint);
            }
        }

        Ok(data)
    }
}

/// Escape glob metacharacters so a country code matches literally.
fn glob_escape(literal: &str) -> String {
    let mut escaped = String::with_capacity(literal.len());
    for c in literal.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Match `key` against a glob `pattern` with `*` wildcards and `\` escapes.
pub(crate) fn glob_match(pattern: &str, key: &str) -> bool {
    fn tokens(pattern: &str) -> Vec<Option<char>> {
        let mut out = Vec::new();
        let mut chars = pattern.chars();
        while let Some(c) = chars.next() {
            match c {
                '*' => out.push(None),
                '\\' => out.push(Some(chars.next().unwrap_or('\\'))),
                c => out.push(Some(c)),
            }
        }
        out
    }

    let pattern = tokens(pattern);
    let key: Vec<char> = key.chars().collect();

    // Classic two-pointer wildcard match with backtracking to the last star.
    let (mut p, mut k) = (0, 0);
    let mut star: Option<(usize, usize)> = None;
    while k < key.len() {
        match pattern.get(p) {
            Some(Some(c)) if *c == key[k] => {
                p += 1;
                k += 1;
            }
            Some(None) => {
                star = Some((p, k));
                p += 1;
            }
            _ => match star {
                Some((sp, sk)) => {
                    p = sp + 1;
                    k = sk + 1;
                    star = Some((sp, sk + 1));
                }
                None => return false,
            },
        }
    }
    pattern[p..].iter().all(Option::is_none)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dst::SimConfig;

    fn adapter() -> KeyValueAdapter<SimKvClient> {
        KeyValueAdapter::new(
            SimKvClient::new(SimConfig::with_seed(42)),
            &PolystoreConfig::default(),
        )
    }

    #[test]
    fn test_glob_match() {
        assert!(glob_match("*_*", "USA_1966-01"));
        assert!(!glob_match("*_*", "countries"));
        assert!(glob_match("USA_*", "USA_1966-01"));
        assert!(!glob_match("USA_*", "USAX_1966-01"));
        assert!(!glob_match("US_*", "USA_1966-01"));
        assert!(glob_match("a\\*b", "a*b"));
        assert!(!glob_match("a\\*b", "axb"));
        assert!(glob_match("*", ""));
    }

    #[test]
    fn test_glob_escape_roundtrips_literal() {
        let prefix = "W*RLD_";
        let pattern = format!("{}*", glob_escape(prefix));
        assert!(glob_match(&pattern, "W*RLD_2000-01"));
        assert!(!glob_match(&pattern, "WXRLD_2000-01"));
    }

    #[tokio::test]
    async fn test_query_before_any_load_is_empty() {
        let adapter = adapter();
        assert!(adapter.query_countries().await.unwrap().is_empty());
        assert!(adapter.query_data("USA").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_prefix_scan_does_not_leak_longer_codes() {
        let adapter = adapter();
        let client = adapter.client();
        for (key, dp) in [
            ("EA_2000-01", Datapoint::new("EA", "2000-01", "1")),
            ("EA19_2000-01", Datapoint::new("EA19", "2000-01", "2")),
        ] {
            client
                .set(key, &serde_json::to_string(&dp).unwrap())
                .await
                .unwrap();
        }

        let data = adapter.query_data("EA").await.unwrap();
        assert_eq!(data, vec![Datapoint::new("EA", "2000-01", "1")]);
    }

    #[tokio::test]
    async fn test_corrupt_payload_is_read_error() {
        let adapter = adapter();
        adapter.client().set("USA_2000-01", "{not json").await.unwrap();

        let err = adapter.query_data("USA").await.unwrap_err();
        assert!(matches!(err, StorageError::Read { .. }));
    }
}
