//! `SimKvClient` - In-Memory Key-Value Engine
//!
//! `TigerStyle`: Deterministic testing with fault injection.
//!
//! Behaves like a single Redis logical database: string values, glob
//! `SCAN MATCH`, multi-key `DEL`.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use super::{glob_match, KvClient};
use crate::dst::{FaultInjector, SimConfig, SimFaults};
use crate::storage::ClientResult;

/// In-memory key-value engine for testing.
#[derive(Debug, Clone)]
pub struct SimKvClient {
    data: Arc<RwLock<BTreeMap<String, String>>>,
    faults: SimFaults,
}

impl SimKvClient {
    /// Create an empty engine with no faults.
    #[must_use]
    pub fn new(config: SimConfig) -> Self {
        Self {
            data: Arc::new(RwLock::new(BTreeMap::new())),
            faults: SimFaults::none(config),
        }
    }

    /// Create an empty engine sharing a simulation's fault injector.
    #[must_use]
    pub fn with_fault_injector(config: SimConfig, injector: Arc<FaultInjector>) -> Self {
        Self {
            data: Arc::new(RwLock::new(BTreeMap::new())),
            faults: SimFaults::shared(config, injector),
        }
    }

    /// Number of stored keys (for testing).
    #[must_use]
    pub fn key_count(&self) -> usize {
        self.data.read().unwrap().len()
    }
}

#[async_trait]
impl KvClient for SimKvClient {
    async fn get(&self, key: &str) -> ClientResult<Option<String>> {
        self.faults.check("kv_get").await?;
        Ok(self.data.read().unwrap().get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> ClientResult<()> {
        self.faults.check("kv_set").await?;

        // Precondition
        assert!(!key.is_empty(), "key must not be empty");

        self.data
            .write()
            .unwrap()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn scan_match(&self, pattern: &str) -> ClientResult<Vec<String>> {
        self.faults.check("kv_scan").await?;
        Ok(self
            .data
            .read()
            .unwrap()
            .keys()
            .filter(|k| glob_match(pattern, k))
            .cloned()
            .collect())
    }

    async fn delete(&self, keys: &[String]) -> ClientResult<u64> {
        self.faults.check("kv_delete").await?;
        let mut data = self.data.write().unwrap();
        Ok(keys.iter().filter(|k| data.remove(*k).is_some()).count() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dst::{DeterministicRng, FaultConfig, FaultInjectorBuilder, FaultType};
    use crate::storage::ClientError;

    #[tokio::test]
    async fn test_set_get_overwrite() {
        let kv = SimKvClient::new(SimConfig::with_seed(42));

        kv.set("USA_2000-01", "a").await.unwrap();
        kv.set("USA_2000-01", "b").await.unwrap();

        assert_eq!(kv.get("USA_2000-01").await.unwrap().as_deref(), Some("b"));
        assert_eq!(kv.key_count(), 1);
    }

    #[tokio::test]
    async fn test_scan_and_delete() {
        let kv = SimKvClient::new(SimConfig::with_seed(42));
        kv.set("USA_2000-01", "1").await.unwrap();
        kv.set("SWE_2000-01", "1").await.unwrap();
        kv.set("countries", "[]").await.unwrap();

        let keys = kv.scan_match("*_*").await.unwrap();
        assert_eq!(keys, vec!["SWE_2000-01".to_string(), "USA_2000-01".to_string()]);

        let removed = kv
            .delete(&["USA_2000-01".to_string(), "missing".to_string()])
            .await
            .unwrap();
        assert_eq!(removed, 1);
        assert_eq!(kv.key_count(), 2);
    }

    #[tokio::test]
    async fn test_fault_injection_on_set() {
        let injector = FaultInjectorBuilder::new(DeterministicRng::new(42))
            .with_fault(FaultConfig::new(FaultType::WriteRejected, 1.0).with_filter("kv_set"))
            .build();
        let kv = SimKvClient::with_fault_injector(SimConfig::with_seed(42), Arc::new(injector));

        assert!(matches!(
            kv.set("k_v", "v").await,
            Err(ClientError::Rejected(_))
        ));
        // Reads are unaffected.
        assert!(kv.get("k_v").await.unwrap().is_none());
    }
}
