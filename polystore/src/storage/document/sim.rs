//! `SimDocumentClient` - In-Memory Document Engine
//!
//! `TigerStyle`: Deterministic testing with fault injection.
//!
//! Collections are created implicitly on first insert, as in MongoDB.
//! Dropping a collection that does not exist reports `NotFound`.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use serde_json::Value;

use super::{DocumentClient, DocumentFilter, DOCUMENT_ID_FIELD};
use crate::dst::{FaultInjector, SimConfig, SimFaults};
use crate::storage::{ClientError, ClientResult};

type Collection = BTreeMap<String, Value>;

#[derive(Debug, Default)]
struct Collections {
    by_name: HashMap<String, Collection>,
    next_object_id: u64,
}

/// In-memory document engine for testing.
#[derive(Debug, Clone)]
pub struct SimDocumentClient {
    state: Arc<RwLock<Collections>>,
    faults: SimFaults,
}

impl SimDocumentClient {
    /// Create an empty engine with no faults.
    #[must_use]
    pub fn new(config: SimConfig) -> Self {
        Self {
            state: Arc::new(RwLock::new(Collections::default())),
            faults: SimFaults::none(config),
        }
    }

    /// Create an empty engine sharing a simulation's fault injector.
    #[must_use]
    pub fn with_fault_injector(config: SimConfig, injector: Arc<FaultInjector>) -> Self {
        Self {
            state: Arc::new(RwLock::new(Collections::default())),
            faults: SimFaults::shared(config, injector),
        }
    }

    /// Names of existing collections, sorted (for testing).
    #[must_use]
    pub fn collection_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.state.read().unwrap().by_name.keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of documents in `collection` (for testing).
    #[must_use]
    pub fn document_count(&self, collection: &str) -> usize {
        self.state
            .read()
            .unwrap()
            .by_name
            .get(collection)
            .map_or(0, BTreeMap::len)
    }
}

/// Object ids are zero-padded so `_id` order equals insertion order.
fn assign_id(state: &mut Collections, document: &mut Value) -> ClientResult<String> {
    let Some(object) = document.as_object_mut() else {
        return Err(ClientError::Codec("document must be an object".into()));
    };

    match object.get(DOCUMENT_ID_FIELD) {
        Some(Value::String(id)) => Ok(id.clone()),
        Some(other) => Ok(other.to_string()),
        None => {
            state.next_object_id += 1;
            let id = format!("{:024x}", state.next_object_id);
            object.insert(DOCUMENT_ID_FIELD.to_string(), Value::String(id.clone()));
            Ok(id)
        }
    }
}

#[async_trait]
impl DocumentClient for SimDocumentClient {
    async fn drop_collection(&self, collection: &str) -> ClientResult<()> {
        self.faults.check("doc_drop").await?;
        match self.state.write().unwrap().by_name.remove(collection) {
            Some(_) => Ok(()),
            None => Err(ClientError::not_found(format!("ns {collection}"))),
        }
    }

    async fn insert_one(&self, collection: &str, mut document: Value) -> ClientResult<()> {
        self.faults.check("doc_insert").await?;
        let mut state = self.state.write().unwrap();
        let id = assign_id(&mut state, &mut document)?;

        let docs = state.by_name.entry(collection.to_string()).or_default();
        if docs.contains_key(&id) {
            return Err(ClientError::rejected(format!(
                "E11000 duplicate key in {collection}: {id}"
            )));
        }
        docs.insert(id, document);
        Ok(())
    }

    async fn upsert(&self, collection: &str, id: &str, mut document: Value) -> ClientResult<()> {
        self.faults.check("doc_upsert").await?;
        let Some(object) = document.as_object_mut() else {
            return Err(ClientError::Codec("document must be an object".into()));
        };
        object.insert(DOCUMENT_ID_FIELD.to_string(), Value::String(id.to_string()));

        self.state
            .write()
            .unwrap()
            .by_name
            .entry(collection.to_string())
            .or_default()
            .insert(id.to_string(), document);
        Ok(())
    }

    async fn find(&self, collection: &str, filter: &DocumentFilter) -> ClientResult<Vec<Value>> {
        self.faults.check("doc_find").await?;
        let state = self.state.read().unwrap();
        Ok(state
            .by_name
            .get(collection)
            .map(|docs| docs.values().filter(|d| filter.matches(d)).cloned().collect())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_insert_assigns_ids_and_rejects_duplicates() {
        let db = SimDocumentClient::new(SimConfig::with_seed(42));

        db.insert_one("c", json!({"country": "USA"})).await.unwrap();
        db.insert_one("c", json!({"_id": "SWE", "country": "SWE"}))
            .await
            .unwrap();
        let err = db
            .insert_one("c", json!({"_id": "SWE", "country": "SWE"}))
            .await
            .unwrap_err();

        assert!(matches!(err, ClientError::Rejected(_)));
        assert_eq!(db.document_count("c"), 2);
    }

    #[tokio::test]
    async fn test_upsert_replaces() {
        let db = SimDocumentClient::new(SimConfig::with_seed(42));

        db.upsert("d", "USA_2000-01", json!({"value": "1"})).await.unwrap();
        db.upsert("d", "USA_2000-01", json!({"value": "2"})).await.unwrap();

        let docs = db.find("d", &DocumentFilter::All).await.unwrap();
        assert_eq!(docs, vec![json!({"_id": "USA_2000-01", "value": "2"})]);
    }

    #[tokio::test]
    async fn test_drop_missing_collection_is_not_found() {
        let db = SimDocumentClient::new(SimConfig::with_seed(42));
        let err = db.drop_collection("countries").await.unwrap_err();
        assert!(err.is_not_found());

        db.insert_one("countries", json!({})).await.unwrap();
        db.drop_collection("countries").await.unwrap();
        assert!(db.collection_names().is_empty());
    }

    #[tokio::test]
    async fn test_find_on_missing_collection_is_empty() {
        let db = SimDocumentClient::new(SimConfig::with_seed(42));
        assert!(db
            .find("datapoints", &DocumentFilter::field_eq("country", "USA"))
            .await
            .unwrap()
            .is_empty());
    }
}
