//! `SimIndexedTableClient` - In-Memory Indexed Document-Table Engine
//!
//! `TigerStyle`: Deterministic testing with fault injection.
//!
//! A new secondary index stays in the building state until someone waits
//! on it. Real engines finish on their own schedule; here the schedule is
//! "never, unless asked", so a reader that skips the wait always fails.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use serde_json::Value;

use super::{Conflict, IndexedTableClient, InsertSummary};
use crate::dst::{FaultInjector, SimConfig, SimFaults};
use crate::storage::{ClientError, ClientResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IndexState {
    Building,
    Ready,
}

#[derive(Debug)]
struct Table {
    primary_key: String,
    documents: BTreeMap<String, Value>,
    indexes: HashMap<String, IndexState>,
}

#[derive(Debug, Default)]
struct Db {
    tables: HashMap<String, Table>,
    batches: Vec<(String, usize)>,
}

impl Db {
    fn table(&self, name: &str) -> ClientResult<&Table> {
        self.tables
            .get(name)
            .ok_or_else(|| ClientError::rejected(format!("table {name} does not exist")))
    }

    fn table_mut(&mut self, name: &str) -> ClientResult<&mut Table> {
        self.tables
            .get_mut(name)
            .ok_or_else(|| ClientError::rejected(format!("table {name} does not exist")))
    }
}

/// In-memory indexed document-table engine for testing.
#[derive(Debug, Clone)]
pub struct SimIndexedTableClient {
    db: Arc<RwLock<Db>>,
    faults: SimFaults,
}

impl SimIndexedTableClient {
    /// Create an empty database with no faults.
    #[must_use]
    pub fn new(config: SimConfig) -> Self {
        Self {
            db: Arc::new(RwLock::new(Db::default())),
            faults: SimFaults::none(config),
        }
    }

    /// Create an empty database sharing a simulation's fault injector.
    #[must_use]
    pub fn with_fault_injector(config: SimConfig, injector: Arc<FaultInjector>) -> Self {
        Self {
            db: Arc::new(RwLock::new(Db::default())),
            faults: SimFaults::shared(config, injector),
        }
    }

    /// `(table, document count)` of every insert call so far (for testing).
    #[must_use]
    pub fn insert_batches(&self) -> Vec<(String, usize)> {
        self.db.read().unwrap().batches.clone()
    }

    /// True if `index` on `table` exists and is ready (for testing).
    #[must_use]
    pub fn index_ready(&self, table: &str, index: &str) -> bool {
        self.db
            .read()
            .unwrap()
            .tables
            .get(table)
            .and_then(|t| t.indexes.get(index))
            == Some(&IndexState::Ready)
    }
}

fn primary_key_of(document: &Value, field: &str) -> ClientResult<String> {
    match document.get(field) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        _ => Err(ClientError::rejected(format!(
            "document is missing primary key {field}"
        ))),
    }
}

#[async_trait]
impl IndexedTableClient for SimIndexedTableClient {
    async fn table_drop(&self, table: &str) -> ClientResult<()> {
        self.faults.check("it_table_drop").await?;
        match self.db.write().unwrap().tables.remove(table) {
            Some(_) => Ok(()),
            None => Err(ClientError::not_found(format!("table {table}"))),
        }
    }

    async fn table_create(&self, table: &str, primary_key: &str) -> ClientResult<()> {
        self.faults.check("it_table_create").await?;
        let mut db = self.db.write().unwrap();
        if db.tables.contains_key(table) {
            return Err(ClientError::rejected(format!("table {table} already exists")));
        }
        db.tables.insert(
            table.to_string(),
            Table {
                primary_key: primary_key.to_string(),
                documents: BTreeMap::new(),
                indexes: HashMap::new(),
            },
        );
        Ok(())
    }

    async fn index_create(&self, table: &str, index: &str) -> ClientResult<()> {
        self.faults.check("it_index_create").await?;
        let mut db = self.db.write().unwrap();
        let t = db.table_mut(table)?;
        if t.indexes.contains_key(index) {
            return Err(ClientError::rejected(format!("index {index} already exists")));
        }
        t.indexes.insert(index.to_string(), IndexState::Building);
        Ok(())
    }

    async fn index_wait(&self, table: &str, index: &str) -> ClientResult<()> {
        self.faults.check("it_index_wait").await?;
        let mut db = self.db.write().unwrap();
        let t = db.table_mut(table)?;
        match t.indexes.get_mut(index) {
            Some(state) => {
                *state = IndexState::Ready;
                Ok(())
            }
            None => Err(ClientError::rejected(format!("index {index} does not exist"))),
        }
    }

    async fn insert(
        &self,
        table: &str,
        documents: Vec<Value>,
        conflict: Conflict,
    ) -> ClientResult<InsertSummary> {
        self.faults.check("it_insert").await?;
        let mut db = self.db.write().unwrap();
        let count = documents.len();
        let t = db.table_mut(table)?;

        let mut summary = InsertSummary::default();
        for document in documents {
            if !document.is_object() {
                return Err(ClientError::Codec("document must be an object".into()));
            }
            let pk = primary_key_of(&document, &t.primary_key)?;
            let existed = t.documents.contains_key(&pk);
            if existed && conflict == Conflict::Error {
                return Err(ClientError::rejected(format!("duplicate primary key {pk}")));
            }
            t.documents.insert(pk, document);
            if existed {
                summary.replaced += 1;
            } else {
                summary.inserted += 1;
            }
        }

        db.batches.push((table.to_string(), count));
        Ok(summary)
    }

    async fn get_all(&self, table: &str, key: &str, index: &str) -> ClientResult<Vec<Value>> {
        self.faults.check("it_get_all").await?;
        let db = self.db.read().unwrap();
        let t = db.table(table)?;
        match t.indexes.get(index) {
            Some(IndexState::Ready) => {}
            Some(IndexState::Building) => {
                return Err(ClientError::IndexNotReady {
                    table: table.to_string(),
                    index: index.to_string(),
                })
            }
            None => return Err(ClientError::rejected(format!("index {index} does not exist"))),
        }

        Ok(t.documents
            .values()
            .filter(|doc| doc.get(index).and_then(Value::as_str) == Some(key))
            .cloned()
            .collect())
    }

    async fn scan(&self, table: &str) -> ClientResult<Vec<Value>> {
        self.faults.check("it_scan").await?;
        let db = self.db.read().unwrap();
        Ok(db.table(table)?.documents.values().cloned().collect())
    }
}
