//! `SimWideColumnClient` - In-Memory Wide-Column Engine
//!
//! `TigerStyle`: Deterministic testing with fault injection.
//!
//! Enforces what a real cluster enforces for this workload:
//! - DDL order: keyspace before table, table before index or insert
//! - Column types on insert
//!
//! An insert replaces the whole row, so a column left out of it reads back
//! as null.
//! - Filters only on the primary key or an indexed column

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use super::{CqlRow, CqlValue, Replication, TableSchema, WideColumnClient};
use crate::dst::{FaultInjector, SimConfig, SimFaults};
use crate::storage::{ClientError, ClientResult};

#[derive(Debug)]
struct Table {
    schema: TableSchema,
    rows: BTreeMap<String, CqlRow>,
    indexed: BTreeSet<String>,
}

#[derive(Debug)]
struct Keyspace {
    replication: Replication,
    tables: HashMap<String, Table>,
}

/// In-memory wide-column engine for testing.
#[derive(Debug, Clone)]
pub struct SimWideColumnClient {
    keyspaces: Arc<RwLock<HashMap<String, Keyspace>>>,
    faults: SimFaults,
}

impl SimWideColumnClient {
    /// Create an empty cluster with no faults.
    #[must_use]
    pub fn new(config: SimConfig) -> Self {
        Self {
            keyspaces: Arc::new(RwLock::new(HashMap::new())),
            faults: SimFaults::none(config),
        }
    }

    /// Create an empty cluster sharing a simulation's fault injector.
    #[must_use]
    pub fn with_fault_injector(config: SimConfig, injector: Arc<FaultInjector>) -> Self {
        Self {
            keyspaces: Arc::new(RwLock::new(HashMap::new())),
            faults: SimFaults::shared(config, injector),
        }
    }

    /// Replication of `keyspace`, if it exists (for testing).
    #[must_use]
    pub fn replication(&self, keyspace: &str) -> Option<Replication> {
        self.keyspaces
            .read()
            .unwrap()
            .get(keyspace)
            .map(|ks| ks.replication)
    }

    /// Row count of a table, 0 if absent (for testing).
    #[must_use]
    pub fn row_count(&self, keyspace: &str, table: &str) -> usize {
        self.keyspaces
            .read()
            .unwrap()
            .get(keyspace)
            .and_then(|ks| ks.tables.get(table))
            .map_or(0, |t| t.rows.len())
    }
}

fn keyspace_mut<'a>(
    keyspaces: &'a mut HashMap<String, Keyspace>,
    name: &str,
) -> ClientResult<&'a mut Keyspace> {
    keyspaces
        .get_mut(name)
        .ok_or_else(|| ClientError::rejected(format!("keyspace {name} does not exist")))
}

fn table_mut<'a>(
    keyspaces: &'a mut HashMap<String, Keyspace>,
    keyspace: &str,
    table: &str,
) -> ClientResult<&'a mut Table> {
    keyspace_mut(keyspaces, keyspace)?
        .tables
        .get_mut(table)
        .ok_or_else(|| ClientError::rejected(format!("unconfigured table {keyspace}.{table}")))
}

#[async_trait]
impl WideColumnClient for SimWideColumnClient {
    async fn drop_keyspace(&self, keyspace: &str) -> ClientResult<()> {
        self.faults.check("wc_drop_keyspace").await?;
        match self.keyspaces.write().unwrap().remove(keyspace) {
            Some(_) => Ok(()),
            None => Err(ClientError::not_found(format!("keyspace {keyspace}"))),
        }
    }

    async fn create_keyspace(&self, keyspace: &str, replication: Replication) -> ClientResult<()> {
        self.faults.check("wc_create_keyspace").await?;
        let mut keyspaces = self.keyspaces.write().unwrap();
        if keyspaces.contains_key(keyspace) {
            return Err(ClientError::rejected(format!("keyspace {keyspace} already exists")));
        }
        keyspaces.insert(
            keyspace.to_string(),
            Keyspace {
                replication,
                tables: HashMap::new(),
            },
        );
        Ok(())
    }

    async fn create_table(&self, keyspace: &str, schema: &TableSchema) -> ClientResult<()> {
        self.faults.check("wc_create_table").await?;
        let mut keyspaces = self.keyspaces.write().unwrap();
        let ks = keyspace_mut(&mut keyspaces, keyspace)?;
        if ks.tables.contains_key(&schema.name) {
            return Err(ClientError::rejected(format!(
                "table {keyspace}.{} already exists",
                schema.name
            )));
        }
        ks.tables.insert(
            schema.name.clone(),
            Table {
                schema: schema.clone(),
                rows: BTreeMap::new(),
                indexed: BTreeSet::new(),
            },
        );
        Ok(())
    }

    async fn create_index(&self, keyspace: &str, table: &str, column: &str) -> ClientResult<()> {
        self.faults.check("wc_create_index").await?;
        let mut keyspaces = self.keyspaces.write().unwrap();
        let t = table_mut(&mut keyspaces, keyspace, table)?;
        if t.schema.column_type(column).is_none() {
            return Err(ClientError::rejected(format!("no column {column} in {table}")));
        }
        t.indexed.insert(column.to_string());
        Ok(())
    }

    async fn insert(&self, keyspace: &str, table: &str, row: CqlRow) -> ClientResult<()> {
        self.faults.check("wc_insert").await?;
        let mut keyspaces = self.keyspaces.write().unwrap();
        let t = table_mut(&mut keyspaces, keyspace, table)?;

        for (column, value) in &row {
            match t.schema.column_type(column) {
                Some(expected) if expected == value.cql_type() => {}
                Some(expected) => {
                    return Err(ClientError::rejected(format!(
                        "column {column} expects {expected:?}, got {:?}",
                        value.cql_type()
                    )))
                }
                None => return Err(ClientError::rejected(format!("unknown column {column}"))),
            }
        }
        let Some(CqlValue::Text(pk)) = row.get(&t.schema.primary_key) else {
            return Err(ClientError::rejected(format!(
                "missing primary key {}",
                t.schema.primary_key
            )));
        };

        t.rows.insert(pk.clone(), row.clone());
        Ok(())
    }

    async fn select(
        &self,
        keyspace: &str,
        table: &str,
        filter: Option<(&str, &CqlValue)>,
    ) -> ClientResult<Vec<CqlRow>> {
        self.faults.check("wc_select").await?;
        let mut keyspaces = self.keyspaces.write().unwrap();
        let t = table_mut(&mut keyspaces, keyspace, table)?;

        let Some((column, value)) = filter else {
            return Ok(t.rows.values().cloned().collect());
        };
        if column != t.schema.primary_key && !t.indexed.contains(column) {
            return Err(ClientError::rejected(format!(
                "cannot filter on {column} without ALLOW FILTERING"
            )));
        }
        Ok(t
            .rows
            .values()
            .filter(|row| row.get(column) == Some(value))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::wide_column::{CqlType, Decimal};

    fn text(s: &str) -> CqlValue {
        CqlValue::Text(s.to_string())
    }

    fn decimal(s: &str) -> CqlValue {
        CqlValue::Decimal(Decimal::parse(s).unwrap())
    }

    async fn cluster_with_table() -> SimWideColumnClient {
        let db = SimWideColumnClient::new(SimConfig::with_seed(42));
        db.create_keyspace("ks", Replication::simple(1)).await.unwrap();
        db.create_table(
            "ks",
            &TableSchema::new("t", "id")
                .column("country", CqlType::Text)
                .column("value", CqlType::Decimal),
        )
        .await
        .unwrap();
        db
    }

    #[tokio::test]
    async fn test_ddl_order_is_enforced() {
        let db = SimWideColumnClient::new(SimConfig::with_seed(42));
        let err = db
            .create_table("ks", &TableSchema::new("t", "id"))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Rejected(_)));

        let err = db.drop_keyspace("ks").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_insert_checks_types_and_primary_key() {
        let db = cluster_with_table().await;

        let bad_type = CqlRow::from([
            ("id".to_string(), text("a")),
            ("value".to_string(), text("1.0")),
        ]);
        assert!(db.insert("ks", "t", bad_type).await.is_err());

        let no_pk = CqlRow::from([("value".to_string(), decimal("1.0"))]);
        assert!(db.insert("ks", "t", no_pk).await.is_err());

        let ok = CqlRow::from([
            ("id".to_string(), text("a")),
            ("value".to_string(), decimal("1.0")),
        ]);
        db.insert("ks", "t", ok).await.unwrap();
        assert_eq!(db.row_count("ks", "t"), 1);
    }

    #[tokio::test]
    async fn test_insert_without_column_overwrites_it_with_null() {
        let db = cluster_with_table().await;
        let full = CqlRow::from([
            ("id".to_string(), text("a")),
            ("value".to_string(), decimal("50.040")),
        ]);
        db.insert("ks", "t", full).await.unwrap();
        db.insert("ks", "t", CqlRow::from([("id".to_string(), text("a"))]))
            .await
            .unwrap();

        let rows = db.select("ks", "t", None).await.unwrap();
        assert_eq!(rows, vec![CqlRow::from([("id".to_string(), text("a"))])]);
    }

    #[tokio::test]
    async fn test_filter_requires_index() {
        let db = cluster_with_table().await;
        let row = CqlRow::from([
            ("id".to_string(), text("USA_2000-01")),
            ("country".to_string(), text("USA")),
        ]);
        db.insert("ks", "t", row).await.unwrap();

        let usa = text("USA");
        assert!(db.select("ks", "t", Some(("country", &usa))).await.is_err());

        db.create_index("ks", "t", "country").await.unwrap();
        let rows = db.select("ks", "t", Some(("country", &usa))).await.unwrap();
        assert_eq!(rows.len(), 1);

        let by_pk = text("USA_2000-01");
        assert_eq!(db.select("ks", "t", Some(("id", &by_pk))).await.unwrap().len(), 1);
    }
}
