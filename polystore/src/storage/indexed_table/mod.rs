//! Indexed Document-Table Backend
//!
//! `TigerStyle`: Batched writes, explicit index readiness.
//!
//! ```text
//! countries   pk = country
//! datapoints  pk = id        secondary index: country
//! ```
//!
//! Secondary indexes build asynchronously after `index_create`. Reads
//! through an index wait for it first; the engine rejects index access
//! while the index is still building.

mod sim;

use async_trait::async_trait;
use serde_json::{json, Value};

use super::adapter::{stream_datapoints, BackendKind, CallPolicy, LoadReport, StorageAdapter};
use super::error::{ClientResult, Phase, StorageError, StorageResult};
use crate::config::{ConfigError, PolystoreConfig};
use crate::constants::{COUNTRIES_TABLE_NAME, COUNTRY_INDEX_NAME, DATAPOINTS_TABLE_NAME};
use crate::model::{CountrySet, Datapoint};
use crate::source::CsvSource;

pub use sim::SimIndexedTableClient;

/// Primary key of the datapoints table.
pub const DATAPOINT_PRIMARY_KEY: &str = "id";

/// Primary key of the countries table.
pub const COUNTRY_PRIMARY_KEY: &str = "country";

// =============================================================================
// IndexedTableClient
// =============================================================================

/// What an insert does when the primary key already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conflict {
    /// Reject the document
    Error,
    /// Replace the stored document
    Replace,
}

/// Outcome of one batch insert.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InsertSummary {
    /// New documents
    pub inserted: u64,
    /// Documents that replaced an existing one
    pub replaced: u64,
}

/// Native operations of an indexed document-table engine.
#[async_trait]
pub trait IndexedTableClient: Send + Sync {
    /// Drop a table. Returns `NotFound` if it does not exist.
    async fn table_drop(&self, table: &str) -> ClientResult<()>;

    /// Create a table with the given primary key field.
    async fn table_create(&self, table: &str, primary_key: &str) -> ClientResult<()>;

    /// Start building a secondary index over the field of the same name.
    async fn index_create(&self, table: &str, index: &str) -> ClientResult<()>;

    /// Block until `index` is ready.
    async fn index_wait(&self, table: &str, index: &str) -> ClientResult<()>;

    /// Insert a batch of documents.
    async fn insert(
        &self,
        table: &str,
        documents: Vec<Value>,
        conflict: Conflict,
    ) -> ClientResult<InsertSummary>;

    /// Documents whose `index` field equals `key`.
    ///
    /// Returns `IndexNotReady` if the index is still building.
    async fn get_all(&self, table: &str, key: &str, index: &str) -> ClientResult<Vec<Value>>;

    /// Every document of `table`.
    async fn scan(&self, table: &str) -> ClientResult<Vec<Value>>;
}

// =============================================================================
// IndexedTableAdapter
// =============================================================================

/// Adapter writing datapoints in fixed-size batches.
pub struct IndexedTableAdapter<C: IndexedTableClient> {
    client: C,
    policy: CallPolicy,
    batch_size: usize,
}

impl<C: IndexedTableClient> IndexedTableAdapter<C> {
    /// Wrap a connected client; batch size comes from `config`.
    ///
    /// # Errors
    /// Returns `ConfigError` if `config` fails validation.
    pub fn new(client: C, config: &PolystoreConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            client,
            policy: CallPolicy::from_config(BackendKind::IndexedTable, config),
            batch_size: config.insert_batch_size,
        })
    }

    /// The underlying client.
    #[must_use]
    pub fn client(&self) -> &C {
        &self.client
    }

    /// Documents per insert batch.
    #[must_use]
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    async fn reset(&self) -> StorageResult<()> {
        for table in [COUNTRIES_TABLE_NAME, DATAPOINTS_TABLE_NAME] {
            self.policy
                .drop_if_exists("it_table_drop", self.client.table_drop(table))
                .await?;
        }

        self.policy
            .call(
                Phase::Reset,
                "it_table_create",
                self.client.table_create(COUNTRIES_TABLE_NAME, COUNTRY_PRIMARY_KEY),
            )
            .await?;
        self.policy
            .call(
                Phase::Reset,
                "it_table_create",
                self.client.table_create(DATAPOINTS_TABLE_NAME, DATAPOINT_PRIMARY_KEY),
            )
            .await?;
        self.policy
            .call(
                Phase::Reset,
                "it_index_create",
                self.client.index_create(DATAPOINTS_TABLE_NAME, COUNTRY_INDEX_NAME),
            )
            .await?;

        tracing::debug!(backend = self.policy.backend(), "tables created");
        Ok(())
    }

    /// Insert one batch, replacing on conflict, and clear it.
    async fn flush(&self, table: &str, batch: &mut Vec<Value>) -> StorageResult<()> {
        if batch.is_empty() {
            return Ok(());
        }
        let documents = std::mem::take(batch);
        let count = documents.len();

        let summary = self
            .policy
            .call(
                Phase::Write,
                "it_insert",
                self.client.insert(table, documents, Conflict::Replace),
            )
            .await?;
        tracing::debug!(
            table,
            count,
            inserted = summary.inserted,
            replaced = summary.replaced,
            "batch flushed"
        );
        Ok(())
    }

    fn decode(&self, document: Value) -> StorageResult<Datapoint> {
        serde_json::from_value(document)
            .map_err(|e| StorageError::read(self.policy.backend(), e.to_string()))
    }
}

#[async_trait]
impl<C: IndexedTableClient> StorageAdapter for IndexedTableAdapter<C> {
    fn kind(&self) -> BackendKind {
        BackendKind::IndexedTable
    }

    #[tracing::instrument(
        skip(self, source),
        fields(backend = self.policy.backend(), batch_size = self.batch_size)
    )]
    async fn load(&self, source: &CsvSource) -> StorageResult<LoadReport> {
        let datapoints = stream_datapoints(source)?;
        self.reset().await?;

        let mut countries = CountrySet::new();
        let mut written = 0u64;
        let mut batch = Vec::with_capacity(self.batch_size);
        for datapoint in datapoints {
            let datapoint = datapoint?;
            batch.push(json!({
                DATAPOINT_PRIMARY_KEY: datapoint.key(),
                "country": datapoint.country,
                "time": datapoint.time,
                "value": datapoint.value,
            }));
            countries.observe(&datapoint);
            written += 1;

            if batch.len() == self.batch_size {
                self.flush(DATAPOINTS_TABLE_NAME, &mut batch).await?;
            }
        }
        self.flush(DATAPOINTS_TABLE_NAME, &mut batch).await?;

        for country in countries.iter() {
            batch.push(json!({ COUNTRY_PRIMARY_KEY: country }));
            if batch.len() == self.batch_size {
                self.flush(COUNTRIES_TABLE_NAME, &mut batch).await?;
            }
        }
        self.flush(COUNTRIES_TABLE_NAME, &mut batch).await?;

        tracing::info!(written, countries = countries.len(), "load complete");
        Ok(LoadReport {
            datapoints_written: written,
            countries: countries.len(),
        })
    }

    #[tracing::instrument(skip(self), fields(backend = self.policy.backend()))]
    async fn query_countries(&self) -> StorageResult<Vec<String>> {
        let documents = self
            .policy
            .call(Phase::Query, "it_scan", self.client.scan(COUNTRIES_TABLE_NAME))
            .await?;

        documents
            .iter()
            .map(|doc| {
                doc.get(COUNTRY_PRIMARY_KEY)
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .ok_or_else(|| {
                        StorageError::read(
                            self.policy.backend(),
                            format!("country missing in {doc}"),
                        )
                    })
            })
            .collect()
    }

    #[tracing::instrument(skip(self), fields(backend = self.policy.backend()))]
    async fn query_data(&self, country: &str) -> StorageResult<Vec<Datapoint>> {
        self.policy
            .call(
                Phase::Query,
                "it_index_wait",
                self.client.index_wait(DATAPOINTS_TABLE_NAME, COUNTRY_INDEX_NAME),
            )
            .await?;
        let documents = self
            .policy
            .call(
                Phase::Query,
                "it_get_all",
                self.client
                    .get_all(DATAPOINTS_TABLE_NAME, country, COUNTRY_INDEX_NAME),
            )
            .await?;

        documents.into_iter().map(|doc| self.decode(doc)).collect()
    }
}

// =============================================================================
// Tests
// =============================================================================
