//! Document Backend
//!
//! `TigerStyle`: Two collections, native field filter.
//!
//! ```text
//! countries   { _id: "USA", country: "USA" }
//! datapoints  { _id: "USA_1966-01", country: "USA", time: "1966-01", value: "50.04211" }
//! ```
//!
//! Datapoints are upserted by `_id` so a repeated `(country, time)` pair
//! overwrites, matching the key-value backend's last-write-wins.

mod sim;

#[cfg(feature = "mongodb")]
mod mongo;

use async_trait::async_trait;
use serde_json::{json, Value};

use super::adapter::{stream_datapoints, BackendKind, CallPolicy, LoadReport, StorageAdapter};
use super::error::{ClientResult, Phase, StorageError, StorageResult};
use crate::config::PolystoreConfig;
use crate::constants::{COUNTRIES_TABLE_NAME, DATAPOINTS_TABLE_NAME};
use crate::model::{CountrySet, Datapoint};
use crate::source::CsvSource;

pub use sim::SimDocumentClient;

#[cfg(feature = "mongodb")]
pub use mongo::MongoDocumentClient;

/// Name of the document identity field.
pub const DOCUMENT_ID_FIELD: &str = "_id";

// =============================================================================
// DocumentClient
// =============================================================================

/// Collection filter understood by a document engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentFilter {
    /// Every document
    All,
    /// Documents whose string `field` equals `value`
    FieldEq {
        /// Field name
        field: String,
        /// Expected value
        value: String,
    },
}

impl DocumentFilter {
    /// Filter on one string field.
    #[must_use]
    pub fn field_eq(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::FieldEq {
            field: field.into(),
            value: value.into(),
        }
    }

    /// True if `document` passes this filter.
    #[must_use]
    pub fn matches(&self, document: &Value) -> bool {
        match self {
            Self::All => true,
            Self::FieldEq { field, value } => {
                document.get(field).and_then(Value::as_str) == Some(value.as_str())
            }
        }
    }
}

/// Native operations of a document engine.
#[async_trait]
pub trait DocumentClient: Send + Sync {
    /// Drop a collection. Returns `NotFound` if it does not exist.
    async fn drop_collection(&self, collection: &str) -> ClientResult<()>;

    /// Insert a new document; a duplicate `_id` is rejected.
    async fn insert_one(&self, collection: &str, document: Value) -> ClientResult<()>;

    /// Insert or replace the document with `_id == id`.
    async fn upsert(&self, collection: &str, id: &str, document: Value) -> ClientResult<()>;

    /// Documents of `collection` passing `filter`.
    async fn find(&self, collection: &str, filter: &DocumentFilter) -> ClientResult<Vec<Value>>;
}

// =============================================================================
// DocumentAdapter
// =============================================================================

/// Adapter storing one document per country and per datapoint.
pub struct DocumentAdapter<C: DocumentClient> {
    client: C,
    policy: CallPolicy,
}

impl<C: DocumentClient> DocumentAdapter<C> {
    /// Wrap a connected client.
    #[must_use]
    pub fn new(client: C, config: &PolystoreConfig) -> Self {
        Self {
            client,
            policy: CallPolicy::from_config(BackendKind::Document, config),
        }
    }

    /// The underlying client.
    #[must_use]
    pub fn client(&self) -> &C {
        &self.client
    }

    fn decode(&self, document: Value) -> StorageResult<Datapoint> {
        serde_json::from_value(document)
            .map_err(|e| StorageError::read(self.policy.backend(), e.to_string()))
    }
}

#[async_trait]
impl<C: DocumentClient> StorageAdapter for DocumentAdapter<C> {
    fn kind(&self) -> BackendKind {
        BackendKind::Document
    }

    #[tracing::instrument(skip(self, source), fields(backend = self.policy.backend()))]
    async fn load(&self, source: &CsvSource) -> StorageResult<LoadReport> {
        let datapoints = stream_datapoints(source)?;

        for collection in [COUNTRIES_TABLE_NAME, DATAPOINTS_TABLE_NAME] {
            self.policy
                .drop_if_exists("doc_drop", self.client.drop_collection(collection))
                .await?;
        }
        tracing::debug!("dropped collections");

        let mut countries = CountrySet::new();
        let mut written = 0u64;
        for datapoint in datapoints {
            let datapoint = datapoint?;
            let id = datapoint.key();
            let document = json!({
                DOCUMENT_ID_FIELD: id,
                "country": datapoint.country,
                "time": datapoint.time,
                "value": datapoint.value,
            });

            self.policy
                .call(
                    Phase::Write,
                    "doc_upsert",
                    self.client.upsert(DATAPOINTS_TABLE_NAME, &id, document),
                )
                .await?;
            countries.observe(&datapoint);
            written += 1;
        }

        for country in countries.iter() {
            let document = json!({ DOCUMENT_ID_FIELD: country, "country": country });
            self.policy
                .call(
                    Phase::Write,
                    "doc_insert",
                    self.client.insert_one(COUNTRIES_TABLE_NAME, document),
                )
                .await?;
        }

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
            .call(
                Phase::Query,
                "doc_find",
                self.client.find(COUNTRIES_TABLE_NAME, &DocumentFilter::All),
            )
            .await?;

        documents
            .iter()
            .map(|doc| {
                doc.get("country")
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
        let filter = DocumentFilter::field_eq("country", country);
        let documents = self
            .policy
            .call(
                Phase::Query,
                "doc_find",
                self.client.find(DATAPOINTS_TABLE_NAME, &filter),
            )
            .await?;

        documents.into_iter().map(|doc| self.decode(doc)).collect()
    }
}

// =============================================================================
// Tests
// =============================================================================
