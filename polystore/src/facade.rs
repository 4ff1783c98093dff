//! Query Facade
//!
//! `TigerStyle`: Identifier in, ordered response out.
//!
//! # Concurrency
//!
//! Each registered backend sits behind its own `tokio::sync::RwLock`:
//!
//! ```text
//! load(id)            -> write lock  (drop + recreate + repopulate)
//! query_countries(id) -> read lock
//! query_data(id, ..)  -> read lock
//! ```
//!
//! A query through the facade therefore never sees a half-dropped schema.
//! Backends do not block each other. Calling an adapter directly skips
//! the lock and can observe a load in progress.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::config::{ConfigError, PolystoreConfig};
use crate::model::Datapoint;
use crate::response::{assemble_countries, assemble_datapoints, to_json};
use crate::source::CsvSource;
use crate::storage::{LoadReport, StorageAdapter, StorageError, StorageResult};

struct BackendSlot {
    adapter: Arc<dyn StorageAdapter>,
    gate: RwLock<()>,
}

/// Registry of adapters keyed by backend identifier.
pub struct QueryFacade {
    source: CsvSource,
    slots: HashMap<String, BackendSlot>,
}

impl std::fmt::Debug for QueryFacade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryFacade")
            .field("source", &self.source)
            .field("backends", &self.registered())
            .finish()
    }
}

impl QueryFacade {
    /// Start building a facade that loads from `source`.
    #[must_use]
    pub fn builder(source: CsvSource) -> QueryFacadeBuilder {
        QueryFacadeBuilder::new(source)
    }

    /// Registered identifiers, sorted.
    #[must_use]
    pub fn registered(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.slots.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    /// The source every load streams from.
    #[must_use]
    pub fn source(&self) -> &CsvSource {
        &self.source
    }

    /// The adapter registered under `id`.
    #[must_use]
    pub fn adapter(&self, id: &str) -> Option<&Arc<dyn StorageAdapter>> {
        self.slots.get(id).map(|slot| &slot.adapter)
    }

    fn slot(&self, id: &str) -> StorageResult<&BackendSlot> {
        self.slots
            .get(id)
            .ok_or_else(|| StorageError::unknown_backend(id))
    }

    /// Reset backend `id` and repopulate it from the source.
    ///
    /// # Errors
    /// `UnknownBackend` for an unregistered id, otherwise the adapter's error.
    #[tracing::instrument(skip(self))]
    pub async fn load(&self, id: &str) -> StorageResult<LoadReport> {
        let slot = self.slot(id)?;
        let _exclusive = slot.gate.write().await;

        tracing::info!(source = %self.source.path().display(), "load started");
        let report = slot.adapter.load(&self.source).await?;
        tracing::info!(
            written = report.datapoints_written,
            countries = report.countries,
            "load finished"
        );
        Ok(report)
    }

    /// Countries held by backend `id`, deduplicated and sorted.
    ///
    /// # Errors
    /// `UnknownBackend` for an unregistered id, otherwise the adapter's error.
    #[tracing::instrument(skip(self))]
    pub async fn query_countries(&self, id: &str) -> StorageResult<Vec<String>> {
        let slot = self.slot(id)?;
        let _shared = slot.gate.read().await;

        let countries = slot.adapter.query_countries().await?;
        Ok(assemble_countries(countries))
    }

    /// Datapoints of `country` held by backend `id`, sorted by time.
    ///
    /// # Errors
    /// `UnknownBackend` for an unregistered id, otherwise the adapter's error.
    #[tracing::instrument(skip(self))]
    pub async fn query_data(&self, id: &str, country: &str) -> StorageResult<Vec<Datapoint>> {
        let slot = self.slot(id)?;
        let _shared = slot.gate.read().await;

        let datapoints = slot.adapter.query_data(country).await?;
        tracing::debug!(count = datapoints.len(), "query returned");
        Ok(assemble_datapoints(datapoints))
    }

    /// [`QueryFacade::query_countries`] encoded as a JSON array of strings.
    ///
    /// # Errors
    /// As `query_countries`, plus `Serialization`.
    pub async fn query_countries_json(&self, id: &str) -> StorageResult<String> {
        to_json(&self.query_countries(id).await?)
    }

    /// [`QueryFacade::query_data`] encoded as a JSON array of
    /// `{"country","time","value"}` objects.
    ///
    /// # Errors
    /// As `query_data`, plus `Serialization`.
    pub async fn query_data_json(&self, id: &str, country: &str) -> StorageResult<String> {
        to_json(&self.query_data(id, country).await?)
    }
}

// =============================================================================
// QueryFacadeBuilder
// =============================================================================

/// Builder for [`QueryFacade`].
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use polystore::{CsvSource, FlatFileAdapter, QueryFacadeBuilder};
///
/// let source = CsvSource::new("/tmp/industrial_production.csv");
/// let facade = QueryFacadeBuilder::new(source.clone())
///     .with_adapter("file", Arc::new(FlatFileAdapter::new(source)))
///     .build();
/// assert_eq!(facade.registered(), vec!["file"]);
/// ```
pub struct QueryFacadeBuilder {
    source: CsvSource,
    adapters: Vec<(String, Arc<dyn StorageAdapter>)>,
}

impl QueryFacadeBuilder {
    /// Start with no adapters.
    #[must_use]
    pub fn new(source: CsvSource) -> Self {
        Self {
            source,
            adapters: Vec::new(),
        }
    }

    /// Start from the configured source path.
    ///
    /// # Errors
    /// Returns `ConfigError` if `config` fails validation.
    pub fn from_config(config: &PolystoreConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::new(CsvSource::new(config.source_path.clone())))
    }

    /// Replace the source.
    #[must_use]
    pub fn with_source(mut self, source: CsvSource) -> Self {
        self.source = source;
        self
    }

    /// Register `adapter` under `id`. A later registration of the same id
    /// replaces the earlier one.
    #[must_use]
    pub fn with_adapter(mut self, id: impl Into<String>, adapter: Arc<dyn StorageAdapter>) -> Self {
        let id = id.into();
        assert!(!id.is_empty(), "backend id must not be empty");
        self.adapters.push((id, adapter));
        self
    }

    /// Build the facade.
    #[must_use]
    pub fn build(self) -> QueryFacade {
        let mut slots = HashMap::with_capacity(self.adapters.len());
        for (id, adapter) in self.adapters {
            let slot = BackendSlot {
                adapter,
                gate: RwLock::new(()),
            };
            if slots.insert(id.clone(), slot).is_some() {
                tracing::warn!(id = %id, "backend registered twice; keeping the last");
            }
        }

        QueryFacade {
            source: self.source,
            slots,
        }
    }
}
