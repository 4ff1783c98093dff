//! Storage Adapter Trait
//!
//! `TigerStyle`: One contract over every engine.
//!
//! All implementations must satisfy the same observable semantics:
//! - `load` drops everything the adapter owns, then repopulates from the
//!   source; running it twice equals running it once
//! - `query_countries` returns exactly the persisted country set
//! - `query_data` returns exactly the persisted datapoints of one country,
//!   in no particular order

use std::fmt;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;

use super::error::{ClientError, ClientResult, Phase, StorageResult};
use crate::config::PolystoreConfig;
use crate::constants::{
    BACKEND_DOCUMENT_ID, BACKEND_FLAT_FILE_ID, BACKEND_INDEXED_TABLE_ID, BACKEND_KEY_VALUE_ID,
    BACKEND_WIDE_COLUMN_ID,
};
use crate::model::Datapoint;
use crate::source::CsvSource;

// =============================================================================
// BackendKind
// =============================================================================

/// The engine family an adapter targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    /// Flat key/value pairs, prefix scans only
    KeyValue,
    /// Collections of documents with field filters
    Document,
    /// Typed tables in a replicated keyspace
    WideColumn,
    /// Document tables with asynchronously built secondary indexes
    IndexedTable,
    /// The CSV file itself
    FlatFile,
}

impl BackendKind {
    /// Default registry identifier.
    #[must_use]
    pub fn id(&self) -> &'static str {
        match self {
            Self::KeyValue => BACKEND_KEY_VALUE_ID,
            Self::Document => BACKEND_DOCUMENT_ID,
            Self::WideColumn => BACKEND_WIDE_COLUMN_ID,
            Self::IndexedTable => BACKEND_INDEXED_TABLE_ID,
            Self::FlatFile => BACKEND_FLAT_FILE_ID,
        }
    }

    /// All kinds, storage engines first.
    #[must_use]
    pub fn all() -> &'static [BackendKind] {
        &[
            Self::KeyValue,
            Self::Document,
            Self::WideColumn,
            Self::IndexedTable,
            Self::FlatFile,
        ]
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

// =============================================================================
// LoadReport
// =============================================================================

/// Outcome of a successful load.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Datapoint writes issued (duplicate keys counted each time)
    pub datapoints_written: u64,
    /// Distinct countries persisted
    pub countries: usize,
}

// =============================================================================
// StorageAdapter
// =============================================================================

/// The uniform load/query contract.
///
/// `TigerStyle`: All operations are async, return explicit errors, never retry.
#[async_trait]
pub trait StorageAdapter: Send + Sync {
    /// Engine family of this adapter.
    fn kind(&self) -> BackendKind;

    /// Reset the backend and repopulate it from `source`.
    ///
    /// The schema reset completes before the first datapoint write. A single
    /// failed write aborts the load; the backend state is then unknown and
    /// the load must be re-run.
    async fn load(&self, source: &CsvSource) -> StorageResult<LoadReport>;

    /// Countries persisted by the last load.
    async fn query_countries(&self) -> StorageResult<Vec<String>>;

    /// Datapoints of `country` persisted by the last load, unsorted.
    async fn query_data(&self, country: &str) -> StorageResult<Vec<Datapoint>>;
}

/// Open the source as a stream of datapoints with adapter-level errors.
///
/// # Errors
/// Returns `DataSourceUnavailable` if the file cannot be opened.
pub(crate) fn stream_datapoints(
    source: &CsvSource,
) -> StorageResult<impl Iterator<Item = StorageResult<Datapoint>>> {
    Ok(source.datapoints()?.map(|dp| dp.map_err(Into::into)))
}

// =============================================================================
// CallPolicy
// =============================================================================

/// Bounds every client call with a timeout and classifies its failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallPolicy {
    backend: &'static str,
    timeout: Duration,
}

impl CallPolicy {
    /// Create a policy for `kind` with an explicit timeout.
    #[must_use]
    pub fn new(kind: BackendKind, timeout: Duration) -> Self {
        Self {
            backend: kind.id(),
            timeout,
        }
    }

    /// Create a policy for `kind` from the shared config.
    #[must_use]
    pub fn from_config(kind: BackendKind, config: &PolystoreConfig) -> Self {
        Self::new(kind, config.call_timeout)
    }

    /// Backend label used in errors.
    #[must_use]
    pub fn backend(&self) -> &'static str {
        self.backend
    }

    /// Per-call timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run one client call under the timeout, keeping the raw client error.
    ///
    /// # Errors
    /// Returns the call's own error, or `ClientError::Timeout` on expiry.
    pub async fn raw<T, F>(&self, operation: &'static str, call: F) -> ClientResult<T>
    where
        F: Future<Output = ClientResult<T>>,
    {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(ClientError::timeout(
                operation,
                u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
            )),
        }
    }

    /// Run one client call under the timeout and classify any failure for
    /// `phase`.
    ///
    /// # Errors
    /// Returns `Connection` for unreachable/timeout, otherwise the phase's
    /// error kind.
    pub async fn call<T, F>(
        &self,
        phase: Phase,
        operation: &'static str,
        call: F,
    ) -> StorageResult<T>
    where
        F: Future<Output = ClientResult<T>>,
    {
        self.raw(operation, call)
            .await
            .map_err(|e| e.into_storage(self.backend, phase, operation))
    }

    /// Run a drop call, treating "does not exist" as success.
    ///
    /// Only `ClientError::NotFound` is tolerated; every other failure is a
    /// `Schema` (or `Connection`) error.
    ///
    /// # Errors
    /// Returns the classified error for anything but `NotFound`.
    pub async fn drop_if_exists<F>(&self, operation: &'static str, call: F) -> StorageResult<()>
    where
        F: Future<Output = ClientResult<()>>,
    {
        match self.raw(operation, call).await {
            Ok(()) => Ok(()),
            Err(e) if e.is_not_found() => {
                tracing::warn!(
                    backend = self.backend,
                    operation,
                    error = %e,
                    "drop target did not exist"
                );
                Ok(())
            }
            Err(e) => Err(e.into_storage(self.backend, Phase::Reset, operation)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StorageError;

    fn policy() -> CallPolicy {
        CallPolicy::new(BackendKind::WideColumn, Duration::from_millis(100))
    }

    #[test]
    fn test_backend_ids_are_distinct() {
        let mut ids: Vec<&str> = BackendKind::all().iter().map(BackendKind::id).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), BackendKind::all().len());
        assert_eq!(BackendKind::KeyValue.to_string(), "redis");
    }

    #[tokio::test(start_paused = true)]
    async fn test_call_timeout_is_connection_error() {
        let result: StorageResult<()> = policy()
            .call(Phase::Write, "wc_insert", async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(())
            })
            .await;

        let err = result.unwrap_err();
        assert!(err.is_connection(), "got {err:?}");
        assert!(err.to_string().contains("timed out"));
    }

    #[tokio::test]
    async fn test_drop_if_exists_tolerates_not_found_only() {
        policy()
            .drop_if_exists("wc_drop_keyspace", async {
                Err(ClientError::not_found("keyspace"))
            })
            .await
            .unwrap();

        let err = policy()
            .drop_if_exists("wc_drop_keyspace", async {
                Err(ClientError::rejected("permission denied"))
            })
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Schema { .. }));
    }
}
