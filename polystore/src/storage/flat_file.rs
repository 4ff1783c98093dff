//! Flat-File Backend
//!
//! `TigerStyle`: The source file is the store.
//!
//! `load` writes nothing: it checks the source opens and every monthly row
//! converts, then remembers which file to serve. Queries rescan that file
//! on a blocking thread. A repeated `(country, time)` pair keeps the last
//! row, so results line up with the engines that overwrite by key.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::adapter::{BackendKind, LoadReport, StorageAdapter};
use super::error::{StorageError, StorageResult};
use crate::model::{CountrySet, Datapoint};
use crate::source::CsvSource;

/// Adapter answering queries straight from the CSV source.
#[derive(Debug)]
pub struct FlatFileAdapter {
    source: RwLock<CsvSource>,
}

impl FlatFileAdapter {
    /// Serve `source` until the next `load` swaps it.
    #[must_use]
    pub fn new(source: CsvSource) -> Self {
        Self {
            source: RwLock::new(source),
        }
    }

    /// Run a full scan of the current source on the blocking pool.
    async fn scan<T, F>(&self, scan: F) -> StorageResult<T>
    where
        T: Send + 'static,
        F: FnOnce(CsvSource) -> StorageResult<T> + Send + 'static,
    {
        let source = self.source.read().await.clone();
        tokio::task::spawn_blocking(move || scan(source))
            .await
            .map_err(|e| StorageError::read(BackendKind::FlatFile.id(), e.to_string()))?
    }
}

fn collect_countries(source: &CsvSource) -> StorageResult<CountrySet> {
    let mut countries = CountrySet::new();
    for datapoint in source.datapoints()? {
        countries.observe(&datapoint?);
    }
    Ok(countries)
}

fn collect_country(source: &CsvSource, country: &str) -> StorageResult<Vec<Datapoint>> {
    let mut by_time = BTreeMap::new();
    for datapoint in source.datapoints()? {
        let datapoint = datapoint?;
        if datapoint.country == country {
            by_time.insert(datapoint.time.clone(), datapoint);
        }
    }
    Ok(by_time.into_values().collect())
}

#[async_trait]
impl StorageAdapter for FlatFileAdapter {
    fn kind(&self) -> BackendKind {
        BackendKind::FlatFile
    }

    #[tracing::instrument(
        skip(self, source),
        fields(backend = BackendKind::FlatFile.id(), path = %source.path().display())
    )]
    async fn load(&self, source: &CsvSource) -> StorageResult<LoadReport> {
        let checked = source.clone();
        let report = tokio::task::spawn_blocking(move || -> StorageResult<LoadReport> {
            let mut countries = CountrySet::new();
            let mut rows = 0u64;
            for datapoint in checked.datapoints()? {
                countries.observe(&datapoint?);
                rows += 1;
            }
            Ok(LoadReport {
                datapoints_written: rows,
                countries: countries.len(),
            })
        })
        .await
        .map_err(|e| StorageError::read(BackendKind::FlatFile.id(), e.to_string()))??;

        *self.source.write().await = source.clone();
        tracing::info!(
            rows = report.datapoints_written,
            countries = report.countries,
            "source validated"
        );
        Ok(report)
    }

    #[tracing::instrument(skip(self), fields(backend = BackendKind::FlatFile.id()))]
    async fn query_countries(&self) -> StorageResult<Vec<String>> {
        self.scan(|source| collect_countries(&source).map(|c| c.to_vec()))
            .await
    }

    #[tracing::instrument(skip(self), fields(backend = BackendKind::FlatFile.id()))]
    async fn query_data(&self, country: &str) -> StorageResult<Vec<Datapoint>> {
        let country = country.to_string();
        self.scan(move |source| collect_country(&source, &country))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn csv(rows: &[&str]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "\"LOCATION\",\"FREQUENCY\",\"TIME\",\"Value\"").unwrap();
        for row in rows {
            writeln!(file, "{row}").unwrap();
        }
        file
    }

    #[tokio::test]
    async fn test_load_counts_monthly_rows() {
        let file = csv(&[
            "\"USA\",\"M\",\"2000-01\",\"1\"",
            "\"USA\",\"Q\",\"2000-Q1\",\"2\"",
            "\"SWE\",\"M\",\"2000-01\",\"3\"",
        ]);
        let source = CsvSource::new(file.path());
        let adapter = FlatFileAdapter::new(source.clone());

        let report = adapter.load(&source).await.unwrap();
        assert_eq!(report.datapoints_written, 2);
        assert_eq!(report.countries, 2);
    }

    #[tokio::test]
    async fn test_duplicate_time_keeps_last_row() {
        let file = csv(&[
            "\"USA\",\"M\",\"2000-01\",\"1\"",
            "\"USA\",\"M\",\"2000-01\",\"9\"",
        ]);
        let adapter = FlatFileAdapter::new(CsvSource::new(file.path()));

        let data = adapter.query_data("USA").await.unwrap();
        assert_eq!(data, vec![Datapoint::new("USA", "2000-01", "9")]);
    }

    #[tokio::test]
    async fn test_missing_file_is_unavailable() {
        let source = CsvSource::new("/nonexistent/industrial_production.csv");
        let adapter = FlatFileAdapter::new(source.clone());

        let err = adapter.load(&source).await.unwrap_err();
        assert!(matches!(err, StorageError::DataSourceUnavailable { .. }));
        let err = adapter.query_countries().await.unwrap_err();
        assert!(matches!(err, StorageError::DataSourceUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_load_switches_served_file() {
        let first = csv(&["\"USA\",\"M\",\"2000-01\",\"1\""]);
        let second = csv(&["\"SWE\",\"M\",\"2000-01\",\"1\""]);
        let adapter = FlatFileAdapter::new(CsvSource::new(first.path()));
        assert_eq!(adapter.query_countries().await.unwrap(), vec!["USA"]);

        adapter.load(&CsvSource::new(second.path())).await.unwrap();
        assert_eq!(adapter.query_countries().await.unwrap(), vec!["SWE"]);
    }
}
