//! DST: fault injection and engine-specific failure modes.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::monthly_csv;
use polystore::dst::{FaultConfig, FaultType, SimConfig, Simulation};
use polystore::storage::{
    IndexedTableAdapter, IndexedTableClient, SimIndexedTableClient, SimWideColumnClient,
    WideColumnAdapter,
};
use polystore::{CsvSource, PolystoreConfig, StorageAdapter, StorageError};

fn rows(count: usize) -> Vec<(String, String)> {
    (0..count)
        .map(|i| {
            let country = if i % 2 == 0 { "USA" } else { "SWE" };
            (country.to_string(), format!("{}-{:02}", 1960 + i / 12, i % 12 + 1))
        })
        .collect()
}

fn csv_with(count: usize) -> tempfile::NamedTempFile {
    let rows = rows(count);
    let borrowed: Vec<(&str, &str, &str)> = rows
        .iter()
        .map(|(c, t)| (c.as_str(), t.as_str(), "1.5"))
        .collect();
    monthly_csv(&borrowed)
}

#[tokio::test]
async fn test_refused_connection_during_write_is_connection_error() {
    let file = csv_with(10);
    let env = Simulation::new(SimConfig::with_seed(42))
        .with_fault(FaultConfig::new(FaultType::ConnectionRefused, 1.0).with_filter("kv_set"))
        .build();
    let facade = env
        .create_facade(CsvSource::new(file.path()), &PolystoreConfig::default())
        .unwrap();

    let err = facade.load("redis").await.unwrap_err();
    assert!(err.is_connection(), "got {err:?}");
    assert!(env.faults.total_injections() >= 1);
}

#[tokio::test]
async fn test_rejected_write_aborts_load_midway() {
    let file = csv_with(10);
    let env = Simulation::new(SimConfig::with_seed(42))
        .with_fault(
            FaultConfig::new(FaultType::WriteRejected, 1.0)
                .with_filter("doc_upsert")
                .after(3)
                .with_max_injections(1),
        )
        .build();
    let facade = env
        .create_facade(CsvSource::new(file.path()), &PolystoreConfig::default())
        .unwrap();

    let err = facade.load("mongo").await.unwrap_err();
    assert!(matches!(err, StorageError::Write { .. }), "got {err:?}");
    // Three datapoints made it in before the abort; no country list was written.
    assert_eq!(env.document.document_count("datapoints"), 3);
    assert_eq!(env.document.document_count("countries"), 0);

    // The fault is spent; a rerun restores the full state.
    let report = facade.load("mongo").await.unwrap();
    assert_eq!(report.datapoints_written, 10);
    assert_eq!(facade.query_countries("mongo").await.unwrap(), vec!["SWE", "USA"]);
}

#[tokio::test]
async fn test_rejected_ddl_is_schema_error() {
    let file = csv_with(4);
    let env = Simulation::new(SimConfig::with_seed(42))
        .with_fault(FaultConfig::new(FaultType::SchemaRejected, 1.0).with_filter("wc_create_table"))
        .build();
    let facade = env
        .create_facade(CsvSource::new(file.path()), &PolystoreConfig::default())
        .unwrap();

    let err = facade.load("cassandra").await.unwrap_err();
    assert!(matches!(err, StorageError::Schema { .. }), "got {err:?}");
}

#[tokio::test]
async fn test_failed_drop_is_schema_error_not_tolerated() {
    let file = csv_with(4);
    let env = Simulation::new(SimConfig::with_seed(42))
        .with_fault(FaultConfig::new(FaultType::SchemaRejected, 1.0).with_filter("it_table_drop"))
        .build();
    let facade = env
        .create_facade(CsvSource::new(file.path()), &PolystoreConfig::default())
        .unwrap();

    let err = facade.load("rethinkdb").await.unwrap_err();
    assert!(matches!(err, StorageError::Schema { .. }), "got {err:?}");
}

#[tokio::test(start_paused = true)]
async fn test_latency_past_timeout_is_connection_error() {
    let file = csv_with(4);
    let env = Simulation::new(SimConfig::with_seed(42).with_latency_ms(60_000))
        .with_fault(FaultConfig::new(FaultType::Latency, 1.0).with_filter("wc_select"))
        .build();
    let config = PolystoreConfig::default().with_call_timeout(Duration::from_millis(500));
    let facade = env.create_facade(CsvSource::new(file.path()), &config).unwrap();

    facade.load("cassandra").await.unwrap();
    let err = facade.query_data("cassandra", "USA").await.unwrap_err();
    assert!(err.is_connection(), "got {err:?}");
    assert!(err.to_string().contains("timed out"));
}

#[tokio::test]
async fn test_corrupted_payload_is_read_error() {
    let file = csv_with(4);
    let env = Simulation::new(SimConfig::with_seed(42))
        .with_fault(FaultConfig::new(FaultType::Corruption, 1.0).with_filter("kv_get"))
        .build();
    let facade = env
        .create_facade(CsvSource::new(file.path()), &PolystoreConfig::default())
        .unwrap();

    facade.load("redis").await.unwrap();
    let err = facade.query_countries("redis").await.unwrap_err();
    assert!(matches!(err, StorageError::Read { .. }), "got {err:?}");
}

#[tokio::test]
async fn test_faults_on_one_engine_leave_others_alone() {
    let file = csv_with(6);
    let env = Simulation::new(SimConfig::with_seed(42))
        .with_fault(FaultConfig::new(FaultType::ConnectionRefused, 1.0).with_filter("kv_"))
        .build();
    let facade = env
        .create_facade(CsvSource::new(file.path()), &PolystoreConfig::default())
        .unwrap();

    assert!(facade.load("redis").await.is_err());
    for id in ["mongo", "cassandra", "rethinkdb", "file"] {
        facade.load(id).await.unwrap();
        assert_eq!(facade.query_countries(id).await.unwrap(), vec!["SWE", "USA"], "{id}");
    }
}

#[tokio::test]
async fn test_non_numeric_value_fails_wide_column_load() {
    let file = monthly_csv(&[("USA", "2000-01", "1.5"), ("USA", "2000-02", "n/a")]);
    let adapter = WideColumnAdapter::new(
        SimWideColumnClient::new(SimConfig::with_seed(1)),
        &PolystoreConfig::default(),
    )
    .unwrap();

    let err = adapter.load(&CsvSource::new(file.path())).await.unwrap_err();
    assert!(matches!(err, StorageError::Write { .. }), "got {err:?}");
    assert!(err.to_string().contains("n/a"));
    // The first row went in before the bad one; nothing was coerced.
    assert_eq!(adapter.client().row_count("industrial_production", "datapoints"), 1);
}

#[tokio::test]
async fn test_wide_column_uses_configured_keyspace_and_replication() {
    let file = csv_with(2);
    let config = PolystoreConfig::default()
        .with_keyspace("ipi_test")
        .with_replication_factor(3);
    let adapter =
        WideColumnAdapter::new(SimWideColumnClient::new(SimConfig::with_seed(1)), &config).unwrap();

    adapter.load(&CsvSource::new(file.path())).await.unwrap();
    let replication = adapter.client().replication("ipi_test").unwrap();
    assert_eq!(replication.factor, 3);
    assert_eq!(replication.class(), "SimpleStrategy");
    assert!(adapter.client().replication("industrial_production").is_none());
}

#[tokio::test]
async fn test_index_must_be_awaited_before_get_all() {
    let file = csv_with(4);
    let client = SimIndexedTableClient::new(SimConfig::with_seed(1));
    let adapter = IndexedTableAdapter::new(client.clone(), &PolystoreConfig::default()).unwrap();

    adapter.load(&CsvSource::new(file.path())).await.unwrap();
    assert!(!client.index_ready("datapoints", "country"));

    // Bypassing the adapter hits the building index.
    let err = client.get_all("datapoints", "USA", "country").await.unwrap_err();
    assert!(matches!(err, polystore::ClientError::IndexNotReady { .. }));

    // The adapter waits first.
    assert_eq!(adapter.query_data("USA").await.unwrap().len(), 2);
    assert!(client.index_ready("datapoints", "country"));
}

#[tokio::test]
async fn test_450_rows_are_inserted_in_batches_of_200() {
    let file = csv_with(450);
    let client = SimIndexedTableClient::new(SimConfig::with_seed(1));
    let adapter = IndexedTableAdapter::new(client.clone(), &PolystoreConfig::default()).unwrap();

    let report = adapter.load(&CsvSource::new(file.path())).await.unwrap();
    assert_eq!(report.datapoints_written, 450);

    let batches: Vec<usize> = client
        .insert_batches()
        .into_iter()
        .filter(|(table, _)| table == "datapoints")
        .map(|(_, count)| count)
        .collect();
    assert_eq!(batches, vec![200, 200, 50]);
    assert_eq!(adapter.query_data("SWE").await.unwrap().len(), 225);
}

#[tokio::test]
async fn test_load_excludes_concurrent_queries() {
    let file = csv_with(300);
    let env = Simulation::new(SimConfig::with_seed(7)).build();
    let config = PolystoreConfig::default().with_insert_batch_size(10);
    let facade = Arc::new(env.create_facade(CsvSource::new(file.path()), &config).unwrap());
    facade.load("rethinkdb").await.unwrap();

    let loader = {
        let facade = Arc::clone(&facade);
        tokio::spawn(async move {
            for _ in 0..3 {
                facade.load("rethinkdb").await.unwrap();
            }
        })
    };
    let reader = {
        let facade = Arc::clone(&facade);
        tokio::spawn(async move {
            for _ in 0..20 {
                // Never a missing table, never a partial country.
                assert_eq!(facade.query_data("rethinkdb", "USA").await.unwrap().len(), 150);
                tokio::task::yield_now().await;
            }
        })
    };

    loader.await.unwrap();
    reader.await.unwrap();
}
