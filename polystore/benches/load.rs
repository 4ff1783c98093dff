//! Load and Query Benchmarks
//!
//! Benchmarks for full loads and country queries against the simulated
//! engines, so the numbers measure adapter overhead rather than a network.
//!
//! Run with: cargo bench --bench load

use std::io::Write;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use polystore::dst::{SimConfig, Simulation};
use polystore::{BackendKind, CsvSource, PolystoreConfig};
use tempfile::NamedTempFile;
use tokio::runtime::Runtime;

const COUNTRIES: &[&str] = &["AUT", "CAN", "DEU", "FRA", "SWE", "USA"];

fn export(rows: usize) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "\"LOCATION\",\"FREQUENCY\",\"TIME\",\"Value\"").unwrap();
    for i in 0..rows {
        let country = COUNTRIES[i % COUNTRIES.len()];
        let time = format!("{}-{:02}", 1900 + i / 12, i % 12 + 1);
        writeln!(file, "\"{country}\",\"M\",\"{time}\",\"{}.5\"", i % 200).unwrap();
    }
    file
}

// =============================================================================
// Load Benchmarks
// =============================================================================

fn bench_load(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let file = export(1_200);
    let mut group = c.benchmark_group("load_1200_rows");

    for kind in BackendKind::all() {
        let facade = Simulation::new(SimConfig::with_seed(42))
            .build()
            .create_facade(CsvSource::new(file.path()), &PolystoreConfig::default())
            .unwrap();

        group.bench_with_input(BenchmarkId::from_parameter(kind), kind, |b, kind| {
            b.iter(|| rt.block_on(async { facade.load(black_box(kind.id())).await.unwrap() }));
        });
    }

    group.finish();
}

fn bench_batch_size(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let file = export(1_200);
    let mut group = c.benchmark_group("rethinkdb_batch_size");

    for batch in [1usize, 50, 200, 1_000] {
        let config = PolystoreConfig::default().with_insert_batch_size(batch);
        let facade = Simulation::new(SimConfig::with_seed(42))
            .build()
            .create_facade(CsvSource::new(file.path()), &config)
            .unwrap();

        group.bench_with_input(BenchmarkId::from_parameter(batch), &batch, |b, _| {
            b.iter(|| rt.block_on(async { facade.load("rethinkdb").await.unwrap() }));
        });
    }

    group.finish();
}

// =============================================================================
// Query Benchmarks
// =============================================================================

fn bench_query_data(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let file = export(1_200);
    let mut group = c.benchmark_group("query_data");

    for kind in BackendKind::all() {
        let facade = Simulation::new(SimConfig::with_seed(42))
            .build()
            .create_facade(CsvSource::new(file.path()), &PolystoreConfig::default())
            .unwrap();
        rt.block_on(facade.load(kind.id())).unwrap();

        group.bench_with_input(BenchmarkId::from_parameter(kind), kind, |b, kind| {
            b.iter(|| {
                rt.block_on(async {
                    facade
                        .query_data(black_box(kind.id()), black_box("USA"))
                        .await
                        .unwrap()
                })
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_load, bench_batch_size, bench_query_data);
criterion_main!(benches);
