//! DST: every simulated engine agrees with the flat-file oracle.
//!
//! Each seed generates a random export (mixed frequencies, repeated
//! `(country, time)` pairs, country codes that prefix each other, values
//! with trailing zeros, rows cut off before `Value`) and compares every
//! backend's answers to the `file` backend's.
//! Set `DST_SEED` to replay one run.

mod common;

use common::{all_backends, line, ragged_line, write_csv, HEADER};
use polystore::dst::{DeterministicRng, SimConfig, Simulation};
use polystore::{BackendKind, CsvSource, PolystoreConfig};

const COUNTRIES: &[&str] = &["AUT", "CAN", "DEU", "EA", "EA19", "G-7", "SWE", "USA"];
const FREQUENCIES: &[&str] = &["M", "M", "M", "Q", "A"];

/// A value in one of the spellings the export uses.
fn random_value(rng: &mut DeterministicRng) -> String {
    let cents = rng.next_usize(0, 2_000_000);
    let (whole, fraction) = (cents / 100, cents % 100);
    match rng.next_usize(0, 3) {
        0 => format!("{whole}.{fraction:02}000"),
        1 => format!("{whole}.0"),
        2 => format!("{whole}.{fraction:02}"),
        _ => whole.to_string(),
    }
}

fn random_lines(rng: &mut DeterministicRng) -> Vec<String> {
    let count = rng.next_usize(0, 400);
    (0..count)
        .map(|_| {
            let country = *rng.choose(COUNTRIES);
            let frequency = *rng.choose(FREQUENCIES);
            let time = format!("{}-{:02}", rng.next_usize(1960, 1965), rng.next_usize(1, 12));
            if rng.next_bool(0.05) {
                ragged_line(country, frequency, &time)
            } else {
                line(country, frequency, &time, &random_value(rng))
            }
        })
        .collect()
}

async fn check_seed(seed: u64) {
    let mut rng = DeterministicRng::new(seed);
    let file = write_csv(HEADER, &random_lines(&mut rng));

    let config = PolystoreConfig::default().with_insert_batch_size(rng.next_usize(1, 64));
    let env = Simulation::new(SimConfig::with_seed(seed)).build();
    let facade = env.create_facade(CsvSource::new(file.path()), &config).unwrap();

    let oracle = BackendKind::FlatFile.id();
    facade.load(oracle).await.unwrap();
    let countries = facade.query_countries(oracle).await.unwrap();

    for id in all_backends() {
        facade.load(id).await.unwrap();
        assert_eq!(
            facade.query_countries(id).await.unwrap(),
            countries,
            "seed {seed}, backend {id}"
        );
        for country in COUNTRIES {
            assert_eq!(
                facade.query_data(id, country).await.unwrap(),
                facade.query_data(oracle, country).await.unwrap(),
                "seed {seed}, backend {id}, country {country}"
            );
        }
    }
}

#[tokio::test]
async fn test_backends_agree_with_file_across_seeds() {
    for seed in [0, 1, 2, 3, 42, 1337, 0xDEAD_BEEF, u64::MAX] {
        check_seed(seed).await;
    }
}

#[tokio::test]
async fn test_backends_agree_with_file_env_seed() {
    let config = SimConfig::from_env_or_random();
    check_seed(config.seed()).await;
}
