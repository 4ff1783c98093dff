//! `TigerStyle` Constants
//!
//! All limits use big-endian naming: `CATEGORY_SPECIFICS_UNIT_LIMIT`
//! Example: `CALL_TIMEOUT_MS_DEFAULT` (not `DEFAULT_CALL_TIMEOUT`)
//!
//! Every constant includes units in the name:
//! - _`MS` for milliseconds
//! - _`COUNT_MAX/DEFAULT` for quantities
//! - _NAME for persisted identifiers

// =============================================================================
// Source File
// =============================================================================

/// Default location of the industrial production CSV.
pub const SOURCE_PATH_DEFAULT: &str = "/app/data/industrial_production.csv";

/// Field delimiter of the source file.
pub const SOURCE_DELIMITER: char = ',';

/// Frequency code of the only rows that reach the record model.
pub const SOURCE_FREQUENCY_MONTHLY: &str = "M";

/// Column holding the country code.
pub const COLUMN_LOCATION: &str = "LOCATION";

/// Column holding the frequency code.
pub const COLUMN_FREQUENCY: &str = "FREQUENCY";

/// Column holding the `YYYY-MM` period.
pub const COLUMN_TIME: &str = "TIME";

/// Column holding the observed value.
pub const COLUMN_VALUE: &str = "Value";

// =============================================================================
// Persisted Names
// =============================================================================

/// Table/collection holding one entry per country.
pub const COUNTRIES_TABLE_NAME: &str = "countries";

/// Table/collection holding one entry per datapoint.
pub const DATAPOINTS_TABLE_NAME: &str = "datapoints";

/// Key under which the key-value backend stores the serialized country list.
pub const COUNTRIES_KEY_NAME: &str = "countries";

/// Separator between country and time in a datapoint key.
pub const DATAPOINT_KEY_SEPARATOR: char = '_';

/// Secondary index on the datapoint country column.
pub const COUNTRY_INDEX_NAME: &str = "country";

// =============================================================================
// Backend Identifiers
// =============================================================================

/// Registry identifier of the key-value backend.
pub const BACKEND_KEY_VALUE_ID: &str = "redis";

/// Registry identifier of the document backend.
pub const BACKEND_DOCUMENT_ID: &str = "mongo";

/// Registry identifier of the wide-column backend.
pub const BACKEND_WIDE_COLUMN_ID: &str = "cassandra";

/// Registry identifier of the indexed document-table backend.
pub const BACKEND_INDEXED_TABLE_ID: &str = "rethinkdb";

/// Registry identifier of the flat-file backend.
pub const BACKEND_FLAT_FILE_ID: &str = "file";

// =============================================================================
// Backend Limits
// =============================================================================

/// Default timeout for a single backend call in milliseconds.
pub const CALL_TIMEOUT_MS_DEFAULT: u64 = 5_000;

/// Maximum configurable timeout for a single backend call in milliseconds.
pub const CALL_TIMEOUT_MS_MAX: u64 = 600_000;

/// Default number of documents per indexed-table insert batch.
pub const INSERT_BATCH_COUNT_DEFAULT: usize = 200;

/// Maximum number of documents per indexed-table insert batch.
pub const INSERT_BATCH_COUNT_MAX: usize = 10_000;

/// Default wide-column keyspace.
pub const KEYSPACE_NAME_DEFAULT: &str = "industrial_production";

/// Default wide-column replication factor.
pub const REPLICATION_FACTOR_DEFAULT: u32 = 1;

/// Maximum wide-column replication factor.
pub const REPLICATION_FACTOR_MAX: u32 = 16;

// =============================================================================
// DST (Deterministic Simulation Testing) Limits
// =============================================================================

/// Maximum probability for fault injection (1.0 = 100%)
pub const DST_FAULT_PROBABILITY_MAX: f64 = 1.0;

/// Latency injected by a `FaultType::Latency` fault in milliseconds.
pub const DST_LATENCY_MS_DEFAULT: u64 = 60_000;

// =============================================================================
// Telemetry
// =============================================================================

/// Log filter used when `RUST_LOG` is unset.
pub const TELEMETRY_LOG_FILTER_DEFAULT: &str = "info";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limits_are_consistent() {
        assert!(CALL_TIMEOUT_MS_DEFAULT <= CALL_TIMEOUT_MS_MAX);
        assert!(INSERT_BATCH_COUNT_DEFAULT <= INSERT_BATCH_COUNT_MAX);
        assert!(REPLICATION_FACTOR_DEFAULT <= REPLICATION_FACTOR_MAX);
        assert!(DST_LATENCY_MS_DEFAULT > CALL_TIMEOUT_MS_DEFAULT);
    }

    #[test]
    fn test_persisted_names() {
        assert_eq!(COUNTRIES_TABLE_NAME, "countries");
        assert_eq!(DATAPOINTS_TABLE_NAME, "datapoints");
    }
}
