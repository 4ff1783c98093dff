//! Wide-Column Backend
//!
//! `TigerStyle`: Typed tables, schema first, then rows.
//!
//! # Schema
//!
//! ```text
//! KEYSPACE industrial_production  WITH replication = SimpleStrategy, rf 1
//!   countries  (country text PRIMARY KEY)
//!   datapoints (id text PRIMARY KEY, country text, time text, value decimal)
//!   INDEX ON datapoints (country)
//! ```
//!
//! `value` is a decimal column. A decimal keeps its scale, so `"50.040"`
//! reads back as `"50.040"`. A source value that is not a decimal literal
//! fails its row with `Write`; it is never coerced. A row without a value
//! leaves the cell null.

#[cfg(feature = "cassandra")]
mod cassandra;
mod sim;

use std::collections::BTreeMap;

use async_trait::async_trait;

use super::adapter::{stream_datapoints, BackendKind, CallPolicy, LoadReport, StorageAdapter};
use super::error::{ClientResult, Phase, StorageError, StorageResult};
use crate::config::{ConfigError, PolystoreConfig};
use crate::constants::{COUNTRIES_TABLE_NAME, COUNTRY_INDEX_NAME, DATAPOINTS_TABLE_NAME};
use crate::model::{CountrySet, Datapoint};
use crate::source::CsvSource;

#[cfg(feature = "cassandra")]
pub use cassandra::CassandraWideColumnClient;
pub use sim::SimWideColumnClient;

// =============================================================================
// Schema Types
// =============================================================================

/// Column type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CqlType {
    /// UTF-8 text
    Text,
    /// Arbitrary-precision decimal
    Decimal,
}

impl CqlType {
    /// CQL type name used in DDL.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Decimal => "decimal",
        }
    }
}

/// A decimal literal, kept exactly as written (scale included).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Decimal(String);

impl Decimal {
    /// Accept `[+-]digits[.digits][(e|E)[+-]digits]` with at least one
    /// mantissa digit. Anything else, including `NaN`, `inf` and padding,
    /// is not a decimal.
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        let unsigned = text.strip_prefix(['+', '-']).unwrap_or(text);
        let (mantissa, exponent) = match unsigned.find(['e', 'E']) {
            Some(at) => (&unsigned[..at], Some(&unsigned[at + 1..])),
            None => (unsigned, None),
        };
        let (whole, fraction) = mantissa.split_once('.').unwrap_or((mantissa, ""));

        let digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
        let mantissa_ok = digits(whole) && digits(fraction) && whole.len() + fraction.len() > 0;
        let exponent_ok = exponent.map_or(true, |e| {
            let e = e.strip_prefix(['+', '-']).unwrap_or(e);
            !e.is_empty() && digits(e)
        });

        (mantissa_ok && exponent_ok).then(|| Self(text.to_string()))
    }

    /// The literal text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Decimal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One column value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CqlValue {
    /// UTF-8 text
    Text(String),
    /// Decimal
    Decimal(Decimal),
}

impl CqlValue {
    /// Type of this value.
    #[must_use]
    pub fn cql_type(&self) -> CqlType {
        match self {
            Self::Text(_) => CqlType::Text,
            Self::Decimal(_) => CqlType::Decimal,
        }
    }

    /// Text payload, if this is a text value.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            Self::Decimal(_) => None,
        }
    }

    /// Decimal payload, if this is a decimal value.
    #[must_use]
    pub fn as_decimal(&self) -> Option<&Decimal> {
        match self {
            Self::Decimal(d) => Some(d),
            Self::Text(_) => None,
        }
    }
}

/// One row, keyed by column name. A column absent from the map is null.
pub type CqlRow = BTreeMap<String, CqlValue>;

/// Keyspace replication settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Replication {
    /// Copies of every row
    pub factor: u32,
}

impl Replication {
    /// `SimpleStrategy` with `factor` copies.
    ///
    /// # Panics
    /// Panics if `factor` is zero.
    #[must_use]
    pub fn simple(factor: u32) -> Self {
        assert!(factor > 0, "replication factor must be positive");
        Self { factor }
    }

    /// Replication class name.
    #[must_use]
    pub fn class(&self) -> &'static str {
        "SimpleStrategy"
    }
}

/// Table definition with a single-column primary key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    /// Table name
    pub name: String,
    /// Columns in declaration order
    pub columns: Vec<(String, CqlType)>,
    /// Primary key column
    pub primary_key: String,
}

impl TableSchema {
    /// Start a table keyed by a text column.
    #[must_use]
    pub fn new(name: impl Into<String>, primary_key: impl Into<String>) -> Self {
        let primary_key = primary_key.into();
        Self {
            name: name.into(),
            columns: vec![(primary_key.clone(), CqlType::Text)],
            primary_key,
        }
    }

    /// Add a column.
    #[must_use]
    pub fn column(mut self, name: impl Into<String>, cql_type: CqlType) -> Self {
        self.columns.push((name.into(), cql_type));
        self
    }

    /// Type of `column`, if declared.
    #[must_use]
    pub fn column_type(&self, column: &str) -> Option<CqlType> {
        self.columns
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, t)| *t)
    }
}

fn countries_schema() -> TableSchema {
    TableSchema::new(COUNTRIES_TABLE_NAME, "country")
}

fn datapoints_schema() -> TableSchema {
    TableSchema::new(DATAPOINTS_TABLE_NAME, "id")
        .column("country", CqlType::Text)
        .column("time", CqlType::Text)
        .column("value", CqlType::Decimal)
}

// =============================================================================
// WideColumnClient
// =============================================================================

/// Native operations of a wide-column engine.
#[async_trait]
pub trait WideColumnClient: Send + Sync {
    /// Drop a keyspace. Returns `NotFound` if it does not exist.
    async fn drop_keyspace(&self, keyspace: &str) -> ClientResult<()>;

    /// Create a keyspace.
    async fn create_keyspace(&self, keyspace: &str, replication: Replication) -> ClientResult<()>;

    /// Create a table in an existing keyspace.
    async fn create_table(&self, keyspace: &str, schema: &TableSchema) -> ClientResult<()>;

    /// Create a secondary index on one column.
    async fn create_index(&self, keyspace: &str, table: &str, column: &str) -> ClientResult<()>;

    /// Insert (or overwrite by primary key) one row.
    async fn insert(&self, keyspace: &str, table: &str, row: CqlRow) -> ClientResult<()>;

    /// Select all rows, or the rows where `column == value`.
    ///
    /// The engine rejects a filter on a column that is neither the primary
    /// key nor indexed.
    async fn select(
        &self,
        keyspace: &str,
        table: &str,
        filter: Option<(&str, &CqlValue)>,
    ) -> ClientResult<Vec<CqlRow>>;
}

// =============================================================================
// WideColumnAdapter
// =============================================================================

/// Adapter storing datapoints in a typed, replicated keyspace.
pub struct WideColumnAdapter<C: WideColumnClient> {
    client: C,
    policy: CallPolicy,
    keyspace: String,
    replication: Replication,
}

impl<C: WideColumnClient> WideColumnAdapter<C> {
    /// Wrap a connected client; keyspace and replication come from `config`.
    ///
    /// # Errors
    /// Returns `ConfigError` if `config` fails validation.
    pub fn new(client: C, config: &PolystoreConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            client,
            policy: CallPolicy::from_config(BackendKind::WideColumn, config),
            keyspace: config.keyspace.clone(),
            replication: Replication::simple(config.replication_factor),
        })
    }

    /// The underlying client.
    #[must_use]
    pub fn client(&self) -> &C {
        &self.client
    }

    /// Keyspace this adapter owns.
    #[must_use]
    pub fn keyspace(&self) -> &str {
        &self.keyspace
    }

    /// Drop the keyspace, then create keyspace, tables and index.
    async fn reset(&self) -> StorageResult<()> {
        let ks = self.keyspace.as_str();
        self.policy
            .drop_if_exists("wc_drop_keyspace", self.client.drop_keyspace(ks))
            .await?;
        self.policy
            .call(
                Phase::Reset,
                "wc_create_keyspace",
                self.client.create_keyspace(ks, self.replication),
            )
            .await?;

        for schema in [countries_schema(), datapoints_schema()] {
            self.policy
                .call(Phase::Reset, "wc_create_table", self.client.create_table(ks, &schema))
                .await?;
        }
        self.policy
            .call(
                Phase::Reset,
                "wc_create_index",
                self.client.create_index(ks, DATAPOINTS_TABLE_NAME, COUNTRY_INDEX_NAME),
            )
            .await?;

        tracing::debug!(keyspace = ks, "schema created");
        Ok(())
    }

    fn datapoint_row(&self, datapoint: &Datapoint) -> StorageResult<CqlRow> {
        let mut row = CqlRow::from([
            ("id".to_string(), CqlValue::Text(datapoint.key())),
            ("country".to_string(), CqlValue::Text(datapoint.country.clone())),
            ("time".to_string(), CqlValue::Text(datapoint.time.clone())),
        ]);

        if let Some(raw) = &datapoint.value {
            let value = Decimal::parse(raw).ok_or_else(|| {
                StorageError::write(
                    self.policy.backend(),
                    format!("value {raw:?} of {} is not a number", datapoint.key()),
                )
            })?;
            row.insert("value".to_string(), CqlValue::Decimal(value));
        }
        Ok(row)
    }

    fn decode(&self, row: &CqlRow) -> StorageResult<Datapoint> {
        let text = |column: &str| {
            row.get(column)
                .and_then(CqlValue::as_text)
                .ok_or_else(|| {
                    StorageError::read(self.policy.backend(), format!("column {column} missing"))
                })
        };
        let value = match row.get("value") {
            None => None,
            Some(CqlValue::Decimal(d)) => Some(d.to_string()),
            Some(other) => {
                return Err(StorageError::read(
                    self.policy.backend(),
                    format!("column value holds {:?}", other.cql_type()),
                ))
            }
        };

        Ok(Datapoint {
            country: text("country")?.to_string(),
            time: text("time")?.to_string(),
            value,
        })
    }
}

#[async_trait]
impl<C: WideColumnClient> StorageAdapter for WideColumnAdapter<C> {
    fn kind(&self) -> BackendKind {
        BackendKind::WideColumn
    }

    #[tracing::instrument(
        skip(self, source),
        fields(backend = self.policy.backend(), keyspace = %self.keyspace)
    )]
    async fn load(&self, source: &CsvSource) -> StorageResult<LoadReport> {
        let datapoints = stream_datapoints(source)?;
        self.reset().await?;

        let mut countries = CountrySet::new();
        let mut written = 0u64;
        for datapoint in datapoints {
            let datapoint = datapoint?;
            let row = self.datapoint_row(&datapoint)?;
            self.policy
                .call(
                    Phase::Write,
                    "wc_insert",
                    self.client.insert(&self.keyspace, DATAPOINTS_TABLE_NAME, row),
                )
                .await?;
            countries.observe(&datapoint);
            written += 1;
        }

        for country in countries.iter() {
            let row = CqlRow::from([("country".to_string(), CqlValue::Text(country.clone()))]);
            self.policy
                .call(
                    Phase::Write,
                    "wc_insert",
                    self.client.insert(&self.keyspace, COUNTRIES_TABLE_NAME, row),
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
        let rows = self
            .policy
            .call(
                Phase::Query,
                "wc_select",
                self.client.select(&self.keyspace, COUNTRIES_TABLE_NAME, None),
            )
            .await?;

        rows.iter()
            .map(|row| {
                row.get("country")
                    .and_then(CqlValue::as_text)
                    .map(str::to_string)
                    .ok_or_else(|| {
                        StorageError::read(self.policy.backend(), "column country missing")
                    })
            })
            .collect()
    }

    #[tracing::instrument(skip(self), fields(backend = self.policy.backend()))]
    async fn query_data(&self, country: &str) -> StorageResult<Vec<Datapoint>> {
        let value = CqlValue::Text(country.to_string());
        let rows = self
            .policy
            .call(
                Phase::Query,
                "wc_select",
                self.client.select(
                    &self.keyspace,
                    DATAPOINTS_TABLE_NAME,
                    Some((COUNTRY_INDEX_NAME, &value)),
                ),
            )
            .await?;

        rows.iter().map(|row| self.decode(row)).collect()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dst::SimConfig;

    #[test]
    fn test_decimal_accepts_literals_verbatim() {
        for text in ["50.04211", "100.0", "50.040", "-0.5", "+7", "7.", ".5", "1e5", "2.5E-3"] {
            assert_eq!(Decimal::parse(text).unwrap().as_str(), text);
        }
    }

    #[test]
    fn test_decimal_rejects_non_numbers() {
        for text in ["", "n/a", "NaN", "inf", " 7 ", ".", "-", "1e", "1.2.3", "0x10"] {
            assert!(Decimal::parse(text).is_none(), "{text:?}");
        }
    }

    #[test]
    fn test_datapoints_schema() {
        let schema = datapoints_schema();
        assert_eq!(schema.primary_key, "id");
        assert_eq!(schema.column_type("value"), Some(CqlType::Decimal));
        assert_eq!(schema.column_type("country"), Some(CqlType::Text));
        assert_eq!(schema.column_type("missing"), None);
    }

    #[tokio::test]
    async fn test_values_keep_source_text() {
        let adapter = WideColumnAdapter::new(
            SimWideColumnClient::new(SimConfig::with_seed(1)),
            &PolystoreConfig::default(),
        )
        .unwrap();

        for datapoint in [
            Datapoint::new("USA", "2000-01", "100.0"),
            Datapoint::new("USA", "2000-02", "50.040"),
            Datapoint::without_value("USA", "2000-03"),
        ] {
            let row = adapter.datapoint_row(&datapoint).unwrap();
            assert_eq!(adapter.decode(&row).unwrap(), datapoint);
        }
    }

    #[test]
    fn test_missing_value_is_a_null_cell() {
        let adapter = WideColumnAdapter::new(
            SimWideColumnClient::new(SimConfig::with_seed(1)),
            &PolystoreConfig::default(),
        )
        .unwrap();

        let row = adapter
            .datapoint_row(&Datapoint::without_value("SWE", "2000-01"))
            .unwrap();
        assert!(!row.contains_key("value"));
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = PolystoreConfig::default().with_replication_factor(0);
        let result =
            WideColumnAdapter::new(SimWideColumnClient::new(SimConfig::with_seed(1)), &config);
        assert!(matches!(
            result,
            Err(ConfigError::OutOfRange {
                field: "replication_factor",
                ..
            })
        ));
    }

    #[test]
    #[should_panic(expected = "replication factor must be positive")]
    fn test_replication_zero_panics() {
        let _ = Replication::simple(0);
    }
}
