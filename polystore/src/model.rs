//! Record Model
//!
//! `TigerStyle`: One normalized shape consumed and produced by every adapter.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::constants::{
    COLUMN_LOCATION, COLUMN_TIME, COLUMN_VALUE, DATAPOINT_KEY_SEPARATOR,
};
use crate::source::{RawRow, SourceError};

// =============================================================================
// Datapoint
// =============================================================================

/// One monthly observation.
///
/// Serializes as `{"country": "USA", "time": "1966-01", "value": "50.04211"}`.
/// A row whose `Value` column is missing keeps `value: null`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Datapoint {
    /// Country code (`LOCATION` column)
    pub country: String,
    /// Period in `YYYY-MM` form (`TIME` column)
    pub time: String,
    /// Observed value as written in the source (`Value` column), if present
    pub value: Option<String>,
}

impl Datapoint {
    /// Create a datapoint.
    #[must_use]
    pub fn new(
        country: impl Into<String>,
        time: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            country: country.into(),
            time: time.into(),
            value: Some(value.into()),
        }
    }

    /// Create a datapoint whose source row had no `Value` column.
    #[must_use]
    pub fn without_value(country: impl Into<String>, time: impl Into<String>) -> Self {
        Self {
            country: country.into(),
            time: time.into(),
            value: None,
        }
    }

    /// Convert a monthly raw row. A ragged row missing its trailing
    /// `Value` column converts with `value: None`.
    ///
    /// # Errors
    /// Returns `SourceError::MalformedRow` if `LOCATION` or `TIME` is absent,
    /// since the row then has no storage identity.
    pub fn from_row(row: &RawRow) -> Result<Self, SourceError> {
        let field = |column: &'static str| {
            row.get(column)
                .map(str::to_string)
                .ok_or(SourceError::MalformedRow {
                    line: row.line(),
                    column,
                })
        };

        Ok(Self {
            country: field(COLUMN_LOCATION)?,
            time: field(COLUMN_TIME)?,
            value: row.get(COLUMN_VALUE).map(str::to_string),
        })
    }

    /// Storage identity: `country + "_" + time`.
    #[must_use]
    pub fn key(&self) -> String {
        datapoint_key(&self.country, &self.time)
    }
}

/// Build the identity key shared by the key-value, wide-column and
/// indexed-table backends.
#[must_use]
pub fn datapoint_key(country: &str, time: &str) -> String {
    format!("{country}{DATAPOINT_KEY_SEPARATOR}{time}")
}

/// Prefix every key of `country` starts with.
#[must_use]
pub fn country_key_prefix(country: &str) -> String {
    format!("{country}{DATAPOINT_KEY_SEPARATOR}")
}

// =============================================================================
// CountrySet
// =============================================================================

/// Distinct countries observed during a load.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CountrySet {
    countries: BTreeSet<String>,
}

impl CountrySet {
    /// Create an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the country of a datapoint.
    pub fn observe(&mut self, datapoint: &Datapoint) {
        if !self.countries.contains(&datapoint.country) {
            self.countries.insert(datapoint.country.clone());
        }
    }

    /// Number of distinct countries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.countries.len()
    }

    /// True if no country was observed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.countries.is_empty()
    }

    /// Iterate countries in lexicographic order.
    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.countries.iter()
    }

    /// Countries as an owned, sorted vector.
    #[must_use]
    pub fn to_vec(&self) -> Vec<String> {
        self.countries.iter().cloned().collect()
    }
}

impl FromIterator<String> for CountrySet {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self {
            countries: iter.into_iter().collect(),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
