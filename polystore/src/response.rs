//! Response Assembly
//!
//! `TigerStyle`: Adapters return raw sets; ordering happens here, once.

use serde::Serialize;

use crate::model::Datapoint;
use crate::storage::{StorageError, StorageResult};

/// Deduplicate and sort countries lexicographically.
#[must_use]
pub fn assemble_countries(mut countries: Vec<String>) -> Vec<String> {
    countries.sort_unstable();
    countries.dedup();
    countries
}

/// Sort datapoints ascending by `time`; equal times keep their input order.
#[must_use]
pub fn assemble_datapoints(mut datapoints: Vec<Datapoint>) -> Vec<Datapoint> {
    datapoints.sort_by(|a, b| a.time.cmp(&b.time));
    datapoints
}

/// Serialize a response body.
///
/// # Errors
/// Returns `StorageError::Serialization` if encoding fails.
pub fn to_json<T: Serialize + ?Sized>(body: &T) -> StorageResult<String> {
    serde_json::to_string(body).map_err(|e| StorageError::Serialization(e.to_string()))
}
