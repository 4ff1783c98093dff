//! # Polystore
//!
//! Load one monthly industrial-production CSV into four different kinds of
//! database and query it back through a single contract.
//!
//! ## Quick Start
//!
//! ```rust
//! use polystore::dst::{SimConfig, Simulation};
//! use polystore::{CsvSource, PolystoreConfig};
//! use std::io::Write;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut file = tempfile::NamedTempFile::new()?;
//! writeln!(file, "\"LOCATION\",\"FREQUENCY\",\"TIME\",\"Value\"")?;
//! writeln!(file, "\"USA\",\"M\",\"1966-01\",\"50.04211\"")?;
//!
//! let env = Simulation::new(SimConfig::with_seed(42)).build();
//! let facade = env.create_facade(CsvSource::new(file.path()), &PolystoreConfig::default())?;
//!
//! facade.load("rethinkdb").await?;
//! assert_eq!(facade.query_countries("rethinkdb").await?, vec!["USA"]);
//! assert_eq!(
//!     facade.query_data_json("rethinkdb", "USA").await?,
//!     r#"[{"country":"USA","time":"1966-01","value":"50.04211"}]"#
//! );
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │  QueryFacade         │ id -> adapter, per-backend RwLock │
//! ├─────────────────────────────────────────────────────────┤
//! │  Response Assembler  │ dedupe, sort, JSON                │
//! ├─────────────────────────────────────────────────────────┤
//! │  StorageAdapter      │ redis │ mongo │ cassandra │       │
//! │                      │ rethinkdb │ file                  │
//! ├─────────────────────────────────────────────────────────┤
//! │  CsvSource           │ monthly rows, sanitized header    │
//! ├─────────────────────────────────────────────────────────┤
//! │  DST Framework       │ simulated engines + faults        │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Feature Flags
//!
//! - `redis` - Redis client for the key-value backend
//! - `mongodb` - MongoDB client for the document backend
//! - `cassandra` - Cassandra/Scylla client for the wide-column backend
//! - `drivers` - All of the above

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod constants;
pub mod dst;
pub mod facade;
pub mod model;
pub mod response;
pub mod source;
pub mod storage;
pub mod telemetry;

pub use config::{ConfigError, PolystoreConfig};
pub use facade::{QueryFacade, QueryFacadeBuilder};
pub use model::{CountrySet, Datapoint};
pub use source::{CsvSource, RawRow, SourceError};
pub use storage::{
    BackendKind, ClientError, ClientResult, DocumentAdapter, FlatFileAdapter, IndexedTableAdapter,
    KeyValueAdapter, LoadReport, StorageAdapter, StorageError, StorageResult, WideColumnAdapter,
};
pub use telemetry::{init_tracing, TelemetryConfig, TelemetryError};

#[cfg(feature = "cassandra")]
pub use storage::CassandraWideColumnClient;
#[cfg(feature = "mongodb")]
pub use storage::MongoDocumentClient;
#[cfg(feature = "redis")]
pub use storage::RedisKvClient;
