//! Storage Backends
//!
//! `TigerStyle`: One contract, five engines, injected clients.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │                 StorageAdapter (trait)                    │
//! │         load / query_countries / query_data               │
//! └───────────────────────────────────────────────────────────┘
//!      │             │              │               │        │
//!      ▼             ▼              ▼               ▼        ▼
//! ┌─────────┐  ┌──────────┐  ┌─────────────┐  ┌──────────┐ ┌──────┐
//! │KeyValue │  │ Document │  │ WideColumn  │  │ Indexed  │ │ Flat │
//! │ Adapter │  │ Adapter  │  │  Adapter    │  │  Table   │ │ File │
//! └─────────┘  └──────────┘  └─────────────┘  └──────────┘ └──────┘
//!      │             │              │               │
//!      ▼             ▼              ▼               ▼
//!   KvClient   DocumentClient  WideColumnClient  IndexedTableClient
//!   (Sim/Redis) (Sim/Mongo)  (Sim/Cassandra)        (Sim)
//! ```
//!
//! Every client call goes through a [`CallPolicy`]: bounded by the call
//! timeout, and failures classified by the phase (reset, write, query) the
//! adapter was in.

mod adapter;
mod error;
pub mod document;
pub mod flat_file;
pub mod indexed_table;
pub mod kv;
pub mod wide_column;

pub use adapter::{BackendKind, CallPolicy, LoadReport, StorageAdapter};
pub use error::{ClientError, ClientResult, Phase, StorageError, StorageResult};

pub use document::{DocumentAdapter, DocumentClient, DocumentFilter, SimDocumentClient};
pub use flat_file::FlatFileAdapter;
pub use indexed_table::{
    Conflict, IndexedTableAdapter, IndexedTableClient, InsertSummary, SimIndexedTableClient,
};
pub use kv::{KeyValueAdapter, KvClient, SimKvClient};
pub use wide_column::{
    CqlRow, CqlType, CqlValue, Decimal, Replication, SimWideColumnClient, TableSchema,
    WideColumnAdapter, WideColumnClient,
};

#[cfg(feature = "mongodb")]
pub use document::MongoDocumentClient;
#[cfg(feature = "cassandra")]
pub use wide_column::CassandraWideColumnClient;
#[cfg(feature = "redis")]
pub use kv::RedisKvClient;
