//! Storage Errors
//!
//! `TigerStyle`: Explicit error types with context.
//!
//! Two layers:
//! - [`ClientError`] is what an engine client reports for one native call.
//! - [`StorageError`] is what an adapter reports for a contract operation.
//!
//! The mapping between them depends on the phase the adapter was in when the
//! call failed (see [`ClientError::into_storage`]).

use thiserror::Error;

use crate::source::SourceError;

// =============================================================================
// StorageError
// =============================================================================

/// Errors from adapter and facade operations.
#[derive(Debug, Clone, Error)]
pub enum StorageError {
    /// CSV source could not be opened or read
    #[error("data source unavailable: {path}: {message}")]
    DataSourceUnavailable {
        /// Source path
        path: String,
        /// Underlying message
        message: String,
    },

    /// A monthly row lacks `LOCATION` or `TIME`
    #[error("malformed source at line {line}: {message}")]
    MalformedSource {
        /// 1-based line number
        line: usize,
        /// What was wrong
        message: String,
    },

    /// Backend unreachable or call timed out
    #[error("{backend}: connection error: {message}")]
    Connection {
        /// Backend identifier
        backend: String,
        /// Connection error message
        message: String,
    },

    /// Schema drop/create failed
    #[error("{backend}: schema error: {message}")]
    Schema {
        /// Backend identifier
        backend: String,
        /// Schema error message
        message: String,
    },

    /// A record failed to persist; the load was aborted
    #[error("{backend}: write error: {message}")]
    Write {
        /// Backend identifier
        backend: String,
        /// Write error message
        message: String,
    },

    /// A query was rejected or returned undecodable data
    #[error("{backend}: read error: {message}")]
    Read {
        /// Backend identifier
        backend: String,
        /// Read error message
        message: String,
    },

    /// No adapter registered under this identifier
    #[error("unknown backend: {id}")]
    UnknownBackend {
        /// Identifier that was requested
        id: String,
    },

    /// Response could not be serialized
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl StorageError {
    /// Create a connection error.
    #[must_use]
    pub fn connection(backend: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Connection {
            backend: backend.into(),
            message: message.into(),
        }
    }

    /// Create a schema error.
    #[must_use]
    pub fn schema(backend: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Schema {
            backend: backend.into(),
            message: message.into(),
        }
    }

    /// Create a write error.
    #[must_use]
    pub fn write(backend: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Write {
            backend: backend.into(),
            message: message.into(),
        }
    }

    /// Create a read error.
    #[must_use]
    pub fn read(backend: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Read {
            backend: backend.into(),
            message: message.into(),
        }
    }

    /// Create an unknown backend error.
    #[must_use]
    pub fn unknown_backend(id: impl Into<String>) -> Self {
        Self::UnknownBackend { id: id.into() }
    }

    /// True for `Connection` errors.
    #[must_use]
    pub fn is_connection(&self) -> bool {
        matches!(self, Self::Connection { .. })
    }
}

impl From<SourceError> for StorageError {
    fn from(err: SourceError) -> Self {
        match err {
            SourceError::Unavailable { path, message } => Self::DataSourceUnavailable {
                path: path.display().to_string(),
                message,
            },
            SourceError::Read { line, message } => Self::DataSourceUnavailable {
                path: format!("line {line}"),
                message,
            },
            SourceError::MalformedRow { line, column } => Self::MalformedSource {
                line,
                message: format!("missing identity column {column}"),
            },
        }
    }
}

/// Result type for adapter operations.
pub type StorageResult<T> = Result<T, StorageError>;

// =============================================================================
// ClientError
// =============================================================================

/// Phase of an adapter operation, used to classify client failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Dropping and recreating schema
    Reset,
    /// Writing datapoints or the country set
    Write,
    /// Serving a query
    Query,
}

/// Errors reported by an engine client for one native call.
#[derive(Debug, Clone, Error)]
pub enum ClientError {
    /// Engine could not be reached
    #[error("unreachable: {0}")]
    Unreachable(String),

    /// Call did not finish in time
    #[error("{operation} timed out after {duration_ms}ms")]
    Timeout {
        /// Native operation name
        operation: String,
        /// Timeout in milliseconds
        duration_ms: u64,
    },

    /// Target keyspace/table/collection/index does not exist
    #[error("not found: {what}")]
    NotFound {
        /// What was missing
        what: String,
    },

    /// Engine rejected the call
    #[error("rejected: {0}")]
    Rejected(String),

    /// Secondary index accessed while still being built
    #[error("index {index} on {table} is not ready")]
    IndexNotReady {
        /// Table name
        table: String,
        /// Index name
        index: String,
    },

    /// Payload could not be encoded or decoded
    #[error("codec: {0}")]
    Codec(String),
}

impl ClientError {
    /// Create a not found error.
    #[must_use]
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }

    /// Create a rejected error.
    #[must_use]
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected(message.into())
    }

    /// Create a timeout error.
    #[must_use]
    pub fn timeout(operation: impl Into<String>, duration_ms: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            duration_ms,
        }
    }

    /// True if the engine was unreachable or the call timed out.
    #[must_use]
    pub fn is_connection(&self) -> bool {
        matches!(self, Self::Unreachable(_) | Self::Timeout { .. })
    }

    /// True if the target did not exist.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Classify this failure for the adapter contract.
    ///
    /// Connection failures are `Connection` in every phase; everything else
    /// takes the phase's error kind.
    #[must_use]
    pub fn into_storage(self, backend: &str, phase: Phase, operation: &str) -> StorageError {
        let message = format!("{operation}: {self}");
        if self.is_connection() {
            return StorageError::connection(backend, message);
        }
        match phase {
            Phase::Reset => StorageError::schema(backend, message),
            Phase::Write => StorageError::write(backend, message),
            Phase::Query => StorageError::read(backend, message),
        }
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        Self::Codec(err.to_string())
    }
}

/// Result type for client calls.
pub type ClientResult<T> = Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_errors_ignore_phase() {
        for phase in [Phase::Reset, Phase::Write, Phase::Query] {
            let err =
                ClientError::Unreachable("refused".into()).into_storage("redis", phase, "kv_set");
            assert!(err.is_connection());

            let err = ClientError::timeout("kv_set", 5).into_storage("redis", phase, "kv_set");
            assert!(err.is_connection());
        }
    }

    #[test]
    fn test_phase_classification() {
        let err =
            ClientError::rejected("bad ddl").into_storage("cassandra", Phase::Reset, "create");
        assert!(matches!(err, StorageError::Schema { .. }));

        let err = ClientError::rejected("dup").into_storage("mongo", Phase::Write, "insert");
        assert!(matches!(err, StorageError::Write { .. }));

        let err = ClientError::Codec("bad json".into()).into_storage("redis", Phase::Query, "get");
        assert!(matches!(err, StorageError::Read { .. }));
    }

    #[test]
    fn test_message_carries_backend_and_operation() {
        let err = ClientError::not_found("keyspace x").into_storage(
            "cassandra",
            Phase::Reset,
            "wc_drop_keyspace",
        );
        let text = err.to_string();
        assert!(text.contains("cassandra"));
        assert!(text.contains("wc_drop_keyspace"));
        assert!(text.contains("keyspace x"));
    }

    #[test]
    fn test_source_error_conversion() {
        let err: StorageError = SourceError::Unavailable {
            path: "/missing.csv".into(),
            message: "No such file".into(),
        }
        .into();
        assert!(matches!(
            err,
            StorageError::DataSourceUnavailable { ref path, .. } if path == "/missing.csv"
        ));

        let err: StorageError = SourceError::MalformedRow {
            line: 7,
            column: "TIME",
        }
        .into();
        assert!(matches!(err, StorageError::MalformedSource { line: 7, .. }));
    }
}
