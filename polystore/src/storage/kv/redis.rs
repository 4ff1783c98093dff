//! `RedisKvClient` - Production Key-Value Client
//!
//! `TigerStyle`: Thin mapping of `KvClient` onto a multiplexed Redis connection.

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, ErrorKind, RedisError};

use super::KvClient;
use crate::storage::{ClientError, ClientResult};

/// Redis client over one multiplexed async connection.
///
/// Cloning is cheap; every call works on its own handle to the shared
/// connection.
#[derive(Clone)]
pub struct RedisKvClient {
    conn: MultiplexedConnection,
}

impl RedisKvClient {
    /// Connect to `url` (e.g. `redis://redis:6379`).
    ///
    /// # Errors
    /// Returns `ClientError::Unreachable` if the server cannot be reached.
    pub async fn connect(url: &str) -> ClientResult<Self> {
        let client = redis::Client::open(url).map_err(map_redis_error)?;
        let conn = client
            .get_multiplexed_async_connection()
            .await
            .map_err(map_redis_error)?;
        Ok(Self { conn })
    }

    /// Wrap an existing connection.
    #[must_use]
    pub fn from_connection(conn: MultiplexedConnection) -> Self {
        Self { conn }
    }
}

fn map_redis_error(err: RedisError) -> ClientError {
    if err.is_io_error() || err.is_connection_dropped() || err.is_connection_refusal() {
        return ClientError::Unreachable(err.to_string());
    }
    if err.is_timeout() {
        return ClientError::timeout("redis", 0);
    }
    match err.kind() {
        ErrorKind::TypeError => ClientError::Codec(err.to_string()),
        _ => ClientError::rejected(err.to_string()),
    }
}

#[async_trait]
impl KvClient for RedisKvClient {
    async fn get(&self, key: &str) -> ClientResult<Option<String>> {
        let mut conn = self.conn.clone();
        conn.get(key).await.map_err(map_redis_error)
    }

    async fn set(&self, key: &str, value: &str) -> ClientResult<()> {
        let mut conn = self.conn.clone();
        conn.set(key, value).await.map_err(map_redis_error)
    }

    async fn scan_match(&self, pattern: &str) -> ClientResult<Vec<String>> {
        let mut conn = self.conn.clone();
        let mut iter = conn
            .scan_match::<_, String>(pattern)
            .await
            .map_err(map_redis_error)?;

        let mut keys = Vec::new();
        while let Some(key) = iter.next_item().await {
            keys.push(key);
        }
        Ok(keys)
    }

    async fn delete(&self, keys: &[String]) -> ClientResult<u64> {
        if keys.is_empty() {
            return Ok(0);
        }
        let mut conn = self.conn.clone();
        conn.del(keys.to_vec()).await.map_err(map_redis_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PolystoreConfig;
    use crate::storage::{KeyValueAdapter, StorageAdapter};

    async fn client() -> RedisKvClient {
        let url =
            std::env::var("TEST_REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379/15".into());
        RedisKvClient::connect(&url)
            .await
            .expect("Failed to connect to test Redis")
    }

    #[tokio::test]
    #[ignore] // Requires Redis
    async fn test_redis_set_get_scan() {
        let kv = client().await;
        kv.set("ZZZ_2000-01", "{}").await.unwrap();

        assert_eq!(kv.get("ZZZ_2000-01").await.unwrap().as_deref(), Some("{}"));
        assert!(kv
            .scan_match("ZZZ_*")
            .await
            .unwrap()
            .contains(&"ZZZ_2000-01".to_string()));

        assert_eq!(kv.delete(&["ZZZ_2000-01".to_string()]).await.unwrap(), 1);
    }

    #[tokio::test]
    #[ignore] // Requires Redis
    async fn test_redis_query_before_load_does_not_fail() {
        let adapter = KeyValueAdapter::new(client().await, &PolystoreConfig::default());
        adapter.query_countries().await.unwrap();
    }
}
