//! Redis-backed store.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use tracing::debug;

use crate::kv::{KvStore, StoreError};

/// Production store over a multiplexed Redis connection.
///
/// `ConnectionManager` reconnects on its own; every command still surfaces
/// transport failures to the caller so the rate limiter can fail closed.
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
}

impl RedisStore {
    /// Connect to `redis://{host}:{port}`.
    pub async fn connect(host: &str, port: u16) -> Result<Self, StoreError> {
        let url = format!("redis://{}:{}", host, port);
        let client =
            redis::Client::open(url.as_str()).map_err(|e| StoreError::Unavailable(e.to_string()))?;
        let conn = ConnectionManager::new(client)
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        debug!(host = host, port = port, "Connected to Redis");
        Ok(Self { conn })
    }
}

#[async_trait]
impl KvStore for RedisStore {
    async fn setex(&self, key: &str, ttl_secs: u64, value: &str) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        redis::cmd("SETEX")
            .arg(key)
            .arg(ttl_secs)
            .arg(value)
            .query_async::<()>(&mut conn)
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.conn.clone();
        redis::cmd("GET")
            .arg(key)
            .query_async::<Option<String>>(&mut conn)
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))
    }

    async fn incr_and_expire(&self, key: &str, ttl_secs: u64) -> Result<u64, StoreError> {
        let mut conn = self.conn.clone();
        // MULTI/EXEC so the counter and its expiry land together.
        let (count, _): (u64, i64) = redis::pipe()
            .atomic()
            .incr(key, 1u64)
            .expire(key, ttl_secs as i64)
            .query_async(&mut conn)
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        Ok(count)
    }
}
