//! Store facade.
//!
//! Everything the broker persists goes through this trait: session records
//! as JSON strings with a TTL, and rate-limit counters via an atomic
//! increment-and-expire. Callers own serialization; values are opaque here.

use async_trait::async_trait;

/// Transport-level store failure.
///
/// The facade does not distinguish failure modes beyond "the store did not
/// answer". Callers decide fail-open vs fail-closed per operation.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// TTL-capable string store.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Set `key` to `value`, expiring after `ttl_secs`.
    async fn setex(&self, key: &str, ttl_secs: u64, value: &str) -> Result<(), StoreError>;

    /// Fetch `key`, or `None` when absent or expired.
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Atomically increment `key` and (re)arm its expiry.
    ///
    /// Returns the post-increment count. The increment and the expire must
    /// land together so a counter can never survive its window.
    async fn incr_and_expire(&self, key: &str, ttl_secs: u64) -> Result<u64, StoreError>;
}
