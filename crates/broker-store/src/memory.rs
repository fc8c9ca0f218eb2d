//! In-memory store adapter.
//!
//! Drop-in replacement for [`RedisStore`](crate::RedisStore) driven by an
//! injected [`TimeSource`], so TTL behavior is testable without sleeping.
//! Also usable as a single-process deployment mode.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::kv::{KvStore, StoreError};
use crate::time::TimeSource;

struct Entry {
    value: String,
    expires_at: f64,
}

/// Clock-driven in-memory store.
///
/// Expired entries are dropped lazily on access. The `failing` flag lets
/// tests simulate a store outage for fail-closed checks.
pub struct MemoryStore {
    time: Arc<dyn TimeSource>,
    entries: Mutex<HashMap<String, Entry>>,
    failing: Mutex<bool>,
}

impl MemoryStore {
    pub fn new(time: Arc<dyn TimeSource>) -> Self {
        Self {
            time,
            entries: Mutex::new(HashMap::new()),
            failing: Mutex::new(false),
        }
    }

    /// Simulate a store outage: every operation returns `Unavailable`.
    pub fn set_failing(&self, failing: bool) {
        *self.failing.lock() = failing;
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if *self.failing.lock() {
            return Err(StoreError::Unavailable("simulated outage".into()));
        }
        Ok(())
    }

    fn live_value(&self, key: &str) -> Option<String> {
        let now = self.time.now();
        let mut entries = self.entries.lock();
        match entries.get(key) {
            Some(entry) if entry.expires_at > now => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn setex(&self, key: &str, ttl_secs: u64, value: &str) -> Result<(), StoreError> {
        self.check_available()?;
        let expires_at = self.time.now() + ttl_secs as f64;
        self.entries.lock().insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at,
            },
        );
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.check_available()?;
        Ok(self.live_value(key))
    }

    async fn incr_and_expire(&self, key: &str, ttl_secs: u64) -> Result<u64, StoreError> {
        self.check_available()?;
        let count = self
            .live_value(key)
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(0)
            + 1;
        let expires_at = self.time.now() + ttl_secs as f64;
        self.entries.lock().insert(
            key.to_string(),
            Entry {
                value: count.to_string(),
                expires_at,
            },
        );
        Ok(count)
    }
}
