//! Fixed-window rate limiting.
//!
//! Counters live in the shared store keyed by operation, client IP, and the
//! current wall-clock minute, so limits hold across broker processes. When
//! the store is down the limiter refuses the request: the broker is unusable
//! without the store anyway, and an open limiter would invite a flood.

use std::sync::Arc;

use tracing::{error, warn};

use crate::kv::KvStore;
use crate::time::TimeSource;

/// Per-minute request limits for each operation.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub init_per_minute: u64,
    pub verify_per_minute: u64,
    pub proximity_per_minute: u64,
    pub poll_per_minute: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            init_per_minute: 20,
            verify_per_minute: 60,
            proximity_per_minute: 30,
            poll_per_minute: 120,
        }
    }
}

impl RateLimitConfig {
    fn limit_for(&self, operation: &str) -> u64 {
        match operation {
            "init" => self.init_per_minute,
            "verify" => self.verify_per_minute,
            "proximity" => self.proximity_per_minute,
            "poll" => self.poll_per_minute,
            _ => self.verify_per_minute,
        }
    }
}

/// Rate limit check outcome.
#[derive(Debug, thiserror::Error)]
pub enum RateLimitError {
    #[error("rate limit exceeded")]
    Exceeded,
    /// Store failure: refuse service rather than skip the check.
    #[error("rate limiting service unavailable")]
    Unavailable,
}

/// Fixed-window limiter over the shared store.
pub struct RateLimiter {
    store: Arc<dyn KvStore>,
    time: Arc<dyn TimeSource>,
    config: RateLimitConfig,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn KvStore>, time: Arc<dyn TimeSource>, config: RateLimitConfig) -> Self {
        Self {
            store,
            time,
            config,
        }
    }

    /// Count one request for `(operation, client_ip)` in the current minute.
    pub async fn check(&self, operation: &str, client_ip: &str) -> Result<(), RateLimitError> {
        let minute = (self.time.now() as u64) / 60;
        let key = format!("rate_limit:{}:{}:{}", operation, client_ip, minute);

        let count = match self.store.incr_and_expire(&key, 60).await {
            Ok(count) => count,
            Err(e) => {
                error!(operation = operation, error = %e, "Rate limit store failure, failing closed");
                return Err(RateLimitError::Unavailable);
            }
        };

        let limit = self.config.limit_for(operation);
        if count > limit {
            warn!(
                operation = operation,
                client_ip = client_ip,
                count = count,
                limit = limit,
                "Rate limit exceeded"
            );
            return Err(RateLimitError::Exceeded);
        }
        Ok(())
    }
}
