//! Shared persistence layer for the WebProof broker.
//!
//! The broker keeps all cross-process state (sessions, rate-limit counters)
//! in a TTL-capable string store. This crate provides:
//!
//! - [`KvStore`]: the facade every other component talks to,
//! - [`RedisStore`]: the production backend,
//! - [`MemoryStore`]: a clock-driven in-memory backend for deterministic tests,
//! - [`RateLimiter`]: per-operation fixed-window counters on top of the store,
//! - [`TimeSource`]: an injectable wall clock.

pub mod kv;
pub mod memory;
pub mod rate_limit;
pub mod redis_store;
pub mod time;

pub use kv::{KvStore, StoreError};
pub use memory::MemoryStore;
pub use rate_limit::{RateLimitConfig, RateLimitError, RateLimiter};
pub use redis_store::RedisStore;
pub use time::{ManualTimeSource, SystemTimeSource, TimeSource};
