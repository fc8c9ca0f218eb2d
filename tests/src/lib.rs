//! # WebProof Broker Test Suite
//!
//! Cross-crate flows driven through the real router:
//!
//! ```text
//! tests/src/
//! ├── support.rs        # Shared fixtures: manual clock, memory store, stub engine
//! └── integration/
//!     ├── session_flow.rs    # init/verify/poll/proximity, consume-once, TTL
//!     ├── rate_limiting.rs   # Fixed windows, fail-closed on store outage
//!     └── notifications.rs   # WebSocket delivery, gating, guards
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p broker-tests
//! cargo test -p broker-tests integration::session_flow::
//! ```

#![allow(dead_code)]

pub mod integration;
pub mod support;
