//! HTTP and WebSocket surface of the WebProof trust broker.
//!
//! A browser calls `init` and receives a one-time nonce rendered as a QR
//! payload. The companion device that scans the code calls `verify`, which
//! runs the trust engine against the URL the browser claimed and persists
//! the verdict under consume-once semantics. When the two devices have
//! confirmed proximity over BLE, the verdict is also pushed to the device's
//! WebSocket; laggards poll.
//!
//! # Endpoints
//!
//! | Method | Path | Purpose |
//! |---|---|---|
//! | POST | `/api/v1/session/init` | Create a session from `X-Client-Url` |
//! | POST | `/api/v1/session/verify` | Consume the nonce, return the verdict |
//! | GET  | `/api/v1/session/poll/{nonce}` | Read session status and verdict |
//! | POST | `/api/v1/session/proximity/{nonce}` | Record the BLE proximity report |
//! | WS   | `/ws/verification/{nonce}` | Receive the verdict push |
//!
//! Components are wired explicitly: the session manager and rate limiter
//! share a [`broker_store::KvStore`], the verdict comes from any
//! [`ports::VerdictSource`], and the in-process [`ws::NotificationHub`] is
//! the only volatile state.

pub mod client_meta;
pub mod domain;
pub mod extract;
pub mod handlers;
pub mod ports;
pub mod service;
pub mod session;
pub mod ws;

pub use domain::config::BrokerConfig;
pub use domain::error::{ApiError, ApiResult};
pub use domain::session::{ProximityInfo, SessionRecord, SessionStatus, VerdictPayload};
pub use handlers::AppState;
pub use ports::VerdictSource;
pub use service::BrokerService;
pub use session::SessionManager;
pub use ws::NotificationHub;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
