//! Outbound ports of the verification engine.
//!
//! The engine talks to the registry, the TLS fetcher, the revocation prober,
//! and the wall clock only through these traits; tests substitute stubs.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Lookup against the trusted-domain registry.
#[async_trait]
pub trait TrustAnchors: Send + Sync {
    async fn is_trusted(&self, url: &str) -> bool;
}

/// Source of a server's presented certificate chain (leaf first, DER).
///
/// Implementations return an empty chain on any failure; they never error
/// across this boundary.
#[async_trait]
pub trait ChainSource: Send + Sync {
    async fn fetch_chain(&self, hostname: &str, port: u16) -> Vec<Vec<u8>>;
}

/// Result of a revocation probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RevocationOutcome {
    /// A responder positively reported the certificate revoked.
    Revoked(String),
    /// No positive finding. Inconclusive probes land here too.
    Clear,
}

/// Best-effort OCSP/CRL revocation probe over DER certificates.
#[async_trait]
pub trait RevocationCheck: Send + Sync {
    async fn probe(&self, leaf_der: &[u8], issuer_der: Option<&[u8]>) -> RevocationOutcome;
}

/// Wall clock in UTC, injectable for deterministic tests.
pub trait Clock: Send + Sync {
    fn now_utc(&self) -> DateTime<Utc>;
}

/// Default clock using system time.
#[derive(Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
