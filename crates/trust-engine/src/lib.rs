//! URL trust verification for the WebProof broker.
//!
//! Given a URL the browser claims to be visiting, this crate decides whether
//! it is an authentic, unrevoked, trusted origin:
//!
//! 1. [`registry`]: refreshable set of officially registered domains with
//!    exact and parent-suffix matching,
//! 2. [`tls`]: a capture-only TLS handshake that returns the server's
//!    presented certificate chain even when the chain would fail validation,
//! 3. [`inspect`]: hostname, validity-window, and metadata checks over the
//!    leaf certificate,
//! 4. [`revocation`]: best-effort OCSP and CRL probes,
//! 5. [`engine`]: the weighted pipeline combining the above into a verdict.
//!
//! Components are wired through the traits in [`ports`] so tests can stub
//! network-facing pieces.

pub mod engine;
pub mod inspect;
pub mod ports;
pub mod registry;
pub mod revocation;
pub mod tls;

pub use engine::{VerificationDetails, VerificationEngine, VerificationReport, Verdict};
pub use ports::{ChainSource, Clock, RevocationCheck, RevocationOutcome, SystemClock, TrustAnchors};
pub use registry::{RegistryConfig, TrustAnchorRegistry};
pub use revocation::RevocationProber;
pub use tls::ChainFetcher;
