//! Weighted verification pipeline.
//!
//! Orchestrates registry lookup, chain capture, leaf inspection, and
//! revocation probing into a trust score and verdict. The pipeline is
//! sequential and short-circuits on hard failures; every step appends a
//! human-readable line to the log trail.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use x509_parser::certificate::X509Certificate;
use x509_parser::prelude::FromDer;

use crate::inspect::{self, ValidityStatus};
use crate::ports::{ChainSource, Clock, RevocationCheck, RevocationOutcome, SystemClock, TrustAnchors};

/// Categorical verification outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    #[serde(rename = "TRUSTED")]
    Trusted,
    #[serde(rename = "CAUTION")]
    Caution,
    #[serde(rename = "UNSAFE")]
    Unsafe,
    /// Reserved for transport-level failures; never produced by the engine.
    #[serde(rename = "ERROR")]
    Error,
}

impl Verdict {
    fn from_score(score: i32) -> Self {
        if score >= 90 {
            Verdict::Trusted
        } else if score >= 70 {
            Verdict::Caution
        } else {
            Verdict::Unsafe
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Trusted => "TRUSTED",
            Verdict::Caution => "CAUTION",
            Verdict::Unsafe => "UNSAFE",
            Verdict::Error => "ERROR",
        }
    }
}

/// Per-check outcomes, keyed the way clients consume them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationDetails {
    pub whitelist: String,
    pub ssl_valid: String,
    pub revocation: String,
    pub hostname_match: String,
    pub chain_integrity: String,
    pub ip_correlation: String,
    pub bt_proximity: String,
    pub metadata: String,
}

impl Default for VerificationDetails {
    fn default() -> Self {
        Self {
            whitelist: "UNKNOWN".to_string(),
            ssl_valid: "UNKNOWN".to_string(),
            revocation: "UNKNOWN".to_string(),
            hostname_match: "UNKNOWN".to_string(),
            chain_integrity: "UNKNOWN".to_string(),
            ip_correlation: "SKIPPED".to_string(),
            bt_proximity: "UNKNOWN".to_string(),
            metadata: "UNKNOWN".to_string(),
        }
    }
}

impl VerificationDetails {
    fn push_metadata_marker(&mut self, marker: &str) {
        if self.metadata == "UNKNOWN" || self.metadata == "PASS" {
            self.metadata = marker.to_string();
        } else {
            self.metadata = format!("{},{}", self.metadata, marker);
        }
    }
}

/// Engine output: verdict, weighted score, ordered log trail, and the
/// per-check details.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationReport {
    pub verdict: Verdict,
    pub trust_score: i32,
    pub logs: Vec<String>,
    pub details: VerificationDetails,
}

/// The verification pipeline.
pub struct VerificationEngine {
    anchors: Arc<dyn TrustAnchors>,
    chains: Arc<dyn ChainSource>,
    revocation: Arc<dyn RevocationCheck>,
    clock: Arc<dyn Clock>,
}

impl VerificationEngine {
    pub fn new(
        anchors: Arc<dyn TrustAnchors>,
        chains: Arc<dyn ChainSource>,
        revocation: Arc<dyn RevocationCheck>,
    ) -> Self {
        Self::with_clock(anchors, chains, revocation, Arc::new(SystemClock))
    }

    pub fn with_clock(
        anchors: Arc<dyn TrustAnchors>,
        chains: Arc<dyn ChainSource>,
        revocation: Arc<dyn RevocationCheck>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            anchors,
            chains,
            revocation,
            clock,
        }
    }

    /// Run the full pipeline against a claimed URL.
    pub async fn verify(&self, url: &str) -> VerificationReport {
        let mut score = 100i32;
        let mut logs = Vec::new();
        let mut details = VerificationDetails::default();

        let Some((hostname, port)) = parse_target(url) else {
            logs.push("Invalid URL".to_string());
            return build_report(0, logs, details);
        };
        debug!(url = url, host = %hostname, "Starting verification");

        // 1. Trust-anchor lookup. A miss ends the pipeline immediately.
        if self.anchors.is_trusted(url).await {
            details.whitelist = "PASS".to_string();
            logs.push("Domain is in official whitelist.".to_string());
        } else {
            details.whitelist = "FAIL".to_string();
            logs.push("Domain NOT in official whitelist.".to_string());
            return build_report(0, logs, details);
        }

        // 2. Capture the presented chain.
        let chain = self.chains.fetch_chain(&hostname, port).await;
        if chain.is_empty() {
            details.ssl_valid = "FAIL".to_string();
            logs.push("Failed to retrieve SSL certificate.".to_string());
            return build_report(0, logs, details);
        }
        details.ssl_valid = "PASS".to_string();

        let leaf_der = &chain[0];
        let Ok((_, leaf)) = X509Certificate::from_der(leaf_der) else {
            details.ssl_valid = "FAIL (unparseable certificate)".to_string();
            logs.push("Failed to retrieve SSL certificate.".to_string());
            return build_report(0, logs, details);
        };

        let now = self.clock.now_utc();

        // 3. Validity window.
        let validity = inspect::check_validity(&leaf, now);
        if validity != ValidityStatus::Valid {
            let reason = validity.reason();
            details.ssl_valid = format!("FAIL ({})", reason);
            logs.push(format!("Certificate validity check failed: {}", reason));
            return build_report(0, logs, details);
        }

        // 4. Hostname match.
        if inspect::hostname_matches(&leaf, &hostname) {
            details.hostname_match = "PASS".to_string();
            logs.push("Certificate matches hostname.".to_string());
        } else {
            details.hostname_match = "FAIL".to_string();
            logs.push("Certificate does NOT match hostname.".to_string());
            return build_report(0, logs, details);
        }

        // 5. Revocation. Only a positive finding fails; inconclusive probes
        // do not upgrade to revoked.
        let issuer_der = chain.get(1).map(|der| der.as_slice());
        match self.revocation.probe(leaf_der, issuer_der).await {
            RevocationOutcome::Revoked(reason) => {
                details.revocation = format!("FAIL ({})", reason);
                logs.push(format!("Certificate is REVOKED: {}", reason));
                return build_report(0, logs, details);
            }
            RevocationOutcome::Clear => {
                details.revocation = "PASS".to_string();
                logs.push("Certificate is NOT revoked (OCSP/CRL checked).".to_string());
            }
        }

        // 6. Metadata. Soft deductions, except self-signed which zeroes out.
        details.chain_integrity = "PASS".to_string();
        let metadata = inspect::inspect_metadata(&leaf, now);

        if metadata.cert_age_days < 7 {
            score -= 15;
            logs.push(format!(
                "CAUTION: Certificate is very new ({} days old). Possible phishing.",
                metadata.cert_age_days
            ));
            details.push_metadata_marker("SUSPICIOUS_NEW_CERT");
        }
        if metadata.days_until_expiry < 30 {
            score -= 10;
            logs.push(format!(
                "CAUTION: Certificate expires soon ({} days remaining).",
                metadata.days_until_expiry
            ));
            details.push_metadata_marker("EXPIRING_SOON");
        }
        if metadata.self_signed {
            score = 0;
            logs.push("UNSAFE: Self-signed certificate detected.".to_string());
            details.push_metadata_marker("SELF_SIGNED");
        }
        if details.metadata == "UNKNOWN" {
            details.metadata = "PASS".to_string();
        }

        info!(url = url, score = score, "Verification complete");
        build_report(score, logs, details)
    }
}

/// Lowercased host and effective TLS port of a claimed URL.
fn parse_target(url: &str) -> Option<(String, u16)> {
    let parsed = url::Url::parse(url).ok()?;
    let host = parsed.host_str()?.to_ascii_lowercase();
    Some((host, parsed.port().unwrap_or(443)))
}

fn build_report(score: i32, logs: Vec<String>, details: VerificationDetails) -> VerificationReport {
    VerificationReport {
        verdict: Verdict::from_score(score),
        trust_score: score,
        logs,
        details,
    }
}
