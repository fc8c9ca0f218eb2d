//! Outbound ports of the broker surface.

use async_trait::async_trait;
use trust_engine::VerificationReport;

/// Source of verification verdicts.
///
/// Production wires [`trust_engine::VerificationEngine`]; tests substitute
/// canned reports.
#[async_trait]
pub trait VerdictSource: Send + Sync {
    async fn verify(&self, url: &str) -> VerificationReport;
}

#[async_trait]
impl VerdictSource for trust_engine::VerificationEngine {
    async fn verify(&self, url: &str) -> VerificationReport {
        trust_engine::VerificationEngine::verify(self, url).await
    }
}
