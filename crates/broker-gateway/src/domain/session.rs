//! Session data model.
//!
//! Records are persisted as JSON under `session:<nonce>` with the session
//! TTL; the verdict payload is denormalized into the record when the nonce
//! is consumed so polling needs no second lookup.

use serde::{Deserialize, Serialize};
use trust_engine::{VerificationDetails, Verdict};

/// Session lifecycle. The only legal transitions are
/// `PENDING -> CONSUMED` and `PENDING -> EXPIRED`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionStatus {
    #[serde(rename = "PENDING")]
    Pending,
    #[serde(rename = "CONSUMED")]
    Consumed,
    #[serde(rename = "EXPIRED")]
    Expired,
}

/// BLE proximity annotation reported for a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProximityInfo {
    #[serde(default)]
    pub ble_uuid: Option<String>,
    pub found: bool,
    pub supported: bool,
    #[serde(default)]
    pub timestamp: Option<String>,
    /// `supported && found`, computed at ingest time.
    pub confirmed: bool,
}

/// Persisted session record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub url: String,
    /// Creation instant, epoch seconds.
    pub created_at: f64,
    pub status: SessionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ua: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proximity: Option<ProximityInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
}

impl SessionRecord {
    /// Notification channel key: the BLE UUID when the session carries one,
    /// the nonce otherwise. The WebSocket accept path and the broadcast
    /// path both derive the key here so they can never disagree.
    pub fn channel_key(&self, nonce: &str) -> String {
        self.proximity
            .as_ref()
            .and_then(|p| p.ble_uuid.as_deref())
            .filter(|uuid| !uuid.is_empty())
            .unwrap_or(nonce)
            .to_string()
    }

    /// Whether proximity was confirmed for this session.
    pub fn proximity_confirmed(&self) -> bool {
        self.proximity.as_ref().map(|p| p.confirmed).unwrap_or(false)
    }
}

/// Full verdict payload returned by `verify`, pushed over the WebSocket,
/// and persisted into the session record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerdictPayload {
    pub verdict: Verdict,
    pub trust_score: i32,
    pub checked_url: String,
    /// ISO-8601 UTC with trailing `Z`.
    pub timestamp: String,
    #[serde(default)]
    pub client_ip: Option<String>,
    #[serde(default)]
    pub user_agent: Option<String>,
    #[serde(default)]
    pub mobile_ip: Option<String>,
    pub device_os: String,
    pub device_browser: String,
    pub device_brand: String,
    pub is_mobile: bool,
    pub logs: Vec<String>,
    pub details: VerificationDetails,
}
