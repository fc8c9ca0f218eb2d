//! Session lifecycle over the shared store.
//!
//! Records live for `session_ttl` seconds from creation. A record may
//! outlive that window in the store after `update_status` rewrites it (the
//! consumed result stays pollable), so expiry is always evaluated against
//! `created_at`, never against store presence alone.

use std::sync::Arc;

use broker_store::{KvStore, TimeSource};
use tracing::{debug, warn};

use crate::domain::error::{ApiError, ApiResult};
use crate::domain::nonce::generate_nonce;
use crate::domain::session::{ProximityInfo, SessionRecord, SessionStatus};

fn session_key(nonce: &str) -> String {
    format!("session:{}", nonce)
}

/// CRUD over session records.
pub struct SessionManager {
    store: Arc<dyn KvStore>,
    time: Arc<dyn TimeSource>,
    ttl_secs: u64,
}

impl SessionManager {
    pub fn new(store: Arc<dyn KvStore>, time: Arc<dyn TimeSource>, ttl_secs: u64) -> Self {
        Self {
            store,
            time,
            ttl_secs,
        }
    }

    pub fn ttl_secs(&self) -> u64 {
        self.ttl_secs
    }

    /// Allocate a nonce and persist a pending record under it.
    pub async fn create(
        &self,
        url: &str,
        ip: Option<String>,
        ua: Option<String>,
    ) -> ApiResult<String> {
        let nonce = generate_nonce();
        let record = SessionRecord {
            url: url.to_string(),
            created_at: self.time.now(),
            status: SessionStatus::Pending,
            ip,
            ua,
            proximity: None,
            result: None,
        };
        self.write(&nonce, &record).await?;
        debug!(nonce = %nonce, url = url, "Session created");
        Ok(nonce)
    }

    /// Fetch a record; `None` when the store has no live entry.
    pub async fn get(&self, nonce: &str) -> ApiResult<Option<SessionRecord>> {
        let raw = self.store.get(&session_key(nonce)).await?;
        let Some(raw) = raw else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(record) => Ok(Some(record)),
            Err(e) => {
                warn!(nonce = %nonce, error = %e, "Corrupt session record");
                Ok(None)
            }
        }
    }

    /// Whether the record's verifiable lifetime has passed.
    pub fn is_expired(&self, record: &SessionRecord) -> bool {
        self.time.now() - record.created_at > self.ttl_secs as f64
    }

    /// Write the consumed status and the verdict payload as one update.
    pub async fn consume(
        &self,
        nonce: &str,
        mut record: SessionRecord,
        result: serde_json::Value,
    ) -> ApiResult<()> {
        record.status = SessionStatus::Consumed;
        record.result = Some(result);
        self.write(nonce, &record).await?;
        debug!(nonce = %nonce, "Session consumed");
        Ok(())
    }

    /// Annotate the record with a proximity report. Last writer wins.
    pub async fn update_proximity(
        &self,
        nonce: &str,
        mut record: SessionRecord,
        proximity: ProximityInfo,
    ) -> ApiResult<()> {
        record.proximity = Some(proximity);
        self.write(nonce, &record).await?;
        debug!(nonce = %nonce, "Session proximity updated");
        Ok(())
    }

    async fn write(&self, nonce: &str, record: &SessionRecord) -> ApiResult<()> {
        let json = serde_json::to_string(record)
            .map_err(|e| ApiError::Internal(format!("session serialization: {}", e)))?;
        self.store
            .setex(&session_key(nonce), self.ttl_secs, &json)
            .await?;
        Ok(())
    }
}
