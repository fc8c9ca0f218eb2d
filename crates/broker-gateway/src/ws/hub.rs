//! Notification hub.
//!
//! In-process registry of live sockets keyed by channel (BLE UUID when
//! available, nonce otherwise). Each connection owns its socket write half;
//! the hub holds only an outbound queue per connection, so broadcasting
//! never touches socket state and eviction is a map removal.
//!
//! Horizontal scale note: the registry is intentionally process-local;
//! scaling out requires sticky routing on the channel key or a pub/sub
//! bridge over the shared store.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// How long a broadcast waits for a late subscriber.
const SUBSCRIBER_WAIT: Duration = Duration::from_secs(3);
/// Poll interval while waiting.
const SUBSCRIBER_POLL: Duration = Duration::from_millis(100);

/// Identifier of one registered connection.
pub type ConnectionId = u64;

/// Registration failure.
#[derive(Debug, thiserror::Error)]
pub enum RegisterError {
    #[error("too many connections for this session")]
    ChannelFull,
}

/// Keyed socket registry with bounded-wait broadcast.
pub struct NotificationHub {
    channels: DashMap<String, HashMap<ConnectionId, mpsc::UnboundedSender<String>>>,
    next_id: AtomicU64,
    max_per_channel: usize,
}

impl NotificationHub {
    pub fn new(max_per_channel: usize) -> Self {
        Self {
            channels: DashMap::new(),
            next_id: AtomicU64::new(1),
            max_per_channel,
        }
    }

    /// Register a connection under `channel_key`.
    ///
    /// Returns the connection id and the outbound frame queue the
    /// connection task must drain into its socket.
    pub fn register(
        &self,
        channel_key: &str,
    ) -> Result<(ConnectionId, mpsc::UnboundedReceiver<String>), RegisterError> {
        let mut entry = self.channels.entry(channel_key.to_string()).or_default();
        if entry.len() >= self.max_per_channel {
            warn!(channel = channel_key, "Connection limit reached for channel");
            return Err(RegisterError::ChannelFull);
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = mpsc::unbounded_channel();
        entry.insert(id, tx);
        info!(
            channel = channel_key,
            connection_id = id,
            connections = entry.len(),
            "WebSocket registered on channel"
        );
        Ok((id, rx))
    }

    /// Remove a connection; empty channels are dropped from the map.
    pub fn disconnect(&self, channel_key: &str, id: ConnectionId) {
        if let Some(mut entry) = self.channels.get_mut(channel_key) {
            entry.remove(&id);
            let empty = entry.is_empty();
            drop(entry);
            if empty {
                self.channels.remove_if(channel_key, |_, conns| conns.is_empty());
            }
            debug!(channel = channel_key, connection_id = id, "WebSocket disconnected");
        }
    }

    /// Number of live connections on a channel.
    pub fn subscriber_count(&self, channel_key: &str) -> usize {
        self.channels
            .get(channel_key)
            .map(|entry| entry.len())
            .unwrap_or(0)
    }

    /// Push a verdict to every subscriber of `channel_key`.
    ///
    /// When no subscriber is connected yet, waits up to three seconds for
    /// one to arrive, then gives up silently. Sends go through each
    /// connection's queue; a closed queue evicts the connection.
    pub async fn send_verification_success(
        &self,
        channel_key: &str,
        result: &serde_json::Value,
    ) {
        if self.subscriber_count(channel_key) == 0 {
            info!(channel = channel_key, "No WebSocket yet for channel, waiting up to 3s");
            let mut waited = Duration::ZERO;
            while waited < SUBSCRIBER_WAIT {
                tokio::time::sleep(SUBSCRIBER_POLL).await;
                waited += SUBSCRIBER_POLL;
                if self.subscriber_count(channel_key) > 0 {
                    break;
                }
            }
            if self.subscriber_count(channel_key) == 0 {
                warn!(channel = channel_key, "No WebSocket connection arrived for channel");
                return;
            }
        }

        let frame = serde_json::json!({
            "type": "verification_success",
            "channel": channel_key,
            "result": result,
        })
        .to_string();

        // Snapshot the subscriber set so eviction during iteration is safe.
        let subscribers: Vec<(ConnectionId, mpsc::UnboundedSender<String>)> = self
            .channels
            .get(channel_key)
            .map(|entry| entry.iter().map(|(id, tx)| (*id, tx.clone())).collect())
            .unwrap_or_default();

        for (id, tx) in subscribers {
            if tx.send(frame.clone()).is_err() {
                warn!(channel = channel_key, connection_id = id, "Dead WebSocket, evicting");
                self.disconnect(channel_key, id);
            } else {
                info!(channel = channel_key, connection_id = id, "Sent verification result");
            }
        }
    }
}
