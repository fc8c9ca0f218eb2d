//! WebSocket endpoint for verdict delivery.
//!
//! `GET /ws/verification/{nonce}` upgrades, validates the session, and
//! registers the socket on its notification channel. The verdict must reach
//! the *other* device, so a peer whose IP matches the session's originating
//! browser is refused unless the test flag relaxes the guard. All refusals
//! close with policy code 1008.

use std::net::IpAddr;

use axum::extract::ws::{close_code, CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::Response;
use futures::{SinkExt, StreamExt};
use tracing::{debug, info, warn};

use crate::domain::nonce::is_valid_nonce;
use crate::domain::session::SessionRecord;
use crate::extract::ClientIp;
use crate::handlers::AppState;

pub async fn ws_verification(
    State(state): State<AppState>,
    Path(nonce): Path<String>,
    client_ip: ClientIp,
    ws: WebSocketUpgrade,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(state, nonce, client_ip.0, socket))
}

async fn handle_socket(state: AppState, nonce: String, peer_ip: IpAddr, mut socket: WebSocket) {
    let record = match accept_guard(&state, &nonce, peer_ip).await {
        Ok(record) => record,
        Err(reason) => {
            warn!(nonce = %nonce, reason = reason, "Refusing verification socket");
            let _ = socket
                .send(Message::Close(Some(CloseFrame {
                    code: close_code::POLICY,
                    reason: reason.into(),
                })))
                .await;
            return;
        }
    };

    let channel_key = record.channel_key(&nonce);
    let (connection_id, mut outbound) = match state.hub.register(&channel_key) {
        Ok(registered) => registered,
        Err(e) => {
            let _ = socket
                .send(Message::Close(Some(CloseFrame {
                    code: close_code::POLICY,
                    reason: e.to_string().into(),
                })))
                .await;
            return;
        }
    };

    info!(nonce = %nonce, channel = %channel_key, "Verification socket connected");
    let (mut sender, mut receiver) = socket.split();

    loop {
        tokio::select! {
            frame = outbound.recv() => {
                match frame {
                    Some(text) => {
                        if sender.send(Message::Text(text)).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }
            incoming = receiver.next() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        if text == "ping" && sender.send(Message::Text("pong".to_string())).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        debug!(channel = %channel_key, "WebSocket close received");
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!(channel = %channel_key, error = %e, "WebSocket error");
                        break;
                    }
                }
            }
        }
    }

    state.hub.disconnect(&channel_key, connection_id);
    info!(channel = %channel_key, "Verification socket closed");
}

/// Validate the socket before it joins a channel.
async fn accept_guard(
    state: &AppState,
    nonce: &str,
    peer_ip: IpAddr,
) -> Result<SessionRecord, &'static str> {
    if !is_valid_nonce(nonce) {
        return Err("Invalid session token");
    }

    let record = match state.sessions.get(nonce).await {
        Ok(Some(record)) => record,
        Ok(None) => return Err("Unknown or expired session"),
        Err(_) => return Err("Session store unavailable"),
    };
    if state.sessions.is_expired(&record) {
        return Err("Unknown or expired session");
    }

    // The verdict must be delivered to the scanning device, never back to
    // the browser that initiated the session.
    if !state.config.relax_ws_ip_guard {
        if let Some(session_ip) = &record.ip {
            if *session_ip == peer_ip.to_string() {
                return Err("Socket peer matches session origin");
            }
        }
    }

    Ok(record)
}
