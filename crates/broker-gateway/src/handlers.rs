//! Request handlers.
//!
//! Thin mapping layer between the HTTP surface and the components: extract
//! the client IP, apply the rate limiter (fail-closed), validate inputs,
//! call into sessions/engine/hub, and translate outcomes to HTTP statuses.
//! The consume-once transition lives here: the handler re-checks `PENDING`,
//! writes result and status in one update, and only then fires the
//! notification.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use broker_store::RateLimiter;
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::client_meta::parse_user_agent;
use crate::domain::config::BrokerConfig;
use crate::domain::error::{ApiError, ApiResult};
use crate::domain::nonce::is_valid_nonce;
use crate::domain::session::{ProximityInfo, SessionRecord, SessionStatus, VerdictPayload};
use crate::extract::ClientIp;
use crate::ports::VerdictSource;
use crate::session::SessionManager;
use crate::ws::NotificationHub;

/// Maximum accepted length of a claimed URL.
const MAX_URL_LEN: usize = 2048;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<SessionManager>,
    pub engine: Arc<dyn VerdictSource>,
    pub hub: Arc<NotificationHub>,
    pub limiter: Arc<RateLimiter>,
    pub config: Arc<BrokerConfig>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct InitResponse {
    pub nonce: String,
    pub expires_in: u64,
    pub qr_payload: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VerifyRequest {
    pub token: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProximityRequest {
    #[serde(default)]
    pub ble_uuid: Option<String>,
    pub found: bool,
    pub supported: bool,
    #[serde(default)]
    pub timestamp: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PollResponse {
    pub status: SessionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
}

/// `POST /api/v1/session/init`
///
/// The browser self-reports its URL in the `X-Client-Url` header; the body
/// is ignored. Returns the nonce and the QR payload encoding it.
pub async fn init_session(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    headers: HeaderMap,
) -> ApiResult<(StatusCode, Json<InitResponse>)> {
    state.limiter.check("init", &ip.to_string()).await?;

    let url = headers
        .get("x-client-url")
        .and_then(|v| v.to_str().ok())
        .ok_or(ApiError::MissingClientUrl)?;
    validate_client_url(url)?;

    let user_agent = headers
        .get("user-agent")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string());

    let nonce = state
        .sessions
        .create(url, Some(ip.to_string()), user_agent)
        .await?;
    info!(nonce = %nonce, url = url, "Session initialized");

    Ok((
        StatusCode::CREATED,
        Json(InitResponse {
            qr_payload: format!("myapp://verify?token={}", nonce),
            expires_in: state.sessions.ttl_secs(),
            nonce,
        }),
    ))
}

/// `POST /api/v1/session/verify`
///
/// Consumes the nonce: exactly one call per session runs the engine and
/// persists the verdict; later calls see 409/410.
pub async fn verify_token(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    Json(request): Json<VerifyRequest>,
) -> ApiResult<Json<VerdictPayload>> {
    state.limiter.check("verify", &ip.to_string()).await?;

    let record = state
        .sessions
        .get(&request.token)
        .await?
        .ok_or(ApiError::SessionNotFound)?;

    if state.sessions.is_expired(&record) {
        return Err(ApiError::SessionExpired);
    }
    match record.status {
        SessionStatus::Pending => {}
        SessionStatus::Consumed => return Err(ApiError::SessionConsumed),
        SessionStatus::Expired => return Err(ApiError::SessionExpired),
    }

    let report = state.engine.verify(&record.url).await;
    let payload = build_payload(&record, &ip.to_string(), report);
    let payload_value = serde_json::to_value(&payload)
        .map_err(|e| ApiError::Internal(format!("verdict serialization: {}", e)))?;

    state
        .sessions
        .consume(&request.token, record.clone(), payload_value.clone())
        .await?;

    // Push the verdict to the scanning device, but only when the session is
    // proximity-confirmed and the page is at least borderline trustworthy.
    let notify = matches!(
        payload.verdict,
        trust_engine::Verdict::Trusted | trust_engine::Verdict::Caution
    ) && record.proximity_confirmed();
    if notify {
        let hub = Arc::clone(&state.hub);
        let channel_key = record.channel_key(&request.token);
        tokio::spawn(async move {
            hub.send_verification_success(&channel_key, &payload_value).await;
        });
    } else {
        info!(
            nonce = %request.token,
            verdict = payload.verdict.as_str(),
            proximity_confirmed = record.proximity_confirmed(),
            "Skipping WebSocket notification"
        );
    }

    Ok(Json(payload))
}

/// `GET /api/v1/session/poll/{nonce}`
///
/// Returns the persisted status and, once consumed, the verdict payload.
pub async fn poll_session(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    Path(nonce): Path<String>,
) -> ApiResult<Json<PollResponse>> {
    state.limiter.check("poll", &ip.to_string()).await?;

    let record = state
        .sessions
        .get(&nonce)
        .await?
        .ok_or(ApiError::SessionNotFound)?;

    if record.status == SessionStatus::Pending && state.sessions.is_expired(&record) {
        return Ok(Json(PollResponse {
            status: SessionStatus::Expired,
            result: None,
        }));
    }
    Ok(Json(PollResponse {
        status: record.status,
        result: record.result,
    }))
}

/// `POST /api/v1/session/proximity/{nonce}`
///
/// Records the BLE proximity report. Confirmation is `supported && found`;
/// it gates notification, never verification.
pub async fn report_proximity(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    Path(nonce): Path<String>,
    Json(request): Json<ProximityRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    state.limiter.check("proximity", &ip.to_string()).await?;

    if !is_valid_nonce(&nonce) {
        return Err(ApiError::InvalidNonce);
    }

    let record = state
        .sessions
        .get(&nonce)
        .await?
        .ok_or(ApiError::SessionNotFound)?;
    if state.sessions.is_expired(&record) {
        return Err(ApiError::SessionExpired);
    }

    let confirmed = request.supported && request.found;
    let proximity = ProximityInfo {
        ble_uuid: request.ble_uuid,
        found: request.found,
        supported: request.supported,
        timestamp: request.timestamp,
        confirmed,
    };
    state
        .sessions
        .update_proximity(&nonce, record, proximity)
        .await?;
    info!(nonce = %nonce, confirmed = confirmed, "Proximity reported");

    Ok(Json(serde_json::json!({ "status": "proximity_confirmed" })))
}

/// `GET /health`
pub async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "webproof-broker",
        "version": crate::VERSION,
    }))
}

/// Denormalize the engine report into the client-facing payload.
fn build_payload(
    record: &SessionRecord,
    mobile_ip: &str,
    report: trust_engine::VerificationReport,
) -> VerdictPayload {
    let meta = parse_user_agent(record.ua.as_deref().unwrap_or(""));
    let mut details = report.details;
    details.bt_proximity = match &record.proximity {
        Some(p) if p.confirmed => "CONFIRMED".to_string(),
        Some(_) => "NOT_CONFIRMED".to_string(),
        None => "UNKNOWN".to_string(),
    };

    VerdictPayload {
        verdict: report.verdict,
        trust_score: report.trust_score,
        checked_url: record.url.clone(),
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true),
        client_ip: record.ip.clone(),
        user_agent: record.ua.clone(),
        mobile_ip: Some(mobile_ip.to_string()),
        device_os: meta.os,
        device_browser: meta.browser,
        device_brand: meta.brand,
        is_mobile: meta.is_mobile,
        logs: report.logs,
        details,
    }
}

/// Accept only plausible browser URLs: http(s), a host, bounded length.
fn validate_client_url(raw: &str) -> ApiResult<()> {
    if raw.len() > MAX_URL_LEN {
        return Err(ApiError::InvalidClientUrl("URL too long".to_string()));
    }
    let parsed = url::Url::parse(raw)
        .map_err(|e| ApiError::InvalidClientUrl(e.to_string()))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ApiError::InvalidClientUrl(format!(
            "unsupported scheme: {}",
            parsed.scheme()
        )));
    }
    if parsed.host_str().map(|h| h.is_empty()).unwrap_or(true) {
        warn!(url = raw, "Rejected URL without host");
        return Err(ApiError::InvalidClientUrl("missing host".to_string()));
    }
    Ok(())
}
