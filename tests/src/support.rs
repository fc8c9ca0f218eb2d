//! Shared test fixtures.
//!
//! Flows run against the real router with a manual clock, the in-memory
//! store, and a canned verdict source, so every TTL and rate-limit behavior
//! is deterministic and no test touches the network for verification.

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, Response};
use axum::Router;
use broker_gateway::{
    AppState, BrokerConfig, BrokerService, NotificationHub, SessionManager, VerdictSource,
};
use broker_store::{ManualTimeSource, MemoryStore, RateLimiter};
use tower::ServiceExt;
use trust_engine::{VerificationDetails, VerificationReport, Verdict};

/// Verdict source that trusts `gov.pl` hosts and rejects everything else,
/// mirroring the engine's registry short-circuit.
pub struct StubEngine;

#[async_trait]
impl VerdictSource for StubEngine {
    async fn verify(&self, url: &str) -> VerificationReport {
        let host = url
            .split("://")
            .nth(1)
            .unwrap_or("")
            .split('/')
            .next()
            .unwrap_or("");
        let trusted = host == "gov.pl" || host.ends_with(".gov.pl");
        let mut details = VerificationDetails::default();
        if trusted {
            details.whitelist = "PASS".to_string();
            VerificationReport {
                verdict: Verdict::Trusted,
                trust_score: 100,
                logs: vec!["Domain is in official whitelist.".to_string()],
                details,
            }
        } else {
            details.whitelist = "FAIL".to_string();
            VerificationReport {
                verdict: Verdict::Unsafe,
                trust_score: 0,
                logs: vec!["Domain NOT in official whitelist.".to_string()],
                details,
            }
        }
    }
}

/// Everything a flow test needs to reach into the fixture.
pub struct TestBroker {
    pub router: Router,
    pub clock: Arc<ManualTimeSource>,
    pub store: Arc<MemoryStore>,
    pub hub: Arc<NotificationHub>,
    pub state: AppState,
}

/// Build a broker over a manual clock and memory store.
pub fn test_broker(config: BrokerConfig) -> TestBroker {
    let clock = ManualTimeSource::new(1_700_000_000.0);
    let store = Arc::new(MemoryStore::new(clock.clone()));
    let hub = Arc::new(NotificationHub::new(config.max_sockets_per_channel));

    let state = AppState {
        sessions: Arc::new(SessionManager::new(
            store.clone(),
            clock.clone(),
            config.session_ttl,
        )),
        engine: Arc::new(StubEngine),
        hub: hub.clone(),
        limiter: Arc::new(RateLimiter::new(
            store.clone(),
            clock.clone(),
            config.rate_limit.clone(),
        )),
        config: Arc::new(config),
    };

    TestBroker {
        router: BrokerService::new(state.clone()).router(),
        clock,
        store,
        hub,
        state,
    }
}

pub fn default_broker() -> TestBroker {
    test_broker(BrokerConfig::default())
}

/// Serve the fixture's router on an ephemeral port for WebSocket tests.
/// HTTP calls can keep going through `oneshot`; the state is shared.
pub async fn spawn_server(broker: &TestBroker) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind test listener");
    let addr = listener.local_addr().expect("listener addr");
    let router = broker.router.clone();
    tokio::spawn(async move {
        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .expect("test server");
    });
    addr
}

/// Browser IP used for init calls, distinct from the test host so the
/// WebSocket same-IP guard sees the socket as the other device.
pub const BROWSER_IP: &str = "10.9.9.9";

pub async fn send(router: &Router, request: Request<Body>) -> Response<Body> {
    router.clone().oneshot(request).await.expect("router call")
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    serde_json::from_slice(&bytes).expect("json body")
}

/// `POST /api/v1/session/init` from `ip`, returning the response.
pub async fn init_request(router: &Router, url: &str, ip: &str) -> Response<Body> {
    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/session/init")
        .header("X-Client-Url", url)
        .header("X-Forwarded-For", ip)
        .header(
            "User-Agent",
            "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) Mobile Safari/604.1",
        )
        .body(Body::empty())
        .expect("request");
    send(router, request).await
}

/// Run init and return the allocated nonce.
pub async fn init_session(router: &Router, url: &str) -> String {
    let response = init_request(router, url, BROWSER_IP).await;
    assert_eq!(response.status(), 201);
    let body = body_json(response).await;
    body["nonce"].as_str().expect("nonce").to_string()
}

/// `POST /api/v1/session/verify` for `token` from `ip`.
pub async fn verify_request(router: &Router, token: &str, ip: &str) -> Response<Body> {
    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/session/verify")
        .header("Content-Type", "application/json")
        .header("X-Forwarded-For", ip)
        .body(Body::from(
            serde_json::json!({ "token": token }).to_string(),
        ))
        .expect("request");
    send(router, request).await
}

/// `POST /api/v1/session/proximity/{nonce}`.
pub async fn proximity_request(
    router: &Router,
    nonce: &str,
    ble_uuid: Option<&str>,
    found: bool,
    supported: bool,
) -> Response<Body> {
    let mut payload = serde_json::json!({
        "found": found,
        "supported": supported,
        "timestamp": "2024-01-01T00:00:00Z",
    });
    if let Some(uuid) = ble_uuid {
        payload["ble_uuid"] = serde_json::json!(uuid);
    }
    let request = Request::builder()
        .method("POST")
        .uri(format!("/api/v1/session/proximity/{}", nonce))
        .header("Content-Type", "application/json")
        .header("X-Forwarded-For", BROWSER_IP)
        .body(Body::from(payload.to_string()))
        .expect("request");
    send(router, request).await
}

/// `GET /api/v1/session/poll/{nonce}`.
pub async fn poll_request(router: &Router, nonce: &str) -> Response<Body> {
    let request = Request::builder()
        .method("GET")
        .uri(format!("/api/v1/session/poll/{}", nonce))
        .header("X-Forwarded-For", BROWSER_IP)
        .body(Body::empty())
        .expect("request");
    send(router, request).await
}
