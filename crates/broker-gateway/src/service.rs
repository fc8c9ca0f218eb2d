//! Broker service wiring: router assembly and serving.

use std::net::SocketAddr;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::handlers::{self, AppState};
use crate::ws;

/// The HTTP/WebSocket broker service.
pub struct BrokerService {
    state: AppState,
}

impl BrokerService {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }

    /// Build the full router: versioned API, WebSocket endpoint, health.
    pub fn router(&self) -> Router {
        let api = Router::new()
            .route("/session/init", post(handlers::init_session))
            .route("/session/verify", post(handlers::verify_token))
            .route("/session/poll/:nonce", get(handlers::poll_session))
            .route("/session/proximity/:nonce", post(handlers::report_proximity));

        Router::new()
            .nest("/api/v1", api)
            .route("/ws/verification/:nonce", get(ws::handler::ws_verification))
            .route("/health", get(handlers::health_check))
            .layer(CorsLayer::permissive())
            .with_state(self.state.clone())
    }

    /// Bind and serve until the process is stopped.
    pub async fn serve(self, addr: SocketAddr) -> std::io::Result<()> {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        info!(addr = %addr, "Broker listening");
        axum::serve(
            listener,
            self.router()
                .into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
    }
}
