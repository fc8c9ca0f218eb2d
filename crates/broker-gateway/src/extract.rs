//! Client IP extraction.
//!
//! Proxied deployments carry the original client address in forwarding
//! headers; direct connections fall back to the socket peer. The rate
//! limiter and the WebSocket same-IP guard both key on this value.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use axum::async_trait;
use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::request::Parts;

/// Extractor yielding the best-effort client IP.
#[derive(Debug, Clone, Copy)]
pub struct ClientIp(pub IpAddr);

#[async_trait]
impl<S> FromRequestParts<S> for ClientIp
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(ClientIp(client_ip_from_parts(parts)))
    }
}

fn client_ip_from_parts(parts: &Parts) -> IpAddr {
    // X-Forwarded-For first (original client is the leftmost entry).
    if let Some(forwarded) = parts.headers.get("x-forwarded-for") {
        if let Ok(forwarded) = forwarded.to_str() {
            if let Some(first) = forwarded.split(',').next() {
                if let Ok(ip) = first.trim().parse::<IpAddr>() {
                    return ip;
                }
            }
        }
    }

    if let Some(real_ip) = parts.headers.get("x-real-ip") {
        if let Ok(real_ip) = real_ip.to_str() {
            if let Ok(ip) = real_ip.trim().parse::<IpAddr>() {
                return ip;
            }
        }
    }

    if let Some(connect_info) = parts.extensions.get::<ConnectInfo<SocketAddr>>() {
        return connect_info.0.ip();
    }

    IpAddr::V4(Ipv4Addr::LOCALHOST)
}
