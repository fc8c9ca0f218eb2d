//! Broker configuration with validation.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;

use broker_store::RateLimitConfig;
use serde::{Deserialize, Serialize};

/// Main broker configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    /// Bind address.
    pub host: IpAddr,
    /// Bind port.
    pub port: u16,
    /// Session lifetime in seconds.
    pub session_ttl: u64,
    /// Per-operation request limits.
    #[serde(skip)]
    pub rate_limit: RateLimitConfig,
    /// Socket cap per notification channel.
    pub max_sockets_per_channel: usize,
    /// Redis host.
    pub redis_host: String,
    /// Redis port.
    pub redis_port: u16,
    /// Trust every `*.badssl.com` host. Never enable in production.
    pub test_ssl: bool,
    /// Relax the WebSocket same-IP guard. Test environments only.
    pub relax_ws_ip_guard: bool,
    /// Override for the upstream trust-anchor feed.
    pub whitelist_api_url: Option<String>,
    /// Override for the trust-anchor snapshot file.
    pub whitelist_snapshot: Option<PathBuf>,
    /// Trust-anchor cache lifetime in seconds.
    pub whitelist_cache_ttl: u64,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 8000,
            session_ttl: 30,
            rate_limit: RateLimitConfig::default(),
            max_sockets_per_channel: 5,
            redis_host: "localhost".to_string(),
            redis_port: 6379,
            test_ssl: false,
            relax_ws_ip_guard: false,
            whitelist_api_url: None,
            whitelist_snapshot: None,
            whitelist_cache_ttl: 3600,
        }
    }
}

impl BrokerConfig {
    /// Build a configuration from environment variables, falling back to
    /// defaults for anything unset.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(host) = env_parse::<IpAddr>("BIND_HOST") {
            config.host = host;
        }
        if let Some(port) = env_parse::<u16>("BIND_PORT") {
            config.port = port;
        }
        if let Some(ttl) = env_parse::<u64>("SESSION_TTL") {
            config.session_ttl = ttl;
        }
        if let Ok(host) = std::env::var("REDIS_HOST") {
            config.redis_host = host;
        }
        if let Some(port) = env_parse::<u16>("REDIS_PORT") {
            config.redis_port = port;
        }
        config.test_ssl = env_flag("TEST_SSL");
        config.relax_ws_ip_guard = env_flag("TEST");
        if let Ok(url) = std::env::var("WHITELIST_API_URL") {
            config.whitelist_api_url = Some(url);
        }
        if let Ok(path) = std::env::var("WHITELIST_SNAPSHOT") {
            config.whitelist_snapshot = Some(PathBuf::from(path));
        }
        if let Some(ttl) = env_parse::<u64>("WHITELIST_CACHE_TTL") {
            config.whitelist_cache_ttl = ttl;
        }
        config
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.session_ttl == 0 {
            return Err(ConfigError::InvalidTtl);
        }
        if self.max_sockets_per_channel == 0 {
            return Err(ConfigError::InvalidSocketLimit);
        }
        Ok(())
    }

    /// Bind address for the HTTP/WS server.
    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok()?.parse().ok()
}

fn env_flag(name: &str) -> bool {
    std::env::var(name)
        .map(|v| matches!(v.to_ascii_lowercase().as_str(), "true" | "1" | "yes"))
        .unwrap_or(false)
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("session_ttl cannot be 0")]
    InvalidTtl,
    #[error("max_sockets_per_channel cannot be 0")]
    InvalidSocketLimit,
}
