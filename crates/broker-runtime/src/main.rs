//! # WebProof Broker Runtime
//!
//! The main entry point for the WebProof trust broker.
//!
//! Configuration comes from the environment (`BIND_HOST`, `BIND_PORT`,
//! `REDIS_HOST`, `REDIS_PORT`, `SESSION_TTL`, `TEST_SSL`, `TEST`,
//! `WHITELIST_API_URL`, `WHITELIST_SNAPSHOT`, `WHITELIST_CACHE_TTL`). The
//! Redis store backs sessions and rate-limit counters; the trust-anchor
//! registry refreshes itself from a local snapshot or the upstream feed.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use broker_gateway::{AppState, BrokerConfig, BrokerService, NotificationHub, SessionManager};
use broker_store::{RateLimiter, RedisStore, SystemTimeSource, TimeSource};
use tracing::info;
use tracing_subscriber::EnvFilter;
use trust_engine::{
    ChainFetcher, RegistryConfig, RevocationProber, TrustAnchorRegistry, VerificationEngine,
};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = BrokerConfig::from_env();
    config.validate().context("invalid configuration")?;

    info!("===========================================");
    info!("WebProof trust broker starting");
    info!("Bind: {}", config.bind_addr());
    info!("Redis: {}:{}", config.redis_host, config.redis_port);
    info!("Session TTL: {}s", config.session_ttl);
    if config.test_ssl {
        info!("Test-SSL mode enabled (badssl.com hosts trusted)");
    }
    info!("===========================================");

    let store = Arc::new(
        RedisStore::connect(&config.redis_host, config.redis_port)
            .await
            .context("connecting to Redis")?,
    );
    let time: Arc<dyn TimeSource> = Arc::new(SystemTimeSource);

    let mut registry_config = RegistryConfig {
        test_ssl: config.test_ssl,
        cache_ttl: Duration::from_secs(config.whitelist_cache_ttl),
        ..RegistryConfig::default()
    };
    if let Some(url) = &config.whitelist_api_url {
        registry_config.api_url = url.clone();
    }
    if let Some(path) = &config.whitelist_snapshot {
        registry_config.snapshot_path = path.clone();
    }

    let engine = Arc::new(VerificationEngine::new(
        Arc::new(TrustAnchorRegistry::new(registry_config)),
        Arc::new(ChainFetcher::new()),
        Arc::new(RevocationProber::new()),
    ));

    let state = AppState {
        sessions: Arc::new(SessionManager::new(
            store.clone(),
            time.clone(),
            config.session_ttl,
        )),
        engine,
        hub: Arc::new(NotificationHub::new(config.max_sockets_per_channel)),
        limiter: Arc::new(RateLimiter::new(store, time, config.rate_limit.clone())),
        config: Arc::new(config.clone()),
    };

    let addr = config.bind_addr();
    BrokerService::new(state)
        .serve(addr)
        .await
        .context("broker server")?;
    Ok(())
}
