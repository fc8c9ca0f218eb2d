//! Trust-anchor registry.
//!
//! A refreshable set of officially registered domains. Load order on a stale
//! cache: local JSON snapshot, then the paginated upstream feed, then a
//! hard-coded minimal fallback, so the registry is never empty. A successful
//! upstream load writes a fresh snapshot for the next boot, and no failure
//! ever clears a previously loaded cache.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::ports::{Clock, SystemClock, TrustAnchors};

/// Registry configuration.
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Paginated upstream feed (JSON:API shape).
    pub api_url: String,
    /// Local snapshot, read at boot and rewritten after upstream loads.
    pub snapshot_path: PathBuf,
    /// How long a loaded set stays fresh.
    pub cache_ttl: Duration,
    /// Trust every `*.badssl.com` host. Never enable in production.
    pub test_ssl: bool,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            api_url:
                "https://api.dane.gov.pl/1.4/resources/63616,lista-nazw-domeny-govpl-z-usuga-www/data"
                    .to_string(),
            snapshot_path: PathBuf::from("data/official_domains.json"),
            cache_ttl: Duration::from_secs(3600),
            test_ssl: false,
        }
    }
}

struct Cache {
    domains: HashSet<String>,
    loaded_at: Option<f64>,
}

/// Refreshable trusted-domain set.
pub struct TrustAnchorRegistry {
    config: RegistryConfig,
    http: reqwest::Client,
    clock: Arc<dyn Clock>,
    cache: RwLock<Cache>,
}

impl TrustAnchorRegistry {
    pub fn new(config: RegistryConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: RegistryConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
            clock,
            cache: RwLock::new(Cache {
                domains: HashSet::new(),
                loaded_at: None,
            }),
        }
    }

    /// Build a registry with a pre-seeded, already-fresh domain set.
    ///
    /// Bypasses snapshot and upstream loading entirely; meant for tests and
    /// embedders that manage the set themselves.
    pub fn with_domains<I, S>(config: RegistryConfig, domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let registry = Self::new(config);
        let set = normalize_domains(domains.into_iter().map(Into::into));
        let now = registry.clock.now_utc().timestamp() as f64;
        *registry.cache.write() = Cache {
            domains: set,
            loaded_at: Some(now),
        };
        registry
    }

    /// Check whether `url` points at a registered domain.
    ///
    /// Matches the exact host, the host without a `www.` prefix, and any
    /// parent suffix joined at a label boundary, but never the bare TLD,
    /// so registering `pl` cannot trust `evil.pl`.
    pub async fn is_trusted(&self, url: &str) -> bool {
        self.refresh_if_stale().await;

        let Some(domain) = host_of(url) else {
            return false;
        };

        if self.config.test_ssl && domain.ends_with(".badssl.com") {
            debug!(domain = %domain, "Test-SSL mode, trusting badssl.com host");
            return true;
        }

        let cache = self.cache.read();
        if cache.domains.contains(&domain) {
            return true;
        }
        if let Some(stripped) = domain.strip_prefix("www.") {
            if cache.domains.contains(stripped) {
                return true;
            }
        }

        // Walk parent suffixes: auth.podatki.gov.pl -> podatki.gov.pl -> gov.pl.
        // The loop stops before a single label remains.
        let parts: Vec<&str> = domain.split('.').collect();
        for i in 1..parts.len().saturating_sub(1) {
            let parent = parts[i..].join(".");
            if cache.domains.contains(&parent) {
                return true;
            }
        }
        false
    }

    async fn refresh_if_stale(&self) {
        {
            let cache = self.cache.read();
            let now = self.clock.now_utc().timestamp() as f64;
            if let Some(loaded_at) = cache.loaded_at {
                if !cache.domains.is_empty()
                    && now - loaded_at < self.config.cache_ttl.as_secs_f64()
                {
                    return;
                }
            }
        }

        if let Some(domains) = self.load_snapshot().await {
            info!(count = domains.len(), "Loaded trust anchors from snapshot");
            self.install(domains);
            return;
        }

        match self.fetch_upstream().await {
            Ok(domains) if !domains.is_empty() => {
                info!(count = domains.len(), "Loaded trust anchors from upstream feed");
                self.persist_snapshot(&domains).await;
                self.install(domains);
            }
            Ok(_) | Err(_) => {
                let mut cache = self.cache.write();
                if cache.domains.is_empty() {
                    warn!("Trust anchor load failed, using fallback set");
                    cache.domains = fallback_domains();
                    cache.loaded_at = Some(self.clock.now_utc().timestamp() as f64);
                } else {
                    warn!(
                        count = cache.domains.len(),
                        "Trust anchor refresh failed, keeping existing cache"
                    );
                }
            }
        }
    }

    fn install(&self, domains: HashSet<String>) {
        let mut cache = self.cache.write();
        cache.domains = domains;
        cache.loaded_at = Some(self.clock.now_utc().timestamp() as f64);
    }

    /// Read the snapshot file: either a bare array of domains or an object
    /// with a `domains` / `data` array.
    async fn load_snapshot(&self) -> Option<HashSet<String>> {
        let raw = tokio::fs::read(&self.config.snapshot_path).await.ok()?;
        let value: serde_json::Value = match serde_json::from_slice(&raw) {
            Ok(v) => v,
            Err(e) => {
                warn!(path = %self.config.snapshot_path.display(), error = %e, "Snapshot parse failed");
                return None;
            }
        };
        let list = match &value {
            serde_json::Value::Array(items) => items.as_slice(),
            serde_json::Value::Object(obj) => obj
                .get("domains")
                .or_else(|| obj.get("data"))
                .and_then(|v| v.as_array())
                .map(|v| v.as_slice())
                .unwrap_or(&[]),
            _ => &[],
        };
        let domains = normalize_domains(
            list.iter()
                .filter_map(|v| v.as_str())
                .map(|s| s.to_string()),
        );
        if domains.is_empty() {
            None
        } else {
            Some(domains)
        }
    }

    /// Fetch every page of the upstream feed.
    async fn fetch_upstream(&self) -> Result<HashSet<String>, reqwest::Error> {
        let mut domains = HashSet::new();
        let mut next_url = Some(self.config.api_url.clone());
        let mut page = 1u32;

        while let Some(url) = next_url {
            debug!(page = page, "Fetching trust anchor feed page");
            let body: serde_json::Value = self
                .http
                .get(&url)
                .timeout(Duration::from_secs(10))
                .send()
                .await?
                .error_for_status()?
                .json()
                .await?;

            let (page_domains, next) = parse_feed_page(&body);
            domains.extend(page_domains);
            next_url = next;
            page += 1;

            // Be gentle with the upstream.
            tokio::time::sleep(Duration::from_millis(100)).await;
        }

        info!(pages = page - 1, count = domains.len(), "Fetched trust anchor feed");
        Ok(domains)
    }

    async fn persist_snapshot(&self, domains: &HashSet<String>) {
        let mut sorted: Vec<&String> = domains.iter().collect();
        sorted.sort();
        let json = match serde_json::to_vec_pretty(&sorted) {
            Ok(json) => json,
            Err(_) => return,
        };
        if let Some(parent) = self.config.snapshot_path.parent() {
            let _ = tokio::fs::create_dir_all(parent).await;
        }
        match tokio::fs::write(&self.config.snapshot_path, json).await {
            Ok(()) => debug!(path = %self.config.snapshot_path.display(), "Saved trust anchor snapshot"),
            Err(e) => warn!(error = %e, "Could not save trust anchor snapshot"),
        }
    }
}

#[async_trait]
impl TrustAnchors for TrustAnchorRegistry {
    async fn is_trusted(&self, url: &str) -> bool {
        TrustAnchorRegistry::is_trusted(self, url).await
    }
}

/// Extract the lowercased host of a URL, without the port.
fn host_of(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    let host = parsed.host_str()?;
    Some(host.trim().to_ascii_lowercase())
}

/// Extract one feed page: domains from `data[].attributes.col1.val` and the
/// `links.next` URL.
fn parse_feed_page(body: &serde_json::Value) -> (HashSet<String>, Option<String>) {
    let mut domains = HashSet::new();
    if let Some(items) = body.get("data").and_then(|v| v.as_array()) {
        for item in items {
            if let Some(val) = item
                .pointer("/attributes/col1/val")
                .and_then(|v| v.as_str())
            {
                insert_normalized(&mut domains, val);
            }
        }
    }
    let next = body
        .pointer("/links/next")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string());
    (domains, next)
}

fn normalize_domains(iter: impl Iterator<Item = String>) -> HashSet<String> {
    let mut domains = HashSet::new();
    for raw in iter {
        insert_normalized(&mut domains, &raw);
    }
    domains
}

/// Lowercase, trim, and index `www.`-prefixed entries both ways.
fn insert_normalized(domains: &mut HashSet<String>, raw: &str) {
    let domain = raw.trim().to_ascii_lowercase();
    if domain.is_empty() {
        return;
    }
    if let Some(stripped) = domain.strip_prefix("www.") {
        domains.insert(stripped.to_string());
    }
    domains.insert(domain);
}

/// Minimal set used when every load path fails.
fn fallback_domains() -> HashSet<String> {
    [
        "gov.pl",
        "www.gov.pl",
        "podatki.gov.pl",
        "moje.gov.pl",
        "pacjent.gov.pl",
        "profil-zaufany.pl",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}
