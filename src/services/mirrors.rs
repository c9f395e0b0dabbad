// src/services/mirrors.rs

//! Mirror registry and selection.
//!
//! The registry is the ordered candidate list (and the SSRF allow-list).
//! The selector probes candidates concurrently and caches the outcome:
//! a reachable mirror for a long window, a total outage for a short one.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures::stream::{FuturesUnordered, StreamExt};
use url::Url;

use crate::cache::MirrorStateCache;
use crate::error::{AppError, Result};
use crate::models::{CacheConfig, MirrorState, SiteConfig};
use crate::transport::{ProbeMethod, Session};
use crate::utils::normalize_host;

/// Known mirrors, tried after the configured ones.
pub const DEFAULT_MIRRORS: &[&str] = &[
    "audiobookbay.lu",
    "audiobookbay.is",
    "audiobookbay.se",
    "audiobookbay.li",
    "audiobookbay.ws",
    "audiobookbay.la",
    "audiobookbay.me",
    "audiobookbay.fi",
    "theaudiobookbay.com",
    "audiobookbay.nl",
    "audiobookbay.pl",
];

/// Ordered, deduplicated candidate hostnames. Order is priority.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorRegistry {
    hosts: Vec<String>,
}

impl MirrorRegistry {
    /// Primary first, then `extra`, then `defaults`.
    pub fn new<S: AsRef<str>>(primary: &str, extra: &[S], defaults: &[&str]) -> Self {
        let mut seen = HashSet::new();
        let hosts = std::iter::once(primary)
            .chain(extra.iter().map(AsRef::as_ref))
            .chain(defaults.iter().copied())
            .filter_map(normalize_host)
            .filter(|host| seen.insert(host.clone()))
            .collect();
        Self { hosts }
    }

    pub fn from_config(site: &SiteConfig) -> Self {
        Self::new(&site.primary_host, &site.mirrors, DEFAULT_MIRRORS)
    }

    pub fn hosts(&self) -> &[String] {
        &self.hosts
    }

    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }

    /// Whether `host` is one of the candidates. Case-insensitive.
    pub fn contains(&self, host: &str) -> bool {
        let host = host.trim().to_lowercase();
        self.hosts.iter().any(|h| *h == host)
    }
}

/// Picks the mirror every search runs against.
pub struct MirrorSelector {
    registry: Arc<MirrorRegistry>,
    probe: Arc<dyn Session>,
    state: MirrorStateCache,
    probe_round: tokio::sync::Mutex<()>,
    invalidations: AtomicUsize,
}

impl MirrorSelector {
    pub fn new(registry: Arc<MirrorRegistry>, probe: Arc<dyn Session>, cache: &CacheConfig) -> Self {
        Self {
            registry,
            probe,
            state: MirrorStateCache::new(
                Duration::from_secs(cache.mirror_ttl_secs),
                Duration::from_secs(cache.mirror_failure_ttl_secs),
            ),
            probe_round: tokio::sync::Mutex::new(()),
            invalidations: AtomicUsize::new(0),
        }
    }

    pub fn registry(&self) -> &MirrorRegistry {
        &self.registry
    }

    /// Return a reachable mirror hostname.
    ///
    /// A cached outage short-circuits to [`AppError::NoMirrorAvailable`]
    /// without touching the network. Concurrent callers share one probe
    /// round.
    pub async fn select(&self) -> Result<String> {
        if let Some(host) = self.cached()? {
            return Ok(host);
        }

        let _round = self.probe_round.lock().await;
        if let Some(host) = self.cached()? {
            return Ok(host);
        }

        log::info!("Probing {} mirrors", self.registry.len());
        let mut probes: FuturesUnordered<_> = self
            .registry
            .hosts()
            .iter()
            .map(|host| async move { (host, self.probe_host(host).await) })
            .collect();

        while let Some((host, reachable)) = probes.next().await {
            if reachable {
                log::info!("Active mirror: {}", host);
                self.state.put_active(host.clone());
                return Ok(host.clone());
            }
        }

        log::warn!("All mirrors unreachable; backing off");
        self.state.put_all_down();
        Err(AppError::NoMirrorAvailable)
    }

    /// The cached active mirror, without probing.
    pub fn active(&self) -> Option<String> {
        self.state
            .get()
            .and_then(|state| state.active_host().map(str::to_string))
    }

    /// Forget `host` as the active mirror after a transport failure.
    ///
    /// Has no effect if another mirror has since become active.
    pub fn invalidate(&self, host: &str) -> bool {
        let cleared = self.state.invalidate_active(host);
        if cleared {
            self.invalidations.fetch_add(1, Ordering::SeqCst);
            log::warn!("Invalidated mirror {}", host);
        }
        cleared
    }

    /// How many times an active mirror has been cleared.
    pub fn invalidation_count(&self) -> usize {
        self.invalidations.load(Ordering::SeqCst)
    }

    fn cached(&self) -> Result<Option<String>> {
        match self.state.get() {
            Some(MirrorState::Active { host, .. }) => Ok(Some(host)),
            Some(MirrorState::AllDown { .. }) => Err(AppError::NoMirrorAvailable),
            None => Ok(None),
        }
    }

    /// HEAD first; fall back to GET only when HEAD is refused with 403/405.
    async fn probe_host(&self, host: &str) -> bool {
        let Ok(url) = Url::parse(&format!("https://{host}/")) else {
            return false;
        };

        match self.probe.probe(&url, ProbeMethod::Head).await {
            Ok(status) if is_success(status) => true,
            Ok(status @ (403 | 405)) => {
                log::debug!("{} refused HEAD with {}; retrying with GET", host, status);
                match self.probe.probe(&url, ProbeMethod::Get).await {
                    Ok(status) => is_success(status),
                    Err(e) => {
                        log::debug!("Probe GET {} failed: {}", host, e);
                        false
                    }
                }
            }
            Ok(status) => {
                log::debug!("Probe {} answered {}", host, status);
                false
            }
            Err(e) => {
                log::debug!("Probe {} failed: {}", host, e);
                false
            }
        }
    }
}

fn is_success(status: u16) -> bool {
    (200..300).contains(&status)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::error::TransportError;
    use crate::transport::fake::FakeWeb;

    fn selector(web: &FakeWeb, hosts: &[&str], cache: CacheConfig) -> MirrorSelector {
        let registry = Arc::new(MirrorRegistry::new(hosts[0], &hosts[1..], &[]));
        MirrorSelector::new(registry, Arc::new(web.clone()), &cache)
    }

    #[test]
    fn registry_orders_and_dedups() {
        let registry = MirrorRegistry::new(
            "AudioBookBay.is",
            &["https://audiobookbay.se/", "audiobookbay.is", " "],
            &["audiobookbay.lu", "audiobookbay.se"],
        );
        assert_eq!(
            registry.hosts(),
            &["audiobookbay.is", "audiobookbay.se", "audiobookbay.lu"]
        );
        assert!(registry.contains("AUDIOBOOKBAY.LU"));
        assert!(!registry.contains("evil.example"));
    }

    #[test]
    fn default_registry_includes_builtins() {
        let registry = MirrorRegistry::from_config(&SiteConfig::default());
        assert_eq!(registry.hosts()[0], "audiobookbay.lu");
        assert_eq!(registry.len(), DEFAULT_MIRRORS.len());
    }

    #[tokio::test]
    async fn reachable_mirror_is_cached() {
        let web = FakeWeb::new();
        web.probe_status("b.example", ProbeMethod::Head, 200);
        let selector = selector(&web, &["a.example", "b.example"], CacheConfig::default());

        assert_eq!(selector.select().await.unwrap(), "b.example");
        let probes = web.probe_count();
        assert_eq!(selector.select().await.unwrap(), "b.example");
        assert_eq!(web.probe_count(), probes);
        assert_eq!(selector.active().as_deref(), Some("b.example"));
    }

    #[tokio::test]
    async fn fastest_reachable_mirror_wins_over_list_order() {
        let web = FakeWeb::new();
        web.probe_status("slow.example", ProbeMethod::Head, 200)
            .probe_status("fast.example", ProbeMethod::Head, 200)
            .probe_delay("slow.example", Duration::from_secs(5));
        let selector = selector(&web, &["slow.example", "fast.example"], CacheConfig::default());
        assert_eq!(selector.registry().hosts()[0], "slow.example");

        let started = tokio::time::Instant::now();
        assert_eq!(selector.select().await.unwrap(), "fast.example");
        assert!(started.elapsed() < Duration::from_secs(2));
        assert_eq!(selector.active().as_deref(), Some("fast.example"));
        assert_eq!(web.probe_count(), 2);
    }

    #[tokio::test]
    async fn all_down_backs_off_without_probing() {
        let web = FakeWeb::new();
        web.probe_error("a.example", ProbeMethod::Head, TransportError::Timeout);
        let selector = selector(&web, &["a.example", "b.example"], CacheConfig::default());

        assert!(matches!(
            selector.select().await,
            Err(AppError::NoMirrorAvailable)
        ));
        let probes = web.probe_count();
        assert_eq!(probes, 2);

        assert!(matches!(
            selector.select().await,
            Err(AppError::NoMirrorAvailable)
        ));
        assert_eq!(web.probe_count(), probes);
    }

    #[tokio::test]
    async fn backoff_expires_and_probing_resumes() {
        let web = FakeWeb::new();
        let cache = CacheConfig {
            mirror_failure_ttl_secs: 0,
            ..CacheConfig::default()
        };
        let selector = selector(&web, &["a.example"], cache);

        assert!(selector.select().await.is_err());
        web.probe_status("a.example", ProbeMethod::Head, 204);
        assert_eq!(selector.select().await.unwrap(), "a.example");
    }

    #[tokio::test]
    async fn head_rejection_falls_back_to_get() {
        let web = FakeWeb::new();
        web.probe_status("a.example", ProbeMethod::Head, 405)
            .probe_status("a.example", ProbeMethod::Get, 200);
        let selector = selector(&web, &["a.example"], CacheConfig::default());

        assert_eq!(selector.select().await.unwrap(), "a.example");
        assert_eq!(
            web.probe_log(),
            vec![
                ("a.example".to_string(), ProbeMethod::Head),
                ("a.example".to_string(), ProbeMethod::Get),
            ]
        );
    }

    #[tokio::test]
    async fn head_timeout_does_not_fall_back() {
        let web = FakeWeb::new();
        web.probe_error("a.example", ProbeMethod::Head, TransportError::Timeout)
            .probe_status("a.example", ProbeMethod::Get, 200);
        let selector = selector(&web, &["a.example"], CacheConfig::default());

        assert!(selector.select().await.is_err());
        assert_eq!(web.probe_count(), 1);
    }

    #[tokio::test]
    async fn invalidate_clears_only_matching_mirror() {
        let web = FakeWeb::new();
        web.probe_status("a.example", ProbeMethod::Head, 200);
        let selector = selector(&web, &["a.example"], CacheConfig::default());
        selector.select().await.unwrap();

        assert!(!selector.invalidate("other.example"));
        assert!(selector.invalidate("a.example"));
        assert!(!selector.invalidate("a.example"));
        assert_eq!(selector.invalidation_count(), 1);
        assert_eq!(selector.active(), None);
    }
}
