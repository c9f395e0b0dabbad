//! Application configuration structures.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::ClientKind;

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Target site hostnames
    #[serde(default)]
    pub site: SiteConfig,

    /// HTTP and crawling behavior settings
    #[serde(default)]
    pub crawler: CrawlerConfig,

    /// In-process cache lifetimes and sizes
    #[serde(default)]
    pub cache: CacheConfig,

    /// Magnet tracker sources
    #[serde(default)]
    pub trackers: TrackerConfig,

    /// Download client connection
    #[serde(default)]
    pub client: ClientConfig,

    /// Log output
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.site.primary_host.trim().is_empty() {
            return Err(AppError::validation("site.primary_host is empty"));
        }
        if self.crawler.timeout_secs == 0 {
            return Err(AppError::validation("crawler.timeout_secs must be > 0"));
        }
        if self.crawler.probe_timeout_secs == 0 {
            return Err(AppError::validation(
                "crawler.probe_timeout_secs must be > 0",
            ));
        }
        if self.crawler.worker_threads == 0 {
            return Err(AppError::validation("crawler.worker_threads must be > 0"));
        }
        if self.crawler.max_concurrent_requests == 0 {
            return Err(AppError::validation(
                "crawler.max_concurrent_requests must be > 0",
            ));
        }
        if self.crawler.page_limit == 0 {
            return Err(AppError::validation("crawler.page_limit must be > 0"));
        }
        if self.crawler.page_limit > self.crawler.max_page_limit {
            return Err(AppError::validation(
                "crawler.page_limit must not exceed crawler.max_page_limit",
            ));
        }
        if self.crawler.jitter_min_ms > self.crawler.jitter_max_ms {
            return Err(AppError::validation(
                "crawler.jitter_min_ms must not exceed crawler.jitter_max_ms",
            ));
        }
        if self.cache.search_capacity == 0 || self.cache.details_capacity == 0 {
            return Err(AppError::validation("cache capacities must be > 0"));
        }
        Ok(())
    }

    /// Apply overrides from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary key lookup.
    ///
    /// Unparsable numeric values are ignored with a warning so a typo in the
    /// environment never prevents startup.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("ABB_HOSTNAME") {
            let host = host.trim_matches(|c: char| c.is_whitespace() || c == '"' || c == '\'');
            if !host.is_empty() {
                self.site.primary_host = host.to_string();
            }
        }
        if let Some(mirrors) = lookup("ABB_MIRRORS") {
            self.site.mirrors = split_list(&mirrors);
        }
        if let Some(trackers) = lookup("MAGNET_TRACKERS") {
            self.trackers.list = split_list(&trackers);
        }
        if let Some(limit) = lookup("PAGE_LIMIT").and_then(|v| parse_count("PAGE_LIMIT", &v)) {
            self.crawler.page_limit = limit as u32;
        }
        if let Some(threads) =
            lookup("SCRAPER_THREADS").and_then(|v| parse_count("SCRAPER_THREADS", &v))
        {
            self.crawler.worker_threads = threads as usize;
        }
        if let Some(timeout) =
            lookup("SCRAPER_TIMEOUT").and_then(|v| parse_count("SCRAPER_TIMEOUT", &v))
        {
            self.crawler.timeout_secs = timeout;
        }
        if let Some(kind) = lookup("DL_CLIENT") {
            match kind.parse::<ClientKind>() {
                Ok(kind) => self.client.kind = Some(kind),
                Err(e) => log::warn!("Ignoring DL_CLIENT: {}", e),
            }
        }
        if let Some(host) = non_empty(lookup("DL_HOST")) {
            self.client.host = Some(host);
        }
        if let Some(port) = lookup("DL_PORT").and_then(|v| parse_count("DL_PORT", &v)) {
            self.client.port = u16::try_from(port).ok();
        }
        if let Some(url) = non_empty(lookup("DL_URL")) {
            self.client.url = Some(url);
        }
        if let Some(user) = non_empty(lookup("DL_USERNAME")) {
            self.client.username = Some(user);
        }
        if let Some(password) = non_empty(lookup("DL_PASSWORD")) {
            self.client.password = Some(password);
        }
        if let Some(scheme) = non_empty(lookup("DL_SCHEME")) {
            self.client.scheme = scheme;
        }
        if let Some(category) = non_empty(lookup("DL_CATEGORY")) {
            self.client.category = category;
        }
        if let Some(level) = non_empty(lookup("LOG_LEVEL")) {
            self.logging.level = level.to_lowercase();
        }
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Parse a non-negative count, tolerating float notation such as "3.0".
fn parse_count(key: &str, raw: &str) -> Option<u64> {
    let raw = raw.trim();
    let parsed = raw
        .parse::<u64>()
        .ok()
        .or_else(|| {
            raw.parse::<f64>()
                .ok()
                .filter(|v| v.is_finite() && *v >= 0.0)
                .map(|v| v as u64)
        });
    if parsed.is_none() {
        log::warn!("Ignoring {}: '{}' is not a number", key, raw);
    }
    parsed
}

/// Target site hostnames.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Preferred mirror, probed first in priority order
    #[serde(default = "defaults::primary_host")]
    pub primary_host: String,

    /// Additional mirrors, tried before the built-in list
    #[serde(default)]
    pub mirrors: Vec<String>,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            primary_host: defaults::primary_host(),
            mirrors: Vec::new(),
        }
    }
}

/// HTTP client and crawling behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlerConfig {
    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Timeout for mirror liveness probes
    #[serde(default = "defaults::probe_timeout")]
    pub probe_timeout_secs: u64,

    /// Size of the shared fetch worker pool
    #[serde(default = "defaults::worker_threads")]
    pub worker_threads: usize,

    /// Maximum requests in flight across the whole process
    #[serde(default = "defaults::max_concurrent_requests")]
    pub max_concurrent_requests: usize,

    /// Default number of result pages per search
    #[serde(default = "defaults::page_limit")]
    pub page_limit: u32,

    /// Hard ceiling on pages for any single search
    #[serde(default = "defaults::max_page_limit")]
    pub max_page_limit: u32,

    /// Lower bound of the random pre-request delay
    #[serde(default = "defaults::jitter_min")]
    pub jitter_min_ms: u64,

    /// Upper bound of the random pre-request delay
    #[serde(default = "defaults::jitter_max")]
    pub jitter_max_ms: u64,

    /// Retries for retryable failures on normal fetches
    #[serde(default = "defaults::max_retries")]
    pub max_retries: u32,

    /// First backoff step; doubles on each retry
    #[serde(default = "defaults::backoff_base")]
    pub backoff_base_ms: u64,
}

impl CrawlerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            timeout_secs: defaults::timeout(),
            probe_timeout_secs: defaults::probe_timeout(),
            worker_threads: defaults::worker_threads(),
            max_concurrent_requests: defaults::max_concurrent_requests(),
            page_limit: defaults::page_limit(),
            max_page_limit: defaults::max_page_limit(),
            jitter_min_ms: defaults::jitter_min(),
            jitter_max_ms: defaults::jitter_max(),
            max_retries: defaults::max_retries(),
            backoff_base_ms: defaults::backoff_base(),
        }
    }
}

/// Cache lifetimes (seconds) and capacities.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "defaults::search_ttl")]
    pub search_ttl_secs: u64,

    #[serde(default = "defaults::capacity")]
    pub search_capacity: usize,

    #[serde(default = "defaults::details_ttl")]
    pub details_ttl_secs: u64,

    #[serde(default = "defaults::capacity")]
    pub details_capacity: usize,

    /// How long a reachable mirror is trusted
    #[serde(default = "defaults::mirror_ttl")]
    pub mirror_ttl_secs: u64,

    /// Backoff window after every mirror failed
    #[serde(default = "defaults::mirror_failure_ttl")]
    pub mirror_failure_ttl_secs: u64,

    #[serde(default = "defaults::tracker_ttl")]
    pub tracker_ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            search_ttl_secs: defaults::search_ttl(),
            search_capacity: defaults::capacity(),
            details_ttl_secs: defaults::details_ttl(),
            details_capacity: defaults::capacity(),
            mirror_ttl_secs: defaults::mirror_ttl(),
            mirror_failure_ttl_secs: defaults::mirror_failure_ttl(),
            tracker_ttl_secs: defaults::tracker_ttl(),
        }
    }
}

/// Tracker sources, in priority order: `list`, then `file`, then built-ins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerConfig {
    #[serde(default)]
    pub list: Vec<String>,

    #[serde(default = "defaults::tracker_file")]
    pub file: Option<PathBuf>,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            list: Vec::new(),
            file: defaults::tracker_file(),
        }
    }
}

/// Download client connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default)]
    pub kind: Option<ClientKind>,

    #[serde(default)]
    pub host: Option<String>,

    #[serde(default)]
    pub port: Option<u16>,

    /// Full base URL; wins over host/port/scheme when present
    #[serde(default)]
    pub url: Option<String>,

    #[serde(default)]
    pub username: Option<String>,

    #[serde(default)]
    pub password: Option<String>,

    #[serde(default = "defaults::scheme")]
    pub scheme: String,

    #[serde(default = "defaults::category")]
    pub category: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            kind: None,
            host: None,
            port: None,
            url: None,
            username: None,
            password: None,
            scheme: defaults::scheme(),
            category: defaults::category(),
        }
    }
}

/// Log output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "defaults::log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::log_level(),
        }
    }
}

mod defaults {
    use std::path::PathBuf;

    // Site defaults
    pub fn primary_host() -> String {
        "audiobookbay.lu".into()
    }

    // Crawler defaults
    pub fn timeout() -> u64 {
        30
    }
    pub fn probe_timeout() -> u64 {
        5
    }
    pub fn worker_threads() -> usize {
        3
    }
    pub fn max_concurrent_requests() -> usize {
        3
    }
    pub fn page_limit() -> u32 {
        3
    }
    pub fn max_page_limit() -> u32 {
        20
    }
    pub fn jitter_min() -> u64 {
        500
    }
    pub fn jitter_max() -> u64 {
        1500
    }
    pub fn max_retries() -> u32 {
        5
    }
    pub fn backoff_base() -> u64 {
        1000
    }

    // Cache defaults
    pub fn search_ttl() -> u64 {
        300
    }
    pub fn details_ttl() -> u64 {
        300
    }
    pub fn capacity() -> usize {
        100
    }
    pub fn mirror_ttl() -> u64 {
        600
    }
    pub fn mirror_failure_ttl() -> u64 {
        30
    }
    pub fn tracker_ttl() -> u64 {
        300
    }

    // Tracker defaults
    pub fn tracker_file() -> Option<PathBuf> {
        Some(PathBuf::from("trackers.json"))
    }

    // Client defaults
    pub fn scheme() -> String {
        "http".into()
    }
    pub fn category() -> String {
        "abb-automated".into()
    }

    pub fn log_level() -> String {
        "info".into()
    }
}
