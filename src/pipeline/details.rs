// src/pipeline/details.rs

//! Single details-page fetches behind the mirror allow-list.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use url::Url;

use super::pool::WorkerPool;
use super::throttle::Throttle;
use crate::cache::TtlCache;
use crate::error::{AppError, Result, TransportError};
use crate::models::{BookDetails, CacheConfig};
use crate::services::{MirrorRegistry, ResilientParser};
use crate::transport::Request;
use crate::transport::headers::random_user_agent;

/// Fetches and caches details pages.
pub struct DetailFetcher {
    pool: Arc<WorkerPool>,
    throttle: Arc<Throttle>,
    registry: Arc<MirrorRegistry>,
    parser: Arc<ResilientParser>,
    cache: TtlCache<String, BookDetails>,
}

impl DetailFetcher {
    pub fn new(
        pool: Arc<WorkerPool>,
        throttle: Arc<Throttle>,
        registry: Arc<MirrorRegistry>,
        parser: Arc<ResilientParser>,
        cache: &CacheConfig,
    ) -> Self {
        Self {
            pool,
            throttle,
            registry,
            parser,
            cache: TtlCache::new(
                Duration::from_secs(cache.details_ttl_secs),
                cache.details_capacity,
            ),
        }
    }

    /// Parse `raw` and check its host against the mirror list.
    ///
    /// Credentials and non-default ports are refused even on an allowed
    /// host. This runs before any cache lookup or network call.
    pub fn validate_url(&self, raw: &str) -> Result<Url> {
        let url = Url::parse(raw.trim()).map_err(|e| AppError::invalid_url(raw, e))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(AppError::invalid_url(raw, "only http(s) URLs are supported"));
        }
        let host = url
            .host_str()
            .ok_or_else(|| AppError::invalid_url(raw, "URL has no host"))?;
        if !self.registry.contains(host) {
            log::warn!("Blocked details request to foreign host {}", host);
            return Err(AppError::SsrfRejected {
                host: host.to_string(),
            });
        }
        if !url.username().is_empty() || url.password().is_some() {
            log::warn!("Blocked details request with credentials for {}", host);
            return Err(AppError::SsrfRejected {
                host: host.to_string(),
            });
        }
        // `Url::port` is `None` when the port is the scheme default.
        if let Some(port) = url.port() {
            log::warn!("Blocked details request to {}:{}", host, port);
            return Err(AppError::SsrfRejected {
                host: format!("{host}:{port}"),
            });
        }
        Ok(url)
    }

    pub async fn get_details(&self, raw: &str) -> Result<BookDetails> {
        let url = self.validate_url(raw)?;
        if let Some(details) = self.cache.get(&url.to_string()) {
            log::debug!("Details cache hit for {}", url);
            return Ok(details);
        }
        self.fetch(url).await
    }

    /// Like [`get_details`](Self::get_details) but ignores the cache.
    pub async fn refresh_details(&self, raw: &str) -> Result<BookDetails> {
        let url = self.validate_url(raw)?;
        self.fetch(url).await
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    async fn fetch(&self, url: Url) -> Result<BookDetails> {
        log::info!("Fetching details {}", url);
        let request = Request::new(url.clone(), random_user_agent()).with_referer(url.as_str());
        let throttle = Arc::clone(&self.throttle);
        let parser = Arc::clone(&self.parser);

        let handle = self
            .pool
            .submit(CancellationToken::new(), move |session, token| async move {
                match throttle.fetch(session.as_ref(), &request, &token).await {
                    Ok(Some(html)) => Ok(parser.parse_details(&html, &request.url)),
                    Ok(None) => Err(TransportError::Closed),
                    Err(e) => Err(e),
                }
            })?;

        let details = match handle.join().await {
            Some(Ok(details)) => details,
            Some(Err(source)) => {
                log::error!("Failed to fetch details for {}: {}", url, source);
                return Err(AppError::FetchFailed {
                    url: url.to_string(),
                    source,
                });
            }
            None => return Err(AppError::PoolClosed),
        };

        self.cache.put(url.to_string(), details.clone());
        Ok(details)
    }
}
