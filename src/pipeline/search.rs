// src/pipeline/search.rs

//! Paginated search across the active mirror.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use url::Url;

use super::pool::WorkerPool;
use super::throttle::Throttle;
use crate::cache::TtlCache;
use crate::error::{Result, TransportError};
use crate::models::{BookSummary, CacheConfig, CrawlerConfig};
use crate::services::{MirrorSelector, ResilientParser};
use crate::transport::headers::random_user_agent;
use crate::transport::{Request, Session};

/// Outcome of one page fetch.
#[derive(Debug)]
pub enum PageOutcome {
    Items(Vec<BookSummary>),
    /// No posts: the result set is exhausted
    Empty,
    /// Posts present but none parsable; the mirror is fine
    Malformed,
    TransportFailure(TransportError),
    /// Cancelled before the request was sent
    Cancelled,
}

/// Lowercase, trimmed, internal whitespace collapsed.
pub fn normalize_query(query: &str) -> String {
    query
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// `https://<host>/page/<n>/?s=<query>`, or without `?s=` when browsing.
pub fn search_url(host: &str, query: &str, page: u32) -> Result<Url> {
    let mut url = Url::parse(&format!("https://{host}/page/{page}/"))?;
    if !query.is_empty() {
        url.query_pairs_mut().append_pair("s", query);
    }
    Ok(url)
}

type SearchKey = (String, u32);

/// Runs searches through the shared pool and caches their results.
pub struct SearchService {
    pool: Arc<WorkerPool>,
    throttle: Arc<Throttle>,
    selector: Arc<MirrorSelector>,
    parser: Arc<ResilientParser>,
    cache: TtlCache<SearchKey, Vec<BookSummary>>,
    max_pages: u32,
}

impl SearchService {
    pub fn new(
        pool: Arc<WorkerPool>,
        throttle: Arc<Throttle>,
        selector: Arc<MirrorSelector>,
        parser: Arc<ResilientParser>,
        cache: &CacheConfig,
    ) -> Self {
        Self {
            pool,
            throttle,
            selector,
            parser,
            cache: TtlCache::new(
                Duration::from_secs(cache.search_ttl_secs),
                cache.search_capacity,
            ),
            max_pages: CrawlerConfig::default().max_page_limit,
        }
    }

    /// Ceiling applied to every requested page limit.
    pub fn with_max_pages(mut self, max_pages: u32) -> Self {
        self.max_pages = max_pages.max(1);
        self
    }

    /// Search up to `page_limit` pages, capped at the configured maximum.
    ///
    /// Pages are consumed in order. The first empty page ends the search;
    /// the first transport failure invalidates the mirror and returns what
    /// was collected so far.
    pub async fn search(&self, query: &str, page_limit: u32) -> Result<Vec<BookSummary>> {
        let query = normalize_query(query);
        if page_limit > self.max_pages {
            log::warn!(
                "Page limit {} exceeds maximum {}; capping",
                page_limit,
                self.max_pages
            );
        }
        let page_limit = page_limit.clamp(1, self.max_pages);
        let key = (query.clone(), page_limit);

        if let Some(books) = self.cache.get(&key) {
            log::debug!("Search cache hit for '{}' ({} pages)", query, page_limit);
            return Ok(books);
        }

        let host = self.selector.select().await?;
        log::info!(
            "Searching '{}' on {} (limit: {} pages)",
            query,
            host,
            page_limit
        );

        let token = CancellationToken::new();
        let _cancel_remaining = token.clone().drop_guard();
        let user_agent = random_user_agent();
        let mut referer = format!("https://{host}");
        let mut handles = Vec::with_capacity(page_limit as usize);

        for page in 1..=page_limit {
            let url = search_url(&host, &query, page)?;
            let request = Request::new(url, user_agent).with_referer(referer);
            referer = request.url.to_string();

            let throttle = Arc::clone(&self.throttle);
            let parser = Arc::clone(&self.parser);
            handles.push(self.pool.submit(token.clone(), move |session, token| {
                fetch_page(session, throttle, parser, request, token)
            })?);
        }

        let mut books = Vec::new();
        let mut complete = true;
        for (page, handle) in (1..).zip(handles) {
            match handle.join().await.unwrap_or(PageOutcome::Cancelled) {
                PageOutcome::Items(items) => books.extend(items),
                PageOutcome::Empty => {
                    log::debug!("Page {} is empty; stopping", page);
                    break;
                }
                PageOutcome::Malformed => {
                    log::warn!("Page {} had no parsable posts; skipping", page);
                }
                PageOutcome::TransportFailure(e) => {
                    log::error!("Page {} failed on {}: {}. Invalidating mirror.", page, host, e);
                    self.selector.invalidate(&host);
                    break;
                }
                PageOutcome::Cancelled => {
                    log::warn!("Page {} was cancelled; search interrupted", page);
                    complete = false;
                    break;
                }
            }
        }
        token.cancel();

        let books = dedup_by_link(books);
        log::info!("Search completed: {} unique results", books.len());
        if complete {
            self.cache.put(key, books.clone());
        }
        Ok(books)
    }

    /// Drop every cached search.
    pub fn clear_cache(&self) {
        self.cache.clear();
    }
}

async fn fetch_page(
    session: Arc<dyn Session>,
    throttle: Arc<Throttle>,
    parser: Arc<ResilientParser>,
    request: Request,
    token: CancellationToken,
) -> PageOutcome {
    match throttle.fetch(session.as_ref(), &request, &token).await {
        Ok(None) => PageOutcome::Cancelled,
        Ok(Some(html)) => {
            let page = parser.parse_listing(&html, &request.url);
            if page.is_exhausted() {
                PageOutcome::Empty
            } else if page.is_malformed() {
                PageOutcome::Malformed
            } else {
                PageOutcome::Items(page.books)
            }
        }
        Err(e) => PageOutcome::TransportFailure(e),
    }
}

fn dedup_by_link(books: Vec<BookSummary>) -> Vec<BookSummary> {
    let mut seen = HashSet::new();
    books
        .into_iter()
        .filter(|book| seen.insert(book.link.clone()))
        .collect()
}
