// src/crawler.rs

//! Crawler facade.
//!
//! [`AudiobookCrawler`] wires the mirror selector, worker pool, throttle,
//! parser and caches from one [`Config`]. It is the only type the web layer
//! or the CLI needs.

use std::sync::Arc;
use std::time::Duration;

use crate::error::Result;
use crate::models::{BookDetails, BookSummary, Config};
use crate::pipeline::{DetailFetcher, SearchService, Throttle, WorkerPool};
use crate::services::{MirrorRegistry, MirrorSelector, ResilientParser, TrackerList, build_magnet};
use crate::transport::{HttpSessionFactory, SessionFactory};

pub struct AudiobookCrawler {
    config: Config,
    selector: Arc<MirrorSelector>,
    pool: Arc<WorkerPool>,
    throttle: Arc<Throttle>,
    search: SearchService,
    details: DetailFetcher,
    trackers: TrackerList,
}

impl AudiobookCrawler {
    /// Build a crawler backed by real HTTP sessions.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(config: Config) -> Result<Self> {
        let sessions = HttpSessionFactory::new(&config.crawler);
        Self::with_sessions(config, &sessions)
    }

    /// Build a crawler on top of any session factory.
    pub fn with_sessions(config: Config, sessions: &dyn SessionFactory) -> Result<Self> {
        config.validate()?;

        let registry = Arc::new(MirrorRegistry::from_config(&config.site));
        log::debug!("Mirror candidates: {:?}", registry.hosts());

        let selector = Arc::new(MirrorSelector::new(
            Arc::clone(&registry),
            sessions.probe_session()?,
            &config.cache,
        ));
        let pool = Arc::new(WorkerPool::new(config.crawler.worker_threads, sessions)?);
        let throttle = Arc::new(Throttle::from_config(&config.crawler));
        let parser = Arc::new(ResilientParser::new()?);

        let search = SearchService::new(
            Arc::clone(&pool),
            Arc::clone(&throttle),
            Arc::clone(&selector),
            Arc::clone(&parser),
            &config.cache,
        )
        .with_max_pages(config.crawler.max_page_limit);
        let details = DetailFetcher::new(
            Arc::clone(&pool),
            Arc::clone(&throttle),
            registry,
            parser,
            &config.cache,
        );
        let trackers = TrackerList::new(
            &config.trackers,
            Duration::from_secs(config.cache.tracker_ttl_secs),
        );

        Ok(Self {
            config,
            selector,
            pool,
            throttle,
            search,
            details,
            trackers,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Search with the configured page limit.
    pub async fn search(&self, query: &str) -> Result<Vec<BookSummary>> {
        self.search
            .search(query, self.config.crawler.page_limit)
            .await
    }

    pub async fn search_pages(&self, query: &str, page_limit: u32) -> Result<Vec<BookSummary>> {
        self.search.search(query, page_limit).await
    }

    pub async fn get_details(&self, url: &str) -> Result<BookDetails> {
        self.details.get_details(url).await
    }

    pub async fn refresh_details(&self, url: &str) -> Result<BookDetails> {
        self.details.refresh_details(url).await
    }

    /// Magnet link for a details page URL.
    pub async fn magnet_link(&self, url: &str) -> Result<String> {
        let details = self.details.get_details(url).await?;
        build_magnet(&details, &self.trackers.trackers())
    }

    /// Select (or return the cached) reachable mirror.
    pub async fn active_mirror(&self) -> Result<String> {
        self.selector.select().await
    }

    pub fn trackers(&self) -> Vec<String> {
        self.trackers.trackers()
    }

    /// Drop cached searches, details and trackers.
    pub fn clear_caches(&self) {
        self.search.clear_cache();
        self.details.clear_cache();
        self.trackers.reload();
    }

    /// Finish queued and in-flight fetches, then release every session.
    pub async fn shutdown(&self) {
        self.pool.shutdown().await;
        self.throttle.close();
        log::info!("Crawler shut down");
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::error::AppError;
    use crate::pipeline::search::tests::{HOST, listing};
    use crate::transport::ProbeMethod;
    use crate::transport::fake::FakeWeb;

    const BOOK: &str = "https://abb.test/abss/a/";

    fn config() -> Config {
        let mut config = Config::default();
        config.site.primary_host = HOST.into();
        config.crawler.jitter_min_ms = 0;
        config.crawler.jitter_max_ms = 0;
        config.crawler.page_limit = 1;
        config.trackers.list = vec!["udp://a".into(), "udp://c".into()];
        config.trackers.file = None;
        config
    }

    fn web() -> FakeWeb {
        let web = FakeWeb::new();
        web.probe_status(HOST, ProbeMethod::Head, 200)
            .page("https://abb.test/page/1/?s=hobbit", listing(&["a"]))
            .page(
                BOOK,
                r#"<html><body>
                    <div class="postTitle"><h1>A</h1></div>
                    <table class="torrent_info">
                      <tr><td>Tracker:</td><td>udp://a</td></tr>
                      <tr><td>Tracker:</td><td>udp://a</td></tr>
                      <tr><td>Tracker:</td><td>udp://b</td></tr>
                      <tr><td>Info Hash:</td><td>0123456789abcdef0123456789abcdef01234567</td></tr>
                    </table>
                  </body></html>"#,
            );
        web
    }

    #[tokio::test]
    async fn search_then_magnet() {
        let web = web();
        let crawler = AudiobookCrawler::with_sessions(config(), &web).unwrap();

        let books = crawler.search("hobbit").await.unwrap();
        assert_eq!(books.len(), 1);
        assert_eq!(books[0].link, BOOK);

        let magnet = crawler.magnet_link(&books[0].link).await.unwrap();
        assert_eq!(
            magnet,
            "magnet:?xt=urn:btih:0123456789abcdef0123456789abcdef01234567&dn=A\
             &tr=udp%3A%2F%2Fa&tr=udp%3A%2F%2Fb&tr=udp%3A%2F%2Fc"
        );
        assert_eq!(crawler.active_mirror().await.unwrap(), HOST);
        crawler.shutdown().await;
    }

    #[tokio::test]
    async fn magnet_without_hash_is_hash_not_found() {
        let web = FakeWeb::new();
        web.page(BOOK, "<html><body><p>no hash</p></body></html>");
        let crawler = AudiobookCrawler::with_sessions(config(), &web).unwrap();

        assert!(matches!(
            crawler.magnet_link(BOOK).await,
            Err(AppError::HashNotFound { .. })
        ));
        crawler.shutdown().await;
    }

    #[tokio::test]
    async fn invalid_config_is_rejected() {
        let mut config = config();
        config.crawler.max_concurrent_requests = 0;
        assert!(matches!(
            AudiobookCrawler::with_sessions(config, &FakeWeb::new()),
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn work_after_shutdown_is_refused() {
        let web = web();
        let crawler = AudiobookCrawler::with_sessions(config(), &web).unwrap();
        crawler.shutdown().await;

        assert!(matches!(
            crawler.get_details(BOOK).await,
            Err(AppError::PoolClosed)
        ));
        assert_eq!(web.request_count(), 0);
    }
}
