// src/pipeline/throttle.rs

//! Process-wide outbound request throttle.

use std::time::Duration;

use rand::Rng;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use crate::error::TransportError;
use crate::models::CrawlerConfig;
use crate::transport::{Request, Session};

/// Random pre-request delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Jitter {
    min: Duration,
    max: Duration,
}

impl Jitter {
    pub fn new(min: Duration, max: Duration) -> Self {
        if min <= max {
            Self { min, max }
        } else {
            Self { min: max, max: min }
        }
    }

    pub fn none() -> Self {
        Self::new(Duration::ZERO, Duration::ZERO)
    }

    pub fn sample(&self) -> Duration {
        if self.max <= self.min {
            return self.min;
        }
        let lo = self.min.as_micros() as u64;
        let hi = self.max.as_micros() as u64;
        Duration::from_micros(rand::thread_rng().gen_range(lo..=hi))
    }
}

/// Caps requests in flight across every search, independent of pool size.
///
/// The jitter sleep happens before a permit is taken, so a sleeping task
/// never holds a slot.
pub struct Throttle {
    semaphore: Semaphore,
    jitter: Jitter,
    limit: usize,
}

impl Throttle {
    pub fn new(limit: usize, jitter: Jitter) -> Self {
        let limit = limit.max(1);
        Self {
            semaphore: Semaphore::new(limit),
            jitter,
            limit,
        }
    }

    pub fn from_config(config: &CrawlerConfig) -> Self {
        Self::new(
            config.max_concurrent_requests,
            Jitter::new(
                Duration::from_millis(config.jitter_min_ms),
                Duration::from_millis(config.jitter_max_ms),
            ),
        )
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Sleep, wait for a slot, then fetch.
    ///
    /// Returns `Ok(None)` if `token` is cancelled before the request is
    /// sent. A request already on the wire runs to completion.
    pub async fn fetch(
        &self,
        session: &dyn Session,
        request: &Request,
        token: &CancellationToken,
    ) -> Result<Option<String>, TransportError> {
        let delay = self.jitter.sample();
        tokio::select! {
            biased;
            _ = token.cancelled() => return Ok(None),
            _ = tokio::time::sleep(delay) => {}
        }

        let _permit = tokio::select! {
            biased;
            _ = token.cancelled() => return Ok(None),
            permit = self.semaphore.acquire() => permit.map_err(|_| TransportError::Closed)?,
        };

        if token.is_cancelled() {
            return Ok(None);
        }

        log::debug!("GET {}", request.url);
        session.get(request).await.map(Some)
    }

    /// Refuse all further requests.
    pub fn close(&self) {
        self.semaphore.close();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use futures::future::join_all;
    use url::Url;

    use super::*;
    use crate::transport::fake::FakeWeb;

    fn request(url: &str) -> Request {
        Request::new(Url::parse(url).unwrap(), "test-agent")
    }

    #[test]
    fn jitter_stays_in_range() {
        let jitter = Jitter::new(Duration::from_millis(500), Duration::from_millis(1500));
        for _ in 0..100 {
            let d = jitter.sample();
            assert!(d >= Duration::from_millis(500) && d <= Duration::from_millis(1500));
        }
    }

    #[test]
    fn jitter_swaps_inverted_bounds() {
        let jitter = Jitter::new(Duration::from_millis(20), Duration::from_millis(10));
        let d = jitter.sample();
        assert!(d >= Duration::from_millis(10) && d <= Duration::from_millis(20));
        assert_eq!(Jitter::none().sample(), Duration::ZERO);
    }

    #[test]
    fn limit_follows_config_and_is_never_zero() {
        let config = CrawlerConfig {
            max_concurrent_requests: 4,
            ..CrawlerConfig::default()
        };
        assert_eq!(Throttle::from_config(&config).limit(), 4);
        assert_eq!(Throttle::new(0, Jitter::none()).limit(), 1);
    }

    #[tokio::test]
    async fn in_flight_never_exceeds_limit() {
        let web = FakeWeb::new();
        web.set_delay(Duration::from_millis(20));
        for i in 0..8 {
            web.page(&format!("https://a.example/{i}"), "ok");
        }

        let throttle = Arc::new(Throttle::new(2, Jitter::none()));
        let token = CancellationToken::new();
        let fetches = (0..8).map(|i| {
            let throttle = Arc::clone(&throttle);
            let web = web.clone();
            let token = token.clone();
            async move {
                throttle
                    .fetch(&web, &request(&format!("https://a.example/{i}")), &token)
                    .await
            }
        });

        let results = join_all(fetches).await;
        assert!(results.iter().all(|r| matches!(r, Ok(Some(_)))));
        assert_eq!(web.request_count(), 8);
        assert!(web.max_in_flight() <= 2);
    }

    #[tokio::test]
    async fn cancelled_during_jitter_sends_nothing() {
        let web = FakeWeb::new();
        web.page("https://a.example/", "ok");
        let throttle = Throttle::new(
            1,
            Jitter::new(Duration::from_millis(50), Duration::from_millis(60)),
        );
        let token = CancellationToken::new();

        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            canceller.cancel();
        });

        let result = throttle
            .fetch(&web, &request("https://a.example/"), &token)
            .await;
        assert_eq!(result, Ok(None));
        assert_eq!(web.request_count(), 0);
    }

    #[tokio::test]
    async fn closed_throttle_reports_closed() {
        let web = FakeWeb::new();
        let throttle = Throttle::new(1, Jitter::none());
        throttle.close();
        let result = throttle
            .fetch(&web, &request("https://a.example/"), &CancellationToken::new())
            .await;
        assert_eq!(result, Err(TransportError::Closed));
    }

    #[tokio::test]
    async fn transport_errors_pass_through() {
        let web = FakeWeb::new();
        web.page_error("https://a.example/", TransportError::Timeout);
        let throttle = Throttle::new(1, Jitter::none());
        let result = throttle
            .fetch(&web, &request("https://a.example/"), &CancellationToken::new())
            .await;
        assert_eq!(result, Err(TransportError::Timeout));
    }
}
