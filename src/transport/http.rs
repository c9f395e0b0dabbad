// src/transport/http.rs

//! reqwest-backed sessions.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use url::Url;

use super::headers::{build_headers, random_user_agent};
use super::{ProbeMethod, Request, Session, SessionFactory};
use crate::error::{Result, TransportError};
use crate::models::CrawlerConfig;

/// Exponential backoff for retryable transport failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff_base: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, backoff_base: Duration) -> Self {
        Self {
            max_retries,
            backoff_base,
        }
    }

    /// Fail on the first error.
    pub fn none() -> Self {
        Self::new(0, Duration::ZERO)
    }

    /// Delay before retry number `retry` (zero-based): base, 2*base, 4*base, ...
    pub fn delay_for(&self, retry: u32) -> Duration {
        self.backoff_base.saturating_mul(1u32 << retry.min(16))
    }

    /// Run `op` until it succeeds, fails permanently or retries run out.
    pub async fn run<T, F, Fut>(&self, mut op: F) -> std::result::Result<T, TransportError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<T, TransportError>>,
    {
        let mut retry = 0;
        loop {
            match op().await {
                Err(err) if err.is_retryable() && retry < self.max_retries => {
                    let delay = self.delay_for(retry);
                    log::debug!(
                        "Retrying after {} ({}/{}) in {:?}",
                        err,
                        retry + 1,
                        self.max_retries,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    retry += 1;
                }
                other => return other,
            }
        }
    }
}

/// One pooled HTTP client plus its retry policy.
///
/// No cookie store is configured, so no cookie state carries over from
/// one request to the next.
pub struct HttpSession {
    client: Client,
    retry: RetryPolicy,
}

impl HttpSession {
    /// Build a session whose requests time out after `timeout`.
    pub fn new(timeout: Duration, retry: RetryPolicy) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .pool_idle_timeout(Duration::from_secs(90))
            .build()?;
        Ok(Self { client, retry })
    }

    async fn get_once(&self, request: &Request) -> std::result::Result<String, TransportError> {
        let response = self
            .client
            .get(request.url.clone())
            .headers(build_headers(&request.user_agent, request.referer.as_deref()))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status(status.as_u16()));
        }
        Ok(response.text().await?)
    }
}

#[async_trait]
impl Session for HttpSession {
    async fn get(&self, request: &Request) -> std::result::Result<String, TransportError> {
        self.retry.run(|| self.get_once(request)).await
    }

    async fn probe(
        &self,
        url: &Url,
        method: ProbeMethod,
    ) -> std::result::Result<u16, TransportError> {
        let builder = match method {
            ProbeMethod::Head => self.client.head(url.clone()),
            ProbeMethod::Get => self.client.get(url.clone()),
        };
        let response = builder
            .headers(build_headers(random_user_agent(), None))
            .send()
            .await?;
        Ok(response.status().as_u16())
    }
}

/// Builds [`HttpSession`]s from the crawler settings.
#[derive(Debug, Clone)]
pub struct HttpSessionFactory {
    timeout: Duration,
    probe_timeout: Duration,
    retry: RetryPolicy,
}

impl HttpSessionFactory {
    pub fn new(config: &CrawlerConfig) -> Self {
        Self {
            timeout: config.timeout(),
            probe_timeout: config.probe_timeout(),
            retry: RetryPolicy::new(
                config.max_retries,
                Duration::from_millis(config.backoff_base_ms),
            ),
        }
    }
}

impl SessionFactory for HttpSessionFactory {
    fn fetch_session(&self) -> Result<Arc<dyn Session>> {
        Ok(Arc::new(HttpSession::new(self.timeout, self.retry)?))
    }

    fn probe_session(&self) -> Result<Arc<dyn Session>> {
        Ok(Arc::new(HttpSession::new(
            self.probe_timeout,
            RetryPolicy::none(),
        )?))
    }
}
