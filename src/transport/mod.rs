// src/transport/mod.rs

//! Outbound HTTP layer.
//!
//! Everything that touches the network goes through a [`Session`]. Worker
//! tasks each own one fetch session for connection reuse, and mirror
//! probing uses a separate zero-retry session so a dead host is never
//! masked by retries.

pub mod headers;
mod http;

#[cfg(test)]
pub(crate) mod fake;

use std::sync::Arc;

use async_trait::async_trait;
use url::Url;

use crate::error::{Result, TransportError};

pub use http::{HttpSession, HttpSessionFactory, RetryPolicy};

/// A single page request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub url: Url,
    pub user_agent: String,
    /// Previous page in the browsing chain, if any
    pub referer: Option<String>,
}

impl Request {
    pub fn new(url: Url, user_agent: impl Into<String>) -> Self {
        Self {
            url,
            user_agent: user_agent.into(),
            referer: None,
        }
    }

    pub fn with_referer(mut self, referer: impl Into<String>) -> Self {
        self.referer = Some(referer.into());
        self
    }
}

/// HTTP method used for a liveness probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProbeMethod {
    Head,
    Get,
}

/// An HTTP client bound to one owner.
#[async_trait]
pub trait Session: Send + Sync {
    /// Fetch a page body. Non-2xx answers are [`TransportError::Status`].
    async fn get(&self, request: &Request) -> std::result::Result<String, TransportError>;

    /// Send a liveness probe and report the final status code.
    async fn probe(
        &self,
        url: &Url,
        method: ProbeMethod,
    ) -> std::result::Result<u16, TransportError>;
}

/// Builds the two session flavours.
pub trait SessionFactory: Send + Sync {
    /// A session with the retry policy, for page fetches.
    fn fetch_session(&self) -> Result<Arc<dyn Session>>;

    /// A zero-retry, short-timeout session for mirror probes.
    fn probe_session(&self) -> Result<Arc<dyn Session>>;
}
