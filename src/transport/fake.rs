//! Scripted in-memory web used by unit tests.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use url::Url;

use super::{ProbeMethod, Request, Session, SessionFactory};
use crate::error::{Result, TransportError};

#[derive(Default)]
struct State {
    pages: Mutex<HashMap<String, std::result::Result<String, TransportError>>>,
    probes: Mutex<HashMap<(String, ProbeMethod), std::result::Result<u16, TransportError>>>,
    requests: Mutex<Vec<Request>>,
    probe_log: Mutex<Vec<(String, ProbeMethod)>>,
    probe_delays: Mutex<HashMap<String, Duration>>,
    delay: Mutex<Duration>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    sessions_created: AtomicUsize,
}

/// Shared fake; every session handed out by it sees the same script.
#[derive(Clone, Default)]
pub(crate) struct FakeWeb {
    state: Arc<State>,
}

impl FakeWeb {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(&self, url: &str, body: impl Into<String>) -> &Self {
        self.state
            .pages
            .lock()
            .insert(url.to_string(), Ok(body.into()));
        self
    }

    pub fn page_error(&self, url: &str, err: TransportError) -> &Self {
        self.state.pages.lock().insert(url.to_string(), Err(err));
        self
    }

    pub fn probe_status(&self, host: &str, method: ProbeMethod, status: u16) -> &Self {
        self.state
            .probes
            .lock()
            .insert((host.to_string(), method), Ok(status));
        self
    }

    pub fn probe_error(&self, host: &str, method: ProbeMethod, err: TransportError) -> &Self {
        self.state
            .probes
            .lock()
            .insert((host.to_string(), method), Err(err));
        self
    }

    /// Delay probes of one host, overriding the global delay.
    pub fn probe_delay(&self, host: &str, delay: Duration) -> &Self {
        self.state
            .probe_delays
            .lock()
            .insert(host.to_string(), delay);
        self
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.state.delay.lock() = delay;
    }

    pub fn requests(&self) -> Vec<Request> {
        self.state.requests.lock().clone()
    }

    pub fn requested_urls(&self) -> Vec<String> {
        self.requests()
            .into_iter()
            .map(|r| r.url.to_string())
            .collect()
    }

    pub fn request_count(&self) -> usize {
        self.state.requests.lock().len()
    }

    pub fn probe_log(&self) -> Vec<(String, ProbeMethod)> {
        self.state.probe_log.lock().clone()
    }

    pub fn probe_count(&self) -> usize {
        self.state.probe_log.lock().len()
    }

    pub fn max_in_flight(&self) -> usize {
        self.state.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn sessions_created(&self) -> usize {
        self.state.sessions_created.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Session for FakeWeb {
    async fn get(&self, request: &Request) -> std::result::Result<String, TransportError> {
        self.state.requests.lock().push(request.clone());

        let now = self.state.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let delay = *self.state.delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let response = self
            .state
            .pages
            .lock()
            .get(request.url.as_str())
            .cloned()
            .unwrap_or(Err(TransportError::Status(404)));

        self.state.in_flight.fetch_sub(1, Ordering::SeqCst);
        response
    }

    async fn probe(
        &self,
        url: &Url,
        method: ProbeMethod,
    ) -> std::result::Result<u16, TransportError> {
        let host = url.host_str().unwrap_or_default().to_string();
        self.state.probe_log.lock().push((host.clone(), method));

        let host_delay = self.state.probe_delays.lock().get(&host).copied();
        let delay = host_delay.unwrap_or_else(|| *self.state.delay.lock());
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        self.state
            .probes
            .lock()
            .get(&(host, method))
            .cloned()
            .unwrap_or_else(|| Err(TransportError::Connect("unreachable".into())))
    }
}

impl SessionFactory for FakeWeb {
    fn fetch_session(&self) -> Result<Arc<dyn Session>> {
        self.state.sessions_created.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(self.clone()))
    }

    fn probe_session(&self) -> Result<Arc<dyn Session>> {
        Ok(Arc::new(self.clone()))
    }
}
