// src/clients/manager.rs

//! Lazily connected download client with one reconnect attempt.

use tokio::sync::Mutex;

use super::{ClientFactory, ClientSettings, DownloadClient};
use crate::error::{AppError, Result};
use crate::models::TorrentStatus;

type Slot = Option<Box<dyn DownloadClient>>;

/// Owns the connection to the configured download client.
///
/// Every operation connects on first use. If an operation fails, the
/// connection is closed, re-established and the operation retried once.
pub struct DownloadManager {
    settings: ClientSettings,
    factory: Box<dyn ClientFactory>,
    client: Mutex<Slot>,
}

impl DownloadManager {
    pub fn new(settings: ClientSettings, factory: impl ClientFactory + 'static) -> Self {
        Self {
            settings,
            factory: Box::new(factory),
            client: Mutex::new(None),
        }
    }

    pub fn settings(&self) -> &ClientSettings {
        &self.settings
    }

    /// Try to connect; used for a startup health check.
    pub async fn verify(&self) -> bool {
        let mut slot = self.client.lock().await;
        match self.ensure(&mut slot).await {
            Ok(_) => {
                log::info!("Successfully connected to {}", self.settings.kind);
                true
            }
            Err(e) => {
                log::warn!("Could not connect to {}: {}", self.settings.kind, e);
                false
            }
        }
    }

    pub async fn add_magnet(&self, magnet: &str, save_path: &str) -> Result<()> {
        let category = self.settings.category.as_str();
        let mut slot = self.client.lock().await;

        let first = match self.ensure(&mut slot).await {
            Ok(client) => client.add_magnet(magnet, save_path, category).await,
            Err(e) => Err(e),
        };
        if let Err(e) = first {
            log::warn!("Failed to add torrent ({}). Reconnecting...", e);
            self.disconnect(&mut slot).await;
            return self
                .ensure(&mut slot)
                .await?
                .add_magnet(magnet, save_path, category)
                .await;
        }
        log::info!("Added torrent to {} in {}", self.settings.kind, save_path);
        Ok(())
    }

    pub async fn remove_torrent(&self, id: &str) -> Result<()> {
        let mut slot = self.client.lock().await;

        let first = match self.ensure(&mut slot).await {
            Ok(client) => client.remove_torrent(id).await,
            Err(e) => Err(e),
        };
        if let Err(e) = first {
            log::warn!("Failed to remove torrent ({}). Reconnecting...", e);
            self.disconnect(&mut slot).await;
            return self.ensure(&mut slot).await?.remove_torrent(id).await;
        }
        log::info!("Removed torrent {} from {}", id, self.settings.kind);
        Ok(())
    }

    pub async fn get_status(&self) -> Result<Vec<TorrentStatus>> {
        let category = self.settings.category.as_str();
        let mut slot = self.client.lock().await;

        let first = match self.ensure(&mut slot).await {
            Ok(client) => client.get_status(category).await,
            Err(e) => Err(e),
        };
        match first {
            Ok(status) => Ok(status),
            Err(e) => {
                log::warn!("Failed to get status ({}). Reconnecting...", e);
                self.disconnect(&mut slot).await;
                self.ensure(&mut slot).await?.get_status(category).await
            }
        }
    }

    /// Close the current connection, if any.
    pub async fn close(&self) {
        let mut slot = self.client.lock().await;
        self.disconnect(&mut slot).await;
    }

    async fn ensure<'a>(&self, slot: &'a mut Slot) -> Result<&'a dyn DownloadClient> {
        if slot.is_none() {
            let mut client = self.factory.create(&self.settings)?;
            client.connect().await?;
            log::debug!("Connected to {} at {}", self.settings.kind, self.settings.base_url);
            *slot = Some(client);
        }
        slot.as_deref()
            .ok_or_else(|| AppError::client("download client is not connected"))
    }

    async fn disconnect(&self, slot: &mut Slot) {
        if let Some(mut client) = slot.take() {
            if let Err(e) = client.close().await {
                log::debug!("Error closing {} connection: {}", self.settings.kind, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use parking_lot::Mutex as SyncMutex;

    use super::*;
    use crate::models::{ClientConfig, ClientKind};

    #[derive(Default)]
    struct Counters {
        connects: AtomicUsize,
        closes: AtomicUsize,
        adds: AtomicUsize,
        failures_left: AtomicUsize,
        added: SyncMutex<Vec<(String, String, String)>>,
    }

    struct FakeClient {
        counters: Arc<Counters>,
    }

    #[async_trait]
    impl DownloadClient for FakeClient {
        async fn connect(&mut self) -> Result<()> {
            self.counters.connects.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn close(&mut self) -> Result<()> {
            self.counters.closes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn add_magnet(&self, magnet: &str, save_path: &str, category: &str) -> Result<()> {
            self.counters.adds.fetch_add(1, Ordering::SeqCst);
            let left = self.counters.failures_left.load(Ordering::SeqCst);
            if left > 0 {
                self.counters.failures_left.store(left - 1, Ordering::SeqCst);
                return Err(AppError::client("session expired"));
            }
            self.counters
                .added
                .lock()
                .push((magnet.into(), save_path.into(), category.into()));
            Ok(())
        }

        async fn remove_torrent(&self, _id: &str) -> Result<()> {
            Ok(())
        }

        async fn get_status(&self, category: &str) -> Result<Vec<TorrentStatus>> {
            Ok(vec![TorrentStatus {
                id: "1".into(),
                name: category.into(),
                progress: 50.0,
                state: "downloading".into(),
                size: "1.00 GB".into(),
            }])
        }
    }

    fn manager(failures: usize) -> (DownloadManager, Arc<Counters>) {
        let counters = Arc::new(Counters::default());
        counters.failures_left.store(failures, Ordering::SeqCst);
        let settings = ClientSettings::resolve(&ClientConfig {
            kind: Some(ClientKind::QBittorrent),
            ..ClientConfig::default()
        })
        .unwrap();

        let shared = Arc::clone(&counters);
        let factory = move |_: &ClientSettings| -> Result<Box<dyn DownloadClient>> {
            Ok(Box::new(FakeClient {
                counters: Arc::clone(&shared),
            }))
        };
        (DownloadManager::new(settings, factory), counters)
    }

    #[tokio::test]
    async fn connects_lazily_once() {
        let (manager, counters) = manager(0);
        assert_eq!(counters.connects.load(Ordering::SeqCst), 0);

        manager.add_magnet("magnet:?xt=urn:btih:x", "/downloads/x").await.unwrap();
        manager.get_status().await.unwrap();
        assert_eq!(counters.connects.load(Ordering::SeqCst), 1);

        let added = counters.added.lock().clone();
        assert_eq!(
            added,
            vec![(
                "magnet:?xt=urn:btih:x".to_string(),
                "/downloads/x".to_string(),
                "abb-automated".to_string()
            )]
        );
    }

    #[tokio::test]
    async fn failure_reconnects_and_retries_once() {
        let (manager, counters) = manager(1);
        manager.add_magnet("m", "/d").await.unwrap();

        assert_eq!(counters.adds.load(Ordering::SeqCst), 2);
        assert_eq!(counters.connects.load(Ordering::SeqCst), 2);
        assert_eq!(counters.closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn second_failure_is_returned() {
        let (manager, counters) = manager(2);
        let result = manager.add_magnet("m", "/d").await;

        assert!(matches!(result, Err(AppError::Client(_))));
        assert_eq!(counters.adds.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn status_uses_configured_category() {
        let (manager, _) = manager(0);
        let status = manager.get_status().await.unwrap();
        assert_eq!(status[0].name, "abb-automated");
        assert!(manager.verify().await);
        manager.close().await;
    }
}
