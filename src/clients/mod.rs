// src/clients/mod.rs

//! Download client contract.
//!
//! Concrete adapters (qBittorrent, Transmission, Deluge) live outside this
//! crate and plug in through [`ClientFactory`]. The crawler only hands them
//! a magnet link, a save path and a category.

mod manager;

use async_trait::async_trait;
use url::Url;

use crate::error::{AppError, Result};
use crate::models::{ClientConfig, ClientKind, TorrentStatus};

pub use manager::DownloadManager;

/// Operations every download client adapter provides.
#[async_trait]
pub trait DownloadClient: Send + Sync {
    async fn connect(&mut self) -> Result<()>;

    async fn close(&mut self) -> Result<()>;

    async fn add_magnet(&self, magnet: &str, save_path: &str, category: &str) -> Result<()>;

    async fn remove_torrent(&self, id: &str) -> Result<()>;

    async fn get_status(&self, category: &str) -> Result<Vec<TorrentStatus>>;
}

/// Creates an unconnected adapter for the configured client kind.
pub trait ClientFactory: Send + Sync {
    fn create(&self, settings: &ClientSettings) -> Result<Box<dyn DownloadClient>>;
}

impl<F> ClientFactory for F
where
    F: Fn(&ClientSettings) -> Result<Box<dyn DownloadClient>> + Send + Sync,
{
    fn create(&self, settings: &ClientSettings) -> Result<Box<dyn DownloadClient>> {
        self(settings)
    }
}

/// Fully resolved connection settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSettings {
    pub kind: ClientKind,
    pub host: String,
    pub port: u16,
    pub scheme: String,
    pub base_url: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub category: String,
}

impl ClientSettings {
    /// Resolve host, port and scheme. A configured URL wins over the
    /// separate fields; the port defaults per client kind.
    pub fn resolve(config: &ClientConfig) -> Result<Self> {
        let kind = config
            .kind
            .ok_or_else(|| AppError::config("download client kind is not configured"))?;

        let mut scheme = config.scheme.clone();
        let fallback_host = config.host.clone().unwrap_or_else(|| "localhost".into());
        let fallback_port = config.port.unwrap_or(kind.default_port());

        let (host, port, base_url) = match config.url.as_deref().map(Url::parse) {
            Some(Ok(url)) => {
                let host = url
                    .host_str()
                    .map(str::to_string)
                    .unwrap_or(fallback_host);
                let port = url.port().unwrap_or(fallback_port);
                scheme = url.scheme().to_string();
                let base_url = url.as_str().trim_end_matches('/').to_string();
                (host, port, base_url)
            }
            Some(Err(e)) => {
                log::warn!("Failed to parse download client URL: {}. Using host/port.", e);
                let base_url = format!("{scheme}://{fallback_host}:{fallback_port}");
                (fallback_host, fallback_port, base_url)
            }
            None => {
                if config.host.is_none() && kind == ClientKind::Deluge {
                    log::warn!("Download client host missing. Defaulting Deluge to localhost.");
                }
                let base_url = format!("{scheme}://{fallback_host}:{fallback_port}");
                (fallback_host, fallback_port, base_url)
            }
        };

        Ok(Self {
            kind,
            host,
            port,
            scheme,
            base_url,
            username: config.username.clone(),
            password: config.password.clone(),
            category: config.category.clone(),
        })
    }
}
