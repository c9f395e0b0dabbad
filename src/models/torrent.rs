//! Download client data structures.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::models::UNKNOWN;

/// Supported download clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClientKind {
    #[serde(alias = "qbit")]
    QBittorrent,
    Transmission,
    Deluge,
}

impl ClientKind {
    /// Port used when neither a URL nor an explicit port is configured.
    pub fn default_port(self) -> u16 {
        match self {
            Self::QBittorrent => 8080,
            Self::Transmission => 9091,
            Self::Deluge => 8112,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::QBittorrent => "qbittorrent",
            Self::Transmission => "transmission",
            Self::Deluge => "deluge",
        }
    }
}

impl fmt::Display for ClientKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ClientKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "qbittorrent" | "qbit" => Ok(Self::QBittorrent),
            "transmission" => Ok(Self::Transmission),
            "deluge" => Ok(Self::Deluge),
            other => Err(AppError::config(format!("unknown download client '{other}'"))),
        }
    }
}

/// Status of one torrent as reported by a download client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TorrentStatus {
    pub id: String,
    pub name: String,
    /// Percentage, 0.0 to 100.0
    pub progress: f64,
    pub state: String,
    /// Human readable, see [`format_size`]
    pub size: String,
}

/// Format a byte count as B, KB, MB, GB, TB or PB with two decimals.
pub fn format_size(bytes: Option<f64>) -> String {
    let Some(mut size) = bytes.filter(|b| b.is_finite() && *b >= 0.0) else {
        return UNKNOWN.to_string();
    };
    for unit in ["B", "KB", "MB", "GB", "TB"] {
        if size < 1024.0 {
            return format!("{size:.2} {unit}");
        }
        size /= 1024.0;
    }
    format!("{size:.2} PB")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_client_names_case_insensitively() {
        assert_eq!("Deluge".parse::<ClientKind>().unwrap(), ClientKind::Deluge);
        assert_eq!(" qbit ".parse::<ClientKind>().unwrap(), ClientKind::QBittorrent);
        assert!("utorrent".parse::<ClientKind>().is_err());
    }

    #[test]
    fn default_ports() {
        assert_eq!(ClientKind::QBittorrent.default_port(), 8080);
        assert_eq!(ClientKind::Transmission.default_port(), 9091);
        assert_eq!(ClientKind::Deluge.default_port(), 8112);
    }

    #[test]
    fn format_size_units() {
        assert_eq!(format_size(Some(512.0)), "512.00 B");
        assert_eq!(format_size(Some(1536.0)), "1.50 KB");
        assert_eq!(format_size(Some(1024.0 * 1024.0 * 1024.0)), "1.00 GB");
        assert_eq!(format_size(Some(1024f64.powi(5) * 2.0)), "2.00 PB");
    }

    #[test]
    fn format_size_rejects_bad_input() {
        assert_eq!(format_size(None), UNKNOWN);
        assert_eq!(format_size(Some(f64::NAN)), UNKNOWN);
        assert_eq!(format_size(Some(-1.0)), UNKNOWN);
    }
}
