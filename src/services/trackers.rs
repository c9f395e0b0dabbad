// src/services/trackers.rs

//! Tracker list and magnet link construction.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cache::TtlCache;
use crate::error::{AppError, Result};
use crate::models::{BookDetails, TrackerConfig, is_unknown, normalize_field};

/// Public trackers used when nothing else is configured.
pub const DEFAULT_TRACKERS: &[&str] = &[
    "udp://tracker.openbittorrent.com:80",
    "udp://opentor.org:2710",
    "udp://tracker.ccc.de:80",
    "udp://tracker.blackunicorn.xyz:6969",
    "udp://tracker.coppersurfer.tk:6969",
    "udp://tracker.leechers-paradise.org:6969",
];

/// Configured list, then the JSON file, then [`DEFAULT_TRACKERS`].
///
/// The resolved list is cached briefly so edits to the file are picked up
/// without a restart.
pub struct TrackerList {
    configured: Vec<String>,
    file: Option<PathBuf>,
    cache: TtlCache<(), Vec<String>>,
}

impl TrackerList {
    pub fn new(config: &TrackerConfig, ttl: Duration) -> Self {
        Self {
            configured: config.list.clone(),
            file: config.file.clone(),
            cache: TtlCache::new(ttl, 1),
        }
    }

    pub fn trackers(&self) -> Vec<String> {
        if let Some(trackers) = self.cache.get(&()) {
            return trackers;
        }
        let trackers = self.resolve();
        self.cache.put((), trackers.clone());
        trackers
    }

    /// Drop the cached list so the next call re-reads its sources.
    pub fn reload(&self) {
        self.cache.clear();
    }

    fn resolve(&self) -> Vec<String> {
        if !self.configured.is_empty() {
            return self.configured.clone();
        }

        if let Some(path) = self.file.as_deref().filter(|p| p.exists()) {
            match read_tracker_file(path) {
                Ok(trackers) => {
                    log::info!("Loaded {} trackers from {}", trackers.len(), path.display());
                    return trackers;
                }
                Err(e) => log::warn!(
                    "Ignoring tracker file {}: {}. Using defaults.",
                    path.display(),
                    e
                ),
            }
        }

        DEFAULT_TRACKERS.iter().map(|t| t.to_string()).collect()
    }
}

fn read_tracker_file(path: &Path) -> Result<Vec<String>> {
    let content = fs::read_to_string(path)?;
    let value: serde_json::Value = serde_json::from_str(&content)?;
    let serde_json::Value::Array(items) = value else {
        return Err(AppError::validation("expected a JSON array of tracker URLs"));
    };
    Ok(items
        .into_iter()
        .filter_map(|item| item.as_str().map(str::to_string))
        .collect())
}

/// Build `magnet:?xt=urn:btih:<hash>[&dn=<name>]&tr=...`.
///
/// Trackers are deduplicated keeping first occurrence; each value is
/// percent-encoded. Blank and `Unknown` trackers are skipped.
pub fn magnet_uri<'a, I>(info_hash: &str, display_name: Option<&str>, trackers: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let mut magnet = format!("magnet:?xt=urn:btih:{}", info_hash.trim());

    if let Some(name) = display_name.map(str::trim).filter(|n| !n.is_empty() && !is_unknown(n)) {
        magnet.push_str("&dn=");
        magnet.push_str(&urlencoding::encode(name));
    }

    let mut seen = HashSet::new();
    for tracker in trackers {
        let tracker = normalize_field(tracker);
        if is_unknown(&tracker) || !seen.insert(tracker.clone()) {
            continue;
        }
        magnet.push_str("&tr=");
        magnet.push_str(&urlencoding::encode(&tracker));
    }
    magnet
}

/// Magnet link for a details page: page trackers first, then `extra`.
pub fn build_magnet(details: &BookDetails, extra: &[String]) -> Result<String> {
    if !details.has_info_hash() {
        return Err(AppError::HashNotFound {
            url: details.link.clone(),
        });
    }

    let trackers = details
        .trackers
        .iter()
        .chain(extra.iter())
        .map(String::as_str);
    Ok(magnet_uri(&details.info_hash, Some(&details.title), trackers))
}
