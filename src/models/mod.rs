// src/models/mod.rs

//! Domain models for the crawler.
//!
//! This module contains all data structures used throughout the crate,
//! organized by their primary purpose.

mod book;
mod config;
mod mirror;
mod torrent;

// Re-export all public types
pub use book::{
    BookDetails, BookMetadata, BookSummary, NO_DESCRIPTION, UNKNOWN, is_unknown, normalize_field,
};
pub use config::{
    CacheConfig, ClientConfig, Config, CrawlerConfig, LoggingConfig, SiteConfig, TrackerConfig,
};
pub use mirror::MirrorState;
pub use torrent::{ClientKind, TorrentStatus, format_size};
