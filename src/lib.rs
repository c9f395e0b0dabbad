// src/lib.rs

//! Audiobook Crawler Library
//!
//! Mirror-aware search and details scraping for an audiobook torrent
//! index, with magnet link construction and a download-client contract.

pub mod cache;
pub mod clients;
pub mod config;
pub mod crawler;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod transport;
pub mod utils;

pub use crawler::AudiobookCrawler;
pub use error::{AppError, Result, TransportError};
