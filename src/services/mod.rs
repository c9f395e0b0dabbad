//! Service layer for the crawler.
//!
//! This module contains the domain logic for:
//! - Mirror discovery and failover (`MirrorRegistry`, `MirrorSelector`)
//! - HTML extraction (`ResilientParser`)
//! - Tracker sources and magnet links (`TrackerList`, `build_magnet`)

mod mirrors;
pub mod parser;
mod trackers;

pub use mirrors::{DEFAULT_MIRRORS, MirrorRegistry, MirrorSelector};
pub use parser::{ListingPage, ResilientParser};
pub use trackers::{DEFAULT_TRACKERS, TrackerList, build_magnet, magnet_uri};
