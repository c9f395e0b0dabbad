//! Mirror selection state.

use std::time::Instant;

/// Cached outcome of the last mirror selection.
///
/// At most one variant is valid at a time: recording a reachable mirror
/// clears the failure backoff and vice versa.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MirrorState {
    /// A reachable hostname, trusted until `expires_at`
    Active { host: String, expires_at: Instant },
    /// Every candidate failed; no probing until `expires_at`
    AllDown { expires_at: Instant },
}

impl MirrorState {
    pub fn expires_at(&self) -> Instant {
        match self {
            Self::Active { expires_at, .. } | Self::AllDown { expires_at } => *expires_at,
        }
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at()
    }

    pub fn active_host(&self) -> Option<&str> {
        match self {
            Self::Active { host, .. } => Some(host),
            Self::AllDown { .. } => None,
        }
    }
}
