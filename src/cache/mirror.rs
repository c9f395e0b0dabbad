//! Single-slot cache for the mirror selection outcome.

use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::models::MirrorState;

/// Holds the current [`MirrorState`] under one lock.
///
/// Success and failure use independent lifetimes: a reachable mirror is
/// trusted for a long time, a total outage only blocks probing briefly.
pub struct MirrorStateCache {
    state: Mutex<Option<MirrorState>>,
    active_ttl: Duration,
    failure_ttl: Duration,
}

impl MirrorStateCache {
    pub fn new(active_ttl: Duration, failure_ttl: Duration) -> Self {
        Self {
            state: Mutex::new(None),
            active_ttl,
            failure_ttl,
        }
    }

    /// The live state, if any. Expired state is discarded.
    pub fn get(&self) -> Option<MirrorState> {
        let now = Instant::now();
        let mut state = self.state.lock();
        if state.as_ref().is_some_and(|s| s.is_expired(now)) {
            *state = None;
        }
        state.clone()
    }

    /// Record a reachable mirror, replacing any failure backoff.
    pub fn put_active(&self, host: impl Into<String>) {
        *self.state.lock() = Some(MirrorState::Active {
            host: host.into(),
            expires_at: Instant::now() + self.active_ttl,
        });
    }

    /// Record that every candidate failed.
    pub fn put_all_down(&self) {
        *self.state.lock() = Some(MirrorState::AllDown {
            expires_at: Instant::now() + self.failure_ttl,
        });
    }

    /// Clear the positive entry if it still names `host`.
    ///
    /// Returns whether anything was cleared. A failure backoff or a
    /// different active mirror is left untouched.
    pub fn invalidate_active(&self, host: &str) -> bool {
        let mut state = self.state.lock();
        let matches = matches!(
            state.as_ref(),
            Some(MirrorState::Active { host: current, .. }) if current == host
        );
        if matches {
            *state = None;
        }
        matches
    }

    pub fn clear(&self) {
        *self.state.lock() = None;
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;

    #[test]
    fn active_and_down_are_exclusive() {
        let cache = MirrorStateCache::new(Duration::from_secs(60), Duration::from_secs(60));
        cache.put_all_down();
        cache.put_active("audiobookbay.is");
        assert_eq!(
            cache.get().as_ref().and_then(|s| s.active_host()),
            Some("audiobookbay.is")
        );

        cache.put_all_down();
        assert!(matches!(cache.get(), Some(MirrorState::AllDown { .. })));
    }

    #[test]
    fn failure_backoff_expires_sooner() {
        let cache = MirrorStateCache::new(Duration::from_secs(60), Duration::from_millis(20));
        cache.put_all_down();
        thread::sleep(Duration::from_millis(40));
        assert_eq!(cache.get(), None);
    }

    #[test]
    fn invalidate_only_matching_host() {
        let cache = MirrorStateCache::new(Duration::from_secs(60), Duration::from_secs(60));
        cache.put_active("a.example");
        assert!(!cache.invalidate_active("b.example"));
        assert!(cache.get().is_some());
        assert!(cache.invalidate_active("a.example"));
        assert!(!cache.invalidate_active("a.example"));
        assert_eq!(cache.get(), None);
    }
}
