//! Per-service cache with TTL freshness and an in-flight latch.
//!
//! The latch is checked and set atomically at dispatch time: a refresh
//! request for a key that is already in flight, or still fresh, is simply
//! dropped. Completions therefore serialize per key without any locking in
//! the workers, and a later-started probe can never overwrite an earlier
//! one's result because the later start never happens.

use std::collections::HashMap;
use std::time::{Duration, Instant};

/// TTLs by refresh class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshKind {
    /// Heavy service overviews (databases, docker, runtimes).
    Service,
    /// Fast-moving views: ports, top processes.
    FastInfo,
    /// Slower infos (system resources overview).
    Info,
}

impl RefreshKind {
    pub fn ttl(self) -> Duration {
        match self {
            Self::Service => Duration::from_secs(3),
            Self::FastInfo => Duration::from_secs(3),
            Self::Info => Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CacheEntry {
    pub data: String,
    pub updated_at: Option<Instant>,
    pub in_flight: bool,
}

impl CacheEntry {
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

#[derive(Default)]
pub struct ServiceCache {
    entries: HashMap<String, CacheEntry>,
}

impl ServiceCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&CacheEntry> {
        self.entries.get(key)
    }

    /// Decide whether a refresh for `key` should be dispatched and, if so,
    /// mark it in flight. Prior data is preserved so the UI keeps rendering
    /// the stale value under an "updating" annotation.
    pub fn try_begin_refresh(&mut self, key: &str, ttl: Duration) -> bool {
        let entry = self.entries.entry(key.to_string()).or_default();
        if entry.in_flight {
            return false;
        }
        if let Some(updated_at) = entry.updated_at {
            if updated_at.elapsed() < ttl {
                return false;
            }
        }
        entry.in_flight = true;
        true
    }

    /// Record a successful completion. `updated_at` moves only here.
    pub fn complete(&mut self, key: &str, data: String) {
        let entry = self.entries.entry(key.to_string()).or_default();
        entry.data = data;
        entry.updated_at = Some(Instant::now());
        entry.in_flight = false;
    }

    /// Release the latch after a failed probe, keeping old data and its age.
    pub fn fail(&mut self, key: &str) {
        if let Some(entry) = self.entries.get_mut(key) {
            entry.in_flight = false;
        }
    }

    /// Mark an entry stale (and release its latch) so the next dispatch goes
    /// through immediately. Used after a confirmed command mutated the world
    /// the cached view describes.
    pub fn invalidate(&mut self, key: &str) {
        if let Some(entry) = self.entries.get_mut(key) {
            entry.updated_at = None;
            entry.in_flight = false;
        }
    }

    pub fn is_updating(&self, key: &str) -> bool {
        self.entries.get(key).is_some_and(|e| e.in_flight)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TTL: Duration = Duration::from_secs(3);

    #[test]
    fn first_refresh_dispatches_and_latches() {
        let mut cache = ServiceCache::new();
        assert!(cache.try_begin_refresh("PostgreSQL", TTL));
        // Latched: a second dispatch for the same key is dropped.
        assert!(!cache.try_begin_refresh("PostgreSQL", TTL));
        // Other keys are unaffected.
        assert!(cache.try_begin_refresh("MySQL", TTL));
    }

    #[test]
    fn completion_releases_latch_and_sets_freshness() {
        let mut cache = ServiceCache::new();
        assert!(cache.try_begin_refresh("Docker", TTL));
        cache.complete("Docker", "3 containers".into());

        let entry = cache.get("Docker").unwrap();
        assert!(!entry.in_flight);
        assert_eq!(entry.data, "3 containers");
        assert!(entry.updated_at.is_some());

        // Fresh: dropped until the TTL lapses.
        assert!(!cache.try_begin_refresh("Docker", TTL));
        // A zero TTL forces staleness immediately.
        assert!(cache.try_begin_refresh("Docker", Duration::ZERO));
    }

    #[test]
    fn failure_keeps_data_but_releases_latch() {
        let mut cache = ServiceCache::new();
        assert!(cache.try_begin_refresh("Redis", TTL));
        cache.complete("Redis", "db0".into());

        assert!(cache.try_begin_refresh("Redis", Duration::ZERO));
        cache.fail("Redis");

        let entry = cache.get("Redis").unwrap();
        assert_eq!(entry.data, "db0", "stale data survives a failed refresh");
        assert!(!entry.in_flight);
        // updated_at untouched, so the next dispatch is allowed again.
        assert!(cache.try_begin_refresh("Redis", Duration::ZERO));
    }

    #[test]
    fn prior_data_preserved_while_in_flight() {
        let mut cache = ServiceCache::new();
        cache.complete("Ports", ":3000".into());
        assert!(cache.try_begin_refresh("Ports", Duration::ZERO));
        assert!(cache.is_updating("Ports"));
        assert_eq!(cache.get("Ports").unwrap().data, ":3000");
    }

    #[test]
    fn invalidate_forces_next_dispatch() {
        let mut cache = ServiceCache::new();
        cache.complete("Docker", "fresh".into());
        assert!(!cache.try_begin_refresh("Docker", TTL), "fresh entry drops");

        cache.invalidate("Docker");
        assert!(cache.try_begin_refresh("Docker", TTL));
        assert_eq!(cache.get("Docker").unwrap().data, "fresh", "data survives");
    }

    #[test]
    fn ttl_table() {
        assert_eq!(RefreshKind::Service.ttl(), Duration::from_secs(3));
        assert_eq!(RefreshKind::FastInfo.ttl(), Duration::from_secs(3));
        assert_eq!(RefreshKind::Info.ttl(), Duration::from_secs(5));
    }
}
