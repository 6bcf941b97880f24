//! Injectable clock and short-TTL lookup cache.
//!
//! Repeated name-based artifact lookups within a short interval should not
//! re-query the remote directory. The cache is an explicit component with a
//! configurable time-to-live and an injected [`Clock`], so tests drive time
//! directly instead of relying on wall-clock bucketing.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// A source of "now".
pub trait Clock: Send + Sync + 'static {
    /// Returns the current instant.
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A name-keyed cache whose entries expire after a fixed time-to-live.
///
/// Entries are evicted lazily on access. Interior mutability keeps the
/// cache shareable behind `&self`, matching how the publisher holds it.
pub struct TtlCache<V> {
    ttl: chrono::Duration,
    clock: Arc<dyn Clock>,
    entries: Mutex<HashMap<String, (DateTime<Utc>, V)>>,
}

impl<V: Clone> TtlCache<V> {
    /// Creates a cache with the given time-to-live and clock.
    #[must_use]
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            ttl: chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX),
            clock,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the cached value for `key` if it is still fresh.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<V> {
        let now = self.clock.now();
        let mut entries = self.entries.lock().expect("cache lock poisoned");
        if let Some((inserted_at, value)) = entries.get(key) {
            if now.signed_duration_since(*inserted_at) < self.ttl {
                return Some(value.clone());
            }
            entries.remove(key);
        }
        None
    }

    /// Stores a value under `key`, resetting its age.
    pub fn insert(&self, key: impl Into<String>, value: V) {
        let now = self.clock.now();
        self.entries
            .lock()
            .expect("cache lock poisoned")
            .insert(key.into(), (now, value));
    }

    /// Drops the entry for `key`, if any.
    pub fn invalidate(&self, key: &str) {
        self.entries
            .lock()
            .expect("cache lock poisoned")
            .remove(key);
    }
}

impl<V> std::fmt::Debug for TtlCache<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TtlCache").field("ttl", &self.ttl).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Test clock advanced explicitly.
    struct ManualClock {
        now: Mutex<DateTime<Utc>>,
    }

    impl ManualClock {
        fn new() -> Self {
            Self {
                now: Mutex::new(Utc::now()),
            }
        }

        fn advance(&self, by: Duration) {
            let mut now = self.now.lock().expect("lock");
            *now += chrono::Duration::from_std(by).expect("duration");
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            *self.now.lock().expect("lock")
        }
    }

    #[test]
    fn fresh_entry_is_returned() {
        let clock = Arc::new(ManualClock::new());
        let cache: TtlCache<u32> = TtlCache::new(Duration::from_secs(1), clock);

        cache.insert("manifest", 7);
        assert_eq!(cache.get("manifest"), Some(7));
    }

    #[test]
    fn stale_entry_is_evicted() {
        let clock = Arc::new(ManualClock::new());
        let cache: TtlCache<u32> = TtlCache::new(Duration::from_secs(1), Arc::clone(&clock) as _);

        cache.insert("manifest", 7);
        clock.advance(Duration::from_secs(2));
        assert_eq!(cache.get("manifest"), None);
    }

    #[test]
    fn insert_resets_age() {
        let clock = Arc::new(ManualClock::new());
        let cache: TtlCache<u32> = TtlCache::new(Duration::from_secs(2), Arc::clone(&clock) as _);

        cache.insert("manifest", 1);
        clock.advance(Duration::from_secs(1));
        cache.insert("manifest", 2);
        clock.advance(Duration::from_secs(1));
        assert_eq!(cache.get("manifest"), Some(2));
    }

    #[test]
    fn invalidate_drops_entry() {
        let clock = Arc::new(ManualClock::new());
        let cache: TtlCache<u32> = TtlCache::new(Duration::from_secs(60), clock);

        cache.insert("manifest", 7);
        cache.invalidate("manifest");
        assert_eq!(cache.get("manifest"), None);
    }
}
