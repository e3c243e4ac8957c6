//! In-memory TTL cache for vacancy records.
//!
//! Expired entries are invisible to reads immediately and are physically
//! removed by a periodic sweep, so a store nobody asks about does not pin
//! memory forever. Time is read through a [`Clock`] so expiry can be driven
//! by tests.

use crate::clock::{Clock, SystemClock};
use dashmap::DashMap;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;

/// Cache entry with metadata.
struct CacheEntry<V> {
    value: V,
    cached_at: Instant,
    ttl: Duration,
}

impl<V> CacheEntry<V> {
    fn remaining(&self, now: Instant) -> Option<Duration> {
        let elapsed = now.saturating_duration_since(self.cached_at);
        self.ttl.checked_sub(elapsed).filter(|r| !r.is_zero())
    }

    fn is_expired(&self, now: Instant) -> bool {
        self.remaining(now).is_none()
    }
}

/// Counters and live keys.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Live entries only.
    pub count: usize,
    /// Live keys, sorted.
    pub keys: Vec<String>,
}

/// Key → value store with a uniform TTL.
pub struct TtlCache<V> {
    entries: DashMap<String, CacheEntry<V>>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<V: Clone + Send + Sync + 'static> TtlCache<V> {
    /// Cache backed by the system clock.
    pub fn new(ttl: Duration) -> Self {
        Self::with_clock(ttl, Arc::new(SystemClock))
    }

    pub fn with_clock(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
            clock,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Insert or overwrite; the expiry restarts.
    pub fn set(&self, key: impl Into<String>, value: V) {
        self.entries.insert(
            key.into(),
            CacheEntry {
                value,
                cached_at: self.clock.now(),
                ttl: self.ttl,
            },
        );
    }

    /// Value if present and unexpired. Counts a hit or a miss.
    pub fn get(&self, key: &str) -> Option<V> {
        let now = self.clock.now();
        let hit = self
            .entries
            .get(key)
            .filter(|e| !e.is_expired(now))
            .map(|e| e.value.clone());
        match hit {
            Some(_) => self.hits.fetch_add(1, Ordering::Relaxed),
            None => self.misses.fetch_add(1, Ordering::Relaxed),
        };
        hit
    }

    /// Presence check without touching the counters.
    pub fn has(&self, key: &str) -> bool {
        let now = self.clock.now();
        self.entries
            .get(key)
            .map(|e| !e.is_expired(now))
            .unwrap_or(false)
    }

    /// Remove a key. Returns whether a live entry was removed.
    pub fn delete(&self, key: &str) -> bool {
        let now = self.clock.now();
        self.entries
            .remove(key)
            .map(|(_, e)| !e.is_expired(now))
            .unwrap_or(false)
    }

    /// Drop every entry and reset the counters.
    pub fn clear(&self) {
        self.entries.clear();
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }

    /// Whole seconds since insertion, as `ttl - remaining`.
    pub fn get_age(&self, key: &str) -> Option<u64> {
        let now = self.clock.now();
        let entry = self.entries.get(key)?;
        let remaining = entry.remaining(now)?;
        Some(entry.ttl.saturating_sub(remaining).as_secs())
    }

    pub fn stats(&self) -> CacheStats {
        let now = self.clock.now();
        let mut keys: Vec<String> = self
            .entries
            .iter()
            .filter(|e| !e.value().is_expired(now))
            .map(|e| e.key().clone())
            .collect();
        keys.sort();
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            count: keys.len(),
            keys,
        }
    }

    /// Physically remove expired entries. Returns how many were dropped.
    pub fn sweep(&self) -> usize {
        let now = self.clock.now();
        let before = self.entries.len();
        self.entries.retain(|_, e| !e.is_expired(now));
        before.saturating_sub(self.entries.len())
    }

    /// Sweep on a fixed period until the returned handle is stopped or
    /// dropped.
    pub fn spawn_sweeper(self: &Arc<Self>, every: Duration) -> SweeperHandle {
        let cache = Arc::clone(self);
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let removed = cache.sweep();
                if removed > 0 {
                    tracing::debug!("cache sweep removed {removed} expired entries");
                }
            }
        });
        tracing::info!("cache sweeper started: every={}s", every.as_secs());
        SweeperHandle { task: Some(task) }
    }
}

/// Owns the background sweep task.
pub struct SweeperHandle {
    task: Option<JoinHandle<()>>,
}

impl SweeperHandle {
    /// Stop sweeping. Idempotent.
    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            tracing::info!("cache sweeper stopped");
        }
    }
}

impl Drop for SweeperHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn cache(ttl_secs: u64) -> (TtlCache<u32>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        let cache = TtlCache::with_clock(
            Duration::from_secs(ttl_secs),
            Arc::clone(&clock) as Arc<dyn Clock>,
        );
        (cache, clock)
    }

    #[test]
    fn test_get_within_ttl() {
        let (cache, clock) = cache(600);
        cache.set("vacancy:10001", 7);
        clock.advance(Duration::from_secs(599));
        assert_eq!(cache.get("vacancy:10001"), Some(7));
        assert!(cache.has("vacancy:10001"));
    }

    #[test]
    fn test_invisible_after_ttl() {
        let (cache, clock) = cache(600);
        cache.set("vacancy:10001", 7);
        clock.advance(Duration::from_secs(600));
        assert_eq!(cache.get("vacancy:10001"), None);
        assert!(!cache.has("vacancy:10001"));
        assert_eq!(cache.get_age("vacancy:10001"), None);
        assert!(cache.stats().keys.is_empty());
    }

    #[test]
    fn test_set_resets_expiry() {
        let (cache, clock) = cache(60);
        cache.set("k", 1);
        clock.advance(Duration::from_secs(50));
        cache.set("k", 2);
        clock.advance(Duration::from_secs(50));
        assert_eq!(cache.get("k"), Some(2));
        assert_eq!(cache.get_age("k"), Some(50));
    }

    #[test]
    fn test_age_monotonic_and_bounded() {
        let (cache, clock) = cache(300);
        cache.set("k", 1);
        let mut last = 0;
        for _ in 0..29 {
            clock.advance(Duration::from_secs(10));
            let age = cache.get_age("k").unwrap();
            assert!(age >= last);
            assert!(age <= 300);
            last = age;
        }
        assert_eq!(last, 290);
    }

    #[test]
    fn test_stats_counts_hits_and_misses() {
        let (cache, _clock) = cache(60);
        cache.set("b", 1);
        cache.set("a", 2);
        assert_eq!(cache.get("a"), Some(2));
        assert_eq!(cache.get("missing"), None);
        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.count, 2);
        assert_eq!(stats.keys, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_delete_and_clear() {
        let (cache, _clock) = cache(60);
        cache.set("a", 1);
        cache.set("b", 2);
        assert!(cache.delete("a"));
        assert!(!cache.delete("a"));
        cache.get("b");
        cache.clear();
        assert_eq!(cache.stats(), CacheStats::default());
    }

    #[test]
    fn test_sweep_removes_only_expired() {
        let (cache, clock) = cache(60);
        cache.set("old", 1);
        clock.advance(Duration::from_secs(30));
        cache.set("new", 2);
        clock.advance(Duration::from_secs(31));
        assert_eq!(cache.sweep(), 1);
        assert_eq!(cache.stats().keys, vec!["new".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_runs_and_stops() {
        let clock = Arc::new(ManualClock::new());
        let cache = Arc::new(TtlCache::with_clock(
            Duration::from_secs(10),
            Arc::clone(&clock) as Arc<dyn Clock>,
        ));
        cache.set("k", 1u32);
        clock.advance(Duration::from_secs(11));

        let mut handle = cache.spawn_sweeper(Duration::from_secs(5));
        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(cache.entries.len(), 0);

        handle.stop();
        handle.stop();
        cache.set("k", 2);
        clock.advance(Duration::from_secs(11));
        tokio::time::sleep(Duration::from_secs(20)).await;
        assert_eq!(cache.entries.len(), 1);
    }
}
