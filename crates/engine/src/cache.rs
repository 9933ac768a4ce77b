//! In-memory TTL cache.
//!
//! [`TtlCache`] is a plain key/value map guarded by a reader/writer lock:
//! lookups share the lock, every mutation takes it exclusively. Guards are
//! never held across an `.await`, so the cache can be shared freely between
//! async tasks while storage reads happen outside of it.
//!
//! Expiry is lazy: an entry past its deadline is invisible to [`get`] even if
//! the background sweeper has not removed it yet. The sweeper only bounds
//! memory for keys nobody reads again.
//!
//! [`get`]: TtlCache::get

use std::{
    collections::HashMap,
    sync::{Arc, Weak},
    time::Duration,
};

use parking_lot::RwLock;
use tokio::{
    task::JoinHandle,
    time::{Instant, MissedTickBehavior},
};

pub(crate) mod keys;

/// Upper bound for a single entry's lifetime, keeps `Instant` arithmetic in
/// range.
const MAX_TTL: Duration = Duration::from_secs(60 * 60 * 24 * 365);

/// Smallest sweep period accepted by [`TtlCache::spawn_sweeper`].
const MIN_SWEEP_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Clone, Debug)]
struct CacheItem<V> {
    value: V,
    expires_at: Instant,
}

impl<V> CacheItem<V> {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// Thread-safe key/value store with per-entry time-to-live.
#[derive(Debug)]
pub struct TtlCache<V> {
    items: RwLock<HashMap<String, CacheItem<V>>>,
}

impl<V> Default for TtlCache<V> {
    fn default() -> Self {
        Self {
            items: RwLock::new(HashMap::new()),
        }
    }
}

impl<V: Clone> TtlCache<V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the value stored under `key`, if it has not expired.
    pub fn get(&self, key: &str) -> Option<V> {
        let items = self.items.read();
        items
            .get(key)
            .filter(|item| item.is_live(Instant::now()))
            .map(|item| item.value.clone())
    }

    /// Stores `value` under `key`, replacing any previous entry.
    pub fn set(&self, key: impl Into<String>, value: V, ttl: Duration) {
        let expires_at = Instant::now() + ttl.min(MAX_TTL);
        self.items
            .write()
            .insert(key.into(), CacheItem { value, expires_at });
    }

    /// Removes a single key. Returns `true` if it was present.
    pub fn delete(&self, key: &str) -> bool {
        self.items.write().remove(key).is_some()
    }

    /// Removes every entry and returns how many were dropped.
    pub fn clear(&self) -> usize {
        let mut items = self.items.write();
        let removed = items.len();
        items.clear();
        removed
    }

    /// Removes every entry whose key contains `pattern`.
    ///
    /// Writers use this when they cannot know the exact keys they made
    /// stale (e.g. every cached page of every viewer).
    pub fn clear_pattern(&self, pattern: &str) -> usize {
        let mut items = self.items.write();
        let before = items.len();
        items.retain(|key, _| !key.contains(pattern));
        before - items.len()
    }

    /// Drops entries past their deadline. Returns how many were removed.
    pub fn sweep_expired(&self) -> usize {
        let now = Instant::now();
        let mut items = self.items.write();
        let before = items.len();
        items.retain(|_, item| item.is_live(now));
        before - items.len()
    }

    /// Number of stored entries, expired ones not yet swept included.
    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }
}

impl<V> TtlCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Spawns the periodic sweeper on the current tokio runtime.
    ///
    /// The task only keeps a weak handle and exits on the first tick after
    /// the last `Arc` to the cache is dropped.
    pub fn spawn_sweeper(self: &Arc<Self>, every: Duration) -> JoinHandle<()> {
        let cache: Weak<Self> = Arc::downgrade(self);
        let every = every.max(MIN_SWEEP_INTERVAL);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(cache) = cache.upgrade() else {
                    tracing::debug!("cache dropped, stopping sweeper");
                    break;
                };
                let removed = cache.sweep_expired();
                if removed > 0 {
                    tracing::debug!(removed, "swept expired cache entries");
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TTL: Duration = Duration::from_secs(300);

    #[test]
    fn get_returns_what_was_set() {
        let cache = TtlCache::new();
        cache.set("a", 1, TTL);
        assert_eq!(cache.get("a"), Some(1));
        assert_eq!(cache.get("b"), None);
    }

    #[test]
    fn set_overwrites_previous_value() {
        let cache = TtlCache::new();
        cache.set("a", 1, TTL);
        cache.set("a", 2, TTL);
        assert_eq!(cache.get("a"), Some(2));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn zero_ttl_is_never_visible() {
        let cache = TtlCache::new();
        cache.set("a", 1, Duration::ZERO);
        assert_eq!(cache.get("a"), None);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn delete_and_clear() {
        let cache = TtlCache::new();
        cache.set("a", 1, TTL);
        cache.set("b", 2, TTL);
        assert!(cache.delete("a"));
        assert!(!cache.delete("a"));
        assert_eq!(cache.clear(), 1);
        assert!(cache.is_empty());
    }

    #[test]
    fn clear_pattern_removes_matching_keys_only() {
        let cache = TtlCache::new();
        cache.set("transactions|viewer=1|page", 1, TTL);
        cache.set("transactions|viewer=2|page", 2, TTL);
        cache.set("balance|viewer=1|", 3, TTL);

        assert_eq!(cache.clear_pattern("|viewer=1|"), 2);
        assert_eq!(cache.get("transactions|viewer=2|page"), Some(2));
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn entry_expires_exactly_at_ttl() {
        let cache = TtlCache::new();
        cache.set("a", 1, Duration::from_secs(10));

        tokio::time::advance(Duration::from_millis(9_999)).await;
        assert_eq!(cache.get("a"), Some(1));

        tokio::time::advance(Duration::from_millis(1)).await;
        assert_eq!(cache.get("a"), None);
        // Lazy expiry: still stored until swept.
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.sweep_expired(), 1);
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn sweeper_removes_expired_entries() {
        let cache = Arc::new(TtlCache::new());
        cache.set("short", 1, Duration::from_secs(1));
        cache.set("long", 2, Duration::from_secs(3_600));

        let handle = cache.spawn_sweeper(Duration::from_secs(10));
        tokio::time::sleep(Duration::from_secs(11)).await;

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("long"), Some(2));
        handle.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn sweeper_stops_when_cache_is_dropped() {
        let cache: Arc<TtlCache<u8>> = Arc::new(TtlCache::new());
        let handle = cache.spawn_sweeper(Duration::from_secs(1));
        drop(cache);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(handle.is_finished());
    }

    #[test]
    fn concurrent_readers_and_writers() {
        let cache = Arc::new(TtlCache::new());
        let workers: Vec<_> = (0..8)
            .map(|worker| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || {
                    for i in 0..200 {
                        let key = format!("k{worker}-{i}");
                        cache.set(key.clone(), i, TTL);
                        assert_eq!(cache.get(&key), Some(i));
                        if i % 50 == 0 {
                            cache.clear_pattern(&format!("k{worker}-"));
                        }
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }
        assert!(cache.len() <= 8 * 200);
    }
}
