//! Process-wide cache of decoded frame sets
//!
//! Structure: HashMap<SourceKey, FrameSet>
//! - One entry per unique source, shared by every selector showing it
//! - First writer wins: a duplicate decode never replaces a stored set
//! - No expiry, no size bound: callers free memory with evict()/clear()
//!
//! The handle is cheap to clone; clones share the same map. Selectors get a
//! handle injected through the Engine, so tests can use isolated caches
//! while applications share `FrameCache::global()`.

use log::debug;
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::entities::{FrameSet, SourceKey};

static GLOBAL: Lazy<FrameCache> = Lazy::new(FrameCache::new);

/// Hit/miss counts of `lookup()` at one point in time
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

impl CacheStats {
    pub fn lookups(&self) -> u64 {
        self.hits + self.misses
    }

    /// Share of lookups served from the cache, 0 when there were none
    pub fn hit_rate(&self) -> f64 {
        match self.lookups() {
            0 => 0.0,
            n => self.hits as f64 / n as f64,
        }
    }
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
}

/// Shared source-key -> frame set map
#[derive(Debug, Clone, Default)]
pub struct FrameCache {
    entries: Arc<Mutex<HashMap<SourceKey, FrameSet>>>,
    counters: Arc<Counters>,
}

impl FrameCache {
    /// Create an isolated cache
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide cache
    pub fn global() -> FrameCache {
        GLOBAL.clone()
    }

    /// Look up a decoded set. No side effects.
    pub fn get(&self, key: &SourceKey) -> Option<FrameSet> {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .cloned()
    }

    /// `get()` that counts toward hit/miss statistics. Used when a selector
    /// binds a source.
    pub fn lookup(&self, key: &SourceKey) -> Option<FrameSet> {
        let result = self.get(key);
        let counter = match result {
            Some(_) => &self.counters.hits,
            None => &self.counters.misses,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        result
    }

    /// Check presence
    pub fn contains(&self, key: &SourceKey) -> bool {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(key)
    }

    /// Insert if absent. Returns false (and drops `frames`) if the key
    /// already had an entry.
    pub fn put(&self, key: SourceKey, frames: FrameSet) -> bool {
        let (_, inserted) = self.get_or_insert(key, || frames);
        inserted
    }

    /// Atomically get the existing set or insert a new one.
    /// Returns (retained set, was_inserted).
    pub fn get_or_insert(&self, key: SourceKey, make: impl FnOnce() -> FrameSet) -> (FrameSet, bool) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());

        if let Some(existing) = entries.get(&key) {
            debug!("Cache keeps first set for {}", key);
            return (existing.clone(), false);
        }

        let frames = make();
        debug!("Cached {}: {} frames ({} bytes)", key, frames.len(), frames.mem());
        entries.insert(key, frames.clone());
        (frames, true)
    }

    /// Remove one entry. Returns whether it existed.
    pub fn evict(&self, key: &SourceKey) -> bool {
        let removed = self
            .entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(key);

        match removed {
            Some(frames) => {
                debug!("Evicted {} ({} bytes)", key, frames.mem());
                true
            }
            None => false,
        }
    }

    /// Remove every entry
    pub fn clear(&self) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let count = entries.len();
        entries.clear();
        debug!("Cleared frame cache ({} entries)", count);
    }

    /// Number of cached sources
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).is_empty()
    }

    /// Keys currently cached, sorted
    pub fn keys(&self) -> Vec<SourceKey> {
        let mut keys: Vec<SourceKey> = self
            .entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .keys()
            .cloned()
            .collect();
        keys.sort();
        keys
    }

    /// Total pixel memory held, in bytes
    ///
    /// Sets shared with selectors stay alive after eviction until those
    /// selectors drop them; this counts only what the cache holds.
    pub fn mem(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .map(FrameSet::mem)
            .sum()
    }

    /// Snapshot of lookup statistics, shared by every clone of this cache
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
        }
    }

    pub fn reset_stats(&self) {
        self.counters.hits.store(0, Ordering::Relaxed);
        self.counters.misses.store(0, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::Frame;
    use image::{Rgba, RgbaImage};
    use std::sync::Barrier;
    use std::thread;

    fn make_set(frames: usize) -> FrameSet {
        let frames = (0..frames)
            .map(|i| Frame::still(RgbaImage::from_pixel(4, 4, Rgba([i as u8, 0, 0, 255]))))
            .collect();
        FrameSet::new(frames).unwrap()
    }

    #[test]
    fn test_cache_basic_operations() {
        let cache = FrameCache::new();
        let key = SourceKey::from("mem:abc");

        assert!(cache.get(&key).is_none());
        assert!(cache.put(key.clone(), make_set(3)));
        assert!(cache.contains(&key));
        assert_eq!(cache.get(&key).unwrap().len(), 3);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.mem(), 3 * 4 * 4 * 4);
    }

    #[test]
    fn test_first_writer_wins() {
        let cache = FrameCache::new();
        let key = SourceKey::from("net:https://example.com/a.gif");
        let first = make_set(2);
        let second = make_set(5);

        assert!(cache.put(key.clone(), first.clone()));
        assert!(!cache.put(key.clone(), second));

        let kept = cache.get(&key).unwrap();
        assert!(FrameSet::ptr_eq(&kept, &first));
    }

    #[test]
    fn test_concurrent_put_keeps_one() {
        let cache = FrameCache::new();
        let key = SourceKey::from("asset:spin.gif");
        let barrier = Arc::new(Barrier::new(8));

        let sets: Vec<FrameSet> = (1..=8).map(make_set).collect();
        let handles: Vec<_> = sets
            .iter()
            .cloned()
            .map(|set| {
                let cache = cache.clone();
                let key = key.clone();
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    cache.put(key, set)
                })
            })
            .collect();

        let inserted: usize = handles
            .into_iter()
            .map(|h| usize::from(h.join().unwrap()))
            .sum();
        assert_eq!(inserted, 1);

        let kept = cache.get(&key).unwrap();
        assert_eq!(sets.iter().filter(|s| FrameSet::ptr_eq(s, &kept)).count(), 1);
        for _ in 0..10 {
            assert!(FrameSet::ptr_eq(&cache.get(&key).unwrap(), &kept));
        }
    }

    #[test]
    fn test_evict_and_clear() {
        let cache = FrameCache::new();
        let a = SourceKey::from("mem:a");
        let b = SourceKey::from("mem:b");

        assert!(!cache.evict(&a));
        cache.put(a.clone(), make_set(1));
        cache.put(b.clone(), make_set(1));

        assert!(cache.evict(&a));
        assert!(cache.get(&a).is_none());
        assert!(!cache.evict(&a));
        assert_eq!(cache.keys(), vec![b.clone()]);

        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.mem(), 0);
    }

    #[test]
    fn test_clones_share_entries() {
        let cache = FrameCache::new();
        let other = cache.clone();
        cache.put(SourceKey::from("mem:x"), make_set(1));
        assert!(other.contains(&SourceKey::from("mem:x")));
    }

    #[test]
    fn test_get_is_pure_lookup_counts() {
        let cache = FrameCache::new();
        let key = SourceKey::from("mem:s");
        cache.put(key.clone(), make_set(1));

        assert!(cache.get(&key).is_some());
        assert!(cache.get(&SourceKey::from("mem:missing")).is_none());
        assert_eq!(cache.stats(), CacheStats::default());

        assert!(cache.lookup(&key).is_some());
        assert!(cache.lookup(&SourceKey::from("mem:missing")).is_none());

        let stats = cache.clone().stats();
        assert_eq!(stats, CacheStats { hits: 1, misses: 1 });
        assert_eq!(stats.hit_rate(), 0.5);

        cache.reset_stats();
        assert_eq!(cache.stats().lookups(), 0);
        assert_eq!(cache.stats().hit_rate(), 0.0);
    }
}
