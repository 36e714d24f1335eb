//! Bounded resolution caches.
//!
//! Two interchangeable backends share one contract: store, fetch-if-present,
//! and evict the least recently used entry once capacity is exceeded.
//! Entries are immutable once stored; a later store of the same key is a
//! plain overwrite of an identical value, so no invalidation path exists.

use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use indexmap::IndexMap;
use parking_lot::Mutex;
use tracing::trace;

use crate::config::CacheBackend;

pub trait ResolutionCache<K, V> {
    fn store(&self, key: K, value: V);
    fn fetch(&self, key: &K) -> Option<V>;
}

/// Recency-ordered bounded map behind a single lock. Fetches move the entry
/// to the back; stores past capacity drop the front.
pub struct VanillaCache<K, V> {
    capacity: usize,
    entries: Mutex<IndexMap<K, V>>,
}

impl<K, V> VanillaCache<K, V> {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: Mutex::new(IndexMap::new()),
        }
    }
}

impl<K: Hash + Eq, V: Clone> ResolutionCache<K, V> for VanillaCache<K, V> {
    fn store(&self, key: K, value: V) {
        let mut entries = self.entries.lock();
        if let Some(index) = entries.get_index_of(&key) {
            entries.shift_remove_index(index);
        }
        entries.insert(key, value);
        while entries.len() > self.capacity {
            entries.shift_remove_index(0);
            trace!(capacity = self.capacity, "evicted least recently used cache entry");
        }
    }

    fn fetch(&self, key: &K) -> Option<V> {
        let mut entries = self.entries.lock();
        let index = entries.get_index_of(key)?;
        let back = entries.len() - 1;
        entries.move_index(index, back);
        entries.get(key).cloned()
    }
}

struct Stamped<V> {
    value: V,
    stamp: AtomicU64,
}

/// Sharded bounded cache for read-heavy concurrent use. Recency is tracked
/// with a logical clock; eviction removes the least recently stamped entry.
/// Concurrent stores of the same resolution may race, which is tolerated:
/// the values are identical and the insert is a plain overwrite.
pub struct ConcurrentCache<K, V> {
    capacity: usize,
    clock: AtomicU64,
    entries: DashMap<K, Stamped<V>>,
}

impl<K: Hash + Eq, V> ConcurrentCache<K, V> {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            clock: AtomicU64::new(0),
            entries: DashMap::new(),
        }
    }

    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed) + 1
    }
}

impl<K: Hash + Eq + Clone, V: Clone> ResolutionCache<K, V> for ConcurrentCache<K, V> {
    fn store(&self, key: K, value: V) {
        let stamp = self.tick();
        self.entries.insert(
            key,
            Stamped {
                value,
                stamp: AtomicU64::new(stamp),
            },
        );
        while self.entries.len() > self.capacity {
            let mut oldest: Option<(K, u64)> = None;
            for entry in self.entries.iter() {
                let stamp = entry.stamp.load(Ordering::Relaxed);
                match &oldest {
                    Some((_, best)) if *best <= stamp => {}
                    _ => oldest = Some((entry.key().clone(), stamp)),
                }
            }
            match oldest {
                Some((key, _)) => {
                    self.entries.remove(&key);
                    trace!(capacity = self.capacity, "evicted least recently used cache entry");
                }
                None => break,
            }
        }
    }

    fn fetch(&self, key: &K) -> Option<V> {
        let entry = self.entries.get(key)?;
        entry.stamp.store(self.tick(), Ordering::Relaxed);
        Some(entry.value.clone())
    }
}

/// Backend selected once at engine construction.
pub enum MemberCache<K, V> {
    Vanilla(VanillaCache<K, V>),
    Concurrent(ConcurrentCache<K, V>),
}

impl<K: Hash + Eq, V> MemberCache<K, V> {
    pub fn new(backend: CacheBackend, capacity: usize) -> Self {
        match backend {
            CacheBackend::Vanilla => MemberCache::Vanilla(VanillaCache::new(capacity)),
            CacheBackend::Concurrent => MemberCache::Concurrent(ConcurrentCache::new(capacity)),
        }
    }
}

impl<K: Hash + Eq + Clone, V: Clone> ResolutionCache<K, V> for MemberCache<K, V> {
    fn store(&self, key: K, value: V) {
        match self {
            MemberCache::Vanilla(cache) => cache.store(key, value),
            MemberCache::Concurrent(cache) => cache.store(key, value),
        }
    }

    fn fetch(&self, key: &K) -> Option<V> {
        match self {
            MemberCache::Vanilla(cache) => cache.fetch(key),
            MemberCache::Concurrent(cache) => cache.fetch(key),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exercise_lru(cache: &dyn ResolutionCache<u32, &'static str>) {
        cache.store(1, "one");
        cache.store(2, "two");
        // touch 1 so 2 becomes the eviction victim
        assert_eq!(cache.fetch(&1), Some("one"));
        cache.store(3, "three");
        assert_eq!(cache.fetch(&2), None);
        assert_eq!(cache.fetch(&1), Some("one"));
        assert_eq!(cache.fetch(&3), Some("three"));
    }

    #[test]
    fn vanilla_evicts_least_recently_used() {
        exercise_lru(&VanillaCache::new(2));
    }

    #[test]
    fn concurrent_evicts_least_recently_used() {
        exercise_lru(&ConcurrentCache::new(2));
    }

    #[test]
    fn store_overwrites_in_place() {
        let cache = VanillaCache::new(2);
        cache.store(7, "a");
        cache.store(7, "b");
        assert_eq!(cache.fetch(&7), Some("b"));

        let concurrent = ConcurrentCache::new(2);
        concurrent.store(7, "a");
        concurrent.store(7, "b");
        assert_eq!(concurrent.fetch(&7), Some("b"));
    }

    #[test]
    fn capacity_is_a_hard_bound() {
        let cache = VanillaCache::new(3);
        for i in 0..50u32 {
            cache.store(i, "x");
        }
        let survivors = (0..50u32).filter(|i| cache.fetch(i).is_some()).count();
        assert_eq!(survivors, 3);
    }
}
