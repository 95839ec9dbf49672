//! `AliasCache` — TTL- and generation-tagged memo of resolution results.
//!
//! One `parking_lot::Mutex` around the whole map: reads race writes rarely
//! enough (a cache entry is only invalidated by a config reload) that a
//! single mutex is simpler than a `RwLock` plus separate eviction bookkeeping.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

const DEFAULT_TTL: Duration = Duration::from_secs(300);
const DEFAULT_MAX_ENTRIES: usize = 1000;

struct Entry<V> {
    value: V,
    generation: u64,
    inserted_at: Instant,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub size: usize,
    pub generation: u64,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

pub struct AliasCache<V> {
    inner: Mutex<Inner<V>>,
    ttl: Duration,
    max_entries: usize,
}

struct Inner<V> {
    entries: HashMap<String, Entry<V>>,
    hits: u64,
    misses: u64,
}

impl<V: Clone> AliasCache<V> {
    pub fn new() -> Self {
        Self::with_limits(DEFAULT_TTL, DEFAULT_MAX_ENTRIES)
    }

    pub fn with_limits(ttl: Duration, max_entries: usize) -> Self {
        Self {
            inner: Mutex::new(Inner { entries: HashMap::new(), hits: 0, misses: 0 }),
            ttl,
            max_entries,
        }
    }

    /// Returns the cached value if present, not TTL-expired, and tagged with
    /// `current_generation`.
    pub fn get(&self, key: &str, current_generation: u64) -> Option<V> {
        let mut inner = self.inner.lock();
        let hit = inner
            .entries
            .get(key)
            .filter(|e| e.generation == current_generation && e.inserted_at.elapsed() < self.ttl)
            .map(|e| e.value.clone());

        if hit.is_some() {
            inner.hits += 1;
        } else {
            inner.misses += 1;
        }
        hit
    }

    pub fn put(&self, key: String, value: V, generation: u64) {
        let mut inner = self.inner.lock();

        if inner.entries.len() >= self.max_entries && !inner.entries.contains_key(&key) {
            if let Some(oldest_key) = inner
                .entries
                .iter()
                .min_by_key(|(_, e)| e.inserted_at)
                .map(|(k, _)| k.clone())
            {
                inner.entries.remove(&oldest_key);
            }
        }

        inner.entries.insert(key, Entry { value, generation, inserted_at: Instant::now() });
    }

    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.entries.clear();
    }

    pub fn stats(&self, current_generation: u64) -> CacheStats {
        let inner = self.inner.lock();
        CacheStats {
            hits: inner.hits,
            misses: inner.misses,
            size: inner.entries.len(),
            generation: current_generation,
        }
    }
}

impl<V: Clone> Default for AliasCache<V> {
    fn default() -> Self {
        Self::new()
    }
}
