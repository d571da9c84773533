//! Bounded in-memory cache with LRU eviction and per-entry TTL.
//!
//! # Design Decisions
//! - True LRU: hot keys outlive one-off lookups under capacity pressure
//! - Recency is a monotonically increasing tick; `order` maps tick → key so
//!   the least recently used key is the first entry of a `BTreeMap`
//! - A single `std::sync::Mutex` guards map, order and counters together,
//!   so no caller observes a half-evicted or half-inserted state
//! - Nothing awaits while the lock is held
//! - Expired entries are dropped lazily on `get` and in bulk by
//!   `cleanup_expired` (driven by the sweeper), never scanned on every read

use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

use crate::cache::entry::CacheEntry;
use crate::cache::CacheStats;
use crate::config::schema::LruCacheConfig;
use crate::observability::metrics;

#[derive(Debug)]
struct Slot<T> {
    entry: CacheEntry<T>,
    tick: u64,
}

#[derive(Debug)]
struct LruState<T> {
    map: HashMap<String, Slot<T>>,
    order: BTreeMap<u64, String>,
    next_tick: u64,
    hits: u64,
    misses: u64,
}

impl<T> LruState<T> {
    fn bump(&mut self) -> u64 {
        let tick = self.next_tick;
        self.next_tick += 1;
        tick
    }

    fn remove(&mut self, key: &str) -> Option<Slot<T>> {
        let slot = self.map.remove(key)?;
        self.order.remove(&slot.tick);
        Some(slot)
    }

    fn evict_lru(&mut self) -> Option<String> {
        let (_, key) = self.order.pop_first()?;
        self.map.remove(&key);
        Some(key)
    }
}

/// Thread-safe LRU cache with TTL support.
#[derive(Debug)]
pub struct LruCache<T> {
    name: String,
    capacity: usize,
    default_ttl: Duration,
    state: Mutex<LruState<T>>,
}

impl<T: Clone> LruCache<T> {
    /// Create a cache holding at most `capacity` entries (clamped to >= 1).
    ///
    /// `default_ttl` applies to `set`; zero means entries never expire.
    pub fn new(name: impl Into<String>, capacity: usize, default_ttl: Duration) -> Self {
        Self {
            name: name.into(),
            capacity: capacity.max(1),
            default_ttl,
            state: Mutex::new(LruState {
                map: HashMap::new(),
                order: BTreeMap::new(),
                next_tick: 0,
                hits: 0,
                misses: 0,
            }),
        }
    }

    /// Create a cache from its config section.
    pub fn from_config(name: impl Into<String>, config: &LruCacheConfig) -> Self {
        Self::new(
            name,
            config.capacity,
            Duration::from_secs(config.default_ttl_secs),
        )
    }

    /// Name used in logs and metric labels.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Maximum number of entries.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// TTL applied by `set`.
    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Number of stored entries, expired ones included until swept.
    pub fn len(&self) -> usize {
        self.lock().map.len()
    }

    /// True when no entries are stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Look up `key`, promoting it to most recently used on a hit.
    ///
    /// An expired entry is removed and counted as a miss.
    pub fn get(&self, key: &str) -> Option<T> {
        let mut state = self.lock();

        let expired = match state.map.get(key) {
            None => {
                state.misses += 1;
                drop(state);
                metrics::record_cache_miss(&self.name);
                tracing::debug!(cache = %self.name, key, "Cache miss");
                return None;
            }
            Some(slot) => slot.entry.is_expired(),
        };

        if expired {
            if let Some(slot) = state.remove(key) {
                tracing::debug!(
                    cache = %self.name,
                    key,
                    age_secs = slot.entry.age().as_secs_f64(),
                    "Cache entry expired"
                );
            }
            state.misses += 1;
            let size = state.map.len();
            drop(state);
            metrics::record_cache_miss(&self.name);
            metrics::record_cache_size(&self.name, size);
            return None;
        }

        let tick = state.bump();
        state.hits += 1;
        let slot = state.map.get_mut(key)?;
        let old_tick = std::mem::replace(&mut slot.tick, tick);
        let value = slot.entry.value().clone();
        let age = slot.entry.age();
        state.order.remove(&old_tick);
        state.order.insert(tick, key.to_string());
        drop(state);

        metrics::record_cache_hit(&self.name);
        tracing::debug!(cache = %self.name, key, age_secs = age.as_secs_f64(), "Cache hit");
        Some(value)
    }

    /// Check for a live entry without touching recency or counters.
    pub fn contains_key(&self, key: &str) -> bool {
        self.lock()
            .map
            .get(key)
            .is_some_and(|slot| !slot.entry.is_expired())
    }

    /// Insert with the default TTL.
    pub fn set(&self, key: impl Into<String>, value: T) {
        self.set_with_ttl(key, value, self.default_ttl);
    }

    /// Insert with an explicit TTL; zero means never expire.
    ///
    /// Inserting a new key into a full cache first evicts the least recently
    /// used entry. The inserted key becomes most recently used.
    pub fn set_with_ttl(&self, key: impl Into<String>, value: T, ttl: Duration) {
        let key = key.into();
        let mut state = self.lock();

        let mut evicted = None;
        if state.remove(&key).is_none() && state.map.len() >= self.capacity {
            evicted = state.evict_lru();
        }

        let tick = state.bump();
        state.order.insert(tick, key.clone());
        state.map.insert(
            key.clone(),
            Slot {
                entry: CacheEntry::new(value, ttl),
                tick,
            },
        );
        let size = state.map.len();
        drop(state);

        if let Some(victim) = evicted {
            metrics::record_cache_eviction(&self.name);
            tracing::debug!(cache = %self.name, key = %victim, "Cache eviction");
        }
        metrics::record_cache_size(&self.name, size);
        tracing::debug!(cache = %self.name, key = %key, ttl_secs = ttl.as_secs_f64(), "Cache set");
    }

    /// Remove `key` if present.
    pub fn delete(&self, key: &str) {
        let mut state = self.lock();
        if state.remove(key).is_some() {
            let size = state.map.len();
            drop(state);
            metrics::record_cache_size(&self.name, size);
            tracing::debug!(cache = %self.name, key, "Cache delete");
        }
    }

    /// Remove everything and reset the hit/miss counters.
    pub fn clear(&self) {
        let mut state = self.lock();
        state.map.clear();
        state.order.clear();
        state.hits = 0;
        state.misses = 0;
        drop(state);
        metrics::record_cache_size(&self.name, 0);
        tracing::info!(cache = %self.name, "Cache cleared");
    }

    /// Drop all expired entries; survivors keep their recency order.
    ///
    /// Returns the number of entries removed.
    pub fn cleanup_expired(&self) -> usize {
        let mut state = self.lock();
        let expired: Vec<String> = state
            .map
            .iter()
            .filter(|(_, slot)| slot.entry.is_expired())
            .map(|(key, _)| key.clone())
            .collect();
        for key in &expired {
            state.remove(key);
        }
        let size = state.map.len();
        drop(state);

        if !expired.is_empty() {
            metrics::record_cache_size(&self.name, size);
            tracing::info!(cache = %self.name, removed = expired.len(), "Cleaned up expired cache entries");
        }
        expired.len()
    }

    /// Snapshot of size and hit/miss counters.
    pub fn stats(&self) -> CacheStats {
        let state = self.lock();
        CacheStats::new(
            state.map.len(),
            Some(self.capacity),
            state.hits,
            state.misses,
        )
    }

    /// Return the cached value for `key`, or run `fetch`, store its success
    /// and return it. Errors are passed through and never cached.
    pub async fn get_or_insert_with<F, Fut, E>(
        &self,
        key: &str,
        ttl: Option<Duration>,
        fetch: F,
    ) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Some(value) = self.get(key) {
            return Ok(value);
        }
        let value = fetch().await?;
        self.set_with_ttl(key, value.clone(), ttl.unwrap_or(self.default_ttl));
        Ok(value)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LruState<T>> {
        self.state.lock().expect("lru cache mutex poisoned")
    }
}
