//! LRU+TTL query result cache.
//!
//! # Responsibilities
//! - Serve cached result sets for a (sql, params) fingerprint
//! - Expire entries past their TTL, never serving a stale value
//! - Evict least-recently-used entries when over capacity
//! - Collapse concurrent computes for the same key to one
//!
//! # Design Decisions
//! - Metadata mutex is held only for lookup/touch/insert/evict, never
//!   across a compute; computes serialize on per-key gates in a DashMap
//! - Recency is a monotonic tick per access; eviction scans for the
//!   minimum (accessed, inserted) pair, since at typical capacities a
//!   linear scan beats maintaining an intrusive list
//! - Failed computes release the gate and are never stored

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use serde_json::Value;

use crate::error::ApiResult;

struct Entry {
    value: Value,
    /// None = no expiry (ttl of zero).
    expires_at: Option<Instant>,
    inserted: u64,
    accessed: u64,
}

#[derive(Default)]
struct Inner {
    entries: HashMap<String, Entry>,
    tick: u64,
}

/// Cache hit/miss/eviction counters, readable as a probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

/// Combined LRU+TTL cache for materialized query results.
pub struct SqlCache {
    capacity: usize,
    default_ttl: Duration,
    inner: Mutex<Inner>,
    inflight: DashMap<String, Arc<Mutex<()>>>,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl SqlCache {
    /// Create a cache with the given capacity and default TTL.
    /// A zero default TTL means entries do not expire.
    pub fn new(capacity: usize, default_ttl: Duration) -> Self {
        Self {
            capacity: capacity.max(1),
            default_ttl,
            inner: Mutex::new(Inner::default()),
            inflight: DashMap::new(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    /// Return the cached value for `key`, or run `compute`, store its
    /// result and return it. An explicit `ttl` overrides the default;
    /// `Some(Duration::ZERO)` pins the entry until capacity evicts it.
    ///
    /// Concurrent callers for the same key serialize on a per-key gate and
    /// re-check the store before computing, so one compute feeds them all.
    pub fn get_or_compute<F>(&self, key: &str, ttl: Option<Duration>, compute: F) -> ApiResult<Value>
    where
        F: FnOnce() -> ApiResult<Value>,
    {
        if let Some(value) = self.lookup(key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(value);
        }

        let gate = {
            let entry = self
                .inflight
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())));
            entry.clone()
        };
        let _serialized = gate.lock().unwrap_or_else(|e| e.into_inner());

        // Another caller may have computed while we waited on the gate.
        if let Some(value) = self.lookup(key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            self.inflight.remove(key);
            return Ok(value);
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let result = compute();
        self.inflight.remove(key);

        let value = result?;
        self.insert(key, value.clone(), ttl);
        Ok(value)
    }

    /// Current number of live entries (expired ones may linger until the
    /// next access or insert sweeps them).
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }

    fn lookup(&self, key: &str) -> Option<Value> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let now = Instant::now();

        let expired = matches!(
            inner.entries.get(key),
            Some(e) if e.expires_at.is_some_and(|t| now >= t)
        );
        if expired {
            inner.entries.remove(key);
            return None;
        }

        inner.tick += 1;
        let tick = inner.tick;
        let entry = inner.entries.get_mut(key)?;
        entry.accessed = tick;
        Some(entry.value.clone())
    }

    fn insert(&self, key: &str, value: Value, ttl: Option<Duration>) {
        let ttl = ttl.unwrap_or(self.default_ttl);
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let now = Instant::now();

        // Opportunistic sweep so expired entries do not occupy capacity.
        inner
            .entries
            .retain(|_, e| e.expires_at.map_or(true, |t| now < t));

        inner.tick += 1;
        let tick = inner.tick;
        let expires_at = if ttl.is_zero() { None } else { Some(now + ttl) };
        inner.entries.insert(
            key.to_string(),
            Entry {
                value,
                expires_at,
                inserted: tick,
                accessed: tick,
            },
        );

        while inner.entries.len() > self.capacity {
            let victim = inner
                .entries
                .iter()
                .min_by_key(|(_, e)| (e.accessed, e.inserted))
                .map(|(k, _)| k.clone());
            match victim {
                Some(k) => {
                    inner.entries.remove(&k);
                    self.evictions.fetch_add(1, Ordering::Relaxed);
                    tracing::debug!(key = %k, "evicted least-recently-used cache entry");
                }
                None => break,
            }
        }
    }
}

impl std::fmt::Debug for SqlCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqlCache")
            .field("capacity", &self.capacity)
            .field("default_ttl", &self.default_ttl)
            .field("len", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;

    fn counting(counter: &Arc<AtomicUsize>, value: Value) -> impl FnOnce() -> ApiResult<Value> {
        let counter = counter.clone();
        move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(value)
        }
    }

    #[test]
    fn test_hit_is_idempotent() {
        let cache = SqlCache::new(10, Duration::from_secs(60));
        let count = Arc::new(AtomicUsize::new(0));

        let v1 = cache
            .get_or_compute("k", None, counting(&count, json!([1, 2])))
            .unwrap();
        let v2 = cache
            .get_or_compute("k", None, counting(&count, json!("never")))
            .unwrap();

        assert_eq!(v1, json!([1, 2]));
        assert_eq!(v2, json!([1, 2]));
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(cache.stats().hits, 1);
        assert_eq!(cache.stats().misses, 1);
    }

    #[test]
    fn test_ttl_expiry_recomputes() {
        let cache = SqlCache::new(10, Duration::from_millis(40));
        let count = Arc::new(AtomicUsize::new(0));

        cache
            .get_or_compute("k", None, counting(&count, json!("old")))
            .unwrap();
        std::thread::sleep(Duration::from_millis(60));

        let v = cache
            .get_or_compute("k", None, counting(&count, json!("new")))
            .unwrap();
        assert_eq!(v, json!("new"));
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_per_call_ttl_overrides_default() {
        let cache = SqlCache::new(10, Duration::from_secs(60));
        let count = Arc::new(AtomicUsize::new(0));

        cache
            .get_or_compute(
                "k",
                Some(Duration::from_millis(30)),
                counting(&count, json!(1)),
            )
            .unwrap();
        std::thread::sleep(Duration::from_millis(50));

        cache
            .get_or_compute("k", None, counting(&count, json!(2)))
            .unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_zero_ttl_pins_until_capacity() {
        let cache = SqlCache::new(10, Duration::from_millis(20));
        let count = Arc::new(AtomicUsize::new(0));

        cache
            .get_or_compute("k", Some(Duration::ZERO), counting(&count, json!(1)))
            .unwrap();
        std::thread::sleep(Duration::from_millis(40));

        cache
            .get_or_compute("k", None, counting(&count, json!(2)))
            .unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_lru_eviction_over_capacity() {
        let cache = SqlCache::new(2, Duration::from_secs(60));
        let count = Arc::new(AtomicUsize::new(0));

        cache.get_or_compute("a", None, counting(&count, json!("a"))).unwrap();
        cache.get_or_compute("b", None, counting(&count, json!("b"))).unwrap();
        cache.get_or_compute("c", None, counting(&count, json!("c"))).unwrap();

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.stats().evictions, 1);

        // a was least recently used and must recompute; b and c are hits.
        cache.get_or_compute("b", None, counting(&count, json!("b"))).unwrap();
        cache.get_or_compute("a", None, counting(&count, json!("a"))).unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn test_read_protects_from_eviction() {
        let cache = SqlCache::new(2, Duration::from_secs(60));
        let count = Arc::new(AtomicUsize::new(0));

        cache.get_or_compute("a", None, counting(&count, json!("a"))).unwrap();
        cache.get_or_compute("b", None, counting(&count, json!("b"))).unwrap();
        // Touch a so b becomes the eviction victim.
        cache.get_or_compute("a", None, counting(&count, json!("a"))).unwrap();
        cache.get_or_compute("c", None, counting(&count, json!("c"))).unwrap();

        cache.get_or_compute("a", None, counting(&count, json!("a"))).unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 3, "a must still be cached");

        cache.get_or_compute("b", None, counting(&count, json!("b"))).unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 4, "b must have been evicted");
    }

    #[test]
    fn test_failed_compute_not_cached() {
        let cache = SqlCache::new(10, Duration::from_secs(60));
        let count = Arc::new(AtomicUsize::new(0));

        let err = cache.get_or_compute("k", None, || {
            Err(crate::error::ApiError::QueryError("boom".into()))
        });
        assert!(err.is_err());
        assert_eq!(cache.len(), 0);

        let v = cache
            .get_or_compute("k", None, counting(&count, json!("ok")))
            .unwrap();
        assert_eq!(v, json!("ok"));
    }

    #[test]
    fn test_single_flight_collapses_computes() {
        let cache = Arc::new(SqlCache::new(10, Duration::from_secs(60)));
        let count = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = cache.clone();
                let count = count.clone();
                std::thread::spawn(move || {
                    cache
                        .get_or_compute("k", None, move || {
                            count.fetch_add(1, Ordering::SeqCst);
                            std::thread::sleep(Duration::from_millis(30));
                            Ok(json!("shared"))
                        })
                        .unwrap()
                })
            })
            .collect();

        for h in handles {
            assert_eq!(h.join().unwrap(), json!("shared"));
        }
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
