//! Plan result cache
//!
//! Bounded LRU with write-based expiry and single-flight loading: for any
//! key at most one loader runs at a time, and concurrent callers that miss
//! wait for it and then read its result.

use crate::config::CacheSpec;
use dashmap::DashMap;
use lru::LruCache;
use parking_lot::Mutex;
use sqlscope_analyzer::AnalysisResult;
use std::future::Future;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Counters exposed for observability
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub load_successes: u64,
    pub load_failures: u64,
    pub total_load_time: Duration,
    /// Entries removed for size or expiry
    pub evictions: u64,
}

impl CacheStats {
    pub fn requests(&self) -> u64 {
        self.hits + self.misses
    }

    pub fn hit_rate(&self) -> f64 {
        match self.requests() {
            0 => 1.0,
            requests => self.hits as f64 / requests as f64,
        }
    }

    pub fn load_count(&self) -> u64 {
        self.load_successes + self.load_failures
    }

    /// Mean time spent in loaders
    pub fn average_load_penalty(&self) -> Duration {
        match self.load_count() {
            0 => Duration::ZERO,
            loads => self.total_load_time / loads as u32,
        }
    }
}

struct CacheEntry {
    result: AnalysisResult,
    written_at: Instant,
}

/// Analysis results keyed by statement text.
///
/// Keys never include bound parameter values. For PostgreSQL, where the plan
/// comes from `EXPLAIN ANALYZE`, a cached entry reflects the parameters of
/// the first execution that loaded it.
pub struct ResultCache {
    entries: Mutex<LruCache<String, CacheEntry>>,
    in_flight: DashMap<String, Arc<tokio::sync::Mutex<()>>>,
    stats: Mutex<CacheStats>,
    max_size: usize,
    expire_after_write: Option<Duration>,
    record_stats: bool,
}

impl ResultCache {
    pub fn new(spec: CacheSpec) -> Self {
        let capacity = NonZeroUsize::new(spec.max_size).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            in_flight: DashMap::new(),
            stats: Mutex::new(CacheStats::default()),
            max_size: capacity.get(),
            expire_after_write: spec.expire_after_write,
            record_stats: spec.record_stats,
        }
    }

    /// Return the cached result for `key`, or run `loader` to produce it.
    ///
    /// Concurrent misses on the same key run `loader` once; the others wait
    /// and then read the stored value. A failed load stores nothing and the
    /// next waiter tries again, still behind the same per-key lock.
    pub async fn get_or_compute<F, Fut, E>(&self, key: &str, loader: F) -> Result<AnalysisResult, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<AnalysisResult, E>>,
    {
        if let Some(hit) = self.lookup(key) {
            self.record(|stats| stats.hits += 1);
            self.log_stats();
            return Ok(hit);
        }

        let flight = self
            .in_flight
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone();
        let guard = flight.lock().await;

        if let Some(hit) = self.lookup(key) {
            self.release(key, &flight);
            drop(guard);
            self.record(|stats| stats.hits += 1);
            self.log_stats();
            return Ok(hit);
        }
        self.record(|stats| stats.misses += 1);

        let started = Instant::now();
        let loaded = loader().await;
        let elapsed = started.elapsed();

        match &loaded {
            Ok(result) => {
                self.insert(key, result.clone());
                self.record(|stats| {
                    stats.load_successes += 1;
                    stats.total_load_time += elapsed;
                });
            }
            Err(_) => self.record(|stats| {
                stats.load_failures += 1;
                stats.total_load_time += elapsed;
            }),
        }

        self.release(key, &flight);
        drop(guard);
        self.log_stats();
        loaded
    }

    /// Cached value, if present and not expired
    pub fn get(&self, key: &str) -> Option<AnalysisResult> {
        self.lookup(key)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn invalidate_all(&self) {
        self.entries.lock().clear();
    }

    pub fn stats(&self) -> CacheStats {
        *self.stats.lock()
    }

    fn lookup(&self, key: &str) -> Option<AnalysisResult> {
        let mut entries = self.entries.lock();
        let expired = match entries.get(key) {
            None => return None,
            Some(entry) => self
                .expire_after_write
                .is_some_and(|ttl| entry.written_at.elapsed() >= ttl),
        };
        if expired {
            entries.pop(key);
            drop(entries);
            self.record(|stats| stats.evictions += 1);
            tracing::trace!(key, "plan cache entry expired");
            return None;
        }
        entries.get(key).map(|entry| entry.result.clone())
    }

    fn insert(&self, key: &str, result: AnalysisResult) {
        let entry = CacheEntry {
            result,
            written_at: Instant::now(),
        };
        let displaced = self.entries.lock().push(key.to_string(), entry);
        if let Some((displaced_key, _)) = displaced
            && displaced_key != key
        {
            self.record(|stats| stats.evictions += 1);
        }
    }

    /// Drop the per-key lock once nobody else holds or waits on it.
    ///
    /// Must be called while still holding the lock. Waiters clone the `Arc`
    /// under the same shard lock `remove_if` takes, so a count of two (map
    /// entry plus ours) means no caller is queued behind us.
    fn release(&self, key: &str, flight: &Arc<tokio::sync::Mutex<()>>) {
        self.in_flight.remove_if(key, |_, current| {
            Arc::ptr_eq(current, flight) && Arc::strong_count(current) == 2
        });
    }

    fn record(&self, update: impl FnOnce(&mut CacheStats)) {
        if self.record_stats {
            update(&mut self.stats.lock());
        }
    }

    fn log_stats(&self) {
        if !self.record_stats {
            return;
        }
        let stats = self.stats();
        tracing::debug!(
            size = self.len(),
            max_size = self.max_size,
            hit_rate = stats.hit_rate(),
            loads = stats.load_count(),
            avg_load_ms = stats.average_load_penalty().as_secs_f64() * 1000.0,
            evictions = stats.evictions,
            "plan cache stats"
        );
    }
}

impl std::fmt::Debug for ResultCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultCache")
            .field("len", &self.len())
            .field("max_size", &self.max_size)
            .field("expire_after_write", &self.expire_after_write)
            .finish()
    }
}
