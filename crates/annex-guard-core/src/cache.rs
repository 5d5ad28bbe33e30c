//! Result cache with single-flight deduplication.
//!
//! [`ResultCache`] memoizes per-ingredient verdicts and whole-list
//! summaries in a [`CacheStore`], keyed by
//! `(dataset_version, kind, normalized_key)` with a fixed time-to-live.
//!
//! # Single-flight
//!
//! At most one computation runs per key at a time. Callers that miss the
//! store join a shared in-flight cell (`tokio::sync::OnceCell`); the first
//! one computes and writes the store, the rest wait and clone its result.
//! The winner re-checks the store before computing, so a caller that
//! missed just before another finished still does not recompute.
//!
//! # Expiry
//!
//! Readers ignore expired entries. Every [`SWEEP_INTERVAL`] writes the
//! store is swept with [`CacheStore::purge_expired`], so its size tracks
//! the number of live keys rather than every key ever written.
//!
//! # Classification cost
//!
//! A verdict miss runs [`Classify::classify`], which is CPU-bound: one
//! similarity call per candidate inside the length window. On a
//! multi-threaded runtime it runs under `block_in_place` so the worker's
//! other tasks move to another thread while it scores.
//!
//! # Store failures
//!
//! Store errors are logged and treated as misses. The value is computed
//! directly and returned; a failing store never fails an analysis.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tokio::runtime::{Handle, RuntimeFlavor};
use tokio::sync::OnceCell;

use crate::matcher::Classify;
use crate::models::{DatasetVersion, ListSummary, MatchVerdict};
use crate::normalize::NormalizedToken;
use crate::store::memory::InMemoryCacheStore;
use crate::store::{CacheEntry, CacheKey, CacheStore, CachedValue};

/// Default time-to-live for cached values.
pub const DEFAULT_TTL: Duration = Duration::from_secs(3600);

/// Number of store writes between sweeps of expired entries.
pub const SWEEP_INTERVAL: u64 = 64;

/// A value the cache knows how to store.
pub trait Cacheable: Clone + Send + Sync + 'static {
    fn into_cached(self) -> CachedValue;
    fn from_cached(value: CachedValue) -> Option<Self>;
}

impl Cacheable for MatchVerdict {
    fn into_cached(self) -> CachedValue {
        CachedValue::Verdict(self)
    }

    fn from_cached(value: CachedValue) -> Option<Self> {
        match value {
            CachedValue::Verdict(v) => Some(v),
            CachedValue::Summary(_) => None,
        }
    }
}

impl Cacheable for ListSummary {
    fn into_cached(self) -> CachedValue {
        CachedValue::Summary(self)
    }

    fn from_cached(value: CachedValue) -> Option<Self> {
        match value {
            CachedValue::Summary(s) => Some(s),
            CachedValue::Verdict(_) => None,
        }
    }
}

type Flights<T> = Mutex<HashMap<CacheKey, Arc<OnceCell<T>>>>;

fn lock<T>(flights: &Flights<T>) -> MutexGuard<'_, HashMap<CacheKey, Arc<OnceCell<T>>>> {
    flights.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Counters describing cache behavior since construction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub computations: u64,
    pub store_errors: u64,
}

#[derive(Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    computations: AtomicU64,
    store_errors: AtomicU64,
    writes: AtomicU64,
}

/// Memoizing wrapper around the matcher and the summary step.
pub struct ResultCache {
    store: Arc<dyn CacheStore>,
    ttl: Duration,
    verdict_flights: Flights<MatchVerdict>,
    summary_flights: Flights<ListSummary>,
    counters: Counters,
}

impl ResultCache {
    pub fn new(store: Arc<dyn CacheStore>, ttl: Duration) -> Self {
        Self {
            store,
            ttl,
            verdict_flights: Mutex::new(HashMap::new()),
            summary_flights: Mutex::new(HashMap::new()),
            counters: Counters::default(),
        }
    }

    /// A cache backed by [`InMemoryCacheStore`].
    pub fn in_memory(ttl: Duration) -> Self {
        Self::new(Arc::new(InMemoryCacheStore::new()), ttl)
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Cached verdict for `token`, classifying it on a miss.
    pub async fn get_or_compute_verdict<C>(&self, classifier: &C, token: &NormalizedToken) -> MatchVerdict
    where
        C: Classify + ?Sized,
    {
        let key = CacheKey::verdict(classifier.dataset_version(), token.as_str());
        self.get_or_compute(&self.verdict_flights, key, || async {
            classify_blocking(classifier, token)
        })
        .await
    }

    /// Cached summary for a whole list, running `compute` on a miss.
    pub async fn get_or_compute_summary<F, Fut>(
        &self,
        version: &DatasetVersion,
        list_key: &str,
        compute: F,
    ) -> ListSummary
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = ListSummary>,
    {
        let key = CacheKey::summary(version, list_key);
        self.get_or_compute(&self.summary_flights, key, compute).await
    }

    /// Drop every entry that does not belong to `current`.
    ///
    /// Keys carry their dataset version, so stale entries can never be
    /// returned for the new version even before this runs; purging just
    /// reclaims the memory. Returns the number of entries removed.
    pub async fn invalidate_dataset(&self, current: &DatasetVersion) -> usize {
        lock(&self.verdict_flights).retain(|key, _| &key.version == current);
        lock(&self.summary_flights).retain(|key, _| &key.version == current);

        match self.store.purge_other_versions(current).await {
            Ok(removed) => {
                tracing::info!(version = %current, removed, "invalidated superseded cache entries");
                removed
            }
            Err(e) => {
                self.counters.store_errors.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(version = %current, error = %e, "cache purge failed");
                0
            }
        }
    }

    /// Remove expired entries from the store now. Returns the number removed.
    pub async fn purge_expired(&self) -> usize {
        match self.store.purge_expired(Utc::now()).await {
            Ok(removed) => {
                if removed > 0 {
                    tracing::debug!(removed, "swept expired cache entries");
                }
                removed
            }
            Err(e) => {
                self.counters.store_errors.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(error = %e, "cache sweep failed");
                0
            }
        }
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            computations: self.counters.computations.load(Ordering::Relaxed),
            store_errors: self.counters.store_errors.load(Ordering::Relaxed),
        }
    }

    async fn get_or_compute<T, F, Fut>(&self, flights: &Flights<T>, key: CacheKey, compute: F) -> T
    where
        T: Cacheable,
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        if let Some(hit) = self.lookup::<T>(&key).await {
            return hit;
        }

        let cell = Arc::clone(
            lock(flights)
                .entry(key.clone())
                .or_insert_with(|| Arc::new(OnceCell::new())),
        );

        let value = cell
            .get_or_init(|| async {
                if let Some(hit) = self.lookup::<T>(&key).await {
                    return hit;
                }
                self.counters.computations.fetch_add(1, Ordering::Relaxed);
                let value = compute().await;
                self.write(&key, &value).await;
                value
            })
            .await
            .clone();

        let mut map = lock(flights);
        if map.get(&key).is_some_and(|current| Arc::ptr_eq(current, &cell)) {
            map.remove(&key);
        }
        drop(map);

        value
    }

    async fn lookup<T: Cacheable>(&self, key: &CacheKey) -> Option<T> {
        match self.store.get(key).await {
            Ok(Some(entry)) if !entry.is_expired(Utc::now()) => {
                if let Some(value) = T::from_cached(entry.value) {
                    self.counters.hits.fetch_add(1, Ordering::Relaxed);
                    return Some(value);
                }
            }
            Ok(_) => {}
            Err(e) => {
                self.counters.store_errors.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(key = %key.key, error = %e, "cache read failed, computing directly");
            }
        }
        self.counters.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    async fn write<T: Cacheable>(&self, key: &CacheKey, value: &T) {
        let ttl = chrono::Duration::from_std(self.ttl).unwrap_or_else(|_| chrono::Duration::days(36_500));
        let entry = CacheEntry {
            value: value.clone().into_cached(),
            expires_at: Utc::now() + ttl,
        };
        if let Err(e) = self.store.put(key.clone(), entry).await {
            self.counters.store_errors.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(key = %key.key, error = %e, "cache write failed, result not cached");
            return;
        }
        let writes = self.counters.writes.fetch_add(1, Ordering::Relaxed) + 1;
        if writes % SWEEP_INTERVAL == 0 {
            self.purge_expired().await;
        }
    }
}

/// Run `classify` without stalling the other tasks on this worker.
///
/// `block_in_place` panics on a current-thread runtime, where there is no
/// other worker to hand tasks to, so the call runs inline there.
fn classify_blocking<C>(classifier: &C, token: &NormalizedToken) -> MatchVerdict
where
    C: Classify + ?Sized,
{
    match Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
            tokio::task::block_in_place(|| classifier.classify(token))
        }
        _ => classifier.classify(token),
    }
}
