//! Storage abstraction for cached verdicts and summaries.
//!
//! The [`CacheStore`] trait defines the operations
//! [`ResultCache`](crate::cache::ResultCache) needs from a backing store,
//! enabling pluggable backends (in-memory today, an external cache
//! service later). Stores are allowed to fail: the result cache treats
//! every error as a miss and falls back to direct computation.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::{DatasetVersion, ListSummary, MatchVerdict};

/// Granularity of a cached value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheKind {
    Verdict,
    Summary,
}

/// Cache key: `(dataset_version, kind, normalized_key)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub version: DatasetVersion,
    pub kind: CacheKind,
    pub key: String,
}

impl CacheKey {
    pub fn verdict(version: &DatasetVersion, token: &str) -> Self {
        Self {
            version: version.clone(),
            kind: CacheKind::Verdict,
            key: token.to_string(),
        }
    }

    pub fn summary(version: &DatasetVersion, list_key: &str) -> Self {
        Self {
            version: version.clone(),
            kind: CacheKind::Summary,
            key: list_key.to_string(),
        }
    }
}

/// A cached computation result.
#[derive(Debug, Clone, PartialEq)]
pub enum CachedValue {
    Verdict(MatchVerdict),
    Summary(ListSummary),
}

/// A stored value with its expiry time. Written whole, never patched.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub value: CachedValue,
    pub expires_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Abstract backing store for [`ResultCache`](crate::cache::ResultCache).
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`get`](CacheStore::get) | Fetch an entry (expired entries may be returned) |
/// | [`put`](CacheStore::put) | Insert or replace an entry |
/// | [`purge_other_versions`](CacheStore::purge_other_versions) | Drop entries of superseded datasets |
/// | [`purge_expired`](CacheStore::purge_expired) | Drop entries past their expiry |
/// | [`len`](CacheStore::len) | Number of stored entries |
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &CacheKey) -> Result<Option<CacheEntry>>;

    async fn put(&self, key: CacheKey, entry: CacheEntry) -> Result<()>;

    /// Remove every entry whose version differs from `current`.
    ///
    /// Returns the number of entries removed.
    async fn purge_other_versions(&self, current: &DatasetVersion) -> Result<usize>;

    /// Remove every entry expired at `now`. Returns the number removed.
    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize>;

    async fn len(&self) -> Result<usize>;
}
