//! In-memory [`CacheStore`] implementation.
//!
//! Uses a `HashMap` behind `std::sync::RwLock`. Expired entries stay until
//! overwritten or swept by [`purge_expired`](CacheStore::purge_expired);
//! readers check expiry themselves.

use std::collections::HashMap;
use std::sync::RwLock;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::DatasetVersion;

use super::{CacheEntry, CacheKey, CacheStore};

/// In-memory cache store, the default backend.
pub struct InMemoryCacheStore {
    entries: RwLock<HashMap<CacheKey, CacheEntry>>,
}

impl InMemoryCacheStore {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryCacheStore {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned<T>(_: T) -> anyhow::Error {
    anyhow!("cache store lock poisoned")
}

#[async_trait]
impl CacheStore for InMemoryCacheStore {
    async fn get(&self, key: &CacheKey) -> Result<Option<CacheEntry>> {
        let entries = self.entries.read().map_err(poisoned)?;
        Ok(entries.get(key).cloned())
    }

    async fn put(&self, key: CacheKey, entry: CacheEntry) -> Result<()> {
        let mut entries = self.entries.write().map_err(poisoned)?;
        entries.insert(key, entry);
        Ok(())
    }

    async fn purge_other_versions(&self, current: &DatasetVersion) -> Result<usize> {
        let mut entries = self.entries.write().map_err(poisoned)?;
        let before = entries.len();
        entries.retain(|key, _| &key.version == current);
        Ok(before - entries.len())
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize> {
        let mut entries = self.entries.write().map_err(poisoned)?;
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        Ok(before - entries.len())
    }

    async fn len(&self) -> Result<usize> {
        let entries = self.entries.read().map_err(poisoned)?;
        Ok(entries.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MatchType, MatchVerdict};
    use crate::store::CachedValue;
    use chrono::Duration;

    fn entry() -> CacheEntry {
        entry_expiring(Utc::now() + Duration::seconds(60))
    }

    fn entry_expiring(expires_at: chrono::DateTime<Utc>) -> CacheEntry {
        CacheEntry {
            value: CachedValue::Verdict(MatchVerdict::safe(MatchType::None, 0.0)),
            expires_at,
        }
    }

    #[tokio::test]
    async fn test_put_then_get() {
        let store = InMemoryCacheStore::new();
        let key = CacheKey::verdict(&DatasetVersion::new("v1"), "water");
        assert!(store.get(&key).await.unwrap().is_none());
        store.put(key.clone(), entry()).await.unwrap();
        assert!(store.get(&key).await.unwrap().is_some());
        assert_eq!(store.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_versions_are_separate_keys() {
        let store = InMemoryCacheStore::new();
        store
            .put(CacheKey::verdict(&DatasetVersion::new("v1"), "water"), entry())
            .await
            .unwrap();
        let other = CacheKey::verdict(&DatasetVersion::new("v2"), "water");
        assert!(store.get(&other).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_purge_other_versions() {
        let store = InMemoryCacheStore::new();
        let v1 = DatasetVersion::new("v1");
        let v2 = DatasetVersion::new("v2");
        store.put(CacheKey::verdict(&v1, "a"), entry()).await.unwrap();
        store.put(CacheKey::summary(&v1, "b"), entry()).await.unwrap();
        store.put(CacheKey::verdict(&v2, "a"), entry()).await.unwrap();

        let removed = store.purge_other_versions(&v2).await.unwrap();
        assert_eq!(removed, 2);
        assert_eq!(store.len().await.unwrap(), 1);
        assert!(store.get(&CacheKey::verdict(&v2, "a")).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_purge_expired_keeps_live_entries() {
        let store = InMemoryCacheStore::new();
        let v1 = DatasetVersion::new("v1");
        let now = Utc::now();
        store
            .put(CacheKey::verdict(&v1, "old"), entry_expiring(now - Duration::seconds(1)))
            .await
            .unwrap();
        store
            .put(CacheKey::verdict(&v1, "edge"), entry_expiring(now))
            .await
            .unwrap();
        store.put(CacheKey::verdict(&v1, "live"), entry()).await.unwrap();

        assert_eq!(store.purge_expired(now).await.unwrap(), 2);
        assert_eq!(store.len().await.unwrap(), 1);
        assert!(store.get(&CacheKey::verdict(&v1, "live")).await.unwrap().is_some());
    }
}
