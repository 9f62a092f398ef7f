// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! An in-process [`FragmentStore`] for single-node deployments and tests.

use std::time::{Duration, Instant};

use bytes::Bytes;
use fragcache_tier::{FragmentStore, StoreError};
use moka::{Expiry, future::Cache};

#[derive(Clone, Debug)]
struct StoredValue {
    bytes: Bytes,
    ttl: Option<Duration>,
}

struct TtlExpiry;

impl Expiry<String, StoredValue> for TtlExpiry {
    fn expire_after_create(&self, _key: &String, value: &StoredValue, _created_at: Instant) -> Option<Duration> {
        value.ttl
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &StoredValue,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        value.ttl
    }
}

/// A distributed-store stand-in that lives in the current process.
///
/// Values are dropped once their time-to-live has passed. The store never fails, so it is
/// the natural default when no shared store is configured: every node then caches on its
/// own.
///
/// # Examples
///
/// ```
/// use bytes::Bytes;
/// use fragcache_memory::InMemoryStore;
/// use fragcache_tier::FragmentStore;
/// use std::time::Duration;
///
/// # futures::executor::block_on(async {
/// let store = InMemoryStore::new();
/// store.set("k", Bytes::from_static(b"v"), Some(Duration::from_secs(30))).await?;
/// assert_eq!(store.get("k").await?, Some(Bytes::from_static(b"v")));
/// # Ok::<(), fragcache_tier::StoreError>(())
/// # });
/// ```
#[derive(Clone, Debug)]
pub struct InMemoryStore {
    inner: Cache<String, StoredValue>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    /// Creates an unbounded store.
    #[must_use]
    pub fn new() -> Self {
        Self::from_builder(Cache::builder())
    }

    /// Creates a store holding at most `max_bytes` of values.
    #[must_use]
    pub fn with_max_bytes(max_bytes: u64) -> Self {
        Self::from_builder(
            Cache::builder()
                .max_capacity(max_bytes)
                .weigher(|_key: &String, value: &StoredValue| u32::try_from(value.bytes.len()).unwrap_or(u32::MAX)),
        )
    }

    fn from_builder(builder: moka::future::CacheBuilder<String, StoredValue, Cache<String, StoredValue>>) -> Self {
        Self {
            inner: builder.name("fragcache-store").expire_after(TtlExpiry).build(),
        }
    }

    /// Returns the number of stored values.
    #[must_use]
    pub fn entry_count(&self) -> u64 {
        self.inner.entry_count()
    }
}

impl FragmentStore for InMemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Bytes>, StoreError> {
        Ok(self.inner.get(key).await.map(|value| value.bytes))
    }

    async fn set(&self, key: &str, value: Bytes, ttl: Option<Duration>) -> Result<(), StoreError> {
        self.inner.insert(key.to_owned(), StoredValue { bytes: value, ttl }).await;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.inner.invalidate(key).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn overwrite_replaces_value() {
        let store = InMemoryStore::new();
        store.set("k", Bytes::from_static(b"one"), None).await.unwrap();
        store.set("k", Bytes::from_static(b"two"), None).await.unwrap();

        assert_eq!(store.get("k").await.unwrap(), Some(Bytes::from_static(b"two")));
    }

    #[tokio::test]
    async fn remove_deletes_value() {
        let store = InMemoryStore::new();
        store.set("k", Bytes::from_static(b"v"), None).await.unwrap();
        store.remove("k").await.unwrap();

        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn values_expire_after_ttl() {
        let store = InMemoryStore::new();
        store.set("k", Bytes::from_static(b"v"), Some(Duration::from_millis(20))).await.unwrap();
        assert!(store.get("k").await.unwrap().is_some());

        tokio::time::sleep(Duration::from_millis(60)).await;

        assert_eq!(store.get("k").await.unwrap(), None);
    }
}
