// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Integration tests for the default and forwarding implementations of the tier traits.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::{Duration, SystemTime},
};

use bytes::Bytes;
use fragcache_tier::{BoundedCache, CacheKey, Expiration, FragmentEntry, FragmentStore, Insertion, Priority, StoreError};
use futures::executor::block_on;

#[derive(Default)]
struct MapStore {
    data: Mutex<HashMap<String, (Bytes, Option<Duration>)>>,
}

impl FragmentStore for MapStore {
    async fn get(&self, key: &str) -> Result<Option<Bytes>, StoreError> {
        Ok(self.data.lock().expect("lock poisoned").get(key).map(|(value, _)| value.clone()))
    }

    async fn set(&self, key: &str, value: Bytes, ttl: Option<Duration>) -> Result<(), StoreError> {
        self.data.lock().expect("lock poisoned").insert(key.to_owned(), (value, ttl));
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.data.lock().expect("lock poisoned").remove(key);
        Ok(())
    }
}

/// Holds at most one entry and never checks expiry.
#[derive(Default)]
struct SingleSlot {
    slot: Mutex<Option<(CacheKey, FragmentEntry)>>,
}

impl BoundedCache for SingleSlot {
    fn try_get(&self, key: &CacheKey) -> Option<FragmentEntry> {
        let slot = self.slot.lock().expect("lock poisoned");
        slot.as_ref().filter(|(stored, _)| stored == key).map(|(_, entry)| entry.clone())
    }

    fn set(&self, key: CacheKey, entry: FragmentEntry) -> Insertion {
        if entry.size() > self.size_limit() {
            return Insertion::Rejected;
        }
        *self.slot.lock().expect("lock poisoned") = Some((key, entry));
        Insertion::Inserted
    }

    fn remove(&self, key: &CacheKey) -> bool {
        let mut slot = self.slot.lock().expect("lock poisoned");
        if slot.as_ref().is_some_and(|(stored, _)| stored == key) {
            *slot = None;
            return true;
        }
        false
    }

    fn clear(&self) {
        *self.slot.lock().expect("lock poisoned") = None;
    }

    fn len(&self) -> usize {
        usize::from(self.slot.lock().expect("lock poisoned").is_some())
    }

    fn weighted_size(&self) -> u64 {
        self.slot.lock().expect("lock poisoned").as_ref().map_or(0, |(_, entry)| entry.size())
    }

    fn size_limit(&self) -> u64 {
        8
    }
}

fn entry(content: &'static str) -> FragmentEntry {
    FragmentEntry::new(content, SystemTime::UNIX_EPOCH, Expiration::Never, Priority::Normal).expect("never-expiring entries are cacheable")
}

#[test]
fn shared_store_forwards_every_operation() {
    let store = Arc::new(MapStore::default());
    let shared = Arc::clone(&store);

    block_on(shared.set("k", Bytes::from_static(b"v"), Some(Duration::from_secs(5)))).unwrap();
    assert_eq!(block_on(store.get("k")).unwrap(), Some(Bytes::from_static(b"v")));
    assert_eq!(
        store.data.lock().unwrap().get("k").map(|(_, ttl)| *ttl),
        Some(Some(Duration::from_secs(5)))
    );

    block_on(shared.remove("k")).unwrap();
    assert_eq!(block_on(store.get("k")).unwrap(), None);
}

#[test]
fn is_empty_follows_len() {
    let cache = SingleSlot::default();
    assert!(cache.is_empty());

    assert_eq!(cache.set(CacheKey::new("nav"), entry("<nav/>")), Insertion::Inserted);
    assert!(!cache.is_empty());

    assert!(cache.remove(&CacheKey::new("nav")));
    assert!(cache.is_empty());
}

#[test]
fn bounded_caches_work_behind_trait_objects() {
    let cache: Arc<dyn BoundedCache> = Arc::new(SingleSlot::default());

    assert!(!cache.set(CacheKey::new("big"), entry("<section/>")).is_inserted());
    assert!(cache.set(CacheKey::new("nav"), entry("<nav/>")).is_inserted());
    assert_eq!(cache.weighted_size(), 6);
    assert_eq!(cache.try_get(&CacheKey::new("nav")), Some(entry("<nav/>")));

    cache.clear();
    assert_eq!(cache.len(), 0);
}
