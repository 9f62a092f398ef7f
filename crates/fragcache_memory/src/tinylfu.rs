// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! A size-weighted local fragment cache backed by moka.

use std::time::{Duration, Instant};

use fragcache_tier::{BoundedCache, CacheKey, Clock, FragmentEntry, Insertion};
use moka::{Expiry, sync::Cache};

use crate::CacheOptions;

/// A local fragment cache using moka's `TinyLFU` policy, weighted by fragment size.
///
/// Every insertion and removal runs moka's pending maintenance before returning, so the byte
/// budget holds after each call. Moka's admission filter may decline a new entry, which is
/// reported as [`Insertion::Rejected`]. Priorities are not considered; use
/// [`LruFragmentCache`](crate::LruFragmentCache) when pinned fragments must survive pressure.
///
/// # Examples
///
/// ```
/// use fragcache_memory::{CacheOptions, TinyLfuFragmentCache};
/// use fragcache_tier::{BoundedCache, CacheKey, Clock, Expiration, FragmentEntry, Priority};
///
/// let clock = Clock::new_system();
/// let cache = TinyLfuFragmentCache::new(&CacheOptions::new(), clock.clone());
///
/// let entry = FragmentEntry::new("<footer/>", clock.system_time(), Expiration::Never, Priority::Normal).unwrap();
/// cache.set(CacheKey::new("footer"), entry);
/// assert!(cache.try_get(&CacheKey::new("footer")).is_some());
/// ```
#[derive(Debug, Clone)]
pub struct TinyLfuFragmentCache {
    inner: Cache<CacheKey, FragmentEntry>,
    size_limit: u64,
    clock: Clock,
}

/// Lets moka reclaim entries once their fragment expires.
#[derive(Debug)]
struct FragmentExpiry {
    clock: Clock,
}

impl Expiry<CacheKey, FragmentEntry> for FragmentExpiry {
    fn expire_after_create(&self, _key: &CacheKey, value: &FragmentEntry, _created_at: Instant) -> Option<Duration> {
        match value.remaining_ttl(self.clock.system_time()) {
            Some(ttl) => ttl,
            None => Some(Duration::ZERO),
        }
    }
}

impl TinyLfuFragmentCache {
    /// Creates an empty cache with the size limit of `options`.
    #[must_use]
    pub fn new(options: &CacheOptions, clock: Clock) -> Self {
        let inner = Cache::builder()
            .name("fragcache-local")
            .max_capacity(options.size_limit())
            .weigher(|_key: &CacheKey, entry: &FragmentEntry| u32::try_from(entry.size()).unwrap_or(u32::MAX))
            .expire_after(FragmentExpiry { clock: clock.clone() })
            .build();

        Self {
            inner,
            size_limit: options.size_limit(),
            clock,
        }
    }
}

impl BoundedCache for TinyLfuFragmentCache {
    fn try_get(&self, key: &CacheKey) -> Option<FragmentEntry> {
        let entry = self.inner.get(key)?;
        if entry.is_expired(self.clock.system_time()) {
            self.inner.invalidate(key);
            return None;
        }
        Some(entry)
    }

    fn set(&self, key: CacheKey, entry: FragmentEntry) -> Insertion {
        // Moka's weigher saturates at u32::MAX, so larger budgets cannot be tracked exactly.
        if entry.size() > self.size_limit || entry.size() > u64::from(u32::MAX) {
            return Insertion::Rejected;
        }
        self.inner.insert(key.clone(), entry);
        self.inner.run_pending_tasks();
        if self.inner.contains_key(&key) {
            Insertion::Inserted
        } else {
            Insertion::Rejected
        }
    }

    fn remove(&self, key: &CacheKey) -> bool {
        let removed = self.inner.remove(key).is_some();
        self.inner.run_pending_tasks();
        removed
    }

    fn clear(&self) {
        self.inner.invalidate_all();
        self.inner.run_pending_tasks();
    }

    fn len(&self) -> usize {
        usize::try_from(self.inner.entry_count()).unwrap_or(usize::MAX)
    }

    fn weighted_size(&self) -> u64 {
        self.inner.weighted_size()
    }

    fn size_limit(&self) -> u64 {
        self.size_limit
    }
}

#[cfg(test)]
mod tests {
    use fragcache_tier::{ClockControl, Expiration, Priority};

    use super::*;

    fn entry(clock: &Clock, content: &'static str, expiration: Expiration) -> FragmentEntry {
        FragmentEntry::new(content, clock.system_time(), expiration, Priority::Normal).unwrap()
    }

    #[test]
    fn set_then_get() {
        let clock = Clock::new_system();
        let cache = TinyLfuFragmentCache::new(&CacheOptions::new(), clock.clone());

        assert!(cache.set(CacheKey::new("k"), entry(&clock, "value", Expiration::Never)).is_inserted());
        let found = cache.try_get(&CacheKey::new("k")).expect("entry should be cached");
        assert_eq!(found.content().as_ref(), b"value");
    }

    #[test]
    fn weighted_size_counts_bytes() {
        let clock = Clock::new_system();
        let cache = TinyLfuFragmentCache::new(&CacheOptions::new(), clock.clone());
        cache.set(CacheKey::new("a"), entry(&clock, "12345", Expiration::Never));
        cache.set(CacheKey::new("b"), entry(&clock, "123", Expiration::Never));

        assert_eq!(cache.weighted_size(), 8);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn expired_entry_is_a_miss() {
        let control = ClockControl::new();
        let clock = control.to_clock();
        let cache = TinyLfuFragmentCache::new(&CacheOptions::new(), clock.clone());
        cache.set(CacheKey::new("k"), entry(&clock, "v", Expiration::After(Duration::from_secs(60))));

        control.advance(Duration::from_secs(60));

        assert!(cache.try_get(&CacheKey::new("k")).is_none());
    }

    #[test]
    fn oversize_entry_is_rejected() {
        let clock = Clock::new_system();
        let cache = TinyLfuFragmentCache::new(&CacheOptions::new().with_size_limit(4), clock.clone());

        assert_eq!(cache.set(CacheKey::new("k"), entry(&clock, "12345", Expiration::Never)), Insertion::Rejected);
        assert!(cache.try_get(&CacheKey::new("k")).is_none());
    }

    #[test]
    fn budget_holds_as_soon_as_set_returns() {
        let clock = Clock::new_system();
        let cache = TinyLfuFragmentCache::new(&CacheOptions::new().with_size_limit(100), clock.clone());

        for index in 0..50 {
            cache.set(CacheKey::new(format!("item-{index}")), entry(&clock, "012345678901234567890123456789", Expiration::Never));
            assert!(cache.weighted_size() <= 100, "{} bytes after insert {index}", cache.weighted_size());
        }
        assert!(cache.weighted_size() > 0);
    }

    #[test]
    fn remove_and_clear() {
        let clock = Clock::new_system();
        let cache = TinyLfuFragmentCache::new(&CacheOptions::new(), clock.clone());
        cache.set(CacheKey::new("a"), entry(&clock, "1", Expiration::Never));
        cache.set(CacheKey::new("b"), entry(&clock, "2", Expiration::Never));

        assert!(cache.remove(&CacheKey::new("a")));
        assert!(!cache.remove(&CacheKey::new("a")));

        cache.clear();
        assert!(cache.try_get(&CacheKey::new("b")).is_none());
        assert_eq!(cache.len(), 0);
    }
}
