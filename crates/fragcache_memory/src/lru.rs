// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! A strictly size-bounded cache with priority-aware LRU eviction.

use std::collections::{BTreeMap, HashMap};

use fragcache_tier::{BoundedCache, CacheKey, Clock, FragmentEntry, Insertion, Priority};
use parking_lot::Mutex;

use crate::CacheOptions;

/// A local fragment cache that never holds more bytes than its budget.
///
/// When an insertion needs room, entries are evicted in this order:
///
/// 1. expired entries,
/// 2. lower [`Priority`] before higher,
/// 3. least recently used first within one priority.
///
/// [`Priority::NeverRemove`] entries are never evicted. If an entry cannot fit even after
/// evicting everything that may be evicted, the cache is left untouched and the insertion
/// is rejected.
///
/// # Examples
///
/// ```
/// use fragcache_memory::{CacheOptions, LruFragmentCache};
/// use fragcache_tier::{BoundedCache, CacheKey, Clock, Expiration, FragmentEntry, Priority};
///
/// let clock = Clock::new_system();
/// let cache = LruFragmentCache::new(&CacheOptions::new().with_size_limit(8), clock.clone());
///
/// let entry = |text: &'static str| FragmentEntry::new(text, clock.system_time(), Expiration::Never, Priority::Normal).unwrap();
/// cache.set(CacheKey::new("a"), entry("aaaa"));
/// cache.set(CacheKey::new("b"), entry("bbbb"));
/// cache.set(CacheKey::new("c"), entry("cccc"));
///
/// assert!(cache.try_get(&CacheKey::new("a")).is_none());
/// assert_eq!(cache.weighted_size(), 8);
/// ```
#[derive(Debug)]
pub struct LruFragmentCache {
    state: Mutex<State>,
    size_limit: u64,
    compaction_target: u64,
    clock: Clock,
}

#[derive(Debug)]
struct Slot {
    entry: FragmentEntry,
    tick: u64,
}

#[derive(Debug, Default)]
struct State {
    entries: HashMap<CacheKey, Slot>,
    // Eviction order: lowest priority first, then oldest access.
    order: BTreeMap<(Priority, u64), CacheKey>,
    occupied: u64,
    pinned: u64,
    next_tick: u64,
}

impl State {
    fn tick(&mut self) -> u64 {
        self.next_tick += 1;
        self.next_tick
    }

    fn insert(&mut self, key: CacheKey, entry: FragmentEntry) {
        let tick = self.tick();
        let size = entry.size();
        self.occupied += size;
        if entry.priority() == Priority::NeverRemove {
            self.pinned += size;
        }
        self.order.insert((entry.priority(), tick), key.clone());
        self.entries.insert(key, Slot { entry, tick });
    }

    fn remove(&mut self, key: &CacheKey) -> Option<FragmentEntry> {
        let slot = self.entries.remove(key)?;
        self.order.remove(&(slot.entry.priority(), slot.tick));
        self.occupied -= slot.entry.size();
        if slot.entry.priority() == Priority::NeverRemove {
            self.pinned -= slot.entry.size();
        }
        Some(slot.entry)
    }

    fn touch(&mut self, key: &CacheKey) -> Option<FragmentEntry> {
        let tick = self.tick();
        let slot = self.entries.get_mut(key)?;
        let priority = slot.entry.priority();
        self.order.remove(&(priority, slot.tick));
        slot.tick = tick;
        self.order.insert((priority, tick), key.clone());
        Some(slot.entry.clone())
    }

    fn purge_expired(&mut self, clock: &Clock) {
        let now = clock.system_time();
        let expired: Vec<CacheKey> = self
            .entries
            .iter()
            .filter(|(_, slot)| slot.entry.is_expired(now))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &expired {
            self.remove(key);
        }
    }

    fn evict_until(&mut self, incoming: u64, target: u64) {
        while self.occupied + incoming > target {
            let Some((&(priority, tick), _)) = self.order.first_key_value() else {
                break;
            };
            if priority == Priority::NeverRemove {
                break;
            }
            if let Some(key) = self.order.remove(&(priority, tick)) {
                self.remove(&key);
            }
        }
    }
}

impl LruFragmentCache {
    /// Creates an empty cache with the size limit and compaction of `options`.
    ///
    /// The eviction policy in `options` is not consulted; use
    /// [`CacheOptions::build`] to pick an implementation from configuration.
    #[must_use]
    pub fn new(options: &CacheOptions, clock: Clock) -> Self {
        let size_limit = options.size_limit();
        #[expect(
            clippy::cast_possible_truncation,
            clippy::cast_sign_loss,
            clippy::cast_precision_loss,
            reason = "the target is a fraction of a u64 budget and is clamped to it"
        )]
        let compaction_target = ((size_limit as f64) * (1.0 - options.compaction_percentage())) as u64;
        Self {
            state: Mutex::new(State::default()),
            size_limit,
            compaction_target: compaction_target.min(size_limit),
            clock,
        }
    }

    /// Returns `true` if an unexpired entry for `key` is cached, without refreshing its recency.
    #[must_use]
    pub fn contains_key(&self, key: &CacheKey) -> bool {
        let now = self.clock.system_time();
        self.state.lock().entries.get(key).is_some_and(|slot| !slot.entry.is_expired(now))
    }
}

impl BoundedCache for LruFragmentCache {
    fn try_get(&self, key: &CacheKey) -> Option<FragmentEntry> {
        let now = self.clock.system_time();
        let mut state = self.state.lock();
        if state.entries.get(key)?.entry.is_expired(now) {
            state.remove(key);
            return None;
        }
        state.touch(key)
    }

    fn set(&self, key: CacheKey, entry: FragmentEntry) -> Insertion {
        let size = entry.size();
        if size > self.size_limit {
            return Insertion::Rejected;
        }

        let mut state = self.state.lock();
        let replaced_pinned = state
            .entries
            .get(&key)
            .filter(|slot| slot.entry.priority() == Priority::NeverRemove)
            .map_or(0, |slot| slot.entry.size());
        if state.pinned - replaced_pinned + size > self.size_limit {
            return Insertion::Rejected;
        }

        state.remove(&key);
        if state.occupied + size > self.size_limit {
            let target = if size <= self.compaction_target {
                self.compaction_target
            } else {
                self.size_limit
            };
            state.purge_expired(&self.clock);
            state.evict_until(size, target);
        }

        debug_assert!(state.occupied + size <= self.size_limit);
        state.insert(key, entry);
        Insertion::Inserted
    }

    fn remove(&self, key: &CacheKey) -> bool {
        self.state.lock().remove(key).is_some()
    }

    fn clear(&self) {
        let mut state = self.state.lock();
        state.entries.clear();
        state.order.clear();
        state.occupied = 0;
        state.pinned = 0;
    }

    fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    fn weighted_size(&self) -> u64 {
        self.state.lock().occupied
    }

    fn size_limit(&self) -> u64 {
        self.size_limit
    }
}
