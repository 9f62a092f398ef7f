// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The capability of a size-limited, in-process fragment cache.
//!
//! [`BoundedCache`] is the fast path in front of the distributed store. Implementations are
//! synchronous: every method does bookkeeping under a short critical section and never
//! performs I/O, so callers can use it without yielding.

use std::sync::Arc;

use crate::{CacheKey, FragmentEntry};

/// Outcome of [`BoundedCache::set`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Insertion {
    /// The entry is now cached.
    Inserted,
    /// The entry does not fit the size budget and was not cached. This is not an error.
    Rejected,
}

impl Insertion {
    /// Returns `true` if the entry was cached.
    #[must_use]
    pub fn is_inserted(self) -> bool {
        matches!(self, Self::Inserted)
    }
}

/// A cache of fragment entries that enforces a total byte budget.
///
/// The sum of the sizes of all cached entries never exceeds [`size_limit`](Self::size_limit)
/// once an operation returns, unless an implementation documents that its bound is
/// approximate. Entries carry their own expiration; reading an expired entry removes it and
/// reports a miss.
pub trait BoundedCache: Send + Sync {
    /// Returns the entry for `key` if it is present and not expired.
    fn try_get(&self, key: &CacheKey) -> Option<FragmentEntry>;

    /// Caches `entry` under `key`, evicting other entries if needed.
    ///
    /// An existing entry for `key` is replaced. An entry that cannot fit the budget is not
    /// cached and [`Insertion::Rejected`] is returned.
    fn set(&self, key: CacheKey, entry: FragmentEntry) -> Insertion;

    /// Removes the entry for `key`, returning `true` if one was present.
    fn remove(&self, key: &CacheKey) -> bool;

    /// Removes every entry.
    fn clear(&self);

    /// Returns the number of cached entries.
    fn len(&self) -> usize;

    /// Returns `true` if nothing is cached.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the number of bytes currently occupied.
    fn weighted_size(&self) -> u64;

    /// Returns the configured byte budget.
    fn size_limit(&self) -> u64;
}

impl<T> BoundedCache for Arc<T>
where
    T: BoundedCache + ?Sized,
{
    fn try_get(&self, key: &CacheKey) -> Option<FragmentEntry> {
        (**self).try_get(key)
    }

    fn set(&self, key: CacheKey, entry: FragmentEntry) -> Insertion {
        (**self).set(key, entry)
    }

    fn remove(&self, key: &CacheKey) -> bool {
        (**self).remove(key)
    }

    fn clear(&self) {
        (**self).clear();
    }

    fn len(&self) -> usize {
        (**self).len()
    }

    fn weighted_size(&self) -> u64 {
        (**self).weighted_size()
    }

    fn size_limit(&self) -> u64 {
        (**self).size_limit()
    }
}
