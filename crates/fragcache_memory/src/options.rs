// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Size limit and eviction configuration for the local fragment cache.
//!
//! Options are read once when a cache is built and never change afterwards. They can be
//! constructed in code or deserialized from configuration.

use std::sync::Arc;

use fragcache_tier::{BoundedCache, Clock};
use serde::{Deserialize, Serialize};

use crate::{LruFragmentCache, TinyLfuFragmentCache};

/// The default byte budget of a local fragment cache: 100 MiB.
pub const DEFAULT_SIZE_LIMIT: u64 = 100 * 1024 * 1024;

/// How the local cache chooses what to evict.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvictionPolicy {
    /// Expired entries first, then lowest priority, then least recently used.
    ///
    /// The byte budget is enforced strictly on every insertion.
    #[default]
    PriorityLru,
    /// Moka's `TinyLFU` admission and eviction.
    ///
    /// Priorities are ignored, and new entries may be declined by the admission filter.
    TinyLfu,
}

/// Invalid cache options.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[non_exhaustive]
pub enum OptionsError {
    /// The size limit must allow at least one byte.
    #[error("size limit must be greater than zero")]
    ZeroSizeLimit,
    /// The compaction percentage must be in `[0, 1)`.
    #[error("compaction percentage must be in [0, 1), got {0}")]
    CompactionOutOfRange(f64),
}

/// Configuration of a local fragment cache.
///
/// # Examples
///
/// ```
/// use fragcache_memory::{CacheOptions, EvictionPolicy};
///
/// let options = CacheOptions::new()
///     .with_size_limit(16 * 1024 * 1024)
///     .with_compaction_percentage(0.05)
///     .with_eviction(EvictionPolicy::PriorityLru);
/// assert!(options.validate().is_ok());
/// ```
///
/// Options can be read from configuration; missing fields keep their defaults:
///
/// ```
/// use fragcache_memory::{CacheOptions, DEFAULT_SIZE_LIMIT};
///
/// let options: CacheOptions = serde_json::from_str(r#"{ "eviction": "tiny_lfu" }"#).unwrap();
/// assert_eq!(options.size_limit(), DEFAULT_SIZE_LIMIT);
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheOptions {
    size_limit: u64,
    compaction_percentage: f64,
    eviction: EvictionPolicy,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            size_limit: DEFAULT_SIZE_LIMIT,
            compaction_percentage: 0.0,
            eviction: EvictionPolicy::default(),
        }
    }
}

impl CacheOptions {
    /// Creates options with the default 100 MiB budget and priority-LRU eviction.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum number of bytes the cache may hold.
    #[must_use]
    pub fn with_size_limit(mut self, bytes: u64) -> Self {
        self.size_limit = bytes;
        self
    }

    /// Sets the share of the budget to free in addition to what an insertion needs.
    ///
    /// With `0.05`, an eviction pass continues until at most 95% of the budget is occupied
    /// after the insertion, so that the next few insertions do not have to evict again.
    #[must_use]
    pub fn with_compaction_percentage(mut self, percentage: f64) -> Self {
        self.compaction_percentage = percentage;
        self
    }

    /// Sets the eviction policy.
    #[must_use]
    pub fn with_eviction(mut self, policy: EvictionPolicy) -> Self {
        self.eviction = policy;
        self
    }

    /// Returns the byte budget.
    #[must_use]
    pub fn size_limit(&self) -> u64 {
        self.size_limit
    }

    /// Returns the compaction percentage.
    #[must_use]
    pub fn compaction_percentage(&self) -> f64 {
        self.compaction_percentage
    }

    /// Returns the eviction policy.
    #[must_use]
    pub fn eviction(&self) -> EvictionPolicy {
        self.eviction
    }

    /// Checks that the options describe a usable cache.
    ///
    /// # Errors
    ///
    /// Returns an [`OptionsError`] for a zero size limit or a compaction percentage outside `[0, 1)`.
    pub fn validate(&self) -> Result<(), OptionsError> {
        if self.size_limit == 0 {
            return Err(OptionsError::ZeroSizeLimit);
        }
        if !(0.0..1.0).contains(&self.compaction_percentage) {
            return Err(OptionsError::CompactionOutOfRange(self.compaction_percentage));
        }
        Ok(())
    }

    /// Builds the cache these options describe.
    ///
    /// # Errors
    ///
    /// Returns an [`OptionsError`] if [`validate`](Self::validate) fails.
    pub fn build(&self, clock: Clock) -> Result<Arc<dyn BoundedCache>, OptionsError> {
        self.validate()?;
        Ok(match self.eviction {
            EvictionPolicy::PriorityLru => Arc::new(LruFragmentCache::new(self, clock)),
            EvictionPolicy::TinyLfu => Arc::new(TinyLfuFragmentCache::new(self, clock)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let options = CacheOptions::default();
        assert_eq!(options.size_limit(), 100 * 1024 * 1024);
        assert!(options.compaction_percentage().abs() < f64::EPSILON);
        assert_eq!(options.eviction(), EvictionPolicy::PriorityLru);
        assert_eq!(options.validate(), Ok(()));
    }

    #[test]
    fn zero_size_limit_is_rejected() {
        assert_eq!(CacheOptions::new().with_size_limit(0).validate(), Err(OptionsError::ZeroSizeLimit));
    }

    #[test]
    fn compaction_must_leave_room() {
        assert!(CacheOptions::new().with_compaction_percentage(1.0).validate().is_err());
        assert!(CacheOptions::new().with_compaction_percentage(-0.1).validate().is_err());
        assert!(CacheOptions::new().with_compaction_percentage(0.99).validate().is_ok());
    }

    #[test]
    fn deserializes_partial_configuration() {
        let options: CacheOptions = serde_json::from_str(r#"{ "size_limit": 2048, "compaction_percentage": 0.25 }"#).unwrap();
        assert_eq!(options.size_limit(), 2048);
        assert_eq!(options.eviction(), EvictionPolicy::PriorityLru);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let result = serde_json::from_str::<CacheOptions>(r#"{ "size": 1 }"#);
        assert!(result.is_err());
    }

    #[test]
    fn build_picks_implementation() {
        let lru = CacheOptions::new().with_size_limit(10).build(Clock::new_system()).unwrap();
        assert_eq!(lru.size_limit(), 10);

        let lfu = CacheOptions::new()
            .with_size_limit(10)
            .with_eviction(EvictionPolicy::TinyLfu)
            .build(Clock::new_system())
            .unwrap();
        assert_eq!(lfu.size_limit(), 10);
    }

    #[test]
    fn build_refuses_invalid_options() {
        assert!(CacheOptions::new().with_size_limit(0).build(Clock::new_system()).is_err());
    }
}
