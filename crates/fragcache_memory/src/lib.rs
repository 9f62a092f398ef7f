// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! In-process caches for rendered fragments.
//!
//! This crate provides the fast, local tier that sits in front of a distributed store:
//!
//! - [`LruFragmentCache`]: strict byte budget with priority-aware LRU eviction (the default).
//! - [`TinyLfuFragmentCache`]: moka-backed and weighted by fragment size, ignoring priorities.
//! - [`CacheOptions`]: size limit and eviction knobs, deserializable from configuration.
//! - [`InMemoryStore`]: a [`FragmentStore`](fragcache_tier::FragmentStore) that lives in the
//!   current process, for single-node deployments.
//!
//! # Quick Start
//!
//! ```
//! use fragcache_memory::CacheOptions;
//! use fragcache_tier::{BoundedCache, CacheKey, Clock, Expiration, FragmentEntry, Priority};
//!
//! let clock = Clock::new_system();
//! let cache = CacheOptions::new().with_size_limit(1024 * 1024).build(clock.clone())?;
//!
//! let entry = FragmentEntry::new("<nav/>", clock.system_time(), Expiration::Never, Priority::Normal).unwrap();
//! cache.set(CacheKey::new("nav"), entry);
//! assert_eq!(cache.weighted_size(), 6);
//! # Ok::<(), fragcache_memory::OptionsError>(())
//! ```

mod lru;
pub mod options;
mod store;
mod tinylfu;

#[doc(inline)]
pub use lru::LruFragmentCache;
#[doc(inline)]
pub use options::{CacheOptions, DEFAULT_SIZE_LIMIT, EvictionPolicy, OptionsError};
#[doc(inline)]
pub use store::InMemoryStore;
#[doc(inline)]
pub use tinylfu::TinyLfuFragmentCache;
