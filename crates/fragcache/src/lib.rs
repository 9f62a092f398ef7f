// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! Caches rendered view fragments across a local bounded cache and a distributed store.
//!
//! A fragment is a piece of rendered output, such as the HTML of a navigation bar, that is
//! expensive to produce and safe to reuse for a while. [`FragmentCache::get_or_render`] returns
//! a cached copy if one exists and otherwise runs the supplied render delegate, storing the
//! result in both tiers.
//!
//! # Lookup
//!
//! 1. The local cache (a [`BoundedCache`]) is consulted; a live entry is returned at once.
//! 2. On a miss, the caller claims the key. Callers arriving while the claim is held await
//!    the claimant's result instead of doing any work themselves.
//! 3. The claimant reads the distributed store (a [`FragmentStore`]) and decodes the value with
//!    the configured [`FragmentFormatter`]. A live value is copied into the local cache.
//! 4. Otherwise the render delegate runs once. Its output is written to the store and the
//!    local cache, and handed to every waiting caller.
//!
//! Unavailable stores, corrupt values and local capacity limits never fail a lookup: they are
//! logged and the content is rendered or returned uncached. A failing or panicking render
//! delegate is reported to every caller awaiting it as a [`RenderError`].
//!
//! # Quick Start
//!
//! ```
//! use fragcache::{FragmentCache, FragmentSource};
//! use fragcache_memory::InMemoryStore;
//! use fragcache_tier::CacheKey;
//! use std::{convert::Infallible, time::Duration};
//!
//! # futures::executor::block_on(async {
//! let cache = FragmentCache::builder(InMemoryStore::new()).size_limit(8 * 1024 * 1024).build()?;
//!
//! let key = CacheKey::builder("product").vary_by("id", "1234").vary_by("locale", "en-US").build();
//! let fragment = cache
//!     .get_or_render(&key, Duration::from_secs(300), || async {
//!         Ok::<_, Infallible>(format!("<div class=\"product\">{}</div>", 1234))
//!     })
//!     .await?;
//!
//! assert_eq!(fragment.source(), FragmentSource::Rendered);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! # }).unwrap();
//! ```
//!
//! # Telemetry
//!
//! Every lookup step emits a `tracing` event named `fragment.event` carrying the cache name,
//! the operation, the outcome and, for failures, the cause. With the `metrics` feature,
//! [`FragmentCacheBuilder::metrics`] additionally reports an event counter, an operation
//! duration histogram and the local cache size through OpenTelemetry.
//!
//! # Features
//!
//! - `metrics`: OpenTelemetry metrics.
//! - `test-util`: re-exports [`MockStore`](fragcache_tier::testing::MockStore) and
//!   [`ClockControl`](fragcache_tier::ClockControl) for tests of code using this crate.

mod builder;
mod cache;
mod error;
mod format;
mod fragment;
mod inflight;
mod telemetry;

#[doc(inline)]
pub use builder::FragmentCacheBuilder;
#[doc(inline)]
pub use cache::{FragmentCache, RenderOptions};
#[doc(inline)]
pub use error::RenderError;
#[doc(inline)]
pub use format::{BinaryFormatter, FragmentFormatter};
#[doc(inline)]
pub use fragment::{Fragment, FragmentSource};
#[doc(no_inline)]
pub use fragcache_memory::{CacheOptions, EvictionPolicy, InMemoryStore, OptionsError};
#[doc(no_inline)]
pub use fragcache_tier::{
    BoundedCache, CacheKey, Clock, Expiration, FormatError, FragmentEntry, FragmentStore, Priority, StoreError, StoreErrorKind,
};
#[cfg(any(feature = "test-util", test))]
#[doc(no_inline)]
pub use fragcache_tier::{ClockControl, testing};
#[doc(inline)]
pub use telemetry::CacheName;
