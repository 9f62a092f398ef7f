// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! A Redis-backed [`FragmentStore`](fragcache_tier::FragmentStore).
//!
//! [`RedisStore`] lets every node of a deployment share rendered fragments. It speaks plain
//! `GET`, `SET ... PX` and `DEL` over a multiplexed [`ConnectionManager`](redis::aio::ConnectionManager),
//! which reconnects on its own after the server goes away.
//!
//! # Examples
//!
//! ```no_run
//! use fragcache_redis::RedisStore;
//!
//! # async fn connect() -> Result<(), fragcache_tier::StoreError> {
//! let store = RedisStore::connect("redis://127.0.0.1:6379").await?.with_prefix("web-1");
//! # let _ = store;
//! # Ok(())
//! # }
//! ```

mod store;

#[doc(inline)]
pub use store::RedisStore;
