// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! Core abstractions for caching rendered view fragments.
//!
//! This crate defines the vocabulary shared by every fragcache crate:
//!
//! - [`CacheKey`] identifies one cached fragment and derives the key used in a distributed store.
//! - [`FragmentEntry`] is a rendered fragment together with its expiration metadata.
//! - [`BoundedCache`] is the capability of a size-limited, in-process cache.
//! - [`FragmentStore`] is the byte-oriented contract of a distributed key/value store.
//! - [`StoreError`] and [`FormatError`] are the recoverable failures of the cache layer.
//! - [`Clock`] supplies absolute time so expiration can be controlled in tests.
//!
//! # Implementing a Store
//!
//! ```
//! use std::{collections::HashMap, sync::Mutex, time::Duration};
//!
//! use bytes::Bytes;
//! use fragcache_tier::{FragmentStore, StoreError};
//!
//! #[derive(Default)]
//! struct MapStore(Mutex<HashMap<String, Bytes>>);
//!
//! impl FragmentStore for MapStore {
//!     async fn get(&self, key: &str) -> Result<Option<Bytes>, StoreError> {
//!         Ok(self.0.lock().unwrap().get(key).cloned())
//!     }
//!
//!     async fn set(&self, key: &str, value: Bytes, _ttl: Option<Duration>) -> Result<(), StoreError> {
//!         self.0.lock().unwrap().insert(key.to_owned(), value);
//!         Ok(())
//!     }
//!
//!     async fn remove(&self, key: &str) -> Result<(), StoreError> {
//!         self.0.lock().unwrap().remove(key);
//!         Ok(())
//!     }
//! }
//! ```

pub mod bounded;
pub mod clock;
mod entry;
pub mod error;
mod key;
pub mod store;
#[cfg(any(feature = "test-util", test))]
pub mod testing;

#[doc(inline)]
pub use bounded::{BoundedCache, Insertion};
#[doc(inline)]
pub use clock::Clock;
#[cfg(any(feature = "test-util", test))]
#[doc(inline)]
pub use clock::ClockControl;
#[doc(inline)]
pub use entry::{Expiration, FragmentEntry, Priority};
#[doc(inline)]
pub use error::{FormatError, StoreError, StoreErrorKind};
#[doc(inline)]
pub use key::{CacheKey, KeyBuilder};
#[doc(inline)]
pub use store::FragmentStore;
