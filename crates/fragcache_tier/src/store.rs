// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The contract of a distributed key/value store.
//!
//! [`FragmentStore`] is deliberately byte oriented: it knows nothing about fragments, keys or
//! formats. The coordinator hashes keys, encodes entries and interprets failures.

use std::{sync::Arc, time::Duration};

use bytes::Bytes;

use crate::StoreError;

/// A key/value store shared between nodes.
///
/// Every operation may fail with a [`StoreError`] when the store is unreachable or slow.
/// Callers treat read failures as misses and write failures as best-effort, so an
/// implementation should report failures rather than retry indefinitely.
pub trait FragmentStore: Send + Sync {
    /// Returns the bytes stored under `key`, if any.
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<Bytes>, StoreError>> + Send;

    /// Stores `value` under `key`. With `ttl` set, the store may drop the value after that long.
    fn set(&self, key: &str, value: Bytes, ttl: Option<Duration>) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Removes the value stored under `key`.
    fn remove(&self, key: &str) -> impl Future<Output = Result<(), StoreError>> + Send;
}

impl<S> FragmentStore for Arc<S>
where
    S: FragmentStore,
{
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<Bytes>, StoreError>> + Send {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: Bytes, ttl: Option<Duration>) -> impl Future<Output = Result<(), StoreError>> + Send {
        (**self).set(key, value, ttl)
    }

    fn remove(&self, key: &str) -> impl Future<Output = Result<(), StoreError>> + Send {
        (**self).remove(key)
    }
}
