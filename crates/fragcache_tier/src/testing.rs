// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Test doubles for code that talks to a distributed store.
//!
//! [`MockStore`] keeps values in memory, records every operation and can be told to fail,
//! which makes the degraded paths of a cache easy to exercise.

use std::{collections::HashMap, sync::Arc, time::Duration};

use bytes::Bytes;
use parking_lot::Mutex;

use crate::{FragmentStore, StoreError};

/// A recorded store operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreOp {
    /// A get for the given storage key.
    Get(String),
    /// A set for the given storage key.
    Set {
        /// The storage key.
        key: String,
        /// The stored bytes.
        value: Bytes,
        /// The requested time-to-live.
        ttl: Option<Duration>,
    },
    /// A remove for the given storage key.
    Remove(String),
}

impl StoreOp {
    /// Returns the storage key the operation targeted.
    #[must_use]
    pub fn key(&self) -> &str {
        match self {
            Self::Get(key) | Self::Remove(key) | Self::Set { key, .. } => key,
        }
    }
}

type FailPredicate = Box<dyn Fn(&StoreOp) -> bool + Send + Sync>;

/// A configurable in-memory store for tests.
///
/// Clones share their data, their operation log and their failure predicate.
///
/// # Examples
///
/// ```
/// use fragcache_tier::{FragmentStore, testing::{MockStore, StoreOp}};
///
/// # futures::executor::block_on(async {
/// let store = MockStore::new();
/// store.fail_when(|op| matches!(op, StoreOp::Get(_)));
///
/// assert!(store.get("key").await.is_err());
/// assert_eq!(store.operations(), vec![StoreOp::Get("key".to_string())]);
/// # });
/// ```
#[derive(Clone, Default)]
pub struct MockStore {
    data: Arc<Mutex<HashMap<String, Bytes>>>,
    operations: Arc<Mutex<Vec<StoreOp>>>,
    fail_when: Arc<Mutex<Option<FailPredicate>>>,
}

impl std::fmt::Debug for MockStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockStore")
            .field("data", &self.data)
            .field("operations", &self.operations)
            .field("fail_when", &self.fail_when.lock().is_some())
            .finish()
    }
}

impl MockStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every operation matching `predicate` fail with an unavailable-store error.
    ///
    /// Failing operations are still recorded.
    pub fn fail_when<F>(&self, predicate: F)
    where
        F: Fn(&StoreOp) -> bool + Send + Sync + 'static,
    {
        *self.fail_when.lock() = Some(Box::new(predicate));
    }

    /// Lets every operation succeed again.
    pub fn clear_failures(&self) {
        *self.fail_when.lock() = None;
    }

    /// Stores raw bytes without recording an operation, e.g. to plant a corrupt value.
    pub fn insert_raw(&self, key: impl Into<String>, value: impl Into<Bytes>) {
        self.data.lock().insert(key.into(), value.into());
    }

    /// Returns the raw bytes stored under `key` without recording an operation.
    #[must_use]
    pub fn raw(&self, key: &str) -> Option<Bytes> {
        self.data.lock().get(key).cloned()
    }

    /// Returns the number of stored values.
    #[must_use]
    pub fn entry_count(&self) -> usize {
        self.data.lock().len()
    }

    /// Returns a copy of all recorded operations.
    #[must_use]
    pub fn operations(&self) -> Vec<StoreOp> {
        self.operations.lock().clone()
    }

    /// Returns how many recorded operations match `predicate`.
    pub fn count(&self, predicate: impl Fn(&StoreOp) -> bool) -> usize {
        self.operations.lock().iter().filter(|op| predicate(op)).count()
    }

    /// Forgets all recorded operations.
    pub fn clear_operations(&self) {
        self.operations.lock().clear();
    }

    fn record(&self, op: StoreOp) -> Result<(), StoreError> {
        let fail = self.fail_when.lock().as_ref().is_some_and(|predicate| predicate(&op));
        self.operations.lock().push(op);
        if fail {
            Err(StoreError::unavailable("mock: store unavailable"))
        } else {
            Ok(())
        }
    }
}

impl FragmentStore for MockStore {
    async fn get(&self, key: &str) -> Result<Option<Bytes>, StoreError> {
        self.record(StoreOp::Get(key.to_owned()))?;
        Ok(self.data.lock().get(key).cloned())
    }

    async fn set(&self, key: &str, value: Bytes, ttl: Option<Duration>) -> Result<(), StoreError> {
        self.record(StoreOp::Set {
            key: key.to_owned(),
            value: value.clone(),
            ttl,
        })?;
        self.data.lock().insert(key.to_owned(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.record(StoreOp::Remove(key.to_owned()))?;
        self.data.lock().remove(key);
        Ok(())
    }
}
