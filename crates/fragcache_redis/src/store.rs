// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::{borrow::Cow, fmt, sync::Arc, time::Duration};

use bytes::Bytes;
use fragcache_tier::{FragmentStore, StoreError};
use redis::{RedisError, aio::ConnectionManager};

/// A [`FragmentStore`] backed by a Redis server.
///
/// Values are written with `SET key value PX ttl` so that Redis drops them on its own once
/// they expire. Lifetimes longer than a century are written without expiry. Cloning is cheap and clones share the underlying connection.
#[derive(Clone)]
pub struct RedisStore {
    connection: ConnectionManager,
    prefix: Option<Arc<str>>,
}

impl fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisStore").field("prefix", &self.prefix).finish_non_exhaustive()
    }
}

impl RedisStore {
    /// Wraps an established connection.
    #[must_use]
    pub fn new(connection: ConnectionManager) -> Self {
        Self { connection, prefix: None }
    }

    /// Opens a managed connection to the server at `url`.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the URL is invalid or the server cannot be reached.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let client = redis::Client::open(url).map_err(to_store_error)?;
        let connection = ConnectionManager::new(client).await.map_err(to_store_error)?;
        tracing::debug!(target: "fragcache.redis", "connected to redis store");
        Ok(Self::new(connection))
    }

    /// Places every key under `prefix:`, so that several applications can share one server.
    #[must_use]
    pub fn with_prefix(mut self, prefix: impl Into<Arc<str>>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    fn key<'a>(&self, key: &'a str) -> Cow<'a, str> {
        prefixed(self.prefix.as_deref(), key)
    }
}

impl FragmentStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<Bytes>, StoreError> {
        let mut connection = self.connection.clone();
        let value: Option<Vec<u8>> = redis::cmd("GET")
            .arg(self.key(key).as_ref())
            .query_async(&mut connection)
            .await
            .map_err(to_store_error)?;
        Ok(value.map(Bytes::from))
    }

    async fn set(&self, key: &str, value: Bytes, ttl: Option<Duration>) -> Result<(), StoreError> {
        let mut connection = self.connection.clone();
        let mut command = redis::cmd("SET");
        command.arg(self.key(key).as_ref()).arg(value.as_ref());
        if let Some(millis) = ttl.and_then(ttl_millis) {
            command.arg("PX").arg(millis);
        }
        command.query_async::<()>(&mut connection).await.map_err(to_store_error)
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        let mut connection = self.connection.clone();
        redis::cmd("DEL")
            .arg(self.key(key).as_ref())
            .query_async::<()>(&mut connection)
            .await
            .map_err(to_store_error)
    }
}

fn prefixed<'a>(prefix: Option<&str>, key: &'a str) -> Cow<'a, str> {
    match prefix {
        Some(prefix) => Cow::Owned(format!("{prefix}:{key}")),
        None => Cow::Borrowed(key),
    }
}

/// Longest lifetime sent as `PX`, one hundred years.
///
/// Redis refuses expirations that overflow its millisecond clock, so longer lifetimes are
/// written without expiry.
const MAX_TTL_MILLIS: u64 = 100 * 365 * 24 * 60 * 60 * 1000;

/// Redis rejects `PX 0`, so sub-millisecond lifetimes round up. Returns `None` for lifetimes
/// beyond [`MAX_TTL_MILLIS`].
fn ttl_millis(ttl: Duration) -> Option<u64> {
    u64::try_from(ttl.as_millis())
        .ok()
        .filter(|millis| *millis <= MAX_TTL_MILLIS)
        .map(|millis| millis.max(1))
}

fn to_store_error(error: RedisError) -> StoreError {
    if error.is_timeout() {
        StoreError::timeout(error)
    } else {
        StoreError::unavailable(error)
    }
}
