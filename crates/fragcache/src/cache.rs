// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The render coordinator.

use std::{
    error::Error as StdError,
    fmt,
    panic::AssertUnwindSafe,
    sync::Arc,
    time::{Duration, Instant, SystemTime},
};

use bytes::Bytes;
use fragcache_tier::{BoundedCache, CacheKey, Clock, Expiration, FragmentEntry, FragmentStore, Insertion, Priority, StoreError};
use futures::FutureExt;

use crate::{
    Fragment, FragmentCacheBuilder, FragmentFormatter, FragmentSource, RenderError,
    inflight::{InflightRegistry, Join},
    telemetry::{CacheName, FragmentActivity, FragmentOperation, FragmentTelemetry},
};

type BoxError = Box<dyn StdError + Send + Sync>;

/// Expiration and priority of a rendered fragment.
///
/// # Examples
///
/// ```
/// use fragcache::RenderOptions;
/// use fragcache_tier::{Expiration, Priority};
/// use std::time::Duration;
///
/// let options = RenderOptions::expires_after(Duration::from_secs(300)).with_priority(Priority::High);
/// assert_eq!(options.expiration(), Expiration::After(Duration::from_secs(300)));
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RenderOptions {
    expiration: Expiration,
    priority: Priority,
}

impl RenderOptions {
    /// Creates options with the given expiration and normal priority.
    #[must_use]
    pub fn new(expiration: Expiration) -> Self {
        Self {
            expiration,
            priority: Priority::Normal,
        }
    }

    /// Expires the fragment `ttl` after it is rendered.
    #[must_use]
    pub fn expires_after(ttl: Duration) -> Self {
        Self::new(Expiration::After(ttl))
    }

    /// Expires the fragment at an absolute point in time.
    #[must_use]
    pub fn expires_at(at: SystemTime) -> Self {
        Self::new(Expiration::At(at))
    }

    /// Keeps the fragment until it is evicted or invalidated.
    #[must_use]
    pub fn never_expires() -> Self {
        Self::new(Expiration::Never)
    }

    /// Sets the eviction priority in the local cache.
    #[must_use]
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Returns the expiration.
    #[must_use]
    pub fn expiration(&self) -> Expiration {
        self.expiration
    }

    /// Returns the eviction priority.
    #[must_use]
    pub fn priority(&self) -> Priority {
        self.priority
    }
}

/// Caches rendered fragments in a local bounded cache backed by a distributed store.
///
/// A lookup first consults the local cache. On a miss, exactly one caller per key claims the
/// key, reads the distributed store and, if the store has nothing usable, runs the render
/// delegate; concurrent callers for the same key await that caller's result instead of
/// rendering themselves. Cache failures of any kind degrade to rendering fresh content: the
/// only error a lookup reports is a [`RenderError`].
///
/// Cloning is cheap and clones share all state.
///
/// # Examples
///
/// ```
/// use fragcache::{FragmentCache, FragmentSource};
/// use fragcache_memory::InMemoryStore;
/// use fragcache_tier::CacheKey;
/// use std::{convert::Infallible, time::Duration};
///
/// # futures::executor::block_on(async {
/// let cache = FragmentCache::builder(InMemoryStore::new()).name("pages").build()?;
/// let key = CacheKey::builder("nav").vary_by("user", "42").build();
///
/// let first = cache
///     .get_or_render(&key, Duration::from_secs(60), || async { Ok::<_, Infallible>("<nav>...</nav>") })
///     .await?;
/// assert_eq!(first.source(), FragmentSource::Rendered);
///
/// let second = cache
///     .get_or_render(&key, Duration::from_secs(60), || async { Ok::<_, Infallible>("unused") })
///     .await?;
/// assert_eq!(second.source(), FragmentSource::Local);
/// assert_eq!(second.as_str(), Some("<nav>...</nav>"));
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// # }).unwrap();
/// ```
pub struct FragmentCache<S> {
    inner: Arc<Inner<S>>,
}

pub(crate) struct Inner<S> {
    pub(crate) store: S,
    pub(crate) local: Arc<dyn BoundedCache>,
    pub(crate) formatter: Arc<dyn FragmentFormatter>,
    pub(crate) clock: Clock,
    pub(crate) telemetry: FragmentTelemetry,
    pub(crate) inflight: InflightRegistry,
}

impl<S> Clone for FragmentCache<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: fmt::Debug> fmt::Debug for FragmentCache<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FragmentCache")
            .field("name", &self.inner.telemetry.name())
            .field("store", &self.inner.store)
            .field("local_entries", &self.inner.local.len())
            .field("inflight", &self.inner.inflight)
            .finish_non_exhaustive()
    }
}

impl<S: FragmentStore> FragmentCache<S> {
    /// Starts building a cache on top of `store`.
    #[must_use]
    pub fn builder(store: S) -> FragmentCacheBuilder<S> {
        FragmentCacheBuilder::new(store)
    }

    pub(crate) fn from_inner(inner: Inner<S>) -> Self {
        Self { inner: Arc::new(inner) }
    }

    /// Returns the name used in logs and metrics.
    #[must_use]
    pub fn name(&self) -> CacheName {
        self.inner.telemetry.name()
    }

    /// Returns the local bounded cache.
    #[must_use]
    pub fn local_cache(&self) -> &dyn BoundedCache {
        &*self.inner.local
    }

    /// Returns the distributed store.
    #[must_use]
    pub fn store(&self) -> &S {
        &self.inner.store
    }

    /// Returns the number of keys with a lookup or render in progress.
    #[must_use]
    pub fn inflight_len(&self) -> usize {
        self.inner.inflight.len()
    }

    /// Removes the fragment for `key` from the local cache and the distributed store.
    ///
    /// The local entry is always removed. A lookup already in progress for `key` is not
    /// affected and may cache its result afterwards.
    ///
    /// # Errors
    ///
    /// Returns the [`StoreError`] if the store could not remove its copy; other nodes may then
    /// keep serving it until it expires.
    pub async fn invalidate(&self, key: &CacheKey) -> Result<(), StoreError> {
        let started = Instant::now();
        self.inner.local.remove(key);
        self.inner.telemetry.record_local_size(self.inner.local.weighted_size());

        match self.inner.store.remove(&key.storage_key()).await {
            Ok(()) => {
                self.inner
                    .telemetry
                    .record(FragmentOperation::Invalidate, FragmentActivity::Invalidated, Some(started.elapsed()));
                Ok(())
            }
            Err(error) => {
                self.inner.telemetry.record_failure(
                    FragmentOperation::Invalidate,
                    FragmentActivity::StoreError,
                    Some(started.elapsed()),
                    &error,
                );
                Err(error)
            }
        }
    }
}

impl<S: FragmentStore + 'static> FragmentCache<S> {
    /// Returns the fragment for `key`, rendering it with `render` if no cached copy exists.
    ///
    /// A freshly rendered fragment expires `ttl` after rendering and has normal priority. A
    /// zero `ttl` returns the content without caching it.
    ///
    /// # Errors
    ///
    /// Returns a [`RenderError`] if `render` fails or panics, including when another caller's
    /// render for the same key, which this call awaited, failed.
    pub async fn get_or_render<F, Fut, C, E>(&self, key: &CacheKey, ttl: Duration, render: F) -> Result<Fragment, RenderError>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<C, E>> + Send + 'static,
        C: Into<Bytes> + Send + 'static,
        E: Into<BoxError> + Send + 'static,
    {
        self.get_or_render_with(key, RenderOptions::expires_after(ttl), render).await
    }

    /// Returns the fragment for `key`, rendering it with `render` and `options` if no cached
    /// copy exists.
    ///
    /// The render runs on behalf of every caller awaiting it: if the caller that started it is
    /// dropped, the render continues as long as another caller awaits the same key.
    ///
    /// # Errors
    ///
    /// Returns a [`RenderError`] if `render` fails or panics, including when another caller's
    /// render for the same key, which this call awaited, failed.
    pub async fn get_or_render_with<F, Fut, C, E>(&self, key: &CacheKey, options: RenderOptions, render: F) -> Result<Fragment, RenderError>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<C, E>> + Send + 'static,
        C: Into<Bytes> + Send + 'static,
        E: Into<BoxError> + Send + 'static,
    {
        let started = Instant::now();
        if let Some(entry) = self.inner.local.try_get(key) {
            self.inner
                .telemetry
                .record(FragmentOperation::GetOrRender, FragmentActivity::LocalHit, Some(started.elapsed()));
            return Ok(Fragment::from_entry(entry, FragmentSource::Local));
        }

        let inner = Arc::clone(&self.inner);
        let join = self.inner.inflight.join_or_claim(key, |claim| {
            let key = key.clone();
            async move {
                let result = inner.fill(&key, options, render).await;
                drop(claim);
                result
            }
            .boxed()
        });

        match join {
            Join::Leader(pending) => pending.await,
            Join::Follower(pending) => {
                let result = pending.await;
                self.inner
                    .telemetry
                    .record(FragmentOperation::GetOrRender, FragmentActivity::Joined, Some(started.elapsed()));
                result
            }
        }
    }
}

impl<S: FragmentStore> Inner<S> {
    /// Runs under the key's claim: local re-check, store lookup, then render.
    async fn fill<F, Fut, C, E>(&self, key: &CacheKey, options: RenderOptions, render: F) -> Result<Fragment, RenderError>
    where
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<C, E>> + Send,
        C: Into<Bytes> + Send,
        E: Into<BoxError> + Send,
    {
        // A flight for this key may have completed between our miss and our claim.
        if let Some(entry) = self.local.try_get(key) {
            self.telemetry.record(FragmentOperation::GetOrRender, FragmentActivity::LocalHit, None);
            return Ok(Fragment::from_entry(entry, FragmentSource::Local));
        }

        let storage_key = key.storage_key();
        if let Some(entry) = self.read_store(key, &storage_key).await {
            self.set_local(key, entry.clone());
            return Ok(Fragment::from_entry(entry, FragmentSource::Store));
        }

        let started = Instant::now();
        let outcome = AssertUnwindSafe(async move { render().await }).catch_unwind().await;
        let content: Bytes = match outcome {
            Ok(Ok(content)) => content.into(),
            Ok(Err(error)) => {
                let error = RenderError::failed(key.clone(), error.into());
                self.telemetry
                    .record_failure(FragmentOperation::Render, FragmentActivity::RenderFailed, Some(started.elapsed()), &error);
                return Err(error);
            }
            Err(payload) => {
                let error = RenderError::panicked(key.clone(), payload.as_ref());
                self.telemetry
                    .record_failure(FragmentOperation::Render, FragmentActivity::RenderFailed, Some(started.elapsed()), &error);
                return Err(error);
            }
        };
        self.telemetry
            .record(FragmentOperation::Render, FragmentActivity::Rendered, Some(started.elapsed()));

        let created_at = self.clock.system_time();
        let Some(entry) = FragmentEntry::new(content.clone(), created_at, options.expiration, options.priority) else {
            self.telemetry.record(FragmentOperation::Render, FragmentActivity::Uncacheable, None);
            let expires_at = nominal_expiry(options.expiration, created_at);
            return Ok(Fragment::new(content, created_at, expires_at, FragmentSource::Rendered));
        };

        self.write_store(key, &storage_key, &entry).await;
        self.set_local(key, entry.clone());
        Ok(Fragment::from_entry(entry, FragmentSource::Rendered))
    }

    /// Reads and decodes the stored entry. Every failure is reported as a miss.
    async fn read_store(&self, key: &CacheKey, storage_key: &str) -> Option<FragmentEntry> {
        let started = Instant::now();
        let bytes = match self.store.get(storage_key).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                self.telemetry
                    .record(FragmentOperation::StoreGet, FragmentActivity::StoreMiss, Some(started.elapsed()));
                return None;
            }
            Err(error) => {
                self.telemetry.record_failure(
                    FragmentOperation::StoreGet,
                    FragmentActivity::StoreError,
                    Some(started.elapsed()),
                    &error,
                );
                return None;
            }
        };

        let entry = match self.formatter.decode(key, &bytes) {
            Ok(entry) => entry,
            Err(error) => {
                self.telemetry.record_failure(
                    FragmentOperation::StoreGet,
                    FragmentActivity::FormatError,
                    Some(started.elapsed()),
                    &error,
                );
                self.remove_unreadable(storage_key).await;
                return None;
            }
        };

        if entry.is_expired(self.clock.system_time()) {
            self.telemetry
                .record(FragmentOperation::StoreGet, FragmentActivity::Expired, Some(started.elapsed()));
            return None;
        }

        self.telemetry
            .record(FragmentOperation::StoreGet, FragmentActivity::StoreHit, Some(started.elapsed()));
        Some(entry)
    }

    async fn remove_unreadable(&self, storage_key: &str) {
        if let Err(error) = self.store.remove(storage_key).await {
            self.telemetry
                .record_failure(FragmentOperation::StoreRemove, FragmentActivity::StoreError, None, &error);
        }
    }

    /// Best-effort write of a freshly rendered entry.
    async fn write_store(&self, key: &CacheKey, storage_key: &str, entry: &FragmentEntry) {
        let Some(ttl) = entry.remaining_ttl(self.clock.system_time()) else {
            return;
        };

        let bytes = match self.formatter.encode(key, entry) {
            Ok(bytes) => bytes,
            Err(error) => {
                self.telemetry
                    .record_failure(FragmentOperation::StoreSet, FragmentActivity::FormatError, None, &error);
                return;
            }
        };

        let started = Instant::now();
        match self.store.set(storage_key, bytes, ttl).await {
            Ok(()) => self
                .telemetry
                .record(FragmentOperation::StoreSet, FragmentActivity::Stored, Some(started.elapsed())),
            Err(error) => self.telemetry.record_failure(
                FragmentOperation::StoreSet,
                FragmentActivity::StoreError,
                Some(started.elapsed()),
                &error,
            ),
        }
    }

    fn set_local(&self, key: &CacheKey, entry: FragmentEntry) {
        if self.local.set(key.clone(), entry) == Insertion::Rejected {
            self.telemetry.record(FragmentOperation::LocalSet, FragmentActivity::Rejected, None);
        }
        self.telemetry.record_local_size(self.local.weighted_size());
    }
}

/// The expiry a fragment would have had, for content too short-lived to cache.
fn nominal_expiry(expiration: Expiration, created_at: SystemTime) -> Option<SystemTime> {
    match expiration {
        Expiration::Never => None,
        Expiration::After(ttl) => created_at.checked_add(ttl),
        Expiration::At(at) => Some(at),
    }
}
