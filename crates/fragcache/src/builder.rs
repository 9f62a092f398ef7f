// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Construction of [`FragmentCache`] instances.

use std::{fmt, sync::Arc};

use fragcache_memory::{CacheOptions, InMemoryStore, LruFragmentCache, OptionsError};
use fragcache_tier::{BoundedCache, Clock, FragmentStore};
#[cfg(any(feature = "metrics", test))]
use opentelemetry::metrics::{Meter, MeterProvider};

use crate::{
    BinaryFormatter, FragmentCache, FragmentFormatter,
    cache::Inner,
    inflight::InflightRegistry,
    telemetry::{CacheName, FragmentTelemetry},
};

const DEFAULT_NAME: CacheName = "fragments";

/// Builder for a [`FragmentCache`].
///
/// Created by [`FragmentCache::builder`]. Without further configuration the cache uses the
/// system clock, a local cache built from [`CacheOptions::default`] (100 MiB) and the
/// [`BinaryFormatter`].
///
/// # Examples
///
/// ```
/// use fragcache::FragmentCache;
/// use fragcache_memory::{CacheOptions, EvictionPolicy, InMemoryStore};
///
/// let cache = FragmentCache::builder(InMemoryStore::new())
///     .name("product_pages")
///     .options(CacheOptions::new().with_size_limit(16 * 1024 * 1024).with_eviction(EvictionPolicy::TinyLfu))
///     .build()?;
///
/// assert_eq!(cache.local_cache().size_limit(), 16 * 1024 * 1024);
/// # Ok::<(), fragcache_memory::OptionsError>(())
/// ```
pub struct FragmentCacheBuilder<S> {
    store: S,
    name: CacheName,
    clock: Clock,
    options: CacheOptions,
    local: Option<Arc<dyn BoundedCache>>,
    formatter: Arc<dyn FragmentFormatter>,
    #[cfg(any(feature = "metrics", test))]
    meter: Option<Meter>,
}

impl<S: fmt::Debug> fmt::Debug for FragmentCacheBuilder<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FragmentCacheBuilder")
            .field("store", &self.store)
            .field("name", &self.name)
            .field("options", &self.options)
            .field("custom_local_cache", &self.local.is_some())
            .finish_non_exhaustive()
    }
}

impl<S: FragmentStore> FragmentCacheBuilder<S> {
    pub(crate) fn new(store: S) -> Self {
        Self {
            store,
            name: DEFAULT_NAME,
            clock: Clock::new_system(),
            options: CacheOptions::default(),
            local: None,
            formatter: Arc::new(BinaryFormatter),
            #[cfg(any(feature = "metrics", test))]
            meter: None,
        }
    }

    /// Sets the name reported in logs and metrics.
    #[must_use]
    pub fn name(mut self, name: CacheName) -> Self {
        self.name = name;
        self
    }

    /// Sets the clock used for creation and expiration times.
    ///
    /// Tests use a clock driven by a [`ClockControl`](fragcache_tier::ClockControl).
    #[must_use]
    pub fn clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Sets the options of the local cache.
    ///
    /// Ignored when a local cache is supplied through [`local_cache`](Self::local_cache).
    #[must_use]
    pub fn options(mut self, options: CacheOptions) -> Self {
        self.options = options;
        self
    }

    /// Sets the byte budget of the local cache.
    #[must_use]
    pub fn size_limit(mut self, bytes: u64) -> Self {
        self.options = self.options.with_size_limit(bytes);
        self
    }

    /// Uses `cache` as the local tier instead of building one from the options.
    ///
    /// The supplied cache should read time from the same clock as this builder.
    #[must_use]
    pub fn local_cache(mut self, cache: impl BoundedCache + 'static) -> Self {
        self.local = Some(Arc::new(cache));
        self
    }

    /// Replaces the [`BinaryFormatter`].
    ///
    /// Every node sharing the store must use a compatible formatter.
    #[must_use]
    pub fn formatter(mut self, formatter: impl FragmentFormatter + 'static) -> Self {
        self.formatter = Arc::new(formatter);
        self
    }

    /// Reports metrics through a meter from `meter_provider`.
    #[cfg(any(feature = "metrics", test))]
    #[cfg_attr(docsrs, doc(cfg(feature = "metrics")))]
    #[must_use]
    pub fn metrics(mut self, meter_provider: &dyn MeterProvider) -> Self {
        self.meter = Some(crate::telemetry::create_meter(meter_provider));
        self
    }

    /// Builds the cache.
    ///
    /// # Errors
    ///
    /// Returns an [`OptionsError`] if the local cache options are invalid.
    pub fn build(self) -> Result<FragmentCache<S>, OptionsError> {
        let local = match self.local {
            Some(local) => local,
            None => self.options.build(self.clock.clone())?,
        };

        #[cfg(any(feature = "metrics", test))]
        let telemetry = match &self.meter {
            Some(meter) => FragmentTelemetry::with_meter(self.name, meter),
            None => FragmentTelemetry::new(self.name),
        };
        #[cfg(not(any(feature = "metrics", test)))]
        let telemetry = FragmentTelemetry::new(self.name);

        Ok(FragmentCache::from_inner(Inner {
            store: self.store,
            local,
            formatter: self.formatter,
            clock: self.clock,
            telemetry,
            inflight: InflightRegistry::default(),
        }))
    }
}

impl FragmentCache<InMemoryStore> {
    /// Creates a single-node cache backed by an [`InMemoryStore`] with default options.
    ///
    /// # Examples
    ///
    /// ```
    /// use fragcache::FragmentCache;
    ///
    /// let cache = FragmentCache::in_memory();
    /// assert_eq!(cache.local_cache().size_limit(), fragcache_memory::DEFAULT_SIZE_LIMIT);
    /// ```
    #[must_use]
    pub fn in_memory() -> Self {
        let clock = Clock::new_system();
        Self::from_inner(Inner {
            store: InMemoryStore::new(),
            local: Arc::new(LruFragmentCache::new(&CacheOptions::default(), clock.clone())),
            formatter: Arc::new(BinaryFormatter),
            clock,
            telemetry: FragmentTelemetry::new(DEFAULT_NAME),
            inflight: InflightRegistry::default(),
        })
    }
}
