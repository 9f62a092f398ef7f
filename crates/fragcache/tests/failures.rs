// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Render delegates that fail or panic.

use std::{
    convert::Infallible,
    error::Error as _,
    sync::{
        Arc,
        atomic::{
            AtomicUsize,
            Ordering::{AcqRel, Acquire},
        },
    },
    time::Duration,
};

use fragcache::{FragmentCache, FragmentSource, RenderError};
use fragcache_tier::{
    CacheKey,
    testing::{MockStore, StoreOp},
};
use futures::{StreamExt, executor::block_on, stream::FuturesUnordered};

const TTL: Duration = Duration::from_secs(60);

#[derive(Debug, thiserror::Error)]
#[error("template '{0}' not found")]
struct TemplateError(&'static str);

#[test]
fn render_error_reaches_the_caller() {
    let store = MockStore::new();
    let cache = FragmentCache::builder(store.clone()).build().unwrap();
    let key = CacheKey::new("nav");

    let error = block_on(cache.get_or_render(&key, TTL, || async { Err::<&str, _>(TemplateError("nav.html")) })).unwrap_err();

    assert!(matches!(error, RenderError::Failed { .. }));
    assert_eq!(error.key(), &key);
    assert!(!error.is_panic());
    assert_eq!(error.source().unwrap().to_string(), "template 'nav.html' not found");
    assert!(cache.local_cache().is_empty());
    assert_eq!(store.count(|op| matches!(op, StoreOp::Set { .. })), 0);
}

#[test]
fn failed_render_is_not_cached() {
    let cache = FragmentCache::builder(MockStore::new()).build().unwrap();
    let key = CacheKey::new("nav");

    let failed = block_on(cache.get_or_render(&key, TTL, || async { Err::<&str, _>(TemplateError("nav.html")) }));
    assert!(failed.is_err());

    let fragment = block_on(cache.get_or_render(&key, TTL, || async { Ok::<_, Infallible>("<nav/>") })).unwrap();
    assert_eq!(fragment.source(), FragmentSource::Rendered);
}

#[tokio::test]
async fn every_waiting_caller_receives_the_render_error() {
    let renders = Arc::new(AtomicUsize::default());
    let cache = FragmentCache::builder(MockStore::new()).build().unwrap();
    let key = CacheKey::new("nav");

    let futures = FuturesUnordered::new();
    for _ in 0..5 {
        let renders = Arc::clone(&renders);
        futures.push(cache.get_or_render(&key, TTL, move || async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            renders.fetch_add(1, AcqRel);
            Err::<&str, _>(TemplateError("nav.html"))
        }));
    }

    let results: Vec<_> = futures.collect().await;
    assert_eq!(renders.load(Acquire), 1);
    for result in results {
        let error = result.unwrap_err();
        assert_eq!(error.to_string(), "rendering fragment 'nav' failed: template 'nav.html' not found");
    }
    assert_eq!(cache.inflight_len(), 0);
}

#[tokio::test]
async fn panicking_render_releases_every_waiting_caller() {
    let cache = FragmentCache::builder(MockStore::new()).build().unwrap();
    let key = CacheKey::new("nav");

    let futures = FuturesUnordered::new();
    for _ in 0..3 {
        let crash = true;
        futures.push(cache.get_or_render(&key, TTL, move || async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            if crash {
                panic!("template engine crashed");
            }
            Ok::<_, Infallible>("<nav/>")
        }));
    }

    let results: Vec<_> = futures.collect().await;
    for result in results {
        let error = result.unwrap_err();
        assert!(error.is_panic());
        assert!(error.to_string().contains("template engine crashed"), "{error}");
    }
    assert_eq!(cache.inflight_len(), 0);

    // The key is usable again.
    let fragment = cache.get_or_render(&key, TTL, || async { Ok::<_, Infallible>("<nav/>") }).await.unwrap();
    assert_eq!(fragment.as_str(), Some("<nav/>"));
}

#[test]
fn store_outage_does_not_turn_into_render_errors() {
    let store = MockStore::new();
    store.fail_when(|_| true);
    let cache = FragmentCache::builder(store).build().unwrap();

    for index in 0..3 {
        let key = CacheKey::new(format!("item:{index}"));
        let result = block_on(cache.get_or_render(&key, TTL, || async { Ok::<_, Infallible>("<li/>") }));
        assert!(result.is_ok());
    }
}
