// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Tests against a live Redis server.
//!
//! Run with `REDIS_URL=redis://127.0.0.1:6379 cargo test -p fragcache_redis -- --ignored`.

use std::time::Duration;

use bytes::Bytes;
use fragcache_redis::RedisStore;
use fragcache_tier::FragmentStore;

async fn store() -> RedisStore {
    let url = std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_owned());
    RedisStore::connect(&url)
        .await
        .expect("a redis server should be reachable")
        .with_prefix(format!("fragcache-test-{}", std::process::id()))
}

#[tokio::test]
#[ignore = "requires a running Redis server"]
async fn set_get_remove() {
    let store = store().await;

    store.set("nav", Bytes::from_static(b"<nav/>"), None).await.expect("set");
    assert_eq!(store.get("nav").await.expect("get"), Some(Bytes::from_static(b"<nav/>")));

    store.remove("nav").await.expect("remove");
    assert_eq!(store.get("nav").await.expect("get"), None);
}

#[tokio::test]
#[ignore = "requires a running Redis server"]
async fn values_expire() {
    let store = store().await;

    store
        .set("short", Bytes::from_static(b"x"), Some(Duration::from_millis(50)))
        .await
        .expect("set");
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert_eq!(store.get("short").await.expect("get"), None);
}
