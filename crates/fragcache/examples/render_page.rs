// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Renders a page from cached fragments.
//!
//! Two requests for the same page arrive at once; the navigation fragment is rendered a
//! single time and the second page view is served entirely from the local cache.

use std::{
    convert::Infallible,
    sync::{
        Arc,
        atomic::{AtomicU32, Ordering},
    },
    time::Duration,
};

use fragcache::{CacheKey, FragmentCache, InMemoryStore, Priority, RenderError, RenderOptions};

async fn render_page(cache: &FragmentCache<InMemoryStore>, user: u32, renders: &Arc<AtomicU32>) -> Result<String, RenderError> {
    let layout = cache
        .get_or_render_with(
            &CacheKey::new("layout"),
            RenderOptions::never_expires().with_priority(Priority::NeverRemove),
            || async { Ok::<_, Infallible>("<html><body>{}</body></html>") },
        )
        .await?;

    let nav_key = CacheKey::builder("nav").vary_by("user", user.to_string()).build();
    let renders = Arc::clone(renders);
    let nav = cache
        .get_or_render(&nav_key, Duration::from_secs(60), move || async move {
            renders.fetch_add(1, Ordering::Relaxed);
            tokio::time::sleep(Duration::from_millis(100)).await;
            Ok::<_, Infallible>(format!("<nav>Hello, user {user}</nav>"))
        })
        .await?;

    let layout = layout.as_str().unwrap_or_default();
    let nav = nav.as_str().unwrap_or_default();
    Ok(layout.replace("{}", nav))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().with_max_level(tracing::Level::DEBUG).init();

    let cache = FragmentCache::builder(InMemoryStore::new())
        .name("pages")
        .size_limit(16 * 1024 * 1024)
        .build()?;
    let renders = Arc::new(AtomicU32::new(0));

    let (first, second) = tokio::join!(render_page(&cache, 42, &renders), render_page(&cache, 42, &renders));
    println!("{}", first?);
    println!("{}", second?);
    println!("navigation rendered {} time(s)", renders.load(Ordering::Relaxed));

    let third = render_page(&cache, 42, &renders).await?;
    println!("{third}");
    println!("navigation rendered {} time(s)", renders.load(Ordering::Relaxed));

    Ok(())
}
