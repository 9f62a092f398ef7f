// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Reports fragment cache metrics through OpenTelemetry and prints them on shutdown.

use std::{convert::Infallible, time::Duration};

use fragcache::{CacheKey, FragmentCache, InMemoryStore};
use opentelemetry_sdk::metrics::SdkMeterProvider;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let meter_provider = SdkMeterProvider::builder()
        .with_periodic_exporter(opentelemetry_stdout::MetricExporter::default())
        .build();

    let cache = FragmentCache::builder(InMemoryStore::new())
        .name("pages")
        .metrics(&meter_provider)
        .build()?;

    for user in [1, 2, 1, 1, 3, 2] {
        let key = CacheKey::builder("nav").vary_by("user", user.to_string()).build();
        cache
            .get_or_render(&key, Duration::from_secs(60), move || async move {
                Ok::<_, Infallible>(format!("<nav>user {user}</nav>"))
            })
            .await?;
    }
    cache.invalidate(&CacheKey::builder("nav").vary_by("user", "1").build()).await?;

    meter_provider.shutdown()?;
    Ok(())
}
