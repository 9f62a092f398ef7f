// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The registry of renders in progress.
//!
//! At most one render runs per key. The first caller to miss claims the key and starts a
//! shared render; everyone arriving while it runs awaits the same shared future instead of
//! starting their own. The claim travels inside the shared future and releases the key when
//! the future completes or when the last awaiter drops it.

use std::{
    fmt,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use dashmap::{DashMap, mapref::entry::Entry};
use fragcache_tier::CacheKey;
use futures::future::{BoxFuture, FutureExt, Shared, WeakShared};

use crate::{Fragment, RenderError};

pub(crate) type RenderResult = Result<Fragment, RenderError>;
pub(crate) type PendingRender = Shared<BoxFuture<'static, RenderResult>>;

type Flights = Arc<DashMap<CacheKey, Flight>>;

struct Flight {
    id: u64,
    render: WeakShared<BoxFuture<'static, RenderResult>>,
}

/// How a caller takes part in a render.
pub(crate) enum Join {
    /// The caller claimed the key and its future performs the lookup and render.
    Leader(PendingRender),
    /// Another caller holds the claim; the future yields that caller's result.
    Follower(PendingRender),
}

#[derive(Default)]
pub(crate) struct InflightRegistry {
    flights: Flights,
    next_id: AtomicU64,
}

impl fmt::Debug for InflightRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InflightRegistry").field("len", &self.flights.len()).finish()
    }
}

impl InflightRegistry {
    /// Joins the render pending for `key`, or claims the key and registers the future `start`
    /// builds around the claim.
    ///
    /// `start` runs while the key's shard is locked, so it must only construct the future.
    pub(crate) fn join_or_claim<F>(&self, key: &CacheKey, start: F) -> Join
    where
        F: FnOnce(Claim) -> BoxFuture<'static, RenderResult>,
    {
        match self.flights.entry(key.clone()) {
            Entry::Occupied(mut occupied) => {
                if let Some(render) = occupied.get().render.upgrade() {
                    return Join::Follower(render);
                }
                // Every awaiter of the previous flight went away before it finished.
                let (render, flight) = self.launch(key, start);
                match flight {
                    Some(flight) => {
                        occupied.insert(flight);
                    }
                    None => {
                        occupied.remove();
                    }
                }
                Join::Leader(render)
            }
            Entry::Vacant(vacant) => {
                let (render, flight) = self.launch(key, start);
                if let Some(flight) = flight {
                    vacant.insert(flight);
                }
                Join::Leader(render)
            }
        }
    }

    fn launch<F>(&self, key: &CacheKey, start: F) -> (PendingRender, Option<Flight>)
    where
        F: FnOnce(Claim) -> BoxFuture<'static, RenderResult>,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let claim = Claim {
            flights: Arc::clone(&self.flights),
            key: key.clone(),
            id,
        };
        let render = start(claim).shared();
        let flight = render.downgrade().map(|weak| Flight { id, render: weak });
        (render, flight)
    }

    /// Returns the number of keys with a render in progress.
    pub(crate) fn len(&self) -> usize {
        self.flights.len()
    }
}

/// Exclusive right to render one key.
///
/// Dropping the claim removes the key from the registry, unless a newer flight has already
/// replaced it.
pub(crate) struct Claim {
    flights: Flights,
    key: CacheKey,
    id: u64,
}

impl fmt::Debug for Claim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Claim").field("key", &self.key).field("id", &self.id).finish()
    }
}

impl Drop for Claim {
    fn drop(&mut self) {
        self.flights.remove_if(&self.key, |_, flight| flight.id == self.id);
    }
}
