// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

// Field names of `fragment.event` log records double as metric attribute keys.

#[cfg(any(feature = "metrics", test))]
pub(crate) const FRAGMENT_CACHE_NAME: &str = "fragment.cache";

#[cfg(any(feature = "metrics", test))]
pub(crate) const FRAGMENT_OPERATION_NAME: &str = "fragment.operation";

#[cfg(any(feature = "metrics", test))]
pub(crate) const FRAGMENT_ACTIVITY_NAME: &str = "fragment.activity";

#[cfg(test)]
pub(crate) const FRAGMENT_DURATION_NAME: &str = "fragment.duration_ns";

#[cfg(test)]
pub(crate) const FRAGMENT_CAUSE_NAME: &str = "fragment.cause";

#[cfg(test)]
pub(crate) const FRAGMENT_EVENT_NAME: &str = "fragment.event";
