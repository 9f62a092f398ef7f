// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::time::SystemTime;

use bytes::Bytes;
use fragcache_tier::FragmentEntry;

/// Where a fragment lookup found its content.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FragmentSource {
    /// The local bounded cache.
    Local,
    /// The distributed store.
    Store,
    /// The render delegate ran.
    Rendered,
}

impl FragmentSource {
    /// Returns a short lowercase name of the source.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Store => "store",
            Self::Rendered => "rendered",
        }
    }
}

/// The content of a fragment lookup.
///
/// Callers that awaited another caller's render see the source of that render.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Fragment {
    content: Bytes,
    created_at: SystemTime,
    expires_at: Option<SystemTime>,
    source: FragmentSource,
}

impl Fragment {
    pub(crate) fn from_entry(entry: FragmentEntry, source: FragmentSource) -> Self {
        Self {
            created_at: entry.created_at(),
            expires_at: entry.expires_at(),
            content: entry.into_content(),
            source,
        }
    }

    pub(crate) fn new(content: Bytes, created_at: SystemTime, expires_at: Option<SystemTime>, source: FragmentSource) -> Self {
        Self {
            content,
            created_at,
            expires_at,
            source,
        }
    }

    /// Returns the rendered content.
    #[must_use]
    pub fn content(&self) -> &Bytes {
        &self.content
    }

    /// Consumes the fragment and returns its content.
    #[must_use]
    pub fn into_content(self) -> Bytes {
        self.content
    }

    /// Returns the content as text, or `None` if it is not valid UTF-8.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.content).ok()
    }

    /// Returns when the content was rendered.
    #[must_use]
    pub fn created_at(&self) -> SystemTime {
        self.created_at
    }

    /// Returns when the content expires, or `None` if it never does.
    #[must_use]
    pub fn expires_at(&self) -> Option<SystemTime> {
        self.expires_at
    }

    /// Returns where the content came from.
    #[must_use]
    pub fn source(&self) -> FragmentSource {
        self.source
    }
}

impl AsRef<[u8]> for Fragment {
    fn as_ref(&self) -> &[u8] {
        &self.content
    }
}

impl From<Fragment> for Bytes {
    fn from(fragment: Fragment) -> Self {
        fragment.content
    }
}
