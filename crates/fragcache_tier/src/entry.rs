// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::time::{Duration, SystemTime};

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// How long a rendered fragment stays valid.
///
/// # Examples
///
/// ```
/// use fragcache_tier::Expiration;
/// use std::time::Duration;
///
/// let after = Expiration::After(Duration::from_secs(60));
/// assert_eq!(Expiration::from(Duration::from_secs(60)), after);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Expiration {
    /// The fragment never expires; it leaves the cache only through eviction or invalidation.
    Never,
    /// The fragment expires this long after it was rendered.
    After(Duration),
    /// The fragment expires at an absolute point in time.
    At(SystemTime),
}

impl Expiration {
    /// Resolves the expiration against the time the fragment was rendered.
    ///
    /// Returns `Some(None)` for fragments that never expire, `Some(Some(t))` for an expiry
    /// strictly after `created_at`, and `None` when the fragment would already be expired.
    /// A relative expiration too far out to represent as a [`SystemTime`] never expires.
    #[must_use]
    pub fn resolve(self, created_at: SystemTime) -> Option<Option<SystemTime>> {
        let expires_at = match self {
            Self::Never => return Some(None),
            Self::After(ttl) => match created_at.checked_add(ttl) {
                Some(at) => at,
                None => return Some(None),
            },
            Self::At(at) => at,
        };
        (expires_at > created_at).then_some(Some(expires_at))
    }
}

impl From<Duration> for Expiration {
    fn from(ttl: Duration) -> Self {
        Self::After(ttl)
    }
}

/// Relative importance of a fragment when the local cache has to make room.
///
/// Lower priorities are evicted first. [`Priority::NeverRemove`] fragments are never evicted
/// for capacity, but they still expire and can be invalidated.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    /// Evicted before anything else.
    Low,
    /// The default priority.
    #[default]
    Normal,
    /// Evicted only after all low and normal priority fragments.
    High,
    /// Never evicted to make room.
    NeverRemove,
}

/// A rendered fragment and its metadata.
///
/// The entry's size is the byte length of its content. An entry that expires always does so
/// strictly after it was created; [`FragmentEntry::new`] refuses to build one that would not.
///
/// # Examples
///
/// ```
/// use fragcache_tier::{Expiration, FragmentEntry, Priority};
/// use std::time::{Duration, SystemTime};
///
/// let now = SystemTime::now();
/// let entry = FragmentEntry::new("<nav>...</nav>", now, Expiration::After(Duration::from_secs(60)), Priority::Normal)
///     .expect("expires in the future");
///
/// assert_eq!(entry.size(), 14);
/// assert!(!entry.is_expired(now + Duration::from_secs(59)));
/// assert!(entry.is_expired(now + Duration::from_secs(60)));
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FragmentEntry {
    content: Bytes,
    created_at: SystemTime,
    expires_at: Option<SystemTime>,
    priority: Priority,
}

impl FragmentEntry {
    /// Creates an entry, or returns `None` if the expiration is not after `created_at`.
    #[must_use]
    pub fn new(content: impl Into<Bytes>, created_at: SystemTime, expiration: Expiration, priority: Priority) -> Option<Self> {
        let expires_at = expiration.resolve(created_at)?;
        Some(Self {
            content: content.into(),
            created_at,
            expires_at,
            priority,
        })
    }

    /// Recreates an entry from stored parts, validating the expiration invariant.
    #[must_use]
    pub fn from_parts(content: Bytes, created_at: SystemTime, expires_at: Option<SystemTime>, priority: Priority) -> Option<Self> {
        if expires_at.is_some_and(|at| at <= created_at) {
            return None;
        }
        Some(Self {
            content,
            created_at,
            expires_at,
            priority,
        })
    }

    /// Returns the rendered content.
    #[must_use]
    pub fn content(&self) -> &Bytes {
        &self.content
    }

    /// Consumes the entry and returns its content.
    #[must_use]
    pub fn into_content(self) -> Bytes {
        self.content
    }

    /// Returns the number of bytes the entry occupies.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.content.len() as u64
    }

    /// Returns when the fragment was rendered.
    #[must_use]
    pub fn created_at(&self) -> SystemTime {
        self.created_at
    }

    /// Returns when the fragment expires, if ever.
    #[must_use]
    pub fn expires_at(&self) -> Option<SystemTime> {
        self.expires_at
    }

    /// Returns the eviction priority.
    #[must_use]
    pub fn priority(&self) -> Priority {
        self.priority
    }

    /// Returns `true` once `now` has reached the expiration time.
    #[must_use]
    pub fn is_expired(&self, now: SystemTime) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }

    /// Returns how long the entry stays valid from `now`.
    ///
    /// `Some(None)` means the entry never expires; `None` means it has already expired.
    #[must_use]
    pub fn remaining_ttl(&self, now: SystemTime) -> Option<Option<Duration>> {
        match self.expires_at {
            None => Some(None),
            Some(at) => at.duration_since(now).ok().filter(|left| !left.is_zero()).map(Some),
        }
    }
}
