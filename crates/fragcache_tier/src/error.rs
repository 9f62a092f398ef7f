// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Recoverable failures of the cache layer.
//!
//! None of these errors ever reach the caller of a render: the coordinator degrades every one
//! of them to "render fresh".

use std::{error::Error as StdError, fmt};

type BoxError = Box<dyn StdError + Send + Sync>;

/// What went wrong while talking to a distributed store.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum StoreErrorKind {
    /// The store could not be reached or rejected the request.
    Unavailable,
    /// The store did not answer in time.
    Timeout,
}

impl fmt::Display for StoreErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unavailable => f.write_str("store unavailable"),
            Self::Timeout => f.write_str("store timed out"),
        }
    }
}

/// A distributed store failed to serve a request.
///
/// # Examples
///
/// ```
/// use fragcache_tier::{StoreError, StoreErrorKind};
///
/// let error = StoreError::unavailable("connection refused");
/// assert_eq!(error.kind(), StoreErrorKind::Unavailable);
/// assert!(error.to_string().contains("connection refused"));
/// ```
#[derive(Debug, thiserror::Error)]
#[error("{kind}: {source}")]
pub struct StoreError {
    kind: StoreErrorKind,
    #[source]
    source: BoxError,
}

impl StoreError {
    /// Creates an error of the given kind.
    pub fn new(kind: StoreErrorKind, cause: impl Into<BoxError>) -> Self {
        Self {
            kind,
            source: cause.into(),
        }
    }

    /// Creates an error for a store that cannot be reached.
    pub fn unavailable(cause: impl Into<BoxError>) -> Self {
        Self::new(StoreErrorKind::Unavailable, cause)
    }

    /// Creates an error for a store that did not answer in time.
    pub fn timeout(cause: impl Into<BoxError>) -> Self {
        Self::new(StoreErrorKind::Timeout, cause)
    }

    /// Returns the kind of failure.
    #[must_use]
    pub fn kind(&self) -> StoreErrorKind {
        self.kind
    }
}

/// Stored bytes could not be turned back into a fragment, or a fragment into bytes.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum FormatError {
    /// The input ended before a complete header.
    #[error("cached value is truncated")]
    Truncated,
    /// The input does not start with the fragment marker.
    #[error("cached value is not a fragment")]
    BadMagic,
    /// The input was written by an incompatible format version.
    #[error("unsupported fragment format version {0}")]
    UnsupportedVersion(u8),
    /// The input belongs to a different key that hashes to the same storage key.
    #[error("cached value belongs to a different key")]
    KeyMismatch,
    /// A timestamp lies before the Unix epoch or violates the expiration invariant.
    #[error("fragment timestamps are invalid")]
    InvalidTimestamp,
    /// The payload could not be encoded or decoded.
    #[error("malformed fragment payload: {0}")]
    Malformed(#[source] BoxError),
}
