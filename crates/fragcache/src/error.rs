// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::{any::Any, error::Error as StdError, sync::Arc};

use fragcache_tier::CacheKey;

/// The render delegate failed.
///
/// This is the only error a fragment lookup reports. The caller that ran the render and every
/// caller that awaited it receive clones of the same error, and nothing is cached.
#[derive(Clone, Debug, thiserror::Error)]
#[non_exhaustive]
pub enum RenderError {
    /// The render delegate returned an error.
    #[error("rendering fragment '{key}' failed: {source}")]
    Failed {
        /// The key being rendered.
        key: CacheKey,
        /// The error the delegate returned.
        #[source]
        source: Arc<dyn StdError + Send + Sync>,
    },
    /// The render delegate panicked.
    #[error("rendering fragment '{key}' panicked: {message}")]
    Panicked {
        /// The key being rendered.
        key: CacheKey,
        /// The panic message, if it was a string.
        message: Arc<str>,
    },
}

impl RenderError {
    pub(crate) fn failed(key: CacheKey, error: Box<dyn StdError + Send + Sync>) -> Self {
        Self::Failed {
            key,
            source: Arc::from(error),
        }
    }

    pub(crate) fn panicked(key: CacheKey, payload: &(dyn Any + Send)) -> Self {
        let message = if let Some(text) = payload.downcast_ref::<&str>() {
            Arc::from(*text)
        } else if let Some(text) = payload.downcast_ref::<String>() {
            Arc::from(text.as_str())
        } else {
            Arc::from("non-string panic payload")
        };
        Self::Panicked { key, message }
    }

    /// Returns the key whose render failed.
    #[must_use]
    pub fn key(&self) -> &CacheKey {
        match self {
            Self::Failed { key, .. } | Self::Panicked { key, .. } => key,
        }
    }

    /// Returns `true` if the render delegate panicked.
    #[must_use]
    pub fn is_panic(&self) -> bool {
        matches!(self, Self::Panicked { .. })
    }
}
