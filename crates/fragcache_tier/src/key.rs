// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::{
    borrow::Borrow,
    fmt::{self, Display},
    sync::Arc,
};

/// Prefix of every key written to a distributed store.
const STORAGE_KEY_PREFIX: &str = "fragcache:";

/// Identifies one cached fragment.
///
/// A key is an opaque string built by the caller, typically from the attributes of the
/// marked region and the request parameters its output varies by. Two keys are equal only
/// if their strings are byte-for-byte equal. Cloning a key is cheap.
///
/// # Examples
///
/// ```
/// use fragcache_tier::CacheKey;
///
/// let key = CacheKey::new("nav:user=42");
/// assert_eq!(key.as_str(), "nav:user=42");
///
/// let built = CacheKey::builder("nav").vary_by("user", "42").build();
/// assert_eq!(built, key);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(Arc<str>);

impl CacheKey {
    /// Creates a key from its exact string form.
    #[must_use]
    pub fn new(key: impl Into<Arc<str>>) -> Self {
        Self(key.into())
    }

    /// Starts a canonical key made of a prefix and vary-by parameters.
    #[must_use]
    pub fn builder(prefix: impl Into<String>) -> KeyBuilder {
        KeyBuilder {
            prefix: prefix.into(),
            vary_by: Vec::new(),
        }
    }

    /// Returns the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the fixed-length key under which this fragment is kept in a distributed store.
    ///
    /// The storage key is a 128-bit hash of the full key, so unrelated keys may collide.
    /// Stores therefore receive the full key inside the stored value, and readers compare it.
    ///
    /// # Examples
    ///
    /// ```
    /// use fragcache_tier::CacheKey;
    ///
    /// let key = CacheKey::new("nav:user=42");
    /// assert!(key.storage_key().starts_with("fragcache:"));
    /// assert_eq!(key.storage_key(), CacheKey::new("nav:user=42").storage_key());
    /// ```
    #[must_use]
    pub fn storage_key(&self) -> String {
        let hash = xxhash_rust::xxh3::xxh3_128(self.0.as_bytes());
        format!("{STORAGE_KEY_PREFIX}{hash:032x}")
    }
}

impl Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for CacheKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for CacheKey {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for CacheKey {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// Builds a canonical [`CacheKey`] from a prefix and vary-by parameters.
///
/// Parameters are sorted by name so the order in which they are added does not matter.
/// Reserved characters are escaped so different parameter sets never produce the same key.
///
/// # Examples
///
/// ```
/// use fragcache_tier::CacheKey;
///
/// let a = CacheKey::builder("cart").vary_by("user", "7").vary_by("culture", "en-US").build();
/// let b = CacheKey::builder("cart").vary_by("culture", "en-US").vary_by("user", "7").build();
/// assert_eq!(a, b);
/// assert_eq!(a.as_str(), "cart:culture=en-US;user=7");
/// ```
#[derive(Clone, Debug, Default)]
pub struct KeyBuilder {
    prefix: String,
    vary_by: Vec<(String, String)>,
}

impl KeyBuilder {
    /// Adds a parameter the fragment output depends on.
    #[must_use]
    pub fn vary_by(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.vary_by.push((name.into(), value.into()));
        self
    }

    /// Produces the key.
    #[must_use]
    pub fn build(mut self) -> CacheKey {
        let mut out = String::with_capacity(self.prefix.len() + self.vary_by.len() * 16);
        push_escaped(&mut out, &self.prefix);
        if self.vary_by.is_empty() {
            return CacheKey::new(out);
        }

        self.vary_by.sort();
        out.push(':');
        for (index, (name, value)) in self.vary_by.iter().enumerate() {
            if index > 0 {
                out.push(';');
            }
            push_escaped(&mut out, name);
            out.push('=');
            push_escaped(&mut out, value);
        }
        CacheKey::new(out)
    }
}

fn push_escaped(out: &mut String, part: &str) {
    for ch in part.chars() {
        if matches!(ch, '\\' | ';' | '=' | ':') {
            out.push('\\');
        }
        out.push(ch);
    }
}
