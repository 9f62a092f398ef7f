// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Turning fragment entries into stored bytes and back.
//!
//! Every node sharing a distributed store must agree on the stored layout, and nodes running
//! different versions may share a store during a rollout. Decoding therefore never panics:
//! anything it does not understand is reported as a [`FormatError`], which the cache treats
//! exactly like a miss.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use bincode::Options;
use bytes::Bytes;
use fragcache_tier::{CacheKey, FormatError, FragmentEntry, Priority};
use serde::{Deserialize, Serialize};

const MAGIC: [u8; 2] = *b"FC";
const VERSION: u8 = 1;
const HEADER_LEN: usize = MAGIC.len() + 1;

/// Encodes fragment entries for a distributed store.
///
/// `decode(key, encode(key, entry))` must return an entry equal to `entry`. Implementations
/// embed enough of `key` to detect values that belong to another key sharing the same
/// storage key, and report them as [`FormatError::KeyMismatch`].
pub trait FragmentFormatter: Send + Sync {
    /// Encodes `entry`, stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns a [`FormatError`] if the entry cannot be represented.
    fn encode(&self, key: &CacheKey, entry: &FragmentEntry) -> Result<Bytes, FormatError>;

    /// Decodes the entry for `key` from `bytes`.
    ///
    /// # Errors
    ///
    /// Returns a [`FormatError`] for truncated, foreign, corrupt or incompatible input.
    fn decode(&self, key: &CacheKey, bytes: &[u8]) -> Result<FragmentEntry, FormatError>;
}

/// The default compact binary layout.
///
/// A value starts with the two bytes `FC` and a format version byte, followed by a `bincode`
/// envelope holding the full key, both timestamps (as offsets from the Unix epoch), the
/// priority and the content.
///
/// # Examples
///
/// ```
/// use fragcache::{BinaryFormatter, FragmentFormatter};
/// use fragcache_tier::{CacheKey, Expiration, FormatError, FragmentEntry, Priority};
/// use std::time::{Duration, SystemTime};
///
/// let key = CacheKey::new("nav:user=42");
/// let entry = FragmentEntry::new("<nav>...</nav>", SystemTime::now(), Expiration::After(Duration::from_secs(60)), Priority::Normal)
///     .unwrap();
///
/// let bytes = BinaryFormatter.encode(&key, &entry)?;
/// assert_eq!(BinaryFormatter.decode(&key, &bytes)?, entry);
/// assert!(matches!(BinaryFormatter.decode(&CacheKey::new("footer"), &bytes), Err(FormatError::KeyMismatch)));
/// # Ok::<(), FormatError>(())
/// ```
#[derive(Clone, Copy, Debug, Default)]
pub struct BinaryFormatter;

#[derive(Serialize)]
struct EnvelopeRef<'a> {
    key: &'a str,
    created_at: Duration,
    expires_at: Option<Duration>,
    priority: Priority,
    content: &'a [u8],
}

#[derive(Deserialize)]
struct Envelope {
    key: String,
    created_at: Duration,
    expires_at: Option<Duration>,
    priority: Priority,
    content: Vec<u8>,
}

impl FragmentFormatter for BinaryFormatter {
    fn encode(&self, key: &CacheKey, entry: &FragmentEntry) -> Result<Bytes, FormatError> {
        let envelope = EnvelopeRef {
            key: key.as_str(),
            created_at: since_epoch(entry.created_at())?,
            expires_at: entry.expires_at().map(since_epoch).transpose()?,
            priority: entry.priority(),
            content: entry.content(),
        };

        let mut buffer = Vec::with_capacity(HEADER_LEN + key.as_str().len() + entry.content().len() + 48);
        buffer.extend_from_slice(&MAGIC);
        buffer.push(VERSION);
        envelope_options()
            .serialize_into(&mut buffer, &envelope)
            .map_err(|error| FormatError::Malformed(error.into()))?;
        Ok(Bytes::from(buffer))
    }

    fn decode(&self, key: &CacheKey, bytes: &[u8]) -> Result<FragmentEntry, FormatError> {
        let (version, payload) = match bytes {
            [first, second, version, payload @ ..] if [*first, *second] == MAGIC => (*version, payload),
            [_, _, _, ..] => return Err(FormatError::BadMagic),
            short if MAGIC.starts_with(short) => return Err(FormatError::Truncated),
            _ => return Err(FormatError::BadMagic),
        };
        if version != VERSION {
            return Err(FormatError::UnsupportedVersion(version));
        }

        let envelope: Envelope = envelope_options()
            .deserialize(payload)
            .map_err(|error| FormatError::Malformed(error.into()))?;
        if envelope.key != key.as_str() {
            return Err(FormatError::KeyMismatch);
        }

        FragmentEntry::from_parts(
            Bytes::from(envelope.content),
            from_epoch(envelope.created_at)?,
            envelope.expires_at.map(from_epoch).transpose()?,
            envelope.priority,
        )
        .ok_or(FormatError::InvalidTimestamp)
    }
}

/// Fixed-width integers, and nothing may follow the envelope.
fn envelope_options() -> impl Options {
    bincode::DefaultOptions::new().with_fixint_encoding().reject_trailing_bytes()
}

fn since_epoch(time: SystemTime) -> Result<Duration, FormatError> {
    time.duration_since(UNIX_EPOCH).ok().ok_or(FormatError::InvalidTimestamp)
}

fn from_epoch(offset: Duration) -> Result<SystemTime, FormatError> {
    UNIX_EPOCH.checked_add(offset).ok_or(FormatError::InvalidTimestamp)
}
