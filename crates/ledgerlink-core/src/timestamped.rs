//! Timestamped identifier scheme: `<unix_ms>_<hash8>`
//!
//! The creation time is carried in the id itself, so nothing has to be
//! searched to parse it. The trade-off is that the internal id cannot be
//! recovered from the string; callers that need it must already know a
//! candidate and check it with [`TimestampedIdentifierCodec::matches`].

use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::constants::{TIMESTAMPED_HASH_LENGTH, TIMESTAMPED_SEPARATOR};
use crate::hashing::truncated_hex_digest;
use crate::{Error, InternalId, Result, TimestampedId};

pub struct TimestampedIdentifierCodec {
    salt: String,
}

/// Structural parts of a timestamped id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimestampedParts {
    pub timestamp_ms: u64,
    pub hash: String,
}

impl TimestampedParts {
    pub fn created_at(&self) -> SystemTime {
        UNIX_EPOCH + Duration::from_millis(self.timestamp_ms)
    }
}

impl TimestampedIdentifierCodec {
    pub fn new(salt: impl Into<String>) -> Result<Self> {
        let salt = salt.into();
        if salt.is_empty() {
            return Err(Error::InvalidConfig(
                "timestamped id salt must not be empty".to_string(),
            ));
        }
        Ok(Self { salt })
    }

    pub fn encode(&self, internal_id: InternalId, timestamp_ms: u64) -> TimestampedId {
        let hash = self.hash(internal_id, timestamp_ms);
        TimestampedId::new(format!("{}{}{}", timestamp_ms, TIMESTAMPED_SEPARATOR, hash))
    }

    /// Encode with the current wall-clock time
    pub fn encode_now(&self, internal_id: InternalId) -> TimestampedId {
        let now_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;
        self.encode(internal_id, now_ms)
    }

    /// Parse a timestamped id without touching the salt
    pub fn decode(&self, composite: &str) -> Result<TimestampedParts> {
        parse(composite)
    }

    /// Check whether `parts` were produced for `internal_id` under this salt
    pub fn matches(&self, internal_id: InternalId, parts: &TimestampedParts) -> bool {
        self.hash(internal_id, parts.timestamp_ms) == parts.hash.to_ascii_lowercase()
    }

    fn hash(&self, internal_id: InternalId, timestamp_ms: u64) -> String {
        truncated_hex_digest(
            &format!("{}{}{}", internal_id, timestamp_ms, self.salt),
            TIMESTAMPED_HASH_LENGTH,
        )
    }
}

fn parse(composite: &str) -> Result<TimestampedParts> {
    let malformed = |reason: &str| Error::MalformedId(format!("{:?}: {}", composite, reason));

    let (timestamp, hash) = composite
        .split_once(TIMESTAMPED_SEPARATOR)
        .ok_or_else(|| malformed("missing separator"))?;

    if timestamp.is_empty() || !timestamp.bytes().all(|b| b.is_ascii_digit()) {
        return Err(malformed("timestamp is not numeric"));
    }
    let timestamp_ms: u64 = timestamp
        .parse()
        .map_err(|_| malformed("timestamp out of range"))?;

    if hash.len() != TIMESTAMPED_HASH_LENGTH || !hash.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(malformed("hash must be 8 hex characters"));
    }

    Ok(TimestampedParts {
        timestamp_ms,
        hash: hash.to_string(),
    })
}

impl fmt::Debug for TimestampedIdentifierCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimestampedIdentifierCodec")
            .field("salt", &"<redacted>")
            .finish()
    }
}
