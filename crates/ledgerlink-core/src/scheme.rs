//! Public identifier types, tagged by the scheme that produced them
//!
//! Sequential and timestamped ids are not interchangeable. Anything that
//! stores a public id next to other data should store a [`PublicId`] so the
//! scheme travels with it.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier produced by [`crate::IdentifierCodec`]
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OpaqueId(String);

impl OpaqueId {
    pub(crate) fn new(value: String) -> Self {
        Self(value)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

/// Identifier produced by [`crate::TimestampedIdentifierCodec`]
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TimestampedId(String);

impl TimestampedId {
    pub(crate) fn new(value: String) -> Self {
        Self(value)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

macro_rules! impl_id_traits {
    ($ty:ty) => {
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $ty {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl PartialEq<str> for $ty {
            fn eq(&self, other: &str) -> bool {
                self.0 == other
            }
        }

        impl PartialEq<&str> for $ty {
            fn eq(&self, other: &&str) -> bool {
                self.0 == *other
            }
        }
    };
}

impl_id_traits!(OpaqueId);
impl_id_traits!(TimestampedId);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemeKind {
    /// Truncated salted hash, reversed by bounded search
    Sequential,
    /// `<unix_ms>_<hash8>`, parsed but never reversed
    Timestamped,
}

impl fmt::Display for SchemeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemeKind::Sequential => write!(f, "sequential"),
            SchemeKind::Timestamped => write!(f, "timestamped"),
        }
    }
}

/// A public id together with the scheme that produced it
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "scheme", content = "id", rename_all = "snake_case")]
pub enum PublicId {
    Sequential(OpaqueId),
    Timestamped(TimestampedId),
}

impl PublicId {
    pub fn kind(&self) -> SchemeKind {
        match self {
            PublicId::Sequential(_) => SchemeKind::Sequential,
            PublicId::Timestamped(_) => SchemeKind::Timestamped,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            PublicId::Sequential(id) => id.as_str(),
            PublicId::Timestamped(id) => id.as_str(),
        }
    }
}

impl From<OpaqueId> for PublicId {
    fn from(id: OpaqueId) -> Self {
        PublicId::Sequential(id)
    }
}

impl From<TimestampedId> for PublicId {
    fn from(id: TimestampedId) -> Self {
        PublicId::Timestamped(id)
    }
}
