//! Sequential identifier scheme: salted hash forward, bounded search back
//!
//! `encode` hashes `"{internal_id}{salt}"` with Keccak-256 and keeps the first
//! `id_length` hex characters. There is no stored mapping back; `decode`
//! re-encodes `0, 1, 2, ...` until it finds a match or reaches the search
//! bound. Every id the ledger has issued must stay below that bound, which is
//! why the facade compares it against the on-chain entity count at startup.

use std::collections::HashMap;
use std::fmt;

use crate::constants::MAX_ID_LENGTH;
use crate::hashing::truncated_hex_digest;
use crate::{ClassConfig, EntityClass, Error, InternalId, OpaqueId, Result};

pub struct IdentifierCodec {
    class: EntityClass,
    salt: String,
    search_bound: u64,
    id_length: usize,
    /// Precomputed opaque -> internal mapping over `0..search_bound`
    index: Option<HashMap<String, InternalId>>,
}

impl IdentifierCodec {
    pub fn new(
        class: EntityClass,
        salt: impl Into<String>,
        search_bound: u64,
        id_length: usize,
    ) -> Result<Self> {
        let salt = salt.into();

        if salt.is_empty() {
            return Err(Error::InvalidConfig(format!("{}: salt must not be empty", class)));
        }
        if search_bound == 0 {
            return Err(Error::InvalidConfig(format!(
                "{}: search_bound must be at least 1",
                class
            )));
        }
        if id_length == 0 || id_length > MAX_ID_LENGTH {
            return Err(Error::InvalidConfig(format!(
                "{}: id_length must be in 1..={}, got {}",
                class, MAX_ID_LENGTH, id_length
            )));
        }

        Ok(Self {
            class,
            salt,
            search_bound,
            id_length,
            index: None,
        })
    }

    /// Build a codec from its class configuration
    ///
    /// Honors `reverse_index` and `verify_collisions`, so a colliding
    /// configuration is rejected here rather than at lookup time.
    pub fn from_config(config: &ClassConfig) -> Result<Self> {
        let codec = Self::new(
            config.class,
            config.salt.clone(),
            config.search_bound,
            config.id_length,
        )?;

        if config.reverse_index {
            codec.with_reverse_index()
        } else {
            if config.verify_collisions {
                codec.verify_no_collisions()?;
            }
            Ok(codec)
        }
    }

    /// Precompute every id below the bound for O(1) decoding
    ///
    /// Lookups return exactly what the linear scan would: ids at or past
    /// the bound still resolve to `None`. Memory grows with the bound.
    pub fn with_reverse_index(mut self) -> Result<Self> {
        self.index = Some(self.build_index()?);
        Ok(self)
    }

    pub fn class(&self) -> EntityClass {
        self.class
    }

    pub fn search_bound(&self) -> u64 {
        self.search_bound
    }

    pub fn id_length(&self) -> usize {
        self.id_length
    }

    pub fn has_reverse_index(&self) -> bool {
        self.index.is_some()
    }

    pub fn encode(&self, internal_id: InternalId) -> OpaqueId {
        OpaqueId::new(self.digest(internal_id))
    }

    /// Resolve an opaque id back to the internal id that produced it
    ///
    /// Returns `None` when no id below the search bound encodes to `opaque`.
    /// Matching is exact: uppercase hex or a different length never matches.
    pub fn decode(&self, opaque: &str) -> Option<InternalId> {
        if opaque.len() != self.id_length {
            return None;
        }

        if let Some(index) = &self.index {
            return index.get(opaque).copied();
        }

        (0..self.search_bound).find(|&id| self.digest(id) == opaque)
    }

    /// Fail if two ids below the bound share an opaque id
    pub fn verify_no_collisions(&self) -> Result<()> {
        if self.index.is_some() {
            // built (and therefore checked) at construction
            return Ok(());
        }
        self.build_index().map(|_| ())
    }

    fn digest(&self, internal_id: InternalId) -> String {
        truncated_hex_digest(&format!("{}{}", internal_id, self.salt), self.id_length)
    }

    fn build_index(&self) -> Result<HashMap<String, InternalId>> {
        let capacity = usize::try_from(self.search_bound).unwrap_or(usize::MAX).min(1 << 20);
        let mut index = HashMap::with_capacity(capacity);

        for id in 0..self.search_bound {
            let opaque = self.digest(id);
            if let Some(&first) = index.get(&opaque) {
                return Err(Error::IdCollision {
                    class: self.class,
                    first,
                    second: id,
                    opaque,
                });
            }
            index.insert(opaque, id);
        }

        Ok(index)
    }
}

impl fmt::Debug for IdentifierCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentifierCodec")
            .field("class", &self.class)
            .field("salt", &"<redacted>")
            .field("search_bound", &self.search_bound)
            .field("id_length", &self.id_length)
            .field("reverse_index", &self.index.is_some())
            .finish()
    }
}
