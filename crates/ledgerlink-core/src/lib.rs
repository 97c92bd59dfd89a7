//! ledgerlink-core: identifier schemes and shared types for on-chain lookups
//!
//! Public identifiers for raffles and payment links never expose the
//! sequential id the ledger contract assigns. Two schemes exist:
//!
//! - **Sequential**: a truncated salted Keccak-256 digest of the internal id.
//!   Reversed by probing `0..search_bound`, so the bound must always be at
//!   least the number of entities ever created.
//! - **Timestamped**: `<unix_ms>_<hash8>`. Parsed structurally; it does not
//!   recover the internal id and is not interchangeable with the sequential
//!   scheme.
//!
//! | Scheme | Reversible | Cost of resolution |
//! |--------|------------|--------------------|
//! | Sequential | yes | O(search_bound) hashes, or O(1) with the reverse index |
//! | Timestamped | no | O(1) parse |
//!
//! The crate also defines the entity projections and the request/response
//! types exchanged with the ledger through `ledgerlink-rpc`.

mod codec;
mod config;
mod entity;
mod error;
mod hashing;
mod request;
mod scheme;
mod timestamped;

pub use codec::IdentifierCodec;
pub use config::{ClassConfig, LedgerLinkConfig, ResilienceConfig};
pub use entity::{
    parse_address, Address, Entity, EntityClass, InternalId, LinkStatus, PaymentLink, Raffle,
    RaffleStatus,
};
pub use error::Error;
pub use hashing::keccak256;
pub use request::{LedgerRequest, LedgerResponse};
pub use scheme::{OpaqueId, PublicId, SchemeKind, TimestampedId};
pub use timestamped::{TimestampedIdentifierCodec, TimestampedParts};

pub type Result<T> = std::result::Result<T, Error>;

/// Limits shared by both identifier schemes
pub mod constants {
    /// Hex characters in a full Keccak-256 digest
    pub const MAX_ID_LENGTH: usize = 64;

    /// Hash characters carried by a timestamped id
    pub const TIMESTAMPED_HASH_LENGTH: usize = 8;

    /// Separator between timestamp and hash in a timestamped id
    pub const TIMESTAMPED_SEPARATOR: char = '_';
}
