//! ledgerlink: opaque public ids for on-chain raffles and payment links
//!
//! This crate re-exports the workspace members:
//!
//! - [`ledgerlink_core`]: identifier codecs, entity types, configuration
//! - [`ledgerlink_rpc`]: the resilience layer and ledger clients
//! - [`ledgerlink_client`]: the query facade
//! - [`ledgerlink_server`]: the HTTP surface

pub use ledgerlink_client::{OnChainQueryFacade, QueryError};
pub use ledgerlink_core::{
    ClassConfig, Entity, EntityClass, IdentifierCodec, InternalId, LedgerLinkConfig,
    LedgerRequest, LedgerResponse, OpaqueId, PublicId, ResilienceConfig, SchemeKind,
    TimestampedId, TimestampedIdentifierCodec,
};
pub use ledgerlink_rpc::{
    CallError, JsonRpcLedger, LedgerCall, MockLedger, RemoteCall, ResilienceError,
    ResilientLedger,
};
pub use ledgerlink_server::{LedgerLinkServer, ServerBuilder};
