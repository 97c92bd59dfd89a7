//! ledgerlink-client: resolve public ids and fetch entities from the ledger
//!
//! [`OnChainQueryFacade`] pairs one [`ledgerlink_core::IdentifierCodec`] per
//! entity class with a shared [`ledgerlink_rpc::ResilientLedger`]. Every
//! lookup is tri-state: `Ok(Some(entity))`, `Ok(None)` when the id does not
//! resolve or the entity does not exist, or `Err` for ledger failures.

pub mod error;
pub mod facade;

pub use error::{QueryError, Result};
pub use facade::OnChainQueryFacade;
