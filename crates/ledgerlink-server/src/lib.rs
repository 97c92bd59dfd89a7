//! ledgerlink-server: HTTP lookups of raffles and payment links by public id
//!
//! Wraps an [`ledgerlink_client::OnChainQueryFacade`] in an axum router.
//! Lookups map to `200` (found), `404` (unknown id or class) and `502`
//! (the ledger failed after retries).

pub mod error;
pub mod metrics;
pub mod routes;
pub mod server;
pub mod state;

pub use error::ServerError;
pub use server::{LedgerLinkServer, ServerBuilder};
pub use state::{AppState, SharedState};
