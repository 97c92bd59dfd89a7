//! Resilient access to the ledger endpoint
//!
//! Every remote read or write goes through a [`ResilientLedger`], which wraps
//! an injected [`RemoteCall`] capability with:
//!
//! 1. A TTL cache keyed by the request's canonical JSON (reads only)
//! 2. A fair concurrency cap on remote invocations
//! 3. A token-bucket rate limiter shared by all callers
//! 4. Retry with backoff for transient failures
//! 5. Fixed-size batching of independent reads
//!
//! ## Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use ledgerlink_core::{EntityClass, LedgerLinkConfig, LedgerRequest};
//! use ledgerlink_rpc::{JsonRpcLedger, ResilientLedger};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = LedgerLinkConfig::load("ledgerlink.json")?;
//!     let remote = JsonRpcLedger::connect(&config.rpc_url, &config.classes).await?;
//!     let ledger = Arc::new(ResilientLedger::new(remote, &config.resilience)?);
//!     let count = ledger.read(&LedgerRequest::entity_count(EntityClass::Raffle)).await?;
//!     println!("{:?}", count);
//!     Ok(())
//! }
//! ```

pub mod abi;
mod cache;
mod call;
mod error;
mod jsonrpc;
mod layer;
mod limiter;
pub mod metrics;
pub mod mock;
mod retry;

pub use cache::TtlCache;
pub use call::{CallError, LedgerCall, RemoteCall};
pub use error::ResilienceError;
pub use jsonrpc::JsonRpcLedger;
pub use layer::ResilientLedger;
pub use limiter::RateLimiter;
pub use mock::MockLedger;
pub use retry::{with_retry, RequestState, RetryPolicy};
