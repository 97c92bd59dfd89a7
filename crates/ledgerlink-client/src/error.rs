//! Error types for ledgerlink-client

use ledgerlink_core::{EntityClass, SchemeKind};
use ledgerlink_rpc::ResilienceError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum QueryError {
    #[error("No codec configured for {0}")]
    UnknownClass(EntityClass),

    #[error("{0} ids do not resolve to internal ids")]
    UnsupportedScheme(SchemeKind),

    #[error("Configuration error: {0}")]
    Config(#[from] ledgerlink_core::Error),

    #[error("Ledger error: {0}")]
    Ledger(#[from] ResilienceError),

    #[error("Unexpected ledger response: {0}")]
    UnexpectedResponse(String),

    #[error("Ledger task failed: {0}")]
    TaskFailed(String),
}

impl QueryError {
    /// Failures the remote side is responsible for
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            QueryError::Ledger(_) | QueryError::UnexpectedResponse(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, QueryError>;
