//! Error types for ledgerlink-core

use thiserror::Error;

use crate::EntityClass;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Entity class {0} configured more than once")]
    DuplicateClass(EntityClass),

    #[error("Search bound for {class} is {bound}, but the ledger already holds {observed} entities")]
    SearchBoundTooSmall {
        class: EntityClass,
        bound: u64,
        observed: u64,
    },

    #[error("Identifier collision for {class}: ids {first} and {second} both encode to {opaque}")]
    IdCollision {
        class: EntityClass,
        first: u64,
        second: u64,
        opaque: String,
    },

    #[error("Malformed identifier: {0}")]
    MalformedId(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("ABI decode error: {0}")]
    Decode(String),
}

impl Error {
    /// True for errors that must stop the process at startup
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Error::InvalidConfig(_)
                | Error::DuplicateClass(_)
                | Error::SearchBoundTooSmall { .. }
                | Error::IdCollision { .. }
                | Error::InvalidAddress(_)
        )
    }
}
