//! Requests and responses exchanged with the ledger endpoint

use serde::{Deserialize, Serialize};

use crate::{Entity, EntityClass, InternalId};

/// A single ledger operation
///
/// The serialized form doubles as the cache key in the resilience layer,
/// so two requests with equal JSON are the same request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum LedgerRequest {
    /// Read one entity by internal id
    Entity { class: EntityClass, id: InternalId },
    /// Number of entities the contract has issued so far
    EntityCount { class: EntityClass },
    /// Broadcast a signed transaction (`0x`-prefixed hex)
    SendRawTransaction { raw: String },
}

impl LedgerRequest {
    pub fn entity(class: EntityClass, id: InternalId) -> Self {
        LedgerRequest::Entity { class, id }
    }

    pub fn entity_count(class: EntityClass) -> Self {
        LedgerRequest::EntityCount { class }
    }

    /// True for requests that only read state
    pub fn is_read(&self) -> bool {
        !matches!(self, LedgerRequest::SendRawTransaction { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerResponse {
    /// `None` when the contract has no entity at that id
    Entity(Option<Entity>),
    Count(u64),
    TxHash(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_serialization_is_canonical() {
        let a = LedgerRequest::entity(EntityClass::Raffle, 3);
        let b = LedgerRequest::Entity {
            class: EntityClass::Raffle,
            id: 3,
        };
        assert_eq!(
            serde_json::to_string(&a).unwrap(),
            serde_json::to_string(&b).unwrap()
        );
        assert_eq!(
            serde_json::to_string(&a).unwrap(),
            r#"{"op":"entity","class":"raffle","id":3}"#
        );
    }

    #[test]
    fn test_read_classification() {
        assert!(LedgerRequest::entity_count(EntityClass::PaymentLink).is_read());
        assert!(!LedgerRequest::SendRawTransaction { raw: "0x00".into() }.is_read());
    }
}
