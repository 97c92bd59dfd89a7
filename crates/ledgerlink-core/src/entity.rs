//! Entity classes and read-only projections of on-chain state

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::Error;

/// Sequential id assigned by the ledger contract at creation
pub type InternalId = u64;

/// 20-byte Ethereum address
pub type Address = [u8; 20];

/// Kind of on-chain entity addressed by a public id
///
/// Each class has its own contract, salt and search bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityClass {
    Raffle,
    PaymentLink,
}

impl EntityClass {
    pub const ALL: [EntityClass; 2] = [EntityClass::Raffle, EntityClass::PaymentLink];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityClass::Raffle => "raffle",
            EntityClass::PaymentLink => "payment_link",
        }
    }
}

impl fmt::Display for EntityClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityClass {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "raffle" | "raffles" => Ok(EntityClass::Raffle),
            "payment_link" | "payment-link" | "payment_links" | "payment-links" | "link" => {
                Ok(EntityClass::PaymentLink)
            }
            other => Err(Error::InvalidConfig(format!("unknown entity class: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RaffleStatus {
    Open,
    Drawn,
    Cancelled,
}

impl TryFrom<u8> for RaffleStatus {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(RaffleStatus::Open),
            1 => Ok(RaffleStatus::Drawn),
            2 => Ok(RaffleStatus::Cancelled),
            other => Err(Error::Decode(format!("unknown raffle status {}", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkStatus {
    Active,
    Paid,
    Cancelled,
}

impl TryFrom<u8> for LinkStatus {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(LinkStatus::Active),
            1 => Ok(LinkStatus::Paid),
            2 => Ok(LinkStatus::Cancelled),
            other => Err(Error::Decode(format!("unknown payment link status {}", other))),
        }
    }
}

/// On-chain raffle state
///
/// `tickets_sold` and `status` change over time; never hold on to a copy
/// longer than the resilience layer's cache TTL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Raffle {
    #[serde(with = "hex_address")]
    pub creator: Address,
    /// Ticket price in wei, a decimal string in JSON
    #[serde(with = "decimal_amount")]
    pub ticket_price: u128,
    pub max_tickets: u64,
    pub tickets_sold: u64,
    /// Unix seconds
    pub ends_at: u64,
    pub status: RaffleStatus,
}

/// On-chain payment link state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentLink {
    #[serde(with = "hex_address")]
    pub creator: Address,
    /// ERC-20 token, zero address for the native currency
    #[serde(with = "hex_address")]
    pub token: Address,
    /// Amount in the token's base units, a decimal string in JSON
    #[serde(with = "decimal_amount")]
    pub amount: u128,
    /// Unix seconds, 0 when the link never expires
    pub expires_at: u64,
    pub status: LinkStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Entity {
    Raffle(Raffle),
    PaymentLink(PaymentLink),
}

impl Entity {
    pub fn class(&self) -> EntityClass {
        match self {
            Entity::Raffle(_) => EntityClass::Raffle,
            Entity::PaymentLink(_) => EntityClass::PaymentLink,
        }
    }

    pub fn creator(&self) -> &Address {
        match self {
            Entity::Raffle(r) => &r.creator,
            Entity::PaymentLink(l) => &l.creator,
        }
    }
}

/// Parse a `0x`-prefixed (or bare) hex address
pub fn parse_address(s: &str) -> crate::Result<Address> {
    let hex_str = s.strip_prefix("0x").unwrap_or(s);
    let bytes = hex::decode(hex_str).map_err(|e| Error::InvalidAddress(format!("{}: {}", s, e)))?;
    bytes
        .try_into()
        .map_err(|_| Error::InvalidAddress(format!("{}: expected 20 bytes", s)))
}

mod hex_address {
    use serde::{self, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(address: &[u8; 20], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let hex_str = format!("0x{}", hex::encode(address));
        serializer.serialize_str(&hex_str)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<[u8; 20], D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        super::parse_address(&s).map_err(serde::de::Error::custom)
    }
}

/// Token amounts as decimal strings
///
/// JSON numbers lose precision past 2^53 in most clients, and internally
/// tagged enums cannot read back integers wider than 64 bits.
mod decimal_amount {
    use serde::{self, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(amount: &u128, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&amount.to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<u128, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse()
            .map_err(|e| serde::de::Error::custom(format!("invalid amount {:?}: {}", s, e)))
    }
}
