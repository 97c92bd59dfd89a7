//! Calldata and return-data codec for the raffle and payment-link contracts
//!
//! Contract surface:
//!
//! ```text
//! getRaffle(uint256)      -> (address creator, uint256 ticketPrice, uint256 maxTickets,
//!                             uint256 ticketsSold, uint64 endTime, uint8 status)
//! raffleCount()           -> uint256
//! getPaymentLink(uint256) -> (address creator, address token, uint256 amount,
//!                             uint64 expiresAt, uint8 status)
//! paymentLinkCount()      -> uint256
//! ```
//!
//! Getters return a zeroed struct for ids that were never created, so a zero
//! creator means "not found".

use alloy_primitives::{keccak256, Bytes, U256};
use ledgerlink_core::{
    Address, Entity, EntityClass, Error, LedgerRequest, LinkStatus, PaymentLink, Raffle,
    RaffleStatus, Result,
};

const WORD: usize = 32;
pub const RAFFLE_WORDS: usize = 6;
pub const PAYMENT_LINK_WORDS: usize = 5;

/// First four bytes of the Keccak-256 of a function signature
pub fn selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

fn getter_signature(class: EntityClass) -> &'static str {
    match class {
        EntityClass::Raffle => "getRaffle(uint256)",
        EntityClass::PaymentLink => "getPaymentLink(uint256)",
    }
}

fn count_signature(class: EntityClass) -> &'static str {
    match class {
        EntityClass::Raffle => "raffleCount()",
        EntityClass::PaymentLink => "paymentLinkCount()",
    }
}

/// Calldata for a read request; `None` for requests that are not contract calls
pub fn encode_call(request: &LedgerRequest) -> Option<Bytes> {
    match request {
        LedgerRequest::Entity { class, id } => {
            let mut data = Vec::with_capacity(4 + WORD);
            data.extend_from_slice(&selector(getter_signature(*class)));
            data.extend_from_slice(&U256::from(*id).to_be_bytes::<32>());
            Some(data.into())
        }
        LedgerRequest::EntityCount { class } => {
            Some(selector(count_signature(*class)).to_vec().into())
        }
        LedgerRequest::SendRawTransaction { .. } => None,
    }
}

fn word(data: &[u8], index: usize) -> &[u8] {
    &data[index * WORD..(index + 1) * WORD]
}

fn check_len(data: &[u8], words: usize, what: &str) -> Result<()> {
    if data.len() < words * WORD {
        return Err(Error::Decode(format!(
            "{}: expected {} bytes, got {}",
            what,
            words * WORD,
            data.len()
        )));
    }
    Ok(())
}

fn read_address(data: &[u8], index: usize) -> Result<Address> {
    let w = word(data, index);
    if w[..12].iter().any(|b| *b != 0) {
        return Err(Error::Decode(format!("word {} is not an address", index)));
    }
    let mut address = [0u8; 20];
    address.copy_from_slice(&w[12..]);
    Ok(address)
}

fn read_uint(data: &[u8], index: usize, max: U256, what: &str) -> Result<U256> {
    let value = U256::from_be_slice(word(data, index));
    if value > max {
        return Err(Error::Decode(format!("{} out of range: {}", what, value)));
    }
    Ok(value)
}

fn read_u128(data: &[u8], index: usize, what: &str) -> Result<u128> {
    Ok(read_uint(data, index, U256::from(u128::MAX), what)?.to::<u128>())
}

fn read_u64(data: &[u8], index: usize, what: &str) -> Result<u64> {
    Ok(read_uint(data, index, U256::from(u64::MAX), what)?.to::<u64>())
}

fn read_u8(data: &[u8], index: usize, what: &str) -> Result<u8> {
    Ok(read_uint(data, index, U256::from(u8::MAX), what)?.to::<u8>())
}

pub fn decode_raffle(data: &[u8]) -> Result<Option<Raffle>> {
    check_len(data, RAFFLE_WORDS, "getRaffle")?;

    let creator = read_address(data, 0)?;
    if creator == [0u8; 20] {
        return Ok(None);
    }

    Ok(Some(Raffle {
        creator,
        ticket_price: read_u128(data, 1, "ticketPrice")?,
        max_tickets: read_u64(data, 2, "maxTickets")?,
        tickets_sold: read_u64(data, 3, "ticketsSold")?,
        ends_at: read_u64(data, 4, "endTime")?,
        status: RaffleStatus::try_from(read_u8(data, 5, "status")?)?,
    }))
}

pub fn decode_payment_link(data: &[u8]) -> Result<Option<PaymentLink>> {
    check_len(data, PAYMENT_LINK_WORDS, "getPaymentLink")?;

    let creator = read_address(data, 0)?;
    if creator == [0u8; 20] {
        return Ok(None);
    }

    Ok(Some(PaymentLink {
        creator,
        token: read_address(data, 1)?,
        amount: read_u128(data, 2, "amount")?,
        expires_at: read_u64(data, 3, "expiresAt")?,
        status: LinkStatus::try_from(read_u8(data, 4, "status")?)?,
    }))
}

pub fn decode_entity(class: EntityClass, data: &[u8]) -> Result<Option<Entity>> {
    Ok(match class {
        EntityClass::Raffle => decode_raffle(data)?.map(Entity::Raffle),
        EntityClass::PaymentLink => decode_payment_link(data)?.map(Entity::PaymentLink),
    })
}

pub fn decode_count(data: &[u8]) -> Result<u64> {
    check_len(data, 1, "count")?;
    read_u64(data, 0, "count")
}
