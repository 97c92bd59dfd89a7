//! Keccak-256 helpers shared by both identifier schemes

use tiny_keccak::{Hasher, Keccak};

/// Keccak-256 digest (the Ethereum variant, not NIST SHA3-256)
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak::v256();
    hasher.update(data);
    let mut out = [0u8; 32];
    hasher.finalize(&mut out);
    out
}

/// First `len` lowercase hex characters of the digest of `input`
pub(crate) fn truncated_hex_digest(input: &str, len: usize) -> String {
    let mut digest = hex::encode(keccak256(input.as_bytes()));
    digest.truncate(len);
    digest
}
