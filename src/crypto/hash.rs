//! Keccak-256 hashing utilities
//!
//! All commitments in the engine (transaction hashes, domain separators,
//! function selectors, addresses) are Keccak-256 digests.

use crate::core::types::B256;
use sha3::{Digest, Keccak256};

/// Computes Keccak-256 of the input data
pub fn keccak256(data: &[u8]) -> B256 {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    B256::from(<[u8; 32]>::from(hasher.finalize()))
}

/// Computes Keccak-256 over several slices without concatenating them first
pub fn keccak256_concat(parts: &[&[u8]]) -> B256 {
    let mut hasher = Keccak256::new();
    for part in parts {
        hasher.update(part);
    }
    B256::from(<[u8; 32]>::from(hasher.finalize()))
}

/// Computes Keccak-256 and returns it as a hex string
pub fn keccak256_hex(data: &[u8]) -> String {
    hex::encode(keccak256(data).0)
}

/// Digest signed by `eth_sign` style wallets for a 32-byte hash
///
/// `keccak256("\x19Ethereum Signed Message:\n32" || hash)`
pub fn eth_signed_message_hash(hash: &B256) -> B256 {
    keccak256_concat(&[b"\x19Ethereum Signed Message:\n32", hash.as_slice()])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keccak256_empty() {
        assert_eq!(
            keccak256_hex(b""),
            "c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
        );
    }

    #[test]
    fn test_concat_matches_single_pass() {
        let joined = keccak256(b"hello world");
        let parts = keccak256_concat(&[b"hello", b" ", b"world"]);
        assert_eq!(joined, parts);
    }

    #[test]
    fn test_eth_signed_message_differs_from_raw() {
        let hash = keccak256(b"payload");
        assert_ne!(eth_signed_message_hash(&hash), hash);
    }
}
