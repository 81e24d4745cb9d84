//! Cryptographic utilities
//!
//! This module provides:
//! - Keccak-256 hashing
//! - ECDSA key management with signer recovery (secp256k1)

pub mod hash;
pub mod keys;

pub use hash::{eth_signed_message_hash, keccak256, keccak256_concat, keccak256_hex};
pub use keys::{
    public_key_from_hex, public_key_to_address, recover_address, sign_hash, KeyError, KeyPair,
    SIGNATURE_LENGTH,
};
