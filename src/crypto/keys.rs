//! ECDSA key management
//!
//! Provides key pair generation, recoverable signing and signer recovery
//! using the secp256k1 elliptic curve. Identities are Ethereum-style
//! addresses: the last 20 bytes of Keccak-256 over the uncompressed public
//! key (without the 0x04 prefix).

use rand::rngs::OsRng;
use secp256k1::ecdsa::{RecoverableSignature, RecoveryId};
use secp256k1::{Message, PublicKey, Secp256k1, SecretKey};
use thiserror::Error;

use super::hash::{eth_signed_message_hash, keccak256};
use crate::core::types::{Address, B256};

/// Length of a serialized `r || s || v` signature
pub const SIGNATURE_LENGTH: usize = 65;

/// Errors that can occur during key operations
#[derive(Error, Debug)]
pub enum KeyError {
    #[error("Invalid private key")]
    InvalidPrivateKey,
    #[error("Invalid public key")]
    InvalidPublicKey,
    #[error("Invalid signature")]
    InvalidSignature,
    #[error("Invalid recovery id: {0}")]
    InvalidRecoveryId(u8),
    #[error("Secp256k1 error: {0}")]
    Secp256k1Error(#[from] secp256k1::Error),
}

/// A key pair consisting of a private key and its corresponding public key
#[derive(Clone)]
pub struct KeyPair {
    pub secret_key: SecretKey,
    pub public_key: PublicKey,
}

impl KeyPair {
    /// Generate a new random key pair
    pub fn generate() -> Self {
        let secp = Secp256k1::new();
        let (secret_key, public_key) = secp.generate_keypair(&mut OsRng);
        Self {
            secret_key,
            public_key,
        }
    }

    /// Create a key pair from an existing secret key
    pub fn from_secret_key(secret_key: SecretKey) -> Self {
        let secp = Secp256k1::new();
        let public_key = PublicKey::from_secret_key(&secp, &secret_key);
        Self {
            secret_key,
            public_key,
        }
    }

    /// Create a key pair from a hex-encoded private key
    pub fn from_private_key_hex(hex_key: &str) -> Result<Self, KeyError> {
        let stripped = hex_key.strip_prefix("0x").unwrap_or(hex_key);
        let bytes = hex::decode(stripped).map_err(|_| KeyError::InvalidPrivateKey)?;
        let secret_key =
            SecretKey::from_slice(&bytes).map_err(|_| KeyError::InvalidPrivateKey)?;
        Ok(Self::from_secret_key(secret_key))
    }

    /// Get the private key as a hex string
    pub fn private_key_hex(&self) -> String {
        hex::encode(self.secret_key.secret_bytes())
    }

    /// Get the public key as a hex string (compressed format)
    pub fn public_key_hex(&self) -> String {
        hex::encode(self.public_key.serialize())
    }

    /// The identity controlled by this key
    pub fn address(&self) -> Address {
        public_key_to_address(&self.public_key)
    }

    /// Sign a 32-byte digest, returning `r || s || v` with `v ∈ {27, 28}`
    pub fn sign_hash(&self, hash: &B256) -> [u8; SIGNATURE_LENGTH] {
        sign_hash(&self.secret_key, hash)
    }

    /// Sign a digest the way `eth_sign` wallets do: the prefixed message
    /// digest is signed and `v` is raised by 4 to mark the presentation.
    pub fn sign_eth_message(&self, hash: &B256) -> [u8; SIGNATURE_LENGTH] {
        let mut sig = sign_hash(&self.secret_key, &eth_signed_message_hash(hash));
        sig[64] += 4;
        sig
    }
}

/// Convert a public key to an address
pub fn public_key_to_address(public_key: &PublicKey) -> Address {
    let uncompressed = public_key.serialize_uncompressed();
    Address::from_word(keccak256(&uncompressed[1..]))
}

/// Parse a public key from hex string
pub fn public_key_from_hex(hex_key: &str) -> Result<PublicKey, KeyError> {
    let bytes = hex::decode(hex_key).map_err(|_| KeyError::InvalidPublicKey)?;
    PublicKey::from_slice(&bytes).map_err(|_| KeyError::InvalidPublicKey)
}

/// Sign a digest with a secret key
pub fn sign_hash(secret_key: &SecretKey, hash: &B256) -> [u8; SIGNATURE_LENGTH] {
    let secp = Secp256k1::new();
    let message = Message::from_digest(hash.0);
    let (recovery_id, compact) = secp
        .sign_ecdsa_recoverable(&message, secret_key)
        .serialize_compact();

    let mut out = [0u8; SIGNATURE_LENGTH];
    out[..64].copy_from_slice(&compact);
    out[64] = 27 + recovery_id.to_i32() as u8;
    out
}

/// Recover the signing address from `r || s` and a `v` in `{27, 28}`
pub fn recover_address(hash: &B256, rs: &[u8; 64], v: u8) -> Result<Address, KeyError> {
    if v != 27 && v != 28 {
        return Err(KeyError::InvalidRecoveryId(v));
    }
    let recovery_id =
        RecoveryId::from_i32((v - 27) as i32).map_err(|_| KeyError::InvalidRecoveryId(v))?;
    let signature = RecoverableSignature::from_compact(rs, recovery_id)
        .map_err(|_| KeyError::InvalidSignature)?;

    let secp = Secp256k1::new();
    let message = Message::from_digest(hash.0);
    let public_key = secp.recover_ecdsa(&message, &signature)?;
    Ok(public_key_to_address(&public_key))
}
