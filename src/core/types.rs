//! Primitive identity, hash and amount types
//!
//! Addresses, 32-byte hashes and `uint256` amounts come from
//! `alloy-primitives`. Addresses compare as unsigned integers, the ordering
//! signature bundles are sorted by. All three serialize as strings, so they
//! can be used as JSON map keys.

use thiserror::Error;

pub use alloy_primitives::{address, Address, Bytes, B256, U256};

/// Head marker of the owner list. Never a valid owner.
pub const SENTINEL: Address = address!("0000000000000000000000000000000000000001");

/// Errors parsing hex-encoded values
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("Invalid hex: {0}")]
    InvalidHex(String),
    #[error("Invalid number: {0}")]
    InvalidNumber(String),
}

/// Address whose low eight bytes hold `value`, handy for fixtures
pub fn address_from_low_u64(value: u64) -> Address {
    let mut bytes = [0u8; 20];
    bytes[12..].copy_from_slice(&value.to_be_bytes());
    Address::from(bytes)
}

/// Parse `0x`-prefixed (or bare) hex into bytes
pub fn parse_hex_bytes(s: &str) -> Result<Vec<u8>, ParseError> {
    let stripped = s.strip_prefix("0x").unwrap_or(s);
    hex::decode(stripped).map_err(|e| ParseError::InvalidHex(e.to_string()))
}

/// Parse a decimal (or `0x` hex) `uint256`
pub fn parse_u256(s: &str) -> Result<U256, ParseError> {
    s.parse::<U256>()
        .map_err(|e| ParseError::InvalidNumber(format!("{}: {}", s, e)))
}

/// Serde helper for `Vec<u8>` fields rendered as `0x` hex
pub mod hex_bytes {
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("0x{}", hex::encode(bytes)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        super::parse_hex_bytes(&s).map_err(de::Error::custom)
    }
}

/// Serde helper rendering `U256` as a decimal string, the form wallets
/// show in typed data
pub mod u256_decimal {
    use alloy_primitives::U256;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &U256, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<U256, D::Error> {
        let s = String::deserialize(deserializer)?;
        super::parse_u256(&s).map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_parse_and_display() {
        let addr: Address = "0x7e5f4552091a69125d5dfcb7b8c2659029395bdf".parse().unwrap();
        // Displayed with the EIP-55 checksum
        assert_eq!(
            addr.to_string(),
            "0x7E5F4552091A69125d5DfCb7b8C2659029395Bdf"
        );

        let bare: Address = "7E5F4552091A69125d5DfCb7b8C2659029395Bdf".parse().unwrap();
        assert_eq!(addr, bare);
        assert!("0x1234".parse::<Address>().is_err());
    }

    #[test]
    fn test_address_ordering_is_numeric() {
        assert!(Address::ZERO < SENTINEL);
        assert!(address_from_low_u64(2) > address_from_low_u64(1));
        assert!(address_from_low_u64(0x0100) > address_from_low_u64(0xff));
    }

    #[test]
    fn test_address_word_padding() {
        let word = SENTINEL.into_word();
        assert_eq!(word[31], 1);
        assert!(word[..31].iter().all(|b| *b == 0));
    }

    #[test]
    fn test_parse_u256() {
        assert_eq!(parse_u256("1000").unwrap(), U256::from(1000u64));
        assert_eq!(parse_u256("0x10").unwrap(), U256::from(16u64));
        assert_eq!(
            parse_u256(&U256::MAX.to_string()).unwrap(),
            U256::MAX
        );
        assert!(matches!(
            parse_u256("ten"),
            Err(ParseError::InvalidNumber(_))
        ));
    }

    #[test]
    fn test_serde_as_map_key() {
        let mut map = std::collections::BTreeMap::new();
        map.insert(address_from_low_u64(7), U256::MAX);

        let json = serde_json::to_string(&map).unwrap();
        let back: std::collections::BTreeMap<Address, U256> = serde_json::from_str(&json).unwrap();
        assert_eq!(back.get(&address_from_low_u64(7)), Some(&U256::MAX));
    }
}
