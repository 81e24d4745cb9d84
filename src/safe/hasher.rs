//! Canonical transaction hashing (EIP-712)
//!
//! The hash owners sign is
//!
//! ```text
//! keccak256(0x19 || 0x01 || domainSeparator || structHash)
//! domainSeparator = keccak256(abi(DOMAIN_TYPEHASH, chainId, account))
//! structHash      = keccak256(abi(SAFE_TX_TYPEHASH, to, value, keccak256(data),
//!                                 operation, safeTxGas, baseGas, gasPrice,
//!                                 gasToken, refundReceiver, nonce))
//! ```
//!
//! The domain binds the hash to one account on one chain; the type hash
//! binds it to the `SafeTx` message type.

use crate::core::abi::SafeTx;
use crate::core::types::{u256_decimal, Address, Bytes, ParseError, B256, U256};
use crate::crypto::keccak256;
use crate::safe::transaction::{Operation, SafeTransaction};
use alloy_sol_types::{eip712_domain, Eip712Domain, SolStruct};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// EIP-712 domain type string
pub const DOMAIN_TYPE: &str = "EIP712Domain(uint256 chainId,address verifyingContract)";

/// Signed struct type string
pub const SAFE_TX_TYPE: &str = "SafeTx(address to,uint256 value,bytes data,uint8 operation,uint256 safeTxGas,uint256 baseGas,uint256 gasPrice,address gasToken,address refundReceiver,uint256 nonce)";

impl From<&SafeTransaction> for SafeTx {
    fn from(tx: &SafeTransaction) -> Self {
        SafeTx {
            to: tx.to,
            value: tx.value,
            data: Bytes::from(tx.data.clone()),
            operation: tx.operation.as_u8(),
            safeTxGas: U256::from(tx.safe_tx_gas),
            baseGas: U256::from(tx.base_gas),
            gasPrice: tx.gas_price,
            gasToken: tx.gas_token,
            refundReceiver: tx.refund_receiver,
            nonce: U256::from(tx.nonce),
        }
    }
}

/// Hashes transactions for one account
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransactionHasher {
    chain_id: u64,
    account: Address,
}

impl TransactionHasher {
    pub fn new(chain_id: u64, account: Address) -> Self {
        Self { chain_id, account }
    }

    /// Domain with only `chainId` and `verifyingContract` set
    pub fn domain(&self) -> Eip712Domain {
        eip712_domain! {
            chain_id: self.chain_id,
            verifying_contract: self.account,
        }
    }

    pub fn domain_type_hash() -> B256 {
        keccak256(DOMAIN_TYPE.as_bytes())
    }

    pub fn safe_tx_type_hash() -> B256 {
        keccak256(SAFE_TX_TYPE.as_bytes())
    }

    pub fn domain_separator(&self) -> B256 {
        self.domain().separator()
    }

    pub fn struct_hash(&self, tx: &SafeTransaction) -> B256 {
        SafeTx::from(tx).eip712_hash_struct()
    }

    /// The 66-byte pre-image of the transaction hash
    pub fn encode_transaction_data(&self, tx: &SafeTransaction) -> Vec<u8> {
        let mut out = Vec::with_capacity(66);
        out.push(0x19);
        out.push(0x01);
        out.extend_from_slice(self.domain_separator().as_slice());
        out.extend_from_slice(self.struct_hash(tx).as_slice());
        out
    }

    /// The hash owners sign
    pub fn hash(&self, tx: &SafeTransaction) -> B256 {
        SafeTx::from(tx).eip712_signing_hash(&self.domain())
    }

    /// Wallet-native presentation of the same transaction
    pub fn typed_data(&self, tx: &SafeTransaction) -> SafeTxTypedData {
        let field = |name: &str, ty: &str| TypedField {
            name: name.to_string(),
            ty: ty.to_string(),
        };

        let mut types = BTreeMap::new();
        types.insert(
            "EIP712Domain".to_string(),
            vec![
                field("chainId", "uint256"),
                field("verifyingContract", "address"),
            ],
        );
        types.insert(
            "SafeTx".to_string(),
            vec![
                field("to", "address"),
                field("value", "uint256"),
                field("data", "bytes"),
                field("operation", "uint8"),
                field("safeTxGas", "uint256"),
                field("baseGas", "uint256"),
                field("gasPrice", "uint256"),
                field("gasToken", "address"),
                field("refundReceiver", "address"),
                field("nonce", "uint256"),
            ],
        );

        SafeTxTypedData {
            types,
            primary_type: "SafeTx".to_string(),
            domain: TypedDomain {
                chain_id: self.chain_id,
                verifying_contract: self.account,
            },
            message: SafeTxMessage {
                to: tx.to,
                value: tx.value,
                data: format!("0x{}", hex::encode(&tx.data)),
                operation: tx.operation.as_u8(),
                safe_tx_gas: tx.safe_tx_gas.to_string(),
                base_gas: tx.base_gas.to_string(),
                gas_price: tx.gas_price,
                gas_token: tx.gas_token,
                refund_receiver: tx.refund_receiver,
                nonce: tx.nonce.to_string(),
            },
        }
    }
}

// =============================================================================
// Typed data presentation
// =============================================================================

/// A member of an EIP-712 struct type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypedField {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
}

/// EIP-712 domain of an account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypedDomain {
    pub chain_id: u64,
    pub verifying_contract: Address,
}

/// `SafeTx` message as wallets display it (integers as decimal strings)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SafeTxMessage {
    pub to: Address,
    #[serde(with = "u256_decimal")]
    pub value: U256,
    pub data: String,
    pub operation: u8,
    pub safe_tx_gas: String,
    pub base_gas: String,
    #[serde(with = "u256_decimal")]
    pub gas_price: U256,
    pub gas_token: Address,
    pub refund_receiver: Address,
    pub nonce: String,
}

/// Errors turning a typed-data document back into a transaction
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum TypedDataError {
    #[error("Unsupported primary type: {0}")]
    UnsupportedPrimaryType(String),
    #[error("Invalid operation: {0}")]
    InvalidOperation(u8),
    #[error("Invalid number in field {0}")]
    InvalidNumber(&'static str),
    #[error("Invalid data field: {0}")]
    InvalidData(#[from] ParseError),
}

/// An `eth_signTypedData_v4` document for a `SafeTx`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SafeTxTypedData {
    pub types: BTreeMap<String, Vec<TypedField>>,
    pub primary_type: String,
    pub domain: TypedDomain,
    pub message: SafeTxMessage,
}

impl SafeTxTypedData {
    /// Rebuild the transaction the document describes
    pub fn to_transaction(&self) -> Result<SafeTransaction, TypedDataError> {
        if self.primary_type != "SafeTx" {
            return Err(TypedDataError::UnsupportedPrimaryType(
                self.primary_type.clone(),
            ));
        }
        let m = &self.message;
        let number = |s: &str, field: &'static str| {
            s.parse::<u64>()
                .map_err(|_| TypedDataError::InvalidNumber(field))
        };

        Ok(SafeTransaction {
            to: m.to,
            value: m.value,
            data: crate::core::types::parse_hex_bytes(&m.data)?,
            operation: Operation::from_u8(m.operation)
                .ok_or(TypedDataError::InvalidOperation(m.operation))?,
            safe_tx_gas: number(&m.safe_tx_gas, "safeTxGas")?,
            base_gas: number(&m.base_gas, "baseGas")?,
            gas_price: m.gas_price,
            gas_token: m.gas_token,
            refund_receiver: m.refund_receiver,
            nonce: number(&m.nonce, "nonce")?,
        })
    }

    /// The digest a wallet signs for this document
    pub fn signing_hash(&self) -> Result<B256, TypedDataError> {
        let tx = self.to_transaction()?;
        let hasher = TransactionHasher::new(self.domain.chain_id, self.domain.verifying_contract);
        Ok(hasher.hash(&tx))
    }
}
