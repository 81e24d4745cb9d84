//! Proposed account transactions
//!
//! A `SafeTransaction` is the complete statement of intent owners sign:
//! destination, value, payload, operation kind, gas/refund parameters and
//! the nonce it is bound to.

use crate::core::types::{hex_bytes, u256_decimal, Address, U256};
use serde::{Deserialize, Serialize};
use std::fmt;

/// How the inner action is invoked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Operation {
    /// Ordinary message call; the target runs in its own context
    #[default]
    Call,
    /// The target's code runs in the account's own context
    DelegateCall,
}

impl Operation {
    /// Wire value (`uint8` in the signed struct)
    pub fn as_u8(&self) -> u8 {
        match self {
            Operation::Call => 0,
            Operation::DelegateCall => 1,
        }
    }

    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Operation::Call),
            1 => Some(Operation::DelegateCall),
            _ => None,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Call => write!(f, "CALL"),
            Operation::DelegateCall => write!(f, "DELEGATECALL"),
        }
    }
}

/// A transaction proposed for execution by the account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SafeTransaction {
    pub to: Address,
    #[serde(with = "u256_decimal")]
    pub value: U256,
    #[serde(with = "hex_bytes")]
    pub data: Vec<u8>,
    pub operation: Operation,
    /// Gas forwarded to the inner call (0 = everything available)
    pub safe_tx_gas: u64,
    /// Gas independent of execution (signature checks, payment) refunded on top
    pub base_gas: u64,
    /// Refund price per gas unit (0 = no refund)
    #[serde(with = "u256_decimal")]
    pub gas_price: U256,
    /// Refund currency; the zero address means native currency
    pub gas_token: Address,
    /// Refund recipient; the zero address means the submitter
    pub refund_receiver: Address,
    pub nonce: u64,
}

impl SafeTransaction {
    /// A plain call with no refund settings
    pub fn call(to: Address, value: U256, data: Vec<u8>, nonce: u64) -> Self {
        Self {
            to,
            value,
            data,
            operation: Operation::Call,
            safe_tx_gas: 0,
            base_gas: 0,
            gas_price: U256::ZERO,
            gas_token: Address::ZERO,
            refund_receiver: Address::ZERO,
            nonce,
        }
    }

    /// Whether a refund will be paid after execution
    pub fn pays_refund(&self) -> bool {
        !self.gas_price.is_zero()
    }
}

/// Builder for transactions with refund parameters
#[derive(Debug, Clone)]
pub struct SafeTransactionBuilder {
    tx: SafeTransaction,
}

impl SafeTransactionBuilder {
    /// Start a call to `to`
    pub fn new(to: Address) -> Self {
        Self {
            tx: SafeTransaction::call(to, U256::ZERO, Vec::new(), 0),
        }
    }

    pub fn value(mut self, value: U256) -> Self {
        self.tx.value = value;
        self
    }

    pub fn data(mut self, data: Vec<u8>) -> Self {
        self.tx.data = data;
        self
    }

    pub fn operation(mut self, operation: Operation) -> Self {
        self.tx.operation = operation;
        self
    }

    pub fn safe_tx_gas(mut self, gas: u64) -> Self {
        self.tx.safe_tx_gas = gas;
        self
    }

    pub fn base_gas(mut self, gas: u64) -> Self {
        self.tx.base_gas = gas;
        self
    }

    pub fn gas_price(mut self, price: U256) -> Self {
        self.tx.gas_price = price;
        self
    }

    pub fn gas_token(mut self, token: Address) -> Self {
        self.tx.gas_token = token;
        self
    }

    pub fn refund_receiver(mut self, receiver: Address) -> Self {
        self.tx.refund_receiver = receiver;
        self
    }

    pub fn nonce(mut self, nonce: u64) -> Self {
        self.tx.nonce = nonce;
        self
    }

    pub fn build(self) -> SafeTransaction {
        self.tx
    }
}
