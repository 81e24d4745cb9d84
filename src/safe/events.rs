//! Events emitted by an account

use crate::core::types::{u256_decimal, Address, B256, U256};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Observable record of something an account did
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum SafeEvent {
    SafeSetup {
        owners: Vec<Address>,
        threshold: usize,
    },
    ExecutionSuccess {
        tx_hash: B256,
        #[serde(with = "u256_decimal")]
        payment: U256,
    },
    ExecutionFailure {
        tx_hash: B256,
        #[serde(with = "u256_decimal")]
        payment: U256,
    },
    RefundFailed {
        tx_hash: B256,
        receiver: Address,
        reason: String,
    },
    AddedOwner {
        owner: Address,
    },
    RemovedOwner {
        owner: Address,
    },
    ChangedThreshold {
        threshold: usize,
    },
    ApproveHash {
        approved_hash: B256,
        owner: Address,
    },
    ApprovalRevoked {
        approved_hash: B256,
        owner: Address,
    },
    SafeReceived {
        sender: Address,
        #[serde(with = "u256_decimal")]
        value: U256,
    },
}

impl fmt::Display for SafeEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SafeEvent::SafeSetup { owners, threshold } => {
                write!(f, "SafeSetup({}-of-{})", threshold, owners.len())
            }
            SafeEvent::ExecutionSuccess { tx_hash, payment } => {
                write!(f, "ExecutionSuccess({}, payment {})", tx_hash, payment)
            }
            SafeEvent::ExecutionFailure { tx_hash, payment } => {
                write!(f, "ExecutionFailure({}, payment {})", tx_hash, payment)
            }
            SafeEvent::RefundFailed {
                tx_hash, reason, ..
            } => write!(f, "RefundFailed({}: {})", tx_hash, reason),
            SafeEvent::AddedOwner { owner } => write!(f, "AddedOwner({})", owner),
            SafeEvent::RemovedOwner { owner } => write!(f, "RemovedOwner({})", owner),
            SafeEvent::ChangedThreshold { threshold } => {
                write!(f, "ChangedThreshold({})", threshold)
            }
            SafeEvent::ApproveHash {
                approved_hash,
                owner,
            } => write!(f, "ApproveHash({}, {})", approved_hash, owner),
            SafeEvent::ApprovalRevoked {
                approved_hash,
                owner,
            } => write!(f, "ApprovalRevoked({}, {})", approved_hash, owner),
            SafeEvent::SafeReceived { sender, value } => {
                write!(f, "SafeReceived({}, {})", sender, value)
            }
        }
    }
}
