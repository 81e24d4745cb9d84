//! Multi-owner account engine
//!
//! This module provides:
//! - `SafeTransaction` and its canonical EIP-712 hash
//! - The owner registry, nonce and approval store of an account
//! - Signature bundle validation (ECDSA, eth_sign and on-chain approvals)
//! - Inner-call execution with gas stipend and refunds
//! - Owner management through authorized self-calls

pub mod account;
pub mod approvals;
pub mod error;
pub mod events;
pub mod executor;
pub mod hasher;
pub mod management;
pub mod multisend;
pub mod nonce;
pub mod owners;
pub mod signatures;
pub mod transaction;

pub use account::{encode_exec_transaction, ExecutionContext, ExecutionOutcome, SafeAccount};
pub use approvals::ApprovalStore;
pub use error::SafeError;
pub use events::SafeEvent;
pub use executor::{CallError, CallHost, ExecutionFrame, Library};
pub use hasher::{SafeTxTypedData, TransactionHasher};
pub use management::ManagementCall;
pub use multisend::{BatchCall, MultiSendBatch, MultiSendError};
pub use nonce::NonceManager;
pub use owners::OwnerRegistry;
pub use signatures::{SignatureBundle, SignatureProof, SignatureValidator};
pub use transaction::{Operation, SafeTransaction, SafeTransactionBuilder};
