//! Error taxonomy of the authorization engine

use crate::core::{AbiError, Address, GasError};
use thiserror::Error;

/// Errors raised by the account, its registry and its validators
///
/// Everything except `InnerCallFailed` and `RefundTransferFailed` aborts
/// `exec_transaction` atomically. Those two are recorded in the outcome.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SafeError {
    #[error("Signatures not sorted by ascending signer: {current} follows {previous}")]
    InvalidSignatureOrder { previous: Address, current: Address },
    #[error("Duplicate signer: {0}")]
    DuplicateSigner(Address),
    #[error("Not an owner: {0}")]
    NotAnOwner(Address),
    #[error("Threshold not met: have {have}, need {need}")]
    ThresholdNotMet { have: usize, need: usize },
    #[error("Signature recovery failed for entry {index}: {reason}")]
    BadRecovery { index: usize, reason: String },
    #[error("Nonce mismatch: expected {expected}, got {actual}")]
    NonceMismatch { expected: u64, actual: u64 },
    #[error("Threshold invariant violated: {0}")]
    ThresholdInvariantViolated(String),
    #[error("Inner call failed: {0}")]
    InnerCallFailed(String),
    #[error("Refund transfer failed: {0}")]
    RefundTransferFailed(String),
    #[error("Malformed signature bundle: {0} bytes is not a multiple of 65")]
    MalformedSignatures(usize),
    #[error("Unsupported signature kind: v = {0}")]
    UnsupportedSignatureKind(u8),
    #[error("Hash not approved by {0}")]
    ApprovalMissing(Address),
    #[error("Invalid owner address: {0}")]
    InvalidOwner(Address),
    #[error("Address is already an owner: {0}")]
    DuplicateOwner(Address),
    #[error("Invalid previous owner {prev} for {owner}")]
    InvalidPrevOwner { prev: Address, owner: Address },
    #[error("Not enough gas to honour safeTxGas: need {required}, have {available}")]
    InsufficientGas { required: u64, available: u64 },
    #[error("Gas error: {0}")]
    Gas(#[from] GasError),
    #[error("Method can only be called from this account")]
    Unauthorized,
    #[error("Invalid payload: {0}")]
    InvalidPayload(#[from] AbiError),
}
