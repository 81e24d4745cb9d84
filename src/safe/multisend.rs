//! Batched calls for delegated execution
//!
//! A batch is run by delegating to the MultiSend library: every call in it
//! is issued by the account itself, and the batch either completes as a
//! whole or leaves no trace. Each call is packed as
//! `operation (1) || to (20) || value (32) || data length (32) || data`.

use crate::core::abi::IMultiSend;
use crate::core::types::{Address, Bytes, U256};
use crate::safe::transaction::Operation;
use alloy_sol_types::SolCall;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MultiSendError {
    #[error("Truncated batch entry at byte {0}")]
    Truncated(usize),
    #[error("Nested delegate calls are not allowed (entry {0})")]
    NestedDelegateCall(usize),
    #[error("Unknown operation {op} in entry {index}")]
    UnknownOperation { index: usize, op: u8 },
    #[error("Not a multiSend payload")]
    NotMultiSend,
}

/// One call of a batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchCall {
    pub to: Address,
    pub value: U256,
    pub data: Vec<u8>,
}

impl BatchCall {
    pub fn new(to: Address, value: U256, data: Vec<u8>) -> Self {
        Self { to, value, data }
    }
}

/// An ordered list of calls
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MultiSendBatch {
    pub calls: Vec<BatchCall>,
}

impl MultiSendBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(mut self, call: BatchCall) -> Self {
        self.calls.push(call);
        self
    }

    /// Packed encoding of the calls
    pub fn encode_packed(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for call in &self.calls {
            out.push(Operation::Call.as_u8());
            out.extend_from_slice(call.to.as_slice());
            out.extend_from_slice(&call.value.to_be_bytes::<32>());
            out.extend_from_slice(&U256::from(call.data.len()).to_be_bytes::<32>());
            out.extend_from_slice(&call.data);
        }
        out
    }

    /// `multiSend(bytes)` payload for a delegate call to the library
    pub fn encode_call(&self) -> Vec<u8> {
        IMultiSend::multiSendCall {
            transactions: Bytes::from(self.encode_packed()),
        }
        .abi_encode()
    }

    /// Parse packed calls
    pub fn decode_packed(packed: &[u8]) -> Result<Self, MultiSendError> {
        let mut calls = Vec::new();
        let mut pos = 0;

        while pos < packed.len() {
            let header_end = pos + 1 + 20 + 32 + 32;
            if header_end > packed.len() {
                return Err(MultiSendError::Truncated(pos));
            }
            let index = calls.len();

            match Operation::from_u8(packed[pos]) {
                Some(Operation::Call) => {}
                Some(Operation::DelegateCall) => {
                    return Err(MultiSendError::NestedDelegateCall(index))
                }
                None => {
                    return Err(MultiSendError::UnknownOperation {
                        index,
                        op: packed[pos],
                    })
                }
            }

            let to = Address::from_slice(&packed[pos + 1..pos + 21]);
            let value = U256::from_be_slice(&packed[pos + 21..pos + 53]);
            let len = u64::try_from(U256::from_be_slice(&packed[pos + 53..header_end]))
                .ok()
                .and_then(|l| usize::try_from(l).ok())
                .ok_or(MultiSendError::Truncated(pos))?;

            let data_end = header_end
                .checked_add(len)
                .filter(|end| *end <= packed.len())
                .ok_or(MultiSendError::Truncated(pos))?;

            calls.push(BatchCall {
                to,
                value,
                data: packed[header_end..data_end].to_vec(),
            });
            pos = data_end;
        }

        Ok(Self { calls })
    }

    /// Parse a `multiSend(bytes)` payload
    pub fn decode_call(data: &[u8]) -> Result<Self, MultiSendError> {
        let call =
            IMultiSend::multiSendCall::abi_decode(data).map_err(|_| MultiSendError::NotMultiSend)?;
        Self::decode_packed(&call.transactions)
    }
}
