//! Inner-call execution and refunds
//!
//! The executor runs an authorized transaction's action on behalf of the
//! account. It never sees signatures; by the time it runs, the nonce has
//! been consumed. Failures of the inner action are returned as
//! `CallError` values for the account to record, never propagated as
//! failures of the enclosing transaction.
//!
//! The platform the account lives on is abstracted by [`CallHost`].

use crate::core::abi::IERC20;
use crate::core::gas::{GasError, GasMeter, CALL_GAS, SSTORE_GAS};
use crate::core::types::{Address, U256};
use crate::safe::approvals::ApprovalStore;
use crate::safe::events::SafeEvent;
use crate::safe::management::ManagementCall;
use crate::safe::multisend::{MultiSendBatch, MultiSendError};
use crate::safe::owners::OwnerRegistry;
use crate::safe::transaction::{Operation, SafeTransaction};
use alloy_sol_types::{SolCall, SolValue};
use log::{debug, warn};
use thiserror::Error;

/// Why an inner call did not complete
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CallError {
    #[error("Execution reverted: {0}")]
    Reverted(String),
    #[error("Out of gas")]
    OutOfGas,
    #[error("Insufficient balance: have {have}, need {need}")]
    InsufficientBalance { have: U256, need: U256 },
    #[error("Reentrant call into executing account {0}")]
    ReentrancyDetected(Address),
    #[error("Delegate call target {0} is not a supported library")]
    UnsupportedDelegateCall(Address),
    #[error("Batch error: {0}")]
    Batch(#[from] MultiSendError),
}

impl From<GasError> for CallError {
    fn from(_: GasError) -> Self {
        CallError::OutOfGas
    }
}

/// Libraries an account may delegate execution to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Library {
    MultiSend,
}

/// The platform an account executes on
///
/// A host call is atomic: when it fails, the host has already undone its
/// own state changes. `checkpoint`/`commit`/`rollback` let the executor
/// bracket several host calls that must succeed or fail together.
pub trait CallHost {
    /// Message call from `caller` to `to`, charging `gas`
    fn call(
        &mut self,
        caller: Address,
        to: Address,
        value: U256,
        data: &[u8],
        gas: &mut GasMeter,
    ) -> Result<Vec<u8>, CallError>;

    /// The library deployed at `address`, if any
    fn library(&self, address: Address) -> Option<Library>;

    /// Whether any code is deployed at `address`
    fn has_code(&self, address: Address) -> bool;

    fn checkpoint(&mut self);
    fn commit(&mut self);
    fn rollback(&mut self);

    /// Native balance of `address`
    fn balance_of(&self, address: Address) -> U256;

    /// Gas price paid by the submitter of the current top-level transaction
    fn tx_gas_price(&self) -> U256;

    /// Record an event emitted by `emitter`
    fn emit(&mut self, emitter: Address, event: SafeEvent);
}

/// Mutable view of an executing account
pub struct ExecutionFrame<'a> {
    pub account: Address,
    pub owners: &'a mut OwnerRegistry,
    pub approvals: &'a mut ApprovalStore,
    pub host: &'a mut dyn CallHost,
}

impl<'a> ExecutionFrame<'a> {
    /// Run `to`/`value`/`data` with the given operation kind
    pub fn execute(
        &mut self,
        to: Address,
        value: U256,
        data: &[u8],
        operation: Operation,
        gas: &mut GasMeter,
    ) -> Result<Vec<u8>, CallError> {
        match operation {
            Operation::Call => self.call(to, value, data, gas),
            Operation::DelegateCall => self.delegate_call(to, data, gas),
        }
    }

    /// Message call issued by the account
    pub fn call(
        &mut self,
        to: Address,
        value: U256,
        data: &[u8],
        gas: &mut GasMeter,
    ) -> Result<Vec<u8>, CallError> {
        if to == self.account {
            return self.self_call(value, data, gas);
        }
        self.host.call(self.account, to, value, data, gas)
    }

    /// Calls the account makes to itself: value is a no-op, management
    /// payloads mutate the owner registry
    fn self_call(
        &mut self,
        _value: U256,
        data: &[u8],
        gas: &mut GasMeter,
    ) -> Result<Vec<u8>, CallError> {
        gas.consume(CALL_GAS)?;
        if data.is_empty() {
            return Ok(Vec::new());
        }
        if !ManagementCall::matches(data) {
            return Err(CallError::Reverted("unknown self-call selector".to_string()));
        }

        let call = ManagementCall::decode(data).map_err(|e| CallError::Reverted(e.to_string()))?;
        gas.consume(SSTORE_GAS)?;
        let events = call
            .apply(self.account, self.owners)
            .map_err(|e| CallError::Reverted(e.to_string()))?;

        for event in events {
            debug!("Account {} management: {}", self.account, event);
            self.host.emit(self.account, event);
        }
        Ok(Vec::new())
    }

    /// Run a library's code in the account's own context
    fn delegate_call(
        &mut self,
        to: Address,
        data: &[u8],
        gas: &mut GasMeter,
    ) -> Result<Vec<u8>, CallError> {
        gas.consume(CALL_GAS)?;

        match self.host.library(to) {
            Some(Library::MultiSend) => {
                let batch = MultiSendBatch::decode_call(data)?;
                self.run_batch(&batch, gas)
            }
            None if !self.host.has_code(to) => Ok(Vec::new()),
            None => Err(CallError::UnsupportedDelegateCall(to)),
        }
    }

    /// All-or-nothing batch; account and host state are restored together
    fn run_batch(
        &mut self,
        batch: &MultiSendBatch,
        gas: &mut GasMeter,
    ) -> Result<Vec<u8>, CallError> {
        let owners_before = self.owners.clone();
        let approvals_before = self.approvals.clone();
        self.host.checkpoint();

        for (index, call) in batch.calls.iter().enumerate() {
            if let Err(e) = self.call(call.to, call.value, &call.data, gas) {
                warn!("Batch call {} to {} failed: {}", index, call.to, e);
                *self.owners = owners_before;
                *self.approvals = approvals_before;
                self.host.rollback();
                return Err(e);
            }
        }

        self.host.commit();
        Ok(Vec::new())
    }

    /// Pay the refund for `gas_used`, returning the amount paid
    ///
    /// Native refunds are priced at `min(gasPrice, tx_gas_price)`; token
    /// refunds at `gasPrice`.
    pub fn handle_payment(
        &mut self,
        tx: &SafeTransaction,
        gas_used: u64,
        submitter: Address,
        tx_gas_price: U256,
        gas: &mut GasMeter,
    ) -> Result<U256, CallError> {
        if !tx.pays_refund() {
            return Ok(U256::ZERO);
        }

        let receiver = if tx.refund_receiver.is_zero() {
            submitter
        } else {
            tx.refund_receiver
        };
        let units = U256::from(gas_used) + U256::from(tx.base_gas);

        if tx.gas_token.is_zero() {
            let price = tx.gas_price.min(tx_gas_price);
            let payment = units
                .checked_mul(price)
                .ok_or_else(|| CallError::Reverted("refund overflow".to_string()))?;
            let have = self.host.balance_of(self.account);
            if have < payment {
                return Err(CallError::InsufficientBalance {
                    have,
                    need: payment,
                });
            }
            self.call(receiver, payment, &[], gas)?;
            Ok(payment)
        } else {
            let payment = units
                .checked_mul(tx.gas_price)
                .ok_or_else(|| CallError::Reverted("refund overflow".to_string()))?;
            let data = IERC20::transferCall {
                to: receiver,
                amount: payment,
            }
            .abi_encode();
            let ret = self.call(tx.gas_token, U256::ZERO, &data, gas)?;

            // Tokens that return nothing are taken at their word
            if !ret.is_empty() {
                let ok = bool::abi_decode(&ret).unwrap_or(false);
                if !ok {
                    return Err(CallError::Reverted("token transfer returned false".to_string()));
                }
            }
            Ok(payment)
        }
    }
}
