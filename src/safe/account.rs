//! The multi-owner account
//!
//! `SafeAccount` owns the entire durable state of an account (owners,
//! threshold, nonce and approvals) and exposes the external surface:
//! transaction execution, hash queries, hash approvals and owner
//! introspection. Execution order is fixed:
//!
//! 1. nonce check
//! 2. hash
//! 3. signature validation against the threshold
//! 4. gas sufficiency check
//! 5. nonce consumption
//! 6. inner call (failure recorded, not propagated)
//! 7. refund (failure recorded, not propagated)
//!
//! Any failure in steps 1–5 returns `Err` with no state changed.

use crate::core::abi::{to_u64, AbiError, ISafe};
use crate::core::gas::{
    keccak_cost, required_for_stipend, GasMeter, ECRECOVER_GAS, POST_CALL_RESERVE, SSTORE_GAS,
};
use crate::core::types::{Address, Bytes, B256, U256};
use crate::crypto::SIGNATURE_LENGTH;
use crate::safe::approvals::ApprovalStore;
use crate::safe::error::SafeError;
use crate::safe::events::SafeEvent;
use crate::safe::executor::{CallError, CallHost, ExecutionFrame};
use crate::safe::hasher::{SafeTxTypedData, TransactionHasher};
use crate::safe::management::ManagementCall;
use crate::safe::nonce::NonceManager;
use crate::safe::owners::OwnerRegistry;
use crate::safe::signatures::SignatureValidator;
use crate::safe::transaction::{Operation, SafeTransaction};
use alloy_sol_types::{SolCall, SolInterface, SolValue};
use log::{info, warn};
use serde::{Deserialize, Serialize};

/// Who submits a transaction, and at what price they paid for gas
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionContext {
    pub sender: Address,
    pub gas_price: U256,
}

impl ExecutionContext {
    pub fn new(sender: Address, gas_price: U256) -> Self {
        Self { sender, gas_price }
    }
}

/// Result of an authorized execution
///
/// `success` is the inner call's result. The transaction itself succeeded
/// (and consumed its nonce) whenever an outcome is returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionOutcome {
    pub tx_hash: B256,
    pub nonce: u64,
    pub success: bool,
    pub return_data: Vec<u8>,
    pub payment: U256,
    pub gas_used: u64,
    pub inner_error: Option<SafeError>,
    pub refund_error: Option<SafeError>,
}

/// A deployed multi-owner account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafeAccount {
    address: Address,
    chain_id: u64,
    owners: OwnerRegistry,
    nonce: NonceManager,
    approvals: ApprovalStore,
}

impl SafeAccount {
    /// Set up an account at `address` with its initial owners
    pub fn new(
        address: Address,
        chain_id: u64,
        owners: Vec<Address>,
        threshold: usize,
    ) -> Result<Self, SafeError> {
        let owners = OwnerRegistry::setup(address, owners, threshold)?;
        Ok(Self {
            address,
            chain_id,
            owners,
            nonce: NonceManager::new(),
            approvals: ApprovalStore::new(),
        })
    }

    /// Event describing the initial setup
    pub fn setup_event(&self) -> SafeEvent {
        SafeEvent::SafeSetup {
            owners: self.owners.owners().to_vec(),
            threshold: self.owners.threshold(),
        }
    }

    // =========================================================================
    // Introspection
    // =========================================================================

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    pub fn owners(&self) -> &[Address] {
        self.owners.owners()
    }

    pub fn threshold(&self) -> usize {
        self.owners.threshold()
    }

    pub fn is_owner(&self, id: &Address) -> bool {
        self.owners.is_owner(id)
    }

    pub fn registry(&self) -> &OwnerRegistry {
        &self.owners
    }

    /// The nonce the next transaction must carry
    pub fn nonce(&self) -> u64 {
        self.nonce.current()
    }

    // =========================================================================
    // Hashing
    // =========================================================================

    pub fn hasher(&self) -> TransactionHasher {
        TransactionHasher::new(self.chain_id, self.address)
    }

    pub fn domain_separator(&self) -> B256 {
        self.hasher().domain_separator()
    }

    /// Hash owners sign for `tx` (pure; the nonce is taken from `tx`)
    pub fn get_transaction_hash(&self, tx: &SafeTransaction) -> B256 {
        self.hasher().hash(tx)
    }

    pub fn encode_transaction_data(&self, tx: &SafeTransaction) -> Vec<u8> {
        self.hasher().encode_transaction_data(tx)
    }

    /// EIP-712 typed data for wallet signing UIs
    pub fn typed_data(&self, tx: &SafeTransaction) -> SafeTxTypedData {
        self.hasher().typed_data(tx)
    }

    // =========================================================================
    // Approvals
    // =========================================================================

    /// Record that `caller` approves `hash`
    pub fn approve_hash(&mut self, caller: Address, hash: B256) -> Result<SafeEvent, SafeError> {
        self.approvals.approve_hash(&self.owners, caller, hash)?;
        Ok(SafeEvent::ApproveHash {
            approved_hash: hash,
            owner: caller,
        })
    }

    /// Clear `caller`'s approval of `hash`; `None` if there was none
    pub fn revoke_approval(&mut self, caller: Address, hash: B256) -> Option<SafeEvent> {
        self.approvals
            .revoke_approval(caller, &hash)
            .then_some(SafeEvent::ApprovalRevoked {
                approved_hash: hash,
                owner: caller,
            })
    }

    pub fn is_approved(&self, owner: &Address, hash: &B256) -> bool {
        self.approvals.is_approved(owner, hash)
    }

    // =========================================================================
    // Execution
    // =========================================================================

    /// Execute an authorized transaction
    ///
    /// Returns `Err` (state unchanged) when the transaction is not
    /// authorized or cannot be attempted. Once the nonce is consumed an
    /// outcome is always returned, whatever the inner call did.
    pub fn exec_transaction(
        &mut self,
        host: &mut dyn CallHost,
        ctx: &ExecutionContext,
        tx: &SafeTransaction,
        signatures: &[u8],
        gas: &mut GasMeter,
    ) -> Result<ExecutionOutcome, SafeError> {
        let expected = self.nonce.current();
        if tx.nonce != expected {
            return Err(SafeError::NonceMismatch {
                expected,
                actual: tx.nonce,
            });
        }
        let start_used = gas.used();

        gas.consume(keccak_cost(tx.data.len()) + keccak_cost(66))?;
        let tx_hash = self.get_transaction_hash(tx);

        let entries = (signatures.len() / SIGNATURE_LENGTH) as u64;
        gas.consume(ECRECOVER_GAS * entries)?;
        SignatureValidator::new(&self.owners, &self.approvals)
            .with_submitter(ctx.sender)
            .validate(&tx_hash, signatures, self.owners.threshold())?;

        gas.consume(SSTORE_GAS)?;
        let required = required_for_stipend(tx.safe_tx_gas);
        if gas.remaining() < required {
            return Err(SafeError::InsufficientGas {
                required,
                available: gas.remaining(),
            });
        }

        let nonce = self.nonce.consume(tx.nonce)?;

        // From here on nothing may return Err
        let mut frame = ExecutionFrame {
            account: self.address,
            owners: &mut self.owners,
            approvals: &mut self.approvals,
            host,
        };

        let stipend = if tx.safe_tx_gas == 0 {
            gas.remaining().saturating_sub(POST_CALL_RESERVE)
        } else {
            tx.safe_tx_gas
        };
        let mut inner_gas = gas.child(stipend);
        let result = frame.execute(tx.to, tx.value, &tx.data, tx.operation, &mut inner_gas);
        if matches!(result, Err(CallError::OutOfGas)) {
            inner_gas.exhaust();
        }
        gas.absorb(&inner_gas);

        let (success, return_data, inner_error) = match result {
            Ok(data) => (true, data, None),
            Err(e) => {
                warn!("Inner call of {} failed: {}", tx_hash, e);
                (false, Vec::new(), Some(SafeError::InnerCallFailed(e.to_string())))
            }
        };

        let gas_used = gas.used() - start_used;
        let (payment, refund_error) =
            match frame.handle_payment(tx, gas_used, ctx.sender, ctx.gas_price, gas) {
                Ok(payment) => (payment, None),
                Err(e) => {
                    let receiver = if tx.refund_receiver.is_zero() {
                        ctx.sender
                    } else {
                        tx.refund_receiver
                    };
                    warn!("Refund for {} to {} failed: {}", tx_hash, receiver, e);
                    frame.host.emit(
                        self.address,
                        SafeEvent::RefundFailed {
                            tx_hash,
                            receiver,
                            reason: e.to_string(),
                        },
                    );
                    (U256::ZERO, Some(SafeError::RefundTransferFailed(e.to_string())))
                }
            };

        let event = if success {
            SafeEvent::ExecutionSuccess { tx_hash, payment }
        } else {
            SafeEvent::ExecutionFailure { tx_hash, payment }
        };
        frame.host.emit(self.address, event);

        info!(
            "Account {} executed nonce {} ({}): success={}, gas used {}, payment {}",
            self.address, nonce, tx_hash, success, gas_used, payment
        );

        Ok(ExecutionOutcome {
            tx_hash,
            nonce,
            success,
            return_data,
            payment,
            gas_used,
            inner_error,
            refund_error,
        })
    }

    // =========================================================================
    // Calls from other identities
    // =========================================================================

    /// Handle a message call made to the account by `caller`
    ///
    /// The host has already credited any `value`. Management selectors are
    /// only reachable through `exec_transaction` and are refused here.
    /// `execTransaction` runs against `gas` with `caller` as the submitter,
    /// which lets an account that owns another account drive it.
    pub fn handle_external_call(
        &mut self,
        host: &mut dyn CallHost,
        caller: Address,
        value: U256,
        data: &[u8],
        gas: &mut GasMeter,
    ) -> Result<Vec<u8>, SafeError> {
        if data.is_empty() {
            if !value.is_zero() {
                host.emit(
                    self.address,
                    SafeEvent::SafeReceived {
                        sender: caller,
                        value,
                    },
                );
            }
            return Ok(Vec::new());
        }
        if ManagementCall::matches(data) {
            return Err(SafeError::Unauthorized);
        }

        let call = ISafe::ISafeCalls::abi_decode(data).map_err(AbiError::from)?;
        let ret = match call {
            ISafe::ISafeCalls::execTransaction(call) => {
                let tx = self.transaction_from_call(&call)?;
                let ctx = ExecutionContext::new(caller, host.tx_gas_price());
                let outcome = self.exec_transaction(host, &ctx, &tx, &call.signatures, gas)?;
                outcome.success.abi_encode()
            }
            ISafe::ISafeCalls::approveHash(call) => {
                let event = self.approve_hash(caller, call.hashToApprove)?;
                host.emit(self.address, event);
                Vec::new()
            }
            ISafe::ISafeCalls::revokeApprovedHash(call) => {
                if let Some(event) = self.revoke_approval(caller, call.hashToRevoke) {
                    host.emit(self.address, event);
                }
                Vec::new()
            }
            ISafe::ISafeCalls::approvedHashes(call) => {
                U256::from(self.is_approved(&call.owner, &call.hash) as u8).abi_encode()
            }
            ISafe::ISafeCalls::getThreshold(_) => U256::from(self.threshold()).abi_encode(),
            ISafe::ISafeCalls::nonce(_) => U256::from(self.nonce()).abi_encode(),
            ISafe::ISafeCalls::getOwners(_) => self.owners().to_vec().abi_encode(),
            ISafe::ISafeCalls::isOwner(call) => self.is_owner(&call.owner).abi_encode(),
            ISafe::ISafeCalls::domainSeparator(_) => self.domain_separator().abi_encode(),
            ISafe::ISafeCalls::addOwnerWithThreshold(_)
            | ISafe::ISafeCalls::removeOwner(_)
            | ISafe::ISafeCalls::swapOwner(_)
            | ISafe::ISafeCalls::changeThreshold(_) => return Err(SafeError::Unauthorized),
        };
        Ok(ret)
    }

    /// The transaction an `execTransaction` payload proposes at the current nonce
    fn transaction_from_call(
        &self,
        call: &ISafe::execTransactionCall,
    ) -> Result<SafeTransaction, SafeError> {
        let operation = Operation::from_u8(call.operation).ok_or_else(|| {
            AbiError::Decode(format!("invalid operation {}", call.operation))
        })?;
        Ok(SafeTransaction {
            to: call.to,
            value: call.value,
            data: call.data.to_vec(),
            operation,
            safe_tx_gas: to_u64(call.safeTxGas)?,
            base_gas: to_u64(call.baseGas)?,
            gas_price: call.gasPrice,
            gas_token: call.gasToken,
            refund_receiver: call.refundReceiver,
            nonce: self.nonce(),
        })
    }
}

/// Call data submitting `tx` with `signatures` to an account
///
/// The nonce is not part of the payload; the account uses its current one.
pub fn encode_exec_transaction(tx: &SafeTransaction, signatures: &[u8]) -> Vec<u8> {
    ISafe::execTransactionCall {
        to: tx.to,
        value: tx.value,
        data: Bytes::from(tx.data.clone()),
        operation: tx.operation.as_u8(),
        safeTxGas: U256::from(tx.safe_tx_gas),
        baseGas: U256::from(tx.base_gas),
        gasPrice: tx.gas_price,
        gasToken: tx.gas_token,
        refundReceiver: tx.refund_receiver,
        signatures: Bytes::from(signatures.to_vec()),
    }
    .abi_encode()
}
