//! Owner management calls
//!
//! Owner and threshold changes have no entry point of their own. They are
//! ordinary ABI payloads of a transaction the account sends to itself, and
//! the executor decodes them here after the transaction was authorized.

use crate::core::abi::{selector_of, AbiError, ISafe};
use crate::core::types::{Address, U256};
use crate::safe::error::SafeError;
use crate::safe::events::SafeEvent;
use crate::safe::owners::OwnerRegistry;
use alloy_sol_types::{SolCall, SolInterface};

/// A decoded owner/threshold mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManagementCall {
    AddOwnerWithThreshold {
        owner: Address,
        threshold: usize,
    },
    RemoveOwner {
        prev_owner: Address,
        owner: Address,
        threshold: usize,
    },
    SwapOwner {
        prev_owner: Address,
        old_owner: Address,
        new_owner: Address,
    },
    ChangeThreshold {
        threshold: usize,
    },
}

impl ManagementCall {
    /// Whether `data` starts with one of the management selectors
    pub fn matches(data: &[u8]) -> bool {
        match selector_of(data) {
            Ok(sel) => [
                ISafe::addOwnerWithThresholdCall::SELECTOR,
                ISafe::removeOwnerCall::SELECTOR,
                ISafe::swapOwnerCall::SELECTOR,
                ISafe::changeThresholdCall::SELECTOR,
            ]
            .contains(&sel),
            Err(_) => false,
        }
    }

    /// Decode a management payload
    pub fn decode(data: &[u8]) -> Result<Self, SafeError> {
        use ISafe::ISafeCalls;

        let call = match ISafeCalls::abi_decode(data).map_err(AbiError::from)? {
            ISafeCalls::addOwnerWithThreshold(call) => ManagementCall::AddOwnerWithThreshold {
                owner: call.owner,
                threshold: to_threshold(call._threshold)?,
            },
            ISafeCalls::removeOwner(call) => ManagementCall::RemoveOwner {
                prev_owner: call.prevOwner,
                owner: call.owner,
                threshold: to_threshold(call._threshold)?,
            },
            ISafeCalls::swapOwner(call) => ManagementCall::SwapOwner {
                prev_owner: call.prevOwner,
                old_owner: call.oldOwner,
                new_owner: call.newOwner,
            },
            ISafeCalls::changeThreshold(call) => ManagementCall::ChangeThreshold {
                threshold: to_threshold(call._threshold)?,
            },
            _ => return Err(AbiError::UnknownSelector(selector_of(data)?).into()),
        };
        Ok(call)
    }

    /// ABI payload for a self-call
    pub fn encode(&self) -> Vec<u8> {
        match *self {
            ManagementCall::AddOwnerWithThreshold { owner, threshold } => {
                ISafe::addOwnerWithThresholdCall {
                    owner,
                    _threshold: U256::from(threshold),
                }
                .abi_encode()
            }
            ManagementCall::RemoveOwner {
                prev_owner,
                owner,
                threshold,
            } => ISafe::removeOwnerCall {
                prevOwner: prev_owner,
                owner,
                _threshold: U256::from(threshold),
            }
            .abi_encode(),
            ManagementCall::SwapOwner {
                prev_owner,
                old_owner,
                new_owner,
            } => ISafe::swapOwnerCall {
                prevOwner: prev_owner,
                oldOwner: old_owner,
                newOwner: new_owner,
            }
            .abi_encode(),
            ManagementCall::ChangeThreshold { threshold } => ISafe::changeThresholdCall {
                _threshold: U256::from(threshold),
            }
            .abi_encode(),
        }
    }

    /// Apply to `owners`, returning the events describing the change
    ///
    /// On error `owners` is untouched.
    pub fn apply(
        &self,
        account: Address,
        owners: &mut OwnerRegistry,
    ) -> Result<Vec<SafeEvent>, SafeError> {
        let previous_threshold = owners.threshold();
        let mut events = Vec::new();

        match *self {
            ManagementCall::AddOwnerWithThreshold { owner, threshold } => {
                owners.add_owner_with_threshold(account, owner, threshold)?;
                events.push(SafeEvent::AddedOwner { owner });
            }
            ManagementCall::RemoveOwner {
                prev_owner,
                owner,
                threshold,
            } => {
                owners.remove_owner(prev_owner, owner, threshold)?;
                events.push(SafeEvent::RemovedOwner { owner });
            }
            ManagementCall::SwapOwner {
                prev_owner,
                old_owner,
                new_owner,
            } => {
                owners.swap_owner(account, prev_owner, old_owner, new_owner)?;
                events.push(SafeEvent::RemovedOwner { owner: old_owner });
                events.push(SafeEvent::AddedOwner { owner: new_owner });
            }
            ManagementCall::ChangeThreshold { threshold } => {
                owners.change_threshold(threshold)?;
            }
        }

        if owners.threshold() != previous_threshold
            || matches!(self, ManagementCall::ChangeThreshold { .. })
        {
            events.push(SafeEvent::ChangedThreshold {
                threshold: owners.threshold(),
            });
        }
        Ok(events)
    }
}

fn to_threshold(value: U256) -> Result<usize, SafeError> {
    u64::try_from(value)
        .ok()
        .and_then(|v| usize::try_from(v).ok())
        .ok_or_else(|| {
            SafeError::ThresholdInvariantViolated(format!("threshold {} out of range", value))
        })
}
