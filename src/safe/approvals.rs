//! On-chain hash approvals
//!
//! An owner that cannot (or prefers not to) produce an off-chain signature
//! marks a transaction hash as approved with an authenticated call. The
//! flag is consulted by the signature validator for `v = 1` entries.

use crate::core::types::{Address, B256};
use crate::safe::error::SafeError;
use crate::safe::owners::OwnerRegistry;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Approved hashes, keyed by owner
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalStore {
    approved: BTreeMap<Address, BTreeSet<B256>>,
}

impl ApprovalStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `hash` approved by `caller`
    ///
    /// The caller identity comes from the calling context, so no signature
    /// is involved. Only current owners may approve.
    pub fn approve_hash(
        &mut self,
        owners: &OwnerRegistry,
        caller: Address,
        hash: B256,
    ) -> Result<(), SafeError> {
        if !owners.is_owner(&caller) {
            return Err(SafeError::NotAnOwner(caller));
        }
        self.approved.entry(caller).or_default().insert(hash);
        Ok(())
    }

    /// Clear the caller's own approval of `hash`
    ///
    /// Returns whether a flag was actually cleared. Nobody can clear
    /// another owner's approval.
    pub fn revoke_approval(&mut self, caller: Address, hash: &B256) -> bool {
        let Some(hashes) = self.approved.get_mut(&caller) else {
            return false;
        };
        let removed = hashes.remove(hash);
        if hashes.is_empty() {
            self.approved.remove(&caller);
        }
        removed
    }

    pub fn is_approved(&self, owner: &Address, hash: &B256) -> bool {
        self.approved
            .get(owner)
            .map(|hashes| hashes.contains(hash))
            .unwrap_or(false)
    }

    /// Number of (owner, hash) flags currently set
    pub fn len(&self) -> usize {
        self.approved.values().map(BTreeSet::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.approved.is_empty()
    }
}
