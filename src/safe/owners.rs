//! Owner registry
//!
//! Holds the ordered owner list and the M-of-N threshold. The list is
//! ordered most-recently-added first; mutators that target an existing
//! owner take the owner preceding it (`prev_owner`, or the sentinel for
//! the head of the list) so a stale view of the list cannot edit the
//! wrong slot.
//!
//! Every mutator validates completely before writing anything.

use crate::core::types::{Address, SENTINEL};
use crate::safe::error::SafeError;
use serde::{Deserialize, Serialize};

/// Current owner set and threshold of an account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerRegistry {
    owners: Vec<Address>,
    threshold: usize,
}

impl OwnerRegistry {
    /// Create a registry for `account`
    ///
    /// # Errors
    /// Fails on an empty owner list, a threshold outside `1..=N`, duplicate
    /// owners, or owners equal to the zero, sentinel or account address.
    pub fn setup(
        account: Address,
        owners: Vec<Address>,
        threshold: usize,
    ) -> Result<Self, SafeError> {
        if threshold > owners.len() {
            return Err(SafeError::ThresholdInvariantViolated(format!(
                "threshold {} exceeds owner count {}",
                threshold,
                owners.len()
            )));
        }
        if threshold == 0 {
            return Err(SafeError::ThresholdInvariantViolated(
                "threshold must be at least 1".to_string(),
            ));
        }

        for (i, owner) in owners.iter().enumerate() {
            Self::check_owner_address(account, *owner)?;
            if owners[..i].contains(owner) {
                return Err(SafeError::DuplicateOwner(*owner));
            }
        }

        Ok(Self { owners, threshold })
    }

    fn check_owner_address(account: Address, owner: Address) -> Result<(), SafeError> {
        if owner.is_zero() || owner == SENTINEL || owner == account {
            return Err(SafeError::InvalidOwner(owner));
        }
        Ok(())
    }

    /// Owners, most recently added first
    pub fn owners(&self) -> &[Address] {
        &self.owners
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    pub fn owner_count(&self) -> usize {
        self.owners.len()
    }

    pub fn is_owner(&self, id: &Address) -> bool {
        // The sentinel is never an owner, even if someone asks
        *id != SENTINEL && self.owners.contains(id)
    }

    /// Get description like "2-of-3"
    pub fn description(&self) -> String {
        format!("{}-of-{}", self.threshold, self.owners.len())
    }

    /// Index of `owner`, verifying `prev_owner` precedes it
    fn linked_index(&self, prev_owner: Address, owner: Address) -> Result<usize, SafeError> {
        let index = self
            .owners
            .iter()
            .position(|o| *o == owner)
            .ok_or(SafeError::NotAnOwner(owner))?;

        let expected_prev = if index == 0 {
            SENTINEL
        } else {
            self.owners[index - 1]
        };
        if expected_prev != prev_owner {
            return Err(SafeError::InvalidPrevOwner {
                prev: prev_owner,
                owner,
            });
        }
        Ok(index)
    }

    fn check_threshold(threshold: usize, owner_count: usize) -> Result<(), SafeError> {
        if threshold == 0 {
            return Err(SafeError::ThresholdInvariantViolated(
                "threshold must be at least 1".to_string(),
            ));
        }
        if threshold > owner_count {
            return Err(SafeError::ThresholdInvariantViolated(format!(
                "threshold {} exceeds owner count {}",
                threshold, owner_count
            )));
        }
        Ok(())
    }

    // =========================================================================
    // Mutators (reached only through authorized self-calls)
    // =========================================================================

    /// Add `owner` at the head of the list and set a new threshold
    pub fn add_owner_with_threshold(
        &mut self,
        account: Address,
        owner: Address,
        threshold: usize,
    ) -> Result<(), SafeError> {
        Self::check_owner_address(account, owner)?;
        if self.owners.contains(&owner) {
            return Err(SafeError::DuplicateOwner(owner));
        }
        Self::check_threshold(threshold, self.owners.len() + 1)?;

        self.owners.insert(0, owner);
        self.threshold = threshold;
        Ok(())
    }

    /// Remove `owner` (preceded by `prev_owner`) and set a new threshold
    pub fn remove_owner(
        &mut self,
        prev_owner: Address,
        owner: Address,
        threshold: usize,
    ) -> Result<(), SafeError> {
        let index = self.linked_index(prev_owner, owner)?;
        Self::check_threshold(threshold, self.owners.len() - 1)?;

        self.owners.remove(index);
        self.threshold = threshold;
        Ok(())
    }

    /// Replace `old_owner` (preceded by `prev_owner`) with `new_owner` in place
    pub fn swap_owner(
        &mut self,
        account: Address,
        prev_owner: Address,
        old_owner: Address,
        new_owner: Address,
    ) -> Result<(), SafeError> {
        Self::check_owner_address(account, new_owner)?;
        if self.owners.contains(&new_owner) {
            return Err(SafeError::DuplicateOwner(new_owner));
        }
        let index = self.linked_index(prev_owner, old_owner)?;

        self.owners[index] = new_owner;
        Ok(())
    }

    /// Set a new threshold for the current owner set
    pub fn change_threshold(&mut self, threshold: usize) -> Result<(), SafeError> {
        Self::check_threshold(threshold, self.owners.len())?;
        self.threshold = threshold;
        Ok(())
    }
}
