//! Replay guard

use crate::safe::error::SafeError;
use serde::{Deserialize, Serialize};

/// Strictly increasing per-account nonce
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NonceManager {
    next: u64,
}

impl NonceManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// The nonce the next transaction must carry
    pub fn current(&self) -> u64 {
        self.next
    }

    /// Consume `expected`, returning it
    ///
    /// Fails with `NonceMismatch` unless `expected` is the current nonce.
    pub fn consume(&mut self, expected: u64) -> Result<u64, SafeError> {
        if expected != self.next {
            return Err(SafeError::NonceMismatch {
                expected: self.next,
                actual: expected,
            });
        }
        self.next += 1;
        Ok(expected)
    }
}
