//! Gas schedule and metering
//!
//! Every state transition is charged against a `GasMeter`. Costs follow
//! the EVM's order of magnitude so stipends, refunds and the pre-execution
//! sufficiency check behave like they do on-chain.

use serde::{Deserialize, Serialize};
use thiserror::Error;

// =============================================================================
// Gas Schedule
// =============================================================================

/// Intrinsic cost of any submitted transaction
pub const TX_BASE_GAS: u64 = 21_000;

/// Calldata cost per zero byte
pub const CALLDATA_ZERO_BYTE_GAS: u64 = 4;

/// Calldata cost per non-zero byte
pub const CALLDATA_BYTE_GAS: u64 = 16;

/// Base cost of a message call
pub const CALL_GAS: u64 = 700;

/// Surcharge for a call that moves value
pub const CALL_VALUE_GAS: u64 = 9_000;

/// Storage read
pub const SLOAD_GAS: u64 = 2_100;

/// Storage write
pub const SSTORE_GAS: u64 = 5_000;

/// Signer recovery (ecrecover precompile)
pub const ECRECOVER_GAS: u64 = 3_000;

/// Keccak-256 base cost
pub const KECCAK_GAS: u64 = 30;

/// Keccak-256 cost per 32-byte word
pub const KECCAK_WORD_GAS: u64 = 6;

/// Log emission base cost
pub const LOG_GAS: u64 = 375;

/// Gas held back so the account can finish bookkeeping after the inner call
pub const POST_CALL_RESERVE: u64 = 2_500;

/// Extra head-room required on top of the stipend before executing
pub const PRE_CALL_MARGIN: u64 = 500;

/// Default gas limit for a submitted transaction
pub const DEFAULT_GAS_LIMIT: u64 = 10_000_000;

/// Cost of hashing `len` bytes
pub fn keccak_cost(len: usize) -> u64 {
    KECCAK_GAS + KECCAK_WORD_GAS * ((len as u64 + 31) / 32)
}

/// Intrinsic cost of submitting the given call data
pub fn calldata_cost(data: &[u8]) -> u64 {
    data.iter()
        .map(|b| {
            if *b == 0 {
                CALLDATA_ZERO_BYTE_GAS
            } else {
                CALLDATA_BYTE_GAS
            }
        })
        .sum()
}

/// Minimum gas that must remain before an inner call with `safe_tx_gas`
/// can be honoured (EIP-150 leaves 1/64 behind in the caller).
pub fn required_for_stipend(safe_tx_gas: u64) -> u64 {
    let by_fraction = safe_tx_gas.saturating_mul(64) / 63;
    let by_reserve = safe_tx_gas.saturating_add(POST_CALL_RESERVE);
    by_fraction.max(by_reserve).saturating_add(PRE_CALL_MARGIN)
}

// =============================================================================
// Gas Meter
// =============================================================================

/// Gas errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GasError {
    #[error("Out of gas: need {need}, remaining {remaining}")]
    OutOfGas { need: u64, remaining: u64 },
}

/// Tracks gas consumption against a limit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GasMeter {
    limit: u64,
    used: u64,
}

impl GasMeter {
    /// Create a meter with the given limit
    pub fn new(limit: u64) -> Self {
        Self { limit, used: 0 }
    }

    /// Consume gas, failing without charging if not enough remains
    pub fn consume(&mut self, amount: u64) -> Result<(), GasError> {
        let remaining = self.remaining();
        if remaining < amount {
            return Err(GasError::OutOfGas {
                need: amount,
                remaining,
            });
        }
        self.used += amount;
        Ok(())
    }

    /// Burn everything that is left (an out-of-gas frame keeps nothing)
    pub fn exhaust(&mut self) {
        self.used = self.limit;
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }

    pub fn used(&self) -> u64 {
        self.used
    }

    pub fn remaining(&self) -> u64 {
        self.limit - self.used
    }

    /// Carve out a child meter with at most `stipend` gas
    pub fn child(&self, stipend: u64) -> GasMeter {
        GasMeter::new(stipend.min(self.remaining()))
    }

    /// Charge this meter for what a child frame consumed
    pub fn absorb(&mut self, child: &GasMeter) {
        // A child never holds more than the parent had left
        self.used = (self.used + child.used()).min(self.limit);
    }
}
