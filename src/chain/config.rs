//! Host configuration

use crate::core::gas::DEFAULT_GAS_LIMIT;
use serde::{Deserialize, Serialize};

/// Chain id used when none is configured
pub const DEFAULT_CHAIN_ID: u64 = 1337;

/// Nested message calls deeper than this fail
pub const MAX_CALL_DEPTH: usize = 1024;

/// Parameters of the in-memory host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainConfig {
    /// Bound into every account's domain separator
    pub chain_id: u64,
    /// Upper bound for the gas of a single transaction
    pub block_gas_limit: u64,
}

impl ChainConfig {
    pub fn new(chain_id: u64) -> Self {
        Self {
            chain_id,
            ..Self::default()
        }
    }

    /// Clamp a requested transaction gas limit to the block limit
    pub fn clamp_gas(&self, requested: u64) -> u64 {
        requested.min(self.block_gas_limit)
    }
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            chain_id: DEFAULT_CHAIN_ID,
            block_gas_limit: DEFAULT_GAS_LIMIT,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ChainConfig::default();
        assert_eq!(config.chain_id, DEFAULT_CHAIN_ID);
        assert_eq!(config.block_gas_limit, DEFAULT_GAS_LIMIT);
    }

    #[test]
    fn test_clamp_gas() {
        let config = ChainConfig::new(5);
        assert_eq!(config.chain_id, 5);
        assert_eq!(config.clamp_gas(100), 100);
        assert_eq!(config.clamp_gas(u64::MAX), DEFAULT_GAS_LIMIT);
    }
}
