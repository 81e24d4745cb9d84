//! Core building blocks shared by the engine and its host
//!
//! This module contains:
//! - Identity, hash and amount primitives (`Address`, `B256`, `U256`)
//! - The `sol!` declarations of every call payload
//! - The gas schedule and `GasMeter`

pub mod abi;
pub mod gas;
pub mod types;

pub use abi::{AbiError, IConfidentialERC20, IMultiSend, ISafe, SafeTx, Share, IERC20};
pub use gas::{GasError, GasMeter, DEFAULT_GAS_LIMIT};
pub use types::{Address, Bytes, ParseError, B256, SENTINEL, U256};
