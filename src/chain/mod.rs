//! In-memory execution host
//!
//! This module provides:
//! - `Chain`, the world state accounts execute on (balances, contracts,
//!   event log, checkpoints)
//! - `ChainConfig` with chain id and gas limits
//! - Message call dispatch to tokens, accounts and the MultiSend library

pub mod config;
pub mod events;
pub mod state;

#[cfg(test)]
mod scenarios;

pub use config::{ChainConfig, DEFAULT_CHAIN_ID, MAX_CALL_DEPTH};
pub use events::{ChainEvent, LogEntry};
pub use state::{Chain, ChainError, ChainStats, Contract};
