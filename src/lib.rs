//! Safe Engine: multi-owner transaction authorization and execution in Rust
//!
//! This crate provides an M-of-N account ("Safe") featuring:
//! - Canonical EIP-712 transaction hashing bound to chain and account
//! - Signature bundles mixing ECDSA, eth_sign and on-chain approvals
//! - Single-use nonces for replay protection
//! - Inner-call execution with gas stipend and refunds
//! - Owner and threshold management through authorized self-calls
//! - An in-memory chain with ERC-20, confidential token and MultiSend
//!   contracts to execute against
//! - JSON persistence and owner wallets on disk
//!
//! # Example
//!
//! ```rust
//! use safe_engine::chain::Chain;
//! use safe_engine::core::{types::address_from_low_u64, DEFAULT_GAS_LIMIT, U256};
//! use safe_engine::crypto::KeyPair;
//! use safe_engine::safe::{SafeTransaction, SignatureBundle};
//!
//! let mut chain = Chain::default();
//! let alice = KeyPair::generate();
//! let bob = KeyPair::generate();
//!
//! // A 1-of-2 account holding some native currency
//! let safe = chain
//!     .deploy_safe(alice.address(), vec![alice.address(), bob.address()], 1)
//!     .unwrap();
//! chain.credit(safe, U256::from(5_000)).unwrap();
//!
//! // Alice authorizes a transfer; anyone may submit it
//! let recipient = address_from_low_u64(0x1234);
//! let tx = SafeTransaction::call(recipient, U256::from(1_000), vec![], 0);
//! let hash = chain.safe(safe).unwrap().get_transaction_hash(&tx);
//! let signatures = SignatureBundle::new().sign(&alice, &hash).encode();
//!
//! let outcome = chain
//!     .exec_transaction(bob.address(), safe, &tx, &signatures, DEFAULT_GAS_LIMIT, U256::ZERO)
//!     .unwrap();
//! assert!(outcome.success);
//! assert_eq!(chain.balance_of(recipient), U256::from(1_000));
//! ```

pub mod chain;
pub mod cli;
pub mod core;
pub mod crypto;
pub mod safe;
pub mod storage;
pub mod token;
pub mod wallet;

// Re-export commonly used types
pub use chain::{Chain, ChainConfig, ChainError};
pub use core::{Address, GasMeter, B256, U256};
pub use crypto::KeyPair;
pub use safe::{
    CallHost, ExecutionOutcome, Operation, SafeAccount, SafeError, SafeTransaction,
    SafeTransactionBuilder, SignatureBundle,
};
pub use storage::{Storage, StorageConfig};
pub use token::{ConfidentialToken, Erc20Token, TokenMetadata};
pub use wallet::Wallet;
