//! Wallet module for owner keys and signing

pub mod wallet;

pub use wallet::{Wallet, WalletError, WalletInfo, WalletManager};
