//! Owner wallets
//!
//! A wallet holds one owner key and produces the signature entries an
//! account accepts: direct ECDSA over the transaction hash, eth_sign, and
//! signatures over an EIP-712 typed-data document.

use crate::chain::Chain;
use crate::core::types::{Address, B256, U256};
use crate::crypto::{KeyError, KeyPair, SIGNATURE_LENGTH};
use crate::safe::hasher::TypedDataError;
use crate::safe::{SafeAccount, SafeTransaction, SafeTxTypedData};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Wallet-related errors
#[derive(Error, Debug)]
pub enum WalletError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
    #[error("Crypto error: {0}")]
    CryptoError(#[from] KeyError),
    #[error("Typed data error: {0}")]
    TypedData(#[from] TypedDataError),
    #[error("Wallet file {path} does not match its address {address}")]
    AddressMismatch { path: PathBuf, address: Address },
    #[error("No wallet labelled {0}")]
    LabelNotFound(String),
}

/// Serializable wallet data for persistence
#[derive(Debug, Serialize, Deserialize)]
struct WalletData {
    private_key_hex: String,
    address: Address,
    label: Option<String>,
    created_at: DateTime<Utc>,
}

/// An owner key with an optional label
pub struct Wallet {
    key_pair: KeyPair,
    pub label: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Wallet {
    /// Create a wallet with a fresh key pair
    pub fn new() -> Self {
        Self {
            key_pair: KeyPair::generate(),
            label: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_label(label: &str) -> Self {
        Self {
            label: Some(label.to_string()),
            ..Self::new()
        }
    }

    /// Import a wallet from a private key
    pub fn from_private_key(private_key_hex: &str) -> Result<Self, WalletError> {
        let key_pair = KeyPair::from_private_key_hex(private_key_hex)?;
        Ok(Self {
            key_pair,
            label: None,
            created_at: Utc::now(),
        })
    }

    pub fn address(&self) -> Address {
        self.key_pair.address()
    }

    pub fn public_key(&self) -> String {
        self.key_pair.public_key_hex()
    }

    /// Private key (hex). Keep this secret!
    pub fn private_key(&self) -> String {
        self.key_pair.private_key_hex()
    }

    pub fn key_pair(&self) -> &KeyPair {
        &self.key_pair
    }

    /// Native balance on `chain`
    pub fn balance(&self, chain: &Chain) -> U256 {
        chain.balance_of(self.address())
    }

    // =========================================================================
    // Signing
    // =========================================================================

    /// Sign the hash of `tx` as computed by `account`
    pub fn sign_transaction(
        &self,
        account: &SafeAccount,
        tx: &SafeTransaction,
    ) -> [u8; SIGNATURE_LENGTH] {
        self.key_pair.sign_hash(&account.get_transaction_hash(tx))
    }

    /// eth_sign over the hash of `tx`
    pub fn sign_transaction_eth(
        &self,
        account: &SafeAccount,
        tx: &SafeTransaction,
    ) -> [u8; SIGNATURE_LENGTH] {
        self.key_pair
            .sign_eth_message(&account.get_transaction_hash(tx))
    }

    /// Sign a typed-data document, returning the digest and the entry
    pub fn sign_typed_data(
        &self,
        typed: &SafeTxTypedData,
    ) -> Result<(B256, [u8; SIGNATURE_LENGTH]), WalletError> {
        let digest = typed.signing_hash()?;
        Ok((digest, self.key_pair.sign_hash(&digest)))
    }

    // =========================================================================
    // Files
    // =========================================================================

    pub fn save(&self, path: &Path) -> Result<(), WalletError> {
        let data = WalletData {
            private_key_hex: self.private_key(),
            address: self.address(),
            label: self.label.clone(),
            created_at: self.created_at,
        };

        let json = serde_json::to_string_pretty(&data)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Load a wallet file, checking the stored address against the key
    pub fn load(path: &Path) -> Result<Self, WalletError> {
        let json = fs::read_to_string(path)?;
        let data: WalletData = serde_json::from_str(&json)?;

        let mut wallet = Self::from_private_key(&data.private_key_hex)?;
        if wallet.address() != data.address {
            return Err(WalletError::AddressMismatch {
                path: path.to_path_buf(),
                address: data.address,
            });
        }
        wallet.label = data.label;
        wallet.created_at = data.created_at;
        Ok(wallet)
    }

    /// Export wallet info (without private key)
    pub fn export_public_info(&self) -> WalletInfo {
        WalletInfo {
            address: self.address(),
            public_key: self.public_key(),
            label: self.label.clone(),
            created_at: self.created_at,
        }
    }
}

impl Default for Wallet {
    fn default() -> Self {
        Self::new()
    }
}

/// Public wallet information (safe to share)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletInfo {
    pub address: Address,
    pub public_key: String,
    pub label: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Directory of wallet files named by address
pub struct WalletManager {
    wallets_dir: PathBuf,
}

impl WalletManager {
    pub fn new(wallets_dir: &Path) -> Result<Self, WalletError> {
        fs::create_dir_all(wallets_dir)?;
        Ok(Self {
            wallets_dir: wallets_dir.to_path_buf(),
        })
    }

    fn wallet_path(&self, address: &Address) -> PathBuf {
        self.wallets_dir.join(format!("{}.json", address))
    }

    /// Create and save a new wallet
    pub fn create_wallet(&self, label: Option<&str>) -> Result<Wallet, WalletError> {
        let wallet = match label {
            Some(l) => Wallet::with_label(l),
            None => Wallet::new(),
        };
        wallet.save(&self.wallet_path(&wallet.address()))?;
        Ok(wallet)
    }

    /// Save an imported wallet
    pub fn import_wallet(
        &self,
        private_key_hex: &str,
        label: Option<&str>,
    ) -> Result<Wallet, WalletError> {
        let mut wallet = Wallet::from_private_key(private_key_hex)?;
        wallet.label = label.map(str::to_string);
        wallet.save(&self.wallet_path(&wallet.address()))?;
        Ok(wallet)
    }

    /// All readable wallets, oldest first
    pub fn list_wallets(&self) -> Result<Vec<WalletInfo>, WalletError> {
        let mut wallets = Vec::new();

        for entry in fs::read_dir(&self.wallets_dir)? {
            let path = entry?.path();
            if path.extension().map(|e| e == "json").unwrap_or(false) {
                if let Ok(wallet) = Wallet::load(&path) {
                    wallets.push(wallet.export_public_info());
                }
            }
        }

        wallets.sort_by_key(|w| w.created_at);
        Ok(wallets)
    }

    pub fn load_wallet(&self, address: &Address) -> Result<Wallet, WalletError> {
        Wallet::load(&self.wallet_path(address))
    }

    /// Load by label, falling back to parsing `name` as an address
    pub fn find(&self, name: &str) -> Result<Wallet, WalletError> {
        if let Ok(address) = name.parse::<Address>() {
            return self.load_wallet(&address);
        }
        let info = self
            .list_wallets()?
            .into_iter()
            .find(|w| w.label.as_deref() == Some(name))
            .ok_or_else(|| WalletError::LabelNotFound(name.to_string()))?;
        self.load_wallet(&info.address)
    }

    pub fn delete_wallet(&self, address: &Address) -> Result<(), WalletError> {
        fs::remove_file(self.wallet_path(address))?;
        Ok(())
    }
}
