//! CLI commands for the account engine
//!
//! Implements all command handlers for the CLI interface. Every handler
//! works on [`AppState`], which loads the chain from the data directory
//! and is saved again after mutating commands.

use crate::chain::{Chain, ChainConfig, ChainEvent, Contract};
use crate::core::abi::IERC20;
use crate::core::types::{parse_hex_bytes, parse_u256, Address, B256, U256};
use crate::crypto::SIGNATURE_LENGTH;
use crate::safe::{Operation, SafeTransaction, SafeTransactionBuilder, SignatureBundle};
use crate::storage::{Storage, StorageConfig};
use crate::wallet::WalletManager;
use alloy_sol_types::SolCall;
use clap::Args;
use std::path::{Path, PathBuf};

/// Result type for CLI operations
pub type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

/// Application state
pub struct AppState {
    pub chain: Chain,
    pub storage: Storage,
    pub wallet_manager: WalletManager,
    pub data_dir: PathBuf,
}

impl AppState {
    /// Load the chain and wallets under `data_dir`
    pub fn new(data_dir: PathBuf) -> CliResult<Self> {
        let storage = Storage::new(StorageConfig {
            data_dir: data_dir.clone(),
            ..Default::default()
        })?;
        let wallet_manager = WalletManager::new(&data_dir.join("wallets"))?;

        let chain = if storage.exists() {
            storage.load()?
        } else {
            println!("🆕 No chain found, starting a new one");
            let chain = Chain::default();
            storage.save(&chain)?;
            chain
        };

        Ok(Self {
            chain,
            storage,
            wallet_manager,
            data_dir,
        })
    }

    pub fn save(&self) -> CliResult<()> {
        self.storage.save(&self.chain)?;
        Ok(())
    }

    /// Resolve a wallet label or a literal address
    pub fn resolve(&self, name: &str) -> CliResult<Address> {
        if let Ok(address) = name.parse::<Address>() {
            return Ok(address);
        }
        Ok(self.wallet_manager.find(name)?.address())
    }
}

/// Fields of a transaction as given on the command line
#[derive(Args, Debug, Clone)]
pub struct TxArgs {
    /// Destination (address or wallet label)
    #[arg(long)]
    pub to: String,

    /// Native value to send
    #[arg(long, default_value = "0", value_parser = parse_u256)]
    pub value: U256,

    /// Call data as hex
    #[arg(long)]
    pub data: Option<String>,

    /// Use a delegate call instead of a call
    #[arg(long)]
    pub delegate: bool,

    #[arg(long, default_value = "0")]
    pub safe_tx_gas: u64,

    #[arg(long, default_value = "0")]
    pub base_gas: u64,

    /// Refund price per gas unit (0 disables refunds)
    #[arg(long, default_value = "0", value_parser = parse_u256)]
    pub gas_price: U256,

    /// Refund token (native currency when omitted)
    #[arg(long)]
    pub gas_token: Option<String>,

    /// Refund receiver (the submitter when omitted)
    #[arg(long)]
    pub refund_receiver: Option<String>,

    /// Nonce (the account's current nonce when omitted)
    #[arg(long)]
    pub nonce: Option<u64>,
}

impl TxArgs {
    /// Build the transaction for the account at `safe`
    pub fn build(&self, state: &AppState, safe: Address) -> CliResult<SafeTransaction> {
        let account = state
            .chain
            .safe(safe)
            .ok_or_else(|| format!("no account at {}", safe))?;

        let data = match &self.data {
            Some(hex) => parse_hex_bytes(hex)?,
            None => Vec::new(),
        };
        let optional = |name: &Option<String>| -> CliResult<Address> {
            match name {
                Some(n) => state.resolve(n),
                None => Ok(Address::ZERO),
            }
        };
        let operation = if self.delegate {
            Operation::DelegateCall
        } else {
            Operation::Call
        };

        Ok(SafeTransactionBuilder::new(state.resolve(&self.to)?)
            .value(self.value)
            .data(data)
            .operation(operation)
            .safe_tx_gas(self.safe_tx_gas)
            .base_gas(self.base_gas)
            .gas_price(self.gas_price)
            .gas_token(optional(&self.gas_token)?)
            .refund_receiver(optional(&self.refund_receiver)?)
            .nonce(self.nonce.unwrap_or_else(|| account.nonce()))
            .build())
    }
}

// =============================================================================
// Chain
// =============================================================================

/// Initialize a new chain
pub fn cmd_init(data_dir: &Path, chain_id: Option<u64>, force: bool) -> CliResult<()> {
    let storage = Storage::new(StorageConfig {
        data_dir: data_dir.to_path_buf(),
        ..Default::default()
    })?;

    if storage.exists() && !force {
        println!("⚠️  Chain already exists at {:?}", data_dir);
        println!("   Use --force to reinitialize (this will delete existing data)");
        return Ok(());
    }

    let config = chain_id.map(ChainConfig::new).unwrap_or_default();
    let chain = Chain::new(config);
    storage.save(&chain)?;

    println!("✅ Chain initialized!");
    println!("   📁 Data directory: {:?}", data_dir);
    println!("   🔗 Chain id: {}", config.chain_id);
    println!("   ⛽ Block gas limit: {}", config.block_gas_limit);
    Ok(())
}

/// Display chain info
pub fn cmd_chain_info(state: &AppState) -> CliResult<()> {
    let stats = state.chain.stats();

    println!("⛓️  Chain Info");
    println!("   ├─ Chain id: {}", stats.chain_id);
    println!("   ├─ Accounts: {}", stats.safes);
    println!("   ├─ Contracts: {}", stats.contracts);
    println!("   ├─ Funded addresses: {}", stats.funded_addresses);
    println!("   ├─ Native supply: {}", stats.total_native);
    println!("   └─ Events: {}", stats.events);

    for (address, contract) in state.chain.contracts() {
        println!("   📜 {} ({})", address, contract.kind());
    }
    Ok(())
}

/// Print the most recent events
pub fn cmd_logs(state: &AppState, count: usize) -> CliResult<()> {
    let logs = state.chain.logs();
    let start = logs.len().saturating_sub(count);

    println!("📜 Events ({} total):", logs.len());
    for entry in &logs[start..] {
        println!("   {}", entry);
    }
    Ok(())
}

/// Mint native currency to an address
pub fn cmd_fund(state: &mut AppState, to: &str, amount: U256) -> CliResult<()> {
    let address = state.resolve(to)?;
    let balance = state.chain.credit(address, amount)?;
    state.save()?;

    println!("💰 Funded {} with {} (balance {})", address, amount, balance);
    Ok(())
}

/// Export the chain to a file
pub fn cmd_export(state: &AppState, path: &Path) -> CliResult<()> {
    crate::storage::save_to_file(&state.chain, path)?;
    println!("📦 Chain exported to {:?}", path);
    Ok(())
}

/// Replace the chain with one read from a file
pub fn cmd_import(state: &mut AppState, path: &Path) -> CliResult<()> {
    state.chain = crate::storage::load_from_file(path)?;
    state.save()?;

    println!("📥 Chain imported from {:?}", path);
    println!("   Accounts: {}", state.chain.stats().safes);
    Ok(())
}

// =============================================================================
// Wallets
// =============================================================================

/// Create a new owner wallet
pub fn cmd_wallet_new(state: &mut AppState, label: Option<&str>) -> CliResult<()> {
    let wallet = state.wallet_manager.create_wallet(label)?;

    println!("🔐 New wallet created!");
    println!("   📍 Address: {}", wallet.address());
    println!("   🔑 Public Key: {}...", &wallet.public_key()[..32]);
    if let Some(l) = &wallet.label {
        println!("   🏷️  Label: {}", l);
    }
    println!("\n   ⚠️  IMPORTANT: Your private key is stored in the wallets directory.");
    println!("   Back up this directory to avoid losing access to your accounts!");
    Ok(())
}

/// Import an owner wallet from a private key
pub fn cmd_wallet_import(state: &mut AppState, key: &str, label: Option<&str>) -> CliResult<()> {
    let wallet = state.wallet_manager.import_wallet(key, label)?;
    println!("📥 Imported wallet {}", wallet.address());
    Ok(())
}

/// List all wallets
pub fn cmd_wallet_list(state: &AppState) -> CliResult<()> {
    let wallets = state.wallet_manager.list_wallets()?;

    if wallets.is_empty() {
        println!("📭 No wallets found. Create one with: safe wallet new");
        return Ok(());
    }

    println!("📋 Wallets:");
    for info in &wallets {
        let label = info.label.as_deref().unwrap_or("-");
        println!(
            "   {} ({}) - {}",
            info.address,
            label,
            state.chain.balance_of(info.address)
        );
    }
    Ok(())
}

// =============================================================================
// Accounts
// =============================================================================

/// Deploy a new account
pub fn cmd_safe_deploy(
    state: &mut AppState,
    deployer: &str,
    owners: &[String],
    threshold: usize,
) -> CliResult<()> {
    let deployer = state.resolve(deployer)?;
    let owners = owners
        .iter()
        .map(|o| state.resolve(o))
        .collect::<CliResult<Vec<_>>>()?;

    let address = state.chain.deploy_safe(deployer, owners, threshold)?;
    state.save()?;

    println!("🏦 Account deployed at {}", address);
    Ok(())
}

/// Show owners, threshold and nonce of an account
pub fn cmd_safe_info(state: &AppState, safe: &str) -> CliResult<()> {
    let address = state.resolve(safe)?;
    let account = state
        .chain
        .safe(address)
        .ok_or_else(|| format!("no account at {}", address))?;

    println!("🏦 Account {}", address);
    println!("   ├─ Policy: {}", account.registry().description());
    println!("   ├─ Nonce: {}", account.nonce());
    println!("   ├─ Balance: {}", state.chain.balance_of(address));
    println!("   ├─ Domain separator: {}", account.domain_separator());
    println!("   └─ Owners:");
    for owner in account.owners() {
        println!("      └─ {}", owner);
    }
    Ok(())
}

/// Print the hash and the EIP-712 document of a transaction
pub fn cmd_safe_tx_hash(state: &AppState, safe: &str, tx: &TxArgs) -> CliResult<()> {
    let address = state.resolve(safe)?;
    let transaction = tx.build(state, address)?;
    let account = state
        .chain
        .safe(address)
        .ok_or_else(|| format!("no account at {}", address))?;

    println!("🧾 Transaction hash: {}", account.get_transaction_hash(&transaction));
    println!(
        "{}",
        serde_json::to_string_pretty(&account.typed_data(&transaction))?
    );
    Ok(())
}

/// Sign a transaction with an owner wallet and print the entry
pub fn cmd_safe_sign(
    state: &AppState,
    safe: &str,
    signer: &str,
    tx: &TxArgs,
    eth_sign: bool,
) -> CliResult<()> {
    let address = state.resolve(safe)?;
    let transaction = tx.build(state, address)?;
    let account = state
        .chain
        .safe(address)
        .ok_or_else(|| format!("no account at {}", address))?;
    let wallet = state.wallet_manager.find(signer)?;

    let entry = if eth_sign {
        wallet.sign_transaction_eth(account, &transaction)
    } else {
        wallet.sign_transaction(account, &transaction)
    };

    println!("✍️  Signed by {}", wallet.address());
    println!("0x{}", hex::encode(entry));
    Ok(())
}

/// Approve a transaction hash on-chain
pub fn cmd_safe_approve(
    state: &mut AppState,
    safe: &str,
    owner: &str,
    tx: &TxArgs,
    gas_limit: u64,
) -> CliResult<()> {
    let address = state.resolve(safe)?;
    let owner = state.resolve(owner)?;
    let transaction = tx.build(state, address)?;
    let hash = state
        .chain
        .safe(address)
        .ok_or_else(|| format!("no account at {}", address))?
        .get_transaction_hash(&transaction);

    state.chain.approve_hash(owner, address, hash, gas_limit)?;
    state.save()?;

    println!("👍 {} approved {}", owner, hash);
    Ok(())
}

/// Collect signature entries and on-chain approvals into a bundle
pub fn build_signatures(
    hash: &B256,
    signatures: &[String],
    approvals: &[Address],
) -> CliResult<Vec<u8>> {
    let mut bundle = approvals
        .iter()
        .fold(SignatureBundle::new(), |bundle, owner| bundle.approved(*owner));

    for sig in signatures {
        let bytes = parse_hex_bytes(sig)?;
        let entry: [u8; SIGNATURE_LENGTH] = bytes.as_slice().try_into().map_err(|_| {
            format!(
                "signature must be {} bytes, got {}",
                SIGNATURE_LENGTH,
                bytes.len()
            )
        })?;
        bundle.push_encoded(hash, &entry)?;
    }
    Ok(bundle.encode())
}

/// Submit a transaction with the given endorsements
#[allow(clippy::too_many_arguments)]
pub fn cmd_safe_exec(
    state: &mut AppState,
    safe: &str,
    submitter: &str,
    tx: &TxArgs,
    signatures: &[String],
    approvals: &[String],
    gas_limit: u64,
    tx_gas_price: U256,
) -> CliResult<()> {
    let address = state.resolve(safe)?;
    let submitter = state.resolve(submitter)?;
    let transaction = tx.build(state, address)?;
    let hash = state
        .chain
        .safe(address)
        .ok_or_else(|| format!("no account at {}", address))?
        .get_transaction_hash(&transaction);

    let approvals = approvals
        .iter()
        .map(|a| state.resolve(a))
        .collect::<CliResult<Vec<_>>>()?;
    let bundle = build_signatures(&hash, signatures, &approvals)?;

    let outcome = state.chain.exec_transaction(
        submitter,
        address,
        &transaction,
        &bundle,
        gas_limit,
        tx_gas_price,
    )?;
    state.save()?;

    if outcome.success {
        println!("✅ Executed nonce {} ({})", outcome.nonce, outcome.tx_hash);
    } else {
        println!(
            "❌ Nonce {} consumed but the call failed ({})",
            outcome.nonce, outcome.tx_hash
        );
    }
    if let Some(e) = &outcome.inner_error {
        println!("   ├─ Inner error: {}", e);
    }
    if let Some(e) = &outcome.refund_error {
        println!("   ├─ Refund error: {}", e);
    }
    if !outcome.return_data.is_empty() {
        println!("   ├─ Returned: 0x{}", hex::encode(&outcome.return_data));
    }
    println!("   ├─ Gas used: {}", outcome.gas_used);
    println!("   └─ Payment: {}", outcome.payment);
    Ok(())
}

// =============================================================================
// Tokens
// =============================================================================

/// Deploy an ERC-20 token
pub fn cmd_token_deploy(
    state: &mut AppState,
    deployer: &str,
    name: &str,
    symbol: &str,
    decimals: u8,
) -> CliResult<()> {
    let deployer = state.resolve(deployer)?;
    let address = state.chain.deploy_token(deployer, name, symbol, decimals)?;
    state.save()?;

    println!("🪙 Token {} deployed at {}", symbol, address);
    Ok(())
}

/// Deploy the MultiSend library
pub fn cmd_multisend_deploy(state: &mut AppState, deployer: &str) -> CliResult<()> {
    let deployer = state.resolve(deployer)?;
    let address = state.chain.deploy_multisend(deployer);
    state.save()?;

    println!("📦 MultiSend deployed at {}", address);
    Ok(())
}

/// Mint tokens to a holder
pub fn cmd_token_mint(
    state: &mut AppState,
    token: &str,
    to: &str,
    amount: U256,
    gas_limit: u64,
) -> CliResult<()> {
    let token = state.resolve(token)?;
    let to = state.resolve(to)?;
    let minter = match state.chain.contract(token) {
        Some(Contract::Erc20(t)) => t.metadata.creator,
        _ => return Err(format!("no token at {}", token).into()),
    };

    let data = IERC20::mintCall { to, amount }.abi_encode();
    state.chain.call(minter, token, U256::ZERO, &data, gas_limit)?;
    state.save()?;

    println!("🪙 Minted {} to {}", amount, to);
    Ok(())
}

/// Show a token balance
pub fn cmd_token_balance(state: &AppState, token: &str, holder: &str) -> CliResult<()> {
    let token = state.resolve(token)?;
    let holder = state.resolve(holder)?;
    let erc20 = state
        .chain
        .token(token)
        .ok_or_else(|| format!("no token at {}", token))?;

    println!(
        "💰 {} holds {} {}",
        holder,
        erc20.balance_of(&holder),
        erc20.symbol()
    );

    let transfers = state
        .chain
        .logs()
        .iter()
        .filter(|entry| entry.emitter == token)
        .filter(|entry| matches!(entry.event, ChainEvent::Token(_)))
        .count();
    println!("   {} token events recorded", transfers);
    Ok(())
}
