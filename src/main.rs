//! Safe CLI Application
//!
//! A command-line interface for deploying multi-owner accounts, signing
//! their transactions and executing them on a local chain.

use clap::{Parser, Subcommand};
use safe_engine::cli::{self, AppState, TxArgs};
use safe_engine::core::types::parse_u256;
use safe_engine::core::{DEFAULT_GAS_LIMIT, U256};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "safe")]
#[command(author = "Darshan")]
#[command(version = "0.1.0")]
#[command(about = "Multi-owner transaction authorization and execution", long_about = None)]
struct Cli {
    /// Data directory for chain state and wallets
    #[arg(short, long, default_value = ".safe_data")]
    data_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a new chain
    Init {
        /// Chain id bound into every account's signatures
        #[arg(long)]
        chain_id: Option<u64>,

        /// Overwrite an existing chain
        #[arg(long)]
        force: bool,
    },

    /// Wallet operations
    Wallet {
        #[command(subcommand)]
        action: WalletCommands,
    },

    /// Mint native currency to an address
    Fund {
        /// Recipient (address or wallet label)
        #[arg(short, long)]
        to: String,

        #[arg(short, long, value_parser = parse_u256)]
        amount: U256,
    },

    /// Multi-owner account operations
    Safe {
        #[command(subcommand)]
        action: SafeCommands,
    },

    /// ERC-20 token operations
    Token {
        #[command(subcommand)]
        action: TokenCommands,
    },

    /// Deploy the MultiSend batch library
    Multisend {
        #[arg(long)]
        deployer: String,
    },

    /// Display chain information
    Info,

    /// Show recent events
    Logs {
        #[arg(short, long, default_value = "20")]
        count: usize,
    },

    /// Export chain state to a file
    Export {
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Import chain state from a file
    Import {
        #[arg(short, long)]
        input: PathBuf,
    },
}

#[derive(Subcommand)]
enum WalletCommands {
    /// Create a new wallet
    New {
        #[arg(short, long)]
        label: Option<String>,
    },

    /// Import a wallet from a hex private key
    Import {
        #[arg(short, long)]
        key: String,

        #[arg(short, long)]
        label: Option<String>,
    },

    /// List all wallets
    List,
}

#[derive(Subcommand)]
enum SafeCommands {
    /// Deploy an account
    Deploy {
        /// Wallet or address paying for the deployment
        #[arg(long)]
        deployer: String,

        /// Owners (comma-separated addresses or wallet labels)
        #[arg(long, value_delimiter = ',')]
        owners: Vec<String>,

        #[arg(long)]
        threshold: usize,
    },

    /// Show owners, threshold and nonce
    Info {
        #[arg(long)]
        safe: String,
    },

    /// Print a transaction's hash and EIP-712 document
    TxHash {
        #[arg(long)]
        safe: String,

        #[command(flatten)]
        tx: TxArgs,
    },

    /// Sign a transaction with an owner wallet
    Sign {
        #[arg(long)]
        safe: String,

        #[arg(long)]
        signer: String,

        /// Produce an eth_sign signature
        #[arg(long)]
        eth_sign: bool,

        #[command(flatten)]
        tx: TxArgs,
    },

    /// Approve a transaction hash on-chain
    Approve {
        #[arg(long)]
        safe: String,

        #[arg(long)]
        owner: String,

        #[arg(long, default_value_t = DEFAULT_GAS_LIMIT)]
        gas_limit: u64,

        #[command(flatten)]
        tx: TxArgs,
    },

    /// Execute a transaction
    Exec {
        #[arg(long)]
        safe: String,

        /// Identity submitting the transaction
        #[arg(long)]
        submitter: String,

        /// Signature entries as hex (comma-separated)
        #[arg(long, value_delimiter = ',')]
        signatures: Vec<String>,

        /// Owners whose approval is on-chain or who submit (comma-separated)
        #[arg(long, value_delimiter = ',')]
        approvals: Vec<String>,

        #[arg(long, default_value_t = DEFAULT_GAS_LIMIT)]
        gas_limit: u64,

        /// Price the submitter pays per gas unit
        #[arg(long, default_value = "0", value_parser = parse_u256)]
        tx_gas_price: U256,

        #[command(flatten)]
        tx: TxArgs,
    },
}

#[derive(Subcommand)]
enum TokenCommands {
    /// Deploy an ERC-20 token
    Deploy {
        #[arg(long)]
        deployer: String,

        #[arg(long)]
        name: String,

        #[arg(long)]
        symbol: String,

        #[arg(long, default_value = "18")]
        decimals: u8,
    },

    /// Mint tokens (as the token's creator)
    Mint {
        #[arg(long)]
        token: String,

        #[arg(long)]
        to: String,

        #[arg(long, value_parser = parse_u256)]
        amount: U256,
    },

    /// Show a holder's balance
    Balance {
        #[arg(long)]
        token: String,

        #[arg(long)]
        holder: String,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    // Init doesn't need the loaded state
    if let Commands::Init { chain_id, force } = &cli.command {
        return cli::cmd_init(&cli.data_dir, *chain_id, *force);
    }

    let mut state = AppState::new(cli.data_dir.clone())?;

    match cli.command {
        Commands::Init { .. } => {}
        Commands::Wallet { action } => match action {
            WalletCommands::New { label } => {
                cli::cmd_wallet_new(&mut state, label.as_deref())?;
            }
            WalletCommands::Import { key, label } => {
                cli::cmd_wallet_import(&mut state, &key, label.as_deref())?;
            }
            WalletCommands::List => {
                cli::cmd_wallet_list(&state)?;
            }
        },
        Commands::Fund { to, amount } => {
            cli::cmd_fund(&mut state, &to, amount)?;
        }
        Commands::Safe { action } => match action {
            SafeCommands::Deploy {
                deployer,
                owners,
                threshold,
            } => {
                cli::cmd_safe_deploy(&mut state, &deployer, &owners, threshold)?;
            }
            SafeCommands::Info { safe } => {
                cli::cmd_safe_info(&state, &safe)?;
            }
            SafeCommands::TxHash { safe, tx } => {
                cli::cmd_safe_tx_hash(&state, &safe, &tx)?;
            }
            SafeCommands::Sign {
                safe,
                signer,
                eth_sign,
                tx,
            } => {
                cli::cmd_safe_sign(&state, &safe, &signer, &tx, eth_sign)?;
            }
            SafeCommands::Approve {
                safe,
                owner,
                gas_limit,
                tx,
            } => {
                cli::cmd_safe_approve(&mut state, &safe, &owner, &tx, gas_limit)?;
            }
            SafeCommands::Exec {
                safe,
                submitter,
                signatures,
                approvals,
                gas_limit,
                tx_gas_price,
                tx,
            } => {
                cli::cmd_safe_exec(
                    &mut state,
                    &safe,
                    &submitter,
                    &tx,
                    &signatures,
                    &approvals,
                    gas_limit,
                    tx_gas_price,
                )?;
            }
        },
        Commands::Token { action } => match action {
            TokenCommands::Deploy {
                deployer,
                name,
                symbol,
                decimals,
            } => {
                cli::cmd_token_deploy(&mut state, &deployer, &name, &symbol, decimals)?;
            }
            TokenCommands::Mint { token, to, amount } => {
                cli::cmd_token_mint(&mut state, &token, &to, amount, DEFAULT_GAS_LIMIT)?;
            }
            TokenCommands::Balance { token, holder } => {
                cli::cmd_token_balance(&state, &token, &holder)?;
            }
        },
        Commands::Multisend { deployer } => {
            cli::cmd_multisend_deploy(&mut state, &deployer)?;
        }
        Commands::Info => {
            cli::cmd_chain_info(&state)?;
        }
        Commands::Logs { count } => {
            cli::cmd_logs(&state, count)?;
        }
        Commands::Export { output } => {
            cli::cmd_export(&state, &output)?;
        }
        Commands::Import { input } => {
            cli::cmd_import(&mut state, &input)?;
        }
    }

    Ok(())
}
