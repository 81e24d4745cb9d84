//! In-memory world state
//!
//! `Chain` is the platform accounts execute on: native balances, deployed
//! accounts and contracts, the event log and a checkpoint stack. It
//! implements [`CallHost`], so an executing account reaches every other
//! contract through it.

use crate::chain::config::{ChainConfig, MAX_CALL_DEPTH};
use crate::chain::events::{ChainEvent, LogEntry};
use crate::core::abi::{ISafe, IERC20};
use crate::core::gas::{
    calldata_cost, GasMeter, CALL_GAS, CALL_VALUE_GAS, LOG_GAS, SLOAD_GAS, SSTORE_GAS,
    TX_BASE_GAS,
};
use crate::core::types::{Address, B256, U256};
use crate::crypto::keccak256_concat;
use crate::safe::{
    CallError, CallHost, ExecutionContext, ExecutionOutcome, Library, SafeAccount, SafeError,
    SafeEvent, SafeTransaction,
};
use crate::token::{
    ConfidentialCall, ConfidentialToken, Erc20Call, Erc20Token, TokenError, TokenMetadata,
};
use alloy_sol_types::SolCall;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Display;
use thiserror::Error;

/// Host-level errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChainError {
    #[error("Account error: {0}")]
    Safe(#[from] SafeError),
    #[error("Token error: {0}")]
    Token(#[from] TokenError),
    #[error("Call failed: {0}")]
    Call(#[from] CallError),
    #[error("No account deployed at {0}")]
    SafeNotFound(Address),
    #[error("Contract at {0} is not an ERC-20 token")]
    NotAnErc20(Address),
    #[error("Balance overflow for {0}")]
    BalanceOverflow(Address),
}

/// Code deployed at an address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Contract {
    Erc20(Erc20Token),
    Confidential(ConfidentialToken),
    /// Batch library, only reachable through delegate calls
    MultiSend,
}

impl Contract {
    pub fn kind(&self) -> &'static str {
        match self {
            Contract::Erc20(_) => "erc20",
            Contract::Confidential(_) => "confidential",
            Contract::MultiSend => "multisend",
        }
    }
}

/// State restored by a rollback
#[derive(Debug, Clone)]
struct Snapshot {
    balances: BTreeMap<Address, U256>,
    safes: BTreeMap<Address, SafeAccount>,
    contracts: BTreeMap<Address, Contract>,
    logs: usize,
}

/// Summary of the world state
#[derive(Debug, Clone, Serialize)]
pub struct ChainStats {
    pub chain_id: u64,
    pub safes: usize,
    pub contracts: usize,
    pub funded_addresses: usize,
    pub total_native: U256,
    pub events: usize,
}

/// The world state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chain {
    pub config: ChainConfig,
    balances: BTreeMap<Address, U256>,
    safes: BTreeMap<Address, SafeAccount>,
    contracts: BTreeMap<Address, Contract>,
    /// Deployment counter for address generation
    deploy_nonce: u64,
    logs: Vec<LogEntry>,
    #[serde(skip)]
    snapshots: Vec<Snapshot>,
    /// Accounts currently inside `exec_transaction`
    #[serde(skip)]
    executing: BTreeSet<Address>,
    #[serde(skip)]
    depth: usize,
    /// Gas price of the top-level transaction being executed
    #[serde(skip)]
    tx_gas_price: U256,
}

impl Chain {
    /// Create an empty chain
    pub fn new(config: ChainConfig) -> Self {
        Self {
            config,
            balances: BTreeMap::new(),
            safes: BTreeMap::new(),
            contracts: BTreeMap::new(),
            deploy_nonce: 0,
            logs: Vec::new(),
            snapshots: Vec::new(),
            executing: BTreeSet::new(),
            depth: 0,
            tx_gas_price: U256::ZERO,
        }
    }

    pub fn chain_id(&self) -> u64 {
        self.config.chain_id
    }

    // =========================================================================
    // Deployment
    // =========================================================================

    /// Deploy an account with its initial owners and threshold
    pub fn deploy_safe(
        &mut self,
        deployer: Address,
        owners: Vec<Address>,
        threshold: usize,
    ) -> Result<Address, ChainError> {
        let address = self.next_address(deployer);
        let safe = SafeAccount::new(address, self.config.chain_id, owners, threshold)?;

        info!(
            "Deployed {} account at {}",
            safe.registry().description(),
            address
        );
        self.log(address, ChainEvent::Safe(safe.setup_event()));
        self.safes.insert(address, safe);
        Ok(address)
    }

    /// Deploy an ERC-20 token owned by `deployer`
    pub fn deploy_token(
        &mut self,
        deployer: Address,
        name: &str,
        symbol: &str,
        decimals: u8,
    ) -> Result<Address, ChainError> {
        let metadata = TokenMetadata::new(name.to_string(), symbol.to_string(), decimals, deployer)?;
        let address = self.next_address(deployer);

        info!("Deployed token {} ({}) at {}", name, symbol, address);
        self.contracts
            .insert(address, Contract::Erc20(Erc20Token::new(address, metadata)));
        Ok(address)
    }

    /// Deploy a confidential token wrapping the ERC-20 at `underlying`
    pub fn deploy_confidential_token(
        &mut self,
        deployer: Address,
        name: &str,
        symbol: &str,
        decimals: u8,
        underlying: Address,
    ) -> Result<Address, ChainError> {
        if !matches!(self.contracts.get(&underlying), Some(Contract::Erc20(_))) {
            return Err(ChainError::NotAnErc20(underlying));
        }
        let metadata = TokenMetadata::new(name.to_string(), symbol.to_string(), decimals, deployer)?;
        let address = self.next_address(deployer);

        info!(
            "Deployed confidential token {} at {} wrapping {}",
            symbol, address, underlying
        );
        self.contracts.insert(
            address,
            Contract::Confidential(ConfidentialToken::new(address, metadata, underlying)),
        );
        Ok(address)
    }

    /// Deploy the batch library
    pub fn deploy_multisend(&mut self, deployer: Address) -> Address {
        let address = self.next_address(deployer);
        info!("Deployed MultiSend library at {}", address);
        self.contracts.insert(address, Contract::MultiSend);
        address
    }

    /// Contract address derived from deployer and deployment counter
    fn next_address(&mut self, deployer: Address) -> Address {
        let nonce = self.deploy_nonce.to_be_bytes();
        let hash = keccak256_concat(&[deployer.as_slice(), &nonce[..]]);
        self.deploy_nonce += 1;
        Address::from_word(hash)
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub fn balance_of(&self, address: Address) -> U256 {
        self.balances.get(&address).copied().unwrap_or_default()
    }

    pub fn safe(&self, address: Address) -> Option<&SafeAccount> {
        self.safes.get(&address)
    }

    pub fn safes(&self) -> impl Iterator<Item = &SafeAccount> {
        self.safes.values()
    }

    pub fn contract(&self, address: Address) -> Option<&Contract> {
        self.contracts.get(&address)
    }

    pub fn contracts(&self) -> impl Iterator<Item = (&Address, &Contract)> {
        self.contracts.iter()
    }

    pub fn token(&self, address: Address) -> Option<&Erc20Token> {
        match self.contracts.get(&address) {
            Some(Contract::Erc20(token)) => Some(token),
            _ => None,
        }
    }

    pub fn confidential(&self, address: Address) -> Option<&ConfidentialToken> {
        match self.contracts.get(&address) {
            Some(Contract::Confidential(token)) => Some(token),
            _ => None,
        }
    }

    pub fn logs(&self) -> &[LogEntry] {
        &self.logs
    }

    /// Events emitted by the account at `address`, oldest first
    pub fn safe_events(&self, address: Address) -> Vec<&SafeEvent> {
        self.logs
            .iter()
            .filter(|entry| entry.emitter == address)
            .filter_map(LogEntry::safe_event)
            .collect()
    }

    pub fn stats(&self) -> ChainStats {
        ChainStats {
            chain_id: self.config.chain_id,
            safes: self.safes.len(),
            contracts: self.contracts.len(),
            funded_addresses: self.balances.values().filter(|b| !b.is_zero()).count(),
            total_native: self
                .balances
                .values()
                .fold(U256::ZERO, |acc, b| acc.saturating_add(*b)),
            events: self.logs.len(),
        }
    }

    // =========================================================================
    // Transactions
    // =========================================================================

    /// Mint native currency to `address`
    pub fn credit(&mut self, address: Address, amount: U256) -> Result<U256, ChainError> {
        let balance = self
            .balance_of(address)
            .checked_add(amount)
            .ok_or(ChainError::BalanceOverflow(address))?;
        self.balances.insert(address, balance);
        debug!("Credited {} with {} (now {})", address, amount, balance);
        Ok(balance)
    }

    /// Message call originated by an externally owned `sender`
    pub fn call(
        &mut self,
        sender: Address,
        to: Address,
        value: U256,
        data: &[u8],
        gas_limit: u64,
    ) -> Result<Vec<u8>, ChainError> {
        let mut gas = GasMeter::new(self.config.clamp_gas(gas_limit));
        gas.consume(TX_BASE_GAS + calldata_cost(data))
            .map_err(CallError::from)?;

        let result = self.message_call(sender, to, value, data, &mut gas);
        if let Err(e) = &result {
            warn!("Call from {} to {} failed: {}", sender, to, e);
        }
        Ok(result?)
    }

    /// Submit `tx` with `signatures` to the account at `safe`
    ///
    /// `gas_price` is the price the submitter pays; it caps native refunds.
    pub fn exec_transaction(
        &mut self,
        sender: Address,
        safe: Address,
        tx: &SafeTransaction,
        signatures: &[u8],
        gas_limit: u64,
        gas_price: U256,
    ) -> Result<ExecutionOutcome, ChainError> {
        let mut account = self
            .safes
            .remove(&safe)
            .ok_or(ChainError::SafeNotFound(safe))?;
        self.executing.insert(safe);
        self.tx_gas_price = gas_price;

        let mut gas = GasMeter::new(self.config.clamp_gas(gas_limit));
        let ctx = ExecutionContext::new(sender, gas_price);
        let intrinsic = TX_BASE_GAS + calldata_cost(&tx.data) + calldata_cost(signatures);

        let result = match gas.consume(intrinsic) {
            Ok(()) => account.exec_transaction(self, &ctx, tx, signatures, &mut gas),
            Err(e) => Err(e.into()),
        };

        self.tx_gas_price = U256::ZERO;
        self.executing.remove(&safe);
        self.safes.insert(safe, account);
        Ok(result?)
    }

    /// `owner` approves `hash` on the account at `safe`
    pub fn approve_hash(
        &mut self,
        owner: Address,
        safe: Address,
        hash: B256,
        gas_limit: u64,
    ) -> Result<(), ChainError> {
        let data = ISafe::approveHashCall {
            hashToApprove: hash,
        }
        .abi_encode();
        self.call(owner, safe, U256::ZERO, &data, gas_limit)?;
        Ok(())
    }

    /// `owner` clears its approval of `hash` on the account at `safe`
    pub fn revoke_approved_hash(
        &mut self,
        owner: Address,
        safe: Address,
        hash: B256,
        gas_limit: u64,
    ) -> Result<(), ChainError> {
        let data = ISafe::revokeApprovedHashCall {
            hashToRevoke: hash,
        }
        .abi_encode();
        self.call(owner, safe, U256::ZERO, &data, gas_limit)?;
        Ok(())
    }

    // =========================================================================
    // Call dispatch
    // =========================================================================

    /// Atomic message call: state changes are undone when it fails
    fn message_call(
        &mut self,
        caller: Address,
        to: Address,
        value: U256,
        data: &[u8],
        gas: &mut GasMeter,
    ) -> Result<Vec<u8>, CallError> {
        if self.depth >= MAX_CALL_DEPTH {
            return Err(CallError::Reverted("call depth exceeded".to_string()));
        }
        gas.consume(CALL_GAS)?;
        if !value.is_zero() {
            gas.consume(CALL_VALUE_GAS)?;
        }

        self.checkpoint();
        self.depth += 1;
        let result = self.dispatch(caller, to, value, data, gas);
        self.depth -= 1;

        match &result {
            Ok(_) => self.commit(),
            Err(e) => {
                debug!("Call {} -> {} reverted: {}", caller, to, e);
                self.rollback();
            }
        }
        result
    }

    fn dispatch(
        &mut self,
        caller: Address,
        to: Address,
        value: U256,
        data: &[u8],
        gas: &mut GasMeter,
    ) -> Result<Vec<u8>, CallError> {
        self.transfer(caller, to, value)?;

        if self.executing.contains(&to) {
            if data.is_empty() {
                return Ok(Vec::new());
            }
            return Err(CallError::ReentrancyDetected(to));
        }

        if let Some(mut account) = self.safes.remove(&to) {
            self.executing.insert(to);
            let result = match gas.consume(SLOAD_GAS) {
                Ok(()) => account
                    .handle_external_call(self, caller, value, data, gas)
                    .map_err(revert),
                Err(e) => Err(e.into()),
            };
            self.executing.remove(&to);
            self.safes.insert(to, account);
            return result;
        }

        match self.contracts.get(&to) {
            // Plain addresses accept anything
            None => Ok(Vec::new()),
            Some(Contract::MultiSend) => Err(CallError::Reverted(
                "MultiSend can only be delegate-called".to_string(),
            )),
            Some(Contract::Erc20(_)) => self.call_erc20(caller, to, data, gas),
            Some(Contract::Confidential(_)) => self.call_confidential(caller, to, data, gas),
        }
    }

    fn call_erc20(
        &mut self,
        caller: Address,
        to: Address,
        data: &[u8],
        gas: &mut GasMeter,
    ) -> Result<Vec<u8>, CallError> {
        let call = Erc20Call::decode(data).map_err(revert)?;
        gas.consume(if call.is_mutating() { SSTORE_GAS } else { SLOAD_GAS })?;

        let token = match self.contracts.get_mut(&to) {
            Some(Contract::Erc20(token)) => token,
            _ => return Err(CallError::Reverted(format!("no token at {}", to))),
        };
        let (ret, events) = token.execute(caller, call).map_err(revert)?;

        for event in events {
            gas.consume(LOG_GAS)?;
            self.log(to, ChainEvent::Token(event));
        }
        Ok(ret)
    }

    fn call_confidential(
        &mut self,
        caller: Address,
        to: Address,
        data: &[u8],
        gas: &mut GasMeter,
    ) -> Result<Vec<u8>, CallError> {
        let call = ConfidentialCall::decode(data).map_err(revert)?;
        gas.consume(SSTORE_GAS)?;

        // Wraps pull the underlying tokens before crediting anything
        if let ConfidentialCall::WrapAndDistribute { amount, .. } = &call {
            let underlying = self.confidential_mut(to)?.underlying;
            let pull = IERC20::transferFromCall {
                from: caller,
                to,
                amount: *amount,
            }
            .abi_encode();
            self.message_call(to, underlying, U256::ZERO, &pull, gas)?;
        }

        let (ret, events) = self
            .confidential_mut(to)?
            .execute(caller, call)
            .map_err(revert)?;

        for event in events {
            gas.consume(LOG_GAS)?;
            self.log(to, ChainEvent::Confidential(event));
        }
        Ok(ret)
    }

    fn confidential_mut(&mut self, address: Address) -> Result<&mut ConfidentialToken, CallError> {
        match self.contracts.get_mut(&address) {
            Some(Contract::Confidential(token)) => Ok(token),
            _ => Err(CallError::Reverted(format!(
                "no confidential token at {}",
                address
            ))),
        }
    }

    fn transfer(&mut self, from: Address, to: Address, value: U256) -> Result<(), CallError> {
        if value.is_zero() {
            return Ok(());
        }
        let have = self.balance_of(from);
        if have < value {
            return Err(CallError::InsufficientBalance { have, need: value });
        }
        self.balances.insert(from, have - value);

        let credited = self
            .balance_of(to)
            .checked_add(value)
            .ok_or_else(|| CallError::Reverted("balance overflow".to_string()))?;
        self.balances.insert(to, credited);
        Ok(())
    }

    fn log(&mut self, emitter: Address, event: ChainEvent) {
        debug!("{} emitted {}", emitter, event);
        self.logs.push(LogEntry::new(emitter, event));
    }
}

impl Default for Chain {
    fn default() -> Self {
        Self::new(ChainConfig::default())
    }
}

impl CallHost for Chain {
    fn call(
        &mut self,
        caller: Address,
        to: Address,
        value: U256,
        data: &[u8],
        gas: &mut GasMeter,
    ) -> Result<Vec<u8>, CallError> {
        self.message_call(caller, to, value, data, gas)
    }

    fn library(&self, address: Address) -> Option<Library> {
        match self.contracts.get(&address) {
            Some(Contract::MultiSend) => Some(Library::MultiSend),
            _ => None,
        }
    }

    fn has_code(&self, address: Address) -> bool {
        self.contracts.contains_key(&address)
            || self.safes.contains_key(&address)
            || self.executing.contains(&address)
    }

    fn checkpoint(&mut self) {
        self.snapshots.push(Snapshot {
            balances: self.balances.clone(),
            safes: self.safes.clone(),
            contracts: self.contracts.clone(),
            logs: self.logs.len(),
        });
    }

    fn commit(&mut self) {
        self.snapshots.pop();
    }

    fn rollback(&mut self) {
        if let Some(snapshot) = self.snapshots.pop() {
            self.balances = snapshot.balances;
            self.safes = snapshot.safes;
            self.contracts = snapshot.contracts;
            self.logs.truncate(snapshot.logs);
        }
    }

    fn balance_of(&self, address: Address) -> U256 {
        Chain::balance_of(self, address)
    }

    fn tx_gas_price(&self) -> U256 {
        self.tx_gas_price
    }

    fn emit(&mut self, emitter: Address, event: SafeEvent) {
        self.log(emitter, ChainEvent::Safe(event));
    }
}

fn revert<E: Display>(e: E) -> CallError {
    CallError::Reverted(e.to_string())
}
