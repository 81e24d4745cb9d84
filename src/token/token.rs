//! ERC-20 token implementation
//!
//! Provides a mintable fungible token with the standard interface, reachable
//! both through typed methods and through ABI-encoded calls.

use crate::core::abi::{AbiError, IERC20};
use crate::core::types::{u256_decimal, Address, U256};
use alloy_sol_types::{SolInterface, SolValue};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Token-related errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("Insufficient balance: have {have}, need {need}")]
    InsufficientBalance { have: U256, need: U256 },
    #[error("Insufficient allowance: have {have}, need {need}")]
    InsufficientAllowance { have: U256, need: U256 },
    #[error("Invalid receiver: {0}")]
    InvalidReceiver(Address),
    #[error("Supply overflow")]
    SupplyOverflow,
    #[error("Invalid symbol: must be 1-10 characters")]
    InvalidSymbol,
    #[error("Invalid name: must be 1-50 characters")]
    InvalidName,
    #[error("Invalid decimals: must be 0-18")]
    InvalidDecimals,
    #[error("Caller {0} is not allowed to do this")]
    Unauthorized(Address),
    #[error("Invalid encrypted amount")]
    InvalidCiphertext,
    #[error("Invalid call: {0}")]
    InvalidCall(#[from] AbiError),
}

/// Token metadata (immutable after creation)
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenMetadata {
    /// Token name (e.g., "My Token")
    pub name: String,
    /// Token symbol (e.g., "MTK")
    pub symbol: String,
    /// Decimal places (usually 18)
    pub decimals: u8,
    /// Deployer address
    pub creator: Address,
    /// Timestamp when created
    pub created_at: DateTime<Utc>,
}

impl TokenMetadata {
    /// Create new token metadata with validation
    pub fn new(
        name: String,
        symbol: String,
        decimals: u8,
        creator: Address,
    ) -> Result<Self, TokenError> {
        if name.is_empty() || name.len() > 50 {
            return Err(TokenError::InvalidName);
        }

        if symbol.is_empty() || symbol.len() > 10 {
            return Err(TokenError::InvalidSymbol);
        }

        if decimals > 18 {
            return Err(TokenError::InvalidDecimals);
        }

        Ok(Self {
            name,
            symbol,
            decimals,
            creator,
            created_at: Utc::now(),
        })
    }
}

/// Events emitted by an ERC-20 token
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum TokenEvent {
    Transfer {
        from: Address,
        to: Address,
        #[serde(with = "u256_decimal")]
        amount: U256,
    },
    Approval {
        owner: Address,
        spender: Address,
        #[serde(with = "u256_decimal")]
        amount: U256,
    },
}

/// A decoded ERC-20 call
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Erc20Call {
    Name,
    Symbol,
    Decimals,
    TotalSupply,
    BalanceOf(Address),
    Allowance { owner: Address, spender: Address },
    Transfer { to: Address, amount: U256 },
    Approve { spender: Address, amount: U256 },
    TransferFrom { from: Address, to: Address, amount: U256 },
    Mint { to: Address, amount: U256 },
}

impl Erc20Call {
    /// Decode ABI call data
    pub fn decode(data: &[u8]) -> Result<Self, TokenError> {
        use IERC20::IERC20Calls;

        let call = match IERC20Calls::abi_decode(data).map_err(AbiError::from)? {
            IERC20Calls::name(_) => Erc20Call::Name,
            IERC20Calls::symbol(_) => Erc20Call::Symbol,
            IERC20Calls::decimals(_) => Erc20Call::Decimals,
            IERC20Calls::totalSupply(_) => Erc20Call::TotalSupply,
            IERC20Calls::balanceOf(call) => Erc20Call::BalanceOf(call.owner),
            IERC20Calls::allowance(call) => Erc20Call::Allowance {
                owner: call.owner,
                spender: call.spender,
            },
            IERC20Calls::transfer(call) => Erc20Call::Transfer {
                to: call.to,
                amount: call.amount,
            },
            IERC20Calls::approve(call) => Erc20Call::Approve {
                spender: call.spender,
                amount: call.amount,
            },
            IERC20Calls::transferFrom(call) => Erc20Call::TransferFrom {
                from: call.from,
                to: call.to,
                amount: call.amount,
            },
            IERC20Calls::mint(call) => Erc20Call::Mint {
                to: call.to,
                amount: call.amount,
            },
        };
        Ok(call)
    }

    /// Whether the call writes state
    pub fn is_mutating(&self) -> bool {
        matches!(
            self,
            Erc20Call::Transfer { .. }
                | Erc20Call::Approve { .. }
                | Erc20Call::TransferFrom { .. }
                | Erc20Call::Mint { .. }
        )
    }
}

/// A mintable ERC-20 token
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Erc20Token {
    /// Contract address
    pub address: Address,
    /// Token metadata
    pub metadata: TokenMetadata,
    total_supply: U256,
    /// Balances: address -> amount
    balances: BTreeMap<Address, U256>,
    /// Allowances: owner -> (spender -> amount)
    allowances: BTreeMap<Address, BTreeMap<Address, U256>>,
}

impl Erc20Token {
    /// Create a token with no supply
    pub fn new(address: Address, metadata: TokenMetadata) -> Self {
        Self {
            address,
            metadata,
            total_supply: U256::ZERO,
            balances: BTreeMap::new(),
            allowances: BTreeMap::new(),
        }
    }

    // =========================================================================
    // ERC-20 View Functions
    // =========================================================================

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    pub fn symbol(&self) -> &str {
        &self.metadata.symbol
    }

    pub fn decimals(&self) -> u8 {
        self.metadata.decimals
    }

    pub fn total_supply(&self) -> U256 {
        self.total_supply
    }

    /// Get balance of an address
    pub fn balance_of(&self, address: &Address) -> U256 {
        self.balances.get(address).copied().unwrap_or_default()
    }

    /// Get allowance for a spender
    pub fn allowance(&self, owner: &Address, spender: &Address) -> U256 {
        self.allowances
            .get(owner)
            .and_then(|spenders| spenders.get(spender))
            .copied()
            .unwrap_or_default()
    }

    /// Get holder count
    pub fn holder_count(&self) -> usize {
        self.balances.values().filter(|b| !b.is_zero()).count()
    }

    // =========================================================================
    // ERC-20 Mutating Functions
    // =========================================================================

    /// Create `amount` new tokens for `to`
    pub fn mint(&mut self, to: Address, amount: U256) -> Result<TokenEvent, TokenError> {
        if to.is_zero() {
            return Err(TokenError::InvalidReceiver(to));
        }
        self.total_supply = self
            .total_supply
            .checked_add(amount)
            .ok_or(TokenError::SupplyOverflow)?;
        *self.balances.entry(to).or_default() += amount;

        Ok(TokenEvent::Transfer {
            from: Address::ZERO,
            to,
            amount,
        })
    }

    /// Move `amount` from `from` to `to`
    pub fn transfer(
        &mut self,
        from: Address,
        to: Address,
        amount: U256,
    ) -> Result<TokenEvent, TokenError> {
        if to.is_zero() {
            return Err(TokenError::InvalidReceiver(to));
        }

        let from_balance = self.balance_of(&from);
        if from_balance < amount {
            return Err(TokenError::InsufficientBalance {
                have: from_balance,
                need: amount,
            });
        }

        // Supply is bounded, so the credit cannot overflow
        *self.balances.entry(from).or_default() -= amount;
        *self.balances.entry(to).or_default() += amount;

        Ok(TokenEvent::Transfer { from, to, amount })
    }

    /// Approve a spender to transfer tokens on behalf of owner
    pub fn approve(
        &mut self,
        owner: Address,
        spender: Address,
        amount: U256,
    ) -> Result<TokenEvent, TokenError> {
        if spender.is_zero() {
            return Err(TokenError::InvalidReceiver(spender));
        }
        // Set allowance (can be 0 to revoke)
        self.allowances
            .entry(owner)
            .or_default()
            .insert(spender, amount);

        Ok(TokenEvent::Approval {
            owner,
            spender,
            amount,
        })
    }

    /// Transfer tokens on behalf of owner (requires prior approval)
    ///
    /// An allowance of `U256::MAX` is never decreased.
    pub fn transfer_from(
        &mut self,
        spender: Address,
        from: Address,
        to: Address,
        amount: U256,
    ) -> Result<TokenEvent, TokenError> {
        let current_allowance = self.allowance(&from, &spender);
        if current_allowance < amount {
            return Err(TokenError::InsufficientAllowance {
                have: current_allowance,
                need: amount,
            });
        }

        let event = self.transfer(from, to, amount)?;

        if let Some(allowance) = self
            .allowances
            .get_mut(&from)
            .and_then(|spenders| spenders.get_mut(&spender))
        {
            if *allowance != U256::MAX {
                *allowance -= amount;
            }
        }

        Ok(event)
    }

    // =========================================================================
    // ABI entry point
    // =========================================================================

    /// Execute a decoded call from `caller`, returning ABI return data
    pub fn execute(
        &mut self,
        caller: Address,
        call: Erc20Call,
    ) -> Result<(Vec<u8>, Vec<TokenEvent>), TokenError> {
        let ok = || true.abi_encode();

        let result = match call {
            Erc20Call::Name => (self.name().to_string().abi_encode(), vec![]),
            Erc20Call::Symbol => (self.symbol().to_string().abi_encode(), vec![]),
            Erc20Call::Decimals => (<alloy_sol_types::sol_data::Uint<8> as alloy_sol_types::SolType>::abi_encode(&self.decimals()), vec![]),
            Erc20Call::TotalSupply => (self.total_supply.abi_encode(), vec![]),
            Erc20Call::BalanceOf(who) => (self.balance_of(&who).abi_encode(), vec![]),
            Erc20Call::Allowance { owner, spender } => {
                (self.allowance(&owner, &spender).abi_encode(), vec![])
            }
            Erc20Call::Transfer { to, amount } => {
                (ok(), vec![self.transfer(caller, to, amount)?])
            }
            Erc20Call::Approve { spender, amount } => {
                (ok(), vec![self.approve(caller, spender, amount)?])
            }
            Erc20Call::TransferFrom { from, to, amount } => {
                (ok(), vec![self.transfer_from(caller, from, to, amount)?])
            }
            Erc20Call::Mint { to, amount } => (Vec::new(), vec![self.mint(to, amount)?]),
        };
        Ok(result)
    }
}
