//! Token contracts an account interacts with
//!
//! - `Erc20Token`: a mintable ERC-20 with balances and allowances
//! - `ConfidentialToken`: a token whose amounts are opaque sealed payloads,
//!   funded by wrapping an ERC-20
//!
//! # Example
//!
//! ```ignore
//! use safe_engine::token::{Erc20Token, TokenMetadata};
//!
//! let metadata = TokenMetadata::new("My Token".into(), "MTK".into(), 18, creator)?;
//! let mut token = Erc20Token::new(address, metadata);
//! token.mint(creator, U256::from(1_000_000))?;
//! token.transfer(creator, recipient, U256::from(1000))?;
//! assert_eq!(token.balance_of(&recipient), U256::from(1000));
//! ```

pub mod confidential;
pub mod token;

pub use confidential::{
    encode_shares, ConfidentialCall, ConfidentialEvent, ConfidentialToken, SealedAmount,
};
pub use token::{Erc20Call, Erc20Token, TokenError, TokenEvent, TokenMetadata};
