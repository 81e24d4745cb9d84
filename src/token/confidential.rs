//! Confidential token
//!
//! A token whose amounts travel as opaque encrypted payloads. The account
//! engine never looks inside them; it only forwards them as call data.
//!
//! The homomorphic coprocessor of a real deployment is replaced by
//! [`SealedAmount`], a keyed seal bound to the token's address. Arithmetic
//! follows the usual select semantics of encrypted tokens: a transfer the
//! sender cannot afford moves zero instead of failing, so observers learn
//! nothing from success or failure.

use crate::core::abi::{AbiError, IConfidentialERC20, Share};
use crate::core::types::{u256_decimal, Address, Bytes, U256};
use crate::crypto::keccak256_concat;
use crate::token::token::{TokenError, TokenMetadata};
use alloy_sol_types::{SolInterface, SolValue};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Sealed amount layout: nonce (8) || masked amount (8) || tag (8)
pub const SEALED_LEN: usize = 24;

const SEAL_DOMAIN: &[u8] = b"confidential-token/seal";
const TAG_DOMAIN: &[u8] = b"confidential-token/tag";

/// Codec for amounts encrypted towards one token contract
pub struct SealedAmount;

impl SealedAmount {
    /// Seal `amount` for `contract` with a fresh random nonce
    pub fn encrypt(contract: Address, amount: u64) -> Vec<u8> {
        let mut nonce = [0u8; 8];
        rand::rngs::OsRng.fill_bytes(&mut nonce);
        Self::seal(contract, amount, nonce)
    }

    /// Seal with an explicit nonce
    pub fn seal(contract: Address, amount: u64, nonce: [u8; 8]) -> Vec<u8> {
        let pad = keccak256_concat(&[SEAL_DOMAIN, contract.as_slice(), &nonce]);
        let mut masked = amount.to_be_bytes();
        for (byte, key) in masked.iter_mut().zip(pad.0.iter()) {
            *byte ^= key;
        }
        let tag = keccak256_concat(&[TAG_DOMAIN, contract.as_slice(), &nonce, &masked]);

        let mut out = Vec::with_capacity(SEALED_LEN);
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&masked);
        out.extend_from_slice(&tag.0[..8]);
        out
    }

    /// Open a sealed amount; fails if it was not sealed for `contract`
    pub fn open(contract: Address, sealed: &[u8]) -> Result<u64, TokenError> {
        if sealed.len() != SEALED_LEN {
            return Err(TokenError::InvalidCiphertext);
        }
        let (nonce, rest) = sealed.split_at(8);
        let (masked, tag) = rest.split_at(8);

        let expected = keccak256_concat(&[TAG_DOMAIN, contract.as_slice(), nonce, masked]);
        if expected.0[..8] != *tag {
            return Err(TokenError::InvalidCiphertext);
        }

        let pad = keccak256_concat(&[SEAL_DOMAIN, contract.as_slice(), nonce]);
        let mut amount = [0u8; 8];
        for (i, byte) in amount.iter_mut().enumerate() {
            *byte = masked[i] ^ pad.0[i];
        }
        Ok(u64::from_be_bytes(amount))
    }
}

/// Events of the confidential token; amounts stay hidden except on mint
/// and wrap, which are public by nature
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum ConfidentialEvent {
    Transfer { from: Address, to: Address },
    Approval { owner: Address, spender: Address },
    Mint { to: Address, amount: u64 },
    Wrap {
        from: Address,
        #[serde(with = "u256_decimal")]
        amount: U256,
    },
}

/// A decoded confidential token call
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConfidentialCall {
    Mint { amount: u64 },
    TotalSupply,
    BalanceOf(Address),
    Approve { spender: Address, amount: Vec<u8> },
    Transfer { to: Address, amount: Vec<u8> },
    TransferFrom { from: Address, to: Address, amount: Vec<u8> },
    /// Pull `amount` of the underlying token from the caller, then hand
    /// out the sealed `shares`
    WrapAndDistribute { amount: U256, shares: Vec<(Address, Vec<u8>)> },
}

impl ConfidentialCall {
    /// Decode ABI call data
    pub fn decode(data: &[u8]) -> Result<Self, TokenError> {
        use IConfidentialERC20::IConfidentialERC20Calls as Calls;

        let call = match Calls::abi_decode(data).map_err(AbiError::from)? {
            Calls::mint(call) => ConfidentialCall::Mint {
                amount: call.amount,
            },
            Calls::totalSupply(_) => ConfidentialCall::TotalSupply,
            Calls::balanceOf(call) => ConfidentialCall::BalanceOf(call.owner),
            Calls::approve(call) => ConfidentialCall::Approve {
                spender: call.spender,
                amount: call.amount.to_vec(),
            },
            Calls::transfer(call) => ConfidentialCall::Transfer {
                to: call.to,
                amount: call.amount.to_vec(),
            },
            Calls::transferFrom(call) => ConfidentialCall::TransferFrom {
                from: call.from,
                to: call.to,
                amount: call.amount.to_vec(),
            },
            Calls::wrapAndDistribute(call) => ConfidentialCall::WrapAndDistribute {
                amount: call.amount,
                shares: decode_shares(&call.shares)?,
            },
        };
        Ok(call)
    }
}

/// Inner payload of `wrapAndDistribute`: `abi.encode(tuple(address,bytes)[])`
pub fn encode_shares(shares: &[(Address, Vec<u8>)]) -> Vec<u8> {
    shares
        .iter()
        .map(|(to, amount)| Share {
            to: *to,
            amount: Bytes::from(amount.clone()),
        })
        .collect::<Vec<_>>()
        .abi_encode()
}

fn decode_shares(data: &[u8]) -> Result<Vec<(Address, Vec<u8>)>, AbiError> {
    let shares = Vec::<Share>::abi_decode(data)?;
    Ok(shares
        .into_iter()
        .map(|share| (share.to, share.amount.to_vec()))
        .collect())
}

/// Token with encrypted balances, backed by a wrapped ERC-20
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConfidentialToken {
    pub address: Address,
    pub metadata: TokenMetadata,
    /// ERC-20 pulled in by wraps
    pub underlying: Address,
    total_supply: u64,
    balances: BTreeMap<Address, u64>,
    allowances: BTreeMap<Address, BTreeMap<Address, u64>>,
}

impl ConfidentialToken {
    pub fn new(address: Address, metadata: TokenMetadata, underlying: Address) -> Self {
        Self {
            address,
            metadata,
            underlying,
            total_supply: 0,
            balances: BTreeMap::new(),
            allowances: BTreeMap::new(),
        }
    }

    /// Supply is public
    pub fn total_supply(&self) -> u64 {
        self.total_supply
    }

    /// Encrypted balance handle of `who`
    pub fn balance_handle(&self, who: &Address) -> Vec<u8> {
        // Deterministic for an unchanged balance, like a stored handle
        let nonce_hash = keccak256_concat(&[b"balance", who.as_slice()]);
        let mut nonce = [0u8; 8];
        nonce.copy_from_slice(&nonce_hash.0[..8]);
        SealedAmount::seal(self.address, self.plain_balance(who), nonce)
    }

    /// Decrypt `who`'s balance; stands in for the re-encryption service
    pub fn reveal_balance(&self, who: &Address) -> u64 {
        self.plain_balance(who)
    }

    fn plain_balance(&self, who: &Address) -> u64 {
        self.balances.get(who).copied().unwrap_or(0)
    }

    fn allowance(&self, owner: &Address, spender: &Address) -> u64 {
        self.allowances
            .get(owner)
            .and_then(|s| s.get(spender))
            .copied()
            .unwrap_or(0)
    }

    /// Mint public `amount` to the token's creator
    pub fn mint(&mut self, caller: Address, amount: u64) -> Result<ConfidentialEvent, TokenError> {
        if caller != self.metadata.creator {
            return Err(TokenError::Unauthorized(caller));
        }
        self.credit(caller, amount)?;
        Ok(ConfidentialEvent::Mint { to: caller, amount })
    }

    fn credit(&mut self, to: Address, amount: u64) -> Result<(), TokenError> {
        let supply = self
            .total_supply
            .checked_add(amount)
            .ok_or(TokenError::SupplyOverflow)?;
        self.total_supply = supply;
        // Every balance is bounded by the supply
        *self.balances.entry(to).or_insert(0) += amount;
        Ok(())
    }

    /// Move `amount` if affordable, otherwise move zero
    fn select_transfer(&mut self, from: Address, to: Address, amount: u64) -> u64 {
        let moved = if self.plain_balance(&from) >= amount {
            amount
        } else {
            0
        };
        *self.balances.entry(from).or_insert(0) -= moved;
        *self.balances.entry(to).or_insert(0) += moved;
        moved
    }

    /// Transfer a sealed amount from `caller`
    pub fn transfer(
        &mut self,
        caller: Address,
        to: Address,
        sealed: &[u8],
    ) -> Result<ConfidentialEvent, TokenError> {
        if to.is_zero() {
            return Err(TokenError::InvalidReceiver(to));
        }
        let amount = SealedAmount::open(self.address, sealed)?;
        self.select_transfer(caller, to, amount);
        Ok(ConfidentialEvent::Transfer { from: caller, to })
    }

    /// Set `spender`'s allowance to a sealed amount
    pub fn approve(
        &mut self,
        caller: Address,
        spender: Address,
        sealed: &[u8],
    ) -> Result<ConfidentialEvent, TokenError> {
        let amount = SealedAmount::open(self.address, sealed)?;
        self.allowances
            .entry(caller)
            .or_default()
            .insert(spender, amount);
        Ok(ConfidentialEvent::Approval {
            owner: caller,
            spender,
        })
    }

    /// Spend allowance; moves zero unless both allowance and balance suffice
    pub fn transfer_from(
        &mut self,
        caller: Address,
        from: Address,
        to: Address,
        sealed: &[u8],
    ) -> Result<ConfidentialEvent, TokenError> {
        if to.is_zero() {
            return Err(TokenError::InvalidReceiver(to));
        }
        let amount = SealedAmount::open(self.address, sealed)?;
        let amount = if self.allowance(&from, &caller) >= amount {
            amount
        } else {
            0
        };
        let moved = self.select_transfer(from, to, amount);
        if let Some(allowance) = self
            .allowances
            .get_mut(&from)
            .and_then(|s| s.get_mut(&caller))
        {
            *allowance -= moved;
        }
        Ok(ConfidentialEvent::Transfer { from, to })
    }

    /// Credit a completed wrap to `from` and distribute the shares
    ///
    /// The caller (the host) must already have pulled `amount` of the
    /// underlying token into this contract.
    pub fn settle_wrap(
        &mut self,
        from: Address,
        amount: U256,
        shares: &[(Address, Vec<u8>)],
    ) -> Result<Vec<ConfidentialEvent>, TokenError> {
        let wrapped = u64::try_from(amount).map_err(|_| TokenError::SupplyOverflow)?;
        // Open everything first so a bad share rejects the whole call
        let opened = shares
            .iter()
            .map(|(to, sealed)| {
                if to.is_zero() {
                    return Err(TokenError::InvalidReceiver(*to));
                }
                Ok((*to, SealedAmount::open(self.address, sealed)?))
            })
            .collect::<Result<Vec<_>, _>>()?;

        self.credit(from, wrapped)?;
        let mut events = vec![ConfidentialEvent::Wrap { from, amount }];
        for (to, share) in opened {
            self.select_transfer(from, to, share);
            events.push(ConfidentialEvent::Transfer { from, to });
        }
        Ok(events)
    }

    /// Execute a decoded call from `caller`, returning ABI data
    ///
    /// For `WrapAndDistribute` the host must already have pulled the
    /// underlying tokens from `caller`.
    pub fn execute(
        &mut self,
        caller: Address,
        call: ConfidentialCall,
    ) -> Result<(Vec<u8>, Vec<ConfidentialEvent>), TokenError> {
        let ok = || true.abi_encode();

        let result = match call {
            ConfidentialCall::Mint { amount } => (ok(), vec![self.mint(caller, amount)?]),
            ConfidentialCall::TotalSupply => (self.total_supply.abi_encode(), vec![]),
            ConfidentialCall::BalanceOf(who) => (
                Bytes::from(self.balance_handle(&who)).abi_encode(),
                vec![],
            ),
            ConfidentialCall::Approve { spender, amount } => {
                (ok(), vec![self.approve(caller, spender, &amount)?])
            }
            ConfidentialCall::Transfer { to, amount } => {
                (ok(), vec![self.transfer(caller, to, &amount)?])
            }
            ConfidentialCall::TransferFrom { from, to, amount } => {
                (ok(), vec![self.transfer_from(caller, from, to, &amount)?])
            }
            ConfidentialCall::WrapAndDistribute { amount, shares } => {
                (ok(), self.settle_wrap(caller, amount, &shares)?)
            }
        };
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::address_from_low_u64;
    use alloy_sol_types::SolCall;

    const CONTRACT: Address = Address::repeat_byte(0xcc);

    fn alice() -> Address {
        address_from_low_u64(0xa11ce)
    }

    fn bob() -> Address {
        address_from_low_u64(0xb0b)
    }

    fn token() -> ConfidentialToken {
        let metadata =
            TokenMetadata::new("Encrypted".to_string(), "ENC".to_string(), 6, alice()).unwrap();
        ConfidentialToken::new(CONTRACT, metadata, address_from_low_u64(0x20))
    }

    #[test]
    fn test_seal_and_open() {
        let sealed = SealedAmount::encrypt(CONTRACT, 960_000);
        assert_eq!(sealed.len(), SEALED_LEN);
        assert_eq!(SealedAmount::open(CONTRACT, &sealed), Ok(960_000));

        // Bound to the contract
        assert_eq!(
            SealedAmount::open(address_from_low_u64(1), &sealed),
            Err(TokenError::InvalidCiphertext)
        );

        // Tampering is detected
        let mut tampered = sealed.clone();
        tampered[9] ^= 1;
        assert_eq!(
            SealedAmount::open(CONTRACT, &tampered),
            Err(TokenError::InvalidCiphertext)
        );
    }

    #[test]
    fn test_mint_is_creator_only() {
        let mut t = token();
        t.mint(alice(), 1000).unwrap();
        assert_eq!(t.total_supply(), 1000);
        assert_eq!(t.reveal_balance(&alice()), 1000);

        assert_eq!(t.mint(bob(), 1), Err(TokenError::Unauthorized(bob())));
    }

    #[test]
    fn test_balance_handle_is_opaque() {
        let mut t = token();
        t.mint(alice(), 1000).unwrap();

        let handle = t.balance_handle(&alice());
        assert_eq!(SealedAmount::open(CONTRACT, &handle), Ok(1000));
        assert!(!handle.windows(8).any(|w| w == 1000u64.to_be_bytes()));
    }

    #[test]
    fn test_unaffordable_transfer_moves_zero() {
        let mut t = token();
        t.mint(alice(), 100).unwrap();

        t.transfer(alice(), bob(), &SealedAmount::encrypt(CONTRACT, 500))
            .unwrap();
        assert_eq!(t.reveal_balance(&alice()), 100);
        assert_eq!(t.reveal_balance(&bob()), 0);

        t.transfer(alice(), bob(), &SealedAmount::encrypt(CONTRACT, 40))
            .unwrap();
        assert_eq!(t.reveal_balance(&alice()), 60);
        assert_eq!(t.reveal_balance(&bob()), 40);
    }

    #[test]
    fn test_transfer_from_respects_allowance() {
        let mut t = token();
        t.mint(alice(), 100).unwrap();
        t.approve(alice(), bob(), &SealedAmount::encrypt(CONTRACT, 30))
            .unwrap();

        // Above allowance: nothing moves
        t.transfer_from(bob(), alice(), bob(), &SealedAmount::encrypt(CONTRACT, 31))
            .unwrap();
        assert_eq!(t.reveal_balance(&bob()), 0);

        t.transfer_from(bob(), alice(), bob(), &SealedAmount::encrypt(CONTRACT, 30))
            .unwrap();
        assert_eq!(t.reveal_balance(&bob()), 30);
        assert_eq!(t.allowance(&alice(), &bob()), 0);
    }

    #[test]
    fn test_wrap_and_distribute_call() {
        let shares = vec![
            (address_from_low_u64(1), SealedAmount::encrypt(CONTRACT, 10_000)),
            (address_from_low_u64(2), SealedAmount::encrypt(CONTRACT, 30_000)),
            (address_from_low_u64(3), SealedAmount::encrypt(CONTRACT, 960_000)),
        ];
        let data = IConfidentialERC20::wrapAndDistributeCall {
            amount: U256::from(1_000_000),
            shares: encode_shares(&shares).into(),
        }
        .abi_encode();
        assert_eq!(&data[..4], &[0xf9, 0x8a, 0xa0, 0x85]);

        let call = ConfidentialCall::decode(&data).unwrap();
        let mut t = token();
        let sender = address_from_low_u64(0x5afe);
        let (_, events) = t.execute(sender, call).unwrap();

        assert_eq!(events.len(), 4);
        assert_eq!(t.total_supply(), 1_000_000);
        assert_eq!(t.reveal_balance(&sender), 0);
        assert_eq!(t.reveal_balance(&address_from_low_u64(3)), 960_000);
    }

    #[test]
    fn test_bad_share_rejects_wrap() {
        let mut t = token();
        let shares = vec![(bob(), vec![0u8; 3])];
        assert_eq!(
            t.settle_wrap(alice(), U256::from(10), &shares),
            Err(TokenError::InvalidCiphertext)
        );
        assert_eq!(t.total_supply(), 0);
    }

    #[test]
    fn test_wrap_beyond_u64_rejected() {
        let mut t = token();
        assert_eq!(
            t.settle_wrap(alice(), U256::from(u64::MAX) + U256::from(1), &[]),
            Err(TokenError::SupplyOverflow)
        );
    }

    #[test]
    fn test_abi_views() {
        let mut t = token();
        t.mint(alice(), 1000).unwrap();

        let data = IConfidentialERC20::totalSupplyCall {}.abi_encode();
        let (ret, _) = t
            .execute(bob(), ConfidentialCall::decode(&data).unwrap())
            .unwrap();
        assert_eq!(u64::abi_decode(&ret).unwrap(), 1000);

        let data = IConfidentialERC20::balanceOfCall { owner: alice() }.abi_encode();
        let (ret, _) = t
            .execute(bob(), ConfidentialCall::decode(&data).unwrap())
            .unwrap();
        let handle = Bytes::abi_decode(&ret).unwrap();
        assert_eq!(SealedAmount::open(CONTRACT, &handle), Ok(1000));
    }
}
