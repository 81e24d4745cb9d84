//! Solidity ABI surface
//!
//! Every call payload the engine and its collaborators exchange is declared
//! here with `sol!`, and encoded and decoded by `alloy-sol-types`. The
//! `SafeTx` struct doubles as the EIP-712 type the transaction hash is
//! computed over.

use crate::core::types::U256;
use alloy_sol_types::sol;
use thiserror::Error;

sol! {
    /// EIP-712 message signed by owners
    #[derive(Debug, PartialEq, Eq)]
    struct SafeTx {
        address to;
        uint256 value;
        bytes data;
        uint8 operation;
        uint256 safeTxGas;
        uint256 baseGas;
        uint256 gasPrice;
        address gasToken;
        address refundReceiver;
        uint256 nonce;
    }

    /// One sealed allotment handed out by `wrapAndDistribute`
    #[derive(Debug, PartialEq, Eq)]
    struct Share {
        address to;
        bytes amount;
    }

    /// Externally callable surface of an account
    #[sol(all_derives)]
    interface ISafe {
        function execTransaction(
            address to,
            uint256 value,
            bytes data,
            uint8 operation,
            uint256 safeTxGas,
            uint256 baseGas,
            uint256 gasPrice,
            address gasToken,
            address refundReceiver,
            bytes signatures
        ) external payable returns (bool success);
        function approveHash(bytes32 hashToApprove) external;
        function revokeApprovedHash(bytes32 hashToRevoke) external;
        function approvedHashes(address owner, bytes32 hash) external view returns (uint256);
        function getThreshold() external view returns (uint256);
        function getOwners() external view returns (address[] memory);
        function isOwner(address owner) external view returns (bool);
        function nonce() external view returns (uint256);
        function domainSeparator() external view returns (bytes32);
        function addOwnerWithThreshold(address owner, uint256 _threshold) external;
        function removeOwner(address prevOwner, address owner, uint256 _threshold) external;
        function swapOwner(address prevOwner, address oldOwner, address newOwner) external;
        function changeThreshold(uint256 _threshold) external;
    }

    #[sol(all_derives)]
    interface IERC20 {
        function name() external view returns (string);
        function symbol() external view returns (string);
        function decimals() external view returns (uint8);
        function totalSupply() external view returns (uint256);
        function balanceOf(address owner) external view returns (uint256);
        function allowance(address owner, address spender) external view returns (uint256);
        function transfer(address to, uint256 amount) external returns (bool);
        function approve(address spender, uint256 amount) external returns (bool);
        function transferFrom(address from, address to, uint256 amount) external returns (bool);
        function mint(address to, uint256 amount) external;
    }

    /// Token whose amounts are sealed payloads
    #[sol(all_derives)]
    interface IConfidentialERC20 {
        function mint(uint64 amount) external returns (bool);
        function totalSupply() external view returns (uint64);
        function balanceOf(address owner) external view returns (bytes);
        function approve(address spender, bytes amount) external returns (bool);
        function transfer(address to, bytes amount) external returns (bool);
        function transferFrom(address from, address to, bytes amount) external returns (bool);
        function wrapAndDistribute(uint256 amount, bytes shares) external returns (bool);
    }

    #[sol(all_derives)]
    interface IMultiSend {
        function multiSend(bytes transactions) external payable;
    }
}

/// ABI codec errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AbiError {
    #[error("Call data shorter than a selector")]
    MissingSelector,
    #[error("Unknown selector: 0x{}", hex::encode(.0))]
    UnknownSelector([u8; 4]),
    #[error("Invalid call data: {0}")]
    Decode(String),
    #[error("Value {0} does not fit in 64 bits")]
    Overflow(U256),
}

impl From<alloy_sol_types::Error> for AbiError {
    fn from(e: alloy_sol_types::Error) -> Self {
        match e {
            alloy_sol_types::Error::UnknownSelector { selector, .. } => {
                AbiError::UnknownSelector(selector.0)
            }
            other => AbiError::Decode(other.to_string()),
        }
    }
}

/// The 4-byte selector a payload starts with
pub fn selector_of(data: &[u8]) -> Result<[u8; 4], AbiError> {
    let mut sel = [0u8; 4];
    sel.copy_from_slice(data.get(..4).ok_or(AbiError::MissingSelector)?);
    Ok(sel)
}

/// Narrow a `uint256` argument to `u64`
pub fn to_u64(value: U256) -> Result<u64, AbiError> {
    u64::try_from(value).map_err(|_| AbiError::Overflow(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{address_from_low_u64, Address, Bytes};
    use alloy_sol_types::{SolCall, SolInterface, SolValue};

    #[test]
    fn test_well_known_selectors() {
        assert_eq!(IERC20::transferCall::SELECTOR, [0xa9, 0x05, 0x9c, 0xbb]);
        assert_eq!(IERC20::approveCall::SELECTOR, [0x09, 0x5e, 0xa7, 0xb3]);
        assert_eq!(ISafe::approveHashCall::SELECTOR, [0xd4, 0xd9, 0xbd, 0xcd]);
        assert_eq!(ISafe::execTransactionCall::SELECTOR, [0x6a, 0x76, 0x12, 0x02]);
        assert_eq!(IMultiSend::multiSendCall::SELECTOR, [0x8d, 0x80, 0xff, 0x0a]);
        assert_eq!(
            IConfidentialERC20::wrapAndDistributeCall::SELECTOR,
            [0xf9, 0x8a, 0xa0, 0x85]
        );
    }

    #[test]
    fn test_static_encoding_layout() {
        let to = address_from_low_u64(0xb0b);
        let data = IERC20::transferCall {
            to,
            amount: U256::MAX,
        }
        .abi_encode();

        assert_eq!(data.len(), 4 + 64);
        assert_eq!(&data[16..36], to.as_slice());
        assert!(data[36..].iter().all(|b| *b == 0xff));
    }

    #[test]
    fn test_interface_dispatch() {
        let data = IERC20::approveCall {
            spender: address_from_low_u64(1),
            amount: U256::from(5u64),
        }
        .abi_encode();

        match IERC20::IERC20Calls::abi_decode(&data).unwrap() {
            IERC20::IERC20Calls::approve(call) => assert_eq!(call.amount, U256::from(5u64)),
            other => panic!("unexpected call {:?}", other),
        }

        let unknown = AbiError::from(IERC20::IERC20Calls::abi_decode(&[1, 2, 3, 4]).unwrap_err());
        assert_eq!(unknown, AbiError::UnknownSelector([1, 2, 3, 4]));
    }

    #[test]
    fn test_truncated_call_rejected() {
        let data = IERC20::transferCall {
            to: Address::ZERO,
            amount: U256::from(1u64),
        }
        .abi_encode();
        assert!(IERC20::transferCall::abi_decode(&data[..40]).is_err());
        assert_eq!(selector_of(&data[..3]), Err(AbiError::MissingSelector));
    }

    #[test]
    fn test_share_array_encoding() {
        let shares = vec![Share {
            to: address_from_low_u64(3),
            amount: Bytes::from(vec![1u8, 2, 3]),
        }];
        let encoded = shares.abi_encode();

        // Offset to the array, then its length
        assert_eq!(U256::from_be_slice(&encoded[..32]), U256::from(32u64));
        assert_eq!(U256::from_be_slice(&encoded[32..64]), U256::from(1u64));
        assert_eq!(Vec::<Share>::abi_decode(&encoded).unwrap(), shares);
    }

    #[test]
    fn test_to_u64() {
        assert_eq!(to_u64(U256::from(7u64)), Ok(7));
        assert_eq!(
            to_u64(U256::from(u64::MAX) + U256::from(1u64)),
            Err(AbiError::Overflow(U256::from(u64::MAX) + U256::from(1u64)))
        );
    }
}
