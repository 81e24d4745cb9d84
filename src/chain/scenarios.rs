//! End-to-end flows of accounts executing on the in-memory chain

use crate::chain::{Chain, ChainError};
use crate::core::abi::{IConfidentialERC20, IERC20};
use crate::core::gas::DEFAULT_GAS_LIMIT;
use crate::core::types::{address_from_low_u64, Address, U256};
use crate::crypto::KeyPair;
use crate::safe::{
    encode_exec_transaction, BatchCall, ManagementCall, MultiSendBatch, Operation, SafeError,
    SafeEvent, SafeTransaction, SafeTransactionBuilder, SignatureBundle,
};
use crate::token::{encode_shares, SealedAmount};
use alloy_sol_types::SolCall;

fn deployer() -> Address {
    address_from_low_u64(0xde)
}

fn relayer() -> Address {
    address_from_low_u64(0x7e1a)
}

fn recipient() -> Address {
    address_from_low_u64(0x1000)
}

/// Chain with one funded account owned by `keys`
fn setup(keys: &[&KeyPair], threshold: usize, funds: u64) -> (Chain, Address) {
    let mut chain = Chain::default();
    let owners = keys.iter().map(|k| k.address()).collect();
    let safe = chain.deploy_safe(deployer(), owners, threshold).unwrap();
    chain.credit(safe, U256::from(funds)).unwrap();
    (chain, safe)
}

fn sign(chain: &Chain, safe: Address, tx: &SafeTransaction, keys: &[&KeyPair]) -> Vec<u8> {
    let hash = chain.safe(safe).unwrap().get_transaction_hash(tx);
    keys.iter()
        .fold(SignatureBundle::new(), |bundle, key| bundle.sign(key, &hash))
        .encode()
}

fn exec(
    chain: &mut Chain,
    safe: Address,
    tx: &SafeTransaction,
    signatures: &[u8],
) -> Result<crate::safe::ExecutionOutcome, ChainError> {
    chain.exec_transaction(relayer(), safe, tx, signatures, DEFAULT_GAS_LIMIT, U256::ZERO)
}

/// Mint `amount` of the ERC-20 at `token` to `to`
fn mint(chain: &mut Chain, token: Address, to: Address, amount: U256) {
    let data = IERC20::mintCall { to, amount }.abi_encode();
    chain
        .call(deployer(), token, U256::ZERO, &data, DEFAULT_GAS_LIMIT)
        .unwrap();
}

fn wrap_call(amount: u64, shares: &[(Address, Vec<u8>)]) -> Vec<u8> {
    IConfidentialERC20::wrapAndDistributeCall {
        amount: U256::from(amount),
        shares: encode_shares(shares).into(),
    }
    .abi_encode()
}

#[test]
fn test_single_owner_transfer() {
    let a = KeyPair::generate();
    let b = KeyPair::generate();
    let (mut chain, safe) = setup(&[&a, &b], 1, 5_000);

    let tx = SafeTransaction::call(recipient(), U256::from(1_000), vec![], 0);
    let sigs = sign(&chain, safe, &tx, &[&a]);
    let outcome = exec(&mut chain, safe, &tx, &sigs).unwrap();

    assert!(outcome.success);
    assert_eq!(outcome.nonce, 0);
    assert_eq!(chain.balance_of(recipient()), U256::from(1_000));
    assert_eq!(chain.balance_of(safe), U256::from(4_000));
    assert_eq!(chain.safe(safe).unwrap().nonce(), 1);
    assert_eq!(
        chain.safe_events(safe).last(),
        Some(&&SafeEvent::ExecutionSuccess {
            tx_hash: outcome.tx_hash,
            payment: U256::ZERO
        })
    );
}

#[test]
fn test_replay_rejected() {
    let a = KeyPair::generate();
    let (mut chain, safe) = setup(&[&a], 1, 5_000);

    let tx = SafeTransaction::call(recipient(), U256::from(1_000), vec![], 0);
    let sigs = sign(&chain, safe, &tx, &[&a]);
    exec(&mut chain, safe, &tx, &sigs).unwrap();

    let replay = exec(&mut chain, safe, &tx, &sigs);
    assert_eq!(
        replay,
        Err(ChainError::Safe(SafeError::NonceMismatch {
            expected: 1,
            actual: 0
        }))
    );
    assert_eq!(chain.balance_of(recipient()), U256::from(1_000));
    assert_eq!(chain.safe(safe).unwrap().nonce(), 1);
}

#[test]
fn test_threshold_not_met_then_met() {
    let a = KeyPair::generate();
    let b = KeyPair::generate();
    let (mut chain, safe) = setup(&[&a, &b], 2, 5_000);

    let tx = SafeTransaction::call(recipient(), U256::from(1_000), vec![], 0);
    let one = sign(&chain, safe, &tx, &[&a]);
    assert_eq!(
        exec(&mut chain, safe, &tx, &one),
        Err(ChainError::Safe(SafeError::ThresholdNotMet { have: 1, need: 2 }))
    );
    assert_eq!(chain.safe(safe).unwrap().nonce(), 0);
    assert_eq!(chain.balance_of(recipient()), U256::ZERO);

    let both = sign(&chain, safe, &tx, &[&a, &b]);
    assert!(exec(&mut chain, safe, &tx, &both).unwrap().success);
    assert_eq!(chain.balance_of(recipient()), U256::from(1_000));
}

#[test]
fn test_mixed_signature_kinds() {
    let a = KeyPair::generate();
    let b = KeyPair::generate();
    let c = KeyPair::generate();
    let (mut chain, safe) = setup(&[&a, &b, &c], 3, 5_000);

    let tx = SafeTransaction::call(recipient(), U256::from(10), vec![], 0);
    let hash = chain.safe(safe).unwrap().get_transaction_hash(&tx);
    chain
        .approve_hash(c.address(), safe, hash, DEFAULT_GAS_LIMIT)
        .unwrap();

    let sigs = SignatureBundle::new()
        .sign(&a, &hash)
        .sign_eth_message(&b, &hash)
        .approved(c.address())
        .encode();
    assert!(exec(&mut chain, safe, &tx, &sigs).unwrap().success);
}

#[test]
fn test_typed_data_round_trip_authorizes() {
    let a = KeyPair::generate();
    let (mut chain, safe) = setup(&[&a], 1, 5_000);

    let tx = SafeTransaction::call(recipient(), U256::from(10), vec![], 0);
    let typed = chain.safe(safe).unwrap().typed_data(&tx);
    let json = serde_json::to_string(&typed).unwrap();

    // A wallet signs what it was shown
    let shown: crate::safe::SafeTxTypedData = serde_json::from_str(&json).unwrap();
    let digest = shown.signing_hash().unwrap();
    let sigs = SignatureBundle::new().sign(&a, &digest).encode();

    let rebuilt = shown.to_transaction().unwrap();
    assert!(exec(&mut chain, safe, &rebuilt, &sigs).unwrap().success);
}

#[test]
fn test_submitter_approval_only_for_submitter() {
    let a = KeyPair::generate();
    let (mut chain, safe) = setup(&[&a], 1, 5_000);

    let tx = SafeTransaction::call(recipient(), U256::from(10), vec![], 0);
    let sigs = SignatureBundle::new().approved(a.address()).encode();

    assert_eq!(
        exec(&mut chain, safe, &tx, &sigs),
        Err(ChainError::Safe(SafeError::ApprovalMissing(a.address())))
    );

    let outcome = chain
        .exec_transaction(a.address(), safe, &tx, &sigs, DEFAULT_GAS_LIMIT, U256::ZERO)
        .unwrap();
    assert!(outcome.success);
}

#[test]
fn test_inner_failure_consumes_nonce() {
    let a = KeyPair::generate();
    let (mut chain, safe) = setup(&[&a], 1, 100);

    let tx = SafeTransaction::call(recipient(), U256::from(1_000), vec![], 0);
    let sigs = sign(&chain, safe, &tx, &[&a]);
    let outcome = exec(&mut chain, safe, &tx, &sigs).unwrap();

    assert!(!outcome.success);
    assert!(matches!(outcome.inner_error, Some(SafeError::InnerCallFailed(_))));
    assert_eq!(chain.safe(safe).unwrap().nonce(), 1);
    assert_eq!(chain.balance_of(safe), U256::from(100));
    assert!(matches!(
        chain.safe_events(safe).last(),
        Some(SafeEvent::ExecutionFailure { .. })
    ));
}

#[test]
fn test_native_refund_capped_by_submitter_price() {
    let a = KeyPair::generate();
    let (mut chain, safe) = setup(&[&a], 1, 10_000_000);

    let tx = SafeTransactionBuilder::new(recipient())
        .value(U256::from(1))
        .base_gas(1_000)
        .gas_price(U256::from(10))
        .build();
    let sigs = sign(&chain, safe, &tx, &[&a]);
    let outcome = chain
        .exec_transaction(relayer(), safe, &tx, &sigs, DEFAULT_GAS_LIMIT, U256::from(5))
        .unwrap();

    assert!(outcome.success);
    assert!(outcome.refund_error.is_none());
    assert_eq!(
        outcome.payment,
        (U256::from(outcome.gas_used) + U256::from(1_000)) * U256::from(5)
    );
    assert_eq!(chain.balance_of(relayer()), outcome.payment);
    assert_eq!(
        chain.balance_of(safe),
        U256::from(10_000_000 - 1) - outcome.payment
    );
}

#[test]
fn test_token_refund_to_receiver() {
    let a = KeyPair::generate();
    let (mut chain, safe) = setup(&[&a], 1, 0);
    let token = chain.deploy_token(deployer(), "Gas", "GAS", 18).unwrap();
    mint(&mut chain, token, safe, U256::from(1_000_000_000));

    let receiver = address_from_low_u64(0xfee);
    let tx = SafeTransactionBuilder::new(recipient())
        .gas_price(U256::from(2))
        .gas_token(token)
        .refund_receiver(receiver)
        .build();
    let sigs = sign(&chain, safe, &tx, &[&a]);
    let outcome = exec(&mut chain, safe, &tx, &sigs).unwrap();

    assert_eq!(outcome.payment, U256::from(outcome.gas_used) * U256::from(2));
    assert_eq!(
        chain.token(token).unwrap().balance_of(&receiver),
        outcome.payment
    );
}

#[test]
fn test_refund_failure_is_not_fatal() {
    let a = KeyPair::generate();
    let (mut chain, safe) = setup(&[&a], 1, 0);

    // Nothing to pay the refund with
    let tx = SafeTransactionBuilder::new(recipient())
        .gas_price(U256::from(1))
        .build();
    let sigs = sign(&chain, safe, &tx, &[&a]);
    let outcome = exec(&mut chain, safe, &tx, &sigs).unwrap();

    assert!(outcome.success);
    assert_eq!(outcome.payment, U256::ZERO);
    assert!(matches!(
        outcome.refund_error,
        Some(SafeError::RefundTransferFailed(_))
    ));
    assert_eq!(chain.safe(safe).unwrap().nonce(), 1);
    assert!(chain
        .safe_events(safe)
        .iter()
        .any(|e| matches!(e, SafeEvent::RefundFailed { .. })));
}

#[test]
fn test_management_through_self_call() {
    let a = KeyPair::generate();
    let b = KeyPair::generate();
    let c = KeyPair::generate();
    let (mut chain, safe) = setup(&[&a, &b], 1, 0);

    let add = ManagementCall::AddOwnerWithThreshold {
        owner: c.address(),
        threshold: 2,
    };
    let tx = SafeTransaction::call(safe, U256::ZERO, add.encode(), 0);
    let sigs = sign(&chain, safe, &tx, &[&a]);
    assert!(exec(&mut chain, safe, &tx, &sigs).unwrap().success);

    let account = chain.safe(safe).unwrap();
    assert_eq!(account.owners()[0], c.address());
    assert_eq!(account.threshold(), 2);
    assert!(chain
        .safe_events(safe)
        .iter()
        .any(|e| **e == SafeEvent::AddedOwner { owner: c.address() }));

    // Wrong predecessor: recorded as a failed inner call
    let remove = ManagementCall::RemoveOwner {
        prev_owner: a.address(),
        owner: a.address(),
        threshold: 1,
    };
    let tx = SafeTransaction::call(safe, U256::ZERO, remove.encode(), 1);
    let sigs = sign(&chain, safe, &tx, &[&a, &b]);
    let outcome = exec(&mut chain, safe, &tx, &sigs).unwrap();

    assert!(!outcome.success);
    let account = chain.safe(safe).unwrap();
    assert_eq!(account.owners().len(), 3);
    assert_eq!(account.threshold(), 2);
    assert_eq!(account.nonce(), 2);
}

#[test]
fn test_external_management_rejected() {
    let a = KeyPair::generate();
    let (mut chain, safe) = setup(&[&a], 1, 0);

    let data = ManagementCall::ChangeThreshold { threshold: 1 }.encode();
    let result = chain.call(a.address(), safe, U256::ZERO, &data, DEFAULT_GAS_LIMIT);
    assert!(matches!(result, Err(ChainError::Call(_))));
}

#[test]
fn test_multisend_batch() {
    let a = KeyPair::generate();
    let (mut chain, safe) = setup(&[&a], 1, 1_000);
    let multisend = chain.deploy_multisend(deployer());
    let other = address_from_low_u64(0x2000);

    let batch = MultiSendBatch::new()
        .push(BatchCall::new(recipient(), U256::from(300), vec![]))
        .push(BatchCall::new(other, U256::from(200), vec![]));
    let tx = SafeTransactionBuilder::new(multisend)
        .data(batch.encode_call())
        .operation(Operation::DelegateCall)
        .build();
    let sigs = sign(&chain, safe, &tx, &[&a]);

    assert!(exec(&mut chain, safe, &tx, &sigs).unwrap().success);
    assert_eq!(chain.balance_of(recipient()), U256::from(300));
    assert_eq!(chain.balance_of(other), U256::from(200));
    assert_eq!(chain.balance_of(safe), U256::from(500));
}

#[test]
fn test_multisend_all_or_nothing() {
    let a = KeyPair::generate();
    let b = KeyPair::generate();
    let (mut chain, safe) = setup(&[&a], 1, 1_000);
    let multisend = chain.deploy_multisend(deployer());
    let token = chain.deploy_token(deployer(), "Test", "TST", 18).unwrap();

    let add = ManagementCall::AddOwnerWithThreshold {
        owner: b.address(),
        threshold: 1,
    };
    // The account holds no tokens, so the last call fails
    let unaffordable = IERC20::transferCall {
        to: recipient(),
        amount: U256::from(1),
    }
    .abi_encode();
    let batch = MultiSendBatch::new()
        .push(BatchCall::new(recipient(), U256::from(300), vec![]))
        .push(BatchCall::new(safe, U256::ZERO, add.encode()))
        .push(BatchCall::new(token, U256::ZERO, unaffordable));
    let tx = SafeTransactionBuilder::new(multisend)
        .data(batch.encode_call())
        .operation(Operation::DelegateCall)
        .build();
    let sigs = sign(&chain, safe, &tx, &[&a]);
    let outcome = exec(&mut chain, safe, &tx, &sigs).unwrap();

    assert!(!outcome.success);
    assert_eq!(chain.balance_of(recipient()), U256::ZERO);
    assert_eq!(chain.balance_of(safe), U256::from(1_000));
    let account = chain.safe(safe).unwrap();
    assert_eq!(account.owners(), &[a.address()]);
    assert_eq!(account.nonce(), 1);
    assert!(!chain
        .safe_events(safe)
        .iter()
        .any(|e| matches!(e, SafeEvent::AddedOwner { .. })));
}

#[test]
fn test_delegate_call_to_unknown_contract_fails() {
    let a = KeyPair::generate();
    let (mut chain, safe) = setup(&[&a], 1, 0);
    let token = chain.deploy_token(deployer(), "Test", "TST", 18).unwrap();

    let tx = SafeTransactionBuilder::new(token)
        .data(vec![1, 2, 3, 4])
        .operation(Operation::DelegateCall)
        .build();
    let sigs = sign(&chain, safe, &tx, &[&a]);
    assert!(!exec(&mut chain, safe, &tx, &sigs).unwrap().success);
}

#[test]
fn test_wrap_and_distribute_flow() {
    let alice = KeyPair::generate();
    let eve = KeyPair::generate();
    let bob = KeyPair::generate();
    let carol = KeyPair::generate();
    let dave = KeyPair::generate();

    let mut chain = Chain::default();
    let erc20 = chain.deploy_token(deployer(), "Test", "TST", 18).unwrap();
    let encrypted = chain
        .deploy_confidential_token(deployer(), "Encrypted", "ENC", 6, erc20)
        .unwrap();

    let mut deploy = |owner: &KeyPair| {
        chain
            .deploy_safe(deployer(), vec![owner.address(), eve.address()], 1)
            .unwrap()
    };
    let owner_safe = deploy(&alice);
    let bob_safe = deploy(&bob);
    let carol_safe = deploy(&carol);
    let dave_safe = deploy(&dave);

    mint(&mut chain, erc20, owner_safe, U256::from(1_000_000));

    // Approve the confidential token. The refund token is the account
    // itself, which cannot pay, so only the refund fails.
    let approve = IERC20::approveCall {
        spender: encrypted,
        amount: U256::from(1_000_000),
    }
    .abi_encode();
    let tx = SafeTransactionBuilder::new(erc20)
        .data(approve)
        .safe_tx_gas(1_000_000)
        .gas_price(U256::from(1_000_000))
        .gas_token(owner_safe)
        .refund_receiver(alice.address())
        .nonce(0)
        .build();
    let sigs = SignatureBundle::new().approved(alice.address()).encode();
    let outcome = chain
        .exec_transaction(alice.address(), owner_safe, &tx, &sigs, 10_000_000, U256::from(1))
        .unwrap();

    assert!(outcome.success);
    assert!(outcome.refund_error.is_some());
    assert_eq!(
        chain.token(erc20).unwrap().allowance(&owner_safe, &encrypted),
        U256::from(1_000_000)
    );

    // Wrap everything and hand out sealed shares
    let shares = vec![
        (bob_safe, SealedAmount::encrypt(encrypted, 10_000)),
        (carol_safe, SealedAmount::encrypt(encrypted, 30_000)),
        (dave_safe, SealedAmount::encrypt(encrypted, 960_000)),
    ];
    let wrap = wrap_call(1_000_000, &shares);
    let tx = SafeTransactionBuilder::new(encrypted)
        .data(wrap)
        .safe_tx_gas(1_000_000)
        .gas_token(alice.address())
        .refund_receiver(owner_safe)
        .nonce(1)
        .build();
    let sigs = SignatureBundle::new().approved(alice.address()).encode();
    let outcome = chain
        .exec_transaction(alice.address(), owner_safe, &tx, &sigs, 10_000_000, U256::from(1))
        .unwrap();
    assert!(outcome.success, "{:?}", outcome.inner_error);

    let underlying = chain.token(erc20).unwrap();
    assert_eq!(underlying.balance_of(&encrypted), U256::from(1_000_000));
    assert_eq!(underlying.balance_of(&owner_safe), U256::ZERO);

    let confidential = chain.confidential(encrypted).unwrap();
    assert_eq!(confidential.total_supply(), 1_000_000);
    assert_eq!(confidential.reveal_balance(&bob_safe), 10_000);
    assert_eq!(confidential.reveal_balance(&carol_safe), 30_000);
    assert_eq!(confidential.reveal_balance(&dave_safe), 960_000);
    assert_eq!(confidential.reveal_balance(&owner_safe), 0);
    assert_eq!(chain.safe(owner_safe).unwrap().nonce(), 2);
}

#[test]
fn test_wrap_without_allowance_fails_atomically() {
    let alice = KeyPair::generate();
    let (mut chain, safe) = setup(&[&alice], 1, 0);
    let erc20 = chain.deploy_token(deployer(), "Test", "TST", 18).unwrap();
    let encrypted = chain
        .deploy_confidential_token(deployer(), "Encrypted", "ENC", 6, erc20)
        .unwrap();
    mint(&mut chain, erc20, safe, U256::from(500));

    let shares = vec![(recipient(), SealedAmount::encrypt(encrypted, 500))];
    let tx = SafeTransaction::call(encrypted, U256::ZERO, wrap_call(500, &shares), 0);
    let sigs = sign(&chain, safe, &tx, &[&alice]);
    let outcome = exec(&mut chain, safe, &tx, &sigs).unwrap();

    assert!(!outcome.success);
    assert_eq!(
        chain.token(erc20).unwrap().balance_of(&safe),
        U256::from(500)
    );
    assert_eq!(chain.confidential(encrypted).unwrap().total_supply(), 0);
}

#[test]
fn test_unlimited_token_approval() {
    let a = KeyPair::generate();
    let (mut chain, safe) = setup(&[&a], 1, 0);
    let token = chain.deploy_token(deployer(), "Test", "TST", 18).unwrap();
    mint(&mut chain, token, safe, U256::from(1_000));

    let approve = IERC20::approveCall {
        spender: recipient(),
        amount: U256::MAX,
    }
    .abi_encode();
    let tx = SafeTransaction::call(token, U256::ZERO, approve, 0);
    let sigs = sign(&chain, safe, &tx, &[&a]);
    let outcome = exec(&mut chain, safe, &tx, &sigs).unwrap();

    assert!(outcome.success, "{:?}", outcome.inner_error);
    let erc20 = chain.token(token).unwrap();
    assert_eq!(erc20.allowance(&safe, &recipient()), U256::MAX);
}

#[test]
fn test_every_used_nonce_rejected() {
    let a = KeyPair::generate();
    let (mut chain, safe) = setup(&[&a], 1, 5_000);

    let mut executed = Vec::new();
    for nonce in 0..3u64 {
        let tx = SafeTransaction::call(recipient(), U256::from(100), vec![], nonce);
        let sigs = sign(&chain, safe, &tx, &[&a]);
        assert!(exec(&mut chain, safe, &tx, &sigs).unwrap().success);
        executed.push((tx, sigs));
    }
    assert_eq!(chain.safe(safe).unwrap().nonce(), 3);

    for (tx, sigs) in &executed {
        assert_eq!(
            exec(&mut chain, safe, tx, sigs),
            Err(ChainError::Safe(SafeError::NonceMismatch {
                expected: 3,
                actual: tx.nonce
            }))
        );
    }
    assert_eq!(chain.safe(safe).unwrap().nonce(), 3);
    assert_eq!(chain.balance_of(recipient()), U256::from(300));
}

#[test]
fn test_account_owned_by_account() {
    let key = KeyPair::generate();
    let mut chain = Chain::default();
    let parent = chain.deploy_safe(deployer(), vec![key.address()], 1).unwrap();
    let child = chain.deploy_safe(deployer(), vec![parent], 1).unwrap();
    chain.credit(child, U256::from(1_000)).unwrap();

    // The parent submits to the child, so its own approval entry counts
    let inner = SafeTransaction::call(recipient(), U256::from(250), vec![], 0);
    let inner_sigs = SignatureBundle::new().approved(parent).encode();
    let outer = SafeTransaction::call(
        child,
        U256::ZERO,
        encode_exec_transaction(&inner, &inner_sigs),
        0,
    );
    let sigs = sign(&chain, parent, &outer, &[&key]);
    let outcome = exec(&mut chain, parent, &outer, &sigs).unwrap();

    assert!(outcome.success, "{:?}", outcome.inner_error);
    assert_eq!(chain.safe(parent).unwrap().nonce(), 1);
    assert_eq!(chain.safe(child).unwrap().nonce(), 1);
    assert_eq!(chain.balance_of(recipient()), U256::from(250));
    assert_eq!(chain.balance_of(child), U256::from(750));

    // Anyone else presenting the same bundle is not the parent
    let again = SafeTransaction::call(recipient(), U256::from(250), vec![], 1);
    let data = encode_exec_transaction(&again, &inner_sigs);
    let result = chain.call(key.address(), child, U256::ZERO, &data, DEFAULT_GAS_LIMIT);
    assert!(matches!(result, Err(ChainError::Call(_))));
    assert_eq!(chain.safe(child).unwrap().nonce(), 1);
}
