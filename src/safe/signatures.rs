//! Signature bundles and their validation
//!
//! A bundle is the concatenation of 65-byte `r || s || v` entries, one per
//! endorsing owner, sorted by ascending signer address. The `v` byte tags
//! the kind of proof carried by the entry:
//!
//! | v        | proof                                              |
//! |----------|----------------------------------------------------|
//! | 1        | on-chain approval; owner address in the low 20 bytes of `r` |
//! | 27, 28   | ECDSA over the transaction hash                    |
//! | 31, 32   | ECDSA over the `eth_sign` digest of the hash (v + 4) |
//!
//! Contract signatures (`v = 0`) are not supported.

use crate::core::types::{Address, B256};
use crate::crypto::{eth_signed_message_hash, recover_address, KeyError, KeyPair, SIGNATURE_LENGTH};
use crate::safe::approvals::ApprovalStore;
use crate::safe::error::SafeError;
use crate::safe::owners::OwnerRegistry;
use log::debug;

/// `v` marking an on-chain approval entry
pub const APPROVED_HASH_V: u8 = 1;

/// Offset added to `v` by eth_sign style entries
pub const ETH_SIGN_V_OFFSET: u8 = 4;

/// One decoded bundle entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureProof {
    /// The owner approved the hash on chain (or is submitting it)
    ApprovedHash { owner: Address },
    /// Plain ECDSA signature over the hash
    Ecdsa { rs: [u8; 64], v: u8 },
    /// ECDSA signature over the eth_sign digest of the hash
    EthSign { rs: [u8; 64], v: u8 },
}

impl SignatureProof {
    /// Decode a single 65-byte entry
    pub fn decode(entry: &[u8; SIGNATURE_LENGTH]) -> Result<Self, SafeError> {
        let v = entry[64];
        let mut rs = [0u8; 64];
        rs.copy_from_slice(&entry[..64]);

        match v {
            APPROVED_HASH_V => {
                Ok(SignatureProof::ApprovedHash {
                    owner: Address::from_slice(&entry[12..32]),
                })
            }
            27 | 28 => Ok(SignatureProof::Ecdsa { rs, v }),
            31 | 32 => Ok(SignatureProof::EthSign {
                rs,
                v: v - ETH_SIGN_V_OFFSET,
            }),
            other => Err(SafeError::UnsupportedSignatureKind(other)),
        }
    }

    /// Encode back to the 65-byte wire entry
    pub fn encode(&self) -> [u8; SIGNATURE_LENGTH] {
        let mut out = [0u8; SIGNATURE_LENGTH];
        match self {
            SignatureProof::ApprovedHash { owner } => {
                out[..32].copy_from_slice(owner.into_word().as_slice());
                out[64] = APPROVED_HASH_V;
            }
            SignatureProof::Ecdsa { rs, v } => {
                out[..64].copy_from_slice(rs);
                out[64] = *v;
            }
            SignatureProof::EthSign { rs, v } => {
                out[..64].copy_from_slice(rs);
                out[64] = *v + ETH_SIGN_V_OFFSET;
            }
        }
        out
    }

    /// The identity this entry speaks for
    pub fn signer(&self, hash: &B256) -> Result<Address, KeyError> {
        match self {
            SignatureProof::ApprovedHash { owner } => Ok(*owner),
            SignatureProof::Ecdsa { rs, v } => recover_address(hash, rs, *v),
            SignatureProof::EthSign { rs, v } => {
                recover_address(&eth_signed_message_hash(hash), rs, *v)
            }
        }
    }
}

/// Split a bundle into decoded entries; an empty bundle has none
pub fn decode_bundle(signatures: &[u8]) -> Result<Vec<SignatureProof>, SafeError> {
    if signatures.len() % SIGNATURE_LENGTH != 0 {
        return Err(SafeError::MalformedSignatures(signatures.len()));
    }

    signatures
        .chunks_exact(SIGNATURE_LENGTH)
        .map(|chunk| {
            let mut entry = [0u8; SIGNATURE_LENGTH];
            entry.copy_from_slice(chunk);
            SignatureProof::decode(&entry)
        })
        .collect()
}

// =============================================================================
// Validation
// =============================================================================

/// Checks bundles against the live owner set and approval store
///
/// `submitter` is the identity executing the transaction, if any. An owner
/// submitting a transaction has authenticated itself, so its `v = 1` entry
/// needs no stored approval.
pub struct SignatureValidator<'a> {
    owners: &'a OwnerRegistry,
    approvals: &'a ApprovalStore,
    submitter: Option<Address>,
}

impl<'a> SignatureValidator<'a> {
    pub fn new(owners: &'a OwnerRegistry, approvals: &'a ApprovalStore) -> Self {
        Self {
            owners,
            approvals,
            submitter: None,
        }
    }

    /// Treat `submitter` as having approved whatever it submits
    pub fn with_submitter(mut self, submitter: Address) -> Self {
        self.submitter = Some(submitter);
        self
    }

    /// Validate `signatures` for `hash`, requiring `required` endorsements
    ///
    /// Every entry must be valid; a single bad entry rejects the bundle.
    /// Returns the number of valid endorsements.
    pub fn validate(
        &self,
        hash: &B256,
        signatures: &[u8],
        required: usize,
    ) -> Result<usize, SafeError> {
        let proofs = decode_bundle(signatures)?;

        let mut previous: Option<Address> = None;
        for (index, proof) in proofs.iter().enumerate() {
            let signer = proof.signer(hash).map_err(|e| SafeError::BadRecovery {
                index,
                reason: e.to_string(),
            })?;

            if let Some(prev) = previous {
                if signer == prev {
                    return Err(SafeError::DuplicateSigner(signer));
                }
                if signer < prev {
                    return Err(SafeError::InvalidSignatureOrder {
                        previous: prev,
                        current: signer,
                    });
                }
            }

            if !self.owners.is_owner(&signer) {
                return Err(SafeError::NotAnOwner(signer));
            }

            if let SignatureProof::ApprovedHash { owner } = proof {
                let submitted_by_owner = self.submitter == Some(*owner);
                if !submitted_by_owner && !self.approvals.is_approved(owner, hash) {
                    return Err(SafeError::ApprovalMissing(*owner));
                }
            }

            debug!("Signature {} valid for signer {}", index, signer);
            previous = Some(signer);
        }

        let have = proofs.len();
        if have < required {
            return Err(SafeError::ThresholdNotMet {
                have,
                need: required,
            });
        }
        Ok(have)
    }
}

// =============================================================================
// Signer side
// =============================================================================

/// Collects endorsements and encodes them in canonical order
#[derive(Debug, Clone, Default)]
pub struct SignatureBundle {
    entries: Vec<(Address, SignatureProof)>,
}

impl SignatureBundle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sign `hash` directly with `key`
    pub fn sign(mut self, key: &KeyPair, hash: &B256) -> Self {
        let entry = key.sign_hash(hash);
        self.entries.push((key.address(), decode_own(&entry)));
        self
    }

    /// Sign the eth_sign digest of `hash` with `key`
    pub fn sign_eth_message(mut self, key: &KeyPair, hash: &B256) -> Self {
        let entry = key.sign_eth_message(hash);
        self.entries.push((key.address(), decode_own(&entry)));
        self
    }

    /// Reference an on-chain approval (or the submitter's own identity)
    pub fn approved(mut self, owner: Address) -> Self {
        self.entries
            .push((owner, SignatureProof::ApprovedHash { owner }));
        self
    }

    /// Add an entry produced elsewhere, recovering its signer over `hash`
    pub fn push_encoded(
        &mut self,
        hash: &B256,
        entry: &[u8; SIGNATURE_LENGTH],
    ) -> Result<Address, SafeError> {
        let proof = SignatureProof::decode(entry)?;
        let signer = proof.signer(hash).map_err(|e| SafeError::BadRecovery {
            index: self.entries.len(),
            reason: e.to_string(),
        })?;
        self.entries.push((signer, proof));
        Ok(signer)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Concatenate entries sorted by ascending signer
    pub fn encode(&self) -> Vec<u8> {
        let mut entries = self.entries.clone();
        entries.sort_by_key(|(signer, _)| *signer);
        entries
            .iter()
            .flat_map(|(_, proof)| proof.encode())
            .collect()
    }
}

/// Entries produced by our own key pair always carry v in {27, 28, 31, 32}
fn decode_own(entry: &[u8; SIGNATURE_LENGTH]) -> SignatureProof {
    let mut rs = [0u8; 64];
    rs.copy_from_slice(&entry[..64]);
    if entry[64] > 28 {
        SignatureProof::EthSign {
            rs,
            v: entry[64] - ETH_SIGN_V_OFFSET,
        }
    } else {
        SignatureProof::Ecdsa { rs, v: entry[64] }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::address_from_low_u64;
    use crate::crypto::keccak256;

    const ACCOUNT: Address = Address::repeat_byte(0x5a);

    fn key(byte: u8) -> KeyPair {
        KeyPair::from_private_key_hex(&hex::encode([byte; 32])).unwrap()
    }

    /// Three keys sorted by address
    fn sorted_keys() -> Vec<KeyPair> {
        let mut keys: Vec<KeyPair> = (1..=3).map(key).collect();
        keys.sort_by_key(|k| k.address());
        keys
    }

    fn registry(keys: &[KeyPair], threshold: usize) -> OwnerRegistry {
        OwnerRegistry::setup(ACCOUNT, keys.iter().map(|k| k.address()).collect(), threshold)
            .unwrap()
    }

    fn hash() -> B256 {
        keccak256(b"safe tx")
    }

    #[test]
    fn test_decode_kinds() {
        let owner = address_from_low_u64(42);
        let approved = SignatureProof::ApprovedHash { owner }.encode();
        assert_eq!(approved[64], 1);
        assert_eq!(
            SignatureProof::decode(&approved).unwrap(),
            SignatureProof::ApprovedHash { owner }
        );

        let mut contract = [0u8; 65];
        contract[64] = 0;
        assert_eq!(
            SignatureProof::decode(&contract),
            Err(SafeError::UnsupportedSignatureKind(0))
        );
        contract[64] = 29;
        assert_eq!(
            SignatureProof::decode(&contract),
            Err(SafeError::UnsupportedSignatureKind(29))
        );
    }

    #[test]
    fn test_malformed_bundle() {
        assert_eq!(decode_bundle(&[]), Ok(vec![]));
        assert_eq!(
            decode_bundle(&[0u8; 64]),
            Err(SafeError::MalformedSignatures(64))
        );
        assert_eq!(
            decode_bundle(&[0u8; 66]),
            Err(SafeError::MalformedSignatures(66))
        );
    }

    #[test]
    fn test_empty_bundle_is_below_threshold() {
        let keys = sorted_keys();
        let owners = registry(&keys, 2);
        let approvals = ApprovalStore::new();

        assert_eq!(
            SignatureValidator::new(&owners, &approvals).validate(&hash(), &[], 2),
            Err(SafeError::ThresholdNotMet { have: 0, need: 2 })
        );
        // The submitter's implicit approval needs an entry too
        assert_eq!(
            SignatureValidator::new(&owners, &approvals)
                .with_submitter(keys[0].address())
                .validate(&hash(), &[], 1),
            Err(SafeError::ThresholdNotMet { have: 0, need: 1 })
        );
    }

    #[test]
    fn test_valid_bundle_meets_threshold() {
        let keys = sorted_keys();
        let owners = registry(&keys, 2);
        let approvals = ApprovalStore::new();
        let h = hash();

        let bundle = SignatureBundle::new()
            .sign(&keys[1], &h)
            .sign(&keys[0], &h)
            .encode();

        let count = SignatureValidator::new(&owners, &approvals)
            .validate(&h, &bundle, 2)
            .unwrap();
        assert_eq!(count, 2);
    }

    #[test]
    fn test_eth_sign_entry() {
        let keys = sorted_keys();
        let owners = registry(&keys, 1);
        let approvals = ApprovalStore::new();
        let h = hash();

        let bundle = SignatureBundle::new().sign_eth_message(&keys[2], &h).encode();
        assert!(bundle[64] == 31 || bundle[64] == 32);

        SignatureValidator::new(&owners, &approvals)
            .validate(&h, &bundle, 1)
            .unwrap();
    }

    #[test]
    fn test_below_threshold() {
        let keys = sorted_keys();
        let owners = registry(&keys, 2);
        let approvals = ApprovalStore::new();
        let h = hash();

        let bundle = SignatureBundle::new().sign(&keys[0], &h).encode();
        assert_eq!(
            SignatureValidator::new(&owners, &approvals).validate(&h, &bundle, 2),
            Err(SafeError::ThresholdNotMet { have: 1, need: 2 })
        );
    }

    #[test]
    fn test_duplicate_signer() {
        let keys = sorted_keys();
        let owners = registry(&keys, 2);
        let approvals = ApprovalStore::new();
        let h = hash();

        let mut bundle = keys[0].sign_hash(&h).to_vec();
        bundle.extend_from_slice(&keys[0].sign_hash(&h));

        assert_eq!(
            SignatureValidator::new(&owners, &approvals).validate(&h, &bundle, 2),
            Err(SafeError::DuplicateSigner(keys[0].address()))
        );
    }

    #[test]
    fn test_descending_order_rejected() {
        let keys = sorted_keys();
        let owners = registry(&keys, 2);
        let approvals = ApprovalStore::new();
        let h = hash();

        let mut bundle = keys[1].sign_hash(&h).to_vec();
        bundle.extend_from_slice(&keys[0].sign_hash(&h));

        assert_eq!(
            SignatureValidator::new(&owners, &approvals).validate(&h, &bundle, 2),
            Err(SafeError::InvalidSignatureOrder {
                previous: keys[1].address(),
                current: keys[0].address(),
            })
        );
    }

    #[test]
    fn test_non_owner_rejected_even_above_threshold() {
        let keys = sorted_keys();
        let owners = registry(&keys[..2], 1);
        let approvals = ApprovalStore::new();
        let h = hash();

        // keys[2] is not an owner; the bundle fails even though keys[0]
        // alone would meet the threshold
        let bundle = SignatureBundle::new()
            .sign(&keys[0], &h)
            .sign(&keys[2], &h)
            .encode();
        assert_eq!(
            SignatureValidator::new(&owners, &approvals).validate(&h, &bundle, 1),
            Err(SafeError::NotAnOwner(keys[2].address()))
        );
    }

    #[test]
    fn test_signature_over_other_hash() {
        let keys = sorted_keys();
        let owners = registry(&keys, 1);
        let approvals = ApprovalStore::new();

        // Recovers to some unrelated identity
        let bundle = SignatureBundle::new()
            .sign(&keys[0], &keccak256(b"other"))
            .encode();
        assert!(matches!(
            SignatureValidator::new(&owners, &approvals).validate(&hash(), &bundle, 1),
            Err(SafeError::NotAnOwner(_))
        ));
    }

    #[test]
    fn test_bad_recovery() {
        let keys = sorted_keys();
        let owners = registry(&keys, 1);
        let approvals = ApprovalStore::new();

        // r = 0 is not a valid signature scalar
        let mut entry = [0u8; 65];
        entry[64] = 27;
        assert!(matches!(
            SignatureValidator::new(&owners, &approvals).validate(&hash(), &entry, 1),
            Err(SafeError::BadRecovery { index: 0, .. })
        ));
    }

    #[test]
    fn test_approved_hash_entries() {
        let keys = sorted_keys();
        let owners = registry(&keys, 2);
        let mut approvals = ApprovalStore::new();
        let h = hash();
        let a = keys[0].address();
        let b = keys[1].address();

        let bundle = SignatureBundle::new().approved(a).sign(&keys[1], &h).encode();

        // No approval stored yet
        assert_eq!(
            SignatureValidator::new(&owners, &approvals).validate(&h, &bundle, 2),
            Err(SafeError::ApprovalMissing(a))
        );

        // Submitting owner counts as approval
        SignatureValidator::new(&owners, &approvals)
            .with_submitter(a)
            .validate(&h, &bundle, 2)
            .unwrap();
        // A different submitter does not
        assert!(SignatureValidator::new(&owners, &approvals)
            .with_submitter(b)
            .validate(&h, &bundle, 2)
            .is_err());

        approvals.approve_hash(&owners, a, h).unwrap();
        SignatureValidator::new(&owners, &approvals)
            .validate(&h, &bundle, 2)
            .unwrap();

        approvals.revoke_approval(a, &h);
        assert!(SignatureValidator::new(&owners, &approvals)
            .validate(&h, &bundle, 2)
            .is_err());
    }

    #[test]
    fn test_push_encoded_recovers_signer() {
        let keys = sorted_keys();
        let h = hash();
        let mut bundle = SignatureBundle::new();

        let signer = bundle.push_encoded(&h, &keys[2].sign_hash(&h)).unwrap();
        assert_eq!(signer, keys[2].address());
        assert_eq!(bundle.len(), 1);
    }
}
