//! Signatures collected for one pending transaction
//!
//! Keyed by public key: a signatory appears at most once, and a fresh valid
//! signature from the same key replaces the old one without growing the set.
//! There is no way to remove signatures.

use crate::core::{Fingerprint, TxSignature};
use crate::crypto::SignatureVerifier;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Result of offering a signature to a [`SignatureSet`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    /// New signatory recorded
    Accepted,
    /// Signatory already recorded; set size unchanged
    AlreadyPresent,
    /// Signature failed verification; set untouched
    RejectedInvalid,
}

/// Distinct signatures over a single fingerprint
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureSet {
    signatures: BTreeMap<String, TxSignature>,
}

impl SignatureSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Verify and record a signature over `fingerprint`
    pub fn add(
        &mut self,
        signature: TxSignature,
        fingerprint: &Fingerprint,
        verifier: &dyn SignatureVerifier,
    ) -> AddOutcome {
        if let Some(existing) = self.signatures.get(&signature.public_key) {
            if existing.signature == signature.signature {
                return AddOutcome::AlreadyPresent;
            }
        }

        if !verifier.verify(&signature.public_key, &signature.signature, fingerprint) {
            return AddOutcome::RejectedInvalid;
        }

        match self.signatures.insert(signature.public_key.clone(), signature) {
            Some(_) => AddOutcome::AlreadyPresent,
            None => AddOutcome::Accepted,
        }
    }

    /// Additive union with another verified set. Keys already present keep
    /// their recorded signature. Returns the number of keys gained.
    pub fn merge(&mut self, other: &SignatureSet) -> usize {
        let before = self.signatures.len();
        for (key, signature) in &other.signatures {
            self.signatures
                .entry(key.clone())
                .or_insert_with(|| signature.clone());
        }
        self.signatures.len() - before
    }

    pub fn len(&self) -> usize {
        self.signatures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signatures.is_empty()
    }

    pub fn contains_key(&self, public_key: &str) -> bool {
        self.signatures.contains_key(public_key)
    }

    pub fn get(&self, public_key: &str) -> Option<&TxSignature> {
        self.signatures.get(public_key)
    }

    /// Public keys in sorted order
    pub fn public_keys(&self) -> Vec<String> {
        self.signatures.keys().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TxSignature> {
        self.signatures.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Command, Transaction, TransactionBuilder};
    use crate::crypto::{KeyPair, Secp256k1Verifier};

    fn sample_tx() -> Transaction {
        TransactionBuilder::new("group@test")
            .command(Command::transfer(
                "group@test",
                "receiver@test",
                "coin#test",
                "transfer",
                1400,
            ))
            .quorum(2)
            .build()
            .unwrap()
    }

    #[test]
    fn test_add_distinct_signers() {
        let tx = sample_tx();
        let fp = tx.fingerprint();
        let mut set = SignatureSet::new();

        for _ in 0..3 {
            let kp = KeyPair::generate();
            let outcome = set.add(tx.sign(&kp).unwrap(), &fp, &Secp256k1Verifier);
            assert_eq!(outcome, AddOutcome::Accepted);
            assert!(set.contains_key(&kp.public_key_hex()));
        }
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn test_add_is_idempotent() {
        let tx = sample_tx();
        let fp = tx.fingerprint();
        let alice = KeyPair::generate();
        let signature = tx.sign(&alice).unwrap();
        let mut set = SignatureSet::new();

        assert_eq!(
            set.add(signature.clone(), &fp, &Secp256k1Verifier),
            AddOutcome::Accepted
        );
        assert_eq!(
            set.add(signature, &fp, &Secp256k1Verifier),
            AddOutcome::AlreadyPresent
        );
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_invalid_signature_never_admitted() {
        let tx = sample_tx();
        let fp = tx.fingerprint();
        let alice = KeyPair::generate();
        let mut set = SignatureSet::new();

        // Signature over a different payload
        let other = TransactionBuilder::new("group@test")
            .command(Command::add_asset_quantity("coin#test", 1))
            .build()
            .unwrap();
        let wrong = other.sign(&alice).unwrap();

        assert_eq!(
            set.add(wrong, &fp, &Secp256k1Verifier),
            AddOutcome::RejectedInvalid
        );
        assert!(set.is_empty());

        // An invalid re-sign does not disturb the recorded signature
        let good = tx.sign(&alice).unwrap();
        set.add(good.clone(), &fp, &Secp256k1Verifier);
        let forged = TxSignature::new(alice.public_key_hex(), vec![7u8; 64]);
        assert_eq!(
            set.add(forged, &fp, &Secp256k1Verifier),
            AddOutcome::RejectedInvalid
        );
        assert_eq!(set.get(&alice.public_key_hex()).unwrap(), &good);
    }

    #[test]
    fn test_merge_is_additive() {
        let tx = sample_tx();
        let fp = tx.fingerprint();
        let keys: Vec<KeyPair> = (0..3).map(|_| KeyPair::generate()).collect();

        let mut left = SignatureSet::new();
        left.add(tx.sign(&keys[0]).unwrap(), &fp, &Secp256k1Verifier);
        left.add(tx.sign(&keys[1]).unwrap(), &fp, &Secp256k1Verifier);

        let mut right = SignatureSet::new();
        right.add(tx.sign(&keys[1]).unwrap(), &fp, &Secp256k1Verifier);
        right.add(tx.sign(&keys[2]).unwrap(), &fp, &Secp256k1Verifier);

        assert_eq!(left.merge(&right), 1);
        assert_eq!(left.len(), 3);

        // Merging a smaller set never shrinks
        assert_eq!(left.merge(&SignatureSet::new()), 0);
        assert_eq!(left.len(), 3);
    }
}
