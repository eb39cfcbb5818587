//! Signature verification collaborator
//!
//! The coordinator never touches curve arithmetic directly; it asks a
//! [`SignatureVerifier`] whether a signature over a fingerprint is valid.

use crate::core::Fingerprint;
use crate::crypto::keys::{public_key_from_hex, verify_signature};

/// Verifies a signatory's signature over a transaction fingerprint.
///
/// Implementations must be pure: the same inputs always give the same answer.
/// Malformed keys or signatures verify as `false`.
pub trait SignatureVerifier: Send + Sync {
    fn verify(&self, public_key: &str, signature: &[u8], fingerprint: &Fingerprint) -> bool;
}

/// secp256k1 ECDSA verifier over compact signatures
#[derive(Debug, Clone, Copy, Default)]
pub struct Secp256k1Verifier;

impl SignatureVerifier for Secp256k1Verifier {
    fn verify(&self, public_key: &str, signature: &[u8], fingerprint: &Fingerprint) -> bool {
        let Ok(key) = public_key_from_hex(public_key) else {
            return false;
        };
        verify_signature(&key, fingerprint.as_bytes(), signature).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::KeyPair;

    fn fingerprint(seed: &[u8]) -> Fingerprint {
        Fingerprint::digest(seed)
    }

    #[test]
    fn test_valid_signature() {
        let kp = KeyPair::generate();
        let fp = fingerprint(b"tx");
        let sig = kp.sign(fp.as_bytes()).unwrap();

        assert!(Secp256k1Verifier.verify(&kp.public_key_hex(), &sig, &fp));
    }

    #[test]
    fn test_verification_is_pure() {
        let kp = KeyPair::generate();
        let fp = fingerprint(b"tx");
        let sig = kp.sign(fp.as_bytes()).unwrap();
        let verifier = Secp256k1Verifier;

        let first = verifier.verify(&kp.public_key_hex(), &sig, &fp);
        for _ in 0..10 {
            assert_eq!(verifier.verify(&kp.public_key_hex(), &sig, &fp), first);
        }

        let wrong = fingerprint(b"other");
        let first = verifier.verify(&kp.public_key_hex(), &sig, &wrong);
        assert!(!first);
        assert_eq!(verifier.verify(&kp.public_key_hex(), &sig, &wrong), first);
    }

    #[test]
    fn test_wrong_key_and_garbage() {
        let kp = KeyPair::generate();
        let other = KeyPair::generate();
        let fp = fingerprint(b"tx");
        let sig = kp.sign(fp.as_bytes()).unwrap();

        assert!(!Secp256k1Verifier.verify(&other.public_key_hex(), &sig, &fp));
        assert!(!Secp256k1Verifier.verify("not-hex", &sig, &fp));
        assert!(!Secp256k1Verifier.verify(&kp.public_key_hex(), &[0u8; 12], &fp));
    }
}
