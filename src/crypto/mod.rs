//! Cryptographic utilities for the multisig engine
//!
//! This module provides:
//! - SHA-256 hashing for transaction fingerprints
//! - ECDSA key management (secp256k1)
//! - The signature verification collaborator used by the coordinator

pub mod hash;
pub mod keys;
pub mod verifier;

pub use hash::{sha256, sha256_array, sha256_hex};
pub use keys::{public_key_from_hex, sign_message, verify_signature, KeyError, KeyPair};
pub use verifier::{Secp256k1Verifier, SignatureVerifier};
