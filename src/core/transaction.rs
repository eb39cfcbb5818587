//! Transactions awaiting multi-signature approval
//!
//! A [`Transaction`] is an immutable payload. Its [`Fingerprint`] is the
//! SHA-256 of a canonical byte encoding of that payload, so every signer
//! holding a copy converges on the same identity no matter which
//! signatures they have seen.

use crate::core::command::{put_str, Command};
use crate::crypto::{sha256_array, KeyError, KeyPair};
use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Transaction construction errors
#[derive(Error, Debug, PartialEq, Eq)]
pub enum TransactionError {
    #[error("Transaction creator is empty")]
    EmptyCreator,
    #[error("Transaction has no commands")]
    NoCommands,
    #[error("Invalid quorum: {0} (must be at least 1)")]
    InvalidQuorum(u32),
    #[error("Invalid fingerprint: {0}")]
    InvalidFingerprint(String),
}

// =============================================================================
// Fingerprint
// =============================================================================

/// Content hash of a transaction payload
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Fingerprint(#[serde(with = "hex")] [u8; 32]);

impl Fingerprint {
    /// Hash arbitrary bytes into a fingerprint
    pub fn digest(data: &[u8]) -> Self {
        Self(sha256_array(data))
    }

    /// Parse a 64-character hex fingerprint
    pub fn from_hex(value: &str) -> Result<Self, TransactionError> {
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(value, &mut bytes)
            .map_err(|_| TransactionError::InvalidFingerprint(value.to_string()))?;
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// First 8 bytes in hex, for log lines
    pub fn short(&self) -> String {
        hex::encode(&self.0[..8])
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({})", self.short())
    }
}

// =============================================================================
// Transaction payload
// =============================================================================

/// Immutable transaction payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    creator_account_id: String,
    commands: Vec<Command>,
    created_at: DateTime<Utc>,
    /// Quorum the creator declared for this transaction
    quorum: u32,
}

impl Transaction {
    pub fn creator_account_id(&self) -> &str {
        &self.creator_account_id
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn quorum(&self) -> u32 {
        self.quorum
    }

    /// Canonical encoding of the payload
    pub fn canonical_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(64 + self.commands.len() * 64);
        put_str(&mut out, &self.creator_account_id);
        out.extend_from_slice(&self.created_at.timestamp_millis().to_be_bytes());
        out.extend_from_slice(&self.quorum.to_be_bytes());
        out.extend_from_slice(&(self.commands.len() as u32).to_be_bytes());
        for command in &self.commands {
            command.encode_into(&mut out);
        }
        out
    }

    /// Content fingerprint; never changes as signatures accumulate
    pub fn fingerprint(&self) -> Fingerprint {
        Fingerprint::digest(&self.canonical_bytes())
    }

    /// Sign this transaction's fingerprint
    pub fn sign(&self, key_pair: &KeyPair) -> Result<TxSignature, KeyError> {
        let signature = key_pair.sign(self.fingerprint().as_bytes())?;
        Ok(TxSignature::new(key_pair.public_key_hex(), signature))
    }
}

/// Builder for transaction payloads
#[derive(Debug, Clone)]
pub struct TransactionBuilder {
    creator_account_id: String,
    commands: Vec<Command>,
    created_at: Option<DateTime<Utc>>,
    quorum: u32,
}

impl TransactionBuilder {
    pub fn new(creator_account_id: &str) -> Self {
        Self {
            creator_account_id: creator_account_id.to_string(),
            commands: Vec::new(),
            created_at: None,
            quorum: 1,
        }
    }

    pub fn command(mut self, command: Command) -> Self {
        self.commands.push(command);
        self
    }

    pub fn commands(mut self, commands: impl IntoIterator<Item = Command>) -> Self {
        self.commands.extend(commands);
        self
    }

    pub fn quorum(mut self, quorum: u32) -> Self {
        self.quorum = quorum;
        self
    }

    pub fn created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(created_at);
        self
    }

    /// Build the payload. Timestamps are truncated to milliseconds so a
    /// payload survives a JSON round trip with the same fingerprint.
    pub fn build(self) -> Result<Transaction, TransactionError> {
        if self.creator_account_id.is_empty() {
            return Err(TransactionError::EmptyCreator);
        }
        if self.commands.is_empty() {
            return Err(TransactionError::NoCommands);
        }
        if self.quorum == 0 {
            return Err(TransactionError::InvalidQuorum(self.quorum));
        }

        Ok(Transaction {
            creator_account_id: self.creator_account_id,
            commands: self.commands,
            created_at: self.created_at.unwrap_or_else(Utc::now).trunc_subsecs(3),
            quorum: self.quorum,
        })
    }
}

// =============================================================================
// Signatures
// =============================================================================

/// One signatory's signature over a transaction fingerprint
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxSignature {
    /// Compressed public key of the signer (hex)
    pub public_key: String,
    /// Compact ECDSA signature
    #[serde(with = "hex")]
    pub signature: Vec<u8>,
    /// When the signature was produced
    pub signed_at: DateTime<Utc>,
}

impl TxSignature {
    pub fn new(public_key: String, signature: Vec<u8>) -> Self {
        Self {
            public_key,
            signature,
            signed_at: Utc::now(),
        }
    }
}

/// A transaction together with the signatures its submitter attached
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SignedTransaction {
    transaction: Transaction,
    signatures: Vec<TxSignature>,
}

impl SignedTransaction {
    pub fn new(transaction: Transaction) -> Self {
        Self {
            transaction,
            signatures: Vec::new(),
        }
    }

    /// Attach a signature produced elsewhere. A signature from a key that is
    /// already attached replaces the earlier one.
    pub fn with_signature(mut self, signature: TxSignature) -> Self {
        match self
            .signatures
            .iter_mut()
            .find(|s| s.public_key == signature.public_key)
        {
            Some(existing) => *existing = signature,
            None => self.signatures.push(signature),
        }
        self
    }

    /// Sign with a key pair and attach the signature
    pub fn sign(self, key_pair: &KeyPair) -> Result<Self, KeyError> {
        let signature = self.transaction.sign(key_pair)?;
        Ok(self.with_signature(signature))
    }

    pub fn transaction(&self) -> &Transaction {
        &self.transaction
    }

    pub fn signatures(&self) -> &[TxSignature] {
        &self.signatures
    }

    pub fn fingerprint(&self) -> Fingerprint {
        self.transaction.fingerprint()
    }
}
