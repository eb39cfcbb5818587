//! Mini-Multisig: multi-signature transaction coordination for a permissioned ledger
//!
//! This crate provides:
//! - Transactions identified by a SHA-256 fingerprint of their canonical bytes
//! - ECDSA signatures (secp256k1) collected per transaction
//! - A pending store that accumulates signatures across submissions
//! - Account quorum and signatory sets with versioned history
//! - Exactly-once finalization into the ledger once quorum is reached
//! - Expiry of transactions that never gather enough signatures
//! - JSON persistence of pending transactions
//!
//! # Example
//!
//! ```rust
//! use mini_multisig::client::LedgerClient;
//! use mini_multisig::core::{Command, TransactionBuilder};
//! use mini_multisig::crypto::KeyPair;
//! use mini_multisig::ledger::Ledger;
//! use mini_multisig::multisig::MstConfig;
//! use std::sync::Arc;
//!
//! let admin = KeyPair::generate();
//! let ledger = Arc::new(Ledger::with_genesis("admin@test", &admin.public_key_hex()).unwrap());
//! let client = LedgerClient::new(ledger, MstConfig::default());
//!
//! // Quorum 1: a single signature finalizes immediately
//! let tx = TransactionBuilder::new("admin@test")
//!     .command(Command::add_asset_quantity("coin#test", 500))
//!     .build()
//!     .unwrap();
//! let outcome = client.sign_and_send(tx, &admin).unwrap();
//! assert!(outcome.is_finalized());
//! assert_eq!(client.balance("admin@test", "coin#test"), 500);
//! ```

pub mod client;
pub mod core;
pub mod crypto;
pub mod ledger;
pub mod multisig;
pub mod storage;

// Re-export commonly used types
pub use self::client::{ClientError, LedgerClient};
pub use self::core::{Command, Fingerprint, SignedTransaction, Transaction, TransactionBuilder, TxSignature};
pub use self::crypto::{KeyPair, Secp256k1Verifier, SignatureVerifier};
pub use self::ledger::{Ledger, LedgerError};
pub use self::multisig::{
    FinalizationSink, MstConfig, MstCoordinator, MstError, QuorumPolicy, SignatureSet,
    SubmitOutcome, TxStatus,
};
pub use self::storage::{PendingStorage, StorageConfig};
