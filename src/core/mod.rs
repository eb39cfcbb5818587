//! Core ledger data model
//!
//! This module contains the values that travel between signers and the
//! coordinator:
//! - Commands (the ledger operations a transaction carries)
//! - Transactions (immutable payloads identified by a fingerprint)
//! - Signatures and signed submissions

pub mod command;
pub mod transaction;

pub use command::Command;
pub use transaction::{
    Fingerprint, SignedTransaction, Transaction, TransactionBuilder, TransactionError,
    TxSignature,
};
