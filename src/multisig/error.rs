//! Multisig coordination errors

use crate::core::Fingerprint;
use thiserror::Error;

/// Errors surfaced by the multisig coordinator
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MstError {
    #[error("Signatory {public_key} is not authorized for account {account_id}")]
    UnauthorizedSignatory {
        account_id: String,
        public_key: String,
    },
    #[error("Invalid signature from {0}")]
    InvalidSignature(String),
    #[error("Unknown account: {0}")]
    UnknownAccount(String),
    #[error("Unknown transaction: {0}")]
    UnknownTransaction(Fingerprint),
    #[error("Transaction expired before reaching quorum: {0}")]
    Expired(Fingerprint),
    #[error("Finalization rejected: {0}")]
    FinalizationRejected(String),
    #[error("Submission carries no signatures")]
    NoSignatures,
}
