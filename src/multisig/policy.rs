//! Quorum resolution against versioned account state
//!
//! The coordinator pins every pending transaction to the creator account's
//! version at first submission. Both the quorum and the signatory check for
//! that transaction are read at the pinned version, so later account changes
//! cannot finalize it early or strand it.

use crate::core::Transaction;
use crate::multisig::error::MstError;
use serde::{Deserialize, Serialize};

/// Source of account quorum and signatory configuration
pub trait QuorumPolicy: Send + Sync {
    /// Latest configuration version of the account
    fn current_version(&self, account_id: &str) -> Result<u64, MstError>;

    /// Quorum in effect at `as_of_version`
    fn required_quorum(&self, account_id: &str, as_of_version: u64) -> Result<u32, MstError>;

    /// Whether `public_key` was a signatory at `as_of_version`
    fn is_authorized_signatory(
        &self,
        account_id: &str,
        public_key: &str,
        as_of_version: u64,
    ) -> Result<bool, MstError>;
}

/// Quorum requirement pinned when a transaction is first seen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuorumSnapshot {
    /// Creator account version the transaction is evaluated against
    pub version: u64,
    /// Signatures needed: the larger of the declared and the account quorum
    pub required: u32,
}

impl QuorumSnapshot {
    pub fn capture(policy: &dyn QuorumPolicy, transaction: &Transaction) -> Result<Self, MstError> {
        let account_id = transaction.creator_account_id();
        let version = policy.current_version(account_id)?;
        let account_quorum = policy.required_quorum(account_id, version)?;

        Ok(Self {
            version,
            required: account_quorum.max(transaction.quorum()),
        })
    }
}
