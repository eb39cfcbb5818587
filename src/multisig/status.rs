//! Transaction lifecycle states, submission outcomes and events

use crate::core::{Fingerprint, Transaction};
use crate::multisig::error::MstError;
use chrono::{DateTime, Utc};

/// Lifecycle state of a transaction known to the coordinator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxStatus {
    PendingSignatures { signatures: usize, required: u32 },
    Finalizing,
    Finalized,
    Rejected(MstError),
    Expired,
}

impl TxStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TxStatus::Finalized | TxStatus::Rejected(_) | TxStatus::Expired
        )
    }

    pub fn label(&self) -> &'static str {
        match self {
            TxStatus::PendingSignatures { .. } => "pending",
            TxStatus::Finalizing => "finalizing",
            TxStatus::Finalized => "finalized",
            TxStatus::Rejected(_) => "rejected",
            TxStatus::Expired => "expired",
        }
    }
}

/// Result of a successful call to `submit`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Recorded; quorum not reached yet
    Pending {
        fingerprint: Fingerprint,
        signatures: usize,
        required: u32,
        /// Signatories newly recorded by this submission
        added: usize,
    },
    /// This submission crossed the quorum and the sink committed it
    Finalized { fingerprint: Fingerprint },
    /// Late signature for a transaction that already finalized
    AlreadyFinalized { fingerprint: Fingerprint },
    /// Quorum was reached but the sink refused the transaction
    Rejected {
        fingerprint: Fingerprint,
        reason: MstError,
    },
}

impl SubmitOutcome {
    pub fn fingerprint(&self) -> Fingerprint {
        match self {
            SubmitOutcome::Pending { fingerprint, .. }
            | SubmitOutcome::Finalized { fingerprint }
            | SubmitOutcome::AlreadyFinalized { fingerprint }
            | SubmitOutcome::Rejected { fingerprint, .. } => *fingerprint,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, SubmitOutcome::Pending { .. })
    }

    pub fn is_finalized(&self) -> bool {
        matches!(self, SubmitOutcome::Finalized { .. })
    }
}

/// Query view of a pending transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingSummary {
    pub fingerprint: Fingerprint,
    pub transaction: Transaction,
    pub signature_count: usize,
    pub required_quorum: u32,
    pub signed_by: Vec<String>,
    pub received_at: DateTime<Utc>,
}

/// A pending transaction removed by the expiry sweep
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpiredTransaction {
    pub fingerprint: Fingerprint,
    pub creator_account_id: String,
    pub signatures: usize,
    pub required: u32,
    pub received_at: DateTime<Utc>,
}

/// State transition published to subscribers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MstEvent {
    pub fingerprint: Fingerprint,
    pub creator_account_id: String,
    pub status: TxStatus,
    pub at: DateTime<Utc>,
}
