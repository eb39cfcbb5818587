//! Hand-off point for fully signed transactions

use crate::core::{Fingerprint, Transaction};
use crate::multisig::signature_set::SignatureSet;
use thiserror::Error;

/// Reason the commit layer refused a transaction
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct SinkRejection(pub String);

/// The ledger's ordering/commit service.
///
/// Called at most once per fingerprint, with the coordinator holding that
/// fingerprint's lock. Reaching quorum only makes a transaction eligible;
/// the sink may still reject it.
pub trait FinalizationSink: Send + Sync {
    fn finalize(
        &self,
        transaction: &Transaction,
        signatures: &SignatureSet,
    ) -> Result<(), SinkRejection>;

    /// Whether `fingerprint` was already committed. Consulted once the
    /// coordinator no longer remembers a terminal status for it.
    fn is_finalized(&self, fingerprint: &Fingerprint) -> bool;
}
