//! Explicit ledger client

use crate::core::{Fingerprint, SignedTransaction, Transaction};
use crate::crypto::{KeyError, KeyPair, Secp256k1Verifier};
use crate::ledger::{Ledger, LedgerError};
use crate::multisig::{
    MstConfig, MstCoordinator, MstError, PendingSummary, SubmitOutcome, TxStatus,
};
use crate::storage::{PendingStorage, StorageError};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Client errors
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Multisig error: {0}")]
    Multisig(#[from] MstError),
    #[error("Key error: {0}")]
    Key(#[from] KeyError),
    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Handle bundling a ledger with the coordinator that feeds it
#[derive(Clone)]
pub struct LedgerClient {
    ledger: Arc<Ledger>,
    coordinator: Arc<MstCoordinator>,
}

impl LedgerClient {
    /// Coordinator over `ledger` with secp256k1 verification
    pub fn new(ledger: Arc<Ledger>, config: MstConfig) -> Self {
        let coordinator = MstCoordinator::new(
            config,
            ledger.clone(),
            Arc::new(Secp256k1Verifier),
            ledger.clone(),
        );
        Self::from_parts(ledger, Arc::new(coordinator))
    }

    pub fn from_parts(ledger: Arc<Ledger>, coordinator: Arc<MstCoordinator>) -> Self {
        Self {
            ledger,
            coordinator,
        }
    }

    pub fn ledger(&self) -> &Arc<Ledger> {
        &self.ledger
    }

    pub fn coordinator(&self) -> &Arc<MstCoordinator> {
        &self.coordinator
    }

    /// Submit a signed transaction
    pub fn send(&self, signed: &SignedTransaction) -> Result<SubmitOutcome, ClientError> {
        let outcome = self.coordinator.submit(signed)?;
        log::info!(
            "sent {} creator={} -> {:?}",
            outcome.fingerprint().short(),
            signed.transaction().creator_account_id(),
            outcome
        );
        Ok(outcome)
    }

    /// Sign `transaction` with one key and submit it
    pub fn sign_and_send(
        &self,
        transaction: Transaction,
        key_pair: &KeyPair,
    ) -> Result<SubmitOutcome, ClientError> {
        let signed = SignedTransaction::new(transaction).sign(key_pair)?;
        self.send(&signed)
    }

    /// Countersign every pending transaction created by `account_id` that
    /// `key_pair` has not signed yet. Only the new signature is sent; the
    /// coordinator adds it to those already collected.
    pub fn sign_pending(
        &self,
        account_id: &str,
        key_pair: &KeyPair,
    ) -> Result<Vec<SubmitOutcome>, ClientError> {
        let public_key = key_pair.public_key_hex();
        let mut outcomes = Vec::new();

        for pending in self.coordinator.list_pending(account_id) {
            if pending.signed_by.contains(&public_key) {
                continue;
            }
            outcomes.push(self.sign_and_send(pending.transaction, key_pair)?);
        }
        Ok(outcomes)
    }

    pub fn pending(&self, account_id: &str) -> Vec<PendingSummary> {
        self.coordinator.list_pending(account_id)
    }

    pub fn pending_transaction(&self, fingerprint: &Fingerprint) -> Result<PendingSummary, ClientError> {
        Ok(self.coordinator.pending(fingerprint)?)
    }

    pub fn status(&self, fingerprint: &Fingerprint) -> Result<TxStatus, ClientError> {
        Ok(self.coordinator.status(fingerprint)?)
    }

    pub async fn wait_for_finalization(
        &self,
        fingerprint: &Fingerprint,
        timeout: Duration,
    ) -> Result<TxStatus, ClientError> {
        Ok(self
            .coordinator
            .wait_for_finalization(fingerprint, timeout)
            .await?)
    }

    pub fn balance(&self, account_id: &str, asset_id: &str) -> u64 {
        self.ledger.balance(account_id, asset_id)
    }

    /// Persist the coordinator's pending entries
    pub fn save_pending(&self, storage: &PendingStorage) -> Result<usize, ClientError> {
        let entries = self.coordinator.snapshot();
        storage.save(&entries)?;
        Ok(entries.len())
    }

    /// Reload pending entries saved by [`save_pending`](Self::save_pending)
    pub fn load_pending(&self, storage: &PendingStorage) -> Result<usize, ClientError> {
        Ok(self.coordinator.restore(storage.load()?))
    }
}
