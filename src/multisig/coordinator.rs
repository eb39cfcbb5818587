//! Multi-signature transaction coordinator
//!
//! Drives each transaction through
//! `Received -> PendingSignatures -> Finalizing -> Finalized`, with the
//! terminal side exits `Rejected` and `Expired`.
//!
//! All work on one fingerprint happens under that fingerprint's entry lock
//! in the [`PendingTransactionStore`], so exactly one submission can observe
//! the quorum being crossed and hand the transaction to the sink.

use crate::core::{Fingerprint, SignedTransaction};
use crate::crypto::SignatureVerifier;
use crate::multisig::clock::{Clock, SystemClock};
use crate::multisig::config::MstConfig;
use crate::multisig::error::MstError;
use crate::multisig::policy::{QuorumPolicy, QuorumSnapshot};
use crate::multisig::signature_set::{AddOutcome, SignatureSet};
use crate::multisig::sink::FinalizationSink;
use crate::multisig::status::{
    ExpiredTransaction, MstEvent, PendingSummary, SubmitOutcome, TxStatus,
};
use crate::multisig::store::{PendingEntry, PendingTransactionStore, Slot};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// Last known state of a transaction that left the pending store
#[derive(Debug, Clone)]
struct TerminalRecord {
    status: TxStatus,
    at: DateTime<Utc>,
}

/// Coordinates signature collection and finalization
pub struct MstCoordinator {
    config: MstConfig,
    store: PendingTransactionStore,
    terminal: DashMap<Fingerprint, TerminalRecord>,
    policy: Arc<dyn QuorumPolicy>,
    verifier: Arc<dyn SignatureVerifier>,
    sink: Arc<dyn FinalizationSink>,
    clock: Arc<dyn Clock>,
    events: broadcast::Sender<MstEvent>,
}

impl MstCoordinator {
    pub fn new(
        config: MstConfig,
        policy: Arc<dyn QuorumPolicy>,
        verifier: Arc<dyn SignatureVerifier>,
        sink: Arc<dyn FinalizationSink>,
    ) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        Self {
            config,
            store: PendingTransactionStore::new(),
            terminal: DashMap::new(),
            policy,
            verifier,
            sink,
            clock: Arc::new(SystemClock),
            events,
        }
    }

    /// Replace the time source
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &MstConfig {
        &self.config
    }

    pub fn store(&self) -> &PendingTransactionStore {
        &self.store
    }

    /// Receive every state transition from now on
    pub fn subscribe(&self) -> broadcast::Receiver<MstEvent> {
        self.events.subscribe()
    }

    // =========================================================================
    // Submission
    // =========================================================================

    /// Record the signatures carried by `signed` and finalize the transaction
    /// if they complete its quorum.
    ///
    /// Validation failures are returned as errors and leave the pending
    /// entry exactly as it was.
    pub fn submit(&self, signed: &SignedTransaction) -> Result<SubmitOutcome, MstError> {
        let transaction = signed.transaction();
        let fingerprint = transaction.fingerprint();

        log::debug!(
            "submit {} creator={} signatures={}",
            fingerprint.short(),
            transaction.creator_account_id(),
            signed.signatures().len()
        );

        if signed.signatures().is_empty() {
            return Err(MstError::NoSignatures);
        }

        loop {
            if let Some(outcome) = self.terminal_outcome(&fingerprint) {
                return outcome;
            }

            let slot = match self.store.slot(&fingerprint) {
                Some(slot) => slot,
                None => {
                    // The terminal record may have aged out; the commit layer
                    // still knows what it committed
                    if self.sink.is_finalized(&fingerprint) {
                        log::debug!("late signature for committed {}", fingerprint.short());
                        return Ok(SubmitOutcome::AlreadyFinalized { fingerprint });
                    }
                    let quorum = QuorumSnapshot::capture(self.policy.as_ref(), transaction)?;
                    let entry = PendingEntry::new(transaction.clone(), quorum, self.clock.now());
                    self.store.insert_or_get(entry).0
                }
            };

            let mut guard = slot.lock();
            if guard.is_closed() {
                // Finalized, rejected or expired while we waited
                continue;
            }

            // A transaction may have terminated between our terminal check
            // and the creation of this fresh entry
            if guard.entry.signatures.is_empty() {
                if let Some(outcome) = self.terminal_outcome(&fingerprint) {
                    self.store.close(&mut guard);
                    return outcome;
                }
            }

            return self.apply_signatures(&mut guard, signed);
        }
    }

    fn apply_signatures(
        &self,
        slot: &mut Slot,
        signed: &SignedTransaction,
    ) -> Result<SubmitOutcome, MstError> {
        let fingerprint = slot.entry.fingerprint;
        let quorum = slot.entry.quorum;

        let mut working = slot.entry.signatures.clone();
        let validated = self.validate_into(&mut working, &slot.entry, signed);

        let added = match validated {
            Ok(added) => added,
            Err(err) => {
                log::warn!(
                    "rejected submission for {} creator={}: {}",
                    fingerprint.short(),
                    slot.entry.creator_account_id(),
                    err
                );
                // Never leave behind an entry this submission created
                if slot.entry.signatures.is_empty() {
                    self.store.close(slot);
                }
                return Err(err);
            }
        };

        slot.entry.signatures = working;
        let signatures = slot.entry.signatures.len();

        if !slot.entry.is_quorum_met() {
            log::info!(
                "{} pending: {}/{} signatures (creator={})",
                fingerprint.short(),
                signatures,
                quorum.required,
                slot.entry.creator_account_id()
            );
            if added > 0 {
                self.publish(
                    &slot.entry,
                    TxStatus::PendingSignatures {
                        signatures,
                        required: quorum.required,
                    },
                );
            }
            return Ok(SubmitOutcome::Pending {
                fingerprint,
                signatures,
                required: quorum.required,
                added,
            });
        }

        Ok(self.finalize(slot))
    }

    /// Check every signature in the submission against the pinned account
    /// version and add it to `working`. Returns the number of new signatories.
    fn validate_into(
        &self,
        working: &mut SignatureSet,
        entry: &PendingEntry,
        signed: &SignedTransaction,
    ) -> Result<usize, MstError> {
        let account_id = entry.creator_account_id();
        let mut added = 0;

        for signature in signed.signatures() {
            let authorized = self.policy.is_authorized_signatory(
                account_id,
                &signature.public_key,
                entry.quorum.version,
            )?;
            if !authorized {
                return Err(MstError::UnauthorizedSignatory {
                    account_id: account_id.to_string(),
                    public_key: signature.public_key.clone(),
                });
            }

            match working.add(signature.clone(), &entry.fingerprint, self.verifier.as_ref()) {
                AddOutcome::Accepted => added += 1,
                AddOutcome::AlreadyPresent => {}
                AddOutcome::RejectedInvalid => {
                    return Err(MstError::InvalidSignature(signature.public_key.clone()));
                }
            }
        }
        Ok(added)
    }

    /// Hand a quorum-complete entry to the sink. Runs under the entry lock.
    fn finalize(&self, slot: &mut Slot) -> SubmitOutcome {
        let fingerprint = slot.entry.fingerprint;
        log::info!(
            "{} reached quorum {}/{}, finalizing",
            fingerprint.short(),
            slot.entry.signatures.len(),
            slot.entry.quorum.required
        );
        self.publish(&slot.entry, TxStatus::Finalizing);

        let result = self
            .sink
            .finalize(&slot.entry.transaction, &slot.entry.signatures);

        let (status, outcome) = match result {
            Ok(()) => {
                log::info!("{} finalized", fingerprint.short());
                (TxStatus::Finalized, SubmitOutcome::Finalized { fingerprint })
            }
            Err(rejection) => {
                log::warn!("{} rejected by sink: {}", fingerprint.short(), rejection);
                let reason = MstError::FinalizationRejected(rejection.0);
                (
                    TxStatus::Rejected(reason.clone()),
                    SubmitOutcome::Rejected {
                        fingerprint,
                        reason,
                    },
                )
            }
        };

        // Terminal status is recorded before the entry is unlinked so a
        // racing submission can never resurrect it
        self.record_terminal(fingerprint, status.clone());
        self.store.close(slot);
        self.publish(&slot.entry, status);
        outcome
    }

    fn terminal_outcome(
        &self,
        fingerprint: &Fingerprint,
    ) -> Option<Result<SubmitOutcome, MstError>> {
        let record = self.terminal.get(fingerprint)?;
        let fingerprint = *fingerprint;
        Some(match &record.status {
            TxStatus::Finalized => {
                log::debug!("late signature for finalized {}", fingerprint.short());
                Ok(SubmitOutcome::AlreadyFinalized { fingerprint })
            }
            TxStatus::Rejected(reason) => Ok(SubmitOutcome::Rejected {
                fingerprint,
                reason: reason.clone(),
            }),
            TxStatus::Expired => Err(MstError::Expired(fingerprint)),
            TxStatus::PendingSignatures { .. } | TxStatus::Finalizing => return None,
        })
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Pending transactions created by `account_id`, oldest first
    pub fn list_pending(&self, account_id: &str) -> Vec<PendingSummary> {
        self.store
            .list_by_creator(account_id)
            .into_iter()
            .filter(is_recorded)
            .map(summarize)
            .collect()
    }

    /// One pending transaction
    pub fn pending(&self, fingerprint: &Fingerprint) -> Result<PendingSummary, MstError> {
        self.recorded_entry(fingerprint).map(summarize)
    }

    /// Current lifecycle state of a transaction
    pub fn status(&self, fingerprint: &Fingerprint) -> Result<TxStatus, MstError> {
        if let Ok(entry) = self.recorded_entry(fingerprint) {
            return Ok(TxStatus::PendingSignatures {
                signatures: entry.signatures.len(),
                required: entry.quorum.required,
            });
        }
        if let Some(record) = self.terminal.get(fingerprint) {
            return Ok(record.status.clone());
        }
        if self.sink.is_finalized(fingerprint) {
            return Ok(TxStatus::Finalized);
        }
        Err(MstError::UnknownTransaction(*fingerprint))
    }

    /// Pending entry holding at least one accepted signature. A fresh entry
    /// whose first submission is still being validated is not reported.
    fn recorded_entry(&self, fingerprint: &Fingerprint) -> Result<PendingEntry, MstError> {
        self.store
            .get(fingerprint)
            .ok()
            .filter(is_recorded)
            .ok_or(MstError::UnknownTransaction(*fingerprint))
    }

    /// Wait until the transaction reaches a terminal state or `timeout`
    /// elapses. On timeout the current (non-terminal) status is returned.
    pub async fn wait_for_finalization(
        &self,
        fingerprint: &Fingerprint,
        timeout: Duration,
    ) -> Result<TxStatus, MstError> {
        // Subscribe before the first status read so no transition is missed
        let mut events = self.subscribe();
        let status = self.status(fingerprint)?;
        if status.is_terminal() {
            return Ok(status);
        }

        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            match tokio::time::timeout_at(deadline, events.recv()).await {
                Err(_) => return self.status(fingerprint),
                Ok(Ok(event)) => {
                    if event.fingerprint == *fingerprint && event.status.is_terminal() {
                        return Ok(event.status);
                    }
                }
                Ok(Err(broadcast::error::RecvError::Lagged(skipped))) => {
                    log::debug!("status waiter lagged by {} events", skipped);
                    let status = self.status(fingerprint)?;
                    if status.is_terminal() {
                        return Ok(status);
                    }
                }
                Ok(Err(broadcast::error::RecvError::Closed)) => return self.status(fingerprint),
            }
        }
    }

    // =========================================================================
    // Expiry
    // =========================================================================

    /// Expire pending transactions older than the configured window and
    /// forget terminal statuses older than the retention period
    pub fn sweep_expired(&self) -> Vec<ExpiredTransaction> {
        let now = self.clock.now();

        let expired = self
            .store
            .expire_with(self.config.expiry_window(), now, |entry| {
                self.record_terminal(entry.fingerprint, TxStatus::Expired);
            });

        for entry in &expired {
            log::warn!(
                "{} expired with {}/{} signatures (creator={}, received {})",
                entry.fingerprint.short(),
                entry.signatures.len(),
                entry.quorum.required,
                entry.creator_account_id(),
                entry.received_at
            );
            self.publish(entry, TxStatus::Expired);
        }

        if let Some(retention_cutoff) = now.checked_sub_signed(self.config.status_retention()) {
            self.terminal.retain(|_, record| record.at > retention_cutoff);
        }

        expired
            .into_iter()
            .map(|entry| ExpiredTransaction {
                fingerprint: entry.fingerprint,
                creator_account_id: entry.creator_account_id().to_string(),
                signatures: entry.signatures.len(),
                required: entry.quorum.required,
                received_at: entry.received_at,
            })
            .collect()
    }

    /// Run [`sweep_expired`](Self::sweep_expired) every `sweep_interval`
    pub fn spawn_expiry_sweeper(self: Arc<Self>) -> JoinHandle<()> {
        let period = self.config.sweep_interval();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let expired = self.sweep_expired();
                if !expired.is_empty() {
                    log::info!("expiry sweep removed {} transactions", expired.len());
                }
            }
        })
    }

    // =========================================================================
    // Persistence hooks
    // =========================================================================

    /// Copies of all pending entries
    pub fn snapshot(&self) -> Vec<PendingEntry> {
        self.store
            .entries()
            .into_iter()
            .filter(is_recorded)
            .collect()
    }

    /// Load previously saved entries. Every signature is verified again and
    /// unverifiable ones are dropped. Entries left without signatures and
    /// entries already terminal or committed are skipped. Returns the number
    /// of entries restored.
    pub fn restore(&self, entries: Vec<PendingEntry>) -> usize {
        let mut restored = 0;
        for saved in entries {
            let fingerprint = saved.transaction.fingerprint();
            if fingerprint != saved.fingerprint {
                log::warn!("dropping saved entry with mismatched fingerprint {}", saved.fingerprint);
                continue;
            }
            if self.terminal.contains_key(&fingerprint) || self.sink.is_finalized(&fingerprint) {
                log::debug!("skipping saved entry {} already terminal", fingerprint.short());
                continue;
            }

            let mut entry =
                PendingEntry::new(saved.transaction.clone(), saved.quorum, saved.received_at);
            for signature in saved.signatures.iter() {
                let outcome =
                    entry
                        .signatures
                        .add(signature.clone(), &fingerprint, self.verifier.as_ref());
                if outcome == AddOutcome::RejectedInvalid {
                    log::warn!(
                        "dropping unverifiable signature from {} on {}",
                        signature.public_key,
                        fingerprint.short()
                    );
                }
            }

            if entry.signatures.is_empty() {
                log::warn!(
                    "dropping saved entry {} with no verifiable signatures",
                    fingerprint.short()
                );
                continue;
            }

            self.store.upsert(entry);
            restored += 1;
        }
        log::info!("restored {} pending transactions", restored);
        restored
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn record_terminal(&self, fingerprint: Fingerprint, status: TxStatus) {
        self.terminal.insert(
            fingerprint,
            TerminalRecord {
                status,
                at: self.clock.now(),
            },
        );
    }

    fn publish(&self, entry: &PendingEntry, status: TxStatus) {
        // No subscribers is not an error
        let _ = self.events.send(MstEvent {
            fingerprint: entry.fingerprint,
            creator_account_id: entry.creator_account_id().to_string(),
            status,
            at: self.clock.now(),
        });
    }
}

fn is_recorded(entry: &PendingEntry) -> bool {
    !entry.signatures.is_empty()
}

fn summarize(entry: PendingEntry) -> PendingSummary {
    PendingSummary {
        fingerprint: entry.fingerprint,
        signature_count: entry.signatures.len(),
        required_quorum: entry.quorum.required,
        signed_by: entry.signatures.public_keys(),
        received_at: entry.received_at,
        transaction: entry.transaction,
    }
}
