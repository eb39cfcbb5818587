//! Pending transaction storage
//!
//! Entries live in a sharded map keyed by fingerprint, each behind its own
//! mutex. The per-entry mutex is the serialization point for a fingerprint:
//! signatures for different transactions never contend, and signatures for
//! the same transaction are applied one at a time.
//!
//! Lock order is always entry mutex first, then map shard. No map guard is
//! ever held while waiting on an entry mutex.

use crate::core::{Fingerprint, Transaction};
use crate::multisig::error::MstError;
use crate::multisig::policy::QuorumSnapshot;
use crate::multisig::signature_set::SignatureSet;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;

/// A transaction waiting for quorum, with the signatures gathered so far
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingEntry {
    pub fingerprint: Fingerprint,
    pub transaction: Transaction,
    pub signatures: SignatureSet,
    pub quorum: QuorumSnapshot,
    /// When the coordinator first recorded the transaction
    pub received_at: DateTime<Utc>,
}

impl PendingEntry {
    pub fn new(transaction: Transaction, quorum: QuorumSnapshot, received_at: DateTime<Utc>) -> Self {
        Self {
            fingerprint: transaction.fingerprint(),
            transaction,
            signatures: SignatureSet::new(),
            quorum,
            received_at,
        }
    }

    pub fn creator_account_id(&self) -> &str {
        self.transaction.creator_account_id()
    }

    pub fn is_quorum_met(&self) -> bool {
        self.signatures.len() >= self.quorum.required as usize
    }
}

/// Lockable cell holding one entry. A closed slot has been unlinked from
/// the store and must not be written to.
#[derive(Debug)]
pub(crate) struct Slot {
    pub(crate) entry: PendingEntry,
    closed: bool,
}

impl Slot {
    pub(crate) fn is_closed(&self) -> bool {
        self.closed
    }
}

pub(crate) type SlotRef = Arc<Mutex<Slot>>;

/// Concurrent store of pending transactions
#[derive(Debug, Default)]
pub struct PendingTransactionStore {
    entries: DashMap<Fingerprint, SlotRef>,
    /// creator account id -> fingerprints
    by_creator: DashMap<String, BTreeSet<Fingerprint>>,
}

impl PendingTransactionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an entry, or merge its signatures into the stored one.
    /// Merging is additive, so concurrent upserts never lose signatures.
    /// Returns the stored signature count.
    pub fn upsert(&self, entry: PendingEntry) -> usize {
        loop {
            let (slot, inserted) = self.insert_or_get(entry.clone());
            let mut guard = slot.lock();
            if guard.closed {
                continue;
            }
            if !inserted {
                guard.entry.signatures.merge(&entry.signatures);
            }
            return guard.entry.signatures.len();
        }
    }

    /// Snapshot of one entry
    pub fn get(&self, fingerprint: &Fingerprint) -> Result<PendingEntry, MstError> {
        self.slot(fingerprint)
            .and_then(|slot| {
                let guard = slot.lock();
                (!guard.closed).then(|| guard.entry.clone())
            })
            .ok_or(MstError::UnknownTransaction(*fingerprint))
    }

    pub fn contains(&self, fingerprint: &Fingerprint) -> bool {
        self.get(fingerprint).is_ok()
    }

    /// Snapshots of every entry created by `account_id`, oldest first.
    /// Each snapshot is taken under its entry's lock.
    pub fn list_by_creator(&self, account_id: &str) -> Vec<PendingEntry> {
        let fingerprints = match self.by_creator.get(account_id) {
            Some(set) => set.clone(),
            None => return Vec::new(),
        };

        let mut entries: Vec<PendingEntry> = fingerprints
            .iter()
            .filter_map(|fp| self.get(fp).ok())
            .collect();
        entries.sort_by(|a, b| {
            a.received_at
                .cmp(&b.received_at)
                .then(a.fingerprint.cmp(&b.fingerprint))
        });
        entries
    }

    /// Snapshots of all entries
    pub fn entries(&self) -> Vec<PendingEntry> {
        let slots: Vec<SlotRef> = self.entries.iter().map(|r| r.value().clone()).collect();
        slots
            .into_iter()
            .filter_map(|slot| {
                let guard = slot.lock();
                (!guard.closed).then(|| guard.entry.clone())
            })
            .collect()
    }

    /// Remove an entry. Removing an absent fingerprint is a no-op.
    pub fn remove(&self, fingerprint: &Fingerprint) -> Option<PendingEntry> {
        let slot = self.slot(fingerprint)?;
        let mut guard = slot.lock();
        if guard.closed {
            return None;
        }
        let entry = guard.entry.clone();
        self.close(&mut guard);
        Some(entry)
    }

    /// Remove every entry received at or before `now - max_age`
    pub fn expire_older_than(&self, max_age: Duration, now: DateTime<Utc>) -> Vec<PendingEntry> {
        self.expire_with(max_age, now, |_| {})
    }

    /// Like [`expire_older_than`](Self::expire_older_than), calling
    /// `on_expire` for each entry while it is still locked. Entries busy with
    /// a submission are skipped and picked up by a later sweep.
    pub(crate) fn expire_with<F>(
        &self,
        max_age: Duration,
        now: DateTime<Utc>,
        mut on_expire: F,
    ) -> Vec<PendingEntry>
    where
        F: FnMut(&PendingEntry),
    {
        // A window reaching past the earliest representable time expires nothing
        let Some(cutoff) = now.checked_sub_signed(max_age) else {
            return Vec::new();
        };
        let slots: Vec<SlotRef> = self.entries.iter().map(|r| r.value().clone()).collect();

        let mut expired = Vec::new();
        for slot in slots {
            let Some(mut guard) = slot.try_lock() else {
                continue;
            };
            if guard.closed || guard.entry.received_at > cutoff {
                continue;
            }
            on_expire(&guard.entry);
            expired.push(guard.entry.clone());
            self.close(&mut guard);
        }
        expired
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn slot(&self, fingerprint: &Fingerprint) -> Option<SlotRef> {
        self.entries.get(fingerprint).map(|r| r.value().clone())
    }

    /// Return the slot for the entry's fingerprint, creating it from `entry`
    /// if absent. The flag reports whether this call created it.
    pub(crate) fn insert_or_get(&self, entry: PendingEntry) -> (SlotRef, bool) {
        let fingerprint = entry.fingerprint;
        let creator = entry.creator_account_id().to_string();

        let mut inserted = false;
        let slot = self
            .entries
            .entry(fingerprint)
            .or_insert_with(|| {
                inserted = true;
                Arc::new(Mutex::new(Slot {
                    entry,
                    closed: false,
                }))
            })
            .value()
            .clone();

        if inserted {
            let guard = slot.lock();
            if !guard.closed {
                self.by_creator
                    .entry(creator)
                    .or_default()
                    .insert(fingerprint);
            }
        }
        (slot, inserted)
    }

    /// Unlink a locked slot from the store
    pub(crate) fn close(&self, slot: &mut Slot) {
        if slot.closed {
            return;
        }
        slot.closed = true;

        let fingerprint = slot.entry.fingerprint;
        let creator = slot.entry.creator_account_id();
        self.entries.remove(&fingerprint);
        if let Some(mut set) = self.by_creator.get_mut(creator) {
            set.remove(&fingerprint);
        }
        self.by_creator.remove_if(creator, |_, set| set.is_empty());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Command, TransactionBuilder};
    use crate::crypto::{KeyPair, Secp256k1Verifier};
    use std::thread;

    fn entry_for(creator: &str, amount: u64, received_at: DateTime<Utc>) -> PendingEntry {
        let tx = TransactionBuilder::new(creator)
            .command(Command::transfer(creator, "receiver@test", "coin#test", "pay", amount))
            .quorum(2)
            .build()
            .unwrap();
        PendingEntry::new(
            tx,
            QuorumSnapshot {
                version: 1,
                required: 2,
            },
            received_at,
        )
    }

    fn signed(mut entry: PendingEntry, key: &KeyPair) -> PendingEntry {
        let sig = entry.transaction.sign(key).unwrap();
        entry
            .signatures
            .add(sig, &entry.fingerprint, &Secp256k1Verifier);
        entry
    }

    #[test]
    fn test_upsert_and_get() {
        let store = PendingTransactionStore::new();
        let entry = signed(entry_for("group@test", 1400, Utc::now()), &KeyPair::generate());
        let fp = entry.fingerprint;

        assert_eq!(store.upsert(entry.clone()), 1);
        assert_eq!(store.get(&fp).unwrap(), entry);
        assert_eq!(store.len(), 1);
        assert!(store.contains(&fp));
    }

    #[test]
    fn test_upsert_merges_additively() {
        let store = PendingTransactionStore::new();
        let base = entry_for("group@test", 1400, Utc::now());
        let alice = KeyPair::generate();
        let bob = KeyPair::generate();

        store.upsert(signed(base.clone(), &alice));
        assert_eq!(store.upsert(signed(base.clone(), &bob)), 2);

        // An upsert carrying fewer signatures does not shrink the entry
        assert_eq!(store.upsert(base.clone()), 2);
        let stored = store.get(&base.fingerprint).unwrap();
        assert!(stored.signatures.contains_key(&alice.public_key_hex()));
        assert!(stored.signatures.contains_key(&bob.public_key_hex()));
    }

    #[test]
    fn test_concurrent_upserts_keep_every_signature() {
        let store = PendingTransactionStore::new();
        let base = entry_for("group@test", 1400, Utc::now());
        let keys: Vec<KeyPair> = (0..8).map(|_| KeyPair::generate()).collect();

        thread::scope(|s| {
            for key in &keys {
                let store = &store;
                let entry = signed(base.clone(), key);
                s.spawn(move || store.upsert(entry));
            }
        });

        assert_eq!(store.get(&base.fingerprint).unwrap().signatures.len(), 8);
    }

    #[test]
    fn test_list_by_creator() {
        let store = PendingTransactionStore::new();
        let now = Utc::now();
        store.upsert(entry_for("group@test", 100, now));
        store.upsert(entry_for("group@test", 200, now + Duration::seconds(1)));
        store.upsert(entry_for("other@test", 300, now));

        let listed = store.list_by_creator("group@test");
        assert_eq!(listed.len(), 2);
        assert!(listed[0].received_at <= listed[1].received_at);
        assert!(listed.iter().all(|e| e.creator_account_id() == "group@test"));
        assert!(store.list_by_creator("nobody@test").is_empty());
    }

    #[test]
    fn test_remove_is_idempotent() {
        let store = PendingTransactionStore::new();
        let entry = entry_for("group@test", 1400, Utc::now());
        let fp = entry.fingerprint;
        store.upsert(entry);

        assert!(store.remove(&fp).is_some());
        assert!(store.remove(&fp).is_none());
        assert!(matches!(store.get(&fp), Err(MstError::UnknownTransaction(_))));
        assert!(store.list_by_creator("group@test").is_empty());
        assert!(store.is_empty());
    }

    #[test]
    fn test_expire_older_than() {
        let store = PendingTransactionStore::new();
        let t0 = Utc::now();
        let old = entry_for("group@test", 100, t0);
        let fresh = entry_for("group@test", 200, t0 + Duration::seconds(30));
        store.upsert(old.clone());
        store.upsert(fresh.clone());

        let window = Duration::seconds(60);

        // Not yet expired just before the window closes
        assert!(store
            .expire_older_than(window, t0 + Duration::seconds(59))
            .is_empty());

        let expired = store.expire_older_than(window, t0 + window);
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].fingerprint, old.fingerprint);
        assert!(!store.contains(&old.fingerprint));
        assert!(store.contains(&fresh.fingerprint));
    }

    #[test]
    fn test_expire_with_huge_window() {
        let store = PendingTransactionStore::new();
        let entry = entry_for("group@test", 100, Utc::now());
        store.upsert(entry.clone());

        let expired = store.expire_older_than(Duration::seconds(i64::MAX / 1000), Utc::now());
        assert!(expired.is_empty());
        assert!(store.contains(&entry.fingerprint));
    }

    #[test]
    fn test_expire_skips_busy_entries() {
        let store = PendingTransactionStore::new();
        let t0 = Utc::now();
        let entry = entry_for("group@test", 100, t0);
        let fp = entry.fingerprint;
        store.upsert(entry);

        let slot = store.slot(&fp).unwrap();
        let guard = slot.lock();
        assert!(store
            .expire_older_than(Duration::seconds(1), t0 + Duration::hours(1))
            .is_empty());
        drop(guard);

        assert_eq!(
            store
                .expire_older_than(Duration::seconds(1), t0 + Duration::hours(1))
                .len(),
            1
        );
    }
}
