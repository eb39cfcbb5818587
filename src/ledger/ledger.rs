//! Shared ledger handle
//!
//! Wraps the [`WorldState`] behind a lock and plays two roles for the
//! multisig coordinator: it answers quorum questions at a given account
//! version, and it commits fully signed transactions.

use crate::core::{Fingerprint, Transaction};
use crate::ledger::account::Account;
use crate::ledger::world_state::{LedgerError, WorldState};
use crate::multisig::{FinalizationSink, MstError, QuorumPolicy, SignatureSet, SinkRejection};
use parking_lot::RwLock;

/// Thread-safe in-memory ledger
#[derive(Debug, Default)]
pub struct Ledger {
    state: RwLock<WorldState>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ledger with a single administrator account
    pub fn with_genesis(admin_account_id: &str, admin_public_key: &str) -> Result<Self, LedgerError> {
        let ledger = Self::new();
        ledger.create_account(admin_account_id, admin_public_key)?;
        Ok(ledger)
    }

    pub fn create_account(&self, account_id: &str, public_key: &str) -> Result<(), LedgerError> {
        self.state.write().create_account(account_id, public_key)?;
        log::info!("created account {}", account_id);
        Ok(())
    }

    pub fn set_account_quorum(&self, account_id: &str, quorum: u32) -> Result<(), LedgerError> {
        let mut state = self.state.write();
        let account = state.account_mut(account_id)?;
        account.set_quorum(quorum)?;
        log::info!(
            "account {} quorum set to {} (version {})",
            account_id,
            quorum,
            account.version()
        );
        Ok(())
    }

    pub fn add_signatory(&self, account_id: &str, public_key: &str) -> Result<(), LedgerError> {
        self.state
            .write()
            .account_mut(account_id)?
            .add_signatory(public_key)
    }

    pub fn remove_signatory(&self, account_id: &str, public_key: &str) -> Result<(), LedgerError> {
        self.state
            .write()
            .account_mut(account_id)?
            .remove_signatory(public_key)
    }

    /// Credit an asset directly, outside any transaction
    pub fn mint(&self, account_id: &str, asset_id: &str, amount: u64) -> Result<(), LedgerError> {
        self.state.write().credit(account_id, asset_id, amount)
    }

    pub fn account(&self, account_id: &str) -> Option<Account> {
        self.state.read().account(account_id).cloned()
    }

    pub fn balance(&self, account_id: &str, asset_id: &str) -> u64 {
        self.state.read().balance(account_id, asset_id)
    }

    pub fn height(&self) -> u64 {
        self.state.read().height()
    }

    pub fn is_committed(&self, fingerprint: &Fingerprint) -> bool {
        self.state.read().is_committed(fingerprint)
    }

    /// Apply a transaction atomically: every command succeeds or none does.
    /// Returns the new ledger height.
    pub fn commit(&self, transaction: &Transaction) -> Result<u64, LedgerError> {
        let mut state = self.state.write();
        let mut staged = state.clone();
        let height = staged.apply_transaction(transaction)?;
        *state = staged;

        log::info!(
            "committed {} at height {} ({} commands, creator={})",
            transaction.fingerprint().short(),
            height,
            transaction.commands().len(),
            transaction.creator_account_id()
        );
        Ok(height)
    }
}

impl QuorumPolicy for Ledger {
    fn current_version(&self, account_id: &str) -> Result<u64, MstError> {
        self.state
            .read()
            .account(account_id)
            .map(Account::version)
            .ok_or_else(|| MstError::UnknownAccount(account_id.to_string()))
    }

    fn required_quorum(&self, account_id: &str, as_of_version: u64) -> Result<u32, MstError> {
        let state = self.state.read();
        let account = state
            .account(account_id)
            .ok_or_else(|| MstError::UnknownAccount(account_id.to_string()))?;
        account
            .snapshot_at(as_of_version)
            .map(|snapshot| snapshot.quorum)
            .ok_or_else(|| MstError::UnknownAccount(account_id.to_string()))
    }

    fn is_authorized_signatory(
        &self,
        account_id: &str,
        public_key: &str,
        as_of_version: u64,
    ) -> Result<bool, MstError> {
        let state = self.state.read();
        let account = state
            .account(account_id)
            .ok_or_else(|| MstError::UnknownAccount(account_id.to_string()))?;
        Ok(account
            .snapshot_at(as_of_version)
            .is_some_and(|snapshot| snapshot.signatories.contains(public_key)))
    }
}

impl From<LedgerError> for SinkRejection {
    fn from(err: LedgerError) -> Self {
        SinkRejection(err.to_string())
    }
}

impl FinalizationSink for Ledger {
    fn finalize(
        &self,
        transaction: &Transaction,
        signatures: &SignatureSet,
    ) -> Result<(), SinkRejection> {
        log::debug!(
            "finalizing {} with {} signatures",
            transaction.fingerprint().short(),
            signatures.len()
        );
        self.commit(transaction)?;
        Ok(())
    }

    fn is_finalized(&self, fingerprint: &Fingerprint) -> bool {
        self.is_committed(fingerprint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Command, TransactionBuilder};

    fn ledger() -> Ledger {
        let ledger = Ledger::with_genesis("admin@test", "pk-admin").unwrap();
        ledger.create_account("group@test", "pk-group").unwrap();
        ledger.create_account("receiver@test", "pk-receiver").unwrap();
        ledger
    }

    #[test]
    fn test_policy_reads_pinned_version() {
        let ledger = ledger();
        let v1 = ledger.current_version("group@test").unwrap();
        ledger.add_signatory("group@test", "pk-alice").unwrap();
        ledger.set_account_quorum("group@test", 2).unwrap();
        let v3 = ledger.current_version("group@test").unwrap();

        assert_eq!(ledger.required_quorum("group@test", v1).unwrap(), 1);
        assert_eq!(ledger.required_quorum("group@test", v3).unwrap(), 2);
        assert!(!ledger
            .is_authorized_signatory("group@test", "pk-alice", v1)
            .unwrap());
        assert!(ledger
            .is_authorized_signatory("group@test", "pk-alice", v3)
            .unwrap());
    }

    #[test]
    fn test_policy_unknown_account() {
        let ledger = ledger();
        assert_eq!(
            ledger.current_version("ghost@test"),
            Err(MstError::UnknownAccount("ghost@test".to_string()))
        );
        assert!(ledger.required_quorum("ghost@test", 1).is_err());
        assert!(ledger
            .is_authorized_signatory("ghost@test", "pk", 1)
            .is_err());
    }

    #[test]
    fn test_commit_is_atomic() {
        let ledger = ledger();
        ledger.mint("group@test", "coin#test", 1000).unwrap();

        // Second command overdraws, so the first must not apply either
        let tx = TransactionBuilder::new("group@test")
            .command(Command::transfer("group@test", "receiver@test", "coin#test", "a", 600))
            .command(Command::transfer("group@test", "receiver@test", "coin#test", "b", 600))
            .build()
            .unwrap();

        assert!(matches!(
            ledger.commit(&tx),
            Err(LedgerError::InsufficientBalance { .. })
        ));
        assert_eq!(ledger.balance("group@test", "coin#test"), 1000);
        assert_eq!(ledger.balance("receiver@test", "coin#test"), 0);
        assert_eq!(ledger.height(), 0);
        assert!(!ledger.is_committed(&tx.fingerprint()));
    }

    #[test]
    fn test_sink_rejects_replay() {
        let ledger = ledger();
        let tx = TransactionBuilder::new("admin@test")
            .command(Command::add_asset_quantity("coin#test", 100_000))
            .build()
            .unwrap();

        assert!(!FinalizationSink::is_finalized(&ledger, &tx.fingerprint()));
        ledger.finalize(&tx, &SignatureSet::new()).unwrap();
        assert!(FinalizationSink::is_finalized(&ledger, &tx.fingerprint()));
        let err = ledger.finalize(&tx, &SignatureSet::new()).unwrap_err();
        assert!(err.0.contains("already committed"));
        assert_eq!(ledger.balance("admin@test", "coin#test"), 100_000);
    }
}
