//! Accounts with versioned signatory configuration
//!
//! Every change to an account's quorum or signatories bumps its version and
//! appends a snapshot, so callers can read the configuration that was in
//! effect at any earlier version.

use crate::ledger::world_state::LedgerError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Account configuration at one version
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountSnapshot {
    pub version: u64,
    pub quorum: u32,
    pub signatories: BTreeSet<String>,
}

/// A ledger account
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Account {
    id: String,
    /// Oldest first; never empty
    history: Vec<AccountSnapshot>,
}

impl Account {
    /// Create an account with a single signatory and quorum 1
    pub fn new(id: &str, public_key: &str) -> Self {
        let mut signatories = BTreeSet::new();
        signatories.insert(public_key.to_string());

        Self {
            id: id.to_string(),
            history: vec![AccountSnapshot {
                version: 1,
                quorum: 1,
                signatories,
            }],
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Current configuration
    pub fn current(&self) -> &AccountSnapshot {
        // history is created non-empty and only ever appended to
        &self.history[self.history.len() - 1]
    }

    pub fn version(&self) -> u64 {
        self.current().version
    }

    pub fn quorum(&self) -> u32 {
        self.current().quorum
    }

    pub fn signatories(&self) -> &BTreeSet<String> {
        &self.current().signatories
    }

    pub fn is_signatory(&self, public_key: &str) -> bool {
        self.signatories().contains(public_key)
    }

    /// Configuration in effect at `version`. Versions past the current one
    /// resolve to the current configuration; versions before the account
    /// existed resolve to `None`.
    pub fn snapshot_at(&self, version: u64) -> Option<&AccountSnapshot> {
        match self.history.binary_search_by_key(&version, |s| s.version) {
            Ok(idx) => Some(&self.history[idx]),
            Err(0) => None,
            Err(idx) => Some(&self.history[idx - 1]),
        }
    }

    pub fn set_quorum(&mut self, quorum: u32) -> Result<(), LedgerError> {
        let signatories = self.signatories().len();
        if quorum == 0 || quorum as usize > signatories {
            return Err(LedgerError::InvalidQuorum {
                account: self.id.clone(),
                quorum,
                signatories,
            });
        }

        let mut next = self.current().clone();
        next.quorum = quorum;
        self.push(next);
        Ok(())
    }

    pub fn add_signatory(&mut self, public_key: &str) -> Result<(), LedgerError> {
        if self.is_signatory(public_key) {
            return Err(LedgerError::DuplicateSignatory {
                account: self.id.clone(),
                public_key: public_key.to_string(),
            });
        }

        let mut next = self.current().clone();
        next.signatories.insert(public_key.to_string());
        self.push(next);
        Ok(())
    }

    /// Remove a signatory; the remaining set must still satisfy the quorum
    pub fn remove_signatory(&mut self, public_key: &str) -> Result<(), LedgerError> {
        if !self.is_signatory(public_key) {
            return Err(LedgerError::UnknownSignatory {
                account: self.id.clone(),
                public_key: public_key.to_string(),
            });
        }

        let remaining = self.signatories().len() - 1;
        if remaining < self.quorum() as usize {
            return Err(LedgerError::InvalidQuorum {
                account: self.id.clone(),
                quorum: self.quorum(),
                signatories: remaining,
            });
        }

        let mut next = self.current().clone();
        next.signatories.remove(public_key);
        self.push(next);
        Ok(())
    }

    fn push(&mut self, mut next: AccountSnapshot) {
        next.version = self.version() + 1;
        self.history.push(next);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_account() {
        let account = Account::new("group@test", "pk-group");
        assert_eq!(account.id(), "group@test");
        assert_eq!(account.version(), 1);
        assert_eq!(account.quorum(), 1);
        assert!(account.is_signatory("pk-group"));
    }

    #[test]
    fn test_versioned_changes() {
        let mut account = Account::new("group@test", "pk-group");
        account.add_signatory("pk-alice").unwrap();
        account.add_signatory("pk-bob").unwrap();
        account.set_quorum(2).unwrap();
        assert_eq!(account.version(), 4);

        // Version 2 had two signatories and quorum 1
        let v2 = account.snapshot_at(2).unwrap();
        assert_eq!(v2.quorum, 1);
        assert_eq!(v2.signatories.len(), 2);
        assert!(!v2.signatories.contains("pk-bob"));

        assert_eq!(account.snapshot_at(4).unwrap().quorum, 2);
        assert_eq!(account.snapshot_at(99).unwrap().version, 4);
        assert!(account.snapshot_at(0).is_none());
    }

    #[test]
    fn test_quorum_bounds() {
        let mut account = Account::new("group@test", "pk-group");
        assert!(matches!(
            account.set_quorum(0),
            Err(LedgerError::InvalidQuorum { .. })
        ));
        assert!(matches!(
            account.set_quorum(2),
            Err(LedgerError::InvalidQuorum { .. })
        ));
        // Failed changes do not bump the version
        assert_eq!(account.version(), 1);
    }

    #[test]
    fn test_signatory_changes() {
        let mut account = Account::new("group@test", "pk-group");
        assert!(matches!(
            account.add_signatory("pk-group"),
            Err(LedgerError::DuplicateSignatory { .. })
        ));

        account.add_signatory("pk-alice").unwrap();
        account.set_quorum(2).unwrap();

        // Removing would leave fewer signatories than the quorum
        assert!(matches!(
            account.remove_signatory("pk-alice"),
            Err(LedgerError::InvalidQuorum { .. })
        ));
        assert!(matches!(
            account.remove_signatory("pk-nobody"),
            Err(LedgerError::UnknownSignatory { .. })
        ));

        account.set_quorum(1).unwrap();
        account.remove_signatory("pk-alice").unwrap();
        assert!(!account.is_signatory("pk-alice"));
    }
}
