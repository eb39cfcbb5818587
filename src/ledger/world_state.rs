//! World state: accounts, balances and committed transactions
//!
//! Command execution lives here. A transaction's commands are applied to a
//! staged copy of the state and the copy replaces the live state only if every
//! command succeeds.

use crate::core::{Command, Fingerprint, Transaction};
use crate::ledger::account::Account;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use thiserror::Error;

/// Ledger errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("Unknown account: {0}")]
    UnknownAccount(String),
    #[error("Account already exists: {0}")]
    AccountExists(String),
    #[error("Invalid quorum {quorum} for account {account} with {signatories} signatories")]
    InvalidQuorum {
        account: String,
        quorum: u32,
        signatories: usize,
    },
    #[error("Signatory {public_key} already registered for {account}")]
    DuplicateSignatory { account: String, public_key: String },
    #[error("Signatory {public_key} not registered for {account}")]
    UnknownSignatory { account: String, public_key: String },
    #[error("Insufficient balance of {asset} in {account}: have {balance}, need {amount}")]
    InsufficientBalance {
        account: String,
        asset: String,
        balance: u64,
        amount: u64,
    },
    #[error("Invalid amount: {0}")]
    InvalidAmount(u64),
    #[error("Balance overflow for {asset} in {account}")]
    BalanceOverflow { account: String, asset: String },
    #[error("Permission denied: {0}")]
    PermissionDenied(String),
    #[error("Transaction already committed: {0}")]
    AlreadyCommitted(Fingerprint),
}

/// Complete ledger state
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct WorldState {
    accounts: HashMap<String, Account>,
    /// account id -> asset id -> balance
    balances: HashMap<String, BTreeMap<String, u64>>,
    committed: HashSet<Fingerprint>,
    height: u64,
}

impl WorldState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn account(&self, account_id: &str) -> Option<&Account> {
        self.accounts.get(account_id)
    }

    pub fn account_mut(&mut self, account_id: &str) -> Result<&mut Account, LedgerError> {
        self.accounts
            .get_mut(account_id)
            .ok_or_else(|| LedgerError::UnknownAccount(account_id.to_string()))
    }

    pub fn account_count(&self) -> usize {
        self.accounts.len()
    }

    pub fn balance(&self, account_id: &str, asset_id: &str) -> u64 {
        self.balances
            .get(account_id)
            .and_then(|assets| assets.get(asset_id))
            .copied()
            .unwrap_or(0)
    }

    pub fn height(&self) -> u64 {
        self.height
    }

    pub fn is_committed(&self, fingerprint: &Fingerprint) -> bool {
        self.committed.contains(fingerprint)
    }

    pub fn create_account(&mut self, account_id: &str, public_key: &str) -> Result<(), LedgerError> {
        if self.accounts.contains_key(account_id) {
            return Err(LedgerError::AccountExists(account_id.to_string()));
        }
        self.accounts
            .insert(account_id.to_string(), Account::new(account_id, public_key));
        Ok(())
    }

    pub fn credit(&mut self, account_id: &str, asset_id: &str, amount: u64) -> Result<(), LedgerError> {
        if !self.accounts.contains_key(account_id) {
            return Err(LedgerError::UnknownAccount(account_id.to_string()));
        }
        let balance = self
            .balances
            .entry(account_id.to_string())
            .or_default()
            .entry(asset_id.to_string())
            .or_insert(0);
        *balance = balance
            .checked_add(amount)
            .ok_or_else(|| LedgerError::BalanceOverflow {
                account: account_id.to_string(),
                asset: asset_id.to_string(),
            })?;
        Ok(())
    }

    pub fn debit(&mut self, account_id: &str, asset_id: &str, amount: u64) -> Result<(), LedgerError> {
        let balance = self.balance(account_id, asset_id);
        if balance < amount {
            return Err(LedgerError::InsufficientBalance {
                account: account_id.to_string(),
                asset: asset_id.to_string(),
                balance,
                amount,
            });
        }
        if let Some(entry) = self
            .balances
            .get_mut(account_id)
            .and_then(|assets| assets.get_mut(asset_id))
        {
            *entry = balance - amount;
        }
        Ok(())
    }

    /// Execute one command on behalf of `creator`
    pub fn apply(&mut self, creator: &str, command: &Command) -> Result<(), LedgerError> {
        match command {
            Command::CreateAccount {
                account_id,
                public_key,
            } => self.create_account(account_id, public_key),
            Command::AddAssetQuantity { asset_id, amount } => {
                if *amount == 0 {
                    return Err(LedgerError::InvalidAmount(*amount));
                }
                self.credit(creator, asset_id, *amount)
            }
            Command::TransferAsset {
                src_account_id,
                dest_account_id,
                asset_id,
                amount,
                ..
            } => {
                require_own_account(creator, src_account_id, command)?;
                if *amount == 0 {
                    return Err(LedgerError::InvalidAmount(*amount));
                }
                if !self.accounts.contains_key(dest_account_id) {
                    return Err(LedgerError::UnknownAccount(dest_account_id.clone()));
                }
                self.debit(src_account_id, asset_id, *amount)?;
                self.credit(dest_account_id, asset_id, *amount)
            }
            Command::SetAccountQuorum { account_id, quorum } => {
                require_own_account(creator, account_id, command)?;
                self.account_mut(account_id)?.set_quorum(*quorum)
            }
            Command::AddSignatory {
                account_id,
                public_key,
            } => {
                require_own_account(creator, account_id, command)?;
                self.account_mut(account_id)?.add_signatory(public_key)
            }
            Command::RemoveSignatory {
                account_id,
                public_key,
            } => {
                require_own_account(creator, account_id, command)?;
                self.account_mut(account_id)?.remove_signatory(public_key)
            }
        }
    }

    /// Apply every command of a transaction and record it as committed.
    /// On error `self` may be partially modified; callers stage on a clone.
    pub fn apply_transaction(&mut self, transaction: &Transaction) -> Result<u64, LedgerError> {
        let fingerprint = transaction.fingerprint();
        if self.committed.contains(&fingerprint) {
            return Err(LedgerError::AlreadyCommitted(fingerprint));
        }
        if !self.accounts.contains_key(transaction.creator_account_id()) {
            return Err(LedgerError::UnknownAccount(
                transaction.creator_account_id().to_string(),
            ));
        }

        for command in transaction.commands() {
            self.apply(transaction.creator_account_id(), command)?;
        }

        self.committed.insert(fingerprint);
        self.height += 1;
        Ok(self.height)
    }
}

fn require_own_account(creator: &str, target: &str, command: &Command) -> Result<(), LedgerError> {
    if creator != target {
        return Err(LedgerError::PermissionDenied(format!(
            "{} by {} on {}",
            command.name(),
            creator,
            target
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::TransactionBuilder;

    fn state_with_accounts() -> WorldState {
        let mut state = WorldState::new();
        state.create_account("admin@test", "pk-admin").unwrap();
        state.create_account("group@test", "pk-group").unwrap();
        state.create_account("receiver@test", "pk-receiver").unwrap();
        state
    }

    #[test]
    fn test_create_account_twice() {
        let mut state = state_with_accounts();
        assert_eq!(state.account_count(), 3);
        assert_eq!(
            state.create_account("group@test", "pk-other"),
            Err(LedgerError::AccountExists("group@test".to_string()))
        );
    }

    #[test]
    fn test_mint_and_transfer() {
        let mut state = state_with_accounts();
        state
            .apply("group@test", &Command::add_asset_quantity("coin#test", 4200))
            .unwrap();
        state
            .apply(
                "group@test",
                &Command::transfer("group@test", "receiver@test", "coin#test", "pay", 1400),
            )
            .unwrap();

        assert_eq!(state.balance("group@test", "coin#test"), 2800);
        assert_eq!(state.balance("receiver@test", "coin#test"), 1400);
        assert_eq!(state.balance("receiver@test", "other#test"), 0);
    }

    #[test]
    fn test_transfer_checks() {
        let mut state = state_with_accounts();

        let overdraw = Command::transfer("group@test", "receiver@test", "coin#test", "pay", 1);
        assert!(matches!(
            state.apply("group@test", &overdraw),
            Err(LedgerError::InsufficientBalance { .. })
        ));

        // Cannot move someone else's funds
        assert!(matches!(
            state.apply("receiver@test", &overdraw),
            Err(LedgerError::PermissionDenied(_))
        ));

        let unknown_dest = Command::transfer("group@test", "nobody@test", "coin#test", "pay", 1);
        assert!(matches!(
            state.apply("group@test", &unknown_dest),
            Err(LedgerError::UnknownAccount(_))
        ));
    }

    #[test]
    fn test_quorum_commands_target_own_account() {
        let mut state = state_with_accounts();
        assert_eq!(
            state.apply("admin@test", &Command::set_quorum("group@test", 1)),
            Err(LedgerError::PermissionDenied(
                "SetAccountQuorum by admin@test on group@test".to_string()
            ))
        );

        state
            .apply("group@test", &Command::add_signatory("group@test", "pk-alice"))
            .unwrap();
        state
            .apply("group@test", &Command::set_quorum("group@test", 2))
            .unwrap();
        assert_eq!(state.account("group@test").unwrap().quorum(), 2);
    }

    #[test]
    fn test_apply_transaction_records_commit() {
        let mut state = state_with_accounts();
        let tx = TransactionBuilder::new("admin@test")
            .command(Command::add_asset_quantity("coin#test", 100_000))
            .build()
            .unwrap();

        assert_eq!(state.apply_transaction(&tx).unwrap(), 1);
        assert!(state.is_committed(&tx.fingerprint()));
        assert_eq!(
            state.apply_transaction(&tx),
            Err(LedgerError::AlreadyCommitted(tx.fingerprint()))
        );
        assert_eq!(state.height(), 1);
    }
}
