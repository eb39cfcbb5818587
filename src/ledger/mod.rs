//! In-memory ledger state
//!
//! Accounts with versioned quorum and signatory sets, asset balances and the
//! commit log of finalized transactions. The [`Ledger`] handle is the quorum
//! source and the finalization target for the multisig coordinator.

pub mod account;
pub mod ledger;
pub mod world_state;

pub use account::{Account, AccountSnapshot};
pub use ledger::Ledger;
pub use world_state::{LedgerError, WorldState};
