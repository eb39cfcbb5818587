//! Client-side handle for talking to the ledger and its multisig coordinator
//!
//! Everything a signer needs goes through an explicit [`LedgerClient`]
//! value; there is no process-wide connection state.

pub mod ledger_client;

pub use ledger_client::{ClientError, LedgerClient};
