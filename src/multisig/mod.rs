//! Multi-signature transaction coordination
//!
//! Collects signatures for transactions that need more than one signatory,
//! keeps them pending until the creator account's quorum is met, then hands
//! them to the commit layer exactly once.
//!
//! # Example
//!
//! ```ignore
//! use mini_multisig::multisig::{MstConfig, MstCoordinator};
//!
//! let coordinator = MstCoordinator::new(MstConfig::default(), ledger.clone(), verifier, ledger);
//!
//! // Alice proposes; quorum is 2 so the transaction waits
//! let outcome = coordinator.submit(&SignedTransaction::new(tx.clone()).sign(&alice)?)?;
//! assert!(outcome.is_pending());
//!
//! // Bob countersigns and the transfer commits
//! let outcome = coordinator.submit(&SignedTransaction::new(tx).sign(&bob)?)?;
//! assert!(outcome.is_finalized());
//! ```

pub mod clock;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod policy;
pub mod signature_set;
pub mod sink;
pub mod status;
pub mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ConfigError, MstConfig};
pub use coordinator::MstCoordinator;
pub use error::MstError;
pub use policy::{QuorumPolicy, QuorumSnapshot};
pub use signature_set::{AddOutcome, SignatureSet};
pub use sink::{FinalizationSink, SinkRejection};
pub use status::{ExpiredTransaction, MstEvent, PendingSummary, SubmitOutcome, TxStatus};
pub use store::{PendingEntry, PendingTransactionStore};
