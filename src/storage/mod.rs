//! Storage module for pending transaction persistence

pub mod persistence;

pub use persistence::{PendingStorage, StorageConfig, StorageError};
