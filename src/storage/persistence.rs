//! Pending transaction persistence
//!
//! Saves the coordinator's pending entries (payloads plus collected
//! signatures) as JSON so that recorded signatures survive a restart.

use crate::multisig::PendingEntry;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::PathBuf;
use thiserror::Error;

/// Current on-disk format version
pub const PENDING_FILE_VERSION: u32 = 1;

/// Storage errors
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
    #[error("Unsupported file version {0}")]
    UnsupportedVersion(u32),
}

/// Storage configuration
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
    pub pending_file: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(".multisig_data"),
            pending_file: "pending.json".to_string(),
        }
    }
}

#[derive(Serialize, Deserialize)]
struct PendingFile {
    version: u32,
    saved_at: DateTime<Utc>,
    entries: Vec<PendingEntry>,
}

/// File-backed store for pending entries
pub struct PendingStorage {
    config: StorageConfig,
}

impl PendingStorage {
    pub fn new(config: StorageConfig) -> Result<Self, StorageError> {
        fs::create_dir_all(&config.data_dir)?;
        Ok(Self { config })
    }

    fn pending_path(&self) -> PathBuf {
        self.config.data_dir.join(&self.config.pending_file)
    }

    pub fn exists(&self) -> bool {
        self.pending_path().exists()
    }

    /// Write all entries, replacing the previous file atomically
    pub fn save(&self, entries: &[PendingEntry]) -> Result<(), StorageError> {
        let path = self.pending_path();
        let temp_path = path.with_extension("tmp");

        let file = fs::File::create(&temp_path)?;
        let mut writer = BufWriter::new(file);
        let contents = PendingFile {
            version: PENDING_FILE_VERSION,
            saved_at: Utc::now(),
            entries: entries.to_vec(),
        };
        serde_json::to_writer_pretty(&mut writer, &contents)?;
        writer.flush()?;
        drop(writer);

        fs::rename(&temp_path, &path)?;
        log::debug!("saved {} pending entries to {}", entries.len(), path.display());
        Ok(())
    }

    /// Read saved entries; a missing file yields none
    pub fn load(&self) -> Result<Vec<PendingEntry>, StorageError> {
        let path = self.pending_path();
        if !path.exists() {
            return Ok(Vec::new());
        }

        let reader = BufReader::new(fs::File::open(&path)?);
        let contents: PendingFile = serde_json::from_reader(reader)?;
        if contents.version != PENDING_FILE_VERSION {
            return Err(StorageError::UnsupportedVersion(contents.version));
        }
        Ok(contents.entries)
    }

    /// Delete the saved file
    pub fn clear(&self) -> Result<(), StorageError> {
        let path = self.pending_path();
        if path.exists() {
            fs::remove_file(path)?;
        }
        Ok(())
    }
}
