//! Coordinator configuration

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::Path;
use thiserror::Error;

/// Default age after which a pending transaction expires (24 hours)
pub const DEFAULT_EXPIRY_WINDOW_SECS: u64 = 24 * 60 * 60;

/// Default period of the background expiry sweep
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 60;

/// Default time terminal statuses stay queryable
pub const DEFAULT_STATUS_RETENTION_SECS: u64 = 60 * 60;

/// Default capacity of the event broadcast channel
pub const DEFAULT_EVENT_CAPACITY: usize = 1024;

/// Upper bound for the expiry and retention windows (100 years)
pub const MAX_WINDOW_SECS: u64 = 100 * 365 * 24 * 60 * 60;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
    #[error("Parse error: {0}")]
    ParseError(#[from] serde_json::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Multisig coordinator settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MstConfig {
    /// Pending transactions older than this are expired by the sweep
    pub expiry_window_secs: u64,
    /// Period of the background sweep task
    pub sweep_interval_secs: u64,
    /// How long finalized/rejected/expired statuses remain queryable
    pub status_retention_secs: u64,
    /// Buffered events per subscriber before it lags
    pub event_capacity: usize,
}

impl Default for MstConfig {
    fn default() -> Self {
        Self {
            expiry_window_secs: DEFAULT_EXPIRY_WINDOW_SECS,
            sweep_interval_secs: DEFAULT_SWEEP_INTERVAL_SECS,
            status_retention_secs: DEFAULT_STATUS_RETENTION_SECS,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

impl MstConfig {
    /// Load from a JSON file; missing fields take their defaults
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let data = fs::read_to_string(path)?;
        let config: MstConfig = serde_json::from_str(&data)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.expiry_window_secs == 0 {
            return Err(ConfigError::Invalid(
                "expiry_window_secs must be positive".to_string(),
            ));
        }
        if self.expiry_window_secs > MAX_WINDOW_SECS {
            return Err(ConfigError::Invalid(format!(
                "expiry_window_secs must be at most {}",
                MAX_WINDOW_SECS
            )));
        }
        if self.status_retention_secs > MAX_WINDOW_SECS {
            return Err(ConfigError::Invalid(format!(
                "status_retention_secs must be at most {}",
                MAX_WINDOW_SECS
            )));
        }
        if self.sweep_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "sweep_interval_secs must be positive".to_string(),
            ));
        }
        if self.event_capacity == 0 {
            return Err(ConfigError::Invalid(
                "event_capacity must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn expiry_window(&self) -> chrono::Duration {
        chrono::Duration::seconds(clamp_secs(self.expiry_window_secs))
    }

    pub fn status_retention(&self) -> chrono::Duration {
        chrono::Duration::seconds(clamp_secs(self.status_retention_secs))
    }

    pub fn sweep_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.sweep_interval_secs.max(1))
    }
}

// chrono durations are bounded well below u64::MAX seconds
fn clamp_secs(secs: u64) -> i64 {
    secs.min(i64::MAX as u64 / 1000) as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = MstConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.expiry_window(), chrono::Duration::hours(24));
        assert_eq!(config.sweep_interval(), std::time::Duration::from_secs(60));
    }

    #[test]
    fn test_load_partial_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"expiry_window_secs": 300}}"#).unwrap();

        let config = MstConfig::load(file.path()).unwrap();
        assert_eq!(config.expiry_window_secs, 300);
        assert_eq!(config.sweep_interval_secs, DEFAULT_SWEEP_INTERVAL_SECS);
        assert_eq!(config.event_capacity, DEFAULT_EVENT_CAPACITY);
    }

    #[test]
    fn test_window_upper_bound() {
        let config = MstConfig {
            expiry_window_secs: u64::MAX,
            ..MstConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let config = MstConfig {
            status_retention_secs: MAX_WINDOW_SECS + 1,
            ..MstConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let config = MstConfig {
            expiry_window_secs: MAX_WINDOW_SECS,
            status_retention_secs: MAX_WINDOW_SECS,
            ..MstConfig::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_rejects_invalid() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"sweep_interval_secs": 0}}"#).unwrap();
        assert!(matches!(
            MstConfig::load(file.path()),
            Err(ConfigError::Invalid(_))
        ));

        let mut garbage = tempfile::NamedTempFile::new().unwrap();
        write!(garbage, "not json").unwrap();
        assert!(matches!(
            MstConfig::load(garbage.path()),
            Err(ConfigError::ParseError(_))
        ));

        assert!(matches!(
            MstConfig::load("/nonexistent/mst.json"),
            Err(ConfigError::IoError(_))
        ));
    }
}
