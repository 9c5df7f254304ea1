//! Settlement engine configuration

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level settlement configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Ledger data directory
    pub ledger_data_dir: PathBuf,

    /// Days a hold may stay open before the timeout sweep disputes it
    pub escrow_timeout_days: i64,

    /// Hours a customs checkpoint may sit Pending before it is flagged
    pub customs_stale_hours: i64,

    /// Validity window for issued phytosanitary certificates, in days
    pub certificate_validity_days: i64,

    /// Seconds between background sweep runs
    pub sweep_interval_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ledger_data_dir: PathBuf::from("./data/ledger"),
            escrow_timeout_days: 7,
            customs_stale_hours: 48,
            certificate_validity_days: 30,
            sweep_interval_secs: 3600,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| Error::Config(format!("Invalid config: {}", e)))
    }

    /// Load configuration from environment variables, falling back to defaults
    pub fn from_env() -> Result<Self> {
        let mut config = Config::default();

        if let Ok(dir) = std::env::var("SETTLEMENT_LEDGER_DATA_DIR") {
            config.ledger_data_dir = PathBuf::from(dir);
        }
        if let Ok(days) = std::env::var("SETTLEMENT_ESCROW_TIMEOUT_DAYS") {
            config.escrow_timeout_days = days
                .parse()
                .map_err(|e| Error::Config(format!("Invalid SETTLEMENT_ESCROW_TIMEOUT_DAYS: {}", e)))?;
        }
        if let Ok(secs) = std::env::var("SETTLEMENT_SWEEP_INTERVAL_SECS") {
            config.sweep_interval_secs = secs
                .parse()
                .map_err(|e| Error::Config(format!("Invalid SETTLEMENT_SWEEP_INTERVAL_SECS: {}", e)))?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Range checks
    pub fn validate(&self) -> Result<()> {
        if self.escrow_timeout_days <= 0 {
            return Err(Error::Config(
                "escrow_timeout_days must be positive".to_string(),
            ));
        }
        if self.customs_stale_hours <= 0 {
            return Err(Error::Config(
                "customs_stale_hours must be positive".to_string(),
            ));
        }
        if self.certificate_validity_days <= 0 {
            return Err(Error::Config(
                "certificate_validity_days must be positive".to_string(),
            ));
        }
        if self.sweep_interval_secs == 0 {
            return Err(Error::Config(
                "sweep_interval_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
