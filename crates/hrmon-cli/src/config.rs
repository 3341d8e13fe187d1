//! Configuration file management.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use hrmon_core::{ActorConfig, ScanOptions};
use serde::{Deserialize, Serialize};

use crate::cli::Cli;

/// Time the pair timeout must leave after a full scan.
const PAIR_TIMEOUT_MARGIN_SECS: u64 = 5;

/// Configuration file structure
///
/// Every field is optional in the file; missing fields take their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Log filter used when neither `RUST_LOG` nor `-v`/`-q` is given
    pub log_level: String,

    /// How long to scan for a sensor, in seconds
    pub scan_secs: u64,

    /// Timeout for discovery, in seconds
    pub pair_timeout_secs: u64,

    /// Timeout for opening the GATT connection, in seconds
    pub connect_timeout_secs: u64,

    /// Timeout for every other Bluetooth call, in seconds
    pub operation_timeout_secs: u64,

    /// Print samples as JSON lines
    pub json: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            scan_secs: 20,
            pair_timeout_secs: 30,
            connect_timeout_secs: 15,
            operation_timeout_secs: 10,
            json: false,
        }
    }
}

impl Config {
    /// Default config file path
    pub fn path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("hrmon")
            .join("config.toml")
    }

    /// Load config from `explicit`, or from the default path if it exists.
    ///
    /// A missing explicit file is an error; a missing default file is not.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) => Self::load_from(path),
            None => {
                let path = Self::path();
                if path.exists() {
                    Self::load_from(&path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    /// Load config from a specific file.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config: {}", path.display()))
    }

    /// Apply command-line overrides.
    pub fn apply_args(&mut self, cli: &Cli) {
        if let Some(secs) = cli.scan_secs {
            self.scan_secs = secs;
        }
        if cli.json {
            self.json = true;
        }
    }

    /// Scan duration for the Bluetooth backend.
    pub fn scan_duration(&self) -> Duration {
        Duration::from_secs(self.scan_secs)
    }

    /// Scan options for the Bluetooth backend.
    pub fn scan_options(&self) -> ScanOptions {
        ScanOptions::new().duration(self.scan_duration())
    }

    /// Pair timeout, raised if needed so that a full scan ends before it.
    ///
    /// Zero is passed through so that validation still rejects it.
    pub fn pair_timeout(&self) -> Duration {
        let secs = match self.pair_timeout_secs {
            0 => 0,
            secs => secs.max(self.scan_secs.saturating_add(PAIR_TIMEOUT_MARGIN_SECS)),
        };
        Duration::from_secs(secs)
    }

    /// Actor timeouts.
    pub fn actor_config(&self) -> ActorConfig {
        ActorConfig::default()
            .pair_timeout(self.pair_timeout())
            .connect_timeout(Duration::from_secs(self.connect_timeout_secs))
            .operation_timeout(Duration::from_secs(self.operation_timeout_secs))
    }
}
