//! Configuration file support for Pillbox.
//!
//! Configuration is loaded from `$XDG_CONFIG_HOME/pillbox/config.toml`.

use crate::engine::{ResolverPolicy, SlotMatching};
use crate::history::DEFAULT_HISTORY_LIMIT;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application configuration
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub data: DataConfig,

    #[serde(default)]
    pub display: DisplayConfig,

    #[serde(default)]
    pub schedule: ScheduleConfig,
}

/// Data storage configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DataConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

/// How supply and stock are presented
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DisplayConfig {
    /// Show projected days of supply instead of the raw pill count
    #[serde(default = "default_show_days_supply")]
    pub show_days_supply: bool,

    #[serde(default = "default_refill_threshold_days")]
    pub refill_threshold_days: u32,

    /// Share of the stock ceiling at or below which a refill is suggested
    #[serde(default = "default_low_stock_fraction")]
    pub low_stock_fraction: f64,

    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            show_days_supply: default_show_days_supply(),
            refill_threshold_days: default_refill_threshold_days(),
            low_stock_fraction: default_low_stock_fraction(),
            history_limit: default_history_limit(),
        }
    }
}

/// Scheduling behavior that is still a product decision
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct ScheduleConfig {
    #[serde(default)]
    pub lost_consumes_slot: bool,

    #[serde(default)]
    pub slot_matching: SlotMatching,
}

// Default value functions
fn default_data_dir() -> PathBuf {
    match dirs::data_local_dir() {
        Some(base) => base.join("pillbox"),
        None => std::env::temp_dir().join("pillbox"),
    }
}

fn default_show_days_supply() -> bool {
    true
}

fn default_refill_threshold_days() -> u32 {
    5
}

fn default_low_stock_fraction() -> f64 {
    0.2
}

fn default_history_limit() -> usize {
    DEFAULT_HISTORY_LIMIT
}

impl Config {
    /// Load configuration from the standard config path
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path();
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            tracing::info!(
                "No config file found at {:?}, using defaults",
                config_path
            );
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        tracing::info!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        match dirs::config_dir() {
            Some(base) => base.join("pillbox").join("config.toml"),
            None => std::env::temp_dir().join("pillbox").join("config.toml"),
        }
    }

    /// Save the current configuration to the default path
    pub fn save(&self) -> Result<()> {
        let config_path = Self::default_config_path();
        self.save_to(&config_path)
    }

    /// Save the current configuration to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, contents)?;
        tracing::info!("Saved config to {:?}", path);
        Ok(())
    }

    /// Resolver policy described by the `[schedule]` section
    pub fn schedule_policy(&self) -> ResolverPolicy {
        ResolverPolicy {
            lost_consumes_slot: self.schedule.lost_consumes_slot,
            slot_matching: self.schedule.slot_matching,
        }
    }

    fn validate(&self) -> Result<()> {
        let fraction = self.display.low_stock_fraction;
        if !(0.0..=1.0).contains(&fraction) {
            return Err(Error::Config(format!(
                "display.low_stock_fraction must be between 0 and 1, got {}",
                fraction
            )));
        }
        Ok(())
    }
}
