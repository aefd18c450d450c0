//! Command-line options common to every tool

use anyhow::{Context, Result};
use aub::Settings;
use aub_common::{BridgeConfig, setup_logging};
use clap::Args;
use std::path::PathBuf;

#[derive(Args, Debug, Clone, Default)]
pub struct CommonArgs {
    /// Path to configuration file
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Transfer timeout in milliseconds, overrides the config file
    #[arg(long, value_name = "MS")]
    pub timeout_ms: Option<u64>,
}

impl CommonArgs {
    /// Configuration file with command-line overrides applied
    pub fn load_config(&self) -> Result<BridgeConfig> {
        let mut config = if let Some(ref path) = self.config {
            BridgeConfig::load(Some(path.clone())).context("Failed to load configuration")?
        } else {
            BridgeConfig::load_or_default()
        };

        if let Some(ref level) = self.log_level {
            config.logging.level = level.clone();
        }
        if let Some(timeout_ms) = self.timeout_ms {
            config.usb.timeout_ms = timeout_ms;
        }

        config.validate()?;
        Ok(config)
    }

    /// Load the configuration, install logging and derive library settings
    pub fn setup(&self) -> Result<Settings> {
        let config = self.load_config()?;
        setup_logging(&config.logging.level).context("Failed to setup logging")?;
        config.settings()
    }
}
