//! Bridge configuration management
//!
//! # Example Configuration
//! ```toml
//! [usb]
//! device_filter = "0xface:0x0bde"
//! timeout_ms = 10
//!
//! [logging]
//! level = "info"
//! ```

use crate::error::Error;
use anyhow::{Context, Result, anyhow};
use aub_protocol::{PRODUCT_ID, VENDOR_ID};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Default transfer timeout in milliseconds
pub const DEFAULT_TIMEOUT_MS: u64 = 10;

/// VID:PID pair used to select bridge devices during enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceFilter {
    pub vendor_id: u16,
    pub product_id: u16,
}

impl DeviceFilter {
    pub fn new(vendor_id: u16, product_id: u16) -> Self {
        Self {
            vendor_id,
            product_id,
        }
    }

    pub fn matches(&self, vendor_id: u16, product_id: u16) -> bool {
        self.vendor_id == vendor_id && self.product_id == product_id
    }
}

impl Default for DeviceFilter {
    fn default() -> Self {
        Self::new(VENDOR_ID, PRODUCT_ID)
    }
}

impl fmt::Display for DeviceFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#06x}:{:#06x}", self.vendor_id, self.product_id)
    }
}

impl FromStr for DeviceFilter {
    type Err = Error;

    /// Parse "VID:PID" in hex, with or without `0x` prefixes
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let (vid, pid) = s
            .trim()
            .split_once(':')
            .ok_or_else(|| Error::Config(format!("Invalid device filter '{}': expected VID:PID", s)))?;

        let parse = |part: &str| {
            let digits = part
                .trim()
                .trim_start_matches("0x")
                .trim_start_matches("0X");
            u16::from_str_radix(digits, 16)
                .map_err(|e| Error::Config(format!("Invalid device filter '{}': {}", s, e)))
        };

        Ok(Self::new(parse(vid)?, parse(pid)?))
    }
}

/// Runtime settings of the bridge library
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settings {
    /// Devices to pick up during enumeration
    pub filter: DeviceFilter,
    /// Timeout of every control and bulk transfer
    pub timeout: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            filter: DeviceFilter::default(),
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BridgeConfig {
    #[serde(default)]
    pub usb: UsbSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsbSettings {
    /// VID:PID of the bridge (hex)
    #[serde(default = "UsbSettings::default_filter")]
    pub device_filter: String,
    /// Control and bulk transfer timeout in milliseconds
    #[serde(default = "UsbSettings::default_timeout")]
    pub timeout_ms: u64,
}

impl Default for UsbSettings {
    fn default() -> Self {
        Self {
            device_filter: Self::default_filter(),
            timeout_ms: Self::default_timeout(),
        }
    }
}

impl UsbSettings {
    fn default_filter() -> String {
        DeviceFilter::default().to_string()
    }

    fn default_timeout() -> u64 {
        DEFAULT_TIMEOUT_MS
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    #[serde(default = "LoggingSettings::default_level")]
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
        }
    }
}

impl LoggingSettings {
    fn default_level() -> String {
        "info".to_string()
    }
}

impl BridgeConfig {
    /// Load configuration from the specified path
    ///
    /// Without a path the standard locations are tried in order:
    /// the user config directory, then `/etc/aub/config.toml`.
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        let config_path = if let Some(p) = path {
            PathBuf::from(shellexpand::tilde(&p.to_string_lossy()).as_ref())
        } else {
            find_existing(&Self::candidate_paths())
                .ok_or_else(|| anyhow!("No configuration file found, using defaults"))?
        };

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let config: BridgeConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;

        config.validate()?;

        tracing::info!("Loaded configuration from: {}", config_path.display());
        Ok(config)
    }

    /// Load configuration or return defaults if not found
    pub fn load_or_default() -> Self {
        Self::load_first_or_default(&Self::candidate_paths())
    }

    /// Load the first existing file among `candidates`, or the defaults
    ///
    /// A missing file is expected and only logged at debug level; a file
    /// that exists but does not load is a warning.
    pub fn load_first_or_default(candidates: &[PathBuf]) -> Self {
        let Some(path) = find_existing(candidates) else {
            tracing::debug!("No configuration file found, using defaults");
            return Self::default();
        };

        match Self::load(Some(path)) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("Failed to load config: {:#}, using defaults", e);
                Self::default()
            }
        }
    }

    /// Standard configuration locations, in lookup order
    pub fn candidate_paths() -> Vec<PathBuf> {
        vec![Self::default_path(), PathBuf::from("/etc/aub/config.toml")]
    }

    /// Save configuration to the specified path
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize configuration")?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        tracing::info!("Saved configuration to: {}", path.display());
        Ok(())
    }

    /// Get the default configuration file path
    pub fn default_path() -> PathBuf {
        if let Some(config_dir) = dirs::config_dir() {
            config_dir.join("aub").join("config.toml")
        } else {
            PathBuf::from(".config/aub/config.toml")
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(anyhow!(
                "Invalid log level '{}', must be one of: {}",
                self.logging.level,
                valid_levels.join(", ")
            ));
        }

        self.usb.device_filter.parse::<DeviceFilter>()?;

        if self.usb.timeout_ms == 0 {
            return Err(anyhow!("timeout_ms must be greater than 0"));
        }

        Ok(())
    }

    /// Library settings described by this configuration
    pub fn settings(&self) -> Result<Settings> {
        Ok(Settings {
            filter: self.usb.device_filter.parse()?,
            timeout: Duration::from_millis(self.usb.timeout_ms),
        })
    }
}

fn find_existing(candidates: &[PathBuf]) -> Option<PathBuf> {
    candidates.iter().find(|p| p.exists()).cloned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = BridgeConfig::default();
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.usb.timeout_ms, 10);
        assert!(config.validate().is_ok());

        let settings = config.settings().unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.filter, DeviceFilter::new(0xFACE, 0x0BDE));
        assert_eq!(settings.timeout, Duration::from_millis(10));
    }

    #[test]
    fn test_config_serialization() {
        let config = BridgeConfig::default();
        let toml_str = toml::to_string(&config).unwrap();
        let parsed: BridgeConfig = toml::from_str(&toml_str).unwrap();

        assert_eq!(config.usb.device_filter, parsed.usb.device_filter);
        assert_eq!(config.usb.timeout_ms, parsed.usb.timeout_ms);
        assert_eq!(config.logging.level, parsed.logging.level);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let parsed: BridgeConfig = toml::from_str("[usb]\ntimeout_ms = 250\n").unwrap();
        assert_eq!(parsed.usb.timeout_ms, 250);
        assert_eq!(parsed.usb.device_filter, "0xface:0x0bde");
        assert_eq!(parsed.logging.level, "info");
    }

    #[test]
    fn test_filter_parsing() {
        let filter: DeviceFilter = "0xFACE:0x0BDE".parse().unwrap();
        assert_eq!(filter, DeviceFilter::default());

        let filter: DeviceFilter = "1234:abcd".parse().unwrap();
        assert_eq!(filter, DeviceFilter::new(0x1234, 0xABCD));
        assert!(filter.matches(0x1234, 0xABCD));
        assert!(!filter.matches(0x1234, 0xABCE));

        assert!("face".parse::<DeviceFilter>().is_err());
        assert!("face:zzzz".parse::<DeviceFilter>().is_err());
        assert!("1ffff:0001".parse::<DeviceFilter>().is_err());
    }

    #[test]
    fn test_filter_display_roundtrip() {
        let filter = DeviceFilter::new(0x04f9, 0x0042);
        assert_eq!(filter.to_string(), "0x04f9:0x0042");
        assert_eq!(filter.to_string().parse::<DeviceFilter>().unwrap(), filter);
    }

    #[test]
    fn test_validate_log_level() {
        let mut config = BridgeConfig::default();
        config.logging.level = "invalid".to_string();
        assert!(config.validate().is_err());

        config.logging.level = "trace".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_timeout() {
        let mut config = BridgeConfig::default();
        config.usb.timeout_ms = 0;
        assert!(config.validate().is_err());
    }
}
