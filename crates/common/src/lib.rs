//! Common utilities for the AXIS USB Bridge workspace
//!
//! This crate provides the pieces shared between the bridge library and the
//! command-line tools: the error type, logging setup, and the configuration
//! file with the runtime [`Settings`] derived from it.

pub mod config;
pub mod error;
pub mod logging;

pub use config::{BridgeConfig, DeviceFilter, Settings};
pub use error::{Error, Result};
pub use logging::setup_logging;
