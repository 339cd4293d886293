//! Configuration module - bridge settings
//!
//! This module provides functionality for:
//! - Loading configuration from ~/.ui-bridge/config.json
//! - Default values for all settings
//! - Type definitions for config structures
//!
//! # Module Structure
//!
//! - `defaults` - All default constant values
//! - `types` - Configuration struct definitions (BridgeConfig, ChromeOffset, etc.)
//! - `loader` - File system loading and parsing

mod defaults;
mod loader;
mod types;

pub use defaults::{
    CONFIG_FILE_NAME, DEFAULT_DATA_DIR, DEFAULT_WINDOW_HEIGHT, DEFAULT_WINDOW_TITLE,
    DEFAULT_WINDOW_WIDTH,
};

pub use types::{BridgeConfig, ChromeOffset, CollectorConfig, RendererConfig, WindowDefaults};

pub use loader::{default_config_path, load_config, load_config_from};

#[cfg(test)]
pub use defaults::{
    DEFAULT_CHROME_HEIGHT, DEFAULT_CHROME_WIDTH, DEFAULT_COLLECTOR_TIMEOUT_SECS,
    DEFAULT_MEASURE_PADDING, DEFAULT_PORT, DEFAULT_REPLY_GRACE_SECS,
};

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
