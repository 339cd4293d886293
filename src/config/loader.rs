//! Configuration loading from file system

use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, instrument, warn};

use super::defaults::{CONFIG_FILE_NAME, DEFAULT_DATA_DIR};
use super::types::BridgeConfig;

/// Path of the config file in the default data directory
pub fn default_config_path() -> PathBuf {
    PathBuf::from(shellexpand::tilde(DEFAULT_DATA_DIR).as_ref()).join(CONFIG_FILE_NAME)
}

/// Load configuration from ~/.ui-bridge/config.json
///
/// Returns BridgeConfig::default() if the file is missing or invalid.
pub fn load_config() -> BridgeConfig {
    load_config_from(&default_config_path())
}

/// Load configuration from an explicit path.
///
/// Every field has a default, so a partial file only overrides what it names.
/// Returns BridgeConfig::default() if any step fails.
#[instrument(name = "load_config", skip_all, fields(path = %path.display()))]
pub fn load_config_from(path: &Path) -> BridgeConfig {
    if !path.exists() {
        info!("Config file not found, using defaults");
        return BridgeConfig::default();
    }

    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) => {
            warn!(error = %e, "Failed to read config file, using defaults");
            return BridgeConfig::default();
        }
    };

    match serde_json::from_str::<BridgeConfig>(&raw) {
        Ok(config) => {
            info!("Successfully loaded config");
            config
        }
        Err(e) => {
            let hint = if e.to_string().contains("chromeOffset") {
                "\n\nHint: chromeOffset takes integer pixels, e.g. {\"width\": 16, \"height\": 39}"
            } else if e.to_string().contains("renderer") {
                "\n\nHint: renderer needs a command, e.g. {\"command\": \"ui-renderer\", \"args\": []}"
            } else {
                ""
            };

            warn!(
                error = %e,
                hint = %hint,
                "Failed to parse config JSON, using defaults"
            );
            BridgeConfig::default()
        }
    }
}
