//! Configuration type definitions
//!
//! This module contains all the struct definitions for configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use super::defaults::*;

// ============================================
// CHROME OFFSET
// ============================================

/// Pixel allowance the render host adds for title bar and borders.
///
/// Additive to the requested content size; auto-resize adds it to the
/// measured content size to get the final outer window size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChromeOffset {
    #[serde(default = "default_chrome_width")]
    pub width: u32,
    #[serde(default = "default_chrome_height")]
    pub height: u32,
}

fn default_chrome_width() -> u32 {
    DEFAULT_CHROME_WIDTH
}
fn default_chrome_height() -> u32 {
    DEFAULT_CHROME_HEIGHT
}

impl Default for ChromeOffset {
    fn default() -> Self {
        ChromeOffset {
            width: DEFAULT_CHROME_WIDTH,
            height: DEFAULT_CHROME_HEIGHT,
        }
    }
}

// ============================================
// WINDOW DEFAULTS
// ============================================

/// Geometry and title used when a request leaves them out
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowDefaults {
    #[serde(default = "default_window_width")]
    pub width: u32,
    #[serde(default = "default_window_height")]
    pub height: u32,
    #[serde(default = "default_window_title")]
    pub title: String,
}

fn default_window_width() -> u32 {
    DEFAULT_WINDOW_WIDTH
}
fn default_window_height() -> u32 {
    DEFAULT_WINDOW_HEIGHT
}
fn default_window_title() -> String {
    DEFAULT_WINDOW_TITLE.to_string()
}

impl Default for WindowDefaults {
    fn default() -> Self {
        WindowDefaults {
            width: DEFAULT_WINDOW_WIDTH,
            height: DEFAULT_WINDOW_HEIGHT,
            title: DEFAULT_WINDOW_TITLE.to_string(),
        }
    }
}

// ============================================
// COLLECTOR CONFIG
// ============================================

/// Geometry and timeout of the prebuilt API key collector
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectorConfig {
    #[serde(default = "default_collector_width")]
    pub width: u32,
    #[serde(default = "default_collector_height")]
    pub height: u32,
    /// Seconds the collector window stays open (default: 300)
    #[serde(default = "default_collector_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_collector_width() -> u32 {
    DEFAULT_COLLECTOR_WIDTH
}
fn default_collector_height() -> u32 {
    DEFAULT_COLLECTOR_HEIGHT
}
fn default_collector_timeout_secs() -> u64 {
    DEFAULT_COLLECTOR_TIMEOUT_SECS
}

impl Default for CollectorConfig {
    fn default() -> Self {
        CollectorConfig {
            width: DEFAULT_COLLECTOR_WIDTH,
            height: DEFAULT_COLLECTOR_HEIGHT,
            timeout_secs: DEFAULT_COLLECTOR_TIMEOUT_SECS,
        }
    }
}

// ============================================
// RENDERER
// ============================================

/// External renderer process driven over stdio
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RendererConfig {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
}

// ============================================
// MAIN CONFIG
// ============================================

/// Top-level bridge configuration (~/.ui-bridge/config.json)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeConfig {
    /// MCP HTTP listener port (default: 43210)
    #[serde(default = "default_port")]
    pub port: u16,
    /// Data directory override (default: ~/.ui-bridge)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<String>,
    #[serde(default)]
    pub chrome_offset: ChromeOffset,
    /// Padding the measurement script adds around the content (default: 20)
    #[serde(default = "default_measure_padding")]
    pub measure_padding: u32,
    #[serde(default)]
    pub window: WindowDefaults,
    /// Seconds a caller waits past the window timeout (default: 5)
    #[serde(default = "default_reply_grace_secs")]
    pub reply_grace_secs: u64,
    /// Seconds a test_queue probe waits (default: 10)
    #[serde(default = "default_probe_timeout_secs")]
    pub probe_timeout_secs: u64,
    #[serde(default)]
    pub collector: CollectorConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub renderer: Option<RendererConfig>,
    #[serde(default = "default_keyring_service")]
    pub keyring_service: String,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_measure_padding() -> u32 {
    DEFAULT_MEASURE_PADDING
}
fn default_reply_grace_secs() -> u64 {
    DEFAULT_REPLY_GRACE_SECS
}
fn default_probe_timeout_secs() -> u64 {
    DEFAULT_PROBE_TIMEOUT_SECS
}
fn default_keyring_service() -> String {
    DEFAULT_KEYRING_SERVICE.to_string()
}

impl Default for BridgeConfig {
    fn default() -> Self {
        BridgeConfig {
            port: DEFAULT_PORT,
            data_dir: None,
            chrome_offset: ChromeOffset::default(),
            measure_padding: DEFAULT_MEASURE_PADDING,
            window: WindowDefaults::default(),
            reply_grace_secs: DEFAULT_REPLY_GRACE_SECS,
            probe_timeout_secs: DEFAULT_PROBE_TIMEOUT_SECS,
            collector: CollectorConfig::default(),
            renderer: None,
            keyring_service: DEFAULT_KEYRING_SERVICE.to_string(),
        }
    }
}

impl BridgeConfig {
    /// Resolved data directory, with `~` expanded
    pub fn data_dir(&self) -> PathBuf {
        let raw = self.data_dir.as_deref().unwrap_or(DEFAULT_DATA_DIR);
        PathBuf::from(shellexpand::tilde(raw).as_ref())
    }

    pub fn log_dir(&self) -> PathBuf {
        self.data_dir().join("logs")
    }

    pub fn reply_grace(&self) -> Duration {
        Duration::from_secs(self.reply_grace_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    pub fn collector_timeout(&self) -> Duration {
        Duration::from_secs(self.collector.timeout_secs)
    }
}
