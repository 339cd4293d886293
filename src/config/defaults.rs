//! Default configuration values
//!
//! All constants used throughout the config module are defined here.

/// Default port for the MCP HTTP listener
pub const DEFAULT_PORT: u16 = 43210;

/// Directory holding the config file, logs, agent token and installation id
pub const DEFAULT_DATA_DIR: &str = "~/.ui-bridge";

/// Config file name inside the data directory
pub const CONFIG_FILE_NAME: &str = "config.json";

/// Title bar + border overhead the render host adds around the content area.
/// Must match the host exactly or auto-resized windows come out wrong.
pub const DEFAULT_CHROME_WIDTH: u32 = 16;
pub const DEFAULT_CHROME_HEIGHT: u32 = 39;

/// Padding the measurement script adds to the content's rendered size
pub const DEFAULT_MEASURE_PADDING: u32 = 20;

/// Default window geometry and title for show_popup / show_dialog
pub const DEFAULT_WINDOW_WIDTH: u32 = 600;
pub const DEFAULT_WINDOW_HEIGHT: u32 = 400;
pub const DEFAULT_WINDOW_TITLE: &str = "User Interface";

/// Extra seconds a caller waits beyond the window timeout before giving up
pub const DEFAULT_REPLY_GRACE_SECS: u64 = 5;

/// How long a test_queue probe waits for the dispatch loop
pub const DEFAULT_PROBE_TIMEOUT_SECS: u64 = 10;

/// API key collector window
pub const DEFAULT_COLLECTOR_WIDTH: u32 = 550;
pub const DEFAULT_COLLECTOR_HEIGHT: u32 = 450;
pub const DEFAULT_COLLECTOR_TIMEOUT_SECS: u64 = 300;

/// Keyring service name collected API keys are stored under
pub const DEFAULT_KEYRING_SERVICE: &str = "com.ui-bridge.settings";
