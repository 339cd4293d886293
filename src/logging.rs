//! Structured JSONL logging for agents and human-readable stderr output.
//!
//! This module provides dual-output logging:
//! - **JSONL to file** (<data_dir>/logs/ui-bridge.jsonl) - structured for machine parsing
//! - **Pretty to stderr** - human-readable for developers
//!
//! # Usage
//!
//! ```rust,ignore
//! use ui_bridge::logging;
//!
//! // Initialize logging - MUST keep guard alive for duration of program
//! let _guard = logging::init(&config.log_dir());
//!
//! // Use tracing macros directly
//! tracing::info!(event_type = "request", request_id = %id, "Request enqueued");
//! ```
//!
//! # JSONL Output Format
//!
//! Each line is a valid JSON object:
//! ```json
//! {"timestamp":"2026-10-16T10:30:45.123Z","level":"INFO","target":"ui_bridge::dispatch","fields":{"message":"Window opened","event_type":"request","request_id":"..."}}
//! ```

use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Log file name inside the log directory
pub const LOG_FILE_NAME: &str = "ui-bridge.jsonl";

/// Maximum length of raw payloads (HTML, scripts) echoed into logs
const MAX_LOG_PREVIEW: usize = 200;

/// Guard that must be kept alive for the duration of the program.
/// Dropping this guard will flush and close the log file.
pub struct LoggingGuard {
    _file_guard: WorkerGuard,
}

/// Initialize the dual-output logging system.
///
/// Returns a guard that MUST be kept alive for the duration of the program.
/// Dropping the guard will flush remaining logs and close the file.
pub fn init(log_dir: &Path) -> LoggingGuard {
    if let Err(e) = fs::create_dir_all(log_dir) {
        eprintln!("[LOGGING] Failed to create log directory: {}", e);
    }

    let log_path = log_path(log_dir);

    eprintln!("========================================");
    eprintln!("[UI-BRIDGE] JSONL log: {}", log_path.display());
    eprintln!("[UI-BRIDGE] Pretty logs: stderr");
    eprintln!("========================================");

    // Fall back to a temp file so logging never takes the bridge down
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .or_else(|e| {
            eprintln!("[LOGGING] Failed to open log file: {}", e);
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(std::env::temp_dir().join(LOG_FILE_NAME))
        });

    let (non_blocking_file, file_guard) = match file {
        Ok(file) => tracing_appender::non_blocking(file),
        Err(e) => {
            eprintln!("[LOGGING] Falling back to stderr only: {}", e);
            tracing_appender::non_blocking(std::io::sink())
        }
    };

    // Environment filter - default to info, allow override via RUST_LOG
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let json_layer = fmt::layer()
        .json()
        .with_writer(non_blocking_file)
        .with_timer(fmt::time::UtcTime::rfc_3339())
        .with_target(true)
        .with_level(true)
        .with_thread_ids(false)
        .with_thread_names(true)
        .with_file(false)
        .with_line_number(false)
        .with_span_events(FmtSpan::NONE);

    let pretty_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(true)
        .with_target(true)
        .with_level(true)
        .with_thread_ids(false)
        .compact();

    // try_init so a second call (tests, embedding) is not fatal
    if tracing_subscriber::registry()
        .with(env_filter)
        .with(json_layer)
        .with(pretty_layer)
        .try_init()
        .is_err()
    {
        eprintln!("[LOGGING] Global subscriber already installed");
    }

    tracing::info!(
        event_type = "app_lifecycle",
        action = "started",
        log_path = %log_path.display(),
        "Application logging initialized"
    );

    LoggingGuard {
        _file_guard: file_guard,
    }
}

/// Get the path to the JSONL log file inside `log_dir`
pub fn log_path(log_dir: &Path) -> PathBuf {
    log_dir.join(LOG_FILE_NAME)
}

/// Truncated preview of a raw payload for logging, plus its full length.
///
/// Cuts on a char boundary so multi-byte content never panics.
pub fn log_preview(raw: &str) -> (&str, usize) {
    let len = raw.len();
    if len <= MAX_LOG_PREVIEW {
        return (raw, len);
    }
    let mut end = MAX_LOG_PREVIEW;
    while !raw.is_char_boundary(end) {
        end -= 1;
    }
    (&raw[..end], len)
}

// =============================================================================
// STRUCTURED LOGGING HELPERS
// =============================================================================

/// Log a request lifecycle step (enqueued, dispatched, replied, ...)
pub fn log_request_event(request_id: &str, operation: &str, action: &str) {
    tracing::info!(
        event_type = "request",
        request_id = request_id,
        operation = operation,
        action = action,
        "Request {} {}",
        request_id,
        action
    );
}

/// Log a delivered outcome with how long the request was in flight
pub fn log_outcome(request_id: &str, status: &str, elapsed_ms: u64) {
    tracing::info!(
        event_type = "outcome",
        request_id = request_id,
        status = status,
        elapsed_ms = elapsed_ms,
        "Request {} finished with {}",
        request_id,
        status
    );
}
