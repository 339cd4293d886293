//! Request outcomes and the caller-facing response shape

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// How a request ended, as written by the dispatch loop
#[derive(Debug, Clone, PartialEq)]
pub enum UiOutcome {
    Success { data: Value },
    Cancelled { reason: String },
    Error { detail: String },
    Timeout,
}

impl UiOutcome {
    pub fn error(detail: impl Into<String>) -> Self {
        UiOutcome::Error {
            detail: detail.into(),
        }
    }

    /// Map the `window.userResponse` value captured at close time.
    ///
    /// No response means the user closed the window.
    pub fn from_window_response(response: Option<Value>) -> Self {
        let Some(response) = response else {
            return UiOutcome::Cancelled {
                reason: "User closed the window without responding".to_string(),
            };
        };

        let text_field = |key: &str| {
            response
                .get(key)
                .and_then(Value::as_str)
                .map(str::to_string)
        };

        match response.get("status").and_then(Value::as_str) {
            Some("success") => UiOutcome::Success {
                data: response.get("data").cloned().unwrap_or(Value::Null),
            },
            Some("cancelled") => UiOutcome::Cancelled {
                reason: text_field("message")
                    .unwrap_or_else(|| "User cancelled the dialog".to_string()),
            },
            Some("error") => UiOutcome::Error {
                detail: text_field("error")
                    .or_else(|| text_field("message"))
                    .unwrap_or_else(|| "Window reported an error".to_string()),
            },
            Some(other) => UiOutcome::error(format!("unrecognised status '{}'", other)),
            None => UiOutcome::error("unrecognised status"),
        }
    }

    pub fn status(&self) -> ResponseStatus {
        match self {
            UiOutcome::Success { .. } => ResponseStatus::Success,
            UiOutcome::Cancelled { .. } => ResponseStatus::Cancelled,
            UiOutcome::Error { .. } => ResponseStatus::Error,
            UiOutcome::Timeout => ResponseStatus::Timeout,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    Success,
    Cancelled,
    Timeout,
    Error,
}

impl ResponseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseStatus::Success => "success",
            ResponseStatus::Cancelled => "cancelled",
            ResponseStatus::Timeout => "timeout",
            ResponseStatus::Error => "error",
        }
    }
}

/// Result returned to the tool caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResponse {
    pub status: ResponseStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window_closed: Option<bool>,
    #[serde(rename = "async", default, skip_serializing_if = "Option::is_none")]
    pub is_async: Option<bool>,
}

impl ToolResponse {
    fn with_status(status: ResponseStatus) -> Self {
        Self {
            status,
            data: None,
            message: None,
            error: None,
            window_closed: None,
            is_async: None,
        }
    }

    /// Successful result carrying `data`, window already closed
    pub fn success(data: Value) -> Self {
        Self {
            data: Some(data),
            window_closed: Some(true),
            ..Self::with_status(ResponseStatus::Success)
        }
    }

    /// Successful result with no window involved (probe replies, stored keys)
    pub fn success_data(data: Value) -> Self {
        Self {
            data: Some(data),
            ..Self::with_status(ResponseStatus::Success)
        }
    }

    /// Request accepted, caller is not waiting for the user
    pub fn accepted(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            is_async: Some(true),
            ..Self::with_status(ResponseStatus::Success)
        }
    }

    pub fn cancelled(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            window_closed: Some(true),
            ..Self::with_status(ResponseStatus::Cancelled)
        }
    }

    pub fn error(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::with_status(ResponseStatus::Error)
        }
    }

    pub fn timeout(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::with_status(ResponseStatus::Timeout)
        }
    }

    /// Map a dispatch outcome; `timeout_secs` is only used for the message
    pub fn from_outcome(outcome: UiOutcome, timeout_secs: u64) -> Self {
        match outcome {
            UiOutcome::Success { data } => Self::success(data),
            UiOutcome::Cancelled { reason } => Self::cancelled(reason),
            UiOutcome::Error { detail } => Self::error(detail),
            UiOutcome::Timeout => Self::timeout(format!(
                "User did not respond within {} seconds",
                timeout_secs
            )),
        }
    }

    pub fn to_pretty_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|e| {
            format!(
                "{{\"status\":\"error\",\"error\":\"failed to serialize response: {}\"}}",
                e
            )
        })
    }
}
