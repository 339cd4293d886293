//! UI request envelope
//!
//! A `UIRequest` is built by the facade, moved into the mailbox and from
//! there owned by the dispatch loop. It is never mutated after enqueue.

use std::fmt;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::messages::{MessageCommand, ToastLevel};

/// Unique id of one request, also used as the render host's window id
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(String);

impl RequestId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RequestId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// What the caller asked for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    /// `show_popup`: non-modal window
    #[serde(rename = "show_popup")]
    Popup,
    /// `show_dialog`: modal window
    #[serde(rename = "show_dialog")]
    Dialog,
    /// `collect_api_key`: prebuilt collector page
    #[serde(rename = "collect_api_key")]
    ApiKeyCollector,
    /// `readme`: documentation, answered without the dispatch loop
    Readme,
    /// `test_queue`: round trip through the loop with no window
    TestQueue,
    /// `show_toast`: short notification through the render host
    #[serde(rename = "show_toast")]
    Toast,
    SendMessage,
    CheckMessages,
    ShowDashboard,
    HideDashboard,
    #[serde(rename = "get_message_history")]
    MessageHistory,
    ClearMessages,
}

impl OperationKind {
    /// Every recognised operation, in documentation order
    pub const ALL: [OperationKind; 12] = [
        OperationKind::Readme,
        OperationKind::Popup,
        OperationKind::Dialog,
        OperationKind::TestQueue,
        OperationKind::ApiKeyCollector,
        OperationKind::Toast,
        OperationKind::SendMessage,
        OperationKind::CheckMessages,
        OperationKind::ShowDashboard,
        OperationKind::HideDashboard,
        OperationKind::MessageHistory,
        OperationKind::ClearMessages,
    ];

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.as_str() == value)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Popup => "show_popup",
            OperationKind::Dialog => "show_dialog",
            OperationKind::ApiKeyCollector => "collect_api_key",
            OperationKind::Readme => "readme",
            OperationKind::TestQueue => "test_queue",
            OperationKind::Toast => "show_toast",
            OperationKind::SendMessage => "send_message",
            OperationKind::CheckMessages => "check_messages",
            OperationKind::ShowDashboard => "show_dashboard",
            OperationKind::HideDashboard => "hide_dashboard",
            OperationKind::MessageHistory => "get_message_history",
            OperationKind::ClearMessages => "clear_messages",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Window content: inline markup or a remote locator, never both
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentSource {
    Html(String),
    Url(String),
}

impl ContentSource {
    /// Short description for logs; never the full markup
    pub fn describe(&self) -> String {
        match self {
            ContentSource::Html(html) => format!("html ({} chars)", html.len()),
            ContentSource::Url(url) => format!("url {}", url),
        }
    }
}

/// Geometry and behaviour hints for a window request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowHints {
    pub width: u32,
    pub height: u32,
    pub modal: bool,
    pub resizable: bool,
    pub always_on_top: bool,
    pub auto_resize: bool,
    pub center_on_screen: bool,
    pub bring_to_front: bool,
}

impl Default for WindowHints {
    fn default() -> Self {
        Self {
            width: crate::config::DEFAULT_WINDOW_WIDTH,
            height: crate::config::DEFAULT_WINDOW_HEIGHT,
            modal: true,
            resizable: false,
            always_on_top: true,
            auto_resize: false,
            center_on_screen: true,
            bring_to_front: true,
        }
    }
}

/// Operation-specific payload
#[derive(Debug, Clone, PartialEq)]
pub enum RequestPayload {
    Window {
        content: ContentSource,
        title: String,
        hints: WindowHints,
    },
    Probe {
        message: String,
    },
    Toast {
        level: ToastLevel,
        message: String,
    },
    Messages(MessageCommand),
}

#[derive(Debug, Clone)]
pub struct UIRequest {
    pub id: RequestId,
    pub operation: OperationKind,
    pub payload: RequestPayload,
    /// Zero means the window has no deadline
    pub timeout: Duration,
    /// Monotonic creation time, used for deadlines and queue latency
    pub created_at: Instant,
    /// Wall-clock creation time, used in logs and probe replies
    pub created_wall: DateTime<Utc>,
}

impl UIRequest {
    fn build(operation: OperationKind, payload: RequestPayload, timeout: Duration) -> Self {
        Self {
            id: RequestId::new(),
            operation,
            payload,
            timeout,
            created_at: Instant::now(),
            created_wall: Utc::now(),
        }
    }

    pub fn window(
        operation: OperationKind,
        content: ContentSource,
        title: impl Into<String>,
        hints: WindowHints,
        timeout: Duration,
    ) -> Self {
        Self::build(
            operation,
            RequestPayload::Window {
                content,
                title: title.into(),
                hints,
            },
            timeout,
        )
    }

    pub fn probe(message: impl Into<String>) -> Self {
        Self::build(
            OperationKind::TestQueue,
            RequestPayload::Probe {
                message: message.into(),
            },
            Duration::ZERO,
        )
    }

    pub fn toast(level: ToastLevel, message: impl Into<String>) -> Self {
        Self::build(
            OperationKind::Toast,
            RequestPayload::Toast {
                level,
                message: message.into(),
            },
            Duration::ZERO,
        )
    }

    pub fn messages(command: MessageCommand) -> Self {
        Self::build(
            command.operation(),
            RequestPayload::Messages(command),
            Duration::ZERO,
        )
    }

    /// When the dispatch loop force-closes this request's window.
    ///
    /// A timeout too large to represent as an `Instant` means no deadline.
    pub fn deadline(&self) -> Option<Instant> {
        if self.timeout.is_zero() {
            None
        } else {
            self.created_at.checked_add(self.timeout)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_parse_round_trips_names() {
        for op in OperationKind::ALL {
            assert_eq!(OperationKind::parse(op.as_str()), Some(op));
        }
        assert_eq!(OperationKind::parse("show_notification"), None);
        assert_eq!(OperationKind::parse("SHOW_POPUP"), None);
    }

    #[test]
    fn test_operation_serde_uses_wire_names() {
        let json = serde_json::to_string(&OperationKind::ApiKeyCollector).unwrap();
        assert_eq!(json, "\"collect_api_key\"");
        let op: OperationKind = serde_json::from_str("\"test_queue\"").unwrap();
        assert_eq!(op, OperationKind::TestQueue);
    }

    #[test]
    fn test_message_operations_use_original_wire_names() {
        assert_eq!(
            OperationKind::parse("get_message_history"),
            Some(OperationKind::MessageHistory)
        );
        let json = serde_json::to_string(&OperationKind::CheckMessages).unwrap();
        assert_eq!(json, "\"check_messages\"");
        let op: OperationKind = serde_json::from_str("\"show_toast\"").unwrap();
        assert_eq!(op, OperationKind::Toast);
    }

    #[test]
    fn test_request_ids_are_unique() {
        let a = UIRequest::probe("a");
        let b = UIRequest::probe("b");
        assert_ne!(a.id, b.id);
        assert!(uuid::Uuid::parse_str(a.id.as_str()).is_ok());
    }

    #[test]
    fn test_zero_timeout_has_no_deadline() {
        let request = UIRequest::window(
            OperationKind::Popup,
            ContentSource::Html("<p>hi</p>".into()),
            "t",
            WindowHints::default(),
            Duration::ZERO,
        );
        assert_eq!(request.deadline(), None);
    }

    #[test]
    fn test_deadline_is_creation_plus_timeout() {
        let request = UIRequest::window(
            OperationKind::Dialog,
            ContentSource::Url("https://example.com".into()),
            "t",
            WindowHints::default(),
            Duration::from_secs(30),
        );
        assert_eq!(
            request.deadline(),
            Some(request.created_at + Duration::from_secs(30))
        );
    }

    #[test]
    fn test_unrepresentable_timeout_has_no_deadline() {
        let request = UIRequest::window(
            OperationKind::Popup,
            ContentSource::Html("<p>hi</p>".into()),
            "t",
            WindowHints::default(),
            Duration::from_secs(u64::MAX),
        );
        assert_eq!(request.deadline(), None);
    }

    #[test]
    fn test_describe_never_includes_markup() {
        let content = ContentSource::Html("<script>secret()</script>".into());
        let described = content.describe();
        assert!(!described.contains("secret"));
        assert!(described.contains("25 chars"));
    }
}
