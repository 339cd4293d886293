//! Asynchronous user messaging
//!
//! Callers post messages to a persistent dashboard window and pick up the
//! user's replies later, without holding a window open. The history lives in
//! a [`MessageCenter`] owned by the dispatch loop; callers reach it only by
//! enqueueing a [`MessageCommand`].
//!
//! Messages keep the shape callers see on the wire:
//!
//! ```json
//! {"id": "...", "timestamp": 1763524358.29, "direction": "user_to_ai", "type": "response",
//!  "priority": "normal", "content": "Looks good", "requires_response": false, "status": "pending"}
//! ```

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::request::OperationKind;

/// Severity of a toast notification
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToastLevel {
    #[default]
    Info,
    Warning,
    Error,
    Success,
}

impl ToastLevel {
    pub const ALL: [ToastLevel; 4] = [
        ToastLevel::Info,
        ToastLevel::Warning,
        ToastLevel::Error,
        ToastLevel::Success,
    ];

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|level| level.as_str() == value)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ToastLevel::Info => "info",
            ToastLevel::Warning => "warning",
            ToastLevel::Error => "error",
            ToastLevel::Success => "success",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    Question,
    #[default]
    Status,
    Notification,
    Response,
}

impl MessageType {
    pub const ALL: [MessageType; 4] = [
        MessageType::Question,
        MessageType::Status,
        MessageType::Notification,
        MessageType::Response,
    ];

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == value)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::Question => "question",
            MessageType::Status => "status",
            MessageType::Notification => "notification",
            MessageType::Response => "response",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
    Critical,
}

impl Priority {
    pub const ALL: [Priority; 4] = [
        Priority::Low,
        Priority::Normal,
        Priority::High,
        Priority::Critical,
    ];

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|priority| priority.as_str() == value)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Normal => "normal",
            Priority::High => "high",
            Priority::Critical => "critical",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    AiToUser,
    UserToAi,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    Pending,
    Read,
}

/// One message in either direction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserMessage {
    pub id: String,
    /// Unix seconds with millisecond precision
    pub timestamp: f64,
    pub direction: Direction,
    #[serde(rename = "type")]
    pub msg_type: MessageType,
    pub priority: Priority,
    pub content: String,
    pub requires_response: bool,
    pub status: MessageStatus,
}

impl UserMessage {
    /// A message from a caller to the user
    pub fn outgoing(
        content: impl Into<String>,
        msg_type: MessageType,
        priority: Priority,
        requires_response: bool,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: unix_timestamp(),
            direction: Direction::AiToUser,
            msg_type,
            priority,
            content: content.into(),
            requires_response,
            status: MessageStatus::Pending,
        }
    }

    /// A message the user typed into the dashboard
    pub fn incoming(content: impl Into<String>, msg_type: Option<MessageType>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: unix_timestamp(),
            direction: Direction::UserToAi,
            msg_type: msg_type.unwrap_or(MessageType::Response),
            priority: Priority::Normal,
            content: content.into(),
            requires_response: false,
            status: MessageStatus::Pending,
        }
    }
}

fn unix_timestamp() -> f64 {
    Utc::now().timestamp_millis() as f64 / 1000.0
}

/// Which unread user messages `check_messages` returns
#[derive(Debug, Clone, PartialEq)]
pub struct MessageQuery {
    pub mark_as_read: bool,
    pub filter_type: Option<String>,
    pub since_timestamp: Option<f64>,
}

impl Default for MessageQuery {
    fn default() -> Self {
        Self {
            mark_as_read: true,
            filter_type: None,
            since_timestamp: None,
        }
    }
}

impl MessageQuery {
    fn matches(&self, message: &UserMessage) -> bool {
        message.direction == Direction::UserToAi
            && message.status == MessageStatus::Pending
            && self
                .filter_type
                .as_deref()
                .is_none_or(|kind| kind == message.msg_type.as_str())
            && self
                .since_timestamp
                .is_none_or(|since| message.timestamp > since)
    }
}

/// Messaging requests answered by the dispatch loop
#[derive(Debug, Clone, PartialEq)]
pub enum MessageCommand {
    Send {
        message: UserMessage,
        show_dashboard: bool,
    },
    Check(MessageQuery),
    ShowDashboard,
    HideDashboard,
    History,
    Clear,
}

impl MessageCommand {
    pub fn operation(&self) -> OperationKind {
        match self {
            MessageCommand::Send { .. } => OperationKind::SendMessage,
            MessageCommand::Check(_) => OperationKind::CheckMessages,
            MessageCommand::ShowDashboard => OperationKind::ShowDashboard,
            MessageCommand::HideDashboard => OperationKind::HideDashboard,
            MessageCommand::History => OperationKind::MessageHistory,
            MessageCommand::Clear => OperationKind::ClearMessages,
        }
    }
}

/// Message history and dashboard visibility, owned by the dispatch loop
#[derive(Debug, Default)]
pub struct MessageCenter {
    history: Vec<UserMessage>,
    dashboard_visible: bool,
}

impl MessageCenter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: UserMessage) {
        self.history.push(message);
    }

    /// Unread user messages matching `query`, oldest first. Marks them read
    /// when the query asks for it; the returned copies keep their old status.
    pub fn check(&mut self, query: &MessageQuery) -> Vec<UserMessage> {
        let mut found = Vec::new();
        for message in self.history.iter_mut().filter(|m| query.matches(m)) {
            found.push(message.clone());
            if query.mark_as_read {
                message.status = MessageStatus::Read;
            }
        }
        found
    }

    /// Every message in both directions, regardless of status
    pub fn history(&self) -> &[UserMessage] {
        &self.history
    }

    /// Drop all messages; returns how many were removed
    pub fn clear(&mut self) -> usize {
        std::mem::take(&mut self.history).len()
    }

    pub fn dashboard_visible(&self) -> bool {
        self.dashboard_visible
    }

    pub fn set_dashboard_visible(&mut self, visible: bool) {
        self.dashboard_visible = visible;
    }
}
