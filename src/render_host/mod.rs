//! Render host capability
//!
//! The render host draws windows and runs their scripts. The bridge never
//! does either itself; the dispatch loop drives a [`RenderHost`] with
//! commands, and the host reports back asynchronously by posting
//! [`WindowEvent`]s through an [`EventSink`](crate::mailbox::EventSink).
//!
//! Every window is identified by the id of the request that opened it.
//! The message dashboard is a single host-owned window with no request id.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::auto_resize::Geometry;
use crate::messages::{MessageType, ToastLevel, UserMessage};
use crate::request::{ContentSource, RequestId};

pub mod stdio;

#[cfg(test)]
pub(crate) mod fake;

pub use stdio::StdioRenderHost;

#[derive(Error, Debug)]
pub enum RenderHostError {
    #[error("Render host unavailable: {0}")]
    Unavailable(String),

    #[error("Render host rejected command for window {window}: {reason}")]
    Rejected { window: RequestId, reason: String },

    #[error("Failed to encode render host command: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Everything the host needs to open one window
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowSpec {
    pub window: RequestId,
    pub title: String,
    pub content: ContentSource,
    pub geometry: Geometry,
    pub modal: bool,
    pub resizable: bool,
    pub always_on_top: bool,
    pub center: bool,
}

/// What came of a request to bring a window to the foreground.
///
/// Platforms may refuse focus stealing; none of these is an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForegroundOutcome {
    Honored,
    NotHonored,
    Unsupported,
    /// Asked; the answer arrives later as [`WindowEvent::FocusResult`]
    Deferred,
}

/// Events a host reports about its windows.
///
/// The serde form is the stdio wire format: one JSON object per line,
/// tagged by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum WindowEvent {
    /// Content finished loading
    Loaded { window: RequestId },
    /// Result of the measurement script
    Measured {
        window: RequestId,
        width: u32,
        height: u32,
    },
    /// Window closed; `response` is `window.userResponse` at close time
    Closed {
        window: RequestId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        response: Option<Value>,
    },
    /// The window could not be shown or crashed
    Failed { window: RequestId, error: String },
    /// Late answer to a foreground request; informational only
    FocusResult { window: RequestId, honored: bool },
    /// The user typed a message into the dashboard
    MessageFromUser {
        content: String,
        #[serde(default, rename = "msgType")]
        msg_type: Option<MessageType>,
    },
    /// The user closed the dashboard
    DashboardHidden,
    /// The host itself went away; every open window is lost
    #[serde(skip)]
    HostExited { reason: String },
}

/// Commands the dispatch loop issues. Called only from the loop thread.
pub trait RenderHost {
    /// Open and show a window. Loading completes asynchronously.
    fn open_window(&mut self, spec: &WindowSpec) -> Result<(), RenderHostError>;

    /// Evaluate `script` in the window. When the script's value is
    /// `{width, height}` the host reports it as [`WindowEvent::Measured`].
    fn eval_script(&mut self, window: &RequestId, script: &str) -> Result<(), RenderHostError>;

    fn set_geometry(
        &mut self,
        window: &RequestId,
        geometry: Geometry,
        center: bool,
    ) -> Result<(), RenderHostError>;

    /// Best effort; never fails
    fn bring_to_front(&mut self, window: &RequestId) -> ForegroundOutcome;

    /// Close a window without waiting for the user. The host still reports
    /// [`WindowEvent::Closed`], which the loop ignores for torn-down sessions.
    fn close_window(&mut self, window: &RequestId) -> Result<(), RenderHostError>;

    /// Show a short-lived notification outside any window
    fn notify(&mut self, level: ToastLevel, message: &str) -> Result<(), RenderHostError>;

    /// Show the message dashboard, replacing its contents with `history`
    fn show_dashboard(&mut self, history: &[UserMessage]) -> Result<(), RenderHostError>;

    /// Append one message to the visible dashboard
    fn post_message(&mut self, message: &UserMessage) -> Result<(), RenderHostError>;

    fn hide_dashboard(&mut self) -> Result<(), RenderHostError>;
}
