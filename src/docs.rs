//! Tool documentation
//!
//! The `user` tool advertises only a one-line description and a single
//! `input` object. The full parameter schema, the usage guide and the
//! unlock token are revealed by the `readme` operation, and again whenever
//! a call arrives without a valid token.

use serde_json::{json, Map, Value};

use crate::config::{DEFAULT_WINDOW_HEIGHT, DEFAULT_WINDOW_TITLE, DEFAULT_WINDOW_WIDTH};
use crate::request::OperationKind;

/// Tool name as registered with MCP
pub const TOOL_NAME: &str = "user";

/// Always-visible tool description
pub const TOOL_DESCRIPTION: &str = "Show HTML pop-up windows to communicate with users.\n\
- Use this when you need to collect API keys, show forms, display rich content, get user input, etc.\n";

pub const DEFAULT_SERVICE_NAME: &str = "API Service";
pub const DEFAULT_PROBE_MESSAGE: &str = "Hello from ui-bridge";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    String,
    Integer,
    Number,
    Boolean,
}

impl ParamKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParamKind::String => "string",
            ParamKind::Integer => "integer",
            ParamKind::Number => "number",
            ParamKind::Boolean => "boolean",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamDefault {
    None,
    Str(&'static str),
    Int(i64),
    Bool(bool),
}

impl ParamDefault {
    fn to_value(self) -> Option<Value> {
        match self {
            ParamDefault::None => None,
            ParamDefault::Str(s) => Some(json!(s)),
            ParamDefault::Int(i) => Some(json!(i)),
            ParamDefault::Bool(b) => Some(json!(b)),
        }
    }
}

/// One accepted tool parameter
#[derive(Debug, Clone, Copy)]
pub struct ParamSpec {
    pub name: &'static str,
    pub kind: ParamKind,
    pub description: &'static str,
    pub default: ParamDefault,
    /// Allowed values for a string parameter; empty means any
    pub choices: &'static [&'static str],
}

const fn param(
    name: &'static str,
    kind: ParamKind,
    description: &'static str,
    default: ParamDefault,
) -> ParamSpec {
    ParamSpec {
        name,
        kind,
        description,
        default,
        choices: &[],
    }
}

const fn choice(
    name: &'static str,
    description: &'static str,
    choices: &'static [&'static str],
    default: &'static str,
) -> ParamSpec {
    ParamSpec {
        name,
        kind: ParamKind::String,
        description,
        default: ParamDefault::Str(default),
        choices,
    }
}

pub const TOAST_LEVELS: &[&str] = &["info", "warning", "error", "success"];
pub const MESSAGE_TYPES: &[&str] = &["question", "status", "notification", "response"];
pub const PRIORITIES: &[&str] = &["low", "normal", "high", "critical"];

/// Every parameter the tool accepts. Anything else is rejected.
pub const PARAMETERS: &[ParamSpec] = &[
    param("operation", ParamKind::String, "Operation to perform", ParamDefault::None),
    param(
        "html",
        ParamKind::String,
        "HTML content to display in the popup/dialog window (mutually exclusive with url)",
        ParamDefault::None,
    ),
    param(
        "url",
        ParamKind::String,
        "URL to load in the window (mutually exclusive with html)",
        ParamDefault::None,
    ),
    param(
        "title",
        ParamKind::String,
        "Window title (optional, defaults to 'User Interface')",
        ParamDefault::Str(DEFAULT_WINDOW_TITLE),
    ),
    param(
        "width",
        ParamKind::Integer,
        "Window width in pixels (optional, defaults to 600)",
        ParamDefault::Int(DEFAULT_WINDOW_WIDTH as i64),
    ),
    param(
        "height",
        ParamKind::Integer,
        "Window height in pixels (optional, defaults to 400)",
        ParamDefault::Int(DEFAULT_WINDOW_HEIGHT as i64),
    ),
    param(
        "modal",
        ParamKind::Boolean,
        "Whether the dialog should be modal (optional, defaults to true; always false for show_popup)",
        ParamDefault::Bool(true),
    ),
    param(
        "resizable",
        ParamKind::Boolean,
        "Allow user to resize the window (optional, defaults to false)",
        ParamDefault::Bool(false),
    ),
    param(
        "always_on_top",
        ParamKind::Boolean,
        "Keep window above other windows (optional, defaults to true)",
        ParamDefault::Bool(true),
    ),
    param(
        "auto_resize",
        ParamKind::Boolean,
        "Automatically resize window to fit content (optional, defaults to false)",
        ParamDefault::Bool(false),
    ),
    param(
        "center_on_screen",
        ParamKind::Boolean,
        "Center window on screen (optional, defaults to true)",
        ParamDefault::Bool(true),
    ),
    param(
        "bring_to_front",
        ParamKind::Boolean,
        "Force window to foreground (optional, defaults to true)",
        ParamDefault::Bool(true),
    ),
    param(
        "timeout",
        ParamKind::Integer,
        "Seconds to wait for user interaction (optional, 0 = no timeout and the call returns immediately)",
        ParamDefault::Int(0),
    ),
    param(
        "wait_for_response",
        ParamKind::Boolean,
        "Wait for user to close window before returning (optional, defaults to true). Set to false for 'fire and forget' mode.",
        ParamDefault::Bool(true),
    ),
    param(
        "service_name",
        ParamKind::String,
        "Name of the service requiring an API key (used with collect_api_key)",
        ParamDefault::Str(DEFAULT_SERVICE_NAME),
    ),
    param(
        "service_url",
        ParamKind::String,
        "URL where users can obtain an API key (used with collect_api_key)",
        ParamDefault::Str(""),
    ),
    param(
        "message",
        ParamKind::String,
        "Text echoed back by test_queue, or the toast text for show_toast (required there)",
        ParamDefault::Str(DEFAULT_PROBE_MESSAGE),
    ),
    choice(
        "level",
        "Toast notification severity (used with show_toast)",
        TOAST_LEVELS,
        "info",
    ),
    param(
        "content",
        ParamKind::String,
        "Message text (required for send_message)",
        ParamDefault::None,
    ),
    choice(
        "msg_type",
        "Type of message (used with send_message)",
        MESSAGE_TYPES,
        "status",
    ),
    choice(
        "priority",
        "Message priority (used with send_message)",
        PRIORITIES,
        "normal",
    ),
    param(
        "requires_response",
        ParamKind::Boolean,
        "Whether the message needs a reply from the user (used with send_message)",
        ParamDefault::Bool(false),
    ),
    param(
        "show_dashboard",
        ParamKind::Boolean,
        "Show the dashboard window if hidden (used with send_message)",
        ParamDefault::Bool(true),
    ),
    param(
        "mark_as_read",
        ParamKind::Boolean,
        "Mark returned messages as read (used with check_messages)",
        ParamDefault::Bool(true),
    ),
    param(
        "filter_type",
        ParamKind::String,
        "Only return messages of this type (used with check_messages)",
        ParamDefault::None,
    ),
    param(
        "since_timestamp",
        ParamKind::Number,
        "Only return messages newer than this Unix timestamp (used with check_messages)",
        ParamDefault::None,
    ),
    param(
        "tool_unlock_token",
        ParamKind::String,
        "Security token obtained from the readme operation",
        ParamDefault::None,
    ),
];

pub fn find_param(name: &str) -> Option<&'static ParamSpec> {
    PARAMETERS.iter().find(|p| p.name == name)
}

/// Sorted names of every accepted parameter
pub fn expected_param_names() -> Vec<&'static str> {
    let mut names: Vec<_> = PARAMETERS.iter().map(|p| p.name).collect();
    names.sort_unstable();
    names
}

/// Advertised MCP input schema: one `input` object
pub fn tool_input_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "input": {
                "type": "object",
                "description": "All tool parameters are passed in this single dict. Use {\"input\":{\"operation\":\"readme\"}} to get full documentation, parameters, and an unlock token."
            }
        },
        "required": []
    })
}

/// Full parameter schema, with the token spelled out in its description
pub fn parameters_schema(token: &str) -> Value {
    let mut properties = Map::new();
    for spec in PARAMETERS {
        let mut property = json!({
            "type": spec.kind.as_str(),
            "description": spec.description,
        });
        if spec.name == "operation" {
            property["enum"] = json!(OperationKind::ALL
                .iter()
                .map(|op| op.as_str())
                .collect::<Vec<_>>());
        }
        if !spec.choices.is_empty() {
            property["enum"] = json!(spec.choices);
        }
        if spec.name == "tool_unlock_token" {
            property["description"] = json!(format!(
                "Security token, {}, obtained from readme operation, or re-provided any time the caller lost context or gave a wrong token",
                token
            ));
        }
        if let Some(default) = spec.default.to_value() {
            property["default"] = default;
        }
        properties.insert(spec.name.to_string(), property);
    }

    json!({
        "type": "object",
        "properties": properties,
        "required": ["operation", "tool_unlock_token"],
    })
}

/// The documentation payload: `{description, parameters}` as pretty JSON
pub fn documentation(token: &str) -> String {
    let payload = json!({
        "description": readme(token),
        "parameters": parameters_schema(token),
    });
    serde_json::to_string_pretty(&payload).unwrap_or_else(|_| readme(token))
}

/// Usage guide for callers
pub fn readme(token: &str) -> String {
    format!(
        r#"
Display HTML popup windows to interact with users.

Windows are drawn by the attached renderer. Use them to collect API keys,
show forms, display rich content, or get any kind of user input.

## Usage-Safety Token System
This tool uses an HMAC-based token to make sure callers have read these
details before every use. The token is specific to this installation, user,
and version.

Your tool_unlock_token for this installation is: {token}

You MUST include tool_unlock_token in the input dict for all operations
except readme.

## Operations

### readme
Returns this documentation. No token needed.

### show_popup - Non-modal window
Does not block other windows. `modal` is always false.

### show_dialog - Modal window
Blocks interaction with other windows until closed. `modal` defaults to true.

### collect_api_key - Prebuilt API key dialog
Shows a ready-made dialog for `service_name` (with an optional `service_url`
link), 550x450, modal, 5 minute timeout. The key is stored in the system
keyring as UPPER_SNAKE(service_name) + "_API_KEY". The response names the key
but never contains it.

### test_queue - Diagnostic round trip
Sends `message` through the UI request queue and back without opening a
window. Returns the echo, timestamps, and queue latency.

### show_toast - Toast notification
Shows `message` as a brief notification with a `level` of info, warning,
error or success. Nothing to close, nothing to wait for.

### send_message - Message the user (non-blocking)
Adds `content` to the persistent message dashboard and returns at once with
the message id. Opens the dashboard if it is hidden, unless
`show_dashboard` is false.

### check_messages - Read the user's replies (non-blocking)
Returns messages the user typed into the dashboard that you have not seen
yet. Use it periodically while you work.

### show_dashboard / hide_dashboard
Show or hide the dashboard. Hidden messages are kept.

### get_message_history
Every message in both directions, read or not.

### clear_messages
Deletes the whole message history.

## Parameters for show_popup and show_dialog
- **html** or **url** (exactly one, required): page content or address
- **title** (default: "User Interface")
- **width** / **height** in pixels (default: 600 / 400)
- **modal** (default: true for show_dialog)
- **resizable** (default: false)
- **always_on_top** (default: true)
- **bring_to_front** (default: true)
- **center_on_screen** (default: true)
- **auto_resize** (default: false)
- **timeout** in seconds (default: 0)
- **wait_for_response** (default: true)

## Parameters for show_toast
- **message** (required): notification text
- **level** (default: "info"): info, warning, error, success

## Parameters for send_message
- **content** (required): message text
- **msg_type** (default: "status"): question, status, notification, response
- **priority** (default: "normal"): low, normal, high, critical
- **requires_response** (default: false)
- **show_dashboard** (default: true)

## Parameters for check_messages
- **mark_as_read** (default: true): returned messages are not returned again
- **filter_type**: only messages of this type, e.g. "response"
- **since_timestamp**: only messages newer than this Unix timestamp

`check_messages` returns:
```json
{{"status": "success", "data": {{"count": 1, "messages": [{{"id": "...", "timestamp": 1763524358.29,
  "direction": "user_to_ai", "type": "response", "priority": "normal",
  "content": "Looks good! Continue with step 2", "requires_response": false,
  "status": "pending"}}]}}}}
```

## Waiting
- `timeout: 0` or `wait_for_response: false` returns immediately with
  `{{"status": "success", "async": true}}`. The window stays open until the
  user closes it.
- Otherwise the call blocks until the user responds, closes the window, or
  `timeout` seconds pass. A timed-out window is closed for you.

## Window Sizing Guidelines
The renderer adds window chrome to your requested size:
- **Actual width = requested width + 16px**
- **Actual height = requested height + 39px**

Overestimate rather than underestimate; scrollbars look unprofessional.
If you think you need 300px, request 400px.

### Auto-Resize
With `auto_resize: true` the window opens at twice the requested height,
measures the rendered content, then shrinks to fit it (content + 20px
padding + chrome) and re-centres. This happens once per window and avoids
the scrollbar, rewrap, height-change cascade. Content whose height depends
on the window height may not size well.

### Focus
`bring_to_front` is best effort. Some platforms refuse focus stealing; use
`always_on_top: true` when visibility matters.

## JavaScript Bridge
Before closing, your page sets `window.userResponse`:
```javascript
window.userResponse = {{"status": "success", "data": {{"answer": 42}}}};
window.close();

window.userResponse = {{"status": "cancelled", "message": "User cancelled"}};
window.close();

window.userResponse = {{"status": "error", "error": "Something broke"}};
window.close();
```
Closing without setting it counts as cancelled.

## Return Values
```json
{{"status": "success", "data": {{"answer": 42}}, "window_closed": true}}
{{"status": "cancelled", "message": "User cancelled", "window_closed": true}}
{{"status": "timeout", "error": "User did not respond within 60 seconds"}}
{{"status": "error", "error": "..."}}
```

## Example
```json
{{
  "input": {{
    "operation": "show_dialog",
    "html": "<!DOCTYPE html><html><body><h2>Continue?</h2><button onclick=\"window.userResponse={{status:'success',data:{{ok:true}}}};window.close()\">Yes</button></body></html>",
    "title": "Confirm",
    "width": 400,
    "height": 250,
    "timeout": 120,
    "tool_unlock_token": "{token}"
  }}
}}
```
"#,
        token = token
    )
}
