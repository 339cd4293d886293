//! Request facade
//!
//! Caller-facing entry point for the `user` tool. Runs on the caller's
//! thread: checks the token and parameters, builds a [`UIRequest`], enqueues
//! it, and waits (bounded) on its reply slot. Every operation except
//! `readme` goes through the dispatch loop, including toasts and messaging.
//!
//! Nothing here fails with an error type. Every problem becomes a
//! [`FacadeResponse`]: documentation for callers that have not read it,
//! a rejection for bad parameters, or a structured [`ToolResponse`].

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Map, Value};
use tracing::{debug, info, instrument, warn};

use crate::config::BridgeConfig;
use crate::docs::{self, ParamKind, DEFAULT_PROBE_MESSAGE, DEFAULT_SERVICE_NAME};
use crate::mailbox::MailboxSender;
use crate::messages::{MessageCommand, MessageQuery, MessageType, Priority, ToastLevel, UserMessage};
use crate::outcome::{ToolResponse, UiOutcome};
use crate::reply::AwaitOutcome;
use crate::request::{ContentSource, OperationKind, UIRequest, WindowHints};
use crate::settings::{api_key_name, SettingsStore};
use crate::templates::{api_key_collector_html, api_key_collector_title};
use crate::token::{validate, TokenIdentity, TokenValidity};

const INVALID_TOKEN_MESSAGE: &str = "Invalid or missing tool_unlock_token: this indicates your context is missing the following details, which are needed to correctly use this tool:";

const ASYNC_MESSAGE: &str = "Window opened (async mode - not waiting for user response)";

/// What the facade hands back to the transport
#[derive(Debug, Clone, PartialEq)]
pub enum FacadeResponse {
    /// The documentation payload (readme)
    Documentation(String),
    /// Refused before anything was enqueued; documentation attached
    Rejected {
        message: String,
        documentation: String,
    },
    Tool(ToolResponse),
}

impl FacadeResponse {
    /// Text body for the MCP content block
    pub fn text(&self) -> String {
        match self {
            FacadeResponse::Documentation(doc) => doc.clone(),
            FacadeResponse::Rejected {
                message,
                documentation,
            } => format!("{}\n\n{}", message, documentation),
            FacadeResponse::Tool(response) => response.to_pretty_json(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, FacadeResponse::Rejected { .. })
    }
}

/// Validated tool arguments
#[derive(Debug, Clone)]
struct ToolCall {
    operation: OperationKind,
    source: Option<ContentSource>,
    title: String,
    hints: WindowHints,
    modal_given: bool,
    timeout_secs: u64,
    wait_for_response: bool,
    service_name: String,
    service_url: String,
    message: String,
    level: ToastLevel,
    outgoing: Option<OutgoingMessage>,
    query: MessageQuery,
}

/// `send_message` arguments
#[derive(Debug, Clone)]
struct OutgoingMessage {
    content: String,
    msg_type: MessageType,
    priority: Priority,
    requires_response: bool,
    show_dashboard: bool,
}

#[derive(Clone)]
pub struct RequestFacade {
    mailbox: MailboxSender,
    identity: TokenIdentity,
    settings: Arc<dyn SettingsStore>,
    config: BridgeConfig,
}

impl RequestFacade {
    pub fn new(
        mailbox: MailboxSender,
        identity: TokenIdentity,
        settings: Arc<dyn SettingsStore>,
        config: BridgeConfig,
    ) -> Self {
        Self {
            mailbox,
            identity,
            settings,
            config,
        }
    }

    fn documentation(&self) -> String {
        docs::documentation(&self.identity.expected_token())
    }

    fn reject(&self, message: impl Into<String>) -> FacadeResponse {
        let message = message.into();
        debug!(message = %message, "Rejected tool call");
        FacadeResponse::Rejected {
            message,
            documentation: self.documentation(),
        }
    }

    /// Handle one `user` tool call.
    ///
    /// `arguments` may be the parameter object itself or `{"input": {...}}`.
    /// When `input` is present it replaces the arguments; sibling keys are
    /// ignored.
    #[instrument(name = "user_tool", skip_all)]
    pub fn handle(&self, arguments: &Value) -> FacadeResponse {
        let input = arguments.get("input").unwrap_or(arguments);

        let Some(params) = input.as_object() else {
            return self.reject("Invalid input format. Expected dictionary with tool parameters.");
        };

        if params.get("operation").and_then(Value::as_str) == Some("readme") {
            return FacadeResponse::Documentation(self.documentation());
        }

        let presented = params
            .get("tool_unlock_token")
            .and_then(Value::as_str)
            .unwrap_or("");
        match validate(presented, &self.identity) {
            TokenValidity::Direct => {}
            TokenValidity::Delegated { caller } => {
                let prefix: String = caller.chars().take(8).collect();
                debug!(caller = %prefix, "Delegated tool call");
            }
            TokenValidity::Invalid => return self.reject(INVALID_TOKEN_MESSAGE),
        }

        let call = match self.validate_parameters(params) {
            Ok(call) => call,
            Err(message) => return self.reject(message),
        };

        info!(
            operation = %call.operation,
            timeout_secs = call.timeout_secs,
            wait = call.wait_for_response,
            "Tool call accepted"
        );

        FacadeResponse::Tool(match call.operation {
            OperationKind::Popup | OperationKind::Dialog => self.show_window(call),
            OperationKind::ApiKeyCollector => self.collect_api_key(call),
            OperationKind::TestQueue => {
                self.round_trip(UIRequest::probe(call.message), "Queue test")
            }
            OperationKind::Toast => self.round_trip(
                UIRequest::toast(call.level, call.message),
                "Toast notification",
            ),
            OperationKind::SendMessage => self.send_message(call),
            OperationKind::CheckMessages => self.round_trip(
                UIRequest::messages(MessageCommand::Check(call.query)),
                "Message check",
            ),
            OperationKind::ShowDashboard => self.round_trip(
                UIRequest::messages(MessageCommand::ShowDashboard),
                "Showing the dashboard",
            ),
            OperationKind::HideDashboard => self.round_trip(
                UIRequest::messages(MessageCommand::HideDashboard),
                "Hiding the dashboard",
            ),
            OperationKind::MessageHistory => self.round_trip(
                UIRequest::messages(MessageCommand::History),
                "Message history",
            ),
            OperationKind::ClearMessages => self.round_trip(
                UIRequest::messages(MessageCommand::Clear),
                "Clearing messages",
            ),
            OperationKind::Readme => {
                crate::debug_panic!("readme reached operation routing");
                return FacadeResponse::Documentation(self.documentation());
            }
        })
    }

    fn validate_parameters(&self, params: &Map<String, Value>) -> Result<ToolCall, String> {
        let mut unexpected: Vec<&str> = params
            .keys()
            .map(String::as_str)
            .filter(|name| docs::find_param(name).is_none())
            .collect();
        if !unexpected.is_empty() {
            unexpected.sort_unstable();
            return Err(format!(
                "Unexpected parameters provided: {}. Expected parameters are: {}. Please consult the attached doc.",
                unexpected.join(", "),
                docs::expected_param_names().join(", ")
            ));
        }

        for (name, value) in params {
            if let Some(spec) = docs::find_param(name) {
                check_type(name, spec.kind, value)?;
                check_choice(name, spec.choices, value)?;
            }
        }

        let operation_name = params
            .get("operation")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                "Missing required parameters: operation. Required parameters are: operation, tool_unlock_token"
                    .to_string()
            })?;
        let operation = OperationKind::parse(operation_name).ok_or_else(|| {
            let allowed: Vec<&str> = OperationKind::ALL.iter().map(|op| op.as_str()).collect();
            format!(
                "Parameter 'operation' must be one of [{}], got '{}'. Please use one of the allowed values.",
                allowed.join(", "),
                operation_name
            )
        })?;

        let string = |name: &str| params.get(name).and_then(Value::as_str);
        let boolean = |name: &str, default: bool| {
            params.get(name).and_then(Value::as_bool).unwrap_or(default)
        };

        let source = if operation == OperationKind::Popup || operation == OperationKind::Dialog {
            let html = string("html").filter(|s| !s.is_empty());
            let url = string("url").filter(|s| !s.is_empty());
            match (html, url) {
                (Some(_), Some(_)) => {
                    return Err("Cannot specify both 'html' and 'url' - choose one".to_string())
                }
                (Some(html), None) => Some(ContentSource::Html(html.to_string())),
                (None, Some(url)) => Some(ContentSource::Url(url.to_string())),
                (None, None) => {
                    return Err(
                        "Missing required parameter: must provide either 'html' or 'url'"
                            .to_string(),
                    )
                }
            }
        } else {
            None
        };

        if operation == OperationKind::Toast && string("message").is_none_or(str::is_empty) {
            return Err(
                "Missing required parameter: 'message' is required for show_toast operation"
                    .to_string(),
            );
        }

        let outgoing = if operation == OperationKind::SendMessage {
            let content = string("content")
                .filter(|s| !s.is_empty())
                .ok_or_else(|| "Missing required parameter: content".to_string())?;
            Some(OutgoingMessage {
                content: content.to_string(),
                msg_type: string("msg_type")
                    .and_then(MessageType::parse)
                    .unwrap_or_default(),
                priority: string("priority")
                    .and_then(Priority::parse)
                    .unwrap_or_default(),
                requires_response: boolean("requires_response", false),
                show_dashboard: boolean("show_dashboard", true),
            })
        } else {
            None
        };

        let width = non_negative(params, "width", self.config.window.width.into())?;
        let height = non_negative(params, "height", self.config.window.height.into())?;
        let timeout_secs = non_negative(params, "timeout", 0)?;

        let hints = WindowHints {
            width: to_pixels("width", width)?,
            height: to_pixels("height", height)?,
            modal: boolean("modal", true),
            resizable: boolean("resizable", false),
            always_on_top: boolean("always_on_top", true),
            auto_resize: boolean("auto_resize", false),
            center_on_screen: boolean("center_on_screen", true),
            bring_to_front: boolean("bring_to_front", true),
        };

        Ok(ToolCall {
            operation,
            source,
            title: string("title")
                .unwrap_or(&self.config.window.title)
                .to_string(),
            hints,
            modal_given: params.contains_key("modal"),
            timeout_secs,
            wait_for_response: boolean("wait_for_response", true),
            service_name: string("service_name")
                .unwrap_or(DEFAULT_SERVICE_NAME)
                .to_string(),
            service_url: string("service_url").unwrap_or("").to_string(),
            message: string("message").unwrap_or(DEFAULT_PROBE_MESSAGE).to_string(),
            level: string("level")
                .and_then(ToastLevel::parse)
                .unwrap_or_default(),
            outgoing,
            query: MessageQuery {
                mark_as_read: boolean("mark_as_read", true),
                filter_type: string("filter_type").map(str::to_string),
                since_timestamp: params.get("since_timestamp").and_then(Value::as_f64),
            },
        })
    }

    fn show_window(&self, call: ToolCall) -> ToolResponse {
        let mut hints = call.hints;
        match call.operation {
            OperationKind::Popup => hints.modal = false,
            OperationKind::Dialog if !call.modal_given => hints.modal = true,
            _ => {}
        }

        let Some(content) = call.source else {
            return ToolResponse::error("Missing required parameter: must provide either 'html' or 'url'");
        };

        let request = UIRequest::window(
            call.operation,
            content,
            call.title,
            hints,
            Duration::from_secs(call.timeout_secs),
        );
        self.submit(request, call.timeout_secs, call.wait_for_response)
    }

    fn collect_api_key(&self, call: ToolCall) -> ToolResponse {
        let collector = &self.config.collector;
        let hints = WindowHints {
            width: collector.width,
            height: collector.height,
            modal: true,
            resizable: false,
            always_on_top: true,
            auto_resize: false,
            center_on_screen: true,
            bring_to_front: true,
        };
        let request = UIRequest::window(
            OperationKind::ApiKeyCollector,
            ContentSource::Html(api_key_collector_html(&call.service_name, &call.service_url)),
            api_key_collector_title(&call.service_name),
            hints,
            self.config.collector_timeout(),
        );

        let response = self.submit(request, collector.timeout_secs, true);
        let Some(api_key) = response
            .data
            .as_ref()
            .and_then(|data| data.get("api_key"))
            .and_then(Value::as_str)
        else {
            if response.status == crate::outcome::ResponseStatus::Success {
                return ToolResponse::error("API key dialog closed without providing a key");
            }
            return response;
        };

        let key_name = api_key_name(&call.service_name);
        match self.settings.set_secret(&key_name, api_key) {
            Ok(()) => {
                info!(service = %call.service_name, key_name = %key_name, "Stored collected API key");
                ToolResponse::success(json!({
                    "service": call.service_name,
                    "key_name": key_name,
                    "stored": true,
                }))
            }
            Err(e) => {
                warn!(error = %e, key_name = %key_name, "Failed to store collected API key");
                ToolResponse::error(format!("Failed to store API key {}: {}", key_name, e))
            }
        }
    }

    fn send_message(&self, call: ToolCall) -> ToolResponse {
        let Some(outgoing) = call.outgoing else {
            return ToolResponse::error("Missing required parameter: content");
        };
        let message = UserMessage::outgoing(
            outgoing.content,
            outgoing.msg_type,
            outgoing.priority,
            outgoing.requires_response,
        );
        self.round_trip(
            UIRequest::messages(MessageCommand::Send {
                message,
                show_dashboard: outgoing.show_dashboard,
            }),
            "Message queue confirmation",
        )
    }

    /// Enqueue a request the loop answers without a window and wait for it
    fn round_trip(&self, request: UIRequest, label: &str) -> ToolResponse {
        let operation = request.operation;
        let receiver = match self.mailbox.enqueue(request) {
            Ok(receiver) => receiver,
            Err(e) => return ToolResponse::error(e.to_string()),
        };

        let wait_for = self.config.probe_timeout();
        match receiver.wait(wait_for) {
            AwaitOutcome::Reply(UiOutcome::Success { data }) => ToolResponse::success_data(data),
            AwaitOutcome::Reply(outcome) => ToolResponse::from_outcome(outcome, wait_for.as_secs()),
            AwaitOutcome::TimedOut | AwaitOutcome::NotAwaited => {
                warn!(operation = %operation, "Dispatch loop did not answer in time");
                ToolResponse::timeout(format!(
                    "{} timed out after {} seconds",
                    label,
                    wait_for.as_secs()
                ))
            }
            AwaitOutcome::Disconnected => {
                ToolResponse::error(format!("{} was dropped by the dispatch loop", label))
            }
        }
    }

    /// Enqueue and, unless fire-and-forget, wait `timeout + grace` for the outcome
    fn submit(&self, request: UIRequest, timeout_secs: u64, wait: bool) -> ToolResponse {
        let request_id = request.id.clone();
        let receiver = match self.mailbox.enqueue(request) {
            Ok(receiver) => receiver,
            Err(e) => {
                warn!(request_id = %request_id, "No dispatch loop to take the request");
                return ToolResponse::error(e.to_string());
            }
        };

        if timeout_secs == 0 || !wait {
            receiver.wait(Duration::ZERO);
            return ToolResponse::accepted(ASYNC_MESSAGE);
        }

        let wait_for = Duration::from_secs(timeout_secs).saturating_add(self.config.reply_grace());
        match receiver.wait(wait_for) {
            AwaitOutcome::Reply(outcome) => ToolResponse::from_outcome(outcome, timeout_secs),
            AwaitOutcome::TimedOut => {
                warn!(request_id = %request_id, "Caller stopped waiting for reply");
                ToolResponse::timeout(format!(
                    "UI request timed out after {} seconds",
                    wait_for.as_secs()
                ))
            }
            AwaitOutcome::NotAwaited => ToolResponse::accepted(ASYNC_MESSAGE),
            AwaitOutcome::Disconnected => {
                ToolResponse::error("UI request was dropped before it completed")
            }
        }
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_i64() || n.is_u64() => "integer",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn check_type(name: &str, kind: ParamKind, value: &Value) -> Result<(), String> {
    let ok = match kind {
        ParamKind::String => value.is_string(),
        ParamKind::Integer => value.is_i64() || value.is_u64(),
        ParamKind::Number => value.is_number(),
        ParamKind::Boolean => value.is_boolean(),
    };
    if ok {
        return Ok(());
    }

    let hint = match kind {
        ParamKind::String => "Please provide a string value.",
        ParamKind::Integer => "Please provide an integer value.",
        ParamKind::Number => "Please provide a numeric value.",
        ParamKind::Boolean => "Please provide true or false.",
    };
    Err(format!(
        "Parameter '{}' must be {} {}, got {}. {}",
        name,
        if kind == ParamKind::Integer { "an" } else { "a" },
        kind.as_str(),
        json_type_name(value),
        hint
    ))
}

/// String parameter restricted to a fixed set of values
fn check_choice(name: &str, choices: &[&str], value: &Value) -> Result<(), String> {
    match value.as_str() {
        Some(chosen) if !choices.is_empty() && !choices.contains(&chosen) => Err(format!(
            "Parameter '{}' must be one of [{}], got '{}'. Please use one of the allowed values.",
            name,
            choices.join(", "),
            chosen
        )),
        _ => Ok(()),
    }
}

/// Integer parameter that must be zero or more
fn non_negative(params: &Map<String, Value>, name: &str, default: u64) -> Result<u64, String> {
    let Some(value) = params.get(name) else {
        return Ok(default);
    };
    value.as_u64().ok_or_else(|| {
        format!(
            "Parameter '{}' must be a non-negative integer, got {}.",
            name, value
        )
    })
}

fn to_pixels(name: &str, value: u64) -> Result<u32, String> {
    u32::try_from(value)
        .map_err(|_| format!("Parameter '{}' is too large, got {}.", name, value))
}

#[cfg(test)]
#[path = "facade_tests.rs"]
mod tests;
