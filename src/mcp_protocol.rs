//! MCP JSON-RPC 2.0 Protocol Handler
//!
//! Parses JSON-RPC requests and routes the three MCP methods the bridge
//! serves. `tools/call` for the `user` tool goes straight to the
//! [`RequestFacade`].
//!
//! JSON-RPC 2.0 format:
//! - Request: {"jsonrpc":"2.0","id":1,"method":"tools/call","params":{"name":"user","arguments":{...}}}
//! - Success: {"jsonrpc":"2.0","id":1,"result":{"content":[...],"isError":false}}
//! - Error: {"jsonrpc":"2.0","id":1,"error":{"code":-32601,"message":"Method not found"}}

// JsonRpcResponse carries the full error object as the Err side of parse_request
#![allow(clippy::result_large_err)]

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::docs::{self, TOOL_DESCRIPTION, TOOL_NAME};
use crate::facade::{FacadeResponse, RequestFacade};

/// JSON-RPC 2.0 version string
pub const JSONRPC_VERSION: &str = "2.0";

/// MCP protocol revision advertised by `initialize`
pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// JSON-RPC 2.0 standard error codes
pub mod error_codes {
    /// Invalid JSON was received
    pub const PARSE_ERROR: i32 = -32700;
    /// The JSON sent is not a valid Request object
    pub const INVALID_REQUEST: i32 = -32600;
    /// The method does not exist / is not available
    pub const METHOD_NOT_FOUND: i32 = -32601;
    /// Invalid method parameter(s)
    pub const INVALID_PARAMS: i32 = -32602;
    /// Internal JSON-RPC error
    pub const INTERNAL_ERROR: i32 = -32603;
}

/// JSON-RPC 2.0 Request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JsonRpcRequest {
    /// Must be "2.0"
    pub jsonrpc: String,
    /// Request identifier (can be string, number, or null)
    pub id: Value,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

/// JSON-RPC 2.0 Response
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    /// Request identifier (matches request)
    pub id: Value,
    /// Result on success (mutually exclusive with error)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

/// JSON-RPC 2.0 Error object
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// MCP methods supported by the bridge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum McpMethod {
    Initialize,
    ToolsList,
    ToolsCall,
}

impl McpMethod {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "initialize" => Some(Self::Initialize),
            "tools/list" => Some(Self::ToolsList),
            "tools/call" => Some(Self::ToolsCall),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Initialize => "initialize",
            Self::ToolsList => "tools/list",
            Self::ToolsCall => "tools/call",
        }
    }
}

impl JsonRpcResponse {
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn error(id: Value, code: i32, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
                data: None,
            }),
        }
    }
}

/// MCP server capabilities returned by initialize
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct McpCapabilities {
    pub protocol_version: String,
    pub server_info: ServerInfo,
    pub capabilities: CapabilitySet,
}

/// Server identification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerInfo {
    pub name: String,
    pub version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CapabilitySet {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<ToolsCapability>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ToolsCapability {
    #[serde(rename = "listChanged", skip_serializing_if = "Option::is_none")]
    pub list_changed: Option<bool>,
}

/// Parse a JSON string into a JsonRpcRequest
pub fn parse_request(json: &str) -> Result<JsonRpcRequest, JsonRpcResponse> {
    let value: Value = serde_json::from_str(json).map_err(|e| {
        JsonRpcResponse::error(
            Value::Null,
            error_codes::PARSE_ERROR,
            format!("Parse error: {}", e),
        )
    })?;

    let id = value.get("id").cloned().unwrap_or(Value::Null);

    let jsonrpc = value
        .get("jsonrpc")
        .and_then(|v| v.as_str())
        .ok_or_else(|| {
            JsonRpcResponse::error(
                id.clone(),
                error_codes::INVALID_REQUEST,
                "Missing or invalid 'jsonrpc' field",
            )
        })?;

    if jsonrpc != JSONRPC_VERSION {
        return Err(JsonRpcResponse::error(
            id,
            error_codes::INVALID_REQUEST,
            format!(
                "Invalid jsonrpc version: expected '{}', got '{}'",
                JSONRPC_VERSION, jsonrpc
            ),
        ));
    }

    let method = value
        .get("method")
        .and_then(|v| v.as_str())
        .ok_or_else(|| {
            JsonRpcResponse::error(
                id.clone(),
                error_codes::INVALID_REQUEST,
                "Missing 'method' field",
            )
        })?;

    let params = value
        .get("params")
        .cloned()
        .unwrap_or(Value::Object(Default::default()));

    Ok(JsonRpcRequest {
        jsonrpc: JSONRPC_VERSION.to_string(),
        id,
        method: method.to_string(),
        params,
    })
}

/// Route one request. `tools/call` blocks the calling thread until the
/// facade has an outcome.
pub fn handle_request(request: JsonRpcRequest, facade: &RequestFacade) -> JsonRpcResponse {
    if request.jsonrpc != JSONRPC_VERSION {
        return JsonRpcResponse::error(
            request.id,
            error_codes::INVALID_REQUEST,
            format!("Invalid jsonrpc version: {}", request.jsonrpc),
        );
    }

    debug!(method = %request.method, "Handling MCP request");
    match McpMethod::parse(&request.method) {
        Some(McpMethod::Initialize) => handle_initialize(request),
        Some(McpMethod::ToolsList) => handle_tools_list(request),
        Some(McpMethod::ToolsCall) => handle_tools_call(request, facade),
        None => JsonRpcResponse::error(
            request.id,
            error_codes::METHOD_NOT_FOUND,
            format!("Method not found: {}", request.method),
        ),
    }
}

fn handle_initialize(request: JsonRpcRequest) -> JsonRpcResponse {
    let capabilities = McpCapabilities {
        protocol_version: PROTOCOL_VERSION.to_string(),
        server_info: ServerInfo {
            name: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        },
        capabilities: CapabilitySet {
            tools: Some(ToolsCapability {
                list_changed: Some(false),
            }),
        },
    };

    match serde_json::to_value(capabilities) {
        Ok(result) => JsonRpcResponse::success(request.id, result),
        Err(e) => JsonRpcResponse::error(
            request.id,
            error_codes::INTERNAL_ERROR,
            format!("Failed to serialize capabilities: {}", e),
        ),
    }
}

/// The single tool definition advertised by `tools/list`
pub fn tool_definition() -> Value {
    json!({
        "name": TOOL_NAME,
        "description": TOOL_DESCRIPTION,
        "inputSchema": docs::tool_input_schema(),
    })
}

fn handle_tools_list(request: JsonRpcRequest) -> JsonRpcResponse {
    JsonRpcResponse::success(request.id, json!({ "tools": [tool_definition()] }))
}

fn handle_tools_call(request: JsonRpcRequest, facade: &RequestFacade) -> JsonRpcResponse {
    let Some(name) = request.params.get("name").and_then(Value::as_str) else {
        return JsonRpcResponse::error(
            request.id,
            error_codes::INVALID_PARAMS,
            "Missing required parameter: name",
        );
    };

    if name != TOOL_NAME {
        warn!(tool = %name, "Call for unknown tool");
        return JsonRpcResponse::error(
            request.id,
            error_codes::INVALID_PARAMS,
            format!("Unknown tool: {}", name),
        );
    }

    let arguments = request
        .params
        .get("arguments")
        .cloned()
        .unwrap_or_else(|| json!({}));

    let response = facade.handle(&arguments);
    JsonRpcResponse::success(request.id, tool_result(&response))
}

/// MCP `CallToolResult` for a facade response
pub fn tool_result(response: &FacadeResponse) -> Value {
    json!({
        "content": [{ "type": "text", "text": response.text() }],
        "isError": response.is_error(),
    })
}
