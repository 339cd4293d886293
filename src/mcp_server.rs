//! MCP HTTP Server
//!
//! Lightweight HTTP/1.1 front end for the bridge:
//! - Listens on 127.0.0.1 (port from config, default 43210)
//! - Bearer token authentication from `<data_dir>/agent-token`
//! - Health endpoint at GET /health
//! - JSON-RPC at POST /rpc
//!
//! Each connection gets its own thread, so a `tools/call` that waits on
//! the user never blocks other callers.

use crate::facade::RequestFacade;
use crate::mcp_protocol::{self, JsonRpcResponse};
use anyhow::{Context, Result};
use std::collections::HashMap;
use std::fs;
use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// File holding the bearer token, inside the data directory
pub const AGENT_TOKEN_FILE: &str = "agent-token";

/// Largest request body accepted on /rpc
const MAX_BODY_BYTES: usize = 8 * 1024 * 1024;

/// MCP HTTP Server
///
/// Uses std::net threads; no async runtime required.
pub struct McpServer {
    port: u16,
    token: String,
    running: Arc<AtomicBool>,
    facade: Arc<RequestFacade>,
}

impl McpServer {
    /// Create a server, loading or generating the agent token under `data_dir`
    pub fn new(port: u16, data_dir: PathBuf, facade: Arc<RequestFacade>) -> Result<Self> {
        let token = Self::load_or_create_token(&data_dir)?;

        Ok(Self {
            port,
            token,
            running: Arc::new(AtomicBool::new(false)),
            facade,
        })
    }

    fn load_or_create_token(data_dir: &Path) -> Result<String> {
        let token_path = data_dir.join(AGENT_TOKEN_FILE);

        if token_path.exists() {
            let token = fs::read_to_string(&token_path)
                .context("Failed to read agent-token file")?
                .trim()
                .to_string();

            if !token.is_empty() {
                info!(path = %token_path.display(), "Loaded existing agent token");
                return Ok(token);
            }
        }

        let token = uuid::Uuid::new_v4().to_string();
        fs::create_dir_all(data_dir).context("Failed to create data directory")?;
        fs::write(&token_path, &token).context("Failed to write agent-token file")?;

        info!(path = %token_path.display(), "Generated new agent token");
        Ok(token)
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn url(&self) -> String {
        format!("http://localhost:{}", self.port)
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Start the HTTP server in a background thread
    ///
    /// Returns a handle that can be used to stop the server.
    pub fn start(&self) -> Result<ServerHandle> {
        if self.is_running() {
            anyhow::bail!("Server is already running");
        }

        let listener = TcpListener::bind(format!("127.0.0.1:{}", self.port))
            .with_context(|| format!("Failed to bind to port {}", self.port))?;

        // Non-blocking so the accept loop can notice a stop request
        listener
            .set_nonblocking(true)
            .context("Failed to set non-blocking mode")?;

        let running = self.running.clone();
        running.store(true, Ordering::SeqCst);

        let token = self.token.clone();
        let facade = self.facade.clone();
        let port = self.port;

        let handle = thread::Builder::new()
            .name("mcp-server".to_string())
            .spawn(move || {
                info!(port, "MCP server started");

                while running.load(Ordering::SeqCst) {
                    match listener.accept() {
                        Ok((stream, addr)) => {
                            debug!(%addr, "Connection accepted");
                            let token = token.clone();
                            let facade = facade.clone();
                            thread::spawn(move || {
                                if let Err(e) = handle_connection(stream, &token, &facade) {
                                    error!(error = %e, "Error handling connection");
                                }
                            });
                        }
                        Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                            thread::sleep(Duration::from_millis(10));
                        }
                        Err(e) => {
                            error!(error = %e, "Accept error");
                        }
                    }
                }

                info!(port, "MCP server stopped");
            })
            .context("Failed to spawn MCP server thread")?;

        Ok(ServerHandle {
            running: self.running.clone(),
            thread: Some(handle),
        })
    }
}

/// Handle for controlling the running server
pub struct ServerHandle {
    running: Arc<AtomicBool>,
    thread: Option<thread::JoinHandle<()>>,
}

impl ServerHandle {
    /// Stop the server and wait for the accept loop to finish
    pub fn stop(mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.thread.take() {
            if handle.join().is_err() {
                warn!("MCP server thread panicked");
            }
        }
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        // No join here; dropping must not block
        self.running.store(false, Ordering::SeqCst);
    }
}

fn handle_connection(mut stream: TcpStream, expected_token: &str, facade: &RequestFacade) -> Result<()> {
    // Accepted sockets may inherit the listener's non-blocking mode
    stream.set_nonblocking(false)?;
    let mut reader = BufReader::new(stream.try_clone()?);

    let mut request_line = String::new();
    reader.read_line(&mut request_line)?;
    let request_line = request_line.trim();

    debug!(request_line, "HTTP request");

    let parts: Vec<&str> = request_line.split_whitespace().collect();
    if parts.len() < 2 {
        return send_response(&mut stream, 400, "Bad Request", "Invalid request line");
    }

    let method = parts[0];
    let path = parts[1];

    let mut headers = HashMap::new();
    loop {
        let mut line = String::new();
        if reader.read_line(&mut line)? == 0 {
            break;
        }
        let line = line.trim();
        if line.is_empty() {
            break;
        }
        if let Some((key, value)) = line.split_once(':') {
            headers.insert(key.trim().to_lowercase(), value.trim().to_string());
        }
    }

    if path != "/health" {
        let auth_valid = headers
            .get("authorization")
            .and_then(|auth| auth.strip_prefix("Bearer "))
            .is_some_and(|token| token == expected_token);

        if !auth_valid {
            warn!(path, "Rejected request with invalid or missing bearer token");
            return send_response(&mut stream, 401, "Unauthorized", "Invalid or missing token");
        }
    }

    match (method, path) {
        ("GET", "/health") => send_response(&mut stream, 200, "OK", r#"{"status":"healthy"}"#),
        ("GET", "/") => {
            let info = serde_json::json!({
                "name": env!("CARGO_PKG_NAME"),
                "version": env!("CARGO_PKG_VERSION"),
                "tools": [crate::docs::TOOL_NAME],
            });
            send_response(&mut stream, 200, "OK", &info.to_string())
        }
        ("POST", "/rpc") => handle_rpc_request(&mut reader, &mut stream, &headers, facade),
        _ => send_response(&mut stream, 404, "Not Found", "Endpoint not found"),
    }
}

/// Handle a JSON-RPC request on the /rpc endpoint
fn handle_rpc_request(
    reader: &mut BufReader<TcpStream>,
    stream: &mut TcpStream,
    headers: &HashMap<String, String>,
    facade: &RequestFacade,
) -> Result<()> {
    let content_length: usize = headers
        .get("content-length")
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);

    if content_length == 0 || content_length > MAX_BODY_BYTES {
        let response = JsonRpcResponse::error(
            serde_json::Value::Null,
            mcp_protocol::error_codes::INVALID_REQUEST,
            "Missing or invalid Content-Length header",
        );
        let body = serde_json::to_string(&response)?;
        return send_response(stream, 400, "Bad Request", &body);
    }

    let mut body = vec![0u8; content_length];
    reader.read_exact(&mut body)?;
    let body_str = String::from_utf8_lossy(&body);

    let (preview, len) = crate::logging::log_preview(&body_str);
    debug!(body = preview, len, "RPC request body");

    let response = match mcp_protocol::parse_request(&body_str) {
        Ok(request) => mcp_protocol::handle_request(request, facade),
        Err(error_response) => error_response,
    };

    let response_body = serde_json::to_string(&response)?;
    send_response(stream, 200, "OK", &response_body)
}

fn send_response(stream: &mut TcpStream, status: u16, reason: &str, body: &str) -> Result<()> {
    let response = format!(
        "HTTP/1.1 {} {}\r\n\
         Content-Type: application/json\r\n\
         Content-Length: {}\r\n\
         Connection: close\r\n\
         \r\n\
         {}",
        status,
        reason,
        body.len(),
        body
    );

    stream.write_all(response.as_bytes())?;
    stream.flush()?;
    Ok(())
}
