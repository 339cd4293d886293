//! Render host backed by an external renderer process
//!
//! # Protocol
//!
//! Commands go to the renderer's stdin, events come back on its stdout,
//! one JSON object per line (JSONL), tagged by `type`:
//!
//! ```json
//! {"type": "open", "window": "<id>", "title": "Hi", "content": {"html": "..."}, "width": 600, "height": 400, "modal": true, "resizable": false, "alwaysOnTop": true, "center": true}
//! {"type": "eval", "window": "<id>", "script": "..."}
//! {"type": "setGeometry", "window": "<id>", "width": 396, "height": 329, "center": true}
//! {"type": "focus", "window": "<id>"}
//! {"type": "close", "window": "<id>"}
//! {"type": "notify", "level": "success", "message": "Done"}
//! {"type": "showDashboard", "messages": [...]}
//! {"type": "postMessage", "message": {...}}
//! {"type": "hideDashboard"}
//! ```
//!
//! ```json
//! {"type": "loaded", "window": "<id>"}
//! {"type": "measured", "window": "<id>", "width": 380, "height": 290}
//! {"type": "closed", "window": "<id>", "response": {"status": "success", "data": {}}}
//! {"type": "failed", "window": "<id>", "error": "..."}
//! {"type": "focusResult", "window": "<id>", "honored": true}
//! {"type": "messageFromUser", "content": "...", "msgType": "response"}
//! {"type": "dashboardHidden"}
//! ```
//!
//! The renderer's stderr is forwarded to the log.

use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::thread;

use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use super::{ForegroundOutcome, RenderHost, RenderHostError, WindowEvent, WindowSpec};
use crate::auto_resize::Geometry;
use crate::config::RendererConfig;
use crate::error::ResultExt;
use crate::logging::log_preview;
use crate::mailbox::EventSink;
use crate::messages::{ToastLevel, UserMessage};
use crate::request::{ContentSource, RequestId};

/// Commands written to the renderer's stdin
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum HostCommand<'a> {
    Open {
        window: &'a RequestId,
        title: &'a str,
        content: &'a ContentSource,
        width: u32,
        height: u32,
        modal: bool,
        resizable: bool,
        #[serde(rename = "alwaysOnTop")]
        always_on_top: bool,
        center: bool,
    },
    Eval {
        window: &'a RequestId,
        script: &'a str,
    },
    SetGeometry {
        window: &'a RequestId,
        width: u32,
        height: u32,
        center: bool,
    },
    Focus {
        window: &'a RequestId,
    },
    Close {
        window: &'a RequestId,
    },
    Notify {
        level: ToastLevel,
        message: &'a str,
    },
    ShowDashboard {
        messages: &'a [UserMessage],
    },
    PostMessage {
        message: &'a UserMessage,
    },
    HideDashboard,
}

pub struct StdioRenderHost {
    child: Child,
    stdin: ChildStdin,
}

impl StdioRenderHost {
    /// Spawn the renderer and start forwarding its events into `events`.
    #[instrument(name = "spawn_renderer", skip_all, fields(command = %config.command))]
    pub fn spawn(config: &RendererConfig, events: EventSink) -> Result<Self, RenderHostError> {
        let mut child = Command::new(&config.command)
            .args(&config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                RenderHostError::Unavailable(format!(
                    "failed to spawn '{}': {}",
                    config.command, e
                ))
            })?;

        let unavailable = |what: &str| RenderHostError::Unavailable(format!("no {} pipe", what));
        let stdin = child.stdin.take().ok_or_else(|| unavailable("stdin"))?;
        let stdout = child.stdout.take().ok_or_else(|| unavailable("stdout"))?;
        let stderr = child.stderr.take().ok_or_else(|| unavailable("stderr"))?;

        info!(pid = child.id(), "Renderer process started");

        thread::Builder::new()
            .name("renderer-events".to_string())
            .spawn(move || forward_events(BufReader::new(stdout), events))
            .map_err(|e| RenderHostError::Unavailable(format!("event thread: {}", e)))?;

        thread::Builder::new()
            .name("renderer-stderr".to_string())
            .spawn(move || {
                for line in BufReader::new(stderr).lines().map_while(Result::ok) {
                    debug!(target: "ui_bridge::renderer", "{}", line);
                }
            })
            .map_err(|e| RenderHostError::Unavailable(format!("stderr thread: {}", e)))?;

        Ok(Self { child, stdin })
    }

    fn send(&mut self, command: &HostCommand<'_>) -> Result<(), RenderHostError> {
        let line = serde_json::to_string(command)?;
        let (preview, len) = log_preview(&line);
        debug!(preview, len, "Renderer command");

        writeln!(self.stdin, "{}", line)
            .and_then(|_| self.stdin.flush())
            .map_err(|e| RenderHostError::Unavailable(format!("write to renderer failed: {}", e)))
    }
}

impl RenderHost for StdioRenderHost {
    fn open_window(&mut self, spec: &WindowSpec) -> Result<(), RenderHostError> {
        self.send(&HostCommand::Open {
            window: &spec.window,
            title: &spec.title,
            content: &spec.content,
            width: spec.geometry.width,
            height: spec.geometry.height,
            modal: spec.modal,
            resizable: spec.resizable,
            always_on_top: spec.always_on_top,
            center: spec.center,
        })
    }

    fn eval_script(&mut self, window: &RequestId, script: &str) -> Result<(), RenderHostError> {
        self.send(&HostCommand::Eval { window, script })
    }

    fn set_geometry(
        &mut self,
        window: &RequestId,
        geometry: Geometry,
        center: bool,
    ) -> Result<(), RenderHostError> {
        self.send(&HostCommand::SetGeometry {
            window,
            width: geometry.width,
            height: geometry.height,
            center,
        })
    }

    fn bring_to_front(&mut self, window: &RequestId) -> ForegroundOutcome {
        match self.send(&HostCommand::Focus { window }) {
            Ok(()) => ForegroundOutcome::Deferred,
            Err(e) => {
                debug!(error = %e, "Focus command not delivered");
                ForegroundOutcome::NotHonored
            }
        }
    }

    fn close_window(&mut self, window: &RequestId) -> Result<(), RenderHostError> {
        self.send(&HostCommand::Close { window })
    }

    fn notify(&mut self, level: ToastLevel, message: &str) -> Result<(), RenderHostError> {
        self.send(&HostCommand::Notify { level, message })
    }

    fn show_dashboard(&mut self, history: &[UserMessage]) -> Result<(), RenderHostError> {
        self.send(&HostCommand::ShowDashboard { messages: history })
    }

    fn post_message(&mut self, message: &UserMessage) -> Result<(), RenderHostError> {
        self.send(&HostCommand::PostMessage { message })
    }

    fn hide_dashboard(&mut self) -> Result<(), RenderHostError> {
        self.send(&HostCommand::HideDashboard)
    }
}

impl Drop for StdioRenderHost {
    fn drop(&mut self) {
        if let Err(e) = self.child.kill() {
            debug!(error = %e, "Renderer already exited");
        }
        self.child.wait().log_err();
    }
}

/// Read JSONL events until EOF, then report the host as gone
fn forward_events<R: BufRead>(reader: R, events: EventSink) {
    for line in reader.lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                warn!(error = %e, "Error reading renderer stdout");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        match serde_json::from_str::<WindowEvent>(&line) {
            Ok(event) => {
                if !events.send(event) {
                    debug!("Dispatch loop gone, stopping renderer event forwarding");
                    return;
                }
            }
            Err(e) => {
                let (preview, len) = log_preview(&line);
                warn!(error = %e, raw = preview, len, "Unparseable renderer event");
            }
        }
    }

    info!("Renderer stdout closed");
    events.send(WindowEvent::HostExited {
        reason: "renderer process exited".to_string(),
    });
}
