//! Dispatch loop
//!
//! The sole consumer of the mailbox, running on the UI-owning thread. It
//! opens windows through the render host, tracks one [`WindowSession`] per
//! open window, and writes exactly one outcome per request.
//!
//! The loop suspends only in `dequeue_blocking`, with the earliest session
//! deadline as its wake-up time. Render-host events arrive through the same
//! mailbox, so every session mutation happens on this thread.
//!
//! Requests that open no window (queue probes, toasts, messaging) are
//! answered inline. The message history is loop state, like the sessions.

use std::collections::HashMap;
use std::time::Instant;

use serde_json::json;
use tracing::{debug, info, instrument, warn};

use crate::auto_resize::{AutoResize, Geometry};
use crate::config::{BridgeConfig, ChromeOffset};
use crate::error::ResultExt;
use crate::logging::{log_outcome, log_request_event};
use crate::mailbox::{Dequeued, DispatchMessage, Envelope, MailboxReceiver};
use crate::messages::{MessageCenter, MessageCommand, UserMessage};
use crate::outcome::UiOutcome;
use crate::render_host::{RenderHost, RenderHostError, WindowEvent, WindowSpec};
use crate::reply::ReplySender;
use crate::request::{ContentSource, OperationKind, RequestId, RequestPayload, WindowHints};

/// Error detail written to requests still open when the loop stops
pub const SHUTDOWN_DETAIL: &str = "dispatch loop shut down";

/// Knobs the loop takes from [`BridgeConfig`]
#[derive(Debug, Clone, Copy)]
pub struct DispatchSettings {
    pub chrome_offset: ChromeOffset,
    pub measure_padding: u32,
}

impl DispatchSettings {
    pub fn from_config(config: &BridgeConfig) -> Self {
        Self {
            chrome_offset: config.chrome_offset,
            measure_padding: config.measure_padding,
        }
    }
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self::from_config(&BridgeConfig::default())
    }
}

/// State of one open window, owned by the loop
struct WindowSession {
    operation: OperationKind,
    geometry: Geometry,
    resize: Option<AutoResize>,
    deadline: Option<Instant>,
    reply: ReplySender<UiOutcome>,
    opened_at: Instant,
}

pub struct DispatchLoop<H: RenderHost> {
    receiver: MailboxReceiver,
    host: H,
    settings: DispatchSettings,
    sessions: HashMap<RequestId, WindowSession>,
    messages: MessageCenter,
}

impl<H: RenderHost> DispatchLoop<H> {
    pub fn new(receiver: MailboxReceiver, host: H, settings: DispatchSettings) -> Self {
        Self {
            receiver,
            host,
            settings,
            sessions: HashMap::new(),
            messages: MessageCenter::new(),
        }
    }

    /// Serve requests until a `Shutdown` message arrives or every sender is
    /// gone. Producers can enqueue only while this is running.
    pub fn run(mut self) {
        let consumer = self.receiver.consumer_guard();
        info!("Dispatch loop started");

        loop {
            let deadline = self.next_deadline();
            let keep_running = match self.receiver.dequeue_blocking(deadline) {
                Dequeued::Message(message) => self.handle_message(message),
                Dequeued::TimedOut => true,
                Dequeued::Disconnected => {
                    info!("All mailbox senders dropped");
                    false
                }
            };
            self.expire_sessions(Instant::now());
            if !keep_running {
                break;
            }
        }

        // New enqueues fail fast from here on
        drop(consumer);
        self.shutdown_sessions();
        info!("Dispatch loop ended");
    }

    fn next_deadline(&self) -> Option<Instant> {
        self.sessions.values().filter_map(|s| s.deadline).min()
    }

    fn handle_message(&mut self, message: DispatchMessage) -> bool {
        match message {
            DispatchMessage::Request(envelope) => self.handle_request(envelope),
            DispatchMessage::Window(event) => self.handle_event(event),
            DispatchMessage::Shutdown => {
                info!("Shutdown requested");
                return false;
            }
        }
        true
    }

    #[instrument(
        name = "dispatch_request",
        skip_all,
        fields(request_id = %envelope.request.id, operation = %envelope.request.operation)
    )]
    fn handle_request(&mut self, envelope: Envelope) {
        let Envelope { request, reply } = envelope;
        let queue_latency = request.created_at.elapsed();
        log_request_event(
            request.id.as_str(),
            request.operation.as_str(),
            "dispatched",
        );

        let deadline = request.deadline();
        if deadline.is_some_and(|d| d <= Instant::now()) {
            debug!("Request expired while queued");
            deliver(&request.id, reply, UiOutcome::Timeout, request.created_at);
            return;
        }

        match request.payload {
            RequestPayload::Probe { message } => {
                let data = json!({
                    "echo": message,
                    "received_at": request.created_wall.to_rfc3339(),
                    "dispatched_at": chrono::Utc::now().to_rfc3339(),
                    "queue_latency_ms": queue_latency.as_secs_f64() * 1000.0,
                    "version": env!("CARGO_PKG_VERSION"),
                });
                deliver(
                    &request.id,
                    reply,
                    UiOutcome::Success { data },
                    request.created_at,
                );
            }
            RequestPayload::Toast { level, message } => {
                let outcome = match self.host.notify(level, &message) {
                    Ok(()) => {
                        info!(level = level.as_str(), "Toast notification shown");
                        UiOutcome::Success {
                            data: json!({
                                "message": "Toast notification sent successfully",
                                "level": level.as_str(),
                                "text": message,
                            }),
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, "Toast notification failed");
                        UiOutcome::error(format!("Toast notification failed: {}", e))
                    }
                };
                deliver(&request.id, reply, outcome, request.created_at);
            }
            RequestPayload::Messages(command) => {
                let outcome = self.run_message_command(command);
                deliver(&request.id, reply, outcome, request.created_at);
            }
            RequestPayload::Window {
                content,
                title,
                hints,
            } => self.open_window(
                request.id,
                request.operation,
                content,
                title,
                hints,
                deadline,
                reply,
            ),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn open_window(
        &mut self,
        id: RequestId,
        operation: OperationKind,
        content: ContentSource,
        title: String,
        hints: WindowHints,
        deadline: Option<Instant>,
        reply: ReplySender<UiOutcome>,
    ) {
        let opened_at = Instant::now();
        let requested = Geometry::new(hints.width, hints.height);
        let mut resize = hints.auto_resize.then(|| {
            AutoResize::new(
                requested,
                self.settings.chrome_offset,
                self.settings.measure_padding,
            )
        });
        let geometry = match resize.as_mut() {
            Some(resize) => resize.open_geometry(),
            None => requested,
        };

        info!(
            content = %content.describe(),
            width = geometry.width,
            height = geometry.height,
            modal = hints.modal,
            auto_resize = hints.auto_resize,
            "Opening window"
        );

        let spec = WindowSpec {
            window: id.clone(),
            title,
            content,
            geometry,
            modal: hints.modal,
            resizable: hints.resizable,
            always_on_top: hints.always_on_top,
            center: hints.center_on_screen,
        };

        if let Err(e) = self.host.open_window(&spec) {
            warn!(error = %e, "Render host failed to open window");
            deliver(&id, reply, UiOutcome::error(e.to_string()), opened_at);
            return;
        }

        if hints.bring_to_front {
            let outcome = self.host.bring_to_front(&id);
            debug!(?outcome, "Foreground request");
        }

        self.sessions.insert(
            id,
            WindowSession {
                operation,
                geometry,
                resize,
                deadline,
                reply,
                opened_at,
            },
        );
    }

    fn run_message_command(&mut self, command: MessageCommand) -> UiOutcome {
        match command {
            MessageCommand::Send {
                message,
                show_dashboard,
            } => {
                debug!(
                    message_id = %message.id,
                    msg_type = message.msg_type.as_str(),
                    priority = message.priority.as_str(),
                    "Queueing message for user"
                );
                let data = json!({
                    "message_id": message.id,
                    "status": "queued",
                    "timestamp": message.timestamp,
                });
                self.messages.push(message.clone());
                if self.messages.dashboard_visible() {
                    self.host.post_message(&message).warn_on_err();
                } else if show_dashboard {
                    self.open_dashboard().warn_on_err();
                }
                UiOutcome::Success { data }
            }
            MessageCommand::Check(query) => {
                let found = self.messages.check(&query);
                debug!(count = found.len(), "Checked messages from user");
                UiOutcome::Success {
                    data: json!({ "count": found.len(), "messages": found }),
                }
            }
            MessageCommand::ShowDashboard => match self.open_dashboard() {
                Ok(()) => UiOutcome::Success {
                    data: json!({ "message": "Dashboard shown" }),
                },
                Err(e) => UiOutcome::error(format!("Error showing dashboard: {}", e)),
            },
            MessageCommand::HideDashboard => match self.host.hide_dashboard() {
                Ok(()) => {
                    self.messages.set_dashboard_visible(false);
                    UiOutcome::Success {
                        data: json!({ "message": "Dashboard hidden" }),
                    }
                }
                Err(e) => UiOutcome::error(format!("Error hiding dashboard: {}", e)),
            },
            MessageCommand::History => {
                let history = self.messages.history();
                UiOutcome::Success {
                    data: json!({ "count": history.len(), "history": history }),
                }
            }
            MessageCommand::Clear => {
                let cleared = self.messages.clear();
                info!(cleared, "Message history cleared");
                if self.messages.dashboard_visible() {
                    self.host.show_dashboard(&[]).warn_on_err();
                }
                UiOutcome::Success {
                    data: json!({ "message": "Message queues cleared", "cleared": cleared }),
                }
            }
        }
    }

    fn open_dashboard(&mut self) -> Result<(), RenderHostError> {
        self.host.show_dashboard(self.messages.history())?;
        self.messages.set_dashboard_visible(true);
        Ok(())
    }

    fn handle_event(&mut self, event: WindowEvent) {
        match event {
            WindowEvent::Loaded { window } => {
                let Some(session) = self.sessions.get(&window) else {
                    debug!(window = %window, "Loaded event for unknown window");
                    return;
                };
                if let Some(script) = session.resize.as_ref().and_then(|r| r.on_loaded()) {
                    debug!(window = %window, "Injecting measurement script");
                    self.host.eval_script(&window, &script).warn_on_err();
                }
            }
            WindowEvent::Measured {
                window,
                width,
                height,
            } => {
                let Some(session) = self.sessions.get_mut(&window) else {
                    debug!(window = %window, "Measured event for unknown window");
                    return;
                };
                let measured = Geometry::new(width, height);
                let Some(resize) = session.resize.as_mut() else {
                    debug!(window = %window, "Measurement for a window without auto-resize");
                    return;
                };
                let Some(final_size) = resize.on_measured(measured) else {
                    debug!(
                        window = %window,
                        stage = ?resize.stage(),
                        first = ?resize.measured(),
                        "Ignoring repeated measurement"
                    );
                    return;
                };

                info!(
                    window = %window,
                    from_height = session.geometry.height,
                    width = final_size.width,
                    height = final_size.height,
                    "Auto-resizing window to content"
                );
                session.geometry = final_size;
                self.host
                    .set_geometry(&window, final_size, true)
                    .warn_on_err();
            }
            WindowEvent::Closed { window, response } => {
                let Some(session) = self.sessions.remove(&window) else {
                    debug!(window = %window, "Close event for unknown window");
                    return;
                };
                let outcome = UiOutcome::from_window_response(response);
                debug!(window = %window, operation = %session.operation, "Window closed");
                deliver(&window, session.reply, outcome, session.opened_at);
            }
            WindowEvent::Failed { window, error } => {
                let Some(session) = self.sessions.remove(&window) else {
                    debug!(window = %window, "Failure event for unknown window");
                    return;
                };
                warn!(window = %window, error = %error, "Window failed");
                self.host.close_window(&window).warn_on_err();
                deliver(
                    &window,
                    session.reply,
                    UiOutcome::error(format!("Render host error: {}", error)),
                    session.opened_at,
                );
            }
            WindowEvent::FocusResult { window, honored } => {
                debug!(window = %window, honored, "Foreground result");
            }
            WindowEvent::MessageFromUser { content, msg_type } => {
                let message = UserMessage::incoming(content, msg_type);
                info!(message_id = %message.id, msg_type = message.msg_type.as_str(), "Message from user");
                self.messages.push(message);
            }
            WindowEvent::DashboardHidden => {
                debug!("Dashboard closed by the user");
                self.messages.set_dashboard_visible(false);
            }
            WindowEvent::HostExited { reason } => {
                warn!(reason = %reason, open = self.sessions.len(), "Render host exited");
                self.messages.set_dashboard_visible(false);
                let detail = format!("Render host exited: {}", reason);
                for (id, session) in self.sessions.drain() {
                    deliver(
                        &id,
                        session.reply,
                        UiOutcome::error(detail.clone()),
                        session.opened_at,
                    );
                }
            }
        }
    }

    /// Close every session whose deadline has passed and report `Timeout`
    fn expire_sessions(&mut self, now: Instant) {
        let expired: Vec<RequestId> = self
            .sessions
            .iter()
            .filter(|(_, s)| s.deadline.is_some_and(|d| d <= now))
            .map(|(id, _)| id.clone())
            .collect();

        for id in expired {
            if let Some(session) = self.sessions.remove(&id) {
                let resize_stage = session.resize.as_ref().map(AutoResize::stage);
                info!(window = %id, ?resize_stage, "Window timed out");
                self.host.close_window(&id).warn_on_err();
                deliver(&id, session.reply, UiOutcome::Timeout, session.opened_at);
            }
        }
    }

    fn shutdown_sessions(&mut self) {
        for (id, session) in std::mem::take(&mut self.sessions) {
            self.host.close_window(&id).warn_on_err();
            deliver(
                &id,
                session.reply,
                UiOutcome::error(SHUTDOWN_DETAIL),
                session.opened_at,
            );
        }

        // Requests that raced the shutdown still get an answer
        while let Some(message) = self.receiver.try_dequeue() {
            if let DispatchMessage::Request(Envelope { request, reply }) = message {
                deliver(
                    &request.id,
                    reply,
                    UiOutcome::error(SHUTDOWN_DETAIL),
                    request.created_at,
                );
            }
        }
    }
}

/// Write `outcome` to the caller and log it
fn deliver(id: &RequestId, reply: ReplySender<UiOutcome>, outcome: UiOutcome, since: Instant) {
    let status = outcome.status();
    let delivered = reply.send(outcome);
    log_outcome(
        id.as_str(),
        status.as_str(),
        since.elapsed().as_millis() as u64,
    );
    if !delivered {
        debug!(request_id = %id, "Caller no longer waiting, outcome discarded");
    }
}

#[cfg(test)]
#[path = "dispatch_tests.rs"]
mod tests;
