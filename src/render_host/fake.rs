//! Scripted render host for tests
//!
//! Records every command and, depending on its [`FakeBehavior`], answers
//! through the mailbox the way a real renderer would.

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;

use super::{ForegroundOutcome, RenderHost, RenderHostError, WindowEvent, WindowSpec};
use crate::auto_resize::Geometry;
use crate::mailbox::EventSink;
use crate::messages::{ToastLevel, UserMessage};
use crate::request::RequestId;

#[derive(Debug, Clone, PartialEq)]
pub enum HostCall {
    Open(WindowSpec),
    Eval(RequestId, String),
    SetGeometry(RequestId, Geometry, bool),
    Focus(RequestId),
    Close(RequestId),
    Notify(ToastLevel, String),
    /// Contents of the dashboard when shown
    ShowDashboard(Vec<String>),
    PostMessage(String),
    HideDashboard,
}

/// How the fake reacts to `open_window`
#[derive(Debug, Clone)]
pub enum FakeBehavior {
    /// Report loaded, then close with this `window.userResponse`
    Respond(Option<Value>),
    /// Report loaded and answer the measurement script with this size
    Measure(Geometry),
    /// Report loaded and nothing else
    Silent,
    /// Refuse to open windows, show toasts or show the dashboard
    FailOpen(String),
}

pub struct FakeRenderHost {
    calls: Arc<Mutex<Vec<HostCall>>>,
    events: EventSink,
    behavior: Arc<Mutex<FakeBehavior>>,
    foreground: ForegroundOutcome,
}

impl FakeRenderHost {
    pub fn new(events: EventSink, behavior: FakeBehavior) -> Self {
        Self {
            calls: Arc::new(Mutex::new(Vec::new())),
            events,
            behavior: Arc::new(Mutex::new(behavior)),
            foreground: ForegroundOutcome::Honored,
        }
    }

    /// Shared view of recorded calls, usable after the host moves to a thread
    pub fn calls(&self) -> Arc<Mutex<Vec<HostCall>>> {
        self.calls.clone()
    }

    /// Shared handle to change behaviour between requests
    pub fn behavior(&self) -> Arc<Mutex<FakeBehavior>> {
        self.behavior.clone()
    }

    pub fn with_foreground(mut self, outcome: ForegroundOutcome) -> Self {
        self.foreground = outcome;
        self
    }

    fn refusal(&self) -> Result<(), RenderHostError> {
        match &*self.behavior.lock() {
            FakeBehavior::FailOpen(reason) => Err(RenderHostError::Unavailable(reason.clone())),
            _ => Ok(()),
        }
    }
}

impl RenderHost for FakeRenderHost {
    fn open_window(&mut self, spec: &WindowSpec) -> Result<(), RenderHostError> {
        self.calls.lock().push(HostCall::Open(spec.clone()));
        let window = spec.window.clone();

        match self.behavior.lock().clone() {
            FakeBehavior::FailOpen(reason) => {
                return Err(RenderHostError::Rejected { window, reason });
            }
            FakeBehavior::Respond(response) => {
                self.events.send(WindowEvent::Loaded {
                    window: window.clone(),
                });
                self.events.send(WindowEvent::Closed { window, response });
            }
            FakeBehavior::Measure(_) | FakeBehavior::Silent => {
                self.events.send(WindowEvent::Loaded { window });
            }
        }
        Ok(())
    }

    fn eval_script(&mut self, window: &RequestId, script: &str) -> Result<(), RenderHostError> {
        self.calls
            .lock()
            .push(HostCall::Eval(window.clone(), script.to_string()));
        if let FakeBehavior::Measure(size) = self.behavior.lock().clone() {
            self.events.send(WindowEvent::Measured {
                window: window.clone(),
                width: size.width,
                height: size.height,
            });
        }
        Ok(())
    }

    fn set_geometry(
        &mut self,
        window: &RequestId,
        geometry: Geometry,
        center: bool,
    ) -> Result<(), RenderHostError> {
        self.calls
            .lock()
            .push(HostCall::SetGeometry(window.clone(), geometry, center));
        Ok(())
    }

    fn bring_to_front(&mut self, window: &RequestId) -> ForegroundOutcome {
        self.calls.lock().push(HostCall::Focus(window.clone()));
        self.foreground
    }

    fn close_window(&mut self, window: &RequestId) -> Result<(), RenderHostError> {
        self.calls.lock().push(HostCall::Close(window.clone()));
        Ok(())
    }

    fn notify(&mut self, level: ToastLevel, message: &str) -> Result<(), RenderHostError> {
        self.calls
            .lock()
            .push(HostCall::Notify(level, message.to_string()));
        self.refusal()
    }

    fn show_dashboard(&mut self, history: &[UserMessage]) -> Result<(), RenderHostError> {
        let contents = history.iter().map(|m| m.content.clone()).collect();
        self.calls.lock().push(HostCall::ShowDashboard(contents));
        self.refusal()
    }

    fn post_message(&mut self, message: &UserMessage) -> Result<(), RenderHostError> {
        self.calls
            .lock()
            .push(HostCall::PostMessage(message.content.clone()));
        Ok(())
    }

    fn hide_dashboard(&mut self) -> Result<(), RenderHostError> {
        self.calls.lock().push(HostCall::HideDashboard);
        Ok(())
    }
}
