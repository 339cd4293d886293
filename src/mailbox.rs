//! Request mailbox
//!
//! Many producers (facade calls on any thread) feed one consumer (the
//! dispatch loop). The same inbox carries render-host window events, so the
//! loop has a single place where it blocks.
//!
//! Enqueue never blocks. When no dispatch loop is running it fails fast with
//! [`MailboxError::NoConsumer`] instead of parking a request nobody will read.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::time::Instant;

use thiserror::Error;
use tracing::debug;

use crate::outcome::UiOutcome;
use crate::render_host::WindowEvent;
use crate::reply::{reply_channel, ReplyReceiver, ReplySender};
use crate::request::UIRequest;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MailboxError {
    #[error("No UI request queue available. Ensure the dispatch loop is running.")]
    NoConsumer,
}

/// A request plus the slot its outcome goes into
#[derive(Debug)]
pub struct Envelope {
    pub request: UIRequest,
    pub reply: ReplySender<UiOutcome>,
}

/// Everything the dispatch loop can be woken by
#[derive(Debug)]
pub enum DispatchMessage {
    Request(Envelope),
    Window(WindowEvent),
    Shutdown,
}

/// Result of one blocking dequeue
#[derive(Debug)]
pub enum Dequeued {
    Message(DispatchMessage),
    TimedOut,
    /// Every sender is gone; nothing more can arrive
    Disconnected,
}

/// Create the mailbox. The sender is cloned into every producer.
pub fn mailbox() -> (MailboxSender, MailboxReceiver) {
    let (tx, rx) = mpsc::channel();
    let consumer_alive = Arc::new(AtomicBool::new(false));
    (
        MailboxSender {
            tx,
            consumer_alive: consumer_alive.clone(),
        },
        MailboxReceiver { rx, consumer_alive },
    )
}

#[derive(Clone, Debug)]
pub struct MailboxSender {
    tx: mpsc::Sender<DispatchMessage>,
    consumer_alive: Arc<AtomicBool>,
}

impl MailboxSender {
    /// Queue `request` and hand back the receiving end of its reply slot.
    pub fn enqueue(&self, request: UIRequest) -> Result<ReplyReceiver<UiOutcome>, MailboxError> {
        if !self.has_consumer() {
            return Err(MailboxError::NoConsumer);
        }

        let (reply, receiver) = reply_channel();
        let request_id = request.id.clone();
        self.tx
            .send(DispatchMessage::Request(Envelope { request, reply }))
            .map_err(|_| MailboxError::NoConsumer)?;

        debug!(request_id = %request_id, "Request enqueued");
        Ok(receiver)
    }

    /// Ask the dispatch loop to stop after its current message
    pub fn shutdown(&self) -> Result<(), MailboxError> {
        self.tx
            .send(DispatchMessage::Shutdown)
            .map_err(|_| MailboxError::NoConsumer)
    }

    /// Whether a dispatch loop is currently consuming
    pub fn has_consumer(&self) -> bool {
        self.consumer_alive.load(Ordering::SeqCst)
    }

    /// Handle a render host uses to post window events
    pub fn event_sink(&self) -> EventSink {
        EventSink {
            tx: self.tx.clone(),
        }
    }
}

/// Posts render-host window events into the mailbox
#[derive(Clone, Debug)]
pub struct EventSink {
    tx: mpsc::Sender<DispatchMessage>,
}

impl EventSink {
    /// Returns false once the dispatch loop's receiver is gone
    pub fn send(&self, event: WindowEvent) -> bool {
        self.tx.send(DispatchMessage::Window(event)).is_ok()
    }
}

#[derive(Debug)]
pub struct MailboxReceiver {
    rx: mpsc::Receiver<DispatchMessage>,
    consumer_alive: Arc<AtomicBool>,
}

impl MailboxReceiver {
    /// Block until a message arrives, `deadline` passes, or all senders drop.
    ///
    /// `None` waits indefinitely.
    pub fn dequeue_blocking(&self, deadline: Option<Instant>) -> Dequeued {
        match deadline {
            None => match self.rx.recv() {
                Ok(message) => Dequeued::Message(message),
                Err(_) => Dequeued::Disconnected,
            },
            Some(deadline) => {
                let timeout = deadline.saturating_duration_since(Instant::now());
                match self.rx.recv_timeout(timeout) {
                    Ok(message) => Dequeued::Message(message),
                    Err(RecvTimeoutError::Timeout) => Dequeued::TimedOut,
                    Err(RecvTimeoutError::Disconnected) => Dequeued::Disconnected,
                }
            }
        }
    }

    /// Non-blocking drain used at shutdown
    pub(crate) fn try_dequeue(&self) -> Option<DispatchMessage> {
        self.rx.try_recv().ok()
    }

    /// Mark the consumer live until the returned guard drops
    pub(crate) fn consumer_guard(&self) -> ConsumerGuard {
        self.consumer_alive.store(true, Ordering::SeqCst);
        ConsumerGuard {
            consumer_alive: self.consumer_alive.clone(),
        }
    }
}

impl Drop for MailboxReceiver {
    fn drop(&mut self) {
        self.consumer_alive.store(false, Ordering::SeqCst);
    }
}

pub(crate) struct ConsumerGuard {
    consumer_alive: Arc<AtomicBool>,
}

impl Drop for ConsumerGuard {
    fn drop(&mut self) {
        self.consumer_alive.store(false, Ordering::SeqCst);
    }
}
