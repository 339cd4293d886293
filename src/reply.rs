//! Single-use reply slot between the dispatch loop and one waiting caller
//!
//! Exactly one value is ever observed. Whichever side acts first wins:
//! - the writer fills the slot, or
//! - the reader gives up (timeout, fire-and-forget, drop) and closes it,
//!   after which a late write is silently discarded.
//!
//! Dropping the writer without sending wakes the reader immediately with
//! `Disconnected` instead of leaving it to sit out its timeout.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

enum Slot<T> {
    Empty,
    Filled(T),
    /// Reader already took the value or gave up
    Closed,
    /// Writer dropped without sending
    Disconnected,
}

struct Shared<T> {
    slot: Mutex<Slot<T>>,
    ready: Condvar,
}

/// What a caller gets back from [`ReplyReceiver::wait`]
#[derive(Debug, Clone, PartialEq)]
pub enum AwaitOutcome<T> {
    Reply(T),
    TimedOut,
    /// Zero timeout: the caller chose not to wait
    NotAwaited,
    Disconnected,
}

/// Create a connected sender/receiver pair
pub fn reply_channel<T>() -> (ReplySender<T>, ReplyReceiver<T>) {
    let shared = Arc::new(Shared {
        slot: Mutex::new(Slot::Empty),
        ready: Condvar::new(),
    });
    (
        ReplySender {
            shared: Some(shared.clone()),
        },
        ReplyReceiver { shared },
    )
}

/// Writing half, owned by the dispatch loop
pub struct ReplySender<T> {
    // None once used, so Drop can tell a send from an abandonment
    shared: Option<Arc<Shared<T>>>,
}

impl<T> ReplySender<T> {
    /// Deliver `value`. Returns false when the reader has already gone.
    pub fn send(mut self, value: T) -> bool {
        let Some(shared) = self.shared.take() else {
            return false;
        };
        let mut slot = shared.slot.lock();
        match *slot {
            Slot::Empty => {
                *slot = Slot::Filled(value);
                shared.ready.notify_one();
                true
            }
            _ => false,
        }
    }

    /// Whether the reader is still able to receive a value
    pub fn is_open(&self) -> bool {
        self.shared
            .as_ref()
            .map(|shared| matches!(*shared.slot.lock(), Slot::Empty))
            .unwrap_or(false)
    }
}

impl<T> Drop for ReplySender<T> {
    fn drop(&mut self) {
        if let Some(shared) = self.shared.take() {
            let mut slot = shared.slot.lock();
            if matches!(*slot, Slot::Empty) {
                *slot = Slot::Disconnected;
                shared.ready.notify_one();
            }
        }
    }
}

impl<T> std::fmt::Debug for ReplySender<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplySender")
            .field("open", &self.is_open())
            .finish()
    }
}

/// Reading half, owned by the caller
pub struct ReplyReceiver<T> {
    shared: Arc<Shared<T>>,
}

impl<T> ReplyReceiver<T> {
    /// Block until a value arrives or `timeout` elapses.
    ///
    /// A zero timeout returns `NotAwaited` at once and closes the slot; the
    /// request itself is still processed. A timeout past the end of the clock
    /// waits until a value or a disconnect arrives.
    pub fn wait(self, timeout: Duration) -> AwaitOutcome<T> {
        let mut slot = self.shared.slot.lock();

        if timeout.is_zero() {
            *slot = Slot::Closed;
            return AwaitOutcome::NotAwaited;
        }

        let deadline = Instant::now().checked_add(timeout);
        loop {
            match std::mem::replace(&mut *slot, Slot::Closed) {
                Slot::Filled(value) => return AwaitOutcome::Reply(value),
                Slot::Disconnected => return AwaitOutcome::Disconnected,
                Slot::Closed => return AwaitOutcome::TimedOut,
                Slot::Empty => {
                    *slot = Slot::Empty;
                    let Some(deadline) = deadline else {
                        self.shared.ready.wait(&mut slot);
                        continue;
                    };
                    if self.shared.ready.wait_until(&mut slot, deadline).timed_out() {
                        // A write may have landed right at the deadline
                        return match std::mem::replace(&mut *slot, Slot::Closed) {
                            Slot::Filled(value) => AwaitOutcome::Reply(value),
                            Slot::Disconnected => AwaitOutcome::Disconnected,
                            Slot::Empty | Slot::Closed => AwaitOutcome::TimedOut,
                        };
                    }
                }
            }
        }
    }
}

impl<T> Drop for ReplyReceiver<T> {
    fn drop(&mut self) {
        let mut slot = self.shared.slot.lock();
        if matches!(*slot, Slot::Empty) {
            *slot = Slot::Closed;
        }
    }
}

impl<T> std::fmt::Debug for ReplyReceiver<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplyReceiver").finish_non_exhaustive()
    }
}
