//! Cross-thread callback dispatch
//!
//! The hook thread never runs user code. It queues a [`PendingCallback`]
//! on an unbounded channel (a non-blocking, lock-free send) and the
//! application context drains the queue, either from an async task via
//! [`DispatchQueue::run`] or cooperatively via [`DispatchQueue::drain`].

use std::panic::{self, AssertUnwindSafe};

use tokio::sync::mpsc;
use tracing::{debug, error, trace, warn};

use super::registry::{Binding, Callback, Direction};

/// One callback invocation, consumed exactly once
pub struct PendingCallback {
    pub binding: Binding,
    pub direction: Direction,
    callback: Callback,
}

impl PendingCallback {
    pub fn new(binding: Binding, direction: Direction, callback: Callback) -> Self {
        Self {
            binding,
            direction,
            callback,
        }
    }

    /// Run the callback. A panic is caught and logged so the queue keeps going.
    pub fn invoke(self) {
        trace!(binding = %self.binding, direction = %self.direction, "invoking hotkey callback");
        let callback = self.callback;
        if panic::catch_unwind(AssertUnwindSafe(|| callback())).is_err() {
            error!(
                binding = %self.binding,
                direction = %self.direction,
                "hotkey callback panicked"
            );
        }
    }
}

impl std::fmt::Debug for PendingCallback {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingCallback")
            .field("binding", &self.binding)
            .field("direction", &self.direction)
            .finish()
    }
}

/// Create a connected sender/queue pair
pub fn dispatch_channel() -> (DispatchSender, DispatchQueue) {
    let (tx, rx) = mpsc::unbounded_channel();
    (DispatchSender { tx }, DispatchQueue { rx })
}

/// Producer half, held by the hook thread
#[derive(Clone, Debug)]
pub struct DispatchSender {
    tx: mpsc::UnboundedSender<PendingCallback>,
}

impl DispatchSender {
    /// Queue a callback without blocking. Returns false if the queue is gone.
    pub fn send(&self, pending: PendingCallback) -> bool {
        match self.tx.send(pending) {
            Ok(()) => true,
            Err(mpsc::error::SendError(pending)) => {
                warn!(
                    binding = %pending.binding,
                    direction = %pending.direction,
                    "dispatch queue closed, dropping hotkey callback"
                );
                false
            }
        }
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Consumer half, owned by the context that runs user callbacks
#[derive(Debug)]
pub struct DispatchQueue {
    rx: mpsc::UnboundedReceiver<PendingCallback>,
}

impl DispatchQueue {
    /// Invoke callbacks as they arrive until every sender is dropped
    pub async fn run(&mut self) {
        debug!("dispatch queue started");
        while let Some(pending) = self.rx.recv().await {
            pending.invoke();
        }
        debug!("dispatch queue closed");
    }

    /// Blocking variant of [`run`](Self::run) for a plain application thread.
    ///
    /// Must not be called from inside an async runtime.
    pub fn run_blocking(&mut self) {
        while let Some(pending) = self.rx.blocking_recv() {
            pending.invoke();
        }
    }

    /// Wait for the next callback without invoking it
    pub async fn next(&mut self) -> Option<PendingCallback> {
        self.rx.recv().await
    }

    /// Invoke everything already queued and return how many ran
    pub fn drain(&mut self) -> usize {
        let mut count = 0;
        while let Ok(pending) = self.rx.try_recv() {
            pending.invoke();
            count += 1;
        }
        count
    }

    /// Take the next queued callback, if any, without invoking it
    pub fn try_next(&mut self) -> Option<PendingCallback> {
        self.rx.try_recv().ok()
    }
}
