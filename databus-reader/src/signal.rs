//! Stop signalling and the shared output queue.

use std::sync::Arc;

use databus_core::QueueEntry;
use tokio::sync::{mpsc, watch};

// -----------------------------------------------------------------------------
// Output Queue
// -----------------------------------------------------------------------------

/// Producer side of the shared output queue.
pub type MessageSender = mpsc::Sender<QueueEntry>;

/// Consumer side of the shared output queue.
pub type MessageReceiver = mpsc::Receiver<QueueEntry>;

/// Creates the bounded queue readers emit into.
///
/// # Panics
///
/// Panics if `capacity` is zero.
#[must_use]
pub fn message_queue(capacity: u32) -> (MessageSender, MessageReceiver) {
    assert!(capacity > 0, "queue capacity must be positive");
    mpsc::channel(capacity as usize)
}

// -----------------------------------------------------------------------------
// Stop Signal
// -----------------------------------------------------------------------------

/// Creates a linked trigger/signal pair.
#[must_use]
pub fn stop_channel() -> (StopTrigger, StopSignal) {
    let (tx, rx) = watch::channel(false);
    (StopTrigger { tx: Arc::new(tx) }, StopSignal { rx })
}

/// Requests a stop. Cloning shares the same flag.
#[derive(Debug, Clone)]
pub struct StopTrigger {
    tx: Arc<watch::Sender<bool>>,
}

impl StopTrigger {
    /// Sets the stop flag. Idempotent.
    pub fn stop(&self) {
        self.tx.send_replace(true);
    }

    /// Returns true if a stop has been requested.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        *self.tx.borrow()
    }

    /// Returns a new signal observing this trigger.
    #[must_use]
    pub fn subscribe(&self) -> StopSignal {
        StopSignal {
            rx: self.tx.subscribe(),
        }
    }
}

/// Observes a stop request.
///
/// Once every trigger has been dropped, the signal reads as stopped.
#[derive(Debug, Clone)]
pub struct StopSignal {
    rx: watch::Receiver<bool>,
}

impl StopSignal {
    /// Returns true if a stop has been requested.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        *self.rx.borrow() || self.rx.has_changed().is_err()
    }

    /// Completes once a stop has been requested.
    pub async fn stopped(&mut self) {
        // An error means every trigger is gone, which is also a stop.
        let _ = self.rx.wait_for(|stopped| *stopped).await;
    }
}
