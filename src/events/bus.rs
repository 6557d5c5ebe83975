//! # Per-controller event bus.
//!
//! Every controller owns one [`Bus`]. The caller side, the runner and the
//! watchdog all publish into it from whatever context they are running on;
//! publishing never waits.
//!
//! ```text
//!   WorkerController ──┐
//!   LoopRunner       ──┼──► Bus ──┬──► subscriber listener ──► SubscriberSet
//!   Watchdog         ──┘          └──► WorkerController::subscribe()
//! ```
//!
//! The channel is a bounded ring shared by all receivers. A receiver that
//! falls behind sees `RecvError::Lagged(n)` and resumes at the oldest retained
//! event. Nothing is stored for receivers that subscribe later.

use tokio::sync::broadcast;

use super::event::Event;

/// Fire-and-forget broadcast of [`Event`]s.
#[derive(Clone, Debug)]
pub struct Bus {
    sender: broadcast::Sender<Event>,
}

impl Bus {
    /// Creates a bus retaining up to `capacity` events (at least one).
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Sends `ev` to every live receiver; dropped if there is none.
    pub fn publish(&self, ev: Event) {
        if self.sender.send(ev).is_err() {
            tracing::trace!("event dropped: no receivers");
        }
    }

    /// Returns a receiver for events published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.sender.subscribe()
    }
}
