//! # Subscriber fan-out.
//!
//! [`SubscriberSet`] gives each subscriber a lane: a bounded queue drained by
//! a dedicated worker task. The listener pushes every bus event into all
//! lanes without waiting.
//!
//! ```text
//! emit_arc(ev) ──┬──► lane "log-writer" ──► on_event()
//!                └──► lane "alerts"     ──► on_event() ── panic ──► SubscriberPanicked
//! ```
//!
//! A full or closed lane drops the event for that subscriber only and
//! publishes `SubscriberOverflow` (never for an overflow event itself, which
//! would loop). Panics are caught with `AssertUnwindSafe`; a subscriber that
//! panics while holding its own lock may leave that state poisoned.

use std::sync::Arc;

use futures::FutureExt;
use tokio::{sync::mpsc, task::JoinHandle};

use crate::core::panic_message;
use crate::events::{Bus, Event, EventKind};
use crate::subscribers::Subscribe;

struct Lane {
    name: &'static str,
    queue: mpsc::Sender<Arc<Event>>,
}

/// Per-subscriber queues and their worker tasks.
pub struct SubscriberSet {
    lanes: Vec<Lane>,
    workers: Vec<JoinHandle<()>>,
    bus: Bus,
}

impl SubscriberSet {
    /// Spawns one worker per subscriber; requires a tokio runtime context.
    #[must_use]
    pub fn new(subs: Vec<Arc<dyn Subscribe>>, bus: Bus) -> Self {
        let (lanes, workers) = subs
            .into_iter()
            .map(|sub| spawn_lane(sub, bus.clone()))
            .unzip();
        Self {
            lanes,
            workers,
            bus,
        }
    }

    /// Queues `event` on every lane without waiting.
    pub fn emit_arc(&self, event: Arc<Event>) {
        let reportable = event.kind != EventKind::SubscriberOverflow;

        for lane in &self.lanes {
            let reason = match lane.queue.try_send(Arc::clone(&event)) {
                Ok(()) => continue,
                Err(mpsc::error::TrySendError::Full(_)) => "full",
                Err(mpsc::error::TrySendError::Closed(_)) => "closed",
            };
            if reportable {
                self.bus.publish(Event::subscriber_overflow(lane.name, reason));
            }
        }
    }

    /// Closes all lanes and waits for their workers to drain.
    pub async fn shutdown(self) {
        drop(self.lanes);
        for worker in self.workers {
            let _ = worker.await;
        }
    }
}

fn spawn_lane(sub: Arc<dyn Subscribe>, bus: Bus) -> (Lane, JoinHandle<()>) {
    let name = sub.name();
    let (queue, mut rx) = mpsc::channel::<Arc<Event>>(sub.queue_capacity().max(1));

    let worker = tokio::spawn(async move {
        while let Some(ev) = rx.recv().await {
            let delivery = std::panic::AssertUnwindSafe(sub.on_event(&ev)).catch_unwind();
            if let Err(panic_err) = delivery.await {
                bus.publish(Event::subscriber_panicked(name, panic_message(&*panic_err)));
            }
        }
    });
    (Lane { name, queue }, worker)
}
