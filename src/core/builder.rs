use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::broadcast::{self, error::TryRecvError};
use tokio_util::sync::CancellationToken;

use crate::{
    core::WorkerConfig,
    events::{Bus, Event},
    subscribers::{Subscribe, SubscriberSet},
    tasks::LoopTask,
};
use super::{
    context::{Placement, spawn_guarded},
    controller::WorkerController,
    state::{Shared, State},
};

/// Builder for constructing a [`WorkerController`] with optional subscribers.
pub struct WorkerControllerBuilder {
    cfg: WorkerConfig,
    subscribers: Vec<Arc<dyn Subscribe>>,
}

impl WorkerControllerBuilder {
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: WorkerConfig) -> Self {
        Self {
            cfg,
            subscribers: Vec::new(),
        }
    }

    /// Sets event subscribers for observability.
    ///
    /// Subscribers receive lifecycle events (start, stop, failures, forced
    /// termination) through dedicated workers with bounded queues.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Builds the controller around `task`.
    ///
    /// If called inside a tokio runtime, that runtime becomes the controller's
    /// home: background runs, the watchdog and the subscriber listener are
    /// spawned onto it. Otherwise they get dedicated threads.
    pub fn build<T: LoopTask>(self, task: T) -> WorkerController {
        self.build_arc(Arc::new(task))
    }

    /// Like [`build`](Self::build), for an already shared task.
    pub fn build_arc(self, task: Arc<dyn LoopTask>) -> WorkerController {
        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        let home = Handle::try_current().ok();
        let listener_stop = CancellationToken::new();

        if !self.subscribers.is_empty() {
            spawn_listener(
                &self.cfg.name,
                home.as_ref(),
                self.subscribers,
                bus.clone(),
                listener_stop.clone(),
            );
        }

        let state = State::new(
            Arc::from(self.cfg.name.as_str()),
            self.cfg.background,
            self.cfg.loop_interval,
            self.cfg.stop_timeout,
        );
        let shared = Arc::new(Shared::new(state, task, bus, listener_stop));
        WorkerController::new_internal(shared, home)
    }
}

/// Forwards bus events to the subscriber set until `stop` fires.
///
/// Events already on the bus when `stop` fires are still delivered.
fn spawn_listener(
    name: &str,
    home: Option<&Handle>,
    subscribers: Vec<Arc<dyn Subscribe>>,
    bus: Bus,
    stop: CancellationToken,
) {
    let mut rx = bus.subscribe();
    let listener = async move {
        let set = SubscriberSet::new(subscribers, bus);
        loop {
            tokio::select! {
                biased;
                msg = rx.recv() => match msg {
                    Ok(ev) => set.emit_arc(Arc::new(ev)),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "subscriber listener lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
                _ = stop.cancelled() => {
                    drain(&mut rx, &set);
                    break;
                }
            }
        }
        set.shutdown().await;
    };

    let spawned = match home {
        Some(handle) => spawn_guarded(Placement::Runtime(handle), listener),
        None => spawn_guarded(Placement::Thread(&format!("{name}-events")), listener),
    };
    if let Err(err) = spawned {
        tracing::error!(worker = name, error = %err, "failed to spawn subscriber listener");
    }
}

fn drain(rx: &mut broadcast::Receiver<Event>, set: &SubscriberSet) {
    loop {
        match rx.try_recv() {
            Ok(ev) => set.emit_arc(Arc::new(ev)),
            Err(TryRecvError::Lagged(_)) => continue,
            Err(TryRecvError::Empty | TryRecvError::Closed) => break,
        }
    }
}
