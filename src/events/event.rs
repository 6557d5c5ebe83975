//! # Lifecycle events emitted by a worker controller.
//!
//! [`EventKind`] falls into three groups:
//! - **Run lifecycle**: starting, init/loop failures, graceful stop
//! - **Stop control**: stop requests, watchdog arming, forced termination
//! - **Subscriber health**: overflow and panics inside subscribers
//!
//! The [`Event`] struct carries additional metadata such as timestamps, worker
//! name, run id, delays and the final state of a terminated context.
//!
//! ## Ordering guarantees
//! `seq` is unique per process and strictly increasing, so events from the
//! caller, runner and watchdog contexts can be put back in order.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use loopvisor::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::WatchdogArmed)
//!     .with_worker("poller")
//!     .with_run(3)
//!     .with_timeout(Duration::from_millis(500));
//!
//! assert_eq!(ev.kind, EventKind::WatchdogArmed);
//! assert_eq!(ev.worker.as_deref(), Some("poller"));
//! assert_eq!(ev.timeout_ms, Some(500));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

use crate::error::Termination;

/// Process-wide event counter.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// What happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // subscriber health
    /// A subscriber panicked inside `on_event`.
    ///
    /// Sets:
    /// - `worker`: subscriber name
    /// - `reason`: panic info/message
    SubscriberPanicked,

    /// An event was dropped for one subscriber (queue full or closed).
    ///
    /// Sets:
    /// - `worker`: subscriber name
    /// - `reason`: reason string (e.g., "full", "closed")
    SubscriberOverflow,

    // run lifecycle
    /// A new execution context was created for a run.
    ///
    /// Sets:
    /// - `worker`: worker name
    /// - `run`: run id
    WorkerStarting,

    /// The init callback failed; the run never entered the loop.
    ///
    /// Sets:
    /// - `worker`, `run`
    /// - `reason`: failure message
    InitFailed,

    /// The loop body failed; the run is exiting.
    ///
    /// Sets:
    /// - `worker`, `run`
    /// - `iteration`: failing iteration (1-based)
    /// - `reason`: failure message
    LoopFailed,

    /// Extra delay was requested before the next iteration.
    ///
    /// Sets:
    /// - `worker`, `run`
    /// - `delay_ms`: delay added by this request (ms)
    DelayAdded,

    /// The runner observed the cleared run flag and exited by itself.
    ///
    /// Sets:
    /// - `worker`, `run`
    /// - `iteration`: number of completed iterations
    WorkerStopped,

    // stop control
    /// A stop was requested for the current run.
    ///
    /// Sets:
    /// - `worker`, `run`
    StopRequested,

    /// The stop watchdog was armed.
    ///
    /// Sets:
    /// - `worker`, `run`
    /// - `timeout_ms`: configured stop timeout (ms)
    WatchdogArmed,

    /// A still-active watchdog was cancelled because a newer one was armed.
    ///
    /// Sets:
    /// - `worker`, `run` (of the stale watchdog)
    WatchdogCancelled,

    /// The run was force-terminated.
    ///
    /// Sets:
    /// - `worker`, `run`
    /// - `reason`: cause (stop timeout / replaced)
    /// - `termination`: `Killed` or `Abandoned`
    /// - `timeout_ms`: stop timeout (only for watchdog escalation)
    ForcedTermination,
}

/// One lifecycle event of a controller.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Process-wide, strictly increasing.
    pub seq: u64,
    /// When the event was created.
    pub at: SystemTime,
    /// Kind of event.
    pub kind: EventKind,

    /// Name of the worker (or subscriber, for subscriber events).
    pub worker: Option<Arc<str>>,
    /// Run id the event belongs to.
    pub run: Option<u64>,
    /// Iteration number (1-based).
    pub iteration: Option<u64>,
    /// Requested delay in milliseconds (compact).
    pub delay_ms: Option<u32>,
    /// Stop timeout in milliseconds (compact).
    pub timeout_ms: Option<u32>,
    /// Failure message, force cause or overflow detail.
    pub reason: Option<Arc<str>>,
    /// Final state of a force-terminated context.
    pub termination: Option<Termination>,
}

impl Event {
    /// Stamps a new event with the next sequence number and the current time.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            worker: None,
            run: None,
            iteration: None,
            delay_ms: None,
            timeout_ms: None,
            reason: None,
            termination: None,
        }
    }

    /// Attaches a worker name.
    #[inline]
    pub fn with_worker(mut self, worker: impl Into<Arc<str>>) -> Self {
        self.worker = Some(worker.into());
        self
    }

    /// Attaches a run id.
    #[inline]
    pub fn with_run(mut self, run: u64) -> Self {
        self.run = Some(run);
        self
    }

    /// Attaches an iteration number.
    #[inline]
    pub fn with_iteration(mut self, iteration: u64) -> Self {
        self.iteration = Some(iteration);
        self
    }

    /// Attaches a delay (stored as milliseconds).
    #[inline]
    pub fn with_delay(mut self, d: Duration) -> Self {
        self.delay_ms = Some(compact_ms(d));
        self
    }

    /// Attaches a timeout (stored as milliseconds).
    #[inline]
    pub fn with_timeout(mut self, d: Duration) -> Self {
        self.timeout_ms = Some(compact_ms(d));
        self
    }

    /// Attaches a reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches the final state of a terminated context.
    #[inline]
    pub fn with_termination(mut self, termination: Termination) -> Self {
        self.termination = Some(termination);
        self
    }

    /// `SubscriberOverflow` for the named subscriber.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_worker(subscriber)
            .with_reason(format!("subscriber={subscriber} reason={reason}"))
    }

    /// `SubscriberPanicked` for the named subscriber.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_worker(subscriber)
            .with_reason(info)
    }

    /// Returns `true` for events that end a run (graceful or forced).
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.kind,
            EventKind::WorkerStopped | EventKind::ForcedTermination
        )
    }
}

fn compact_ms(d: Duration) -> u32 {
    d.as_millis().min(u128::from(u32::MAX)) as u32
}
