//! # Loop runner: one run of the recurring task.
//!
//! [`LoopRunner`] is the future executed on a run's execution context. It
//! walks the run through its phases and publishes lifecycle events to the bus.
//!
//! ## State machine
//!
//! ```text
//! Created ──► Initializing ──► Looping ──► Exiting ──► Terminated
//!                  │                          ▲
//!                  └── init failed / canceled ┘
//!
//! any phase ──(forced termination)──► Terminated
//! ```
//!
//! ## Loop
//!
//! ```text
//! loop {
//!   lock: keeps(run)? ─ no ─► exit
//!         pacer.next(5ms)
//!   Wait(d)   → sleep(d) or token.cancelled(), then re-check
//!   Invoke    → tick(ctx)
//!                 Ok            → continue
//!                 Err(Canceled) → exit (graceful)
//!                 Err(Fail)     → LoopFailed, exit
//!                 panic         → LoopFailed, exit
//! }
//! ```
//!
//! ## Rules
//! - The body is never retried; a failure ends the run
//! - The exit path publishes `WorkerStopped` and calls `stopped` only if it
//!   wins the `is_running` check-and-set against forced termination
//! - `Canceled` from init or tick is a graceful exit, not a failure

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio_util::sync::CancellationToken;

use crate::core::pacer::Pace;
use crate::core::{PACING_QUANTUM, Shared, panic_message};
use crate::error::{CallbackError, CallbackPhase, LoopError, StopError};
use crate::events::{Event, EventKind};
use crate::tasks::{LoopContext, StopReport};

/// Lifecycle phase of the current (or last) run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// The execution context exists but has not been polled yet.
    Created,
    /// The init callback is running.
    Initializing,
    /// The loop body is being invoked repeatedly.
    Looping,
    /// The run has ended; the stopped callback is being delivered.
    Exiting,
    /// The run is over.
    Terminated,
}

impl Phase {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            Phase::Created => "created",
            Phase::Initializing => "initializing",
            Phase::Looping => "looping",
            Phase::Exiting => "exiting",
            Phase::Terminated => "terminated",
        }
    }
}

/// How a callback invocation ended.
enum Outcome {
    Continue,
    Graceful,
    Failed(CallbackError),
}

pub(crate) struct LoopRunner {
    shared: Arc<Shared>,
    run: u64,
    token: CancellationToken,
    name: Arc<str>,
}

impl LoopRunner {
    pub(crate) fn new(
        shared: Arc<Shared>,
        run: u64,
        token: CancellationToken,
        name: Arc<str>,
    ) -> Self {
        Self {
            shared,
            run,
            token,
            name,
        }
    }

    pub(crate) async fn run(self) {
        if !self.enter(Phase::Initializing) {
            return;
        }
        tracing::debug!(worker = %self.name, run = self.run, "initializing");

        let init = AssertUnwindSafe(self.shared.task.init(self.context(0)))
            .catch_unwind()
            .await;
        match classify(init, CallbackPhase::Init, 0) {
            Outcome::Continue => {}
            Outcome::Graceful => return self.exit(None, 0),
            Outcome::Failed(err) => {
                self.publish_failure(EventKind::InitFailed, &err, None);
                return self.exit(Some(err), 0);
            }
        }

        if !self.enter(Phase::Looping) {
            return;
        }
        let mut iteration = 0;
        let failure = loop {
            let pace = {
                let mut st = self.shared.lock();
                if !st.keeps(self.run) {
                    break None;
                }
                st.pacer.next(PACING_QUANTUM)
            };

            if let Pace::Wait(step) = pace {
                tokio::select! {
                    _ = tokio::time::sleep(step) => {}
                    _ = self.token.cancelled() => {}
                }
                continue;
            }

            iteration += 1;
            {
                let mut st = self.shared.lock();
                if st.is_current(self.run) {
                    st.iterations = iteration;
                }
            }

            let tick = AssertUnwindSafe(self.shared.task.tick(self.context(iteration)))
                .catch_unwind()
                .await;
            match classify(tick, CallbackPhase::Loop, iteration) {
                Outcome::Continue => {}
                Outcome::Graceful => break None,
                Outcome::Failed(err) => {
                    self.publish_failure(EventKind::LoopFailed, &err, Some(iteration));
                    break Some(err);
                }
            }
            // keeps a zero-interval loop abortable
            tokio::task::consume_budget().await;
        };
        self.exit(failure, iteration);
    }

    fn context(&self, iteration: u64) -> LoopContext {
        LoopContext::new(
            Arc::clone(&self.shared),
            self.token.clone(),
            Arc::clone(&self.name),
            self.run,
            iteration,
        )
    }

    /// Moves the run to `phase`; `false` if the run is no longer current.
    fn enter(&self, phase: Phase) -> bool {
        let mut st = self.shared.lock();
        if !st.is_current(self.run) {
            return false;
        }
        st.phase = Some(phase);
        true
    }

    fn publish_failure(&self, kind: EventKind, err: &CallbackError, iteration: Option<u64>) {
        tracing::warn!(worker = %self.name, run = self.run, error = %err, "callback failed");
        let mut ev = Event::new(kind)
            .with_worker(Arc::clone(&self.name))
            .with_run(self.run)
            .with_reason(err.to_string());
        if let Some(iteration) = iteration {
            ev = ev.with_iteration(iteration);
        }
        self.shared.publish(ev);
    }

    fn exit(self, failure: Option<CallbackError>, iterations: u64) {
        let won = {
            let mut st = self.shared.lock();
            self.shared.finish(&mut st, self.run, Phase::Exiting)
        };
        if !won {
            return;
        }
        tracing::debug!(worker = %self.name, run = self.run, iterations, "exited");
        self.shared.publish(
            Event::new(EventKind::WorkerStopped)
                .with_worker(Arc::clone(&self.name))
                .with_run(self.run)
                .with_iteration(iterations),
        );

        self.shared.report_stopped(StopReport {
            worker: Arc::clone(&self.name),
            run: self.run,
            forced: false,
            iterations,
            error: failure.map(StopError::Callback),
        });

        let mut st = self.shared.lock();
        if st.run_id == self.run {
            st.phase = Some(Phase::Terminated);
        }
    }
}

fn classify(
    res: Result<Result<(), LoopError>, Box<dyn std::any::Any + Send>>,
    during: CallbackPhase,
    iteration: u64,
) -> Outcome {
    match res {
        Ok(Ok(())) => Outcome::Continue,
        Ok(Err(LoopError::Canceled)) => Outcome::Graceful,
        Ok(Err(LoopError::Fail { error })) => Outcome::Failed(match during {
            CallbackPhase::Init => CallbackError::Init { error },
            CallbackPhase::Loop => CallbackError::Loop { iteration, error },
        }),
        Err(panic_err) => Outcome::Failed(CallbackError::Panicked {
            during,
            message: panic_message(&*panic_err),
        }),
    }
}
