//! # Shared controller state.
//!
//! [`Shared`] is the single point of truth for one controller. It is owned by
//! the [`WorkerController`](crate::WorkerController) and referenced by the
//! runner, the watchdog and every [`LoopContext`](crate::LoopContext).
//!
//! ## Locking
//! - `state` is held only for read-modify-write, never across an `.await`
//! - the watch channel is updated while `state` is held, so waiters always
//!   observe transitions in lock order
//! - user callbacks are never invoked under the lock
//!
//! ## Status channel
//! ```text
//! RunStatus { run, running, settled }
//!   run/running  → updated on every isRunning transition (start, exit, force)
//!   settled      → highest run whose stopped callback has returned
//! ```

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::core::{Pacer, Phase, context::ContextHandle, panic_message};
use crate::events::{Bus, Event, EventKind};
use crate::tasks::{LoopTask, StopReport};

/// Snapshot published on every lifecycle transition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct RunStatus {
    pub(crate) run: u64,
    pub(crate) running: bool,
    pub(crate) settled: u64,
}

/// Mutable lifecycle state guarded by the controller lock.
pub(crate) struct State {
    /// Name used for the next run.
    pub(crate) name: Arc<str>,
    /// Name of the current (or last) run.
    pub(crate) run_name: Arc<str>,
    pub(crate) background: bool,
    pub(crate) stop_timeout: Duration,
    pub(crate) pacer: Pacer,

    pub(crate) run_requested: bool,
    pub(crate) is_running: bool,
    pub(crate) run_id: u64,
    pub(crate) phase: Option<Phase>,
    pub(crate) iterations: u64,

    pub(crate) token: CancellationToken,
    pub(crate) context: Option<ContextHandle>,
}

impl State {
    pub(crate) fn new(
        name: Arc<str>,
        background: bool,
        loop_interval: Duration,
        stop_timeout: Duration,
    ) -> Self {
        Self {
            run_name: Arc::clone(&name),
            name,
            background,
            stop_timeout,
            pacer: Pacer::new(loop_interval),
            run_requested: false,
            is_running: false,
            run_id: 0,
            phase: None,
            iterations: 0,
            token: CancellationToken::new(),
            context: None,
        }
    }

    /// `run` is alive and no stop was requested for it.
    #[inline]
    pub(crate) fn keeps(&self, run: u64) -> bool {
        self.is_current(run) && self.run_requested
    }

    /// `run` is the live run of this controller.
    #[inline]
    pub(crate) fn is_current(&self, run: u64) -> bool {
        self.run_id == run && self.is_running
    }
}

pub(crate) struct Shared {
    state: Mutex<State>,
    status: watch::Sender<RunStatus>,
    pub(crate) task: Arc<dyn LoopTask>,
    pub(crate) bus: Bus,
    listener_stop: CancellationToken,
}

impl Shared {
    pub(crate) fn new(
        state: State,
        task: Arc<dyn LoopTask>,
        bus: Bus,
        listener_stop: CancellationToken,
    ) -> Self {
        let (status, _rx) = watch::channel(RunStatus::default());
        Self {
            state: Mutex::new(state),
            status,
            task,
            bus,
            listener_stop,
        }
    }

    /// Locks the state, recovering from poisoning.
    ///
    /// The lock never guards user code, so a poisoned state is still consistent.
    pub(crate) fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn subscribe_status(&self) -> watch::Receiver<RunStatus> {
        self.status.subscribe()
    }

    /// Highest run whose stopped callback has returned.
    pub(crate) fn settled(&self) -> u64 {
        self.status.borrow().settled
    }

    /// Mirrors `run_id`/`is_running`; call with the lock held.
    pub(crate) fn publish_status(&self, st: &State) {
        self.status.send_modify(|s| {
            s.run = st.run_id;
            s.running = st.is_running;
        });
    }

    #[inline]
    pub(crate) fn publish(&self, ev: Event) {
        self.bus.publish(ev);
    }

    /// Ends `run` if it is still current; returns `true` for the caller that
    /// performed the transition.
    ///
    /// Exactly one of the graceful and the forced path wins this check, which
    /// is what makes the stopped callback fire once per run.
    pub(crate) fn finish(&self, st: &mut State, run: u64, phase: Phase) -> bool {
        if !st.is_current(run) {
            return false;
        }
        st.is_running = false;
        st.run_requested = false;
        st.pacer.reset();
        st.token.cancel();
        st.context = None;
        st.phase = Some(phase);
        self.publish_status(st);
        true
    }

    /// Adds `delay` to the pending delay of `run` (or of whatever run is
    /// current, for `None`). Ignored unless that run is alive and not stopping.
    pub(crate) fn add_delay(&self, run: Option<u64>, delay: Duration) {
        let mut st = self.lock();
        let run = run.unwrap_or(st.run_id);
        if !st.keeps(run) {
            return;
        }
        st.pacer.add(delay);
        self.publish(
            Event::new(EventKind::DelayAdded)
                .with_worker(Arc::clone(&st.run_name))
                .with_run(run)
                .with_delay(delay),
        );
    }

    /// Delivers the stopped callback for a run, then marks it settled.
    ///
    /// A panicking callback is logged and swallowed.
    pub(crate) fn report_stopped(&self, report: StopReport) {
        let run = report.run;
        let task = &self.task;
        if let Err(panic_err) = catch_unwind(AssertUnwindSafe(|| task.stopped(&report))) {
            tracing::error!(
                worker = %report.worker,
                run,
                panic = %panic_message(&*panic_err),
                "stopped callback panicked"
            );
        }
        self.status.send_modify(|s| s.settled = s.settled.max(run));
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        self.listener_stop.cancel();
    }
}
