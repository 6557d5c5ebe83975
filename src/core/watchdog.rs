//! # Stop watchdog and forced termination.
//!
//! Armed by [`WorkerController::stop`](crate::WorkerController::stop) when a
//! nonzero stop timeout is configured. The watchdog polls the run every
//! [`WATCHDOG_QUANTUM`] and escalates once the timeout has elapsed.
//!
//! ```text
//! arm(run, timeout)
//!   ├─ stale watchdog still active? → cancel it, WatchdogCancelled
//!   ├─ spawn on home runtime (or "{name}-watchdog" thread)
//!   └─ WatchdogArmed
//!
//! every 10ms until deadline:
//!   run no longer current → exit, no action
//! deadline reached:
//!   force_terminate(run, StopTimeout)
//!     lock:    is_current? → abort context, finish(Terminated)
//!     unlock:  confirm exit within one quantum → Killed | Abandoned
//!              ForcedTermination event, stopped(forced = true)
//! ```
//!
//! Forced termination drops the runner at its next yield point. A body that
//! blocks its thread without yielding keeps running on a detached context and
//! is reported as [`Termination::Abandoned`].

use std::io;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::core::context::{Placement, spawn_guarded};
use crate::core::{Phase, Shared, WATCHDOG_QUANTUM};
use crate::error::{ForceCause, ForcedTermination, StopError, Termination};
use crate::events::{Event, EventKind};
use crate::tasks::StopReport;

/// Handle of the active watchdog.
pub(crate) struct WatchdogHandle {
    run: u64,
    cancel: CancellationToken,
    done: CancellationToken,
}

/// Arms a watchdog for `run`, replacing any previous one.
pub(crate) fn arm(
    slot: &Mutex<Option<WatchdogHandle>>,
    shared: &Arc<Shared>,
    home: Option<&Handle>,
    run: u64,
    timeout: Duration,
) -> io::Result<()> {
    let name = Arc::clone(&shared.lock().run_name);
    let mut slot = slot.lock().unwrap_or_else(PoisonError::into_inner);

    let stale = slot.take().filter(|stale| !stale.done.is_cancelled());
    if let Some(stale) = stale {
        stale.cancel.cancel();
        tracing::debug!(worker = %name, run = stale.run, "stale watchdog cancelled");
        shared.publish(
            Event::new(EventKind::WatchdogCancelled)
                .with_worker(Arc::clone(&name))
                .with_run(stale.run),
        );
    }

    let cancel = CancellationToken::new();
    let fut = watch(Arc::clone(shared), run, timeout, cancel.clone());
    let done = match home {
        Some(handle) => spawn_guarded(Placement::Runtime(handle), fut)?,
        None => {
            let thread = format!("{name}-watchdog");
            spawn_guarded(Placement::Thread(&thread), fut)?
        }
    };
    *slot = Some(WatchdogHandle { run, cancel, done });

    shared.publish(
        Event::new(EventKind::WatchdogArmed)
            .with_worker(name)
            .with_run(run)
            .with_timeout(timeout),
    );
    Ok(())
}

async fn watch(shared: Arc<Shared>, run: u64, timeout: Duration, cancel: CancellationToken) {
    let deadline = Instant::now() + timeout;
    let mut poll = tokio::time::interval(WATCHDOG_QUANTUM);
    poll.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            _ = poll.tick() => {}
        }
        if !shared.lock().is_current(run) {
            return;
        }
        if Instant::now() >= deadline {
            break;
        }
    }
    force_terminate(&shared, run, ForceCause::StopTimeout { timeout }).await;
}

/// Forcibly ends `run`; returns `false` if it had already ended.
pub(crate) async fn force_terminate(shared: &Shared, run: u64, cause: ForceCause) -> bool {
    let (context, name, iterations) = {
        let mut st = shared.lock();
        if !st.is_current(run) {
            return false;
        }
        let context = st.context.take();
        if let Some(context) = &context {
            context.abort();
        }
        let name = Arc::clone(&st.run_name);
        let iterations = st.iterations;
        shared.finish(&mut st, run, Phase::Terminated);
        (context, name, iterations)
    };

    let state = match &context {
        Some(context) => context.confirm_exit(WATCHDOG_QUANTUM).await,
        None => Termination::Abandoned,
    };
    tracing::warn!(worker = %name, run, %cause, termination = %state, "forced termination");

    let mut ev = Event::new(EventKind::ForcedTermination)
        .with_worker(Arc::clone(&name))
        .with_run(run)
        .with_iteration(iterations)
        .with_reason(cause.to_string())
        .with_termination(state);
    if let ForceCause::StopTimeout { timeout } = cause {
        ev = ev.with_timeout(timeout);
    }
    shared.publish(ev);

    shared.report_stopped(StopReport {
        worker: name,
        run,
        forced: true,
        iterations,
        error: Some(StopError::Forced(ForcedTermination { cause, state })),
    });
    true
}
