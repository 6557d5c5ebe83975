//! # WorkerController: start/stop control over one recurring task.
//!
//! The controller owns the lifecycle state of a single [`LoopTask`] and
//! coordinates the [`LoopRunner`], the watchdog and the callers.
//!
//! ## Architecture
//! ```text
//!   callers ──► WorkerController ──► Shared { Mutex<State>, watch<RunStatus>, Bus }
//!                    │                     ▲              ▲
//!                    │ start               │              │
//!                    ├──► spawn_context ──► LoopRunner ───┘
//!                    │ stop (timeout > 0)  │
//!                    └──► watchdog ────────┘ force_terminate
//! ```
//!
//! ## Rules
//! - `run_requested` goes false → true only in `start`, true → false in `stop`,
//!   on runner exit, and on forced termination
//! - at most one execution context is alive per controller; a new one is
//!   launched only after the previous run's stopped callback has returned
//! - the state lock is never held across an `.await`, nor while a thread or
//!   runtime is being created
//! - waiting is done on the status watch channel, never by polling

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::{broadcast, oneshot};
use tokio_util::sync::CancellationToken;

use crate::core::context::{Placement, spawn_context};
use crate::core::runner::LoopRunner;
use crate::core::watchdog::{self, WatchdogHandle};
use crate::core::{Phase, Shared, WorkerControllerBuilder};
use crate::error::{ConfigError, ForceCause, WorkerError, duration_from_ms};
use crate::events::{Event, EventKind};
use crate::tasks::LoopTask;
use crate::WorkerConfig;

/// What `start` does with a run that is still shutting down.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PreviousRun {
    /// Wait until the previous context has fully exited.
    #[default]
    Wait,
    /// Force-terminate the previous context immediately (reported as
    /// [`ForceCause::Replaced`]).
    Abort,
}

/// # Managed worker loop.
///
/// Runs one [`LoopTask`] on its own execution context, with explicit start
/// and stop control, pacing and a stop watchdog.
///
/// # Example
/// ```rust,no_run
/// use std::time::Duration;
/// use loopvisor::{LoopContext, LoopError, LoopFn, WorkerConfig, WorkerController};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let cfg = WorkerConfig::new("poller").with_loop_interval(Duration::from_millis(100));
///     let worker = WorkerController::new(
///         cfg,
///         LoopFn::new(|ctx: LoopContext| async move {
///             println!("iteration {}", ctx.iteration());
///             Ok::<_, LoopError>(())
///         }),
///     );
///
///     worker.start().await?;
///     tokio::time::sleep(Duration::from_secs(1)).await;
///     worker.stop_and_wait().await;
///     assert!(!worker.is_running());
///     Ok(())
/// }
/// ```
pub struct WorkerController {
    shared: Arc<Shared>,
    watchdog: Mutex<Option<WatchdogHandle>>,
    home: Option<Handle>,
}

impl WorkerController {
    /// Creates a controller without subscribers.
    pub fn new<T: LoopTask>(cfg: WorkerConfig, task: T) -> Self {
        WorkerControllerBuilder::new(cfg).build(task)
    }

    /// Returns a builder for configuring subscribers.
    pub fn builder(cfg: WorkerConfig) -> WorkerControllerBuilder {
        WorkerControllerBuilder::new(cfg)
    }

    pub(crate) fn new_internal(shared: Arc<Shared>, home: Option<Handle>) -> Self {
        Self {
            shared,
            watchdog: Mutex::new(None),
            home,
        }
    }

    /// Starts a run, waiting for a previous one to exit first.
    ///
    /// No-op if a run is already requested.
    pub async fn start(&self) -> Result<(), WorkerError> {
        self.start_with(PreviousRun::Wait).await
    }

    /// Starts a run, handling a still-exiting previous run as `previous` says.
    ///
    /// No-op if a run is already requested. A previous run counts as exited
    /// once its stopped callback has returned. After a successful return
    /// [`is_running`](Self::is_running) is `true` until a stop takes effect.
    /// Must not be awaited from inside the stopped callback.
    pub async fn start_with(&self, previous: PreviousRun) -> Result<(), WorkerError> {
        loop {
            let (pending, running) = {
                let st = self.shared.lock();
                if st.run_requested {
                    return Ok(());
                }
                (st.run_id, st.is_running)
            };

            if !running && self.shared.settled() >= pending {
                if self.launch(pending)? {
                    return Ok(());
                }
                continue;
            }

            match previous {
                PreviousRun::Abort if running => {
                    watchdog::force_terminate(&self.shared, pending, ForceCause::Replaced).await;
                }
                _ => {
                    let mut rx = self.shared.subscribe_status();
                    let _ = rx
                        .wait_for(|s| s.run != pending || (!s.running && s.settled >= pending))
                        .await;
                }
            }
        }
    }

    /// Spawns the run after `prev` and installs it; `false` if another
    /// caller changed the state while the context was being created.
    fn launch(&self, prev: u64) -> Result<bool, WorkerError> {
        let (name, background) = {
            let st = self.shared.lock();
            (Arc::clone(&st.name), st.background)
        };
        let run = prev + 1;
        let token = CancellationToken::new();
        let runner = LoopRunner::new(
            Arc::clone(&self.shared),
            run,
            token.clone(),
            Arc::clone(&name),
        );

        let home = if background {
            self.home.clone().or_else(|| Handle::try_current().ok())
        } else {
            None
        };
        let placement = match &home {
            Some(handle) => Placement::Runtime(handle),
            None => Placement::Thread(&name),
        };
        // the runner stays parked until the run is installed
        let (release, gate) = oneshot::channel::<()>();
        let context = spawn_context(placement, async move {
            if gate.await.is_ok() {
                runner.run().await;
            }
        })
        .map_err(|source| WorkerError::Spawn {
            name: name.to_string(),
            source,
        })?;

        let mut st = self.shared.lock();
        if st.run_requested || st.is_running || st.run_id != prev {
            return Ok(false);
        }
        st.run_id = run;
        st.run_name = Arc::clone(&name);
        st.run_requested = true;
        st.is_running = true;
        st.token = token;
        st.pacer.reset();
        st.iterations = 0;
        st.phase = Some(Phase::Created);
        st.context = Some(context);
        self.shared.publish_status(&st);

        tracing::debug!(worker = %name, run, background = home.is_some(), "starting");
        self.shared.publish(
            Event::new(EventKind::WorkerStarting)
                .with_worker(name)
                .with_run(run),
        );
        let _ = release.send(());
        Ok(true)
    }

    /// Requests the current run to stop and returns immediately.
    ///
    /// No-op if no run is requested. Drops any pending delay, cancels the
    /// run's token and, if a stop timeout is configured, arms the watchdog.
    /// Safe to call from inside the loop body.
    pub fn stop(&self) {
        let Some((run, timeout)) = self.request_stop() else {
            return;
        };
        let Some(timeout) = timeout else {
            return;
        };
        if let Err(err) = watchdog::arm(&self.watchdog, &self.shared, self.home.as_ref(), run, timeout) {
            tracing::error!(run, error = %err, "failed to arm stop watchdog");
        }
    }

    fn request_stop(&self) -> Option<(u64, Option<Duration>)> {
        let mut st = self.shared.lock();
        if !st.run_requested {
            return None;
        }
        st.run_requested = false;
        st.pacer.reset();
        st.token.cancel();

        tracing::debug!(worker = %st.run_name, run = st.run_id, "stop requested");
        self.shared.publish(
            Event::new(EventKind::StopRequested)
                .with_worker(Arc::clone(&st.run_name))
                .with_run(st.run_id),
        );
        let timeout = Some(st.stop_timeout).filter(|d| !d.is_zero());
        Some((st.run_id, timeout))
    }

    /// Requests a stop and waits until the run has ended.
    ///
    /// Returns once `is_running()` is `false` and the run's stopped callback
    /// has returned. Graceful and forced exits are only told apart through
    /// [`StopReport::forced`](crate::StopReport::forced). Must not be awaited
    /// from inside the loop body.
    pub async fn stop_and_wait(&self) {
        self.stop();
        self.wait_stopped().await;
    }

    /// Waits until the current (or last) run has ended and has been reported.
    ///
    /// Returns immediately if no run was ever started.
    pub async fn wait_stopped(&self) {
        let run = self.shared.lock().run_id;
        if run == 0 {
            return;
        }
        let mut rx = self.shared.subscribe_status();
        let _ = rx.wait_for(|s| s.settled >= run).await;
    }

    /// Returns `true` while an execution context of this controller is alive.
    ///
    /// The value may change right after it is returned.
    pub fn is_running(&self) -> bool {
        self.shared.lock().is_running
    }

    /// Returns `true` while a run is alive and no stop was requested.
    pub fn keep_running(&self) -> bool {
        let st = self.shared.lock();
        st.keeps(st.run_id)
    }

    /// Adds extra delay before the next iteration of the current run.
    ///
    /// No-op unless the controller is running and not stopping.
    pub fn add_delay(&self, delay: Duration) {
        self.shared.add_delay(None, delay);
    }

    /// Signed-millisecond variant of [`add_delay`](Self::add_delay).
    pub fn add_delay_ms(&self, ms: i64) -> Result<(), ConfigError> {
        self.add_delay(duration_from_ms("delay", ms)?);
        Ok(())
    }

    /// Fixed pacing between iterations (`0s` = none).
    pub fn loop_interval(&self) -> Duration {
        self.shared.lock().pacer.interval()
    }

    /// Loop interval in milliseconds.
    pub fn loop_interval_ms(&self) -> u64 {
        u64::try_from(self.loop_interval().as_millis()).unwrap_or(u64::MAX)
    }

    /// Changes the loop interval; applies from the next iteration on.
    pub fn set_loop_interval(&self, interval: Duration) {
        self.shared.lock().pacer.set_interval(interval);
    }

    /// Sets the loop interval from signed milliseconds.
    ///
    /// # Errors
    /// [`ConfigError::Negative`] for negative values; the previous interval is kept.
    ///
    /// # Example
    /// ```
    /// use loopvisor::{LoopContext, LoopError, LoopFn, WorkerConfig, WorkerController};
    ///
    /// # #[tokio::main(flavor = "current_thread")]
    /// # async fn main() {
    /// let worker = WorkerController::new(
    ///     WorkerConfig::new("pacing"),
    ///     LoopFn::new(|_ctx: LoopContext| async { Ok::<_, LoopError>(()) }),
    /// );
    /// worker.set_loop_interval_ms(250).unwrap();
    /// assert!(worker.set_loop_interval_ms(-1).is_err());
    /// assert_eq!(worker.loop_interval_ms(), 250);
    /// # }
    /// ```
    pub fn set_loop_interval_ms(&self, ms: i64) -> Result<(), ConfigError> {
        self.set_loop_interval(duration_from_ms("loop_interval", ms)?);
        Ok(())
    }

    /// Grace after `stop()` before forced termination (`0s` = never force).
    pub fn stop_timeout(&self) -> Duration {
        self.shared.lock().stop_timeout
    }

    /// Changes the stop timeout; applies to the next `stop()`.
    pub fn set_stop_timeout(&self, timeout: Duration) {
        self.shared.lock().stop_timeout = timeout;
    }

    /// Sets the stop timeout from signed milliseconds.
    ///
    /// # Errors
    /// [`ConfigError::Negative`] for negative values; the previous timeout is kept.
    pub fn set_stop_timeout_ms(&self, ms: i64) -> Result<(), ConfigError> {
        self.set_stop_timeout(duration_from_ms("stop_timeout", ms)?);
        Ok(())
    }

    /// Name used for the next run's execution context.
    pub fn name(&self) -> String {
        self.shared.lock().name.to_string()
    }

    /// Renames the worker; applies from the next `start`.
    pub fn set_name(&self, name: impl Into<String>) {
        let name: String = name.into();
        self.shared.lock().name = Arc::from(name);
    }

    /// Whether the next run is placed on the home runtime instead of a thread.
    pub fn is_background(&self) -> bool {
        self.shared.lock().background
    }

    /// Changes run placement; applies from the next `start`.
    pub fn set_background(&self, background: bool) {
        self.shared.lock().background = background;
    }

    /// Phase of the current (or last) run; `None` before the first start.
    pub fn phase(&self) -> Option<Phase> {
        self.shared.lock().phase
    }

    /// Id of the current (or last) run; `0` before the first start.
    pub fn run_id(&self) -> u64 {
        self.shared.lock().run_id
    }

    /// Subscribes to the controller's event bus.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.shared.bus.subscribe()
    }
}

impl Drop for WorkerController {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for WorkerController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let st = self.shared.lock();
        f.debug_struct("WorkerController")
            .field("name", &st.name)
            .field("run", &st.run_id)
            .field("running", &st.is_running)
            .field("run_requested", &st.run_requested)
            .field("phase", &st.phase)
            .finish()
    }
}
