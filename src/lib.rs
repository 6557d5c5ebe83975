//! # loopvisor
//!
//! **Loopvisor** is a managed worker-loop controller for Rust.
//!
//! It runs one user-supplied recurring task on a dedicated execution context,
//! with explicit start/stop control, cooperative pacing (a fixed interval or
//! ad-hoc extra delay) and a watchdog that escalates to forced termination if
//! the task does not yield within a configured stop timeout.
//!
//! It is not a thread pool, nor a scheduler serving many jobs: exactly one
//! logical task per controller, never retried.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!            callers (start / stop / add_delay / is_running)
//!                              │
//!                              ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  WorkerController (single point of truth)                         │
//! │  - Mutex<State>  run_requested, is_running, run id, Pacer         │
//! │  - watch<RunStatus>  signalled on every is_running transition     │
//! │  - Mutex<Option<WatchdogHandle>>  at most one active watchdog     │
//! └──────┬───────────────────────────────────┬────────────────────────┘
//!        │ start                             │ stop (stop_timeout > 0)
//!        ▼                                   ▼
//! ┌──────────────────────┐          ┌──────────────────────┐
//! │  LoopRunner          │          │  Watchdog            │
//! │  thread / home task  │◄─ abort ─│  polls every 10ms    │
//! │  init → tick* → exit │          │  force on timeout    │
//! └──────┬───────────────┘          └──────┬───────────────┘
//!        │ Publishes                       │ Publishes
//!        │ - WorkerStarting                │ - WatchdogArmed
//!        │ - InitFailed / LoopFailed       │ - ForcedTermination
//!        │ - WorkerStopped                 │
//!        ▼                                 ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                        Bus (broadcast channel)                    │
//! │                (capacity: WorkerConfig::bus_capacity)             │
//! └─────────────────────────────────┬─────────────────────────────────┘
//!                                   ▼
//!                       ┌────────────────────────┐
//!                       │  subscriber listener   │
//!                       └───────────┬────────────┘
//!                                   ▼
//!                             SubscriberSet
//!                            (per-sub queues)
//!                         ┌─────────┼─────────┐
//!                         ▼         ▼         ▼
//!                      sub1.on   sub2.on   subN.on
//!                      _event()  _event()  _event()
//! ```
//!
//! ### Lifecycle
//! ```text
//! start() ──► spawn LoopRunner ──► init(ctx)
//!                                    │ Err/panic ─► InitFailed ─► exit
//!                                    ▼
//! loop while run_requested {
//!   ├─► pending delay?  wait 5ms (interrupted by stop), re-check
//!   ├─► interval > 0?   schedule it as the next delay
//!   └─► tick(ctx)
//!         ├─ Ok             ─► continue
//!         ├─ Err(Canceled)  ─► exit (graceful)
//!         └─ Err / panic    ─► LoopFailed, exit
//! }
//! exit: is_running = false ─► WorkerStopped ─► stopped(forced = false)
//!
//! stop() ──► run_requested = false, delay dropped, token cancelled
//!        └─► stop_timeout > 0: arm watchdog
//!              timeout elapsed, still running:
//!                abort ─► is_running = false ─► ForcedTermination ─► stopped(forced = true)
//! ```
//!
//! ## Features
//! | Area              | Description                                                  | Key types / traits                          |
//! |-------------------|--------------------------------------------------------------|---------------------------------------------|
//! | **Control**       | Start/stop a recurring task, pacing, stop watchdog.          | [`WorkerController`], [`PreviousRun`]       |
//! | **Tasks**         | Define the recurring work as a trait impl or closures.       | [`LoopTask`], [`LoopFn`], [`LoopContext`]   |
//! | **Outcome**       | Exactly one report per run, graceful or forced.              | [`StopReport`], [`StopError`]               |
//! | **Subscriber API**| Hook into lifecycle events (logging, alerting).              | [`Subscribe`], [`Event`]                    |
//! | **Errors**        | Typed errors for configuration, callbacks and termination.   | [`ConfigError`], [`CallbackError`]          |
//! | **Configuration** | Construction-time settings.                                  | [`WorkerConfig`]                            |
//!
//! ## Optional features
//! - `logging`: exports a simple built-in [`LogWriter`] _(demo/reference only)_.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicU64, Ordering};
//! use std::time::Duration;
//! use loopvisor::{LoopContext, LoopError, LoopFn, WorkerConfig, WorkerController};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let cfg = WorkerConfig::new("counter").with_loop_interval(Duration::from_millis(10));
//!
//!     // Build subscribers (optional)
//!     #[cfg(feature = "logging")]
//!     let subs: Vec<Arc<dyn loopvisor::Subscribe>> = vec![Arc::new(loopvisor::LogWriter)];
//!     #[cfg(not(feature = "logging"))]
//!     let subs: Vec<Arc<dyn loopvisor::Subscribe>> = Vec::new();
//!
//!     let counter = Arc::new(AtomicU64::new(0));
//!     let body = {
//!         let counter = Arc::clone(&counter);
//!         LoopFn::new(move |_ctx: LoopContext| {
//!             let counter = Arc::clone(&counter);
//!             async move {
//!                 counter.fetch_add(1, Ordering::Relaxed);
//!                 Ok::<_, LoopError>(())
//!             }
//!         })
//!     };
//!
//!     let worker = WorkerController::builder(cfg)
//!         .with_subscribers(subs)
//!         .build(body);
//!
//!     worker.start().await?;
//!     tokio::time::sleep(Duration::from_millis(50)).await;
//!     worker.stop_and_wait().await;
//!
//!     assert!(!worker.is_running());
//!     assert!(counter.load(Ordering::Relaxed) > 0);
//!     Ok(())
//! }
//! ```
mod core;
mod error;
mod events;
mod subscribers;
mod tasks;

// ---- Public re-exports ----

pub use core::{Phase, PreviousRun, WorkerConfig, WorkerController, WorkerControllerBuilder};
pub use error::{
    CallbackError, CallbackPhase, ConfigError, ForceCause, ForcedTermination, LoopError, StopError,
    Termination, WorkerError,
};
pub use events::{Event, EventKind};
pub use subscribers::Subscribe;
pub use tasks::{BoxLoopFuture, LoopContext, LoopFn, LoopTask, StopReport};

// Optional: expose a simple built-in logger subscriber (demo/reference).
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
