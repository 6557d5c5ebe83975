//! Runtime core: controller, runner, watchdog and pacing.
//!
//! The public API from this module is [`WorkerController`] (with its builder
//! and [`WorkerConfig`]), plus the [`Phase`] and [`PreviousRun`] enums.
//!
//! Internal modules:
//! - [`controller`]: public state holder, start/stop coordination;
//! - [`runner`]: one run of the task through its phases;
//! - [`watchdog`]: stop timeout polling and forced termination;
//! - [`pacer`]: interval and extra-delay bookkeeping;
//! - [`context`]: thread / runtime placement of execution contexts;
//! - [`state`]: lock-guarded state shared by all of the above.

mod builder;
mod config;
mod context;
mod controller;
mod pacer;
mod runner;
mod state;
mod watchdog;

use std::any::Any;
use std::time::Duration;

pub use builder::WorkerControllerBuilder;
pub use config::WorkerConfig;
pub use controller::{PreviousRun, WorkerController};
pub use runner::Phase;

pub(crate) use pacer::Pacer;
pub(crate) use state::Shared;

/// Granularity of pacing waits; a stop request interrupts a wait early.
pub(crate) const PACING_QUANTUM: Duration = Duration::from_millis(5);

/// Poll period of the stop watchdog; also the grace for confirming a kill.
pub(crate) const WATCHDOG_QUANTUM: Duration = Duration::from_millis(10);

/// Extracts a readable message from a panic payload.
pub(crate) fn panic_message(any: &(dyn Any + Send)) -> String {
    if let Some(s) = any.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = any.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
