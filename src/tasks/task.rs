//! # Loop task abstraction.
//!
//! This module defines the [`LoopTask`] trait: the capability interface a
//! [`WorkerController`](crate::WorkerController) drives. The closure-backed
//! implementation lives in [`LoopFn`](crate::LoopFn).
//!
//! Each callback receives a [`LoopContext`] carrying the run's
//! [`CancellationToken`](tokio_util::sync::CancellationToken); long iterations
//! should check it so a stop request is honoured before the watchdog fires.

use async_trait::async_trait;

use crate::error::LoopError;
use crate::tasks::{LoopContext, StopReport};

/// # Recurring, cancelable unit of work.
///
/// # Example
/// ```
/// use async_trait::async_trait;
/// use loopvisor::{LoopContext, LoopError, LoopTask, StopReport};
///
/// struct Heartbeat;
///
/// #[async_trait]
/// impl LoopTask for Heartbeat {
///     async fn tick(&self, ctx: LoopContext) -> Result<(), LoopError> {
///         if ctx.is_cancelled() {
///             return Err(LoopError::Canceled);
///         }
///         // send heartbeat...
///         Ok(())
///     }
///
///     fn stopped(&self, report: &StopReport) {
///         if report.forced {
///             eprintln!("heartbeat had to be killed: {:?}", report.error);
///         }
///     }
/// }
/// ```
#[async_trait]
pub trait LoopTask: Send + Sync + 'static {
    /// Called once per run, before the first iteration.
    ///
    /// An error here ends the run without entering the loop.
    async fn init(&self, _ctx: LoopContext) -> Result<(), LoopError> {
        Ok(())
    }

    /// Called once per iteration.
    ///
    /// `Err(LoopError::Canceled)` ends the run gracefully; any other error ends
    /// it and is reported through [`stopped`](Self::stopped).
    async fn tick(&self, ctx: LoopContext) -> Result<(), LoopError>;

    /// Called exactly once per run, after it ended.
    ///
    /// Runs on the runner's context for a graceful exit and on the watchdog's
    /// (or the restarting caller's) context for a forced one. Must not block.
    fn stopped(&self, _report: &StopReport) {}
}
