//! # Per-callback loop context.
//!
//! [`LoopContext`] is handed to every [`LoopTask`](crate::LoopTask) callback.
//! It scopes all operations to the run it was created for: once that run has
//! ended, [`add_delay`](LoopContext::add_delay) is a no-op and
//! [`keep_running`](LoopContext::keep_running) reports `false`, even if the
//! controller has meanwhile started a new run.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

use crate::core::Shared;

/// Handle passed to loop callbacks.
#[derive(Clone)]
pub struct LoopContext {
    shared: Arc<Shared>,
    token: CancellationToken,
    name: Arc<str>,
    run: u64,
    iteration: u64,
}

impl LoopContext {
    pub(crate) fn new(
        shared: Arc<Shared>,
        token: CancellationToken,
        name: Arc<str>,
        run: u64,
        iteration: u64,
    ) -> Self {
        Self {
            shared,
            token,
            name,
            run,
            iteration,
        }
    }

    /// Worker name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run id (1-based, increments on every start).
    pub fn run(&self) -> u64 {
        self.run
    }

    /// Iteration number (1-based); `0` inside the init callback.
    pub fn iteration(&self) -> u64 {
        self.iteration
    }

    /// The run's cancellation token, cancelled when a stop is requested.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Returns `true` once a stop was requested for this run.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Completes when a stop is requested for this run.
    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.token.cancelled()
    }

    /// Returns `true` while this run is current and no stop was requested.
    pub fn keep_running(&self) -> bool {
        self.shared.lock().keeps(self.run)
    }

    /// Requests an extra pause before the next invocation of the loop body.
    ///
    /// Delays accumulate and are dropped by a stop request.
    pub fn add_delay(&self, delay: Duration) {
        self.shared.add_delay(Some(self.run), delay);
    }
}

impl std::fmt::Debug for LoopContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoopContext")
            .field("name", &self.name)
            .field("run", &self.run)
            .field("iteration", &self.iteration)
            .field("cancelled", &self.token.is_cancelled())
            .finish()
    }
}
