//! Error types used by the worker controller and by loop callbacks.
//!
//! This module defines:
//!
//! - [`ConfigError`]: an invalid setting was supplied (reported synchronously).
//! - [`LoopError`]: returned by user callbacks ([`LoopTask::init`](crate::LoopTask::init),
//!   [`LoopTask::tick`](crate::LoopTask::tick)).
//! - [`CallbackError`]: a callback failed or panicked; delivered through
//!   [`StopReport`](crate::StopReport).
//! - [`ForcedTermination`]: the run had to be force-terminated; delivered through
//!   [`StopReport`](crate::StopReport) together with `forced = true`.
//! - [`WorkerError`]: synchronous failures of [`WorkerController::start`](crate::WorkerController::start).
//!
//! Most types provide `as_label` / `as_message` helpers for logs and metrics.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// # Invalid configuration value.
///
/// Returned by the fallible setters and constructors that accept signed
/// millisecond values. The previous value is always left unchanged.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A duration setting was given a negative number of milliseconds.
    #[error("{field} cannot be negative (got {value}ms)")]
    Negative {
        /// Name of the rejected setting (`loop_interval`, `stop_timeout`).
        field: &'static str,
        /// The rejected value in milliseconds.
        value: i64,
    },
}

impl ConfigError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use loopvisor::ConfigError;
    ///
    /// let err = ConfigError::Negative { field: "loop_interval", value: -1 };
    /// assert_eq!(err.as_label(), "config_negative");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            ConfigError::Negative { .. } => "config_negative",
        }
    }
}

/// Converts signed milliseconds into a [`Duration`], rejecting negatives.
pub(crate) fn duration_from_ms(field: &'static str, ms: i64) -> Result<Duration, ConfigError> {
    u64::try_from(ms)
        .map(Duration::from_millis)
        .map_err(|_| ConfigError::Negative { field, value: ms })
}

/// # Errors returned by loop callbacks.
///
/// The runner does not retry: any [`LoopError::Fail`] ends the run and is
/// reported as a [`CallbackError`]. [`LoopError::Canceled`] is treated as a
/// graceful exit.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoopError {
    /// The callback failed.
    #[error("execution failed: {error}")]
    Fail {
        /// The underlying error message.
        error: String,
    },

    /// The callback observed cancellation and gave up early.
    #[error("context cancelled")]
    Canceled,
}

impl LoopError {
    /// Builds a [`LoopError::Fail`] from anything displayable.
    ///
    /// # Example
    /// ```
    /// use loopvisor::LoopError;
    ///
    /// let err = LoopError::fail("connection refused");
    /// assert_eq!(err.to_string(), "execution failed: connection refused");
    /// ```
    pub fn fail(error: impl fmt::Display) -> Self {
        LoopError::Fail {
            error: error.to_string(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            LoopError::Fail { .. } => "loop_failed",
            LoopError::Canceled => "loop_canceled",
        }
    }
}

/// Which callback a [`CallbackError::Panicked`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackPhase {
    /// [`LoopTask::init`](crate::LoopTask::init).
    Init,
    /// [`LoopTask::tick`](crate::LoopTask::tick).
    Loop,
}

impl CallbackPhase {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            CallbackPhase::Init => "init",
            CallbackPhase::Loop => "loop",
        }
    }
}

impl fmt::Display for CallbackPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_label())
    }
}

/// # A callback failed during a run.
///
/// An init failure means the run never reached the looping phase.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CallbackError {
    /// The init callback returned an error.
    #[error("init callback failed: {error}")]
    Init {
        /// The underlying error message.
        error: String,
    },

    /// The loop body returned an error.
    #[error("loop callback failed at iteration {iteration}: {error}")]
    Loop {
        /// Iteration (1-based) whose invocation failed.
        iteration: u64,
        /// The underlying error message.
        error: String,
    },

    /// A callback panicked.
    #[error("{during} callback panicked: {message}")]
    Panicked {
        /// The callback that panicked.
        during: CallbackPhase,
        /// Panic payload, if it was a string.
        message: String,
    },
}

impl CallbackError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            CallbackError::Init { .. } => "callback_init_failed",
            CallbackError::Loop { .. } => "callback_loop_failed",
            CallbackError::Panicked { .. } => "callback_panicked",
        }
    }

    /// Returns `true` if the run failed before entering the loop.
    pub fn is_init(&self) -> bool {
        matches!(
            self,
            CallbackError::Init { .. } | CallbackError::Panicked {
                    during: CallbackPhase::Init,
                    ..
                }
        )
    }
}

/// Why a run was forcibly terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForceCause {
    /// The stop watchdog expired before the runner exited.
    StopTimeout {
        /// The configured stop timeout.
        timeout: Duration,
    },
    /// A new run was started with [`PreviousRun::Abort`](crate::PreviousRun::Abort).
    Replaced,
}

impl fmt::Display for ForceCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ForceCause::StopTimeout { timeout } => write!(f, "stop timeout {timeout:?} exceeded"),
            ForceCause::Replaced => f.write_str("replaced by a new run"),
        }
    }
}

/// Final state of a forcibly terminated execution context.
///
/// Termination aborts the runner at its next yield point. A body that blocks
/// without yielding cannot be interrupted; its context is then detached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// The context confirmed exit after the abort.
    Killed,
    /// The context did not confirm exit and was detached; it may still be
    /// executing the loop body.
    Abandoned,
}

impl Termination {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            Termination::Killed => "killed",
            Termination::Abandoned => "abandoned",
        }
    }
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_label())
    }
}

/// # The run had to be force-terminated.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("forced termination ({cause}); context {state}")]
pub struct ForcedTermination {
    /// What triggered the escalation.
    pub cause: ForceCause,
    /// Whether the old context is known to be gone.
    pub state: Termination,
}

/// Terminal failure attached to a [`StopReport`](crate::StopReport).
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StopError {
    /// A callback failed; the run ended gracefully afterwards.
    #[error(transparent)]
    Callback(#[from] CallbackError),

    /// The run was force-terminated.
    #[error(transparent)]
    Forced(#[from] ForcedTermination),
}

impl StopError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            StopError::Callback(e) => e.as_label(),
            StopError::Forced(_) => "forced_termination",
        }
    }
}

/// # Synchronous failures of controller operations.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum WorkerError {
    /// The execution context (thread or runtime) could not be created.
    #[error("failed to spawn execution context for worker {name:?}: {source}")]
    Spawn {
        /// Worker name.
        name: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

impl WorkerError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            WorkerError::Spawn { .. } => "worker_spawn_failed",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            WorkerError::Spawn { name, source } => format!("spawn {name}: {source}"),
        }
    }
}
