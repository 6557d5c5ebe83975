//! # Worker configuration.
//!
//! Provides [`WorkerConfig`] the construction-time settings of a
//! [`WorkerController`](crate::WorkerController).
//!
//! ## Sentinel values
//! - `loop_interval = 0s` → no pacing, iterate as fast as possible
//! - `stop_timeout = 0s` → wait indefinitely for a graceful stop (watchdog never armed)
//!
//! Durations cannot be negative in Rust; values coming from signed sources go
//! through the `*_ms` constructors, which reject negatives with
//! [`ConfigError::Negative`].

use std::time::Duration;

use crate::error::{ConfigError, duration_from_ms};

/// Construction-time configuration of a worker controller.
///
/// ## Field semantics
/// - `name`: diagnostic label (thread name in foreground mode, event `worker` field)
/// - `background`: run on the caller's tokio runtime instead of a dedicated thread
/// - `loop_interval`: pause between the end of one iteration and the start of the next
/// - `stop_timeout`: grace after `stop()` before forced termination (`0s` = never force)
/// - `bus_capacity`: event bus ring buffer size (min 1)
#[derive(Clone, Debug)]
pub struct WorkerConfig {
    /// Diagnostic label of the execution context.
    pub name: String,

    /// Execution context placement.
    ///
    /// - `false`: a dedicated OS thread named `name`, driving its own
    ///   current-thread runtime. A loop body that blocks synchronously cannot
    ///   stall the caller's runtime, and the context outlives that runtime.
    /// - `true`: a task on the runtime the controller was built in. It is
    ///   dropped, and may be abandoned mid-iteration, when that runtime shuts down.
    pub background: bool,

    /// Fixed pacing between iterations (`0s` = none).
    pub loop_interval: Duration,

    /// Time a stop request waits for a graceful exit before escalating (`0s` = forever).
    pub stop_timeout: Duration,

    /// Capacity of the event bus broadcast channel.
    pub bus_capacity: usize,
}

impl WorkerConfig {
    /// Creates a default configuration with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Builds a configuration from signed millisecond values.
    ///
    /// # Example
    /// ```
    /// use loopvisor::{ConfigError, WorkerConfig};
    ///
    /// let cfg = WorkerConfig::from_millis("poller", 250, 0).unwrap();
    /// assert!(cfg.watchdog_timeout().is_none());
    ///
    /// let err = WorkerConfig::from_millis("poller", -1, 0).unwrap_err();
    /// assert!(matches!(err, ConfigError::Negative { field: "loop_interval", .. }));
    /// ```
    pub fn from_millis(
        name: impl Into<String>,
        loop_interval_ms: i64,
        stop_timeout_ms: i64,
    ) -> Result<Self, ConfigError> {
        Self::new(name)
            .with_loop_interval_ms(loop_interval_ms)?
            .with_stop_timeout_ms(stop_timeout_ms)
    }

    /// Returns a new config with the given placement.
    pub fn with_background(mut self, background: bool) -> Self {
        self.background = background;
        self
    }

    /// Returns a new config with updated loop interval.
    pub fn with_loop_interval(mut self, interval: Duration) -> Self {
        self.loop_interval = interval;
        self
    }

    /// Returns a new config with updated stop timeout.
    pub fn with_stop_timeout(mut self, timeout: Duration) -> Self {
        self.stop_timeout = timeout;
        self
    }

    /// Signed-millisecond variant of [`with_loop_interval`](Self::with_loop_interval).
    pub fn with_loop_interval_ms(self, ms: i64) -> Result<Self, ConfigError> {
        Ok(self.with_loop_interval(duration_from_ms("loop_interval", ms)?))
    }

    /// Signed-millisecond variant of [`with_stop_timeout`](Self::with_stop_timeout).
    pub fn with_stop_timeout_ms(self, ms: i64) -> Result<Self, ConfigError> {
        Ok(self.with_stop_timeout(duration_from_ms("stop_timeout", ms)?))
    }

    /// Returns the loop interval as an `Option` (`None` = no pacing).
    #[inline]
    pub fn pacing_interval(&self) -> Option<Duration> {
        Some(self.loop_interval).filter(|d| !d.is_zero())
    }

    /// Returns the stop timeout as an `Option` (`None` = forced termination disabled).
    #[inline]
    pub fn watchdog_timeout(&self) -> Option<Duration> {
        Some(self.stop_timeout).filter(|d| !d.is_zero())
    }

    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }
}

impl Default for WorkerConfig {
    /// Default configuration:
    ///
    /// - `name = "worker"`
    /// - `background = false` (dedicated thread)
    /// - `loop_interval = 0s` (no pacing)
    /// - `stop_timeout = 3s`
    /// - `bus_capacity = 1024`
    fn default() -> Self {
        Self {
            name: "worker".to_string(),
            background: false,
            loop_interval: Duration::ZERO,
            stop_timeout: Duration::from_secs(3),
            bus_capacity: 1024,
        }
    }
}
