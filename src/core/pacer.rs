//! # Pacer: inter-iteration wait bookkeeping.
//!
//! Holds the fixed loop interval and the accumulated extra delay, and decides
//! before each iteration whether the runner should wait one quantum or invoke
//! the loop body.
//!
//! ```text
//! next(quantum):
//!   extra > 0      → extra -= min(extra, quantum); Wait(min(extra, quantum))
//!   interval > 0   → extra = interval;             Invoke
//!   otherwise      →                               Invoke
//! ```
//!
//! Scheduling the interval *before* the invocation means the first iteration
//! never waits, and the interval separates the end of one invocation from the
//! start of the next. Delays added during an invocation stack on top of it.

use std::time::Duration;

/// What the runner should do before its next iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Pace {
    /// Sleep this long, then ask again.
    Wait(Duration),
    /// Invoke the loop body now.
    Invoke,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct Pacer {
    interval: Duration,
    extra: Duration,
}

impl Pacer {
    pub(crate) fn new(interval: Duration) -> Self {
        Self {
            interval,
            extra: Duration::ZERO,
        }
    }

    pub(crate) fn interval(&self) -> Duration {
        self.interval
    }

    pub(crate) fn set_interval(&mut self, interval: Duration) {
        self.interval = interval;
    }

    /// Delay still pending before the next invocation.
    #[cfg(test)]
    pub(crate) fn pending(&self) -> Duration {
        self.extra
    }

    pub(crate) fn add(&mut self, delay: Duration) {
        self.extra = self.extra.saturating_add(delay);
    }

    /// Drops any pending delay; the interval is kept.
    pub(crate) fn reset(&mut self) {
        self.extra = Duration::ZERO;
    }

    pub(crate) fn next(&mut self, quantum: Duration) -> Pace {
        if !self.extra.is_zero() {
            let step = self.extra.min(quantum);
            self.extra -= step;
            return Pace::Wait(step);
        }
        if !self.interval.is_zero() {
            self.extra = self.interval;
        }
        Pace::Invoke
    }
}
