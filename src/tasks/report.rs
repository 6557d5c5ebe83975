use std::sync::Arc;

use crate::error::{CallbackError, StopError, Termination};

/// Outcome of one run, delivered to [`LoopTask::stopped`](crate::LoopTask::stopped).
#[derive(Debug, Clone)]
pub struct StopReport {
    /// Worker name at the time the run started.
    pub worker: Arc<str>,
    /// Run id.
    pub run: u64,
    /// `true` if the run was force-terminated.
    pub forced: bool,
    /// Number of loop-body invocations started during the run.
    pub iterations: u64,
    /// Terminal failure, if any.
    pub error: Option<StopError>,
}

impl StopReport {
    /// Returns the callback failure that ended the run, if any.
    pub fn callback_error(&self) -> Option<&CallbackError> {
        match &self.error {
            Some(StopError::Callback(e)) => Some(e),
            _ => None,
        }
    }

    /// Returns the final context state of a forced run.
    pub fn termination(&self) -> Option<Termination> {
        match &self.error {
            Some(StopError::Forced(f)) => Some(f.state),
            _ => None,
        }
    }

    /// `true` for a graceful stop without any failure.
    pub fn is_clean(&self) -> bool {
        !self.forced && self.error.is_none()
    }
}
