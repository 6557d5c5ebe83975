//! # LogWriter: plain event printer
//!
//! A minimal subscriber that prints incoming [`Event`]s to stdout.
//! Use it for tests or demos.
//!
//! ## Example output
//! ```text
//! [starting] worker="poller" run=Some(1)
//! [delay] worker="poller" run=Some(1) delay_ms=Some(200)
//! [stop-requested] worker="poller" run=Some(1)
//! [watchdog-armed] worker="poller" run=Some(1) timeout_ms=Some(100)
//! [forced] worker="poller" run=Some(1) termination=Some(Abandoned) reason=Some("stop timeout 100ms exceeded")
//! [stopped] worker="poller" run=Some(2) iterations=Some(41)
//! ```

use async_trait::async_trait;

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Event writer subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let worker = e.worker.as_deref().unwrap_or("-");
        match e.kind {
            EventKind::WorkerStarting => {
                println!("[starting] worker={worker:?} run={:?}", e.run);
            }
            EventKind::InitFailed => {
                println!(
                    "[init-failed] worker={worker:?} run={:?} err={:?}",
                    e.run, e.reason
                );
            }
            EventKind::LoopFailed => {
                println!(
                    "[loop-failed] worker={worker:?} run={:?} iteration={:?} err={:?}",
                    e.run, e.iteration, e.reason
                );
            }
            EventKind::DelayAdded => {
                println!(
                    "[delay] worker={worker:?} run={:?} delay_ms={:?}",
                    e.run, e.delay_ms
                );
            }
            EventKind::StopRequested => {
                println!("[stop-requested] worker={worker:?} run={:?}", e.run);
            }
            EventKind::WatchdogArmed => {
                println!(
                    "[watchdog-armed] worker={worker:?} run={:?} timeout_ms={:?}",
                    e.run, e.timeout_ms
                );
            }
            EventKind::WatchdogCancelled => {
                println!("[watchdog-cancelled] worker={worker:?} run={:?}", e.run);
            }
            EventKind::WorkerStopped => {
                println!(
                    "[stopped] worker={worker:?} run={:?} iterations={:?}",
                    e.run, e.iteration
                );
            }
            EventKind::ForcedTermination => {
                println!(
                    "[forced] worker={worker:?} run={:?} termination={:?} reason={:?}",
                    e.run, e.termination, e.reason
                );
            }
            EventKind::SubscriberOverflow => {
                println!(
                    "[subscriber-overflow] subscriber={worker:?} reason={:?}",
                    e.reason
                );
            }
            EventKind::SubscriberPanicked => {
                println!(
                    "[subscriber-panicked] subscriber={worker:?} info={:?}",
                    e.reason
                );
            }
        }
    }

    fn name(&self) -> &'static str {
        "log-writer"
    }
}
