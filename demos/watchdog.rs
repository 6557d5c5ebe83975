//! # Example: watchdog
//!
//! Demonstrates forced termination of a loop body that ignores stop requests.
//!
//! Shows how to:
//! - Configure a stop timeout.
//! - Attach the built-in [`LogWriter`] subscriber.
//! - Tell a killed context from an abandoned one via [`StopReport`].
//!
//! ## Flow
//! ```text
//! run 1: body awaits a long sleep   → stop() → watchdog 200ms → Killed
//! run 2: body blocks its thread     → stop() → watchdog 200ms → Abandoned
//! ```
//!
//! ## Run
//! Requires the `logging` feature to export [`LogWriter`].
//! ```bash
//! cargo run --example watchdog --features logging
//! ```

use std::sync::Arc;
use std::time::Duration;

use loopvisor::{
    LogWriter, LoopContext, LoopError, LoopFn, StopReport, Subscribe, WorkerConfig,
    WorkerController,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().init();

    let task = LoopFn::new(|ctx: LoopContext| async move {
        if ctx.run() == 1 {
            // yields, so the abort lands at this await
            tokio::time::sleep(Duration::from_secs(10)).await;
        } else {
            // never yields; the context can only be detached
            std::thread::sleep(Duration::from_secs(1));
        }
        Ok::<_, LoopError>(())
    })
    .with_stopped(|report: &StopReport| {
        println!(
            "[demo] run {} stopped: forced={} termination={:?} error={:?}",
            report.run,
            report.forced,
            report.termination(),
            report.error.as_ref().map(ToString::to_string),
        );
    });

    let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter::new())];
    let cfg = WorkerConfig::new("stubborn").with_stop_timeout(Duration::from_millis(200));
    let worker = WorkerController::builder(cfg)
        .with_subscribers(subs)
        .build(task);

    for _ in 0..2 {
        worker.start().await?;
        tokio::time::sleep(Duration::from_millis(50)).await;
        worker.stop_and_wait().await;
    }

    // let the listener flush the last events
    tokio::time::sleep(Duration::from_millis(100)).await;
    Ok(())
}
