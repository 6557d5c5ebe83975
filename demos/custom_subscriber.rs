//! # Example: custom_subscriber
//!
//! Demonstrates how to build and attach a custom event subscriber.
//!
//! Shows how to:
//! - Implement the [`Subscribe`] trait.
//! - Inspect [`Event`] / [`EventKind`] for worker lifecycle metrics.
//! - Wire the subscriber into [`WorkerController::builder`].
//!
//! ## Flow
//! ```text
//! WorkerController::start()
//!     ├─► Bus.publish(WorkerStarting)
//!     ├─► LoopRunner::run()
//!     │     ├─► publish(DelayAdded / LoopFailed)
//!     │     └─► publish(WorkerStopped)
//!     └─► subscriber listener
//!           └─► SubscriberSet.emit_arc() ──► Metrics.on_event()
//! ```
//!
//! ## Run
//! ```bash
//! cargo run --example custom_subscriber
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use loopvisor::{
    Event, EventKind, LoopContext, LoopError, LoopFn, Subscribe, WorkerConfig, WorkerController,
};

/// Counts lifecycle events and prints failures.
/// In real life, you could export metrics, ship logs, or trigger alerts.
#[derive(Default)]
struct Metrics {
    starts: AtomicU64,
    stops: AtomicU64,
    failures: AtomicU64,
    forced: AtomicU64,
}

#[async_trait::async_trait]
impl Subscribe for Metrics {
    async fn on_event(&self, ev: &Event) {
        match ev.kind {
            EventKind::WorkerStarting => {
                self.starts.fetch_add(1, Ordering::Relaxed);
            }
            EventKind::WorkerStopped => {
                self.stops.fetch_add(1, Ordering::Relaxed);
            }
            EventKind::InitFailed | EventKind::LoopFailed => {
                self.failures.fetch_add(1, Ordering::Relaxed);
                println!(
                    "[sub] failed: worker={} run={} reason={}",
                    ev.worker.as_deref().unwrap_or("<unknown>"),
                    ev.run.unwrap_or(0),
                    ev.reason.as_deref().unwrap_or("<none>")
                );
            }
            EventKind::ForcedTermination => {
                self.forced.fetch_add(1, Ordering::Relaxed);
            }
            _ => {}
        }
    }

    fn name(&self) -> &'static str {
        "metrics"
    }

    fn queue_capacity(&self) -> usize {
        1024
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let metrics = Arc::new(Metrics::default());
    let subs: Vec<Arc<dyn Subscribe>> = vec![metrics.clone()];

    // fails on its fifth iteration, ending the run
    let task = LoopFn::new(|ctx: LoopContext| async move {
        if ctx.iteration() == 5 {
            return Err(LoopError::fail("upstream unavailable (demo failure)"));
        }
        Ok(())
    });

    let cfg = WorkerConfig::new("flaky").with_loop_interval(Duration::from_millis(20));
    let worker = WorkerController::builder(cfg)
        .with_subscribers(subs)
        .build(task);

    for _ in 0..3 {
        worker.start().await?;
        worker.wait_stopped().await;
    }
    tokio::time::sleep(Duration::from_millis(100)).await;

    println!(
        "[sub] starts={} stops={} failures={} forced={}",
        metrics.starts.load(Ordering::Relaxed),
        metrics.stops.load(Ordering::Relaxed),
        metrics.failures.load(Ordering::Relaxed),
        metrics.forced.load(Ordering::Relaxed),
    );
    Ok(())
}
