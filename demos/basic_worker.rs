//! # Example: basic_worker
//!
//! Starts a paced worker, nudges it with an extra delay, stops it, and starts
//! it again.
//!
//! Shows how to:
//! - Build a task from closures with [`LoopFn`].
//! - Use [`LoopContext::add_delay`] from inside the loop body.
//! - Restart a controller and observe a fresh init per run.
//!
//! ## Flow
//! ```text
//! start() ──► init(run 1) ──► tick, tick (+300ms delay), tick, ...
//! stop_and_wait() ──► stopped(forced = false)
//! start() ──► init(run 2) ──► tick, ...
//! ```
//!
//! ## Run
//! ```bash
//! RUST_LOG=loopvisor=debug cargo run --example basic_worker
//! ```

use std::time::Duration;

use loopvisor::{LoopContext, LoopError, LoopFn, StopReport, WorkerConfig, WorkerController};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let task = LoopFn::new(|ctx: LoopContext| async move {
        println!("[{}] run={} iteration={}", ctx.name(), ctx.run(), ctx.iteration());
        if ctx.iteration() == 2 {
            println!("[{}] backing off for 300ms", ctx.name());
            ctx.add_delay(Duration::from_millis(300));
        }
        Ok::<_, LoopError>(())
    })
    .with_init(|ctx: LoopContext| async move {
        println!("[{}] init for run {}", ctx.name(), ctx.run());
        Ok(())
    })
    .with_stopped(|report: &StopReport| {
        println!(
            "[{}] run {} stopped after {} iterations (forced={})",
            report.worker, report.run, report.iterations, report.forced
        );
    });

    let cfg = WorkerConfig::new("basic").with_loop_interval(Duration::from_millis(100));
    let worker = WorkerController::new(cfg, task);

    worker.start().await?;
    tokio::time::sleep(Duration::from_millis(700)).await;
    worker.stop_and_wait().await;
    println!("running after stop: {}", worker.is_running());

    worker.set_loop_interval_ms(50)?;
    worker.start().await?;
    tokio::time::sleep(Duration::from_millis(300)).await;
    worker.stop_and_wait().await;
    Ok(())
}
