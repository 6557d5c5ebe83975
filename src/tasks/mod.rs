//! # Loop task abstractions.
//!
//! This module provides the callback-side types:
//! - [`LoopTask`] - trait implemented by the recurring work
//! - [`LoopFn`] - closure-backed implementation with optional init/stopped hooks
//! - [`LoopContext`] - per-callback handle (cancellation token, delay requests)
//! - [`StopReport`] - outcome delivered once per run

mod context;
mod report;
mod task;
mod task_fn;

pub use context::LoopContext;
pub use report::StopReport;
pub use task::LoopTask;
pub use task_fn::{BoxLoopFuture, LoopFn};
