//! # Function-backed loop task (`LoopFn`)
//!
//! [`LoopFn`] wraps a closure `F: Fn(LoopContext) -> Fut`, producing a fresh
//! future per iteration, plus optional init and stopped callbacks.
//!
//! ## Concurrency semantics
//! - Each iteration creates a **new** future that owns its state.
//! - No hidden mutation between iterations; shared state goes through an
//!   explicit `Arc<...>` captured by the closure.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicU64, Ordering};
//! use loopvisor::{LoopContext, LoopError, LoopFn};
//!
//! let ticks = Arc::new(AtomicU64::new(0));
//! let body = {
//!     let ticks = Arc::clone(&ticks);
//!     LoopFn::new(move |_ctx: LoopContext| {
//!         let ticks = Arc::clone(&ticks);
//!         async move {
//!             ticks.fetch_add(1, Ordering::Relaxed);
//!             Ok::<_, LoopError>(())
//!         }
//!     })
//! }
//! .with_init(|ctx: LoopContext| async move {
//!     println!("run {} starting", ctx.run());
//!     Ok(())
//! })
//! .with_stopped(|report| println!("stopped, forced={}", report.forced));
//! # let _ = body;
//! ```

use std::future::Future;
use std::pin::Pin;

use async_trait::async_trait;

use crate::error::LoopError;
use crate::tasks::{LoopContext, LoopTask, StopReport};

/// Boxed future returned by loop callbacks.
pub type BoxLoopFuture = Pin<Box<dyn Future<Output = Result<(), LoopError>> + Send + 'static>>;

type InitFn = Box<dyn Fn(LoopContext) -> BoxLoopFuture + Send + Sync>;
type StoppedFn = Box<dyn Fn(&StopReport) + Send + Sync>;

/// Function-backed [`LoopTask`].
pub struct LoopFn<F> {
    tick: F,
    init: Option<InitFn>,
    stopped: Option<StoppedFn>,
}

impl<F> LoopFn<F> {
    /// Creates a task from the loop body.
    pub fn new(tick: F) -> Self {
        Self {
            tick,
            init: None,
            stopped: None,
        }
    }

    /// Sets the callback run once before the first iteration of every run.
    pub fn with_init<I, IFut>(mut self, init: I) -> Self
    where
        I: Fn(LoopContext) -> IFut + Send + Sync + 'static,
        IFut: Future<Output = Result<(), LoopError>> + Send + 'static,
    {
        self.init = Some(Box::new(move |ctx| Box::pin(init(ctx))));
        self
    }

    /// Sets the callback run once after every run.
    pub fn with_stopped<S>(mut self, stopped: S) -> Self
    where
        S: Fn(&StopReport) + Send + Sync + 'static,
    {
        self.stopped = Some(Box::new(stopped));
        self
    }
}

#[async_trait]
impl<F, Fut> LoopTask for LoopFn<F>
where
    F: Fn(LoopContext) -> Fut + Send + Sync + 'static, // Fn, not FnMut
    Fut: Future<Output = Result<(), LoopError>> + Send + 'static,
{
    async fn init(&self, ctx: LoopContext) -> Result<(), LoopError> {
        match &self.init {
            Some(init) => init(ctx).await,
            None => Ok(()),
        }
    }

    async fn tick(&self, ctx: LoopContext) -> Result<(), LoopError> {
        (self.tick)(ctx).await
    }

    fn stopped(&self, report: &StopReport) {
        if let Some(stopped) = &self.stopped {
            stopped(report);
        }
    }
}
