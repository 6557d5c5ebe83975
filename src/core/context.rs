//! # Execution contexts.
//!
//! Spawns futures either onto a tokio runtime handle or onto a dedicated OS
//! thread that drives its own current-thread runtime.
//!
//! Every spawned future carries an `exited` drop guard: the returned token is
//! cancelled as soon as the future completes, is aborted, or is dropped along
//! with its runtime. This is how forced termination tells a dead context from
//! an abandoned one.
//!
//! ```text
//! spawn_context(placement, runner)
//!     └─► Abortable(runner) ──► handle.spawn(..)          (background)
//!                           └─► thread::spawn(block_on(..)) (foreground)
//!
//! ContextHandle::abort()          → runner dropped at its next poll
//! ContextHandle::confirm_exit(d)  → Killed if `exited` fires within d, else Abandoned
//! ```

use std::future::Future;
use std::io;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

use futures::future::{AbortHandle, Abortable};
use tokio::runtime::{Builder, Handle};
use tokio_util::sync::CancellationToken;

use crate::error::Termination;

/// Where a future is executed.
pub(crate) enum Placement<'a> {
    /// A dedicated OS thread with this name.
    Thread(&'a str),
    /// A task on an existing runtime.
    Runtime(&'a Handle),
}

/// Handle to a spawned runner: abort switch plus exit signal.
pub(crate) struct ContextHandle {
    abort: AbortHandle,
    exited: CancellationToken,
}

impl ContextHandle {
    /// Requests the runner future to be dropped at its next poll.
    pub(crate) fn abort(&self) {
        self.abort.abort();
    }

    /// Waits up to `grace` for the context to confirm exit.
    pub(crate) async fn confirm_exit(&self, grace: Duration) -> Termination {
        if self.exited.is_cancelled() {
            return Termination::Killed;
        }
        match tokio::time::timeout(grace, self.exited.cancelled()).await {
            Ok(()) => Termination::Killed,
            Err(_elapsed) => Termination::Abandoned,
        }
    }
}

/// Spawns an abortable runner.
pub(crate) fn spawn_context<F>(placement: Placement<'_>, fut: F) -> io::Result<ContextHandle>
where
    F: Future<Output = ()> + Send + 'static,
{
    let (abort, registration) = AbortHandle::new_pair();
    let fut = Abortable::new(fut, registration);
    let exited = spawn_guarded(placement, async move {
        let _ = fut.await;
    })?;
    Ok(ContextHandle { abort, exited })
}

/// Spawns `fut` and returns a token cancelled once the future is gone.
pub(crate) fn spawn_guarded<F>(placement: Placement<'_>, fut: F) -> io::Result<CancellationToken>
where
    F: Future<Output = ()> + Send + 'static,
{
    let exited = CancellationToken::new();
    let guard = exited.clone().drop_guard();
    let guarded = async move {
        let _guard = guard;
        fut.await;
    };

    match placement {
        Placement::Runtime(handle) => {
            handle.spawn(guarded);
        }
        Placement::Thread(name) => {
            spawn_thread(thread::Builder::new().name(name.to_string()), guarded)?;
        }
    }
    Ok(exited)
}

/// Runs `fut` to completion on a new thread with its own current-thread runtime.
///
/// The runtime waits in a slot until the thread takes it. If the thread
/// cannot be created it is shut down here with `shutdown_background`, so the
/// error path never drops a runtime inside the caller's async context.
fn spawn_thread<F>(builder: thread::Builder, fut: F) -> io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let rt = Builder::new_current_thread().enable_all().build()?;
    let slot = Arc::new(Mutex::new(Some(rt)));
    let handoff = Arc::clone(&slot);

    let spawned = builder.spawn(move || {
        let rt = handoff.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(rt) = rt {
            rt.block_on(fut);
        }
    });
    if let Err(err) = spawned {
        let rt = slot.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(rt) = rt {
            rt.shutdown_background();
        }
        return Err(err);
    }
    Ok(())
}
