//! # Event subscriber trait.
//!
//! [`Subscribe`] is the injected reporting target of a controller: forced
//! terminations, callback failures and the rest of the lifecycle reach a
//! logging or alerting sink through it.
//!
//! A slow or panicking subscriber only hurts itself: it has its own queue,
//! and overflow drops events for that subscriber alone (published as
//! `EventKind::SubscriberOverflow`).
//!
//! ## Example
//! ```rust
//! use async_trait::async_trait;
//! use loopvisor::{Event, EventKind, Subscribe};
//!
//! struct Alerts;
//!
//! #[async_trait]
//! impl Subscribe for Alerts {
//!     async fn on_event(&self, ev: &Event) {
//!         if matches!(ev.kind, EventKind::ForcedTermination) {
//!             // page someone
//!         }
//!     }
//!
//!     fn name(&self) -> &'static str { "alerts" }
//! }
//! ```

use async_trait::async_trait;

use crate::events::Event;

/// Sink for a controller's lifecycle events.
///
/// Runs on its own worker task behind a bounded queue. `on_event` should not
/// block the executor, and failures should be handled inside it: a panic is
/// caught and turned into a `SubscriberPanicked` event.
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    /// Handles one event; events arrive in publish order.
    async fn on_event(&self, event: &Event);

    /// Label used in `SubscriberOverflow` / `SubscriberPanicked` events.
    ///
    /// Defaults to the type name.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Queue length before events are dropped for this subscriber (min 1).
    fn queue_capacity(&self) -> usize {
        256
    }
}
