//! # Event subscribers.
//!
//! A controller publishes its lifecycle events to a [`Bus`](crate::events::Bus).
//! Subscribers passed to [`WorkerControllerBuilder::with_subscribers`](crate::WorkerControllerBuilder::with_subscribers)
//! receive those events through a [`SubscriberSet`]: this is how forced
//! terminations and callback errors reach a logging or alerting sink.
//!
//! ```text
//! Bus ──► subscriber listener ──► SubscriberSet ──┬──► [queue] ──► LogWriter
//!                                                 └──► [queue] ──► custom subscriber
//! ```

#[cfg(feature = "logging")]
mod log;
mod subscriber;
mod subscriber_set;

#[cfg(feature = "logging")]
pub use log::LogWriter;
pub use subscriber::Subscribe;
pub use subscriber_set::SubscriberSet;
