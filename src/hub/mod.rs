//! Fan-out of telemetry frames to connected WebSocket subscribers.
//!
//! The [`Hub`] owns the subscriber set. Samples reach it through a
//! [`SampleSender`] that never blocks the producer; a single dispatcher
//! task drains the queue and publishes each sample in order.

mod dispatcher;
mod error;
mod hub;
mod subscriber;

#[cfg(test)]
pub(crate) mod test_sink;

pub use dispatcher::{channel, run_dispatcher, SampleSender};
pub use error::{HubError, SendError};
pub use hub::{Hub, PublishReport, RelayStatus, SubscriberInfo};
pub use subscriber::{SubscriberHandle, SubscriberId};
