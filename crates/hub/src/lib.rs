//! # Hub
//!
//! Subscriber fan-out.
//!
//! Responsibilities:
//! - Track connected subscribers (`SubscriberRegistry`)
//! - Encode each message once and deliver it to every subscriber concurrently
//! - Isolate slow or broken subscribers behind their own queue and worker

pub mod error;
pub mod handle;
pub mod hub;
pub mod metrics;
pub mod registry;
pub mod sinks;

pub use contracts::{Broadcaster, DeliveryOutcome, MessageSink, PublishReport, SubscriberId};
pub use error::HubError;
pub use handle::{Enqueued, SubscriberHandle};
pub use hub::BroadcastHub;
pub use metrics::{HubMetrics, MetricsSnapshot};
pub use registry::SubscriberRegistry;
pub use sinks::{LogSink, WebSocketSink};
