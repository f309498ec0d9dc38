//! # Ingestion Pipeline
//!
//! Upstream feed ingestion module.
//!
//! Responsibilities:
//! - Route upstream payloads onto per-topic queues (backpressure onto the feed)
//! - Normalize raw records into position and telemetry updates
//! - Apply each normalized batch to the snapshot cache, then broadcast it
//! - Supervise feed sources with retry and exponential backoff
//!
//! ## Usage Example
//!
//! ```ignore
//! use ingestion::{feed_channel, FeedSupervisor, IngestionPipeline, MockFeed, MockFeedConfig};
//!
//! let (sender, receivers) = feed_channel(&config.ingestion);
//! let pipeline = Arc::new(IngestionPipeline::new(channels, cache, hub));
//! let flows = pipeline.spawn(receivers);
//!
//! let feed = MockFeed::new(MockFeedConfig::default());
//! let exit = FeedSupervisor::new(feed, config.retry, sender, shutdown_rx).run().await;
//! ```

mod error;
mod metrics;
mod mock;
mod normalizer;
mod pipeline;
mod queue;
mod replay;
mod source;
mod supervisor;

// Re-exports
pub use error::{IngestionError, Result};
pub use metrics::{IngestionMetrics, MetricsSnapshot};
pub use mock::{MockFeed, MockFeedConfig};
pub use normalizer::{
    entity_id, normalize_position, normalize_telemetry, Normalized, Normalizer, CHANNELS_FIELD,
    ENTITY_FIELD,
};
pub use pipeline::{BatchOutcome, FlowState, IngestionPipeline};
pub use queue::{feed_channel, parse_batch, FeedSender, FeedStats, TopicReceivers};
pub use replay::ReplayFeed;
pub use source::{FeedSource, LocalFeedSource};
pub use supervisor::{FeedExit, FeedSupervisor};
