//! Ingestion Pipeline main entry
//!
//! One flow per topic drains its queue. Each batch is normalized, applied
//! to the snapshot cache, then broadcast if it produced anything.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_channel::Receiver;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use contracts::{Broadcaster, ChannelMap, OutboundMessage, PublishReport, RawBatch, Topic};
use race_state::RaceStateCache;

use crate::metrics::IngestionMetrics;
use crate::normalizer::{Normalized, Normalizer};
use crate::queue::TopicReceivers;

/// State of one topic flow
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowState {
    /// Waiting for the next batch
    Idle,
    /// Normalizing, applying or broadcasting a batch
    Processing,
}

/// What happened to one batch
#[derive(Debug, Clone)]
pub enum BatchOutcome {
    /// Nothing survived normalization; no broadcast was made
    Empty { skipped: usize },
    /// Applied to the cache and published
    Published {
        produced: usize,
        skipped: usize,
        report: PublishReport,
    },
}

/// Ingestion Pipeline
///
/// Generic over the broadcaster so it can be driven against a fake hub.
pub struct IngestionPipeline<B> {
    normalizer: Normalizer,
    cache: Arc<RaceStateCache>,
    broadcaster: Arc<B>,
    metrics: Arc<IngestionMetrics>,
    position_busy: AtomicBool,
    telemetry_busy: AtomicBool,
}

impl<B> IngestionPipeline<B>
where
    B: Broadcaster + Send + Sync + 'static,
{
    /// Create new Ingestion Pipeline
    pub fn new(channels: ChannelMap, cache: Arc<RaceStateCache>, broadcaster: Arc<B>) -> Self {
        Self {
            normalizer: Normalizer::new(channels),
            cache,
            broadcaster,
            metrics: Arc::new(IngestionMetrics::new()),
            position_busy: AtomicBool::new(false),
            telemetry_busy: AtomicBool::new(false),
        }
    }

    /// Get metrics reference
    pub fn metrics(&self) -> Arc<IngestionMetrics> {
        self.metrics.clone()
    }

    pub fn cache(&self) -> &Arc<RaceStateCache> {
        &self.cache
    }

    /// Current state of a topic flow
    pub fn flow_state(&self, topic: Topic) -> FlowState {
        if self.busy_flag(topic).load(Ordering::Acquire) {
            FlowState::Processing
        } else {
            FlowState::Idle
        }
    }

    fn busy_flag(&self, topic: Topic) -> &AtomicBool {
        match topic {
            Topic::Position => &self.position_busy,
            Topic::Telemetry => &self.telemetry_busy,
        }
    }

    /// Normalize, apply and broadcast one batch
    #[instrument(
        name = "ingestion_process_batch",
        skip(self, batch),
        fields(topic = %batch.topic, records = batch.len())
    )]
    pub async fn process_batch(&self, batch: RawBatch) -> BatchOutcome {
        let flag = self.busy_flag(batch.topic);
        flag.store(true, Ordering::Release);
        let outcome = self.handle_batch(&batch).await;
        flag.store(false, Ordering::Release);
        outcome
    }

    async fn handle_batch(&self, batch: &RawBatch) -> BatchOutcome {
        let Normalized { message, skipped } = self.normalizer.normalize(batch);
        let produced = message.entry_count();

        self.metrics.record_batch(batch.len(), skipped);
        observability::metrics::record_batch(batch.topic.as_str(), batch.len(), skipped);
        if skipped > 0 {
            debug!(skipped, "Records without entity id skipped");
        }

        if produced == 0 {
            self.metrics.record_empty();
            return BatchOutcome::Empty { skipped };
        }

        match &message {
            OutboundMessage::Positions(updates) => self.cache.apply_positions(updates).await,
            OutboundMessage::Telemetry(updates) => self.cache.apply_telemetry(updates).await,
            OutboundMessage::Init(_) => {}
        }

        let report = self.broadcaster.publish(&message).await;
        self.metrics.record_broadcast();

        BatchOutcome::Published {
            produced,
            skipped,
            report,
        }
    }

    /// Start one flow task per topic
    ///
    /// Each flow stops once its queue is closed and drained.
    pub fn spawn(self: &Arc<Self>, receivers: TopicReceivers) -> Vec<JoinHandle<()>> {
        let TopicReceivers {
            position,
            telemetry,
        } = receivers;

        [(Topic::Position, position), (Topic::Telemetry, telemetry)]
            .into_iter()
            .map(|(topic, rx)| {
                let pipeline = Arc::clone(self);
                tokio::spawn(async move { pipeline.run_flow(topic, rx).await })
            })
            .collect()
    }

    #[instrument(name = "ingestion_flow", skip(self, rx), fields(topic = %topic))]
    async fn run_flow(self: Arc<Self>, topic: Topic, rx: Receiver<RawBatch>) {
        info!("Flow started");
        let mut processed: u64 = 0;

        while let Ok(batch) = rx.recv().await {
            if batch.topic != topic {
                warn!(got = %batch.topic, "Batch on wrong queue, dropped");
                continue;
            }
            processed += 1;
            match self.process_batch(batch).await {
                BatchOutcome::Empty { skipped } => {
                    debug!(skipped, "Batch produced no updates");
                }
                BatchOutcome::Published {
                    produced, report, ..
                } => {
                    debug!(
                        produced,
                        subscribers = report.subscriber_count(),
                        delivered = report.delivered(),
                        "Batch published"
                    );
                }
            }

            if processed.is_multiple_of(500) {
                debug!(batches = processed, "Flow progress");
            }
        }

        info!(batches = processed, "Flow input closed, stopping");
    }
}
