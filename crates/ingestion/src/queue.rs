//! Per-topic feed queues between a feed source and the pipeline
//!
//! Feed sources push batches by upstream topic name; each topic kind has its
//! own bounded queue drained by one pipeline flow.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_channel::{bounded, Receiver, Sender};
use serde_json::Value;
use tracing::{debug, trace, warn};

use contracts::{IngestionConfig, RawBatch, Topic};

use crate::error::{IngestionError, Result};

/// Counters kept by the sending side
#[derive(Debug, Default)]
pub struct FeedStats {
    delivered: AtomicU64,
    unknown_topic: AtomicU64,
    malformed: AtomicU64,
}

impl FeedStats {
    /// Batches accepted onto a queue
    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    /// Batches for topics the relay does not consume
    pub fn unknown_topic(&self) -> u64 {
        self.unknown_topic.load(Ordering::Relaxed)
    }

    /// Batches with an unusable payload shape
    pub fn malformed(&self) -> u64 {
        self.malformed.load(Ordering::Relaxed)
    }
}

/// Sending side, cloned into feed sources
#[derive(Debug, Clone)]
pub struct FeedSender {
    position_topic: Arc<str>,
    telemetry_topic: Arc<str>,
    position: Sender<RawBatch>,
    telemetry: Sender<RawBatch>,
    stats: Arc<FeedStats>,
}

/// Receiving side, one queue per topic kind
#[derive(Debug)]
pub struct TopicReceivers {
    pub position: Receiver<RawBatch>,
    pub telemetry: Receiver<RawBatch>,
}

impl TopicReceivers {
    pub fn get(&self, topic: Topic) -> &Receiver<RawBatch> {
        match topic {
            Topic::Position => &self.position,
            Topic::Telemetry => &self.telemetry,
        }
    }
}

/// Create the per-topic queues
pub fn feed_channel(config: &IngestionConfig) -> (FeedSender, TopicReceivers) {
    let capacity = config.queue_capacity.max(1);
    let (position_tx, position_rx) = bounded(capacity);
    let (telemetry_tx, telemetry_rx) = bounded(capacity);

    let sender = FeedSender {
        position_topic: Arc::from(config.position_topic.as_str()),
        telemetry_topic: Arc::from(config.telemetry_topic.as_str()),
        position: position_tx,
        telemetry: telemetry_tx,
        stats: Arc::new(FeedStats::default()),
    };
    let receivers = TopicReceivers {
        position: position_rx,
        telemetry: telemetry_rx,
    };
    (sender, receivers)
}

/// Turn an upstream payload into a batch
///
/// An array is a batch of records; a single object is a one-record batch.
pub fn parse_batch(topic: Topic, upstream: &str, payload: Value) -> Result<RawBatch> {
    match payload {
        Value::Array(records) => Ok(RawBatch::new(topic, records)),
        record @ Value::Object(_) => Ok(RawBatch::new(topic, vec![record])),
        other => Err(IngestionError::MalformedBatch {
            topic: upstream.to_string(),
            message: format!("expected array or object, got {}", json_kind(&other)),
        }),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

impl FeedSender {
    /// Resolve an upstream topic name
    pub fn resolve(&self, upstream: &str) -> Option<Topic> {
        if upstream == &*self.position_topic {
            Some(Topic::Position)
        } else if upstream == &*self.telemetry_topic {
            Some(Topic::Telemetry)
        } else {
            None
        }
    }

    /// Deliver an upstream payload, waiting for queue capacity
    ///
    /// Returns `Ok(false)` when the batch was ignored (unknown topic or
    /// malformed payload) and `Ok(true)` once it is queued.
    pub async fn deliver(&self, upstream: &str, payload: Value) -> Result<bool> {
        let Some(topic) = self.resolve(upstream) else {
            self.stats.unknown_topic.fetch_add(1, Ordering::Relaxed);
            trace!(topic = upstream, "Ignoring unknown topic");
            return Ok(false);
        };

        match parse_batch(topic, upstream, payload) {
            Ok(batch) => {
                self.send(batch).await?;
                Ok(true)
            }
            Err(e) => {
                self.stats.malformed.fetch_add(1, Ordering::Relaxed);
                observability::metrics::record_malformed_batch(topic.as_str());
                warn!(error = %e, "Dropping malformed batch");
                Ok(false)
            }
        }
    }

    /// Queue a typed batch, waiting for capacity
    pub async fn send(&self, batch: RawBatch) -> Result<()> {
        let topic = batch.topic;
        let queue = match topic {
            Topic::Position => &self.position,
            Topic::Telemetry => &self.telemetry,
        };
        queue.send(batch).await.map_err(|_| IngestionError::QueueClosed {
            topic: topic.as_str(),
        })?;
        self.stats.delivered.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    pub fn stats(&self) -> &Arc<FeedStats> {
        &self.stats
    }

    /// Batches queued so far by every clone of this sender
    pub fn delivered_batches(&self) -> u64 {
        self.stats.delivered()
    }

    /// Close both queues; flows drain what is queued and stop
    pub fn close(&self) {
        debug!("Closing feed queues");
        self.position.close();
        self.telemetry.close();
    }

    pub fn is_closed(&self) -> bool {
        self.position.is_closed() && self.telemetry.is_closed()
    }
}
