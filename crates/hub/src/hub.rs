//! BroadcastHub - concurrent fan-out of one message to every subscriber

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use tracing::{debug, error, instrument, warn};

use contracts::{Broadcaster, DeliveryOutcome, OutboundMessage, PublishReport, WireFrame};

use crate::metrics::HubMetrics;
use crate::registry::SubscriberRegistry;

/// Fan-out hub over a shared registry
#[derive(Debug, Clone)]
pub struct BroadcastHub {
    registry: Arc<SubscriberRegistry>,
    metrics: Arc<HubMetrics>,
}

impl BroadcastHub {
    pub fn new(registry: Arc<SubscriberRegistry>) -> Self {
        Self {
            registry,
            metrics: Arc::new(HubMetrics::new()),
        }
    }

    pub fn registry(&self) -> &Arc<SubscriberRegistry> {
        &self.registry
    }

    /// Get hub metrics
    pub fn metrics(&self) -> &Arc<HubMetrics> {
        &self.metrics
    }

    /// Publish an already-encoded frame
    ///
    /// The frame is enqueued on every member while the registry read lock is
    /// held, which fixes per-subscriber order to the order of publish calls.
    /// Waiting for acknowledgements happens after the lock is released; each
    /// subscriber worker bounds its own sends, so every wait resolves.
    pub async fn publish_frame(&self, frame: &WireFrame) -> PublishReport {
        let started = Instant::now();
        let pending = self
            .registry
            .with_members(|members| {
                members
                    .values()
                    .map(|handle| (handle.id(), handle.enqueue(frame.clone())))
                    .collect::<Vec<_>>()
            })
            .await;

        let outcomes = join_all(
            pending
                .into_iter()
                .map(|(id, enqueued)| async move { (id, enqueued.outcome().await) }),
        )
        .await;

        let report = PublishReport { outcomes };
        self.record(frame, &report, started.elapsed());
        report
    }

    fn record(&self, frame: &WireFrame, report: &PublishReport, elapsed: Duration) {
        self.metrics.record_report(report);
        observability::metrics::record_publish(frame.kind(), report.subscriber_count());
        observability::metrics::record_publish_latency_ms(elapsed.as_secs_f64() * 1000.0);
        for (id, outcome) in &report.outcomes {
            observability::metrics::record_delivery(outcome.label());
            if !outcome.is_delivered() {
                warn!(
                    subscriber = %id,
                    kind = frame.kind(),
                    outcome = outcome.label(),
                    "Delivery failed"
                );
            }
        }
        debug!(
            kind = frame.kind(),
            bytes = frame.len(),
            subscribers = report.subscriber_count(),
            delivered = report.delivered(),
            "Published"
        );
    }
}

impl Broadcaster for BroadcastHub {
    #[instrument(name = "hub_publish", skip(self, message), fields(kind = message.kind()))]
    async fn publish(&self, message: &OutboundMessage) -> PublishReport {
        match WireFrame::encode(message) {
            Ok(frame) => self.publish_frame(&frame).await,
            Err(e) => {
                error!(error = %e, "Encode failed, message not published");
                let reason = e.to_string();
                let outcomes = self
                    .registry
                    .current_members()
                    .await
                    .iter()
                    .map(|handle| (handle.id(), DeliveryOutcome::Failed(reason.clone())))
                    .collect();
                PublishReport { outcomes }
            }
        }
    }
}
