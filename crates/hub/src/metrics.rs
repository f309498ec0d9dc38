//! Hub metrics for observability

use std::sync::atomic::{AtomicU64, Ordering};

use contracts::{DeliveryOutcome, PublishReport};

/// Counters for every publish made through one hub
#[derive(Debug, Default)]
pub struct HubMetrics {
    /// Total publish calls
    publish_count: AtomicU64,
    /// Per-subscriber deliveries that completed
    delivered_count: AtomicU64,
    /// Sends that returned an error
    failed_count: AtomicU64,
    /// Sends that exceeded the send timeout
    timed_out_count: AtomicU64,
    /// Messages dropped because a subscriber queue was full
    queue_full_count: AtomicU64,
    /// Deliveries attempted on an already-closed subscriber
    closed_count: AtomicU64,
}

impl HubMetrics {
    /// Create new metrics instance
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one publish report into the counters
    pub fn record_report(&self, report: &PublishReport) {
        self.publish_count.fetch_add(1, Ordering::Relaxed);
        for (_, outcome) in &report.outcomes {
            self.record_outcome(outcome);
        }
    }

    /// Count a single delivery outcome
    pub fn record_outcome(&self, outcome: &DeliveryOutcome) {
        let counter = match outcome {
            DeliveryOutcome::Delivered => &self.delivered_count,
            DeliveryOutcome::Failed(_) => &self.failed_count,
            DeliveryOutcome::TimedOut => &self.timed_out_count,
            DeliveryOutcome::QueueFull => &self.queue_full_count,
            DeliveryOutcome::Closed => &self.closed_count,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn publish_count(&self) -> u64 {
        self.publish_count.load(Ordering::Relaxed)
    }

    pub fn delivered_count(&self) -> u64 {
        self.delivered_count.load(Ordering::Relaxed)
    }

    /// Get snapshot of all metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            publish_count: self.publish_count(),
            delivered_count: self.delivered_count(),
            failed_count: self.failed_count.load(Ordering::Relaxed),
            timed_out_count: self.timed_out_count.load(Ordering::Relaxed),
            queue_full_count: self.queue_full_count.load(Ordering::Relaxed),
            closed_count: self.closed_count.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of hub metrics (for reporting)
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsSnapshot {
    pub publish_count: u64,
    pub delivered_count: u64,
    pub failed_count: u64,
    pub timed_out_count: u64,
    pub queue_full_count: u64,
    pub closed_count: u64,
}

impl MetricsSnapshot {
    /// Deliveries that did not reach their subscriber
    pub fn undelivered(&self) -> u64 {
        self.failed_count + self.timed_out_count + self.queue_full_count + self.closed_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::SubscriberId;

    #[test]
    fn test_record_report() {
        let metrics = HubMetrics::new();
        metrics.record_report(&PublishReport {
            outcomes: vec![
                (SubscriberId(1), DeliveryOutcome::Delivered),
                (SubscriberId(2), DeliveryOutcome::QueueFull),
                (SubscriberId(3), DeliveryOutcome::Failed("reset".into())),
            ],
        });

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.publish_count, 1);
        assert_eq!(snapshot.delivered_count, 1);
        assert_eq!(snapshot.queue_full_count, 1);
        assert_eq!(snapshot.undelivered(), 2);
    }
}
