//! Fan-out contracts - Broadcast Hub interface
//!
//! The Ingestion Pipeline only sees the `Broadcaster` trait, so it can be
//! exercised with a fake hub.

use serde::Serialize;
use std::fmt;

use crate::OutboundMessage;

/// Process-unique subscriber identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct SubscriberId(pub u64);

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Result of delivering one message to one subscriber
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "reason", rename_all = "snake_case")]
pub enum DeliveryOutcome {
    /// Written to the subscriber's connection
    Delivered,
    /// The send failed with an error
    Failed(String),
    /// The send did not complete in time
    TimedOut,
    /// The subscriber's outbound queue was full; message dropped for it
    QueueFull,
    /// The subscriber was already closed
    Closed,
}

impl DeliveryOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered)
    }

    /// Short label used for logs and metrics
    pub fn label(&self) -> &'static str {
        match self {
            Self::Delivered => "delivered",
            Self::Failed(_) => "failed",
            Self::TimedOut => "timed_out",
            Self::QueueFull => "queue_full",
            Self::Closed => "closed",
        }
    }
}

/// Per-subscriber outcomes of one publish
#[derive(Debug, Clone, Default, Serialize)]
pub struct PublishReport {
    pub outcomes: Vec<(SubscriberId, DeliveryOutcome)>,
}

impl PublishReport {
    pub fn subscriber_count(&self) -> usize {
        self.outcomes.len()
    }

    pub fn delivered(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| outcome.is_delivered())
            .count()
    }

    pub fn failed(&self) -> usize {
        self.subscriber_count() - self.delivered()
    }

    /// Outcome for one subscriber, if it took part
    pub fn outcome(&self, id: SubscriberId) -> Option<&DeliveryOutcome> {
        self.outcomes
            .iter()
            .find(|(sid, _)| *sid == id)
            .map(|(_, outcome)| outcome)
    }
}

/// Fan-out interface
///
/// `publish` attempts delivery to every current subscriber and returns once
/// every attempt has completed or definitively failed. It never fails as a
/// whole: per-subscriber failures are reported in the `PublishReport`.
#[trait_variant::make(Broadcaster: Send)]
pub trait LocalBroadcaster {
    async fn publish(&self, message: &OutboundMessage) -> PublishReport;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_counts() {
        let report = PublishReport {
            outcomes: vec![
                (SubscriberId(1), DeliveryOutcome::Delivered),
                (SubscriberId(2), DeliveryOutcome::TimedOut),
                (SubscriberId(3), DeliveryOutcome::Delivered),
            ],
        };

        assert_eq!(report.subscriber_count(), 3);
        assert_eq!(report.delivered(), 2);
        assert_eq!(report.failed(), 1);
        assert_eq!(
            report.outcome(SubscriberId(2)),
            Some(&DeliveryOutcome::TimedOut)
        );
        assert_eq!(report.outcome(SubscriberId(9)), None);
    }
}
