//! Relay metrics
//!
//! Thin wrappers over the `metrics` facade. Without an installed recorder
//! every call is a no-op, so library code records unconditionally.

use metrics::{counter, gauge, histogram};

/// Record the current number of registered subscribers
pub fn record_subscriber_count(count: usize) {
    gauge!("f1_relay_subscribers").set(count as f64);
}

/// Record one publish and its fan-out width
pub fn record_publish(kind: &str, subscribers: usize) {
    counter!("f1_relay_publish_total", "kind" => kind.to_string()).increment(1);
    histogram!("f1_relay_publish_fanout").record(subscribers as f64);
}

/// Record how long one publish took, acknowledgements included
pub fn record_publish_latency_ms(latency_ms: f64) {
    histogram!("f1_relay_publish_latency_ms").record(latency_ms);
}

/// Record the outcome of one delivery to one subscriber
pub fn record_delivery(outcome: &str) {
    counter!("f1_relay_deliveries_total", "outcome" => outcome.to_string()).increment(1);
}

/// Record a connection refused by the connection limit
pub fn record_connection_rejected() {
    counter!("f1_relay_connections_rejected_total").increment(1);
}

/// Record an upstream payload dropped for its shape
pub fn record_malformed_batch(topic: &str) {
    counter!("f1_relay_malformed_batches_total", "topic" => topic.to_string()).increment(1);
}

/// Record one normalized batch
pub fn record_batch(topic: &str, records: usize, skipped: usize) {
    counter!("f1_relay_batches_total", "topic" => topic.to_string()).increment(1);
    counter!("f1_relay_records_total", "topic" => topic.to_string()).increment(records as u64);
    if skipped > 0 {
        counter!("f1_relay_records_skipped_total", "topic" => topic.to_string())
            .increment(skipped as u64);
    }
}

/// Record a failed feed attempt
pub fn record_feed_failure(source: &str) {
    counter!("f1_relay_feed_failures_total", "source" => source.to_string()).increment(1);
}

/// Summary of a sampled series
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.1}, max={:.1}, mean={:.2}, std={:.2} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// Online statistics (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            let delta2 = value - self.mean;
            self.m2 += delta * delta2;
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// Sample variance
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    pub fn summary(&self) -> StatsSummary {
        StatsSummary::from(self)
    }
}
