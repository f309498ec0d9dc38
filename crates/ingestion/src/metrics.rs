//! Ingestion metrics

use std::sync::atomic::{AtomicU64, Ordering};

/// Ingestion metrics
#[derive(Debug, Default)]
pub struct IngestionMetrics {
    /// Total batches processed
    pub batches_received: AtomicU64,

    /// Total raw records processed
    pub records_received: AtomicU64,

    /// Records dropped for lack of an entity id
    pub records_skipped: AtomicU64,

    /// Batches that normalized to nothing
    pub empty_batches: AtomicU64,

    /// Batches handed to the broadcaster
    pub broadcasts: AtomicU64,
}

impl IngestionMetrics {
    /// Create new metrics instance
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a processed batch
    pub fn record_batch(&self, records: usize, skipped: usize) {
        self.batches_received.fetch_add(1, Ordering::Relaxed);
        self.records_received
            .fetch_add(records as u64, Ordering::Relaxed);
        self.records_skipped
            .fetch_add(skipped as u64, Ordering::Relaxed);
    }

    /// Record a batch that produced no output
    pub fn record_empty(&self) {
        self.empty_batches.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a broadcast
    pub fn record_broadcast(&self) {
        self.broadcasts.fetch_add(1, Ordering::Relaxed);
    }

    /// Get snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            batches_received: self.batches_received.load(Ordering::Relaxed),
            records_received: self.records_received.load(Ordering::Relaxed),
            records_skipped: self.records_skipped.load(Ordering::Relaxed),
            empty_batches: self.empty_batches.load(Ordering::Relaxed),
            broadcasts: self.broadcasts.load(Ordering::Relaxed),
        }
    }
}

/// Metrics snapshot
#[derive(Debug, Clone, Default)]
pub struct MetricsSnapshot {
    /// Total batches processed
    pub batches_received: u64,

    /// Total raw records processed
    pub records_received: u64,

    /// Records dropped for lack of an entity id
    pub records_skipped: u64,

    /// Batches that normalized to nothing
    pub empty_batches: u64,

    /// Batches handed to the broadcaster
    pub broadcasts: u64,
}
