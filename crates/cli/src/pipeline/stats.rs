//! Relay run statistics.

use std::time::Duration;

use ingestion::FeedExit;
use observability::RunningStats;

/// Statistics from a relay run
#[derive(Debug, Clone, Default)]
pub struct RelayStats {
    /// Total duration of the run
    pub duration: Duration,

    /// Address subscribers connected to
    pub bind_addr: Option<std::net::SocketAddr>,

    /// How the feed ended (None = still running at shutdown)
    pub feed_exit: Option<FeedExit>,

    /// Batches queued by the feed
    pub feed_batches: u64,

    /// Feed payloads for topics the relay does not consume
    pub feed_unknown_topics: u64,

    /// Feed payloads with an unusable shape
    pub feed_malformed: u64,

    /// Ingestion counters
    pub ingestion: ingestion::MetricsSnapshot,

    /// Fan-out counters
    pub hub: hub::MetricsSnapshot,

    /// Subscriber count sampled once per second
    pub subscribers: RunningStats,

    /// Cars in the snapshot at shutdown
    pub cars_tracked: usize,
}

impl RelayStats {
    /// Published messages per second
    pub fn publish_rate(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.hub.publish_count as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Share of raw records skipped by the normalizer, as percentage
    pub fn skip_rate(&self) -> f64 {
        if self.ingestion.records_received > 0 {
            self.ingestion.records_skipped as f64 / self.ingestion.records_received as f64 * 100.0
        } else {
            0.0
        }
    }

    /// Print detailed summary
    pub fn print_summary(&self) {
        println!("\n╔══════════════════════════════════════════════════════════════╗");
        println!("║                     Relay Statistics                         ║");
        println!("╚══════════════════════════════════════════════════════════════╝\n");

        println!("Overview");
        println!("   ├─ Duration: {:.2}s", self.duration.as_secs_f64());
        if let Some(addr) = self.bind_addr {
            println!("   ├─ Listening on: {addr}");
        }
        println!("   ├─ Cars tracked: {}", self.cars_tracked);
        println!("   └─ Subscribers: {}", self.subscribers.summary());

        println!("\nFeed");
        match self.feed_exit {
            Some(exit) => println!("   ├─ Exit: {exit:?}"),
            None => println!("   ├─ Exit: stopped by shutdown"),
        }
        println!("   ├─ Batches queued: {}", self.feed_batches);
        println!("   ├─ Unknown topics: {}", self.feed_unknown_topics);
        println!("   └─ Malformed payloads: {}", self.feed_malformed);

        println!("\nIngestion");
        println!("   ├─ Batches: {}", self.ingestion.batches_received);
        println!("   ├─ Records: {}", self.ingestion.records_received);
        println!(
            "   ├─ Skipped records: {} ({:.2}%)",
            self.ingestion.records_skipped,
            self.skip_rate()
        );
        println!("   ├─ Empty batches: {}", self.ingestion.empty_batches);
        println!("   └─ Broadcasts: {}", self.ingestion.broadcasts);

        println!("\nFan-out");
        println!(
            "   ├─ Publishes: {} ({:.2}/s)",
            self.hub.publish_count,
            self.publish_rate()
        );
        println!("   ├─ Delivered: {}", self.hub.delivered_count);
        println!("   ├─ Failed: {}", self.hub.failed_count);
        println!("   ├─ Timed out: {}", self.hub.timed_out_count);
        println!("   ├─ Queue full: {}", self.hub.queue_full_count);
        println!("   └─ Closed: {}", self.hub.closed_count);

        println!();
    }
}
