//! FeedSupervisor - runs a feed source under a retry policy

use tokio::sync::watch;
use tracing::{error, info, instrument, warn};

use contracts::RetryPolicy;

use crate::queue::FeedSender;
use crate::source::FeedSource;

/// How supervision ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedExit {
    /// The source ended cleanly
    Completed,
    /// Consecutive failures exhausted the retry policy
    GaveUp { failures: u32 },
    /// Shutdown was requested
    Shutdown,
}

/// Runs one feed source, retrying failures with exponential backoff
///
/// The failure count resets whenever an attempt managed to queue at least
/// one batch, so a long-lived feed that drops occasionally keeps retrying.
pub struct FeedSupervisor<S> {
    source: S,
    policy: RetryPolicy,
    feed: FeedSender,
    shutdown: watch::Receiver<bool>,
}

impl<S: FeedSource> FeedSupervisor<S> {
    pub fn new(
        source: S,
        policy: RetryPolicy,
        feed: FeedSender,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            source,
            policy,
            feed,
            shutdown,
        }
    }

    #[instrument(name = "feed_supervisor", skip(self), fields(source = %self.source.name()))]
    pub async fn run(mut self) -> FeedExit {
        let mut failures: u32 = 0;
        let mut attempt: u64 = 0;

        loop {
            attempt += 1;
            let delivered_before = self.feed.delivered_batches();
            info!(attempt, "Starting feed");

            let result = tokio::select! {
                _ = wait_shutdown(&mut self.shutdown) => return FeedExit::Shutdown,
                result = self.source.run(&self.feed) => result,
            };

            let err = match result {
                Ok(()) => {
                    info!(attempt, "Feed completed");
                    return FeedExit::Completed;
                }
                Err(e) => e,
            };

            if self.feed.delivered_batches() > delivered_before {
                failures = 0;
            }
            failures += 1;
            observability::metrics::record_feed_failure(self.source.name());
            error!(attempt, failures, error = %err, "Feed failed");

            if !self.policy.should_retry(failures) {
                error!(failures, "Retry policy exhausted, feed stopped");
                return FeedExit::GaveUp { failures };
            }

            let delay = self.policy.backoff(failures);
            warn!(delay_ms = delay.as_millis() as u64, "Retrying feed after backoff");
            tokio::select! {
                _ = wait_shutdown(&mut self.shutdown) => return FeedExit::Shutdown,
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }
}

async fn wait_shutdown(rx: &mut watch::Receiver<bool>) {
    loop {
        let stop = *rx.borrow_and_update();
        if stop || rx.changed().await.is_err() {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{IngestionError, Result};
    use crate::queue::feed_channel;
    use contracts::IngestionConfig;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    /// Scripted attempt results; `true` delivers one batch before the result
    struct ScriptedFeed {
        script: VecDeque<(bool, bool)>,
        attempts: Arc<AtomicU32>,
    }

    impl ScriptedFeed {
        fn new(script: &[(bool, bool)]) -> (Self, Arc<AtomicU32>) {
            let attempts = Arc::new(AtomicU32::new(0));
            let feed = Self {
                script: script.iter().copied().collect(),
                attempts: Arc::clone(&attempts),
            };
            (feed, attempts)
        }
    }

    impl FeedSource for ScriptedFeed {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn run(&mut self, feed: &FeedSender) -> Result<()> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            let (deliver, succeed) = self.script.pop_front().unwrap_or((false, false));
            if deliver {
                feed.deliver("Position.z", json!([{"RacingNumber": "1"}]))
                    .await?;
            }
            if succeed {
                Ok(())
            } else {
                Err(IngestionError::feed("scripted", "connection dropped"))
            }
        }
    }

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            initial_backoff_ms: 1,
            max_backoff_ms: 5,
            multiplier: 2.0,
            max_attempts,
        }
    }

    #[tokio::test]
    async fn test_clean_end_completes() {
        let (sender, _receivers) = feed_channel(&IngestionConfig::default());
        let (_tx, shutdown) = watch::channel(false);
        let (feed, attempts) = ScriptedFeed::new(&[(false, false), (false, true)]);

        let exit = FeedSupervisor::new(feed, fast_policy(5), sender, shutdown)
            .run()
            .await;

        assert_eq!(exit, FeedExit::Completed);
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let (sender, _receivers) = feed_channel(&IngestionConfig::default());
        let (_tx, shutdown) = watch::channel(false);
        let (feed, attempts) = ScriptedFeed::new(&[]);

        let exit = FeedSupervisor::new(feed, fast_policy(3), sender, shutdown)
            .run()
            .await;

        assert_eq!(exit, FeedExit::GaveUp { failures: 3 });
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_no_retry_policy_stops_after_first_failure() {
        let (sender, _receivers) = feed_channel(&IngestionConfig::default());
        let (_tx, shutdown) = watch::channel(false);
        let (feed, attempts) = ScriptedFeed::new(&[]);

        let exit = FeedSupervisor::new(feed, RetryPolicy::no_retry(), sender, shutdown)
            .run()
            .await;

        assert_eq!(exit, FeedExit::GaveUp { failures: 1 });
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_progress_resets_failure_count() {
        let (sender, _receivers) = feed_channel(&IngestionConfig::default());
        let (_tx, shutdown) = watch::channel(false);
        // An attempt that made progress counts as the first failure of a
        // new run, so with two allowed only the final pair gives up
        let (feed, attempts) = ScriptedFeed::new(&[
            (false, false),
            (true, false),
            (true, false),
            (true, false),
            (false, false),
        ]);

        let exit = FeedSupervisor::new(feed, fast_policy(2), sender, shutdown)
            .run()
            .await;

        assert_eq!(exit, FeedExit::GaveUp { failures: 2 });
        assert_eq!(attempts.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn test_shutdown_interrupts_backoff() {
        let (sender, _receivers) = feed_channel(&IngestionConfig::default());
        let (tx, shutdown) = watch::channel(false);
        let (feed, _) = ScriptedFeed::new(&[]);
        let policy = RetryPolicy {
            initial_backoff_ms: 60_000,
            max_backoff_ms: 60_000,
            ..Default::default()
        };

        let task = tokio::spawn(FeedSupervisor::new(feed, policy, sender, shutdown).run());
        tokio::time::sleep(Duration::from_millis(20)).await;
        tx.send(true).unwrap();

        let exit = tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(exit, FeedExit::Shutdown);
    }
}
