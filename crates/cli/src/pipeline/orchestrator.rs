//! Relay orchestrator - wires cache, hub, server, pipeline and feed together.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use contracts::{FeedConfig, RelayConfig, SubscriberId};
use hub::{BroadcastHub, LogSink, SubscriberHandle, SubscriberRegistry};
use ingestion::{
    feed_channel, FeedExit, FeedSender, FeedSupervisor, IngestionPipeline, MockFeed,
    MockFeedConfig, ReplayFeed,
};
use race_state::RaceStateCache;
use server::RelayServer;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use super::RelayStats;
use crate::error::CliError;

/// How long shutdown waits for each stage to wind down
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Subscriber id reserved for the `--tap` logging subscriber
const TAP_SUBSCRIBER_ID: SubscriberId = SubscriberId(0);

/// Run options that are not part of the configuration file
#[derive(Debug, Clone, Default)]
pub struct RelayOptions {
    /// Register a logging subscriber alongside WebSocket clients
    pub tap: bool,

    /// Stop once the feed ends
    pub exit_on_feed_end: bool,

    /// Metrics server port (None = disabled)
    pub metrics_port: Option<u16>,
}

/// Main relay orchestrator
pub struct Relay {
    config: RelayConfig,
    options: RelayOptions,
}

impl Relay {
    pub fn new(config: RelayConfig, options: RelayOptions) -> Self {
        Self { config, options }
    }

    /// Run until `shutdown` resolves (or the feed ends, if so configured)
    pub async fn run<F>(self, shutdown: F) -> Result<RelayStats>
    where
        F: Future<Output = ()>,
    {
        let start_time = Instant::now();
        let config = &self.config;

        if let Some(port) = self.options.metrics_port {
            observability::init_metrics_only(port)?;
        }

        // Shared state
        let cache = Arc::new(RaceStateCache::new());
        let registry = Arc::new(SubscriberRegistry::new());
        let hub = Arc::new(BroadcastHub::new(Arc::clone(&registry)));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        // Subscriber-facing server
        let server = RelayServer::bind(config, Arc::clone(&registry), Arc::clone(&cache))
            .await
            .map_err(CliError::from)?;
        let bind_addr = server.local_addr().map_err(CliError::from)?;
        let server_task = tokio::spawn(server.serve(shutdown_rx.clone()));
        info!(addr = %bind_addr, "Accepting subscribers");

        let tap = if self.options.tap {
            Some(self.register_tap(&registry).await?)
        } else {
            None
        };

        // Ingestion
        let (sender, receivers) = feed_channel(&config.ingestion);
        let pipeline = Arc::new(IngestionPipeline::new(
            config.ingestion.channels.clone(),
            Arc::clone(&cache),
            Arc::clone(&hub),
        ));
        let flows = pipeline.spawn(receivers);
        let mut feed_task = self.spawn_feed(sender.clone(), shutdown_rx.clone())?;

        info!(feed = config.feed.kind(), "Relay running");

        // Wait for shutdown, sampling subscriber count
        let mut stats = RelayStats {
            bind_addr: Some(bind_addr),
            ..Default::default()
        };
        let mut ticker = tokio::time::interval(Duration::from_secs(1));
        let mut feed_running = true;
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                exit = &mut feed_task, if feed_running => {
                    feed_running = false;
                    stats.feed_exit = Some(match exit {
                        Ok(exit) => exit,
                        Err(e) => {
                            error!(error = %e, "Feed task panicked");
                            FeedExit::GaveUp { failures: 0 }
                        }
                    });
                    match stats.feed_exit {
                        Some(FeedExit::GaveUp { failures }) => {
                            error!(failures, "Feed stopped; serving last known state")
                        }
                        _ => info!("Feed ended; serving last known state"),
                    }
                    if self.options.exit_on_feed_end {
                        break;
                    }
                }
                _ = ticker.tick() => {
                    stats.subscribers.push(registry.len().await as f64);
                }
            }
        }

        // Shutdown: stop feed, drain flows, close sessions
        info!("Shutting down relay...");
        let _ = shutdown_tx.send(true);

        if feed_running {
            match tokio::time::timeout(DRAIN_TIMEOUT, &mut feed_task).await {
                Ok(Ok(exit)) => stats.feed_exit = Some(exit),
                Ok(Err(e)) => warn!(error = %e, "Feed task failed during shutdown"),
                Err(_) => {
                    warn!("Feed did not stop in time, aborting");
                    feed_task.abort();
                }
            }
        }

        sender.close();
        for flow in flows {
            if tokio::time::timeout(DRAIN_TIMEOUT, flow).await.is_err() {
                warn!("Ingestion flow did not drain in time");
            }
        }

        match tokio::time::timeout(DRAIN_TIMEOUT, server_task).await {
            Ok(Ok(Ok(()))) => {}
            Ok(Ok(Err(e))) => warn!(error = %e, "Server stopped with error"),
            Ok(Err(e)) => warn!(error = %e, "Server task failed"),
            Err(_) => warn!("Server did not stop in time"),
        }

        if let Some(tap) = tap {
            registry.remove(tap.id()).await;
            tap.shutdown().await;
        }

        stats.duration = start_time.elapsed();
        stats.feed_batches = sender.delivered_batches();
        stats.feed_unknown_topics = sender.stats().unknown_topic();
        stats.feed_malformed = sender.stats().malformed();
        stats.ingestion = pipeline.metrics().snapshot();
        stats.hub = hub.metrics().snapshot();
        stats.cars_tracked = cache.entity_count().await;

        info!(
            duration_secs = stats.duration.as_secs_f64(),
            publishes = stats.hub.publish_count,
            "Relay shutdown complete"
        );

        Ok(stats)
    }

    /// Register a subscriber that logs every published message
    async fn register_tap(&self, registry: &SubscriberRegistry) -> Result<Arc<SubscriberHandle>> {
        let handle = Arc::new(SubscriberHandle::spawn(
            TAP_SUBSCRIBER_ID,
            LogSink::new("tap"),
            self.config.hub.subscriber_queue_capacity,
            self.config.hub.send_timeout(),
        ));
        registry
            .add(Arc::clone(&handle))
            .await
            .map_err(CliError::from)
            .context("Failed to register tap subscriber")?;
        info!("Tap subscriber registered");
        Ok(handle)
    }

    /// Start the configured feed under supervision
    fn spawn_feed(
        &self,
        sender: FeedSender,
        shutdown: watch::Receiver<bool>,
    ) -> Result<JoinHandle<FeedExit>> {
        let retry = self.config.retry.clone();
        let task = match &self.config.feed {
            FeedConfig::Replay {
                path,
                speed,
                loop_playback,
            } => {
                info!(path = %path.display(), speed, loop_playback, "Running in REPLAY mode");
                let feed = ReplayFeed::new(path.clone(), *speed, *loop_playback);
                tokio::spawn(FeedSupervisor::new(feed, retry, sender, shutdown).run())
            }
            feed @ FeedConfig::Mock { .. } => {
                let mock = MockFeedConfig::from_config(feed, &self.config.ingestion)
                    .context("Mock feed configuration mismatch")?;
                info!(cars = mock.cars, frequency_hz = mock.frequency_hz, "Running in MOCK mode");
                let feed = MockFeed::new(mock);
                tokio::spawn(FeedSupervisor::new(feed, retry, sender, shutdown).run())
            }
        };
        Ok(task)
    }
}
