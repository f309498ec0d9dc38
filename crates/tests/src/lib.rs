//! # Integration Tests
//!
//! Integration and end-to-end tests.
//!
//! Covers:
//! - Contract snapshots (config round trip, wire shape)
//! - Feed -> pipeline -> hub -> WebSocket subscriber flows

#[cfg(test)]
mod contract_tests {
    use config_loader::{ConfigFormat, ConfigLoader};
    use contracts::{FeedConfig, RelayConfig};

    #[test]
    fn test_empty_config_is_runnable() {
        let config = ConfigLoader::load_from_str("", ConfigFormat::Toml).unwrap();
        assert_eq!(config.server.bind_addr.port(), 8765);
        assert_eq!(config.feed.kind(), "mock");
    }

    #[test]
    fn test_config_round_trips_through_toml() {
        let mut config = RelayConfig::default();
        config.ingestion.channels.drs = "46".to_string();
        config.feed = FeedConfig::Replay {
            path: "race.jsonl".into(),
            speed: 2.0,
            loop_playback: true,
        };

        let text = ConfigLoader::to_toml(&config).unwrap();
        let reloaded = ConfigLoader::load_from_str(&text, ConfigFormat::Toml).unwrap();

        assert_eq!(reloaded.ingestion.channels, config.ingestion.channels);
        assert_eq!(reloaded.feed, config.feed);
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::io::Write;
    use std::net::SocketAddr;
    use std::sync::Arc;
    use std::time::Duration;

    use config_loader::{ConfigFormat, ConfigLoader};
    use contracts::{
        ContractError, DeliveryOutcome, MessageSink, RelayConfig, SubscriberId, WireFrame,
    };
    use futures::StreamExt;
    use hub::{BroadcastHub, SubscriberHandle, SubscriberRegistry};
    use ingestion::{
        feed_channel, FeedExit, FeedSender, FeedSupervisor, IngestionPipeline, ReplayFeed,
    };
    use race_state::RaceStateCache;
    use serde_json::{json, Value};
    use server::RelayServer;
    use tokio::sync::watch;
    use tokio::task::JoinHandle;
    use tokio_tungstenite::tungstenite::Message;

    const WAIT: Duration = Duration::from_secs(5);

    type Client = tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    >;

    /// A full relay stack minus the feed source
    struct Stack {
        addr: SocketAddr,
        registry: Arc<SubscriberRegistry>,
        cache: Arc<RaceStateCache>,
        hub: Arc<BroadcastHub>,
        feed: FeedSender,
        shutdown: watch::Sender<bool>,
        flows: Vec<JoinHandle<()>>,
        server: JoinHandle<Result<(), server::ServerError>>,
    }

    impl Stack {
        async fn start(mut config: RelayConfig) -> Self {
            config.server.bind_addr = "127.0.0.1:0".parse().unwrap();

            let cache = Arc::new(RaceStateCache::new());
            let registry = Arc::new(SubscriberRegistry::new());
            let hub = Arc::new(BroadcastHub::new(Arc::clone(&registry)));

            let server = RelayServer::bind(&config, Arc::clone(&registry), Arc::clone(&cache))
                .await
                .unwrap();
            let addr = server.local_addr().unwrap();
            let (shutdown, shutdown_rx) = watch::channel(false);
            let server = tokio::spawn(server.serve(shutdown_rx));

            let (feed, receivers) = feed_channel(&config.ingestion);
            let pipeline = Arc::new(IngestionPipeline::new(
                config.ingestion.channels.clone(),
                Arc::clone(&cache),
                Arc::clone(&hub),
            ));
            let flows = pipeline.spawn(receivers);

            Self {
                addr,
                registry,
                cache,
                hub,
                feed,
                shutdown,
                flows,
                server,
            }
        }

        async fn connect(&self) -> Client {
            let (client, _) = tokio_tungstenite::connect_async(format!("ws://{}", self.addr))
                .await
                .unwrap();
            client
        }

        async fn wait_members(&self, expected: usize) {
            tokio::time::timeout(WAIT, async {
                while self.registry.len().await != expected {
                    tokio::time::sleep(Duration::from_millis(10)).await;
                }
            })
            .await
            .expect("registry never reached expected size");
        }

        async fn stop(self) {
            self.feed.close();
            for flow in self.flows {
                tokio::time::timeout(WAIT, flow).await.unwrap().unwrap();
            }
            self.shutdown.send(true).unwrap();
            tokio::time::timeout(WAIT, self.server)
                .await
                .unwrap()
                .unwrap()
                .unwrap();
        }
    }

    /// Publish metrics are recorded after acknowledgements, so poll for them
    async fn wait_publishes(hub: &BroadcastHub, expected: u64) {
        tokio::time::timeout(WAIT, async {
            while hub.metrics().publish_count() < expected {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("publish count never reached expected value");
    }

    async fn next_json(client: &mut Client) -> Value {
        loop {
            let message = tokio::time::timeout(WAIT, client.next())
                .await
                .expect("timed out waiting for message")
                .expect("stream ended")
                .expect("read error");
            if let Message::Text(text) = message {
                return serde_json::from_str(text.as_str()).unwrap();
            }
        }
    }

    /// Sink that never completes a send
    struct StalledSink;

    impl MessageSink for StalledSink {
        fn name(&self) -> &str {
            "stalled"
        }

        async fn send(&mut self, _frame: &WireFrame) -> Result<(), ContractError> {
            std::future::pending().await
        }

        async fn close(&mut self) -> Result<(), ContractError> {
            Ok(())
        }
    }

    /// End-to-end: feed -> pipeline -> cache + hub -> WebSocket subscribers
    #[tokio::test]
    async fn test_e2e_feed_to_subscribers() {
        let stack = Stack::start(RelayConfig::default()).await;

        let mut first = stack.connect().await;
        let init = next_json(&mut first).await;
        assert_eq!(init["type"], "init");
        assert!(init["data"]["positions"].as_object().unwrap().is_empty());
        stack.wait_members(1).await;

        stack
            .feed
            .deliver(
                "Position.z",
                json!([
                    {"RacingNumber": "44", "X": 100, "Y": -50, "Z": 3, "Status": "OnTrack"},
                    {"X": 1, "Y": 2},
                    {"RacingNumber": "1", "X": 7}
                ]),
            )
            .await
            .unwrap();

        let positions = next_json(&mut first).await;
        assert_eq!(positions["type"], "positions");
        let drivers: Vec<_> = positions["data"]
            .as_array()
            .unwrap()
            .iter()
            .map(|entry| entry["driver"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(drivers, vec!["44", "1"]);
        assert_eq!(positions["data"][0]["pos"]["x"], 100.0);

        stack
            .feed
            .deliver(
                "CarData.z",
                json!([{"RacingNumber": "44", "Channels": {"0": 11000, "2": 305, "45": 12}}]),
            )
            .await
            .unwrap();

        let telemetry = next_json(&mut first).await;
        assert_eq!(telemetry["type"], "telemetry");
        assert_eq!(telemetry["data"][0]["telemetry"]["speed"], 305.0);
        assert_eq!(telemetry["data"][0]["telemetry"]["drs"], 12.0);

        // A late joiner starts from the accumulated state
        let mut second = stack.connect().await;
        let init = next_json(&mut second).await;
        assert_eq!(init["type"], "init");
        assert_eq!(init["data"]["positions"]["44"]["y"], -50.0);
        assert_eq!(init["data"]["positions"]["1"]["x"], 7.0);
        assert_eq!(init["data"]["telemetry"]["44"]["rpm"], 11000.0);
        assert_eq!(stack.cache.entity_count().await, 2);

        stack.stop().await;
    }

    #[tokio::test]
    async fn test_e2e_empty_batches_are_not_broadcast() {
        let stack = Stack::start(RelayConfig::default()).await;
        let mut client = stack.connect().await;
        next_json(&mut client).await;
        stack.wait_members(1).await;

        stack
            .feed
            .deliver("Position.z", json!([{"X": 1}, {"RacingNumber": ""}]))
            .await
            .unwrap();
        stack
            .feed
            .deliver("Position.z", json!([{"RacingNumber": "16", "X": 9}]))
            .await
            .unwrap();

        // The first message seen is the non-empty batch
        let message = next_json(&mut client).await;
        assert_eq!(message["type"], "positions");
        assert_eq!(message["data"][0]["driver"], "16");
        wait_publishes(&stack.hub, 1).await;
        assert_eq!(stack.hub.metrics().publish_count(), 1);

        stack.stop().await;
    }

    #[tokio::test]
    async fn test_e2e_stalled_subscriber_does_not_block_others() {
        let config = ConfigLoader::load_from_str(
            "[hub]\nsend_timeout_ms = 100\nsubscriber_queue_capacity = 4\n",
            ConfigFormat::Toml,
        )
        .unwrap();
        let stack = Stack::start(config.clone()).await;

        let stalled = Arc::new(SubscriberHandle::spawn(
            SubscriberId(10_000),
            StalledSink,
            config.hub.subscriber_queue_capacity,
            config.hub.send_timeout(),
        ));
        stack.registry.add(Arc::clone(&stalled)).await.unwrap();

        let mut client = stack.connect().await;
        next_json(&mut client).await;
        stack.wait_members(2).await;

        stack
            .feed
            .deliver("Position.z", json!([{"RacingNumber": "63", "X": 1}]))
            .await
            .unwrap();

        let message = next_json(&mut client).await;
        assert_eq!(message["data"][0]["driver"], "63");

        // The stalled send timed out and its worker closed the subscriber
        tokio::time::timeout(WAIT, stalled.closed()).await.unwrap();
        wait_publishes(&stack.hub, 1).await;
        let snapshot = stack.hub.metrics().snapshot();
        assert_eq!(snapshot.timed_out_count, 1);
        assert_eq!(snapshot.delivered_count, 1);

        // Later publishes see it as closed
        let report = stack
            .hub
            .publish_frame(
                &WireFrame::encode(&contracts::OutboundMessage::Positions(Vec::new())).unwrap(),
            )
            .await;
        assert_eq!(
            report.outcome(SubscriberId(10_000)),
            Some(&DeliveryOutcome::Closed)
        );

        stack.registry.remove(SubscriberId(10_000)).await;
        stalled.shutdown().await;
        stack.stop().await;
    }

    #[tokio::test]
    async fn test_e2e_channel_table_from_config() {
        let config = ConfigLoader::load_from_str(
            r#"{"ingestion": {"channels": {"drs": "46"}}}"#,
            ConfigFormat::Json,
        )
        .unwrap();
        let stack = Stack::start(config).await;
        let mut client = stack.connect().await;
        next_json(&mut client).await;
        stack.wait_members(1).await;

        stack
            .feed
            .deliver(
                "CarData.z",
                json!({"RacingNumber": 81, "Channels": {"45": 8, "46": 14}}),
            )
            .await
            .unwrap();

        let message = next_json(&mut client).await;
        assert_eq!(message["data"][0]["driver"], "81");
        assert_eq!(message["data"][0]["telemetry"]["drs"], 14.0);

        stack.stop().await;
    }

    #[tokio::test]
    async fn test_e2e_replay_feed_under_supervision() {
        let mut recording = tempfile::NamedTempFile::new().unwrap();
        for line in [
            r#"{"timestamp": 0.00, "topic": "Position.z", "records": [{"RacingNumber": "4", "X": 1}]}"#,
            r#"{"timestamp": 0.01, "topic": "TimingStats", "records": [{"RacingNumber": "4"}]}"#,
            "{broken",
            r#"{"timestamp": 0.02, "topic": "CarData.z", "records": [{"RacingNumber": "4", "Channels": {"3": 6}}]}"#,
            r#"{"timestamp": 0.03, "topic": "Position.z", "records": [{"RacingNumber": "4", "X": 2}]}"#,
        ] {
            writeln!(recording, "{line}").unwrap();
        }

        let stack = Stack::start(RelayConfig::default()).await;
        let mut client = stack.connect().await;
        next_json(&mut client).await;
        stack.wait_members(1).await;

        let (_stop, stop_rx) = watch::channel(false);
        let supervisor = FeedSupervisor::new(
            ReplayFeed::new(recording.path(), 10.0, false),
            contracts::RetryPolicy::default(),
            stack.feed.clone(),
            stop_rx,
        );
        let exit = tokio::time::timeout(WAIT, supervisor.run()).await.unwrap();
        assert_eq!(exit, FeedExit::Completed);

        let kinds: Vec<Value> = [
            next_json(&mut client).await,
            next_json(&mut client).await,
            next_json(&mut client).await,
        ]
        .into_iter()
        .map(|message| message["type"].clone())
        .collect();
        // Topics flow independently; position order is preserved
        assert_eq!(kinds.iter().filter(|k| *k == "positions").count(), 2);
        assert_eq!(kinds.iter().filter(|k| *k == "telemetry").count(), 1);

        let state = stack.cache.snapshot().await;
        assert_eq!(state.positions["4"].x, Some(2.0));
        assert_eq!(state.telemetry["4"].gear, Some(6.0));

        stack.stop().await;
    }
}
