//! Mock feed source
//!
//! Synthetic cars lapping a circular track, for running the relay without an
//! upstream connection.

use std::f64::consts::TAU;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::{json, Map, Value};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, trace};

use contracts::{ChannelMap, FeedConfig, IngestionConfig, TelemetryField};

use crate::error::Result;
use crate::queue::FeedSender;
use crate::source::FeedSource;

/// Track radius in upstream position units
const TRACK_RADIUS: f64 = 5_000.0;

/// Mock feed configuration
#[derive(Debug, Clone)]
pub struct MockFeedConfig {
    pub cars: u32,
    pub frequency_hz: f64,
    /// Stop after this many ticks (None = run forever)
    pub max_batches: Option<u64>,
    pub position_topic: String,
    pub telemetry_topic: String,
    pub channels: ChannelMap,
    pub seed: u64,
}

impl Default for MockFeedConfig {
    fn default() -> Self {
        let ingestion = IngestionConfig::default();
        Self {
            cars: 20,
            frequency_hz: 4.0,
            max_batches: None,
            position_topic: ingestion.position_topic,
            telemetry_topic: ingestion.telemetry_topic,
            channels: ingestion.channels,
            seed: 0x5eed,
        }
    }
}

impl MockFeedConfig {
    /// Build from the `[feed]` and `[ingestion]` sections
    ///
    /// Returns `None` when the feed is not a mock feed.
    pub fn from_config(feed: &FeedConfig, ingestion: &IngestionConfig) -> Option<Self> {
        match feed {
            FeedConfig::Mock {
                cars,
                frequency_hz,
                max_batches,
            } => Some(Self {
                cars: *cars,
                frequency_hz: *frequency_hz,
                max_batches: *max_batches,
                position_topic: ingestion.position_topic.clone(),
                telemetry_topic: ingestion.telemetry_topic.clone(),
                channels: ingestion.channels.clone(),
                ..Default::default()
            }),
            FeedConfig::Replay { .. } => None,
        }
    }
}

/// One simulated car
#[derive(Debug, Clone)]
struct MockCar {
    number: String,
    /// Lap progress in radians
    angle: f64,
    /// Radians per second
    pace: f64,
}

/// Mock feed source
pub struct MockFeed {
    config: MockFeedConfig,
    cars: Vec<MockCar>,
    rng: StdRng,
    ticks: u64,
}

impl MockFeed {
    pub fn new(config: MockFeedConfig) -> Self {
        let mut rng = StdRng::seed_from_u64(config.seed);
        let cars = (0..config.cars)
            .map(|i| MockCar {
                number: (i + 1).to_string(),
                angle: TAU * i as f64 / config.cars.max(1) as f64,
                pace: rng.random_range(0.07..0.09),
            })
            .collect();

        Self {
            config,
            cars,
            rng,
            ticks: 0,
        }
    }

    /// Ticks emitted so far (each tick is one batch per topic)
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    fn finished(&self) -> bool {
        self.config.max_batches.is_some_and(|max| self.ticks >= max)
    }

    fn advance(&mut self, dt: f64) {
        for car in &mut self.cars {
            car.angle = (car.angle + car.pace * dt) % TAU;
        }
    }

    fn position_records(&self) -> Value {
        let records = self
            .cars
            .iter()
            .map(|car| {
                json!({
                    "RacingNumber": car.number,
                    "X": (TRACK_RADIUS * car.angle.cos()).round(),
                    "Y": (TRACK_RADIUS * car.angle.sin()).round(),
                    "Z": 0.0,
                    "Status": "OnTrack",
                })
            })
            .collect();
        Value::Array(records)
    }

    fn telemetry_records(&mut self) -> Value {
        let mut records = Vec::with_capacity(self.cars.len());
        for car in &self.cars {
            let throttle: f64 = self.rng.random_range(0.0..=100.0_f64).round();
            let braking = throttle < 20.0;
            let speed = 120.0 + throttle * 2.1;
            let gear = (speed / 45.0).ceil().clamp(1.0, 8.0);

            let mut channels = Map::new();
            for (field, key) in self.config.channels.entries() {
                let value = match field {
                    TelemetryField::Rpm => json!((6_000.0 + throttle * 60.0).round()),
                    TelemetryField::Speed => json!(speed.round()),
                    TelemetryField::Gear => json!(gear),
                    TelemetryField::Throttle => json!(throttle),
                    TelemetryField::Brake => json!(if braking { 100 } else { 0 }),
                    TelemetryField::Drs => json!(if throttle > 95.0 { 12 } else { 8 }),
                };
                channels.insert(key.to_string(), value);
            }

            records.push(json!({
                "RacingNumber": car.number,
                "Channels": Value::Object(channels),
            }));
        }
        Value::Array(records)
    }
}

impl FeedSource for MockFeed {
    fn name(&self) -> &str {
        "mock"
    }

    async fn run(&mut self, feed: &FeedSender) -> Result<()> {
        let period = Duration::from_secs_f64(1.0 / self.config.frequency_hz.max(0.001));
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(
            cars = self.cars.len(),
            frequency_hz = self.config.frequency_hz,
            max_batches = ?self.config.max_batches,
            "Mock feed started"
        );

        while !self.finished() {
            ticker.tick().await;
            self.advance(period.as_secs_f64());

            let positions = self.position_records();
            let telemetry = self.telemetry_records();
            feed.deliver(&self.config.position_topic, positions).await?;
            feed.deliver(&self.config.telemetry_topic, telemetry).await?;

            self.ticks += 1;
            trace!(tick = self.ticks, "Mock tick delivered");
            if self.ticks.is_multiple_of(100) {
                debug!(ticks = self.ticks, "Mock feed progress");
            }
        }

        info!(ticks = self.ticks, "Mock feed finished");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalizer::Normalizer;
    use crate::queue::feed_channel;
    use contracts::OutboundMessage;

    fn config(cars: u32, max_batches: u64) -> MockFeedConfig {
        MockFeedConfig {
            cars,
            frequency_hz: 200.0,
            max_batches: Some(max_batches),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_stops_after_max_batches() {
        let (sender, receivers) = feed_channel(&IngestionConfig::default());
        let mut feed = MockFeed::new(config(3, 4));

        feed.run(&sender).await.unwrap();

        assert_eq!(feed.ticks(), 4);
        assert_eq!(sender.delivered_batches(), 8);
        assert_eq!(receivers.position.len(), 4);
        assert_eq!(receivers.telemetry.len(), 4);
    }

    #[tokio::test]
    async fn test_records_normalize_cleanly() {
        let (sender, receivers) = feed_channel(&IngestionConfig::default());
        MockFeed::new(config(5, 1)).run(&sender).await.unwrap();

        let normalizer = Normalizer::default();
        let positions = normalizer.normalize(&receivers.position.recv().await.unwrap());
        let telemetry = normalizer.normalize(&receivers.telemetry.recv().await.unwrap());

        assert_eq!(positions.produced(), 5);
        assert_eq!(positions.skipped, 0);
        match telemetry.message {
            OutboundMessage::Telemetry(updates) => {
                assert_eq!(updates.len(), 5);
                for update in updates {
                    assert!(update.telemetry.rpm.is_some());
                    assert!(update.telemetry.drs.is_some());
                    let gear = update.telemetry.gear.unwrap();
                    assert!((1.0..=8.0).contains(&gear));
                }
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_cars_stay_on_track() {
        let mut feed = MockFeed::new(config(4, 1));
        for _ in 0..50 {
            feed.advance(1.0);
        }
        for record in feed.position_records().as_array().unwrap() {
            let x = record["X"].as_f64().unwrap();
            let y = record["Y"].as_f64().unwrap();
            let radius = (x * x + y * y).sqrt();
            assert!((radius - TRACK_RADIUS).abs() < 2.0, "radius {radius}");
        }
    }

    #[test]
    fn test_from_config_only_for_mock() {
        let ingestion = IngestionConfig::default();
        let mock = MockFeedConfig::from_config(&FeedConfig::default(), &ingestion).unwrap();
        assert_eq!(mock.cars, 20);

        let replay = FeedConfig::Replay {
            path: "session.jsonl".into(),
            speed: 1.0,
            loop_playback: false,
        };
        assert!(MockFeedConfig::from_config(&replay, &ingestion).is_none());
    }
}
