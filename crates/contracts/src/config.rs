//! RelayConfig - Config Loader output
//!
//! Every field carries a default, so an empty file yields a runnable relay.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::{ChannelMap, Topic};

/// Config version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// Full relay configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RelayConfig {
    #[serde(default)]
    pub version: ConfigVersion,

    /// Subscriber-facing listener
    #[serde(default)]
    pub server: ServerConfig,

    /// Fan-out behaviour
    #[serde(default)]
    pub hub: HubConfig,

    /// Feed queues and normalization
    #[serde(default)]
    pub ingestion: IngestionConfig,

    /// Which in-process feed source drives the relay
    #[serde(default)]
    pub feed: FeedConfig,

    /// Upstream failure policy
    #[serde(default)]
    pub retry: RetryPolicy,
}

/// Listener configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address to bind to (all interfaces by default)
    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,

    /// Maximum concurrent subscribers (0 = unlimited)
    #[serde(default)]
    pub max_connections: usize,

    /// WebSocket handshake must complete within this time
    #[serde(default = "default_handshake_timeout_ms")]
    pub handshake_timeout_ms: u64,
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8765))
}

fn default_handshake_timeout_ms() -> u64 {
    5_000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            max_connections: 0,
            handshake_timeout_ms: default_handshake_timeout_ms(),
        }
    }
}

impl ServerConfig {
    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_ms)
    }
}

/// Broadcast hub configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HubConfig {
    /// Per-subscriber outbound queue depth
    #[serde(default = "default_subscriber_queue_capacity")]
    pub subscriber_queue_capacity: usize,

    /// Upper bound for a single send to one subscriber
    #[serde(default = "default_send_timeout_ms")]
    pub send_timeout_ms: u64,
}

fn default_subscriber_queue_capacity() -> usize {
    64
}

fn default_send_timeout_ms() -> u64 {
    2_000
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            subscriber_queue_capacity: default_subscriber_queue_capacity(),
            send_timeout_ms: default_send_timeout_ms(),
        }
    }
}

impl HubConfig {
    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }
}

/// Ingestion configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestionConfig {
    /// Per-topic queue depth between feed and pipeline
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Upstream name of the position topic
    #[serde(default = "default_position_topic")]
    pub position_topic: String,

    /// Upstream name of the car data topic
    #[serde(default = "default_telemetry_topic")]
    pub telemetry_topic: String,

    /// Channel index table for car data
    #[serde(default)]
    pub channels: ChannelMap,
}

fn default_queue_capacity() -> usize {
    256
}

fn default_position_topic() -> String {
    "Position.z".to_string()
}

fn default_telemetry_topic() -> String {
    "CarData.z".to_string()
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
            position_topic: default_position_topic(),
            telemetry_topic: default_telemetry_topic(),
            channels: ChannelMap::default(),
        }
    }
}

impl IngestionConfig {
    /// Map an upstream topic name to a topic kind
    pub fn resolve_topic(&self, upstream: &str) -> Option<Topic> {
        if upstream == self.position_topic {
            Some(Topic::Position)
        } else if upstream == self.telemetry_topic {
            Some(Topic::Telemetry)
        } else {
            None
        }
    }

    /// Upstream name of a topic kind
    pub fn upstream_name(&self, topic: Topic) -> &str {
        match topic {
            Topic::Position => &self.position_topic,
            Topic::Telemetry => &self.telemetry_topic,
        }
    }
}

/// Feed source selection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FeedConfig {
    /// Replay a recorded JSON-lines session
    Replay {
        path: PathBuf,

        /// Playback speed multiplier (1.0 = recorded pace)
        #[serde(default = "default_replay_speed")]
        speed: f64,

        /// Restart from the beginning when the file ends
        #[serde(default)]
        loop_playback: bool,
    },

    /// Synthetic cars on a circular track
    Mock {
        #[serde(default = "default_mock_cars")]
        cars: u32,

        #[serde(default = "default_mock_frequency_hz")]
        frequency_hz: f64,

        /// Stop after this many batches per topic (None = run forever)
        #[serde(default)]
        max_batches: Option<u64>,
    },
}

fn default_replay_speed() -> f64 {
    1.0
}

fn default_mock_cars() -> u32 {
    20
}

fn default_mock_frequency_hz() -> f64 {
    4.0
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self::Mock {
            cars: default_mock_cars(),
            frequency_hz: default_mock_frequency_hz(),
            max_batches: None,
        }
    }
}

impl FeedConfig {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Replay { .. } => "replay",
            Self::Mock { .. } => "mock",
        }
    }
}

/// Retry policy for upstream feed failures
///
/// Delay before retry `n` (1-based, consecutive failures) is
/// `initial_backoff * multiplier^(n-1)`, capped at `max_backoff`.
/// `max_attempts = 0` disables automatic retry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    #[serde(default = "default_multiplier")]
    pub multiplier: f64,

    /// Consecutive failed attempts after which supervision gives up
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

fn default_initial_backoff_ms() -> u64 {
    500
}

fn default_max_backoff_ms() -> u64 {
    30_000
}

fn default_multiplier() -> f64 {
    2.0
}

fn default_max_attempts() -> u32 {
    10
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            multiplier: default_multiplier(),
            max_attempts: default_max_attempts(),
        }
    }
}

impl RetryPolicy {
    /// Policy that never retries
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 0,
            ..Self::default()
        }
    }

    /// Whether another attempt is allowed after `failures` consecutive failures
    pub fn should_retry(&self, failures: u32) -> bool {
        failures < self.max_attempts
    }

    /// Delay before the retry following `failures` consecutive failures
    pub fn backoff(&self, failures: u32) -> Duration {
        let exponent = failures.saturating_sub(1).min(63) as i32;
        let delay_ms = self.initial_backoff_ms as f64 * self.multiplier.powi(exponent);
        let capped = delay_ms.min(self.max_backoff_ms as f64).max(0.0);
        Duration::from_millis(capped as u64)
    }
}
