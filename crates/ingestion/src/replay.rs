//! Replay Feed - plays back a recorded session file
//!
//! The recording is JSON lines, one upstream message per line:
//!
//! ```text
//! {"timestamp": 12.5, "topic": "Position.z", "records": [...]}
//! ```
//!
//! Messages are delivered at the recorded pace, scaled by a speed multiplier.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info, warn};

use crate::error::{IngestionError, Result};
use crate::queue::FeedSender;
use crate::source::FeedSource;

/// One recorded upstream message
#[derive(Debug, Deserialize)]
struct ReplayEntry {
    /// Seconds since the start of the recording
    #[serde(default)]
    timestamp: Option<f64>,
    topic: String,
    records: Value,
}

/// Per-pass counters
#[derive(Debug, Default, Clone, Copy)]
struct PassStats {
    lines: u64,
    delivered: u64,
    ignored: u64,
    malformed: u64,
}

/// Replay Feed
#[derive(Debug, Clone)]
pub struct ReplayFeed {
    name: String,
    path: PathBuf,
    speed: f64,
    loop_playback: bool,
}

impl ReplayFeed {
    pub fn new(path: impl Into<PathBuf>, speed: f64, loop_playback: bool) -> Self {
        let path = path.into();
        Self {
            name: format!("replay:{}", path.display()),
            path,
            speed: if speed > 0.0 && speed.is_finite() { speed } else { 1.0 },
            loop_playback,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Recorded delay scaled by the speed multiplier
    fn pacing(&self, previous: Option<f64>, current: Option<f64>) -> Option<Duration> {
        let delta = current? - previous?;
        if !(delta > 0.0 && delta.is_finite()) {
            return None;
        }
        match Duration::try_from_secs_f64(delta / self.speed) {
            Ok(delay) => Some(delay),
            Err(e) => {
                warn!(
                    delta,
                    speed = self.speed,
                    error = %e,
                    "Replay gap out of range, not pacing"
                );
                None
            }
        }
    }

    async fn play_once(&self, feed: &FeedSender) -> Result<PassStats> {
        let file = File::open(&self.path).await?;
        let mut lines = BufReader::new(file).lines();
        let mut stats = PassStats::default();
        let mut last_timestamp: Option<f64> = None;

        while let Some(line) = lines.next_line().await? {
            stats.lines += 1;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let entry: ReplayEntry = match serde_json::from_str(line) {
                Ok(entry) => entry,
                Err(e) => {
                    stats.malformed += 1;
                    warn!(line = stats.lines, error = %e, "Skipping malformed replay line");
                    continue;
                }
            };

            if let Some(delay) = self.pacing(last_timestamp, entry.timestamp) {
                tokio::time::sleep(delay).await;
            }
            if entry.timestamp.is_some() {
                last_timestamp = entry.timestamp;
            }

            if feed.deliver(&entry.topic, entry.records).await? {
                stats.delivered += 1;
            } else {
                stats.ignored += 1;
            }
        }

        Ok(stats)
    }
}

impl FeedSource for ReplayFeed {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&mut self, feed: &FeedSender) -> Result<()> {
        info!(
            path = %self.path.display(),
            speed = self.speed,
            loop_playback = self.loop_playback,
            "Replay started"
        );

        let mut pass: u64 = 0;
        loop {
            pass += 1;
            let stats = self.play_once(feed).await.map_err(|e| match e {
                IngestionError::Io(io) => IngestionError::feed(
                    self.name.clone(),
                    format!("cannot read {}: {io}", self.path.display()),
                ),
                other => other,
            })?;

            info!(
                pass,
                delivered = stats.delivered,
                ignored = stats.ignored,
                malformed = stats.malformed,
                "Replay pass finished"
            );

            if !self.loop_playback {
                return Ok(());
            }
            if stats.delivered == 0 {
                debug!("Nothing delivered in last pass, stopping loop");
                return Ok(());
            }
        }
    }
}
