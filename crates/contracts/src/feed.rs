//! Upstream feed types - Ingestion input
//!
//! Raw records are kept as untyped JSON: the upstream shape is sparse and
//! inconsistently keyed, so typing happens only in the Normalizer.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One raw upstream record
pub type RawRecord = serde_json::Value;

/// Upstream topic kinds the relay consumes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Topic {
    /// Car positions (`Position.z` upstream)
    Position,
    /// Per-car channel samples (`CarData.z` upstream)
    Telemetry,
}

impl Topic {
    pub const ALL: [Topic; 2] = [Topic::Position, Topic::Telemetry];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Position => "position",
            Self::Telemetry => "telemetry",
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered group of raw records delivered together for one topic
#[derive(Debug, Clone, PartialEq)]
pub struct RawBatch {
    pub topic: Topic,
    pub records: Vec<RawRecord>,
}

impl RawBatch {
    pub fn new(topic: Topic, records: Vec<RawRecord>) -> Self {
        Self { topic, records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
