//! OutboundMessage - the subscriber-facing wire schema
//!
//! ```text
//! {"type":"init","data":{"positions":{..},"telemetry":{..}}}
//! {"type":"positions","data":[{"driver":"44","pos":{..}}, ..]}
//! {"type":"telemetry","data":[{"driver":"44","telemetry":{..}}, ..]}
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::{ContractError, PositionUpdate, RaceState, TelemetryUpdate};

/// Message pushed to subscribers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum OutboundMessage {
    /// Full snapshot, sent once when a subscriber joins
    Init(RaceState),

    /// Batch of position updates in upstream order
    Positions(Vec<PositionUpdate>),

    /// Batch of telemetry updates in upstream order
    Telemetry(Vec<TelemetryUpdate>),
}

impl OutboundMessage {
    /// Value of the `type` discriminator
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Init(_) => "init",
            Self::Positions(_) => "positions",
            Self::Telemetry(_) => "telemetry",
        }
    }

    /// Number of per-entity entries carried
    pub fn entry_count(&self) -> usize {
        match self {
            Self::Init(state) => state.positions.len() + state.telemetry.len(),
            Self::Positions(batch) => batch.len(),
            Self::Telemetry(batch) => batch.len(),
        }
    }
}

/// An `OutboundMessage` encoded once and shared by every subscriber send.
#[derive(Clone, PartialEq, Eq)]
pub struct WireFrame {
    kind: &'static str,
    text: Arc<str>,
}

impl WireFrame {
    /// Encode a message as JSON text
    pub fn encode(message: &OutboundMessage) -> Result<Self, ContractError> {
        let text = serde_json::to_string(message)
            .map_err(|e| ContractError::encode(message.kind(), e.to_string()))?;

        Ok(Self {
            kind: message.kind(),
            text: Arc::from(text),
        })
    }

    /// Message type this frame carries
    pub fn kind(&self) -> &'static str {
        self.kind
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

impl fmt::Debug for WireFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WireFrame")
            .field("kind", &self.kind)
            .field("bytes", &self.text.len())
            .finish()
    }
}
