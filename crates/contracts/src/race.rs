//! Race data model - Normalizer output and Snapshot Cache contents
//!
//! Every field of a sample is always present on the wire; absent values
//! serialize as `null` so consumers see one stable shape.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::EntityId;

/// Latest known car position
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PositionSample {
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub z: Option<f64>,

    /// Track status reported by the feed (e.g. "OnTrack")
    pub status: Option<String>,
}

/// Latest known car telemetry channels
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySample {
    pub rpm: Option<f64>,
    pub speed: Option<f64>,
    pub gear: Option<f64>,
    pub throttle: Option<f64>,
    pub brake: Option<f64>,
    pub drs: Option<f64>,
}

/// One entry of a `positions` batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionUpdate {
    pub driver: EntityId,
    pub pos: PositionSample,
}

/// One entry of a `telemetry` batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryUpdate {
    pub driver: EntityId,
    pub telemetry: TelemetrySample,
}

/// Full race state: at most one sample per entity per category.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RaceState {
    pub positions: HashMap<EntityId, PositionSample>,
    pub telemetry: HashMap<EntityId, TelemetrySample>,
}

impl RaceState {
    /// Create an empty race state
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the stored position of every entity in the batch
    pub fn apply_positions(&mut self, batch: &[PositionUpdate]) {
        for update in batch {
            self.positions.insert(update.driver.clone(), update.pos.clone());
        }
    }

    /// Replace the stored telemetry of every entity in the batch
    pub fn apply_telemetry(&mut self, batch: &[TelemetryUpdate]) {
        for update in batch {
            self.telemetry.insert(update.driver.clone(), update.telemetry.clone());
        }
    }

    /// Number of distinct entities known in either category
    pub fn entity_count(&self) -> usize {
        let mut count = self.positions.len();
        count += self
            .telemetry
            .keys()
            .filter(|id| !self.positions.contains_key(id.as_str()))
            .count();
        count
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty() && self.telemetry.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn position(driver: &str, x: f64, status: Option<&str>) -> PositionUpdate {
        PositionUpdate {
            driver: driver.into(),
            pos: PositionSample {
                x: Some(x),
                y: None,
                z: None,
                status: status.map(str::to_string),
            },
        }
    }

    #[test]
    fn test_apply_replaces_whole_sample() {
        let mut state = RaceState::new();
        state.apply_positions(&[position("1", 10.0, Some("OnTrack"))]);
        state.apply_positions(&[position("1", 20.0, None)]);

        let stored = &state.positions["1"];
        assert_eq!(stored.x, Some(20.0));
        // No field-level merge: the old status must not survive
        assert_eq!(stored.status, None);
    }

    #[test]
    fn test_entity_count_spans_categories() {
        let mut state = RaceState::new();
        state.apply_positions(&[position("1", 0.0, None), position("44", 0.0, None)]);
        state.apply_telemetry(&[TelemetryUpdate {
            driver: "44".into(),
            telemetry: TelemetrySample::default(),
        }]);
        state.apply_telemetry(&[TelemetryUpdate {
            driver: "16".into(),
            telemetry: TelemetrySample::default(),
        }]);

        assert_eq!(state.entity_count(), 3);
    }

    #[test]
    fn test_absent_fields_serialize_as_null() {
        let json = serde_json::to_value(TelemetrySample {
            rpm: Some(9000.0),
            ..Default::default()
        })
        .unwrap();

        assert_eq!(json["rpm"], 9000.0);
        assert!(json["drs"].is_null());
        assert_eq!(json.as_object().unwrap().len(), 6);
    }
}
