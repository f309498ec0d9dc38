//! ChannelMap - upstream channel index -> telemetry field table
//!
//! Upstream car data arrives as `{"Channels": {"0": .., "2": .., ..}}`.
//! The DRS index in particular is not confirmed by any published schema, so
//! the whole table is overridable from configuration.

use serde::{Deserialize, Serialize};

/// Named telemetry fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TelemetryField {
    Rpm,
    Speed,
    Gear,
    Throttle,
    Brake,
    Drs,
}

impl TelemetryField {
    pub const ALL: [TelemetryField; 6] = [
        TelemetryField::Rpm,
        TelemetryField::Speed,
        TelemetryField::Gear,
        TelemetryField::Throttle,
        TelemetryField::Brake,
        TelemetryField::Drs,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rpm => "rpm",
            Self::Speed => "speed",
            Self::Gear => "gear",
            Self::Throttle => "throttle",
            Self::Brake => "brake",
            Self::Drs => "drs",
        }
    }
}

/// Channel key per telemetry field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelMap {
    pub rpm: String,
    pub speed: String,
    pub gear: String,
    pub throttle: String,
    pub brake: String,
    pub drs: String,
}

impl Default for ChannelMap {
    fn default() -> Self {
        Self {
            rpm: "0".to_string(),
            speed: "2".to_string(),
            gear: "3".to_string(),
            throttle: "4".to_string(),
            brake: "5".to_string(),
            drs: "45".to_string(),
        }
    }
}

impl ChannelMap {
    /// Channel key feeding `field`
    pub fn key(&self, field: TelemetryField) -> &str {
        match field {
            TelemetryField::Rpm => &self.rpm,
            TelemetryField::Speed => &self.speed,
            TelemetryField::Gear => &self.gear,
            TelemetryField::Throttle => &self.throttle,
            TelemetryField::Brake => &self.brake,
            TelemetryField::Drs => &self.drs,
        }
    }

    /// (field, channel key) pairs in field order
    pub fn entries(&self) -> impl Iterator<Item = (TelemetryField, &str)> + '_ {
        TelemetryField::ALL
            .into_iter()
            .map(move |field| (field, self.key(field)))
    }
}
