//! Normalizer - raw upstream records to stable race samples
//!
//! Total functions: every record either maps to a sample or is skipped.
//! Missing or unreadable fields become `None`, never an error.

use serde_json::Value;

use contracts::{
    ChannelMap, EntityId, OutboundMessage, PositionSample, PositionUpdate, RawBatch, RawRecord,
    TelemetryField, TelemetrySample, TelemetryUpdate, Topic,
};

/// Upstream field carrying the car number
pub const ENTITY_FIELD: &str = "RacingNumber";

/// Upstream field carrying the channel readings of a car data record
pub const CHANNELS_FIELD: &str = "Channels";

/// Read the entity id of a record
///
/// Strings are trimmed and must be non-empty; numbers are rendered as
/// decimal text, without a fraction when integral (`44.0` is car `44`).
/// Anything else has no addressable subject.
pub fn entity_id(record: &RawRecord) -> Option<EntityId> {
    match record.get(ENTITY_FIELD)? {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| EntityId::from(trimmed))
        }
        Value::Number(n) => Some(EntityId::from(racing_number(n))),
        _ => None,
    }
}

fn racing_number(n: &serde_json::Number) -> String {
    match n.as_f64() {
        Some(f) if n.is_f64() && f.fract() == 0.0 && f.abs() < i64::MAX as f64 => {
            (f as i64).to_string()
        }
        _ => n.to_string(),
    }
}

/// Finite number from a JSON number or a numeric string
fn number(value: Option<&Value>) -> Option<f64> {
    let n = match value? {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    n.is_finite().then_some(n)
}

fn text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Normalize one `Position` record
pub fn normalize_position(record: &RawRecord) -> Option<PositionUpdate> {
    let driver = entity_id(record)?;
    Some(PositionUpdate {
        driver,
        pos: PositionSample {
            x: number(record.get("X")),
            y: number(record.get("Y")),
            z: number(record.get("Z")),
            status: text(record.get("Status")),
        },
    })
}

/// Normalize one car data record through a channel table
pub fn normalize_telemetry(record: &RawRecord, channels: &ChannelMap) -> Option<TelemetryUpdate> {
    let driver = entity_id(record)?;
    let readings = record.get(CHANNELS_FIELD).and_then(Value::as_object);
    let read = |field: TelemetryField| readings.and_then(|r| number(r.get(channels.key(field))));

    Some(TelemetryUpdate {
        driver,
        telemetry: TelemetrySample {
            rpm: read(TelemetryField::Rpm),
            speed: read(TelemetryField::Speed),
            gear: read(TelemetryField::Gear),
            throttle: read(TelemetryField::Throttle),
            brake: read(TelemetryField::Brake),
            drs: read(TelemetryField::Drs),
        },
    })
}

/// Result of normalizing one batch
#[derive(Debug, Clone, PartialEq)]
pub struct Normalized {
    /// Outbound message in upstream order; may carry zero entries
    pub message: OutboundMessage,
    /// Records dropped for lack of an entity id
    pub skipped: usize,
}

impl Normalized {
    pub fn produced(&self) -> usize {
        self.message.entry_count()
    }
}

/// Batch normalizer bound to a channel table
#[derive(Debug, Clone, Default)]
pub struct Normalizer {
    channels: ChannelMap,
}

impl Normalizer {
    pub fn new(channels: ChannelMap) -> Self {
        Self { channels }
    }

    pub fn channels(&self) -> &ChannelMap {
        &self.channels
    }

    /// Normalize every record of a batch, preserving order
    pub fn normalize(&self, batch: &RawBatch) -> Normalized {
        let total = batch.records.len();
        let message = match batch.topic {
            Topic::Position => OutboundMessage::Positions(
                batch.records.iter().filter_map(normalize_position).collect(),
            ),
            Topic::Telemetry => OutboundMessage::Telemetry(
                batch
                    .records
                    .iter()
                    .filter_map(|record| normalize_telemetry(record, &self.channels))
                    .collect(),
            ),
        };
        let skipped = total - message.entry_count();
        Normalized { message, skipped }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_channel_mapping() {
        let record = json!({
            "RacingNumber": "44",
            "Channels": {"0": "9000", "2": "310", "3": "7", "4": "80", "5": "0"}
        });

        let update = normalize_telemetry(&record, &ChannelMap::default()).unwrap();
        assert_eq!(update.driver.as_str(), "44");
        assert_eq!(
            update.telemetry,
            TelemetrySample {
                rpm: Some(9000.0),
                speed: Some(310.0),
                gear: Some(7.0),
                throttle: Some(80.0),
                brake: Some(0.0),
                drs: None,
            }
        );
    }

    #[test]
    fn test_unmapped_channels_ignored() {
        let record = json!({
            "RacingNumber": 1,
            "Channels": {"0": 11000, "45": 12, "99": 5}
        });

        let update = normalize_telemetry(&record, &ChannelMap::default()).unwrap();
        assert_eq!(update.driver.as_str(), "1");
        assert_eq!(update.telemetry.rpm, Some(11000.0));
        assert_eq!(update.telemetry.drs, Some(12.0));
        assert_eq!(update.telemetry.speed, None);
    }

    #[test]
    fn test_overridden_channel_table() {
        let channels = ChannelMap {
            drs: "46".to_string(),
            ..Default::default()
        };
        let record = json!({"RacingNumber": "16", "Channels": {"45": 8, "46": 14}});

        let update = normalize_telemetry(&record, &channels).unwrap();
        assert_eq!(update.telemetry.drs, Some(14.0));
    }

    #[test]
    fn test_missing_channels_yields_empty_sample() {
        let record = json!({"RacingNumber": "16"});
        let update = normalize_telemetry(&record, &ChannelMap::default()).unwrap();
        assert_eq!(update.telemetry, TelemetrySample::default());
    }

    #[test]
    fn test_skip_without_entity() {
        let channels = ChannelMap::default();
        for record in [
            json!({"X": 1.0}),
            json!({"RacingNumber": "", "X": 1.0}),
            json!({"RacingNumber": "   "}),
            json!({"RacingNumber": null}),
            json!({"RacingNumber": true}),
            json!({"RacingNumber": {"n": 1}}),
            json!("not a record"),
            json!([1, 2, 3]),
        ] {
            assert!(normalize_position(&record).is_none(), "{record}");
            assert!(normalize_telemetry(&record, &channels).is_none(), "{record}");
        }
    }

    #[test]
    fn test_numeric_racing_numbers_match_text_form() {
        for (raw, expected) in [
            (json!(44), "44"),
            (json!(44.0), "44"),
            (json!(" 44 "), "44"),
            (json!(-3.0), "-3"),
            (json!(4.5), "4.5"),
        ] {
            let id = entity_id(&json!({"RacingNumber": raw})).unwrap();
            assert_eq!(id.as_str(), expected, "{raw}");
        }
    }

    #[test]
    fn test_position_fields() {
        let record = json!({
            "RacingNumber": " 81 ",
            "X": -1234.5,
            "Y": "678",
            "Z": "n/a",
            "Status": "OnTrack"
        });

        let update = normalize_position(&record).unwrap();
        assert_eq!(update.driver.as_str(), "81");
        assert_eq!(update.pos.x, Some(-1234.5));
        assert_eq!(update.pos.y, Some(678.0));
        assert_eq!(update.pos.z, None);
        assert_eq!(update.pos.status.as_deref(), Some("OnTrack"));
    }

    #[test]
    fn test_batch_keeps_order_and_counts_skips() {
        let batch = RawBatch::new(
            Topic::Position,
            vec![
                json!({"RacingNumber": "1", "X": 1}),
                json!({"X": 2}),
                json!({"RacingNumber": "44", "X": 3}),
            ],
        );

        let normalized = Normalizer::default().normalize(&batch);
        assert_eq!(normalized.produced(), 2);
        assert_eq!(normalized.skipped, 1);
        match normalized.message {
            OutboundMessage::Positions(updates) => {
                let drivers: Vec<_> = updates.iter().map(|u| u.driver.as_str()).collect();
                assert_eq!(drivers, vec!["1", "44"]);
            }
            other => panic!("unexpected message {other:?}"),
        }
    }
}
