//! Configuration validation
//!
//! Rules:
//! - queue capacities and timeouts > 0
//! - retry backoff bounds ordered, multiplier >= 1
//! - upstream topic names non-empty and distinct
//! - channel keys non-empty and distinct
//! - feed parameters in range

use std::collections::HashSet;

use contracts::{ContractError, FeedConfig, RelayConfig};

/// Validate a RelayConfig
///
/// Returns the first error encountered, or Ok(()).
pub fn validate(config: &RelayConfig) -> Result<(), ContractError> {
    validate_server(config)?;
    validate_hub(config)?;
    validate_ingestion(config)?;
    validate_channels(config)?;
    validate_feed(config)?;
    validate_retry(config)?;
    Ok(())
}

fn validate_server(config: &RelayConfig) -> Result<(), ContractError> {
    if config.server.handshake_timeout_ms == 0 {
        return Err(ContractError::config_validation(
            "server.handshake_timeout_ms",
            "handshake_timeout_ms must be > 0",
        ));
    }
    Ok(())
}

fn validate_hub(config: &RelayConfig) -> Result<(), ContractError> {
    let hub = &config.hub;

    if hub.subscriber_queue_capacity == 0 {
        return Err(ContractError::config_validation(
            "hub.subscriber_queue_capacity",
            "subscriber_queue_capacity must be > 0",
        ));
    }
    if hub.send_timeout_ms == 0 {
        return Err(ContractError::config_validation(
            "hub.send_timeout_ms",
            "send_timeout_ms must be > 0",
        ));
    }
    Ok(())
}

fn validate_ingestion(config: &RelayConfig) -> Result<(), ContractError> {
    let ingestion = &config.ingestion;

    if ingestion.queue_capacity == 0 {
        return Err(ContractError::config_validation(
            "ingestion.queue_capacity",
            "queue_capacity must be > 0",
        ));
    }

    for (field, topic) in [
        ("ingestion.position_topic", &ingestion.position_topic),
        ("ingestion.telemetry_topic", &ingestion.telemetry_topic),
    ] {
        if topic.trim().is_empty() {
            return Err(ContractError::config_validation(
                field,
                "topic name cannot be empty",
            ));
        }
    }

    if ingestion.position_topic == ingestion.telemetry_topic {
        return Err(ContractError::config_validation(
            "ingestion.telemetry_topic",
            format!(
                "duplicate topic name '{}' used for both position and telemetry",
                ingestion.telemetry_topic
            ),
        ));
    }
    Ok(())
}

/// Each telemetry field must read its own channel
fn validate_channels(config: &RelayConfig) -> Result<(), ContractError> {
    let mut seen = HashSet::new();
    for (field, key) in config.ingestion.channels.entries() {
        if key.trim().is_empty() {
            return Err(ContractError::config_validation(
                format!("ingestion.channels.{}", field.as_str()),
                "channel key cannot be empty",
            ));
        }
        if !seen.insert(key) {
            return Err(ContractError::config_validation(
                format!("ingestion.channels.{}", field.as_str()),
                format!("duplicate channel key '{key}'"),
            ));
        }
    }
    Ok(())
}

fn validate_feed(config: &RelayConfig) -> Result<(), ContractError> {
    match &config.feed {
        FeedConfig::Replay { path, speed, .. } => {
            if path.as_os_str().is_empty() {
                return Err(ContractError::config_validation(
                    "feed.path",
                    "replay path cannot be empty",
                ));
            }
            if *speed <= 0.0 || !speed.is_finite() {
                return Err(ContractError::config_validation(
                    "feed.speed",
                    format!("speed must be a finite number > 0, got {speed}"),
                ));
            }
        }
        FeedConfig::Mock {
            cars, frequency_hz, ..
        } => {
            if *cars == 0 {
                return Err(ContractError::config_validation(
                    "feed.cars",
                    "cars must be > 0",
                ));
            }
            if *frequency_hz <= 0.0 || !frequency_hz.is_finite() {
                return Err(ContractError::config_validation(
                    "feed.frequency_hz",
                    format!("frequency_hz must be a finite number > 0, got {frequency_hz}"),
                ));
            }
        }
    }
    Ok(())
}

fn validate_retry(config: &RelayConfig) -> Result<(), ContractError> {
    let retry = &config.retry;

    if retry.multiplier < 1.0 || !retry.multiplier.is_finite() {
        return Err(ContractError::config_validation(
            "retry.multiplier",
            format!("multiplier must be >= 1.0, got {}", retry.multiplier),
        ));
    }
    if retry.initial_backoff_ms > retry.max_backoff_ms {
        return Err(ContractError::config_validation(
            "retry.initial_backoff_ms / retry.max_backoff_ms",
            format!(
                "initial_backoff_ms ({}) must be <= max_backoff_ms ({})",
                retry.initial_backoff_ms, retry.max_backoff_ms
            ),
        ));
    }
    Ok(())
}
