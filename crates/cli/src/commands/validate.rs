//! `validate` command implementation.

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

use contracts::{FeedConfig, RelayConfig};

use crate::cli::ValidateArgs;
use crate::commands::{load_config, ConfigSource};

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    warnings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    bind_addr: String,
    feed: &'static str,
    position_topic: String,
    telemetry_topic: String,
    max_connections: usize,
    retry_max_attempts: u32,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = ?args.config, "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let requested = args
        .config
        .as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| ConfigSource::Defaults.to_string());

    match load_config(args.config.as_deref()) {
        Ok((config, source)) => ValidationResult {
            valid: true,
            config_path: source.to_string(),
            error: None,
            warnings: collect_warnings(&config),
            summary: Some(ConfigSummary {
                bind_addr: config.server.bind_addr.to_string(),
                feed: config.feed.kind(),
                position_topic: config.ingestion.position_topic.clone(),
                telemetry_topic: config.ingestion.telemetry_topic.clone(),
                max_connections: config.server.max_connections,
                retry_max_attempts: config.retry.max_attempts,
            }),
        },
        Err(e) => ValidationResult {
            valid: false,
            config_path: requested,
            error: Some(e.to_string()),
            warnings: Vec::new(),
            summary: None,
        },
    }
}

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(config: &RelayConfig) -> Vec<String> {
    let mut warnings = Vec::new();

    if config.retry.max_attempts == 0 {
        warnings.push("retry.max_attempts is 0 - a failed feed is never restarted".to_string());
    }

    if config.server.max_connections == 0 {
        warnings.push("server.max_connections is 0 - subscriber count is unbounded".to_string());
    }

    if let FeedConfig::Replay { path, .. } = &config.feed {
        if !path.exists() {
            warnings.push(format!("Replay file does not exist yet: {}", path.display()));
        }
    }

    if config.hub.send_timeout_ms > 10_000 {
        warnings.push(format!(
            "hub.send_timeout_ms is {} - a stalled subscriber delays every publish that long",
            config.hub.send_timeout_ms
        ));
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Bind: {}", summary.bind_addr);
            println!("  Feed: {}", summary.feed);
            println!(
                "  Topics: {} / {}",
                summary.position_topic, summary.telemetry_topic
            );
            println!("  Max connections: {}", summary.max_connections);
            println!("  Retry attempts: {}", summary.retry_max_attempts);
        }

        if !result.warnings.is_empty() {
            println!("\n⚠ Warnings:");
            for warning in &result.warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}
