//! `info` command implementation.

use anyhow::{Context, Result};
use tracing::info;

use config_loader::ConfigLoader;
use contracts::{FeedConfig, RelayConfig};

use crate::cli::InfoArgs;
use crate::commands::{load_config, ConfigSource};

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    let (config, source) = load_config(args.config.as_deref())?;
    info!(config = %source, "Loaded configuration info");

    if args.json {
        let json = ConfigLoader::to_json(&config).context("Failed to serialize config")?;
        println!("{}", json);
    } else {
        print_config_info(&config, &source);
    }

    Ok(())
}

fn print_config_info(config: &RelayConfig, source: &ConfigSource) {
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║                  F1 Relay Configuration                      ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");
    println!("Source: {source}\n");

    let server = &config.server;
    println!("Server");
    println!("   ├─ Version: {:?}", config.version);
    println!("   ├─ Bind: {}", server.bind_addr);
    if server.max_connections == 0 {
        println!("   ├─ Max connections: unlimited");
    } else {
        println!("   ├─ Max connections: {}", server.max_connections);
    }
    println!("   └─ Handshake timeout: {} ms", server.handshake_timeout_ms);

    println!("\nHub");
    println!(
        "   ├─ Subscriber queue: {}",
        config.hub.subscriber_queue_capacity
    );
    println!("   └─ Send timeout: {} ms", config.hub.send_timeout_ms);

    let ingestion = &config.ingestion;
    println!("\nIngestion");
    println!("   ├─ Queue capacity: {}", ingestion.queue_capacity);
    println!("   ├─ Position topic: {}", ingestion.position_topic);
    println!("   ├─ Telemetry topic: {}", ingestion.telemetry_topic);
    println!("   └─ Channels:");
    let entries: Vec<_> = ingestion.channels.entries().collect();
    for (i, (field, key)) in entries.iter().enumerate() {
        let prefix = if i == entries.len() - 1 { "└─" } else { "├─" };
        println!("         {} {:<8} <- {}", prefix, field.as_str(), key);
    }

    println!("\nFeed");
    match &config.feed {
        FeedConfig::Replay {
            path,
            speed,
            loop_playback,
        } => {
            println!("   ├─ Kind: replay");
            println!("   ├─ Path: {}", path.display());
            println!("   ├─ Speed: {speed}x");
            println!("   └─ Loop: {loop_playback}");
        }
        FeedConfig::Mock {
            cars,
            frequency_hz,
            max_batches,
        } => {
            println!("   ├─ Kind: mock");
            println!("   ├─ Cars: {cars}");
            println!("   ├─ Frequency: {frequency_hz} Hz");
            match max_batches {
                Some(max) => println!("   └─ Max batches: {max}"),
                None => println!("   └─ Max batches: unlimited"),
            }
        }
    }

    let retry = &config.retry;
    println!("\nRetry");
    if retry.max_attempts == 0 {
        println!("   └─ Disabled (manual restart)");
    } else {
        println!("   ├─ Max attempts: {}", retry.max_attempts);
        println!(
            "   ├─ Backoff: {} ms x{} up to {} ms",
            retry.initial_backoff_ms, retry.multiplier, retry.max_backoff_ms
        );
        println!("   └─ First retry after: {:?}", retry.backoff(1));
    }

    println!();
}
