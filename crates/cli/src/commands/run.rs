//! `run` command implementation.

use anyhow::{Context, Result};
use tracing::{info, warn};

use config_loader::ConfigLoader;
use contracts::{FeedConfig, RelayConfig};

use crate::cli::RunArgs;
use crate::commands::load_config;
use crate::pipeline::{Relay, RelayOptions};

/// Execute the `run` command
pub async fn run_relay(args: &RunArgs) -> Result<()> {
    let (mut config, source) = load_config(args.config.as_deref())?;
    info!(config = %source, "Configuration loaded");

    apply_overrides(&mut config, args);
    ConfigLoader::validate(&config).context("Invalid configuration after CLI overrides")?;

    info!(
        bind = %config.server.bind_addr,
        feed = config.feed.kind(),
        max_connections = config.server.max_connections,
        "Starting relay"
    );

    let options = RelayOptions {
        tap: args.tap,
        exit_on_feed_end: args.exit_on_feed_end,
        metrics_port: (args.metrics_port != 0).then_some(args.metrics_port),
    };

    let stats = Relay::new(config, options)
        .run(shutdown_signal())
        .await
        .context("Relay execution failed")?;

    info!(
        duration_secs = stats.duration.as_secs_f64(),
        batches = stats.ingestion.batches_received,
        publishes = stats.hub.publish_count,
        "Relay stopped"
    );
    stats.print_summary();

    Ok(())
}

/// Apply command-line overrides on top of the loaded configuration
fn apply_overrides(config: &mut RelayConfig, args: &RunArgs) {
    if let Some(bind) = args.bind {
        info!(bind = %bind, "Overriding bind address from CLI");
        config.server.bind_addr = bind;
    }

    if let Some(ref path) = args.replay {
        info!(path = %path.display(), speed = args.replay_speed, "Using replay feed from CLI");
        config.feed = FeedConfig::Replay {
            path: path.clone(),
            speed: args.replay_speed,
            loop_playback: args.replay_loop,
        };
    } else if args.mock && !matches!(config.feed, FeedConfig::Mock { .. }) {
        info!("Using mock feed from CLI");
        config.feed = FeedConfig::default();
    }
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    warn!("Received shutdown signal, stopping relay...");
}
