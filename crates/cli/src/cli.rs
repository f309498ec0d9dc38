//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::net::SocketAddr;
use std::path::PathBuf;

/// F1 Relay - live race telemetry fan-out over WebSocket
#[derive(Parser, Debug)]
#[command(
    name = "f1-relay",
    author,
    version,
    about = "Live F1 position and car telemetry relay",
    long_about = "Ingests live F1 position and car data, keeps the latest state per car,\n\
                  and fans every update out to connected WebSocket subscribers.\n\n\
                  New subscribers receive an `init` snapshot before any update."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "F1_RELAY_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "F1_RELAY_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the relay until Ctrl+C / SIGTERM
    Run(RunArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),

    /// Display the effective configuration
    Info(InfoArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to configuration file (TOML or JSON); defaults apply when omitted
    #[arg(short, long, env = "F1_RELAY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Override the subscriber listen address
    #[arg(long, env = "F1_RELAY_BIND")]
    pub bind: Option<SocketAddr>,

    /// Replay a recorded JSON-lines session instead of the configured feed
    #[arg(long, conflicts_with = "mock")]
    pub replay: Option<PathBuf>,

    /// Replay speed multiplier (1.0 = recorded pace)
    #[arg(long, default_value = "1.0")]
    pub replay_speed: f64,

    /// Restart the replay when the file ends
    #[arg(long)]
    pub replay_loop: bool,

    /// Drive the relay with synthetic cars instead of the configured feed
    #[arg(long)]
    pub mock: bool,

    /// Register a logging subscriber that traces every published message
    #[arg(long)]
    pub tap: bool,

    /// Stop the relay once the feed ends instead of serving the last state
    #[arg(long)]
    pub exit_on_feed_end: bool,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "0", env = "F1_RELAY_METRICS_PORT")]
    pub metrics_port: u16,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, env = "F1_RELAY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to configuration file
    #[arg(short, long, env = "F1_RELAY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}

impl From<LogFormat> for observability::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => Self::Json,
            LogFormat::Pretty => Self::Pretty,
            LogFormat::Compact => Self::Compact,
        }
    }
}
