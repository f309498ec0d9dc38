//! Command implementations.

mod info;
mod run;
mod validate;

pub use info::run_info;
pub use run::run_relay;
pub use validate::run_validate;

use std::path::{Path, PathBuf};

use config_loader::ConfigLoader;
use contracts::RelayConfig;
use tracing::info;

use crate::error::{CliError, Result};

/// Config file picked up from the working directory when `--config` is absent
pub const DEFAULT_CONFIG_PATH: &str = "relay.toml";

/// Where the effective configuration came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    File(PathBuf),
    Defaults,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::File(path) => write!(f, "{}", path.display()),
            Self::Defaults => f.write_str("(built-in defaults)"),
        }
    }
}

/// Load the relay configuration
///
/// An explicit path must exist. Without one, `relay.toml` in the working
/// directory is used if present, otherwise the built-in defaults.
pub fn load_config(explicit: Option<&Path>) -> Result<(RelayConfig, ConfigSource)> {
    if let Some(path) = explicit {
        if !path.exists() {
            return Err(CliError::config_not_found(path));
        }
        let config = ConfigLoader::load_from_path(path)?;
        return Ok((config, ConfigSource::File(path.to_path_buf())));
    }

    let fallback = Path::new(DEFAULT_CONFIG_PATH);
    if fallback.exists() {
        info!(path = DEFAULT_CONFIG_PATH, "Using configuration from working directory");
        let config = ConfigLoader::load_from_path(fallback)?;
        return Ok((config, ConfigSource::File(fallback.to_path_buf())));
    }

    info!("No configuration file, using defaults");
    let config = RelayConfig::default();
    ConfigLoader::validate(&config)?;
    Ok((config, ConfigSource::Defaults))
}
