pub mod config_cmd;
pub mod run;
pub mod status;
pub mod triggers;

use std::path::PathBuf;

use gatewatch_config::{Config, config_path, gateway_settings, load_config_from};
use gatewatch_core::GatewaySettings;

use crate::cli::GlobalOpts;
use crate::error::CliError;

/// Load the config named by `--config` (or the default location) and
/// apply the `--address` override.
pub fn load(global: &GlobalOpts) -> Result<(Config, PathBuf), CliError> {
    let path = global.config.clone().unwrap_or_else(config_path);
    let mut cfg = load_config_from(&path)?;
    if let Some(ref address) = global.address {
        cfg.gateway.address = Some(address.clone());
    }
    Ok((cfg, path))
}

/// Runtime settings, or a pointer at the config file if no address is set.
pub fn settings(cfg: &Config, path: &std::path::Path) -> Result<GatewaySettings, CliError> {
    if cfg.gateway.address.as_deref().is_none_or(str::is_empty) {
        return Err(CliError::NoConfig {
            path: path.display().to_string(),
        });
    }
    Ok(gateway_settings(cfg)?)
}
