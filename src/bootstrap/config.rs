//! # Configuration Loader
//!
//! Reads the TOML config file into [`AppConfig`]. Defaults for missing keys
//! come from `AppConfig` itself; nothing is validated here.

use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing::info;
use uc_core::config::AppConfig;

pub const CONFIG_FILE_NAME: &str = "config.toml";

/// `<config_dir>/uniclipboard-share/config.toml`
pub fn default_config_path() -> anyhow::Result<PathBuf> {
    Ok(uc_infra::fs::config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load configuration from a TOML file
///
/// # Errors
///
/// Returns error if the file cannot be read, is not valid TOML, or a key has
/// the wrong type.
pub fn load_config(config_path: PathBuf) -> anyhow::Result<AppConfig> {
    let content = std::fs::read_to_string(&config_path)
        .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;
    let toml_value: toml::Value =
        toml::from_str(&content).context("Failed to parse config as TOML")?;
    AppConfig::from_toml(&toml_value)
}

/// Like [`load_config`], but a missing file yields the defaults.
///
/// A file that exists and fails to parse is still an error.
pub fn load_or_default(config_path: &Path) -> anyhow::Result<AppConfig> {
    if !config_path.exists() {
        info!(path = %config_path.display(), "No config file, using defaults");
        return Ok(AppConfig::default());
    }
    let config = load_config(config_path.to_path_buf())?;
    info!(path = %config_path.display(), "Loaded config");
    Ok(config)
}
