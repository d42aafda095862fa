//! Configuration loading.
//!
//! Resolves the config path (custom directory or XDG default), creates a
//! default file on first run, parses and validates.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use super::Config;
use super::validation::validate_config;

const CONFIG_FILE: &str = "miqat.toml";

/// Directory given with `--config`, if any.
static CONFIG_DIR: OnceLock<Option<PathBuf>> = OnceLock::new();

/// Record the `--config` directory. A second call is an error.
pub fn set_config_dir(dir: Option<String>) -> Result<()> {
    CONFIG_DIR
        .set(dir.map(PathBuf::from))
        .map_err(|_| anyhow::anyhow!("Configuration directory already set"))
}

/// Custom configuration directory, if one was set.
pub fn get_custom_config_dir() -> Option<PathBuf> {
    CONFIG_DIR.get().and_then(|d| d.clone())
}

/// Path of `miqat.toml`, whether or not it exists yet.
pub fn get_config_path() -> Result<PathBuf> {
    if let Some(custom_dir) = get_custom_config_dir() {
        return Ok(custom_dir.join(CONFIG_FILE));
    }

    let config_home = match std::env::var_os("XDG_CONFIG_HOME") {
        Some(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => dirs::config_dir().context("Could not determine config directory")?,
    };
    Ok(config_home.join("miqat").join(CONFIG_FILE))
}

/// Load configuration, creating a default file if none exists.
pub fn load() -> Result<Config> {
    let config_path = get_config_path()?;
    if !config_path.exists() {
        log_block_start!("No configuration found, writing defaults");
        super::builder::create_default_config(&config_path, None)
            .context("Failed to create default config during load")?;
    }

    load_from_path(&config_path)
        .with_context(|| format!("Failed to load configuration from {}", config_path.display()))
}

/// Parse and validate an existing file. A missing file is an error.
pub fn load_from_path(path: &Path) -> Result<Config> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config from {}", path.display()))?;

    let config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config from {}", path.display()))?;

    validate_config(&config)?;

    Ok(config)
}
