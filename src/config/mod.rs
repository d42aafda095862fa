//! Configuration system for miqat.
//!
//! Settings live in `miqat.toml`, searched for in:
//! 1. the directory given with `--config DIR`, if any
//! 2. **XDG_CONFIG_HOME**/miqat/miqat.toml (falling back to the platform config dir)
//!
//! A commented default file is written on first run. Every field is optional:
//!
//! ```toml
//! #[Prayer times]
//! calculation_method = 2                        # Used until a method is chosen in the app
//! api_url = "https://api.aladhan.com/v1"        # Prayer-times service base URL
//! request_timeout = 15                          # Seconds allowed for one schedule request (1-120)
//!
//! #[Location]
//! location_timeout = 10                         # Seconds allowed for location acquisition (1-120)
//! latitude = 21.4225                            # Fixed latitude (-90 to 90)
//! longitude = 39.8262                           # Fixed longitude (-180 to 180)
//!
//! #[Compass]
//! heading_debounce = 0                          # Minimum ms between needle updates (0-1000)
//! ```
//!
//! A persisted calculation-method preference always wins over
//! `calculation_method`; the file only supplies the first-run value.

pub mod builder;
pub mod loading;
pub mod validation;

#[cfg(test)]
mod tests;

use anyhow::Result;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::common::constants::*;
use crate::geo::Coordinate;
use crate::schedule::CalculationMethod;

pub use builder::create_default_config;
pub use loading::{get_config_path, get_custom_config_dir, load, load_from_path, set_config_dir};

/// Settings loaded from `miqat.toml`.
#[derive(Debug, Deserialize, Clone, PartialEq, Default)]
pub struct Config {
    /// Calculation-method id used when no preference has been persisted.
    pub calculation_method: Option<u8>,

    /// Fixed coordinate, used instead of (or when there is no) platform location.
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,

    /// Base URL of the Aladhan-compatible prayer-times service.
    pub api_url: Option<String>,

    pub request_timeout: Option<u64>, // seconds
    pub location_timeout: Option<u64>, // seconds
    pub heading_debounce: Option<u64>, // milliseconds, 0 disables
}

impl Config {
    /// Load configuration using automatic path detection.
    pub fn load() -> Result<Self> {
        loading::load()
    }

    pub fn get_config_path() -> Result<PathBuf> {
        loading::get_config_path()
    }

    pub fn calculation_method(&self) -> CalculationMethod {
        self.calculation_method
            .map(CalculationMethod::from_id_or_default)
            .unwrap_or_default()
    }

    /// The configured coordinate, if both halves are present and valid.
    pub fn coordinate(&self) -> Option<Coordinate> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) => Coordinate::new(lat, lon).ok(),
            _ => None,
        }
    }

    pub fn api_url(&self) -> &str {
        self.api_url
            .as_deref()
            .map(str::trim)
            .unwrap_or(DEFAULT_API_URL)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout.unwrap_or(DEFAULT_REQUEST_TIMEOUT))
    }

    pub fn location_timeout(&self) -> Duration {
        Duration::from_secs(self.location_timeout.unwrap_or(DEFAULT_LOCATION_TIMEOUT))
    }

    /// Minimum interval between applied heading samples, `None` when disabled.
    pub fn heading_debounce(&self) -> Option<Duration> {
        match self.heading_debounce.unwrap_or(DEFAULT_HEADING_DEBOUNCE) {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }

    /// Log the effective configuration.
    pub fn log_config(&self) {
        match Self::get_config_path() {
            Ok(path) => log_block_start!("Loaded configuration from {}", path.display()),
            Err(_) => log_block_start!("Loaded configuration"),
        }

        log_indented!("Default method: {}", self.calculation_method());
        match self.coordinate() {
            Some(coordinate) => log_indented!("Fixed location: {}", coordinate),
            None => log_indented!("Fixed location: none (platform or cached)"),
        }
        log_indented!("Service: {}", self.api_url());
        log_indented!(
            "Timeouts: request {}s, location {}s",
            self.request_timeout().as_secs(),
            self.location_timeout().as_secs()
        );
        if let Some(debounce) = self.heading_debounce() {
            log_indented!("Heading debounce: {}ms", debounce.as_millis());
        }
    }
}
