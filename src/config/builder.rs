//! Default configuration file creation.
//!
//! Builds a commented `miqat.toml` with every setting at its default, aligned
//! so the comments form a column.

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

use crate::common::constants::*;
use crate::geo::KAABA;
use crate::schedule::CalculationMethod;

/// Create a default config file at `path`.
///
/// When `coords` is given the coordinate lines are written live; otherwise
/// they are left commented out so the location comes from the platform.
pub fn create_default_config(path: &Path, coords: Option<(f64, f64)>) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context("Failed to create config directory")?;
    }

    let default_method = CalculationMethod::default();

    let builder = ConfigBuilder::new()
        .add_section("Prayer times")
        .add_setting(
            "calculation_method",
            &default_method.id().to_string(),
            &format!(
                "Used until a method is chosen in the app (default {})",
                default_method.display_name()
            ),
        )
        .add_setting(
            "api_url",
            &format!("\"{DEFAULT_API_URL}\""),
            "Prayer-times service base URL",
        )
        .add_setting(
            "request_timeout",
            &DEFAULT_REQUEST_TIMEOUT.to_string(),
            &format!(
                "Seconds allowed for one schedule request ({MINIMUM_REQUEST_TIMEOUT}-{MAXIMUM_REQUEST_TIMEOUT})"
            ),
        )
        .add_section("Location")
        .add_setting(
            "location_timeout",
            &DEFAULT_LOCATION_TIMEOUT.to_string(),
            &format!(
                "Seconds allowed for location acquisition ({MINIMUM_LOCATION_TIMEOUT}-{MAXIMUM_LOCATION_TIMEOUT})"
            ),
        );

    let builder = match coords {
        Some((lat, lon)) => builder
            .add_setting("latitude", &format!("{lat:.6}"), "Fixed latitude (-90 to 90)")
            .add_setting("longitude", &format!("{lon:.6}"), "Fixed longitude (-180 to 180)"),
        None => builder
            .add_commented_setting(
                "latitude",
                &format!("{:.4}", KAABA.latitude),
                "Fixed latitude (-90 to 90)",
            )
            .add_commented_setting(
                "longitude",
                &format!("{:.4}", KAABA.longitude),
                "Fixed longitude (-180 to 180)",
            ),
    };

    let content = builder
        .add_section("Compass")
        .add_setting(
            "heading_debounce",
            &DEFAULT_HEADING_DEBOUNCE.to_string(),
            &format!(
                "Minimum milliseconds between needle updates (0-{MAXIMUM_HEADING_DEBOUNCE} | 0 = every sample)"
            ),
        )
        .build();

    fs::write(path, content + "\n")
        .with_context(|| format!("Failed to write default config to {}", path.display()))?;

    log_indented!("Created default configuration: {}", path.display());
    Ok(())
}

struct ConfigBuilder {
    entries: Vec<ConfigEntry>,
}

enum ConfigEntry {
    Section(String),
    Setting { line: String, comment: String },
}

impl ConfigBuilder {
    fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    fn add_section(mut self, title: &str) -> Self {
        self.entries.push(ConfigEntry::Section(format!("#[{title}]")));
        self
    }

    fn add_setting(mut self, key: &str, value: &str, comment: &str) -> Self {
        self.entries.push(ConfigEntry::Setting {
            line: format!("{key} = {value}"),
            comment: format!("# {comment}"),
        });
        self
    }

    fn add_commented_setting(mut self, key: &str, value: &str, comment: &str) -> Self {
        self.entries.push(ConfigEntry::Setting {
            line: format!("# {key} = {value}"),
            comment: format!("# {comment}"),
        });
        self
    }

    fn build(self) -> String {
        // +1 for one space between setting and comment
        let max_width = self
            .entries
            .iter()
            .filter_map(|entry| match entry {
                ConfigEntry::Setting { line, .. } => Some(line.len()),
                ConfigEntry::Section(_) => None,
            })
            .max()
            .unwrap_or(0)
            + 1;

        let mut result = Vec::new();
        let mut first_section = true;

        for entry in self.entries {
            match entry {
                ConfigEntry::Section(title) => {
                    if !first_section {
                        result.push(String::new());
                    }
                    result.push(title);
                    first_section = false;
                }
                ConfigEntry::Setting { line, comment } => {
                    let padding = " ".repeat(max_width - line.len());
                    result.push(format!("{line}{padding}{comment}"));
                }
            }
        }

        result.join("\n")
    }
}
