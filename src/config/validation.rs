//! Configuration validation.
//!
//! Every check names the offending field and value together with the accepted
//! range, so a bad file can be fixed from the error message alone.

use anyhow::Result;

use super::Config;
use crate::common::constants::*;
use crate::schedule::CalculationMethod;

pub fn validate_config(config: &Config) -> Result<()> {
    if let Some(id) = config.calculation_method
        && CalculationMethod::try_from(id).is_err()
    {
        let known: Vec<String> = CalculationMethod::ALL
            .iter()
            .map(|m| m.id().to_string())
            .collect();
        anyhow::bail!(
            "calculation_method ({}) is not a known method id (expected one of {})",
            id,
            known.join(", ")
        );
    }

    validate_coordinates(config)?;

    if let Some(url) = config.api_url.as_deref() {
        let trimmed = url.trim();
        if !(trimmed.starts_with("http://") || trimmed.starts_with("https://"))
            || trimmed.len() <= "https://".len()
        {
            anyhow::bail!("api_url ('{}') must be an http:// or https:// URL", url);
        }
    }

    if let Some(secs) = config.request_timeout
        && !(MINIMUM_REQUEST_TIMEOUT..=MAXIMUM_REQUEST_TIMEOUT).contains(&secs)
    {
        anyhow::bail!(
            "request_timeout ({} s) must be between {} and {} seconds",
            secs,
            MINIMUM_REQUEST_TIMEOUT,
            MAXIMUM_REQUEST_TIMEOUT
        );
    }

    if let Some(secs) = config.location_timeout
        && !(MINIMUM_LOCATION_TIMEOUT..=MAXIMUM_LOCATION_TIMEOUT).contains(&secs)
    {
        anyhow::bail!(
            "location_timeout ({} s) must be between {} and {} seconds",
            secs,
            MINIMUM_LOCATION_TIMEOUT,
            MAXIMUM_LOCATION_TIMEOUT
        );
    }

    if let Some(ms) = config.heading_debounce
        && ms > MAXIMUM_HEADING_DEBOUNCE
    {
        anyhow::bail!(
            "heading_debounce ({} ms) must be between 0 and {} milliseconds",
            ms,
            MAXIMUM_HEADING_DEBOUNCE
        );
    }

    Ok(())
}

fn validate_coordinates(config: &Config) -> Result<()> {
    match (config.latitude, config.longitude) {
        (Some(_), None) => anyhow::bail!("latitude is set but longitude is missing"),
        (None, Some(_)) => anyhow::bail!("longitude is set but latitude is missing"),
        _ => {}
    }

    if let Some(lat) = config.latitude
        && !(-90.0..=90.0).contains(&lat)
    {
        anyhow::bail!("latitude must be between -90 and 90 degrees (got {})", lat);
    }

    if let Some(lon) = config.longitude
        && !(-180.0..=180.0).contains(&lon)
    {
        anyhow::bail!(
            "longitude must be between -180 and 180 degrees (got {})",
            lon
        );
    }

    Ok(())
}
