//! Geographic coordinates, Qibla bearing and location acquisition.
//!
//! ## Module Structure
//!
//! - [`bearing`]: great-circle initial bearing toward the Kaaba and the signed
//!   needle delta against a compass heading
//! - [`location`]: the location-provider contract and the fallback policy that
//!   substitutes the Kaaba coordinate when acquisition fails

pub mod bearing;
pub mod location;

pub use bearing::{bearing_to, needle_delta, qibla_bearing};
pub use location::{ConfiguredLocation, LocationProvider, LocationResolution, acquire_with_fallback};

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::common::constants::{COORDINATE_KEY_PRECISION, KAABA_LATITUDE, KAABA_LONGITUDE};


/// A point on the globe in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

/// The Kaaba in Mecca: Qibla target and fallback location.
pub const KAABA: Coordinate = Coordinate {
    latitude: KAABA_LATITUDE,
    longitude: KAABA_LONGITUDE,
};

impl Coordinate {
    /// Create a validated coordinate.
    ///
    /// Latitude must lie in [-90, 90] and longitude in [-180, 180].
    pub fn new(latitude: f64, longitude: f64) -> anyhow::Result<Self> {
        if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
            anyhow::bail!("latitude must be between -90 and 90 degrees (got {latitude})");
        }
        if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
            anyhow::bail!("longitude must be between -180 and 180 degrees (got {longitude})");
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }

    /// Coordinate scaled to fixed precision, used as a cache key.
    pub fn rounded_key(&self) -> (i64, i64) {
        let scale = 10f64.powi(COORDINATE_KEY_PRECISION);
        (
            (self.latitude * scale).round() as i64,
            (self.longitude * scale).round() as i64,
        )
    }

    pub fn is_kaaba(&self) -> bool {
        self.rounded_key() == KAABA.rounded_key()
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ns = if self.latitude >= 0.0 { 'N' } else { 'S' };
        let ew = if self.longitude >= 0.0 { 'E' } else { 'W' };
        write!(
            f,
            "{:.4}°{ns}, {:.4}°{ew}",
            self.latitude.abs(),
            self.longitude.abs()
        )
    }
}
