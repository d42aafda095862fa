//! Location acquisition with a fixed fallback.
//!
//! A [`LocationProvider`] is a single-shot asynchronous read of the platform's
//! position. [`acquire_with_fallback`] applies the failure policy: every error,
//! including an elapsed timeout, resolves to the Kaaba coordinate together with
//! the failure that caused the substitution. Nothing retries automatically;
//! calling it again is the retry.

use std::future::Future;
use std::time::Duration;

use super::{Coordinate, KAABA};
use crate::error::LocationError;

/// Platform location capability.
pub trait LocationProvider: Send + Sync + 'static {
    /// Read the current position once.
    fn acquire(&self) -> impl Future<Output = Result<Coordinate, LocationError>> + Send;
}

/// Outcome of an acquisition after the fallback policy has been applied.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocationResolution {
    pub coordinate: Coordinate,
    /// Set when `coordinate` is the substituted default.
    pub failure: Option<LocationError>,
}

impl LocationResolution {
    pub fn acquired(coordinate: Coordinate) -> Self {
        Self {
            coordinate,
            failure: None,
        }
    }

    pub fn fallback(failure: LocationError) -> Self {
        Self {
            coordinate: KAABA,
            failure: Some(failure),
        }
    }

    pub fn uses_default(&self) -> bool {
        self.failure.is_some()
    }
}

/// Acquire a coordinate, substituting the Kaaba on any failure.
pub async fn acquire_with_fallback<P: LocationProvider>(
    provider: &P,
    timeout: Duration,
) -> LocationResolution {
    match tokio::time::timeout(timeout, provider.acquire()).await {
        Ok(Ok(coordinate)) => LocationResolution::acquired(coordinate),
        Ok(Err(failure)) => LocationResolution::fallback(failure),
        Err(_) => LocationResolution::fallback(LocationError::Timeout),
    }
}

/// Location known ahead of time: from the configuration file or the last
/// coordinate persisted by a previous session.
///
/// A provider built without a coordinate behaves like a device with no
/// location capability.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConfiguredLocation {
    coordinate: Option<Coordinate>,
}

impl ConfiguredLocation {
    pub fn new(coordinate: Option<Coordinate>) -> Self {
        Self { coordinate }
    }

    /// First available coordinate, in priority order.
    pub fn first_of(candidates: impl IntoIterator<Item = Option<Coordinate>>) -> Self {
        Self {
            coordinate: candidates.into_iter().flatten().next(),
        }
    }

    pub fn coordinate(&self) -> Option<Coordinate> {
        self.coordinate
    }
}

impl LocationProvider for ConfiguredLocation {
    async fn acquire(&self) -> Result<Coordinate, LocationError> {
        self.coordinate.ok_or(LocationError::CapabilityUnavailable)
    }
}
