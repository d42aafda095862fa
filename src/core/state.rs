//! View-facing state of the engine.

use chrono::NaiveDateTime;
use std::fmt;
use std::sync::Arc;

use crate::error::{FailureKind, LocationError, SensorError};
use crate::geo::Coordinate;
use crate::heading::HeadingSample;
use crate::schedule::{CalculationMethod, FastWindow, NextEvent, PrayerSchedule};

/// Where the engine is in its pipeline.
///
/// ```text
/// Idle → AcquiringLocation → {LocationFailed | LocationAcquired}
///      → FetchingSchedule → {ScheduleFailed | ScheduleReady} → Live
/// ```
///
/// `LocationFailed` continues with the Kaaba coordinate. `ScheduleFailed`
/// stays put until a retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineStatus {
    Idle,
    AcquiringLocation,
    LocationFailed { kind: FailureKind },
    LocationAcquired,
    FetchingSchedule,
    ScheduleFailed { kind: FailureKind },
    ScheduleReady,
    Live,
}

impl EngineStatus {
    pub fn failure(&self) -> Option<FailureKind> {
        match self {
            Self::LocationFailed { kind } | Self::ScheduleFailed { kind } => Some(*kind),
            _ => None,
        }
    }

    /// True once the pipeline has either gone live or stopped on a failure.
    pub fn is_settled(&self) -> bool {
        matches!(self, Self::Live | Self::ScheduleFailed { .. })
    }
}

impl fmt::Display for EngineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => f.write_str("idle"),
            Self::AcquiringLocation => f.write_str("acquiring location"),
            Self::LocationFailed { .. } => f.write_str("location unavailable, using default"),
            Self::LocationAcquired => f.write_str("location acquired"),
            Self::FetchingSchedule => f.write_str("fetching schedule"),
            Self::ScheduleFailed { .. } => f.write_str("schedule unavailable"),
            Self::ScheduleReady => f.write_str("schedule ready"),
            Self::Live => f.write_str("live"),
        }
    }
}

/// Heading stream availability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SensorStatus {
    #[default]
    Unavailable,
    PermissionRequired,
    Denied,
    Streaming,
}

impl From<SensorError> for SensorStatus {
    fn from(error: SensorError) -> Self {
        match error {
            SensorError::CapabilityUnavailable => Self::Unavailable,
            SensorError::PermissionRequired => Self::PermissionRequired,
            SensorError::PermissionDenied => Self::Denied,
        }
    }
}

impl SensorStatus {
    /// Failure to surface for a non-streaming sensor.
    pub fn failure(&self) -> Option<FailureKind> {
        match self {
            Self::Unavailable => Some(FailureKind::CapabilityUnavailable),
            Self::PermissionRequired => Some(FailureKind::PermissionRequired),
            Self::Denied => Some(FailureKind::PermissionDenied),
            Self::Streaming => None,
        }
    }
}

/// Everything a view needs, published after every change.
#[derive(Debug, Clone, PartialEq)]
pub struct LiveSnapshot {
    pub status: EngineStatus,
    pub coordinate: Option<Coordinate>,
    /// Why the coordinate is the Kaaba default, if it is.
    pub location_failure: Option<LocationError>,
    pub method: CalculationMethod,
    pub qibla_bearing: Option<f64>,
    pub schedule: Option<Arc<PrayerSchedule>>,
    pub next_event: Option<NextEvent>,
    pub fast_window: Option<FastWindow>,
    pub heading: Option<HeadingSample>,
    /// Needle rotation: bearing minus heading, in (-180, 180].
    pub needle_delta: Option<f64>,
    pub sensor: SensorStatus,
    /// Wall clock in the schedule's timezone at the last recomputation.
    pub local_time: Option<NaiveDateTime>,
}

impl LiveSnapshot {
    pub fn new(method: CalculationMethod) -> Self {
        Self {
            status: EngineStatus::Idle,
            coordinate: None,
            location_failure: None,
            method,
            qibla_bearing: None,
            schedule: None,
            next_event: None,
            fast_window: None,
            heading: None,
            needle_delta: None,
            sensor: SensorStatus::default(),
            local_time: None,
        }
    }

    pub fn uses_default_location(&self) -> bool {
        self.location_failure.is_some()
    }

    /// Message for the most relevant failure, if any.
    pub fn message(&self) -> Option<&'static str> {
        self.status
            .failure()
            .or_else(|| self.location_failure.map(|e| e.kind()))
            .map(|kind| kind.user_message())
    }
}
