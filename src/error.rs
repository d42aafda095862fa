//! Failure taxonomy shared by every external collaborator.
//!
//! Each capability reports its own error enum; all of them collapse into a
//! [`FailureKind`] that the live snapshot carries and the view turns into a
//! message. None of these are fatal to the process.

use thiserror::Error;

/// Coarse failure classification surfaced to views.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    PermissionDenied,
    PermissionRequired,
    CapabilityUnavailable,
    Timeout,
    NetworkError,
    MalformedResponse,
}

impl FailureKind {
    /// Human-readable message for a failure state.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::PermissionDenied => "Permission was denied",
            Self::PermissionRequired => "Permission is required before this feature can start",
            Self::CapabilityUnavailable => "This device does not provide the required capability",
            Self::Timeout => "The request timed out",
            Self::NetworkError => "Could not reach the prayer-times service",
            Self::MalformedResponse => "The prayer-times service returned incomplete data",
        }
    }

    /// Whether the view should offer a retry affordance.
    pub fn retryable(&self) -> bool {
        matches!(
            self,
            Self::Timeout | Self::NetworkError | Self::MalformedResponse | Self::PermissionRequired
        )
    }
}

/// Geolocation acquisition failures.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocationError {
    #[error("location permission denied")]
    PermissionDenied,

    #[error("no location capability available")]
    CapabilityUnavailable,

    #[error("location request timed out")]
    Timeout,
}

impl LocationError {
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::PermissionDenied => FailureKind::PermissionDenied,
            Self::CapabilityUnavailable => FailureKind::CapabilityUnavailable,
            Self::Timeout => FailureKind::Timeout,
        }
    }
}

/// Prayer-schedule retrieval failures.
///
/// Cloneable because one result fans out to every de-duplicated waiter.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScheduleError {
    #[error("network error: {0}")]
    Network(String),

    #[error("malformed response: {0}")]
    Malformed(String),
}

impl ScheduleError {
    pub fn network<S: Into<String>>(msg: S) -> Self {
        Self::Network(msg.into())
    }

    pub fn malformed<S: Into<String>>(msg: S) -> Self {
        Self::Malformed(msg.into())
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Network(_) => FailureKind::NetworkError,
            Self::Malformed(_) => FailureKind::MalformedResponse,
        }
    }
}

/// Orientation-sensor failures.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    #[error("no orientation sensor available")]
    CapabilityUnavailable,

    #[error("orientation access must be requested first")]
    PermissionRequired,

    #[error("orientation access denied")]
    PermissionDenied,
}

impl SensorError {
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::CapabilityUnavailable => FailureKind::CapabilityUnavailable,
            Self::PermissionRequired => FailureKind::PermissionRequired,
            Self::PermissionDenied => FailureKind::PermissionDenied,
        }
    }
}
