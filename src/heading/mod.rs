//! Device-orientation adapter producing compass headings.
//!
//! Platforms differ in two ways this module hides from consumers:
//!
//! - **Conventions**: some report a compass heading measured from north
//!   directly, others a raw rotation angle about the vertical axis that must be
//!   converted with `360 - angle`. Consumers only ever see [`HeadingSample`],
//!   degrees clockwise from north in `[0, 360)`.
//! - **Permission gates**: some platforms refuse to stream until access has been
//!   requested from a user gesture. [`HeadingSensor::subscribe`] reports
//!   [`SensorError::PermissionRequired`] in that case instead of silently
//!   producing nothing.
//!
//! The `360 - angle` conversion is an approximation that only holds where the
//! raw angle is already referenced to north. It is applied as-is.
//!
//! Samples are forwarded one-for-one; nothing is smoothed or filtered.

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::error::SensorError;
use crate::geo::bearing::normalize_degrees;

/// Raw reading as delivered by a platform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RawOrientation {
    /// Heading already measured clockwise from north.
    CompassHeading(f64),
    /// Counter-clockwise rotation angle about the z axis.
    RotationAngle(f64),
}

/// Compass heading in degrees clockwise from north, `[0, 360)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeadingSample(f64);

impl HeadingSample {
    pub fn degrees(&self) -> f64 {
        self.0
    }

    /// Build from an already north-referenced value.
    pub fn from_degrees(degrees: f64) -> Option<Self> {
        degrees.is_finite().then(|| Self(normalize_degrees(degrees)))
    }
}

impl fmt::Display for HeadingSample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1}°", self.0)
    }
}

/// Convert a platform reading into a heading. Non-finite readings are dropped.
pub fn normalize(raw: RawOrientation) -> Option<HeadingSample> {
    match raw {
        RawOrientation::CompassHeading(heading) => HeadingSample::from_degrees(heading),
        RawOrientation::RotationAngle(angle) => HeadingSample::from_degrees(360.0 - angle),
    }
}

/// Callback a platform invokes for every raw reading.
pub type OrientationListener = Box<dyn Fn(RawOrientation) + Send + Sync + 'static>;

/// Identifier of one platform registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegistrationId(pub u64);

/// Platform orientation capability.
pub trait OrientationPlatform: Send + Sync + 'static {
    /// Whether the device exposes any orientation sensor.
    fn has_sensor(&self) -> bool;

    /// Whether events only flow after [`request_permission`](Self::request_permission) succeeds.
    fn requires_permission(&self) -> bool;

    /// Ask the user for access. Resolves to `true` when granted.
    fn request_permission(&self) -> impl Future<Output = bool> + Send;

    fn register(&self, listener: OrientationListener) -> RegistrationId;

    fn unregister(&self, id: RegistrationId);
}

/// Where the permission handshake stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorAccess {
    /// The platform has no gate.
    NotRequired,
    /// A gate exists and has not been passed.
    NotRequested,
    Granted,
    Denied,
}

/// Result of [`HeadingSensor::request_access`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessOutcome {
    Granted,
    Denied,
}

/// Normalizing, permission-aware front for an [`OrientationPlatform`].
pub struct HeadingSensor<P> {
    platform: Arc<P>,
    access: Mutex<SensorAccess>,
}

impl<P: OrientationPlatform> HeadingSensor<P> {
    pub fn new(platform: P) -> Self {
        let access = if platform.requires_permission() {
            SensorAccess::NotRequested
        } else {
            SensorAccess::NotRequired
        };
        Self {
            platform: Arc::new(platform),
            access: Mutex::new(access),
        }
    }

    pub fn platform(&self) -> &P {
        &self.platform
    }

    pub fn access(&self) -> SensorAccess {
        *self.access.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn set_access(&self, access: SensorAccess) {
        *self.access.lock().unwrap_or_else(|p| p.into_inner()) = access;
    }

    /// Run the permission handshake. A no-op grant on ungated platforms.
    pub async fn request_access(&self) -> AccessOutcome {
        if self.access() == SensorAccess::NotRequired {
            return AccessOutcome::Granted;
        }

        let granted = self.platform.request_permission().await;
        self.set_access(if granted {
            SensorAccess::Granted
        } else {
            SensorAccess::Denied
        });

        if granted {
            log_debug!("Orientation access granted");
            AccessOutcome::Granted
        } else {
            log_debug!("Orientation access denied");
            AccessOutcome::Denied
        }
    }

    /// Start delivering normalized headings to `on_heading`.
    ///
    /// Fails immediately when there is no sensor or the permission gate has not
    /// been passed. Dropping the returned handle stops delivery.
    pub fn subscribe<F>(&self, on_heading: F) -> Result<HeadingSubscription, SensorError>
    where
        F: Fn(HeadingSample) + Send + Sync + 'static,
    {
        if !self.platform.has_sensor() {
            return Err(SensorError::CapabilityUnavailable);
        }
        match self.access() {
            SensorAccess::NotRequested => return Err(SensorError::PermissionRequired),
            SensorAccess::Denied => return Err(SensorError::PermissionDenied),
            SensorAccess::NotRequired | SensorAccess::Granted => {}
        }

        let active = Arc::new(AtomicBool::new(true));
        let gate = active.clone();
        let id = self.platform.register(Box::new(move |raw| {
            if !gate.load(Ordering::SeqCst) {
                return;
            }
            if let Some(sample) = normalize(raw) {
                on_heading(sample);
            }
        }));

        let platform = self.platform.clone();
        Ok(HeadingSubscription {
            active,
            release: Some(Box::new(move || platform.unregister(id))),
        })
    }
}

/// Live heading registration.
///
/// Once unsubscribed (explicitly or by drop) no further callbacks run, even if
/// the platform keeps emitting.
pub struct HeadingSubscription {
    active: Arc<AtomicBool>,
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl HeadingSubscription {
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    pub fn unsubscribe(mut self) {
        self.release_now();
    }

    fn release_now(&mut self) {
        self.active.store(false, Ordering::SeqCst);
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl Drop for HeadingSubscription {
    fn drop(&mut self) {
        self.release_now();
    }
}

impl fmt::Debug for HeadingSubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HeadingSubscription")
            .field("active", &self.is_active())
            .finish()
    }
}

/// Platform without any orientation hardware.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOrientationSensor;

impl OrientationPlatform for NoOrientationSensor {
    fn has_sensor(&self) -> bool {
        false
    }

    fn requires_permission(&self) -> bool {
        false
    }

    async fn request_permission(&self) -> bool {
        false
    }

    fn register(&self, _listener: OrientationListener) -> RegistrationId {
        RegistrationId(0)
    }

    fn unregister(&self, _id: RegistrationId) {}
}
