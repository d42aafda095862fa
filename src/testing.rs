//! Scriptable collaborators for tests.
//!
//! Compiled for unit tests and, through the `testing-support` feature, for the
//! integration tests under `tests/`.

use chrono_tz::Tz;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::Semaphore;

use crate::error::{LocationError, ScheduleError};
use crate::geo::{Coordinate, LocationProvider};
use crate::heading::{OrientationListener, OrientationPlatform, RawOrientation, RegistrationId};
use crate::schedule::{PrayerSchedule, ScheduleRequest, ScheduleSource};

/// Times served by [`FakeScheduleSource`] unless overridden.
pub const STANDARD_TIMES: [&str; 6] = ["05:00", "06:20", "12:15", "15:45", "18:10", "19:30"];

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Default)]
struct FakeScheduleInner {
    requests: Mutex<Vec<ScheduleRequest>>,
    failure: Mutex<Option<ScheduleError>>,
    times: Mutex<HashMap<(i64, i64), [&'static str; 6]>>,
    timezone: Mutex<Option<Tz>>,
    gates: Mutex<HashMap<(i64, i64), Arc<Semaphore>>>,
}

/// In-memory schedule source.
///
/// Requests for a held coordinate block until [`release`](Self::release) lets
/// one through or [`unhold`](Self::unhold) opens the gate for later calls.
#[derive(Clone, Default)]
pub struct FakeScheduleSource {
    inner: Arc<FakeScheduleInner>,
}

impl FakeScheduleSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `times` for requests at `coordinate`.
    pub fn with_times(self, coordinate: Coordinate, times: [&'static str; 6]) -> Self {
        lock(&self.inner.times).insert(coordinate.rounded_key(), times);
        self
    }

    /// Report `timezone` on every schedule served.
    pub fn with_timezone(self, timezone: Tz) -> Self {
        *lock(&self.inner.timezone) = Some(timezone);
        self
    }

    /// Fail every request with `failure` until cleared with `None`.
    pub fn fail_with(&self, failure: Option<ScheduleError>) {
        *lock(&self.inner.failure) = failure;
    }

    pub fn hold(&self, coordinate: Coordinate) {
        lock(&self.inner.gates).insert(coordinate.rounded_key(), Arc::new(Semaphore::new(0)));
    }

    /// Let one blocked request at `coordinate` proceed.
    pub fn release(&self, coordinate: Coordinate) {
        if let Some(gate) = lock(&self.inner.gates).get(&coordinate.rounded_key()) {
            gate.add_permits(1);
        }
    }

    /// Stop blocking new requests at `coordinate`.
    pub fn unhold(&self, coordinate: Coordinate) {
        lock(&self.inner.gates).remove(&coordinate.rounded_key());
    }

    pub fn calls(&self) -> usize {
        lock(&self.inner.requests).len()
    }

    pub fn requests(&self) -> Vec<ScheduleRequest> {
        lock(&self.inner.requests).clone()
    }
}

impl ScheduleSource for FakeScheduleSource {
    async fn fetch(&self, request: ScheduleRequest) -> Result<PrayerSchedule, ScheduleError> {
        let key = request.coordinate.rounded_key();
        lock(&self.inner.requests).push(request);

        let gate = lock(&self.inner.gates).get(&key).cloned();
        if let Some(gate) = gate {
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }

        if let Some(failure) = lock(&self.inner.failure).clone() {
            return Err(failure);
        }

        let times = lock(&self.inner.times)
            .get(&key)
            .copied()
            .unwrap_or(STANDARD_TIMES);
        let timezone = *lock(&self.inner.timezone);

        PrayerSchedule::from_clock_strings(request.date, times)
            .map(|schedule| schedule.with_timezone(timezone))
            .map_err(ScheduleError::malformed)
    }
}

#[derive(Debug, Clone, Copy)]
enum LocationScript {
    Succeed(Coordinate),
    Fail(LocationError),
    Hang,
}

/// Location provider whose answer is set by the test.
#[derive(Debug, Clone)]
pub struct FakeLocation {
    script: Arc<Mutex<LocationScript>>,
    calls: Arc<AtomicUsize>,
}

impl FakeLocation {
    fn scripted(script: LocationScript) -> Self {
        Self {
            script: Arc::new(Mutex::new(script)),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn at(coordinate: Coordinate) -> Self {
        Self::scripted(LocationScript::Succeed(coordinate))
    }

    pub fn failing(failure: LocationError) -> Self {
        Self::scripted(LocationScript::Fail(failure))
    }

    /// Never answers; only a timeout ends the acquisition.
    pub fn hanging() -> Self {
        Self::scripted(LocationScript::Hang)
    }

    pub fn succeed_with(&self, coordinate: Coordinate) {
        *lock(&self.script) = LocationScript::Succeed(coordinate);
    }

    pub fn fail_with(&self, failure: LocationError) {
        *lock(&self.script) = LocationScript::Fail(failure);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl LocationProvider for FakeLocation {
    async fn acquire(&self) -> Result<Coordinate, LocationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let script = *lock(&self.script);
        match script {
            LocationScript::Succeed(coordinate) => Ok(coordinate),
            LocationScript::Fail(failure) => Err(failure),
            LocationScript::Hang => std::future::pending().await,
        }
    }
}

type SharedListener = Arc<dyn Fn(RawOrientation) + Send + Sync + 'static>;

struct OrientationInner {
    /// `None` when the platform has no permission gate, otherwise the answer.
    gate: Option<bool>,
    /// Ignore unregistration, as some platforms do.
    leaky: bool,
    listeners: Mutex<HashMap<u64, SharedListener>>,
    next_id: AtomicU64,
    permission_requests: AtomicUsize,
}

/// Orientation platform driven by [`emit`](Self::emit).
#[derive(Clone)]
pub struct ScriptedOrientation {
    inner: Arc<OrientationInner>,
}

impl ScriptedOrientation {
    fn build(gate: Option<bool>, leaky: bool) -> Self {
        Self {
            inner: Arc::new(OrientationInner {
                gate,
                leaky,
                listeners: Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(1),
                permission_requests: AtomicUsize::new(0),
            }),
        }
    }

    pub fn ungated() -> Self {
        Self::build(None, false)
    }

    /// Permission-gated platform that answers `grant` when asked.
    pub fn gated(grant: bool) -> Self {
        Self::build(Some(grant), false)
    }

    pub fn leaky() -> Self {
        Self::build(None, true)
    }

    /// Deliver a reading to every registered listener.
    pub fn emit(&self, reading: RawOrientation) {
        let listeners: Vec<SharedListener> = lock(&self.inner.listeners).values().cloned().collect();
        for listener in listeners {
            listener(reading);
        }
    }

    pub fn listener_count(&self) -> usize {
        lock(&self.inner.listeners).len()
    }

    pub fn permission_requests(&self) -> usize {
        self.inner.permission_requests.load(Ordering::SeqCst)
    }
}

impl OrientationPlatform for ScriptedOrientation {
    fn has_sensor(&self) -> bool {
        true
    }

    fn requires_permission(&self) -> bool {
        self.inner.gate.is_some()
    }

    async fn request_permission(&self) -> bool {
        self.inner.permission_requests.fetch_add(1, Ordering::SeqCst);
        self.inner.gate.unwrap_or(true)
    }

    fn register(&self, listener: OrientationListener) -> RegistrationId {
        let id = self.inner.next_id.fetch_add(1, Ordering::SeqCst);
        lock(&self.inner.listeners).insert(id, Arc::from(listener));
        RegistrationId(id)
    }

    fn unregister(&self, id: RegistrationId) {
        if !self.inner.leaky {
            lock(&self.inner.listeners).remove(&id.0);
        }
    }
}
