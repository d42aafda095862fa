//! Live countdown runtime.
//!
//! A single task owns the [`Core`] and is the only place its state changes.
//! It multiplexes caller requests, completed location and schedule work,
//! heading samples and a minute-aligned timer, and publishes a fresh
//! [`LiveSnapshot`] on a watch channel after every change.
//!
//! The timer only runs while at least one snapshot observer exists. The task
//! stops when [`CompanionHandle::shutdown`] is called or when every handle has
//! been dropped; the heading subscription and any outstanding work are
//! released with it.

use chrono::Timelike;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::{Command, Core, CoreEvent, CoreParams, LiveSnapshot, SensorStatus};
use crate::common::constants::{COUNTDOWN_TICK, DEFAULT_LOCATION_TIMEOUT};
use crate::error::SensorError;
use crate::geo::{Coordinate, LocationProvider, acquire_with_fallback};
use crate::heading::{
    AccessOutcome, HeadingSample, HeadingSensor, HeadingSubscription, NoOrientationSensor,
    OrientationPlatform,
};
use crate::schedule::{CalculationMethod, PrayerScheduleFetcher, ScheduleSource};
use crate::state::Preferences;
use crate::time_source::{self, TimeSource};

/// Messages from handles to the running task.
#[derive(Debug)]
enum Control {
    Event(CoreEvent),
    ResubscribeHeading,
    ObserverAttached,
}

/// Builder for a running engine.
pub struct Companion<L, S, P = NoOrientationSensor> {
    location: L,
    source: S,
    sensor: Option<Arc<HeadingSensor<P>>>,
    preferences: Preferences,
    clock: Arc<dyn TimeSource>,
    default_method: CalculationMethod,
    location_timeout: Duration,
    heading_debounce: Option<Duration>,
}

impl<L: LocationProvider, S: ScheduleSource> Companion<L, S> {
    pub fn new(location: L, source: S, preferences: Preferences) -> Self {
        Self {
            location,
            source,
            sensor: None,
            preferences,
            clock: time_source::global(),
            default_method: CalculationMethod::default(),
            location_timeout: Duration::from_secs(DEFAULT_LOCATION_TIMEOUT),
            heading_debounce: None,
        }
    }
}

impl<L: LocationProvider, S: ScheduleSource, P: OrientationPlatform> Companion<L, S, P> {
    pub fn with_heading_sensor<Q: OrientationPlatform>(
        self,
        sensor: HeadingSensor<Q>,
    ) -> Companion<L, S, Q> {
        Companion {
            location: self.location,
            source: self.source,
            sensor: Some(Arc::new(sensor)),
            preferences: self.preferences,
            clock: self.clock,
            default_method: self.default_method,
            location_timeout: self.location_timeout,
            heading_debounce: self.heading_debounce,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn TimeSource>) -> Self {
        self.clock = clock;
        self
    }

    /// Method used when no preference has been persisted yet.
    pub fn with_default_method(mut self, method: CalculationMethod) -> Self {
        self.default_method = method;
        self
    }

    pub fn with_location_timeout(mut self, timeout: Duration) -> Self {
        self.location_timeout = timeout;
        self
    }

    /// Apply at most one heading sample per `interval`; `None` applies every sample.
    pub fn with_heading_debounce(mut self, interval: Option<Duration>) -> Self {
        self.heading_debounce = interval;
        self
    }

    /// Spawn the engine on the current tokio runtime.
    pub fn start(self) -> CompanionHandle<P> {
        let method = self
            .preferences
            .stored_calculation_method()
            .unwrap_or(self.default_method);
        let core = Core::new(CoreParams {
            clock: self.clock.clone(),
            method,
        });

        let (snapshot_tx, _) = watch::channel(core.snapshot().clone());
        let snapshot_tx = Arc::new(snapshot_tx);
        let (control_tx, control_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let shutdown = CancellationToken::new();
        let finished = CancellationToken::new();

        let worker = Worker {
            core,
            clock: self.clock,
            location: Arc::new(self.location),
            fetcher: Arc::new(PrayerScheduleFetcher::new(self.source)),
            sensor: self.sensor.clone(),
            preferences: self.preferences,
            location_timeout: self.location_timeout,
            heading_debounce: self.heading_debounce,
            snapshot_tx: snapshot_tx.clone(),
            events_tx,
            tasks: JoinSet::new(),
        };
        tokio::spawn(worker.run(control_rx, events_rx, shutdown.clone(), finished.clone()));

        CompanionHandle {
            control: control_tx,
            snapshots: snapshot_tx,
            sensor: self.sensor,
            shutdown,
            finished,
        }
    }
}

/// Caller-side access to a running engine.
pub struct CompanionHandle<P = NoOrientationSensor> {
    control: mpsc::UnboundedSender<Control>,
    snapshots: Arc<watch::Sender<LiveSnapshot>>,
    sensor: Option<Arc<HeadingSensor<P>>>,
    shutdown: CancellationToken,
    finished: CancellationToken,
}

impl<P> Clone for CompanionHandle<P> {
    fn clone(&self) -> Self {
        Self {
            control: self.control.clone(),
            snapshots: self.snapshots.clone(),
            sensor: self.sensor.clone(),
            shutdown: self.shutdown.clone(),
            finished: self.finished.clone(),
        }
    }
}

impl<P: OrientationPlatform> CompanionHandle<P> {
    fn send(&self, control: Control) {
        if self.control.send(control).is_err() {
            log_debug!("Engine has stopped, request ignored");
        }
    }

    /// The latest published state.
    pub fn snapshot(&self) -> LiveSnapshot {
        self.snapshots.borrow().clone()
    }

    /// Observe every published state. The countdown timer runs while at
    /// least one receiver is alive.
    pub fn subscribe(&self) -> watch::Receiver<LiveSnapshot> {
        let receiver = self.snapshots.subscribe();
        self.send(Control::ObserverAttached);
        receiver
    }

    /// Wait for a state matching `predicate`.
    ///
    /// Returns `None` if the engine stops first without ever matching.
    pub async fn wait_for(
        &self,
        mut predicate: impl FnMut(&LiveSnapshot) -> bool,
    ) -> Option<LiveSnapshot> {
        let mut receiver = self.subscribe();
        tokio::select! {
            result = receiver.wait_for(|snapshot| predicate(snapshot)) => {
                result.ok().map(|snapshot| snapshot.clone())
            }
            _ = self.finished.cancelled() => {
                let snapshot = self.snapshot();
                predicate(&snapshot).then_some(snapshot)
            }
        }
    }

    /// Restart from the schedule fetch after a failure.
    pub fn retry(&self) {
        self.send(Control::Event(CoreEvent::Retry));
    }

    /// Ask the location provider again.
    pub fn retry_location(&self) {
        self.send(Control::Event(CoreEvent::RetryLocation));
    }

    pub fn set_coordinate(&self, coordinate: Coordinate) {
        self.send(Control::Event(CoreEvent::SetCoordinate(coordinate)));
    }

    /// Switch method; the choice is persisted.
    pub fn set_method(&self, method: CalculationMethod) {
        self.send(Control::Event(CoreEvent::SetMethod(method)));
    }

    /// Run the heading permission handshake and restart the stream.
    ///
    /// Must be triggered by a user action on platforms that gate access.
    pub async fn request_heading_access(&self) -> Result<AccessOutcome, SensorError> {
        let sensor = self
            .sensor
            .as_ref()
            .ok_or(SensorError::CapabilityUnavailable)?;
        if !sensor.platform().has_sensor() {
            return Err(SensorError::CapabilityUnavailable);
        }

        let outcome = sensor.request_access().await;
        self.send(Control::ResubscribeHeading);
        Ok(outcome)
    }

    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    /// Resolves once the engine task has exited.
    pub async fn stopped(&self) {
        self.finished.cancelled().await;
    }

    pub fn is_running(&self) -> bool {
        !self.finished.is_cancelled()
    }
}

struct Worker<L, S, P> {
    core: Core,
    clock: Arc<dyn TimeSource>,
    location: Arc<L>,
    fetcher: Arc<PrayerScheduleFetcher<S>>,
    sensor: Option<Arc<HeadingSensor<P>>>,
    preferences: Preferences,
    location_timeout: Duration,
    heading_debounce: Option<Duration>,
    snapshot_tx: Arc<watch::Sender<LiveSnapshot>>,
    events_tx: mpsc::UnboundedSender<CoreEvent>,
    tasks: JoinSet<()>,
}

impl<L: LocationProvider, S: ScheduleSource, P: OrientationPlatform> Worker<L, S, P> {
    async fn run(
        mut self,
        mut control: mpsc::UnboundedReceiver<Control>,
        mut events: mpsc::UnboundedReceiver<CoreEvent>,
        shutdown: CancellationToken,
        finished: CancellationToken,
    ) {
        log_debug!("Engine started");

        let mut subscription = self.subscribe_heading();
        self.apply(CoreEvent::Start);

        let mut ticker = minute_ticker(self.clock.as_ref());
        let mut pending_heading: Option<HeadingSample> = None;
        let mut last_heading: Option<Instant> = None;

        loop {
            let flush_at = match (self.heading_debounce, last_heading) {
                (Some(interval), Some(applied)) => applied + interval,
                _ => Instant::now(),
            };
            let observed = self.snapshot_tx.receiver_count() > 0;

            tokio::select! {
                _ = shutdown.cancelled() => {
                    log_debug!("Engine shutdown requested");
                    break;
                }
                message = control.recv() => match message {
                    None => {
                        log_debug!("All engine handles dropped");
                        break;
                    }
                    Some(Control::Event(event)) => self.apply(event),
                    Some(Control::ResubscribeHeading) => {
                        drop(subscription.take());
                        subscription = self.subscribe_heading();
                    }
                    Some(Control::ObserverAttached) => self.apply(CoreEvent::Tick),
                },
                Some(event) = events.recv() => match event {
                    CoreEvent::Heading(sample) => match self.heading_debounce {
                        Some(interval)
                            if last_heading.is_some_and(|applied| applied.elapsed() < interval) =>
                        {
                            pending_heading = Some(sample);
                        }
                        _ => {
                            pending_heading = None;
                            last_heading = Some(Instant::now());
                            self.apply(CoreEvent::Heading(sample));
                        }
                    },
                    other => self.apply(other),
                },
                _ = tokio::time::sleep_until(flush_at), if pending_heading.is_some() => {
                    if let Some(sample) = pending_heading.take() {
                        last_heading = Some(Instant::now());
                        self.apply(CoreEvent::Heading(sample));
                    }
                }
                _ = ticker.tick(), if observed => self.apply(CoreEvent::Tick),
                Some(_) = self.tasks.join_next(), if !self.tasks.is_empty() => {}
            }
        }

        drop(subscription);
        self.tasks.abort_all();
        log_debug!("Engine stopped");
        finished.cancel();
    }

    fn apply(&mut self, event: CoreEvent) {
        for command in self.core.handle(event) {
            self.execute(command);
        }
        self.publish();
    }

    fn publish(&self) {
        let snapshot = self.core.snapshot();
        self.snapshot_tx.send_if_modified(|current| {
            if current == snapshot {
                false
            } else {
                *current = snapshot.clone();
                true
            }
        });
    }

    fn execute(&mut self, command: Command) {
        match command {
            Command::AcquireLocation { attempt } => {
                let location = self.location.clone();
                let timeout = self.location_timeout;
                let events = self.events_tx.clone();
                self.tasks.spawn(async move {
                    let resolution = acquire_with_fallback(location.as_ref(), timeout).await;
                    let _ = events.send(CoreEvent::LocationResolved {
                        attempt,
                        resolution,
                    });
                });
            }
            Command::FetchSchedule {
                generation,
                coordinate,
                method,
                date,
            } => {
                let fetcher = self.fetcher.clone();
                let events = self.events_tx.clone();
                self.tasks.spawn(async move {
                    let result = fetcher.fetch(coordinate, method, date).await;
                    let _ = events.send(CoreEvent::ScheduleFetched { generation, result });
                });
            }
            Command::PersistCoordinate(coordinate) => {
                if let Err(e) = self.preferences.set_cached_coordinate(coordinate) {
                    log_warning!("{:#}", e);
                }
            }
            Command::PersistMethod(method) => {
                if let Err(e) = self.preferences.set_calculation_method(method) {
                    log_warning!("{:#}", e);
                }
            }
        }
    }

    fn subscribe_heading(&mut self) -> Option<HeadingSubscription> {
        let outcome = match &self.sensor {
            None => Err(SensorError::CapabilityUnavailable),
            Some(sensor) => {
                let events = self.events_tx.clone();
                sensor.subscribe(move |sample| {
                    let _ = events.send(CoreEvent::Heading(sample));
                })
            }
        };

        match outcome {
            Ok(subscription) => {
                self.apply(CoreEvent::Sensor(SensorStatus::Streaming));
                Some(subscription)
            }
            Err(e) => {
                log_debug!("Heading stream not started: {}", e);
                self.apply(CoreEvent::Sensor(e.into()));
                None
            }
        }
    }
}

/// Interval whose ticks land on the clock's minute boundaries.
fn minute_ticker(clock: &dyn TimeSource) -> Interval {
    let now = clock.now();
    let into_minute = Duration::from_secs(u64::from(now.second()))
        + Duration::from_nanos(u64::from(now.nanosecond() % 1_000_000_000));
    let first = Instant::now() + COUNTDOWN_TICK.saturating_sub(into_minute);

    let mut ticker = tokio::time::interval_at(first, COUNTDOWN_TICK);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    ticker
}
