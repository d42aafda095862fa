//! Core engine: state machine and live recomputation.
//!
//! [`Core`] is a pure reducer. It consumes [`CoreEvent`]s (location results,
//! schedule results, heading samples, timer ticks and caller requests),
//! updates a single authoritative state, and answers with [`Command`]s for
//! the runtime to carry out. It performs no I/O and never awaits, so the whole
//! state machine can be driven step by step in tests.
//!
//! Two generation counters enforce last-request-wins: a location result or
//! schedule result is only applied if it answers the most recent request of
//! its kind. Anything older is dropped.
//!
//! The [`runtime`] module wires a `Core` to real collaborators and a
//! minute-aligned timer.

pub mod runtime;
pub mod state;

pub use runtime::{Companion, CompanionHandle};
pub use state::{EngineStatus, LiveSnapshot, SensorStatus};

use chrono::{NaiveDate, NaiveDateTime};
use chrono_tz::Tz;
use std::collections::VecDeque;
use std::sync::Arc;

use crate::error::{LocationError, ScheduleError};
use crate::geo::{Coordinate, LocationResolution, needle_delta, qibla_bearing};
use crate::heading::HeadingSample;
use crate::schedule::{CalculationMethod, PrayerSchedule, resolve, resolve_fast_window};
use crate::time_source::TimeSource;

const HISTORY_LIMIT: usize = 32;

/// Input to the reducer.
#[derive(Debug, Clone)]
pub enum CoreEvent {
    /// Begin the pipeline. Ignored unless idle.
    Start,
    LocationResolved {
        attempt: u64,
        resolution: LocationResolution,
    },
    ScheduleFetched {
        generation: u64,
        result: Result<Arc<PrayerSchedule>, ScheduleError>,
    },
    Heading(HeadingSample),
    Sensor(SensorStatus),
    /// Minute boundary, or any other reason to re-evaluate the clock.
    Tick,
    Retry,
    RetryLocation,
    SetCoordinate(Coordinate),
    SetMethod(CalculationMethod),
}

/// Work requested by the reducer.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    AcquireLocation {
        attempt: u64,
    },
    FetchSchedule {
        generation: u64,
        coordinate: Coordinate,
        method: CalculationMethod,
        date: NaiveDate,
    },
    PersistCoordinate(Coordinate),
    PersistMethod(CalculationMethod),
}

/// Parameters for creating a Core instance.
pub struct CoreParams {
    pub clock: Arc<dyn TimeSource>,
    pub method: CalculationMethod,
}

/// The engine's single authoritative state.
pub struct Core {
    clock: Arc<dyn TimeSource>,
    status: EngineStatus,
    history: VecDeque<EngineStatus>,
    coordinate: Option<Coordinate>,
    location_failure: Option<LocationError>,
    bearing: Option<f64>,
    method: CalculationMethod,
    schedule: Option<Arc<PrayerSchedule>>,
    /// Timezone of the current coordinate, once the service has reported it.
    timezone: Option<Tz>,
    location_attempt: u64,
    fetch_generation: u64,
    /// Date of the outstanding fetch, if one is outstanding.
    fetching_date: Option<NaiveDate>,
    heading: Option<HeadingSample>,
    sensor: SensorStatus,
    snapshot: LiveSnapshot,
}

impl Core {
    pub fn new(params: CoreParams) -> Self {
        let mut history = VecDeque::with_capacity(HISTORY_LIMIT);
        history.push_back(EngineStatus::Idle);

        Self {
            clock: params.clock,
            status: EngineStatus::Idle,
            history,
            coordinate: None,
            location_failure: None,
            bearing: None,
            method: params.method,
            schedule: None,
            timezone: None,
            location_attempt: 0,
            fetch_generation: 0,
            fetching_date: None,
            heading: None,
            sensor: SensorStatus::default(),
            snapshot: LiveSnapshot::new(params.method),
        }
    }

    pub fn status(&self) -> EngineStatus {
        self.status
    }

    /// Statuses visited so far, oldest first (bounded).
    pub fn history(&self) -> impl Iterator<Item = EngineStatus> + '_ {
        self.history.iter().copied()
    }

    pub fn method(&self) -> CalculationMethod {
        self.method
    }

    pub fn snapshot(&self) -> &LiveSnapshot {
        &self.snapshot
    }

    /// Apply one event and return the work it requires.
    pub fn handle(&mut self, event: CoreEvent) -> Vec<Command> {
        let commands = match event {
            CoreEvent::Start => self.on_start(),
            CoreEvent::LocationResolved {
                attempt,
                resolution,
            } => self.on_location(attempt, resolution),
            CoreEvent::ScheduleFetched { generation, result } => {
                self.on_schedule(generation, result)
            }
            CoreEvent::Heading(sample) => {
                self.heading = Some(sample);
                Vec::new()
            }
            CoreEvent::Sensor(status) => {
                self.sensor = status;
                if status != SensorStatus::Streaming {
                    self.heading = None;
                }
                Vec::new()
            }
            CoreEvent::Tick => self.on_tick(),
            CoreEvent::Retry => self.on_retry(),
            CoreEvent::RetryLocation => self.request_location(),
            CoreEvent::SetCoordinate(coordinate) => self.on_set_coordinate(coordinate),
            CoreEvent::SetMethod(method) => self.on_set_method(method),
        };

        self.recompute();
        commands
    }

    fn set_status(&mut self, status: EngineStatus) {
        if self.status == status {
            return;
        }
        log_debug!("Engine: {} -> {}", self.status, status);
        self.status = status;
        if self.history.len() == HISTORY_LIMIT {
            self.history.pop_front();
        }
        self.history.push_back(status);
    }

    fn on_start(&mut self) -> Vec<Command> {
        if self.status != EngineStatus::Idle {
            return Vec::new();
        }
        self.request_location()
    }

    fn request_location(&mut self) -> Vec<Command> {
        self.location_attempt += 1;
        // A fetch for the previous coordinate must not go live underneath us
        self.fetch_generation += 1;
        self.fetching_date = None;
        self.set_status(EngineStatus::AcquiringLocation);
        vec![Command::AcquireLocation {
            attempt: self.location_attempt,
        }]
    }

    fn on_location(&mut self, attempt: u64, resolution: LocationResolution) -> Vec<Command> {
        if attempt != self.location_attempt {
            log_debug!("Discarding stale location result (attempt {})", attempt);
            return Vec::new();
        }

        let mut commands = Vec::new();
        match resolution.failure {
            Some(failure) => {
                log_warning!(
                    "Location unavailable ({}), using the Kaaba coordinate",
                    failure
                );
                self.set_status(EngineStatus::LocationFailed {
                    kind: failure.kind(),
                });
            }
            None => {
                self.set_status(EngineStatus::LocationAcquired);
                commands.push(Command::PersistCoordinate(resolution.coordinate));
            }
        }

        self.adopt_coordinate(resolution.coordinate, resolution.failure);
        commands.extend(self.start_fetch());
        commands
    }

    fn adopt_coordinate(&mut self, coordinate: Coordinate, failure: Option<LocationError>) {
        let moved = self
            .coordinate
            .is_none_or(|current| current.rounded_key() != coordinate.rounded_key());
        if moved {
            self.schedule = None;
            self.timezone = None;
        }
        self.coordinate = Some(coordinate);
        self.location_failure = failure;
        self.bearing = Some(qibla_bearing(coordinate));
    }

    /// Calendar date "now" in the coordinate's timezone, or local time if unknown.
    fn local_now(&self) -> NaiveDateTime {
        let now = self.clock.now();
        match self.timezone {
            Some(tz) => now.with_timezone(&tz).naive_local(),
            None => now.naive_local(),
        }
    }

    fn start_fetch(&mut self) -> Vec<Command> {
        let Some(coordinate) = self.coordinate else {
            return Vec::new();
        };
        let date = self.local_now().date();

        self.fetch_generation += 1;
        self.fetching_date = Some(date);
        self.set_status(EngineStatus::FetchingSchedule);

        vec![Command::FetchSchedule {
            generation: self.fetch_generation,
            coordinate,
            method: self.method,
            date,
        }]
    }

    fn on_schedule(
        &mut self,
        generation: u64,
        result: Result<Arc<PrayerSchedule>, ScheduleError>,
    ) -> Vec<Command> {
        let requested = match self.fetching_date {
            Some(date) if generation == self.fetch_generation => date,
            _ => {
                log_debug!("Discarding stale schedule result (generation {})", generation);
                return Vec::new();
            }
        };
        self.fetching_date = None;

        match result {
            Ok(schedule) => {
                if schedule.timezone.is_some() {
                    self.timezone = schedule.timezone;
                }
                // Dated before the timezone was known, or midnight passed in flight
                let today = self.local_now().date();
                if today != requested {
                    log_debug!(
                        "Schedule for {} arrived but it is {} at the coordinate, refetching",
                        requested,
                        today
                    );
                    return self.start_fetch();
                }
                self.schedule = Some(schedule);
                self.set_status(EngineStatus::ScheduleReady);
                self.set_status(EngineStatus::Live);
                Vec::new()
            }
            Err(error) => {
                log_warning!("Schedule fetch failed: {}", error);
                self.schedule = None;
                self.set_status(EngineStatus::ScheduleFailed { kind: error.kind() });
                Vec::new()
            }
        }
    }

    fn on_tick(&mut self) -> Vec<Command> {
        if self.status != EngineStatus::Live {
            return Vec::new();
        }
        let today = self.local_now().date();
        match &self.schedule {
            Some(schedule) if schedule.date != today => {
                log_decorated!("Date changed to {}, refreshing schedule", today);
                self.start_fetch()
            }
            _ => Vec::new(),
        }
    }

    fn on_retry(&mut self) -> Vec<Command> {
        match self.status {
            EngineStatus::ScheduleFailed { .. } => self.start_fetch(),
            status => {
                log_debug!("Ignoring retry while {}", status);
                Vec::new()
            }
        }
    }

    fn on_set_coordinate(&mut self, coordinate: Coordinate) -> Vec<Command> {
        // Invalidate any acquisition still in flight
        self.location_attempt += 1;
        self.adopt_coordinate(coordinate, None);
        self.set_status(EngineStatus::LocationAcquired);

        let mut commands = vec![Command::PersistCoordinate(coordinate)];
        commands.extend(self.start_fetch());
        commands
    }

    fn on_set_method(&mut self, method: CalculationMethod) -> Vec<Command> {
        let mut commands = vec![Command::PersistMethod(method)];
        if method == self.method {
            return commands;
        }
        self.method = method;

        match self.status {
            EngineStatus::Idle | EngineStatus::AcquiringLocation => {}
            _ => {
                self.schedule = None;
                commands.extend(self.start_fetch());
            }
        }
        commands
    }

    fn recompute(&mut self) {
        let local_time = self.local_now();
        let live = self.schedule.as_deref();

        let needle = match (self.bearing, self.heading) {
            (Some(bearing), Some(heading)) => Some(needle_delta(bearing, heading.degrees())),
            _ => None,
        };

        self.snapshot = LiveSnapshot {
            status: self.status,
            coordinate: self.coordinate,
            location_failure: self.location_failure,
            method: self.method,
            qibla_bearing: self.bearing,
            schedule: self.schedule.clone(),
            next_event: live.map(|s| resolve(s, local_time.time())),
            fast_window: live.map(|s| resolve_fast_window(s, local_time.time())),
            heading: self.heading,
            needle_delta: needle,
            sensor: self.sensor,
            local_time: self.coordinate.map(|_| local_time),
        };
    }
}
