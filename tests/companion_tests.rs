//! End-to-end tests of the live runtime against scripted collaborators.
//!
//! Every test runs on a paused tokio clock so timeouts, debouncing and the
//! minute ticker advance instantly once the runtime is idle. Wall-clock time
//! seen by the engine comes from a `FixedTimeSource` the test moves by hand.

use chrono::{Duration as ChronoDuration, NaiveDate};
use std::sync::Arc;
use std::time::Duration;

use miqat::core::{Companion, CompanionHandle, EngineStatus, LiveSnapshot, SensorStatus};
use miqat::error::{FailureKind, LocationError, ScheduleError, SensorError};
use miqat::geo::{Coordinate, KAABA, needle_delta, qibla_bearing};
use miqat::heading::{AccessOutcome, HeadingSensor, OrientationPlatform, RawOrientation};
use miqat::logger::Log;
use miqat::schedule::{CalculationMethod, Prayer};
use miqat::state::{MemoryStore, Preferences};
use miqat::testing::{FakeLocation, FakeScheduleSource, ScriptedOrientation};
use miqat::time_source::{FixedTimeSource, parse_datetime};

const PARIS_TIMES: [&str; 6] = ["06:30", "07:45", "13:05", "16:20", "18:50", "20:10"];

fn london() -> Coordinate {
    Coordinate::new(51.5074, -0.1278).unwrap()
}

fn paris() -> Coordinate {
    Coordinate::new(48.8566, 2.3522).unwrap()
}

fn clock_at(datetime: &str) -> Arc<FixedTimeSource> {
    Arc::new(FixedTimeSource::at(datetime).unwrap())
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

async fn until<P: OrientationPlatform>(
    handle: &CompanionHandle<P>,
    predicate: impl FnMut(&LiveSnapshot) -> bool,
) -> LiveSnapshot {
    Log::set_enabled(false);
    tokio::time::timeout(Duration::from_secs(600), handle.wait_for(predicate))
        .await
        .expect("engine did not reach the expected state in time")
        .expect("engine stopped before reaching the expected state")
}

async fn live<P: OrientationPlatform>(handle: &CompanionHandle<P>) -> LiveSnapshot {
    until(handle, |s| s.status == EngineStatus::Live).await
}

#[tokio::test(start_paused = true)]
async fn test_goes_live_with_acquired_location() {
    let store = Arc::new(MemoryStore::new());
    let source = FakeScheduleSource::new();
    let handle = Companion::new(
        FakeLocation::at(london()),
        source.clone(),
        Preferences::new(store.clone()),
    )
    .with_clock(clock_at("2025-03-01 13:00:00"))
    .start();

    let snapshot = live(&handle).await;

    assert_eq!(snapshot.coordinate, Some(london()));
    assert!(!snapshot.uses_default_location());
    assert_eq!(snapshot.qibla_bearing, Some(qibla_bearing(london())));
    assert_eq!(snapshot.method, CalculationMethod::Isna);
    assert_eq!(snapshot.sensor, SensorStatus::Unavailable);
    assert_eq!(snapshot.message(), None);

    let next = snapshot.next_event.unwrap();
    assert_eq!(next.prayer, Prayer::Asr);
    assert_eq!(next.minutes_until, 165);
    assert!(!next.is_tomorrow);
    assert_eq!(snapshot.fast_window.unwrap().minutes_until, 310);

    let requests = source.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].date, date(2025, 3, 1));
    assert_eq!(requests[0].method, CalculationMethod::Isna);

    // The runtime, not the provider, remembers the acquired coordinate
    assert_eq!(
        Preferences::new(store).cached_coordinate(),
        Some(london())
    );
}

#[tokio::test(start_paused = true)]
async fn test_location_failure_falls_back_to_kaaba() {
    let store = Arc::new(MemoryStore::new());
    let handle = Companion::new(
        FakeLocation::failing(LocationError::PermissionDenied),
        FakeScheduleSource::new(),
        Preferences::new(store.clone()),
    )
    .with_clock(clock_at("2025-03-01 13:00:00"))
    .start();

    let snapshot = live(&handle).await;

    assert_eq!(snapshot.coordinate, Some(KAABA));
    assert!(snapshot.uses_default_location());
    assert_eq!(snapshot.location_failure, Some(LocationError::PermissionDenied));
    assert_eq!(
        snapshot.message(),
        Some(FailureKind::PermissionDenied.user_message())
    );
    assert!(snapshot.schedule.is_some());
    assert_eq!(Preferences::new(store).cached_coordinate(), None);
}

#[tokio::test(start_paused = true)]
async fn test_hanging_location_times_out() {
    let location = FakeLocation::hanging();
    let handle = Companion::new(
        location.clone(),
        FakeScheduleSource::new(),
        Preferences::in_memory(),
    )
    .with_clock(clock_at("2025-03-01 13:00:00"))
    .with_location_timeout(Duration::from_secs(5))
    .start();

    let snapshot = until(&handle, |s| s.status.is_settled()).await;

    assert_eq!(snapshot.status, EngineStatus::Live);
    assert_eq!(snapshot.location_failure, Some(LocationError::Timeout));
    assert_eq!(snapshot.coordinate, Some(KAABA));
    assert_eq!(location.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_retry_location_after_fallback() {
    let location = FakeLocation::failing(LocationError::CapabilityUnavailable);
    let handle = Companion::new(
        location.clone(),
        FakeScheduleSource::new(),
        Preferences::in_memory(),
    )
    .with_clock(clock_at("2025-03-01 13:00:00"))
    .start();

    assert_eq!(live(&handle).await.coordinate, Some(KAABA));

    location.succeed_with(london());
    handle.retry_location();

    let snapshot = until(&handle, |s| {
        s.status == EngineStatus::Live && s.coordinate == Some(london())
    })
    .await;
    assert!(!snapshot.uses_default_location());
    assert_eq!(location.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_schedule_failure_then_retry() {
    let source = FakeScheduleSource::new();
    source.fail_with(Some(ScheduleError::network("connection refused")));

    let handle = Companion::new(FakeLocation::at(london()), source.clone(), Preferences::in_memory())
        .with_clock(clock_at("2025-03-01 13:00:00"))
        .start();

    let failed = until(&handle, |s| s.status.is_settled()).await;
    assert_eq!(
        failed.status,
        EngineStatus::ScheduleFailed {
            kind: FailureKind::NetworkError
        }
    );
    assert!(failed.schedule.is_none());
    assert!(failed.next_event.is_none());
    assert_eq!(
        failed.message(),
        Some(FailureKind::NetworkError.user_message())
    );
    // The bearing does not depend on the schedule
    assert_eq!(failed.qibla_bearing, Some(qibla_bearing(london())));

    source.fail_with(None);
    handle.retry();

    let snapshot = live(&handle).await;
    assert!(snapshot.schedule.is_some());
    assert_eq!(source.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_malformed_schedule_is_reported() {
    let source = FakeScheduleSource::new().with_times(
        london(),
        ["05:00", "06:20", "noon", "15:45", "18:10", "19:30"],
    );
    let handle = Companion::new(FakeLocation::at(london()), source, Preferences::in_memory())
        .with_clock(clock_at("2025-03-01 13:00:00"))
        .start();

    let snapshot = until(&handle, |s| s.status.is_settled()).await;
    assert_eq!(
        snapshot.status,
        EngineStatus::ScheduleFailed {
            kind: FailureKind::MalformedResponse
        }
    );
}

#[tokio::test(start_paused = true)]
async fn test_stale_schedule_for_previous_coordinate_is_discarded() {
    let source = FakeScheduleSource::new().with_times(paris(), PARIS_TIMES);
    source.hold(london());

    let handle = Companion::new(FakeLocation::at(london()), source.clone(), Preferences::in_memory())
        .with_clock(clock_at("2025-03-01 13:00:00"))
        .start();

    until(&handle, |s| s.status == EngineStatus::FetchingSchedule).await;

    handle.set_coordinate(paris());
    let snapshot = until(&handle, |s| {
        s.status == EngineStatus::Live && s.coordinate == Some(paris())
    })
    .await;
    assert_eq!(snapshot.next_event.unwrap().time_of_day, "13:05");

    // The London answer arrives late and must not replace the Paris schedule
    source.release(london());
    tokio::time::sleep(Duration::from_secs(1)).await;

    let snapshot = handle.snapshot();
    assert_eq!(snapshot.status, EngineStatus::Live);
    assert_eq!(snapshot.coordinate, Some(paris()));
    let schedule = snapshot.schedule.unwrap();
    assert_eq!(schedule.clock_of(Prayer::Fajr), "06:30");
    assert_eq!(source.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_method_change_is_persisted_and_refetched() {
    let store = Arc::new(MemoryStore::new());
    let source = FakeScheduleSource::new();
    let handle = Companion::new(
        FakeLocation::at(london()),
        source.clone(),
        Preferences::new(store.clone()),
    )
    .with_clock(clock_at("2025-03-01 13:00:00"))
    .start();

    live(&handle).await;
    handle.set_method(CalculationMethod::UmmAlQura);

    let snapshot = until(&handle, |s| {
        s.status == EngineStatus::Live && s.method == CalculationMethod::UmmAlQura
    })
    .await;
    assert!(snapshot.schedule.is_some());

    let requests = source.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[1].method, CalculationMethod::UmmAlQura);
    assert_eq!(
        Preferences::new(store).stored_calculation_method(),
        Some(CalculationMethod::UmmAlQura)
    );
}

#[tokio::test(start_paused = true)]
async fn test_stored_method_overrides_default() {
    let store = MemoryStore::new().with("calculationMethod", "3");
    let source = FakeScheduleSource::new();
    let handle = Companion::new(
        FakeLocation::at(london()),
        source.clone(),
        Preferences::new(Arc::new(store)),
    )
    .with_clock(clock_at("2025-03-01 13:00:00"))
    .with_default_method(CalculationMethod::Egyptian)
    .start();

    let snapshot = live(&handle).await;
    assert_eq!(snapshot.method, CalculationMethod::MuslimWorldLeague);
    assert_eq!(source.requests()[0].method, CalculationMethod::MuslimWorldLeague);
}

#[tokio::test(start_paused = true)]
async fn test_minute_tick_advances_countdown() {
    let clock = clock_at("2025-03-01 13:00:00");
    let handle = Companion::new(
        FakeLocation::at(london()),
        FakeScheduleSource::new(),
        Preferences::in_memory(),
    )
    .with_clock(clock.clone())
    .start();

    let observer = handle.subscribe();
    assert_eq!(live(&handle).await.next_event.unwrap().minutes_until, 165);

    clock.advance(ChronoDuration::minutes(1));
    tokio::time::sleep(Duration::from_secs(61)).await;

    let snapshot = observer.borrow().clone();
    assert_eq!(snapshot.next_event.unwrap().minutes_until, 164);
    assert_eq!(
        snapshot.local_time.unwrap().format("%H:%M").to_string(),
        "13:01"
    );
}

#[tokio::test(start_paused = true)]
async fn test_date_rollover_fetches_next_day() {
    let clock = clock_at("2025-03-01 23:59:30");
    let source = FakeScheduleSource::new();
    let handle = Companion::new(FakeLocation::at(london()), source.clone(), Preferences::in_memory())
        .with_clock(clock.clone())
        .start();

    let before = live(&handle).await;
    assert_eq!(before.schedule.unwrap().date, date(2025, 3, 1));
    assert!(before.next_event.unwrap().is_tomorrow);

    clock.set(parse_datetime("2025-03-02 00:00:30").unwrap());

    let after = until(&handle, |s| {
        s.status == EngineStatus::Live
            && s.schedule.as_ref().is_some_and(|schedule| schedule.date == date(2025, 3, 2))
    })
    .await;
    let next = after.next_event.unwrap();
    assert_eq!(next.prayer, Prayer::Fajr);
    assert!(!next.is_tomorrow);
    assert_eq!(source.requests().last().unwrap().date, date(2025, 3, 2));
}

#[tokio::test(start_paused = true)]
async fn test_heading_updates_needle() {
    let platform = ScriptedOrientation::ungated();
    let handle = Companion::new(
        FakeLocation::at(london()),
        FakeScheduleSource::new(),
        Preferences::in_memory(),
    )
    .with_heading_sensor(HeadingSensor::new(platform.clone()))
    .with_clock(clock_at("2025-03-01 13:00:00"))
    .start();

    let snapshot = live(&handle).await;
    assert_eq!(snapshot.sensor, SensorStatus::Streaming);
    assert_eq!(snapshot.needle_delta, None);
    assert_eq!(platform.listener_count(), 1);

    platform.emit(RawOrientation::CompassHeading(90.0));
    let snapshot = until(&handle, |s| s.heading.is_some()).await;
    assert_eq!(snapshot.heading.unwrap().degrees(), 90.0);
    assert_eq!(
        snapshot.needle_delta,
        Some(needle_delta(qibla_bearing(london()), 90.0))
    );

    // Rotation angles are mirrored into compass headings
    platform.emit(RawOrientation::RotationAngle(90.0));
    let snapshot = until(&handle, |s| {
        s.heading.is_some_and(|h| h.degrees() == 270.0)
    })
    .await;
    assert!(snapshot.needle_delta.is_some());
}

#[tokio::test(start_paused = true)]
async fn test_heading_debounce_keeps_latest_sample() {
    let platform = ScriptedOrientation::ungated();
    let handle = Companion::new(
        FakeLocation::at(london()),
        FakeScheduleSource::new(),
        Preferences::in_memory(),
    )
    .with_heading_sensor(HeadingSensor::new(platform.clone()))
    .with_heading_debounce(Some(Duration::from_millis(200)))
    .with_clock(clock_at("2025-03-01 13:00:00"))
    .start();

    live(&handle).await;

    platform.emit(RawOrientation::CompassHeading(10.0));
    platform.emit(RawOrientation::CompassHeading(20.0));
    platform.emit(RawOrientation::CompassHeading(30.0));

    let first = until(&handle, |s| s.heading.is_some()).await;
    assert_eq!(first.heading.unwrap().degrees(), 10.0);

    tokio::time::sleep(Duration::from_millis(250)).await;
    assert_eq!(handle.snapshot().heading.unwrap().degrees(), 30.0);
}

#[tokio::test(start_paused = true)]
async fn test_gated_sensor_requires_user_request() {
    let platform = ScriptedOrientation::gated(true);
    let handle = Companion::new(
        FakeLocation::at(london()),
        FakeScheduleSource::new(),
        Preferences::in_memory(),
    )
    .with_heading_sensor(HeadingSensor::new(platform.clone()))
    .with_clock(clock_at("2025-03-01 13:00:00"))
    .start();

    let snapshot = live(&handle).await;
    assert_eq!(snapshot.sensor, SensorStatus::PermissionRequired);
    assert_eq!(platform.listener_count(), 0);
    assert_eq!(platform.permission_requests(), 0);

    let outcome = handle.request_heading_access().await.unwrap();
    assert_eq!(outcome, AccessOutcome::Granted);

    until(&handle, |s| s.sensor == SensorStatus::Streaming).await;
    assert_eq!(platform.listener_count(), 1);
    assert_eq!(platform.permission_requests(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_denied_sensor_keeps_bearing() {
    let platform = ScriptedOrientation::gated(false);
    let handle = Companion::new(
        FakeLocation::at(london()),
        FakeScheduleSource::new(),
        Preferences::in_memory(),
    )
    .with_heading_sensor(HeadingSensor::new(platform.clone()))
    .with_clock(clock_at("2025-03-01 13:00:00"))
    .start();

    live(&handle).await;
    let outcome = handle.request_heading_access().await.unwrap();
    assert_eq!(outcome, AccessOutcome::Denied);

    let snapshot = until(&handle, |s| s.sensor == SensorStatus::Denied).await;
    assert_eq!(snapshot.qibla_bearing, Some(qibla_bearing(london())));
    assert_eq!(snapshot.needle_delta, None);
    assert_eq!(platform.listener_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_heading_access_without_sensor() {
    let handle = Companion::new(
        FakeLocation::at(london()),
        FakeScheduleSource::new(),
        Preferences::in_memory(),
    )
    .with_clock(clock_at("2025-03-01 13:00:00"))
    .start();

    live(&handle).await;
    assert_eq!(
        handle.request_heading_access().await,
        Err(SensorError::CapabilityUnavailable)
    );
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_releases_heading_subscription() {
    let platform = ScriptedOrientation::ungated();
    let handle = Companion::new(
        FakeLocation::at(london()),
        FakeScheduleSource::new(),
        Preferences::in_memory(),
    )
    .with_heading_sensor(HeadingSensor::new(platform.clone()))
    .with_clock(clock_at("2025-03-01 13:00:00"))
    .start();

    live(&handle).await;
    assert_eq!(platform.listener_count(), 1);
    assert!(handle.is_running());

    handle.shutdown();
    handle.stopped().await;

    assert!(!handle.is_running());
    assert_eq!(platform.listener_count(), 0);

    // Requests after stop are ignored rather than panicking
    handle.retry();
    handle.set_method(CalculationMethod::Gulf);
    assert_eq!(handle.snapshot().method, CalculationMethod::Isna);
}

#[tokio::test(start_paused = true)]
async fn test_leaky_platform_delivers_nothing_after_stop() {
    let platform = ScriptedOrientation::leaky();
    let handle = Companion::new(
        FakeLocation::at(london()),
        FakeScheduleSource::new(),
        Preferences::in_memory(),
    )
    .with_heading_sensor(HeadingSensor::new(platform.clone()))
    .with_clock(clock_at("2025-03-01 13:00:00"))
    .start();

    live(&handle).await;
    handle.shutdown();
    handle.stopped().await;

    // The platform kept the listener, but it is inert
    assert_eq!(platform.listener_count(), 1);
    platform.emit(RawOrientation::CompassHeading(45.0));
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(handle.snapshot().heading, None);
}

#[tokio::test(start_paused = true)]
async fn test_dropping_every_handle_stops_engine() {
    let platform = ScriptedOrientation::ungated();
    let handle = Companion::new(
        FakeLocation::at(london()),
        FakeScheduleSource::new(),
        Preferences::in_memory(),
    )
    .with_heading_sensor(HeadingSensor::new(platform.clone()))
    .with_clock(clock_at("2025-03-01 13:00:00"))
    .start();

    live(&handle).await;
    let mut observer = handle.subscribe();
    drop(handle);

    // The channel closes once the engine task has exited
    tokio::time::timeout(Duration::from_secs(5), async {
        while observer.changed().await.is_ok() {}
    })
    .await
    .expect("engine kept running without handles");

    assert_eq!(platform.listener_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_wait_for_returns_none_when_stopped_first() {
    let handle = Companion::new(
        FakeLocation::hanging(),
        FakeScheduleSource::new(),
        Preferences::in_memory(),
    )
    .with_clock(clock_at("2025-03-01 13:00:00"))
    .with_location_timeout(Duration::from_secs(120))
    .start();

    let stopper = handle.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        stopper.shutdown();
    });

    let result = handle.wait_for(|s| s.status == EngineStatus::Live).await;
    assert!(result.is_none());
    assert_eq!(handle.snapshot().status, EngineStatus::AcquiringLocation);
}
