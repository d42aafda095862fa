//! De-duplicating schedule cache.
//!
//! Requests are keyed by (rounded coordinate, method, date). While a request
//! for a key is in flight, further callers for the same key wait on it instead
//! of issuing their own. Successful results stay cached for the rest of their
//! date; failures are never cached, so asking again is an explicit retry.

use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::oneshot;

use super::{CalculationMethod, PrayerSchedule, ScheduleRequest, ScheduleSource};
use crate::error::ScheduleError;
use crate::geo::Coordinate;

type SharedResult = Result<Arc<PrayerSchedule>, ScheduleError>;

/// Identity of one cached schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScheduleKey {
    latitude: i64,
    longitude: i64,
    pub method: CalculationMethod,
    pub date: NaiveDate,
}

impl ScheduleKey {
    pub fn new(coordinate: Coordinate, method: CalculationMethod, date: NaiveDate) -> Self {
        let (latitude, longitude) = coordinate.rounded_key();
        Self {
            latitude,
            longitude,
            method,
            date,
        }
    }
}

#[derive(Default)]
struct FetcherState {
    ready: HashMap<ScheduleKey, Arc<PrayerSchedule>>,
    in_flight: HashMap<ScheduleKey, Vec<oneshot::Sender<SharedResult>>>,
}

impl FetcherState {
    /// Drop schedules for dates before `date`.
    fn evict_before(&mut self, date: NaiveDate) {
        self.ready.retain(|key, _| key.date >= date);
    }
}

/// Caching front for a [`ScheduleSource`].
pub struct PrayerScheduleFetcher<S> {
    source: S,
    state: Mutex<FetcherState>,
}

impl<S: ScheduleSource> PrayerScheduleFetcher<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            state: Mutex::new(FetcherState::default()),
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    fn lock(&self) -> MutexGuard<'_, FetcherState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Retrieve the schedule for a coordinate, method and date.
    ///
    /// Concurrent calls with the same key share one underlying request and
    /// all observe its result.
    pub async fn fetch(
        &self,
        coordinate: Coordinate,
        method: CalculationMethod,
        date: NaiveDate,
    ) -> SharedResult {
        let key = ScheduleKey::new(coordinate, method, date);

        let waiter = {
            let mut state = self.lock();
            state.evict_before(date);

            if let Some(hit) = state.ready.get(&key) {
                return Ok(hit.clone());
            }

            match state.in_flight.get_mut(&key) {
                Some(waiters) => {
                    let (tx, rx) = oneshot::channel();
                    waiters.push(tx);
                    Some(rx)
                }
                None => {
                    state.in_flight.insert(key, Vec::new());
                    None
                }
            }
        };

        if let Some(rx) = waiter {
            log_debug!("Joining in-flight schedule request for {}", date);
            return rx
                .await
                .unwrap_or_else(|_| Err(ScheduleError::network("request was abandoned")));
        }

        let flight = InFlight {
            fetcher: self,
            key,
            settled: false,
        };

        let request = ScheduleRequest {
            coordinate,
            method,
            date,
        };
        let result = self.source.fetch(request).await.map(Arc::new);
        flight.settle(&result);
        result
    }

    /// Cached schedule for a key, without fetching.
    pub fn cached(
        &self,
        coordinate: Coordinate,
        method: CalculationMethod,
        date: NaiveDate,
    ) -> Option<Arc<PrayerSchedule>> {
        self.lock()
            .ready
            .get(&ScheduleKey::new(coordinate, method, date))
            .cloned()
    }

    pub fn in_flight_count(&self) -> usize {
        self.lock().in_flight.len()
    }
}

/// Leader's claim on an in-flight key.
///
/// Dropping it unsettled (the leading future was cancelled) releases the key;
/// waiters then observe a closed channel.
struct InFlight<'a, S> {
    fetcher: &'a PrayerScheduleFetcher<S>,
    key: ScheduleKey,
    settled: bool,
}

impl<S: ScheduleSource> InFlight<'_, S> {
    fn settle(mut self, result: &SharedResult) {
        let waiters = {
            let mut state = self.fetcher.lock();
            if let Ok(schedule) = result {
                state.ready.insert(self.key, schedule.clone());
            }
            state.in_flight.remove(&self.key).unwrap_or_default()
        };
        self.settled = true;

        for waiter in waiters {
            let _ = waiter.send(result.clone());
        }
    }
}

impl<S> Drop for InFlight<'_, S> {
    fn drop(&mut self) {
        if !self.settled {
            let mut state = self
                .fetcher
                .state
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            state.in_flight.remove(&self.key);
        }
    }
}
