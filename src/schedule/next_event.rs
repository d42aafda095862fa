//! Pure resolvers deriving "what comes next" from a schedule and a time of day.
//!
//! Both resolvers work at minute granularity and treat an event whose minute
//! equals the current minute as already passed, so no event is ever "next" and
//! "now" at the same time. When every event of the day has passed they wrap to
//! tomorrow's Fajr using today's Fajr time; fetching tomorrow's schedule is the
//! caller's job.

use chrono::NaiveTime;
use serde::Serialize;
use std::fmt;

use super::{Prayer, PrayerSchedule, minutes_of_day};
use crate::common::constants::MINUTES_PER_DAY;

/// The next upcoming prayer relative to a time of day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NextEvent {
    pub prayer: Prayer,
    /// `"HH:MM"` as listed in the schedule.
    pub time_of_day: String,
    pub minutes_until: u32,
    /// True when the event is tomorrow's Fajr.
    pub is_tomorrow: bool,
}

/// Determine the next prayer after `now`.
///
/// The first prayer in fixed order whose time is strictly later than `now`
/// wins, even if the schedule is out of order. With none left today, the
/// result is Fajr at `fajr + 1440 - now` minutes.
pub fn resolve(schedule: &PrayerSchedule, now: NaiveTime) -> NextEvent {
    let now_minutes = minutes_of_day(now);

    for (prayer, time) in schedule.iter() {
        let minutes = minutes_of_day(time);
        if minutes > now_minutes {
            return NextEvent {
                prayer,
                time_of_day: schedule.clock_of(prayer),
                minutes_until: minutes - now_minutes,
                is_tomorrow: false,
            };
        }
    }

    let fajr = minutes_of_day(schedule.time_of(Prayer::Fajr));
    NextEvent {
        prayer: Prayer::Fajr,
        time_of_day: schedule.clock_of(Prayer::Fajr),
        minutes_until: fajr + MINUTES_PER_DAY - now_minutes,
        is_tomorrow: true,
    }
}

/// Where the current time sits relative to the fasting day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FastPhase {
    /// Before today's Fajr; suhoor is still permitted.
    BeforeFajr,
    /// Between Fajr and Maghrib.
    Fasting,
    /// After Maghrib; the next boundary is tomorrow's Fajr.
    AfterMaghrib,
}

/// The next fast boundary crossing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FastBoundary {
    SuhoorEnds,
    Iftar,
}

impl fmt::Display for FastBoundary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SuhoorEnds => f.write_str("Suhoor Ends"),
            Self::Iftar => f.write_str("Iftar"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FastWindow {
    pub phase: FastPhase,
    pub boundary: FastBoundary,
    pub time_of_day: String,
    pub minutes_until: u32,
}

/// Determine the fast phase and the next boundary crossing.
pub fn resolve_fast_window(schedule: &PrayerSchedule, now: NaiveTime) -> FastWindow {
    let now_minutes = minutes_of_day(now);
    let fajr = minutes_of_day(schedule.time_of(Prayer::Fajr));
    let maghrib = minutes_of_day(schedule.time_of(Prayer::Maghrib));

    if fajr > now_minutes {
        FastWindow {
            phase: FastPhase::BeforeFajr,
            boundary: FastBoundary::SuhoorEnds,
            time_of_day: schedule.clock_of(Prayer::Fajr),
            minutes_until: fajr - now_minutes,
        }
    } else if maghrib > now_minutes {
        FastWindow {
            phase: FastPhase::Fasting,
            boundary: FastBoundary::Iftar,
            time_of_day: schedule.clock_of(Prayer::Maghrib),
            minutes_until: maghrib - now_minutes,
        }
    } else {
        FastWindow {
            phase: FastPhase::AfterMaghrib,
            boundary: FastBoundary::SuhoorEnds,
            time_of_day: schedule.clock_of(Prayer::Fajr),
            minutes_until: fajr + MINUTES_PER_DAY - now_minutes,
        }
    }
}
