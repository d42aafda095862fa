//! Terminal rendering of live snapshots.
//!
//! [`render_dashboard`] produces the full multi-line view printed when the
//! engine settles or the schedule changes; [`render_update`] produces the
//! single timestamped line printed on every minute tick in follow mode.

use std::fmt::Write;

use crate::core::{EngineStatus, LiveSnapshot, SensorStatus};
use crate::schedule::FastPhase;

/// Needle deltas within this many degrees count as facing the Qibla.
const ALIGNED_TOLERANCE: f64 = 2.0;

const COMPASS_POINTS: [&str; 16] = [
    "N", "NNE", "NE", "ENE", "E", "ESE", "SE", "SSE", "S", "SSW", "SW", "WSW", "W", "WNW", "NW",
    "NNW",
];

/// Format a whole-minute countdown, e.g. `"2h 05m"` or `"45m"`.
pub fn format_countdown(minutes: u32) -> String {
    let hours = minutes / 60;
    let minutes = minutes % 60;
    if hours > 0 {
        format!("{hours}h {minutes:02}m")
    } else {
        format!("{minutes}m")
    }
}

/// Format a bearing with its 16-point compass direction, e.g. `"118.9° ESE"`.
pub fn format_bearing(degrees: f64) -> String {
    let index = ((degrees / 22.5).round() as usize) % COMPASS_POINTS.len();
    format!("{degrees:.1}° {}", COMPASS_POINTS[index])
}

/// Describe which way to turn for a needle delta in (-180, 180].
pub fn format_needle(delta: f64) -> String {
    if delta.abs() <= ALIGNED_TOLERANCE {
        "facing the Qibla".to_string()
    } else if delta > 0.0 {
        format!("turn {delta:.0}° right")
    } else {
        format!("turn {:.0}° left", delta.abs())
    }
}

fn sensor_line(snapshot: &LiveSnapshot) -> String {
    match (snapshot.sensor, snapshot.heading, snapshot.needle_delta) {
        (SensorStatus::Streaming, Some(heading), Some(delta)) => {
            format!("heading {heading}, {}", format_needle(delta))
        }
        (SensorStatus::Streaming, _, _) => "waiting for compass".to_string(),
        (SensorStatus::Unavailable, _, _) => "no compass, bearing is from true north".to_string(),
        (SensorStatus::PermissionRequired, _, _) => "compass needs permission".to_string(),
        (SensorStatus::Denied, _, _) => "compass permission denied".to_string(),
    }
}

/// Full dashboard for a snapshot.
pub fn render_dashboard(snapshot: &LiveSnapshot) -> String {
    let mut out = String::new();

    match snapshot.coordinate {
        Some(coordinate) if snapshot.uses_default_location() => {
            let _ = writeln!(out, "      Location: {coordinate} (Makkah, default)");
        }
        Some(coordinate) => {
            let _ = writeln!(out, "      Location: {coordinate}");
        }
        None => {
            let _ = writeln!(out, "      Location: {}", snapshot.status);
        }
    }

    if let Some(bearing) = snapshot.qibla_bearing {
        let _ = writeln!(out, "         Qibla: {}", format_bearing(bearing));
        let _ = writeln!(out, "       Compass: {}", sensor_line(snapshot));
    }
    let _ = writeln!(out, "        Method: {}", snapshot.method);

    if let Some(schedule) = &snapshot.schedule {
        let date = schedule.date.format("%A %-d %B %Y");
        match &schedule.hijri {
            Some(hijri) => {
                let _ = writeln!(out, "          Date: {date} / {hijri}");
            }
            None => {
                let _ = writeln!(out, "          Date: {date}");
            }
        }
        if let Some(tz) = schedule.timezone {
            let _ = writeln!(out, "      Timezone: {tz}");
        }

        let next = snapshot.next_event.as_ref();
        for (prayer, _) in schedule.iter() {
            let marker = match next {
                Some(event) if event.prayer == prayer && !event.is_tomorrow => "▶",
                _ => " ",
            };
            let _ = writeln!(
                out,
                "    {marker} {:>7}: {}",
                prayer.name(),
                schedule.clock_of(prayer)
            );
        }

        if let Some(event) = next {
            let when = if event.is_tomorrow { " tomorrow" } else { "" };
            let _ = writeln!(
                out,
                "          Next: {} at {}{when} (in {})",
                event.prayer,
                event.time_of_day,
                format_countdown(event.minutes_until)
            );
        }
        if let Some(fast) = &snapshot.fast_window {
            let phase = match fast.phase {
                FastPhase::BeforeFajr => "before Fajr",
                FastPhase::Fasting => "fasting",
                FastPhase::AfterMaghrib => "after Maghrib",
            };
            let _ = writeln!(
                out,
                "          Fast: {phase}, {} at {} (in {})",
                fast.boundary,
                fast.time_of_day,
                format_countdown(fast.minutes_until)
            );
        }
    } else if snapshot.status.failure().is_none() {
        let _ = writeln!(out, "      Schedule: {}", snapshot.status);
    }

    if let Some(message) = snapshot.message() {
        let _ = writeln!(out, "        Notice: {message}");
    }
    if let Some(kind) = snapshot.status.failure()
        && kind.retryable()
    {
        let _ = writeln!(out, "                press Enter to retry");
    }

    out
}

/// One-line follow-mode summary, prefixed with the schedule-local time.
pub fn render_update(snapshot: &LiveSnapshot) -> String {
    let mut out = String::new();
    if let Some(local) = snapshot.local_time {
        let _ = write!(out, "[{}] ", local.format("%H:%M"));
    }

    match (&snapshot.next_event, snapshot.status) {
        (Some(event), EngineStatus::Live | EngineStatus::FetchingSchedule) => {
            let _ = write!(
                out,
                "{} at {} in {}",
                event.prayer,
                event.time_of_day,
                format_countdown(event.minutes_until)
            );
            if let Some(fast) = &snapshot.fast_window {
                let _ = write!(
                    out,
                    " | {} in {}",
                    fast.boundary,
                    format_countdown(fast.minutes_until)
                );
            }
            if let Some(delta) = snapshot.needle_delta {
                let _ = write!(out, " | {}", format_needle(delta));
            }
        }
        (_, status) => {
            let _ = write!(out, "{status}");
        }
    }
    out
}
