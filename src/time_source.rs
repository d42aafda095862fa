//! Time source abstraction for supporting both real and fixed time.
//!
//! The countdown engine never reads the system clock directly. It asks a
//! [`TimeSource`], which is either the real clock or a [`FixedTimeSource`] that
//! tests move by hand. A process-wide source
//! can also be installed for code that has no handle to inject, such as the
//! logger's timestamp prefix.

use chrono::{DateTime, Duration as ChronoDuration, Local, NaiveDateTime, TimeZone};
use once_cell::sync::OnceCell;
use std::sync::{Arc, Mutex};

/// Process-wide source; the real clock unless one was installed.
static TIME_SOURCE: OnceCell<Arc<dyn TimeSource>> = OnceCell::new();

/// Anything that can tell the engine what time it is.
pub trait TimeSource: Send + Sync {
    fn now(&self) -> DateTime<Local>;

    /// True for clocks that do not follow the wall clock.
    fn is_simulated(&self) -> bool;
}

/// The system clock.
pub struct RealTimeSource;

impl TimeSource for RealTimeSource {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }

    fn is_simulated(&self) -> bool {
        false
    }
}

/// Manually driven clock.
///
/// Time only moves when [`set`](Self::set) or [`advance`](Self::advance) is
/// called.
pub struct FixedTimeSource {
    current: Mutex<DateTime<Local>>,
}

impl FixedTimeSource {
    pub fn new(start: DateTime<Local>) -> Self {
        Self {
            current: Mutex::new(start),
        }
    }

    /// Convenience constructor from a "YYYY-MM-DD HH:MM:SS" string.
    pub fn at(s: &str) -> Result<Self, String> {
        parse_datetime(s).map(Self::new)
    }

    pub fn set(&self, time: DateTime<Local>) {
        if let Ok(mut guard) = self.current.lock() {
            *guard = time;
        }
    }

    pub fn advance(&self, by: ChronoDuration) {
        if let Ok(mut guard) = self.current.lock() {
            *guard += by;
        }
    }
}

impl TimeSource for FixedTimeSource {
    fn now(&self) -> DateTime<Local> {
        match self.current.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    fn is_simulated(&self) -> bool {
        true
    }
}

/// Install the process-wide source. Only the first call has any effect.
pub fn init_time_source(source: Arc<dyn TimeSource>) {
    let _ = TIME_SOURCE.set(source);
}

pub fn is_initialized() -> bool {
    TIME_SOURCE.get().is_some()
}

/// The installed global source, or the real clock.
pub fn global() -> Arc<dyn TimeSource> {
    installed_or_real().clone()
}

fn installed_or_real() -> &'static Arc<dyn TimeSource> {
    TIME_SOURCE.get_or_init(|| Arc::new(RealTimeSource))
}

pub fn now() -> DateTime<Local> {
    installed_or_real().now()
}

pub fn is_simulated() -> bool {
    installed_or_real().is_simulated()
}

/// Read a local "YYYY-MM-DD HH:MM:SS" time.
///
/// Times that fall in a DST gap or overlap are rejected.
pub fn parse_datetime(s: &str) -> Result<DateTime<Local>, String> {
    let naive = NaiveDateTime::parse_from_str(s.trim(), "%Y-%m-%d %H:%M:%S")
        .map_err(|e| format!("{s:?} is not YYYY-MM-DD HH:MM:SS ({e})"))?;
    Local
        .from_local_datetime(&naive)
        .single()
        .ok_or_else(|| format!("{s:?} does not name a single local time"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    #[test]
    fn test_fixed_source_only_moves_when_told() {
        let clock = FixedTimeSource::at("2025-03-01 11:59:00").unwrap();
        let before = clock.now();
        assert_eq!(clock.now(), before);

        clock.advance(ChronoDuration::minutes(1));
        assert_eq!(clock.now().hour(), 12);
        assert_eq!(clock.now().minute(), 0);
        assert!(clock.is_simulated());
    }

    #[test]
    fn test_parse_datetime_rejects_garbage() {
        assert!(parse_datetime("2025-03-01 25:00:00").is_err());
        assert!(parse_datetime("yesterday").is_err());
        assert!(parse_datetime("2025-03-01 05:30:00").is_ok());
    }
}
