//! Daily prayer schedules and everything derived from them.
//!
//! ## Module Structure
//!
//! - [`api`]: client for the external prayer-times web service
//! - [`fetcher`]: de-duplicating, date-scoped cache in front of a schedule source
//! - [`next_event`]: pure resolvers for the next prayer and the fast window
//!
//! The types here are plain values. A [`PrayerSchedule`] is produced once per
//! (coordinate, method, date) and never mutated afterwards.

pub mod api;
pub mod fetcher;
pub mod next_event;

pub use api::{AladhanClient, ScheduleRequest, ScheduleSource};
pub use fetcher::{PrayerScheduleFetcher, ScheduleKey};
pub use next_event::{FastBoundary, FastPhase, FastWindow, NextEvent, resolve, resolve_fast_window};

use chrono::{NaiveDate, NaiveTime, Timelike};
use chrono_tz::Tz;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::common::constants::DEFAULT_CALCULATION_METHOD;

/// The six daily events, in their fixed chronological order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Prayer {
    Fajr,
    Sunrise,
    Dhuhr,
    Asr,
    Maghrib,
    Isha,
}

impl Prayer {
    pub const ORDER: [Prayer; 6] = [
        Prayer::Fajr,
        Prayer::Sunrise,
        Prayer::Dhuhr,
        Prayer::Asr,
        Prayer::Maghrib,
        Prayer::Isha,
    ];

    /// Key used by the prayer-times service.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Fajr => "Fajr",
            Self::Sunrise => "Sunrise",
            Self::Dhuhr => "Dhuhr",
            Self::Asr => "Asr",
            Self::Maghrib => "Maghrib",
            Self::Isha => "Isha",
        }
    }

    fn index(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for Prayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Calculation convention understood by the prayer-times service.
///
/// Discriminants are the service's method identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
#[repr(u8)]
pub enum CalculationMethod {
    Jafari = 0,
    Karachi = 1,
    #[default]
    Isna = 2,
    MuslimWorldLeague = 3,
    UmmAlQura = 4,
    Egyptian = 5,
    Tehran = 7,
    Gulf = 8,
    Kuwait = 9,
    Qatar = 10,
    Singapore = 11,
    France = 12,
    Turkey = 13,
    Russia = 14,
    Moonsighting = 15,
    Dubai = 16,
    Jakim = 17,
    Tunisia = 18,
    Algeria = 19,
    Kemenag = 20,
    Morocco = 21,
    Portugal = 22,
    Jordan = 23,
}

impl CalculationMethod {
    pub const ALL: [CalculationMethod; 23] = [
        Self::Jafari,
        Self::Karachi,
        Self::Isna,
        Self::MuslimWorldLeague,
        Self::UmmAlQura,
        Self::Egyptian,
        Self::Tehran,
        Self::Gulf,
        Self::Kuwait,
        Self::Qatar,
        Self::Singapore,
        Self::France,
        Self::Turkey,
        Self::Russia,
        Self::Moonsighting,
        Self::Dubai,
        Self::Jakim,
        Self::Tunisia,
        Self::Algeria,
        Self::Kemenag,
        Self::Morocco,
        Self::Portugal,
        Self::Jordan,
    ];

    pub fn id(&self) -> u8 {
        *self as u8
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Jafari => "Shia Ithna-Ansari",
            Self::Karachi => "University of Islamic Sciences, Karachi",
            Self::Isna => "Islamic Society of North America",
            Self::MuslimWorldLeague => "Muslim World League",
            Self::UmmAlQura => "Umm Al-Qura University, Makkah",
            Self::Egyptian => "Egyptian General Authority of Survey",
            Self::Tehran => "Institute of Geophysics, University of Tehran",
            Self::Gulf => "Gulf Region",
            Self::Kuwait => "Kuwait",
            Self::Qatar => "Qatar",
            Self::Singapore => "Majlis Ugama Islam Singapura",
            Self::France => "Union Organization Islamic de France",
            Self::Turkey => "Diyanet İşleri Başkanlığı, Turkey",
            Self::Russia => "Spiritual Administration of Muslims of Russia",
            Self::Moonsighting => "Moonsighting Committee Worldwide",
            Self::Dubai => "Dubai",
            Self::Jakim => "Jabatan Kemajuan Islam Malaysia",
            Self::Tunisia => "Tunisia",
            Self::Algeria => "Algeria",
            Self::Kemenag => "Kementerian Agama Republik Indonesia",
            Self::Morocco => "Morocco",
            Self::Portugal => "Comunidade Islamica de Lisboa",
            Self::Jordan => "Ministry of Awqaf, Islamic Affairs and Holy Places, Jordan",
        }
    }

    /// Parse a stored or configured identifier, falling back to ISNA.
    pub fn from_id_or_default(id: u8) -> Self {
        Self::try_from(id).unwrap_or_default()
    }
}

impl TryFrom<u8> for CalculationMethod {
    type Error = String;

    fn try_from(id: u8) -> Result<Self, Self::Error> {
        Self::ALL
            .into_iter()
            .find(|m| m.id() == id)
            .ok_or_else(|| format!("unknown calculation method {id}"))
    }
}

impl From<CalculationMethod> for u8 {
    fn from(method: CalculationMethod) -> u8 {
        method.id()
    }
}

impl fmt::Display for CalculationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.display_name(), self.id())
    }
}

// Compile-time agreement between the default variant and the constant.
const _: () = assert!(CalculationMethod::Isna as u8 == DEFAULT_CALCULATION_METHOD);

/// Islamic calendar date returned alongside a schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HijriDate {
    pub day: String,
    pub month_number: u8,
    pub month_en: String,
    pub month_ar: String,
    pub year: String,
}

impl fmt::Display for HijriDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {} AH", self.day, self.month_en, self.year)
    }
}

/// One calendar day of prayer times for a coordinate and method.
#[derive(Debug, Clone, PartialEq)]
pub struct PrayerSchedule {
    pub date: NaiveDate,
    times: [NaiveTime; 6],
    pub hijri: Option<HijriDate>,
    /// Timezone the times are expressed in, when the service reported one.
    pub timezone: Option<Tz>,
}

static CLOCK_TIME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(\d{1,2}):(\d{2})\b").expect("clock-time pattern is valid"));

/// Parse the leading `H:MM`/`HH:MM` of a service clock string.
///
/// Trailing annotations such as `" (AST)"` are ignored.
pub fn parse_clock_time(s: &str) -> Option<NaiveTime> {
    let caps = CLOCK_TIME.captures(s)?;
    let hours: u32 = caps[1].parse().ok()?;
    let minutes: u32 = caps[2].parse().ok()?;
    NaiveTime::from_hms_opt(hours, minutes, 0)
}

/// Minutes elapsed since midnight, ignoring seconds.
pub fn minutes_of_day(time: NaiveTime) -> u32 {
    time.hour() * 60 + time.minute()
}

impl PrayerSchedule {
    /// Times must be given in [`Prayer::ORDER`].
    pub fn new(date: NaiveDate, times: [NaiveTime; 6]) -> Self {
        Self {
            date,
            times,
            hijri: None,
            timezone: None,
        }
    }

    /// Build from six `"HH:MM"` strings in [`Prayer::ORDER`].
    pub fn from_clock_strings(date: NaiveDate, times: [&str; 6]) -> Result<Self, String> {
        let mut parsed = [NaiveTime::MIN; 6];
        for (slot, (prayer, raw)) in parsed.iter_mut().zip(Prayer::ORDER.iter().zip(times)) {
            *slot = parse_clock_time(raw).ok_or_else(|| format!("invalid {prayer} time '{raw}'"))?;
        }
        Ok(Self::new(date, parsed))
    }

    pub fn with_hijri(mut self, hijri: Option<HijriDate>) -> Self {
        self.hijri = hijri;
        self
    }

    pub fn with_timezone(mut self, timezone: Option<Tz>) -> Self {
        self.timezone = timezone;
        self
    }

    pub fn time_of(&self, prayer: Prayer) -> NaiveTime {
        self.times[prayer.index()]
    }

    /// Formatted `"HH:MM"` for a prayer.
    pub fn clock_of(&self, prayer: Prayer) -> String {
        self.time_of(prayer).format("%H:%M").to_string()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Prayer, NaiveTime)> + '_ {
        Prayer::ORDER.iter().map(move |p| (*p, self.time_of(*p)))
    }

    /// True when times never decrease in prayer order.
    pub fn is_monotonic(&self) -> bool {
        self.times.windows(2).all(|w| w[0] <= w[1])
    }
}
