//! Prayer-times web service client.
//!
//! The service is queried as
//! `GET {base}/timings/{DD-MM-YYYY}?latitude=..&longitude=..&method=..`
//! and answers with a JSON envelope:
//!
//! ```json
//! { "code": 200, "data": {
//!     "timings": { "Fajr": "05:12", "Sunrise": "06:31", "Dhuhr": "12:20", ... },
//!     "date": { "hijri": { "day": "1", "month": { "number": 9, "en": "...", "ar": "..." }, "year": "1446" } },
//!     "meta": { "timezone": "Asia/Riyadh" } } }
//! ```
//!
//! Any non-2xx status or transport failure is a [`ScheduleError::Network`];
//! a body missing any of the six times is a [`ScheduleError::Malformed`].
//! The Hijri descriptor and timezone are optional. Nothing is retried here.
//!
//! The day is named by its calendar date rather than by a unix instant. The
//! service reads an instant in the coordinate's own timezone, so any fixed
//! instant lands on the wrong day somewhere between UTC−12 and UTC+14.

use chrono::{NaiveDate, NaiveTime};
use chrono_tz::Tz;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use super::{CalculationMethod, HijriDate, Prayer, PrayerSchedule, parse_clock_time};
use crate::common::constants::USER_AGENT;
use crate::error::ScheduleError;
use crate::geo::Coordinate;

/// Everything a schedule source needs to answer one request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScheduleRequest {
    pub coordinate: Coordinate,
    pub method: CalculationMethod,
    pub date: NaiveDate,
}

impl ScheduleRequest {
    /// `date` as the service's path segment, `DD-MM-YYYY`.
    pub fn date_segment(&self) -> String {
        self.date.format("%d-%m-%Y").to_string()
    }
}

/// Anything able to produce a [`PrayerSchedule`] for a request.
pub trait ScheduleSource: Send + Sync + 'static {
    fn fetch(
        &self,
        request: ScheduleRequest,
    ) -> impl Future<Output = Result<PrayerSchedule, ScheduleError>> + Send;
}

/// HTTP client for the Aladhan-compatible prayer-times API.
#[derive(Debug, Clone)]
pub struct AladhanClient {
    client: Client,
    base_url: String,
}

impl AladhanClient {
    pub fn new(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(timeout)
            .timeout(timeout)
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build HTTP client: {e}"))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn timings_url(&self, request: &ScheduleRequest) -> String {
        format!("{}/timings/{}", self.base_url, request.date_segment())
    }
}

impl ScheduleSource for AladhanClient {
    async fn fetch(&self, request: ScheduleRequest) -> Result<PrayerSchedule, ScheduleError> {
        let url = self.timings_url(&request);
        log_debug!(
            "Requesting schedule for {} ({}) on {}",
            request.coordinate,
            request.method.id(),
            request.date
        );

        let response = self
            .client
            .get(&url)
            .query(&[
                ("latitude", request.coordinate.latitude.to_string()),
                ("longitude", request.coordinate.longitude.to_string()),
                ("method", request.method.id().to_string()),
            ])
            .send()
            .await
            .map_err(|e| ScheduleError::network(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ScheduleError::network(format!("HTTP {status}")));
        }

        let body = response
            .text()
            .await
            .map_err(|e| ScheduleError::network(format!("failed to read response body: {e}")))?;

        parse_timings_response(&body, request.date)
    }
}

#[derive(Debug, Deserialize)]
struct Envelope {
    data: Option<Payload>,
}

#[derive(Debug, Deserialize)]
struct Payload {
    timings: Option<HashMap<String, String>>,
    date: Option<DateInfo>,
    meta: Option<Meta>,
}

#[derive(Debug, Deserialize)]
struct DateInfo {
    hijri: Option<HijriPayload>,
}

#[derive(Debug, Deserialize)]
struct HijriPayload {
    day: String,
    month: HijriMonth,
    year: String,
}

#[derive(Debug, Deserialize)]
struct HijriMonth {
    number: u8,
    en: String,
    #[serde(default)]
    ar: String,
}

#[derive(Debug, Deserialize)]
struct Meta {
    timezone: Option<String>,
}

/// Parse a timings response body into a schedule for `date`.
pub fn parse_timings_response(body: &str, date: NaiveDate) -> Result<PrayerSchedule, ScheduleError> {
    let envelope: Envelope = serde_json::from_str(body)
        .map_err(|e| ScheduleError::malformed(format!("invalid JSON: {e}")))?;

    let payload = envelope
        .data
        .ok_or_else(|| ScheduleError::malformed("missing 'data'"))?;
    let timings = payload
        .timings
        .ok_or_else(|| ScheduleError::malformed("missing 'data.timings'"))?;

    let mut times = [NaiveTime::MIN; 6];
    for (slot, prayer) in times.iter_mut().zip(Prayer::ORDER) {
        let raw = timings
            .get(prayer.name())
            .ok_or_else(|| ScheduleError::malformed(format!("missing {prayer} time")))?;
        *slot = parse_clock_time(raw)
            .ok_or_else(|| ScheduleError::malformed(format!("unreadable {prayer} time '{raw}'")))?;
    }

    let hijri = payload.date.and_then(|d| d.hijri).map(|h| HijriDate {
        day: h.day,
        month_number: h.month.number,
        month_en: h.month.en,
        month_ar: h.month.ar,
        year: h.year,
    });

    let timezone = payload
        .meta
        .and_then(|m| m.timezone)
        .and_then(|name| match name.parse::<Tz>() {
            Ok(tz) => Some(tz),
            Err(_) => {
                log_debug!("Ignoring unknown timezone '{}' in schedule response", name);
                None
            }
        });

    let schedule = PrayerSchedule::new(date, times)
        .with_hijri(hijri)
        .with_timezone(timezone);

    if !schedule.is_monotonic() {
        log_warning!("Schedule for {} is not in chronological order", date);
    }

    Ok(schedule)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "code": 200,
        "status": "OK",
        "data": {
            "timings": {
                "Fajr": "05:21", "Sunrise": "06:38", "Dhuhr": "12:29",
                "Asr": "15:51", "Sunset": "18:20", "Maghrib": "18:20",
                "Isha": "19:50", "Imsak": "05:11", "Midnight": "00:29"
            },
            "date": {
                "readable": "01 Mar 2025",
                "hijri": {
                    "day": "1",
                    "month": { "number": 9, "en": "Ramaḍān", "ar": "رَمَضان" },
                    "year": "1446"
                }
            },
            "meta": { "latitude": 21.4225, "longitude": 39.8262, "timezone": "Asia/Riyadh" }
        }
    }"#;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 1).unwrap()
    }

    #[test]
    fn test_parse_full_response() {
        let schedule = parse_timings_response(SAMPLE, date()).unwrap();
        assert_eq!(schedule.date, date());
        assert_eq!(schedule.clock_of(Prayer::Fajr), "05:21");
        assert_eq!(schedule.clock_of(Prayer::Maghrib), "18:20");
        assert_eq!(schedule.timezone, Some(chrono_tz::Asia::Riyadh));
        let hijri = schedule.hijri.unwrap();
        assert_eq!(hijri.month_number, 9);
        assert_eq!(hijri.year, "1446");
    }

    #[test]
    fn test_missing_prayer_is_malformed() {
        let body = SAMPLE.replace(r#""Asr": "15:51","#, "");
        let err = parse_timings_response(&body, date()).unwrap_err();
        assert!(matches!(err, ScheduleError::Malformed(ref m) if m.contains("Asr")));
    }

    #[test]
    fn test_missing_timings_and_garbage_are_malformed() {
        let err = parse_timings_response(r#"{"code":200,"data":{}}"#, date()).unwrap_err();
        assert!(matches!(err, ScheduleError::Malformed(_)));

        let err = parse_timings_response("<html>Bad gateway</html>", date()).unwrap_err();
        assert!(matches!(err, ScheduleError::Malformed(_)));

        let err = parse_timings_response(r#"{"code":400,"data":"Invalid method"}"#, date()).unwrap_err();
        assert!(matches!(err, ScheduleError::Malformed(_)));
    }

    #[test]
    fn test_optional_fields_may_be_absent() {
        let body = r#"{"data":{"timings":{
            "Fajr":"05:00 (EET)","Sunrise":"06:20 (EET)","Dhuhr":"12:15 (EET)",
            "Asr":"15:45 (EET)","Maghrib":"18:10 (EET)","Isha":"19:30 (EET)"}}}"#;
        let schedule = parse_timings_response(body, date()).unwrap();
        assert_eq!(schedule.hijri, None);
        assert_eq!(schedule.timezone, None);
        assert_eq!(schedule.clock_of(Prayer::Isha), "19:30");
    }

    #[test]
    fn test_far_east_zone_requests_its_own_day() {
        // Nuku'alofa is UTC+13: noon UTC on 1 March is already 2 March there
        let tonga = Coordinate::new(-21.1394, -175.2018).unwrap();
        let client = AladhanClient::new("https://api.example.test/v1", Duration::from_secs(5)).unwrap();
        let request = ScheduleRequest {
            coordinate: tonga,
            method: CalculationMethod::MuslimWorldLeague,
            date: date(),
        };
        let url = client.timings_url(&request);
        assert!(url.ends_with("/timings/01-03-2025"), "{url}");
    }

    #[test]
    fn test_date_segment_is_day_month_year() {
        let request = ScheduleRequest {
            coordinate: crate::geo::KAABA,
            method: CalculationMethod::Isna,
            date: NaiveDate::from_ymd_opt(2025, 12, 31).unwrap(),
        };
        assert_eq!(request.date_segment(), "31-12-2025");
    }

    #[test]
    fn test_timings_url_strips_trailing_slash() {
        let client = AladhanClient::new("https://api.example.test/v1/", Duration::from_secs(5)).unwrap();
        let request = ScheduleRequest {
            coordinate: crate::geo::KAABA,
            method: CalculationMethod::Isna,
            date: date(),
        };
        assert_eq!(
            client.timings_url(&request),
            "https://api.example.test/v1/timings/01-03-2025"
        );
    }
}
