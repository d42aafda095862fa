//! Application-wide constants and default values.
//!
//! Defaults are applied when the configuration file omits a field; the
//! MINIMUM/MAXIMUM pairs are the inclusive ranges enforced by validation.

use std::time::Duration;

// # Kaaba coordinate
// Fixed Qibla target and the fallback location whenever acquisition fails.
pub const KAABA_LATITUDE: f64 = 21.4225;
pub const KAABA_LONGITUDE: f64 = 39.8262;

// # Calculation method
/// ISNA, the service's method 2.
pub const DEFAULT_CALCULATION_METHOD: u8 = 2;

// # Prayer-times service
pub const DEFAULT_API_URL: &str = "https://api.aladhan.com/v1";
pub const USER_AGENT: &str = concat!("miqat/", env!("CARGO_PKG_VERSION"));

// # Timeouts (seconds)
pub const DEFAULT_REQUEST_TIMEOUT: u64 = 15;
pub const MINIMUM_REQUEST_TIMEOUT: u64 = 1;
pub const MAXIMUM_REQUEST_TIMEOUT: u64 = 120;

pub const DEFAULT_LOCATION_TIMEOUT: u64 = 10;
pub const MINIMUM_LOCATION_TIMEOUT: u64 = 1;
pub const MAXIMUM_LOCATION_TIMEOUT: u64 = 120;

// # Heading debounce (milliseconds, 0 disables)
pub const DEFAULT_HEADING_DEBOUNCE: u64 = 0;
pub const MAXIMUM_HEADING_DEBOUNCE: u64 = 1000;

// # Clock cadence
pub const COUNTDOWN_TICK: Duration = Duration::from_secs(60);
pub const MINUTES_PER_DAY: u32 = 24 * 60;

// # Schedule cache
/// Decimal places kept when keying schedules by coordinate (~11 m).
pub const COORDINATE_KEY_PRECISION: i32 = 4;

// # Preference keys
pub const PREF_CALCULATION_METHOD: &str = "calculationMethod";
pub const PREF_THEME: &str = "theme";
pub const PREF_LATITUDE: &str = "latitude";
pub const PREF_LONGITUDE: &str = "longitude";

// # Exit codes
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILURE: i32 = 1;
