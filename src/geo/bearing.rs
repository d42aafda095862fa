//! Great-circle bearing calculations.
//!
//! All arithmetic is `f64`. Poles need no special casing beyond what the
//! trigonometric functions already do.

use super::{Coordinate, KAABA};

/// Initial great-circle bearing from `origin` toward `target`.
///
/// Result is in degrees clockwise from north, in `[0, 360)`. Coincident points
/// have no defined bearing and yield `0.0`.
pub fn bearing_to(origin: Coordinate, target: Coordinate) -> f64 {
    let phi1 = origin.latitude.to_radians();
    let phi2 = target.latitude.to_radians();
    let delta_lambda = (target.longitude - origin.longitude).to_radians();

    let y = delta_lambda.sin();
    let x = phi1.cos() * phi2.tan() - phi1.sin() * delta_lambda.cos();

    // cos·tan and sin disagree in the last ulp, so x is only approximately zero
    if origin == target || (y == 0.0 && x.abs() < 1e-12) {
        return 0.0;
    }

    let theta = y.atan2(x).to_degrees();
    let bearing = (theta + 360.0) % 360.0;

    if bearing.is_finite() { normalize_degrees(bearing) } else { 0.0 }
}

/// Bearing toward the Kaaba.
pub fn qibla_bearing(origin: Coordinate) -> f64 {
    bearing_to(origin, KAABA)
}

/// Signed rotation from the device heading to the Qibla bearing.
///
/// Positive means turn clockwise. Result lies in `(-180, 180]`.
pub fn needle_delta(bearing: f64, heading: f64) -> f64 {
    let delta = normalize_degrees(bearing - heading);
    if delta > 180.0 { delta - 360.0 } else { delta }
}

/// Wrap any finite angle into `[0, 360)`.
pub fn normalize_degrees(degrees: f64) -> f64 {
    let wrapped = degrees.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360.0 for tiny negative inputs
    if wrapped >= 360.0 { 0.0 } else { wrapped }
}
