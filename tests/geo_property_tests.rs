use miqat::geo::bearing::normalize_degrees;
use miqat::geo::{Coordinate, KAABA, bearing_to, needle_delta, qibla_bearing};
use miqat::heading::{RawOrientation, normalize};
use proptest::prelude::*;

/// Generate valid latitude values
fn latitude_strategy() -> impl Strategy<Value = f64> {
    -90.0..=90.0
}

/// Generate valid longitude values
fn longitude_strategy() -> impl Strategy<Value = f64> {
    -180.0..=180.0
}

/// Smallest angle between two directions, in degrees.
fn angular_distance(a: f64, b: f64) -> f64 {
    let d = normalize_degrees(a - b);
    d.min(360.0 - d)
}

/// Property tests for the Qibla bearing
#[cfg(test)]
mod bearing_tests {
    use super::*;

    proptest! {
        /// Every valid coordinate yields a bearing in [0, 360)
        #[test]
        fn test_bearing_in_range(
            lat in latitude_strategy(),
            lon in longitude_strategy()
        ) {
            let origin = Coordinate::new(lat, lon).unwrap();
            let bearing = qibla_bearing(origin);

            prop_assert!(bearing.is_finite());
            prop_assert!((0.0..360.0).contains(&bearing),
                "bearing {bearing} out of range for ({lat}, {lon})");
        }

        /// The same input always produces the same output
        #[test]
        fn test_bearing_deterministic(
            lat in latitude_strategy(),
            lon in longitude_strategy()
        ) {
            let origin = Coordinate::new(lat, lon).unwrap();
            prop_assert_eq!(qibla_bearing(origin).to_bits(), qibla_bearing(origin).to_bits());
        }

        /// Points on the Kaaba's meridian face due south or due north
        #[test]
        fn test_meridian_bearings(
            north in 22.5..89.0f64,
            south in -89.0..20.0f64
        ) {
            let above = Coordinate::new(north, KAABA.longitude).unwrap();
            let below = Coordinate::new(south, KAABA.longitude).unwrap();

            prop_assert!(angular_distance(qibla_bearing(above), 180.0) < 1e-9);
            prop_assert!(angular_distance(qibla_bearing(below), 0.0) < 1e-9);
        }

        /// Swapping the endpoints of a short hop reverses the bearing
        #[test]
        fn test_short_hop_reverses(
            lat in -60.0..60.0f64,
            lon in -170.0..170.0f64,
            dlat in -0.01..0.01f64,
            dlon in -0.01..0.01f64
        ) {
            prop_assume!(dlat.abs() > 1e-4 || dlon.abs() > 1e-4);
            let a = Coordinate::new(lat, lon).unwrap();
            let b = Coordinate::new(lat + dlat, lon + dlon).unwrap();

            let forward = bearing_to(a, b);
            let back = bearing_to(b, a);
            prop_assert!(angular_distance(forward + 180.0, back) < 0.1,
                "forward {forward}, back {back}");
        }
    }
}

/// Property tests for the compass needle
#[cfg(test)]
mod needle_tests {
    use super::*;

    proptest! {
        /// Needle rotation always lies in (-180, 180]
        #[test]
        fn test_needle_delta_range(
            bearing in 0.0..360.0f64,
            heading in 0.0..360.0f64
        ) {
            let delta = needle_delta(bearing, heading);
            prop_assert!(delta > -180.0 && delta <= 180.0,
                "delta {delta} for bearing {bearing}, heading {heading}");
        }

        /// Turning by the needle delta lands on the bearing
        #[test]
        fn test_needle_delta_reaches_bearing(
            bearing in 0.0..360.0f64,
            heading in 0.0..360.0f64
        ) {
            let delta = needle_delta(bearing, heading);
            prop_assert!(angular_distance(heading + delta, bearing) < 1e-9);
        }

        /// Normalized headings always lie in [0, 360)
        #[test]
        fn test_normalized_heading_range(
            angle in -1080.0..1080.0f64,
            absolute in any::<bool>()
        ) {
            let raw = if absolute {
                RawOrientation::CompassHeading(angle)
            } else {
                RawOrientation::RotationAngle(angle)
            };
            let sample = normalize(raw).unwrap();
            prop_assert!((0.0..360.0).contains(&sample.degrees()));
        }

        /// A rotation angle reads as the mirrored compass heading
        #[test]
        fn test_rotation_angle_mirrors(angle in 0.0..360.0f64) {
            let sample = normalize(RawOrientation::RotationAngle(angle)).unwrap();
            prop_assert!(angular_distance(sample.degrees(), 360.0 - angle) < 1e-9);
        }
    }

    #[test]
    fn test_non_finite_readings_are_dropped() {
        assert!(normalize(RawOrientation::CompassHeading(f64::NAN)).is_none());
        assert!(normalize(RawOrientation::RotationAngle(f64::INFINITY)).is_none());
    }
}
