//! Core types for the location subsystem.

use serde::{Deserialize, Serialize};
use std::fmt;

const EARTH_RADIUS_M: f64 = 6_371_008.8;

/// A WGS84 point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }

    /// Great-circle (haversine) distance in metres.
    pub fn distance_m(&self, other: &Coordinates) -> f64 {
        let (lat1, lat2) = (self.latitude.to_radians(), other.latitude.to_radians());
        let dlat = lat2 - lat1;
        let dlon = (other.longitude - self.longitude).to_radians();
        let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
        2.0 * EARTH_RADIUS_M * a.sqrt().asin()
    }

    /// Bounding box `(min_lon, min_lat, max_lon, max_lat)` enclosing a circle of `radius_m`.
    pub fn bounding_box(&self, radius_m: f64) -> (f64, f64, f64, f64) {
        let angular = radius_m / EARTH_RADIUS_M;
        let dlat = angular.to_degrees();
        let ratio = angular.sin() / self.latitude.to_radians().cos();
        let dlon = if ratio.is_finite() && ratio < 1.0 {
            ratio.asin().to_degrees()
        } else {
            180.0
        };
        (
            (self.longitude - dlon).max(-180.0),
            (self.latitude - dlat).max(-90.0),
            (self.longitude + dlon).min(180.0),
            (self.latitude + dlat).min(90.0),
        )
    }
}

impl fmt::Display for Coordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ns = if self.latitude >= 0.0 { 'N' } else { 'S' };
        let ew = if self.longitude >= 0.0 { 'E' } else { 'W' };
        write!(
            f,
            "{:.4}\u{00B0}{}, {:.4}\u{00B0}{}",
            self.latitude.abs(),
            ns,
            self.longitude.abs(),
            ew
        )
    }
}

/// A geocoded city.
#[derive(Debug, Clone, PartialEq)]
pub struct GeoResult {
    pub coordinates: Coordinates,
    /// Full display name from the provider (e.g. "Paris, Île-de-France, France")
    pub display_name: String,
    /// ISO 3166-1 alpha-2 country code, upper-case
    pub country_code: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_distance_paris_london() {
        let paris = Coordinates::new(48.8566, 2.3522);
        let london = Coordinates::new(51.5074, -0.1278);
        assert_relative_eq!(paris.distance_m(&london), 343_500.0, max_relative = 0.01);
    }

    #[test]
    fn test_distance_zero() {
        let p = Coordinates::new(10.0, 20.0);
        assert_eq!(p.distance_m(&p), 0.0);
    }

    #[test]
    fn test_bounding_box_contains_circle() {
        let center = Coordinates::new(59.3293, 18.0686);
        let (min_lon, min_lat, max_lon, max_lat) = center.bounding_box(75_000.0);
        let north = Coordinates::new(max_lat, center.longitude);
        let east = Coordinates::new(center.latitude, max_lon);
        assert_relative_eq!(center.distance_m(&north), 75_000.0, max_relative = 0.001);
        assert!(center.distance_m(&east) >= 75_000.0 * 0.999);
        assert!(min_lon < center.longitude && min_lat < center.latitude);
    }

    #[test]
    fn test_validity() {
        assert!(Coordinates::new(0.0, 0.0).is_valid());
        assert!(!Coordinates::new(91.0, 0.0).is_valid());
        assert!(!Coordinates::new(f64::NAN, 0.0).is_valid());
    }

    #[test]
    fn test_display() {
        let c = Coordinates::new(-33.8688, 151.2093);
        assert_eq!(c.to_string(), "33.8688\u{00B0}S, 151.2093\u{00B0}E");
    }
}
