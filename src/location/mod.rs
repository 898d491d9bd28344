//! Location subsystem: turning free-text city names into coordinates.

pub mod nominatim;
pub mod types;

pub use nominatim::NominatimGeocoder;
pub use types::{Coordinates, GeoResult};

use crate::upstream::UpstreamError;

/// Resolves a city name to a point.
///
/// `Ok(None)` means the provider has no match. Implementations may return
/// transient errors; the resolution service degrades those to a miss and only
/// lets fatal ones (credentials, rate limit) through.
pub trait Geocoder: Send + Sync {
    fn geocode(&self, city: &str) -> Result<Option<GeoResult>, UpstreamError>;
}
