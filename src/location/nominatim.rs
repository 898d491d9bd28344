//! OpenStreetMap Nominatim geocoder.

use super::types::{Coordinates, GeoResult};
use super::Geocoder;
use crate::upstream::{HttpClient, UpstreamError};
use serde::Deserialize;
use std::time::Duration;

pub const PROVIDER: &str = "Nominatim";

#[derive(Deserialize, Debug, Clone)]
struct NominatimResult {
    lat: String,
    lon: String,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    address: Option<NominatimAddress>,
}

#[derive(Deserialize, Debug, Clone)]
struct NominatimAddress {
    #[serde(default)]
    country_code: Option<String>,
}

/// Nominatim `/search` client. Nominatim requires an identifying User-Agent.
pub struct NominatimGeocoder {
    http: HttpClient,
}

impl NominatimGeocoder {
    pub fn new(base_url: &str, user_agent: &str, timeout: Duration) -> Self {
        Self {
            http: HttpClient::new(PROVIDER, base_url, user_agent, timeout),
        }
    }
}

impl Geocoder for NominatimGeocoder {
    fn geocode(&self, city: &str) -> Result<Option<GeoResult>, UpstreamError> {
        let results: Vec<NominatimResult> = self.http.get_json(
            "/search",
            &[
                ("q", city.to_string()),
                ("format", "json".into()),
                ("limit", "1".into()),
                ("addressdetails", "1".into()),
            ],
        )?;

        match results.into_iter().next() {
            Some(top) => to_geo_result(city, top).map(Some),
            None => Ok(None),
        }
    }
}

fn to_geo_result(query: &str, r: NominatimResult) -> Result<GeoResult, UpstreamError> {
    let latitude: f64 = r
        .lat
        .trim()
        .parse()
        .map_err(|_| UpstreamError::transient(PROVIDER, format!("bad latitude '{}'", r.lat)))?;
    let longitude: f64 = r
        .lon
        .trim()
        .parse()
        .map_err(|_| UpstreamError::transient(PROVIDER, format!("bad longitude '{}'", r.lon)))?;

    let coordinates = Coordinates::new(latitude, longitude);
    if !coordinates.is_valid() {
        return Err(UpstreamError::transient(PROVIDER, "coordinates out of range"));
    }

    Ok(GeoResult {
        coordinates,
        display_name: r
            .display_name
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| query.to_string()),
        country_code: r
            .address
            .and_then(|a| a.country_code)
            .filter(|cc| !cc.is_empty())
            .map(|cc| cc.to_uppercase()),
    })
}
