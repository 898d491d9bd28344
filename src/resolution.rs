//! City → PM2.5 AQI resolution.
//!
//! Geocode, find stations (radius escalation), pick the freshest reading
//! (lookback escalation), convert to AQI. Successful results are cached per
//! normalized city; misses and failures never are.

use crate::aqi::{self, Category};
use crate::cache::ResultCache;
use crate::config::{ConfigError, Settings};
use crate::forecast::{ForecastPoint, ForecastReport, ForecastSource, OpenMeteoForecast};
use crate::location::{Coordinates, GeoResult, Geocoder, NominatimGeocoder};
use crate::stations::{
    MeasurementSource, OpenAqSource, Reading, ReadingSelector, StationCandidate, StationLocator,
};
use crate::upstream::{probe, UpstreamError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Escalation tiers and fan-out limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchPolicy {
    /// Search radii in metres, tried in ascending order.
    pub radii_m: Vec<u32>,
    /// Recency windows in days, tried in ascending order.
    pub lookback_days: Vec<u32>,
    pub max_sensors_per_station: usize,
    pub max_stations: usize,
    pub forecast_hours: u32,
}

impl Default for SearchPolicy {
    fn default() -> Self {
        Self {
            radii_m: vec![25_000, 75_000, 150_000],
            lookback_days: vec![60, 120],
            max_sensors_per_station: 6,
            max_stations: 60,
            forecast_hours: 48,
        }
    }
}

/// Why a resolution produced nothing. These are ordinary results, not errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Miss {
    CityRequired,
    CityNotFound,
    NoReading,
    NoStationReading,
    NoForecast,
}

impl Miss {
    pub fn message(self) -> &'static str {
        match self {
            Self::CityRequired => "City is required.",
            Self::CityNotFound => "Unable to geocode the requested city.",
            Self::NoReading => "No PM2.5 data available for this city.",
            Self::NoStationReading => "No PM2.5 data available for this location.",
            Self::NoForecast => "Forecast not available for this city.",
        }
    }

    pub fn status(self) -> u16 {
        match self {
            Self::CityRequired => 400,
            _ => 404,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    Found(T),
    Missing(Miss),
}

/// Where the reading came from: coordinates when known, otherwise the station name.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum StationInfo {
    Coordinates(Coordinates),
    Name(String),
}

impl StationInfo {
    fn from_reading(reading: &Reading) -> Option<Self> {
        reading
            .coordinates
            .map(Self::Coordinates)
            .or_else(|| reading.station_name.clone().map(Self::Name))
    }
}

/// Result of a city resolution, as served by `/api/aqi`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AqiReport {
    pub query: String,
    pub resolved: String,
    pub pm25: f64,
    pub unit: String,
    #[serde(rename = "observedUtc")]
    pub observed_utc: DateTime<Utc>,
    pub aqi: u16,
    pub aqi_category: Category,
    pub health_advice: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub station: Option<StationInfo>,
    #[serde(rename = "stationId", skip_serializing_if = "Option::is_none")]
    pub station_id: Option<u64>,
    #[serde(rename = "sensorId", skip_serializing_if = "Option::is_none")]
    pub sensor_id: Option<u64>,
}

impl AqiReport {
    pub fn new(query: &str, place: &GeoResult, reading: &Reading) -> Self {
        let index = aqi::to_aqi(reading.value);
        Self {
            query: query.to_string(),
            resolved: place.display_name.clone(),
            pm25: reading.value,
            unit: reading.unit.clone(),
            observed_utc: reading.observed_at,
            aqi: index.aqi,
            aqi_category: index.category,
            health_advice: index.advisory(),
            station: StationInfo::from_reading(reading),
            station_id: reading.station_id,
            sensor_id: reading.sensor_id,
        }
    }
}

/// Latest reading for a single OpenAQ location, as served by `/api/location/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StationReport {
    #[serde(rename = "locationId")]
    pub location_id: u64,
    pub pm25: f64,
    pub unit: String,
    #[serde(rename = "observedUtc")]
    pub observed_utc: DateTime<Utc>,
    pub aqi: u16,
    pub aqi_category: Category,
    pub health_advice: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub station: Option<StationInfo>,
    #[serde(rename = "locationName", skip_serializing_if = "Option::is_none")]
    pub location_name: Option<String>,
    #[serde(rename = "sensorId", skip_serializing_if = "Option::is_none")]
    pub sensor_id: Option<u64>,
}

impl StationReport {
    pub fn new(location_id: u64, reading: &Reading) -> Self {
        let index = aqi::to_aqi(reading.value);
        Self {
            location_id,
            pm25: reading.value,
            unit: reading.unit.clone(),
            observed_utc: reading.observed_at,
            aqi: index.aqi,
            aqi_category: index.category,
            health_advice: index.advisory(),
            station: StationInfo::from_reading(reading),
            location_name: reading.station_name.clone(),
            sensor_id: reading.sensor_id,
        }
    }
}

struct ForecastBackend {
    source: Arc<dyn ForecastSource>,
    cache: ResultCache<ForecastReport>,
}

pub struct ResolutionService {
    geocoder: Arc<dyn Geocoder>,
    measurements: Arc<dyn MeasurementSource>,
    policy: SearchPolicy,
    reports: ResultCache<AqiReport>,
    forecasts: Option<ForecastBackend>,
}

impl ResolutionService {
    pub fn new(
        geocoder: Arc<dyn Geocoder>,
        measurements: Arc<dyn MeasurementSource>,
        policy: SearchPolicy,
        reports: ResultCache<AqiReport>,
    ) -> Self {
        Self {
            geocoder,
            measurements,
            policy,
            reports,
            forecasts: None,
        }
    }

    pub fn with_forecasts(
        mut self,
        source: Arc<dyn ForecastSource>,
        cache: ResultCache<ForecastReport>,
    ) -> Self {
        self.forecasts = Some(ForecastBackend { source, cache });
        self
    }

    /// Wire the production providers and caches from validated settings.
    pub fn from_settings(settings: &Settings) -> Result<Self, ConfigError> {
        let timeout = settings.request_timeout();
        let user_agent = settings.geocoding_user_agent.as_str();

        let geocoder = NominatimGeocoder::new(&settings.nominatim_base_url, user_agent, timeout);
        let measurements = OpenAqSource::new(
            &settings.openaq_base_url,
            settings.api_key()?,
            user_agent,
            timeout,
        );
        let forecasts = OpenMeteoForecast::new(&settings.forecast_base_url, user_agent, timeout);

        let cache = &settings.cache;
        Ok(Self::new(
            Arc::new(geocoder),
            Arc::new(measurements),
            settings.search.clone(),
            ResultCache::new(Duration::from_secs(cache.aqi_ttl_secs), cache.max_entries),
        )
        .with_forecasts(
            Arc::new(forecasts),
            ResultCache::new(Duration::from_secs(cache.forecast_ttl_secs), cache.max_entries),
        ))
    }

    pub fn policy(&self) -> &SearchPolicy {
        &self.policy
    }

    /// Resolve a city to its current PM2.5 AQI.
    ///
    /// Only credential and rate-limit failures surface as `Err`; everything
    /// else ends up as a [`Miss`].
    pub fn resolve(&self, city: &str) -> Result<Outcome<Arc<AqiReport>>, UpstreamError> {
        let query = city.trim();
        if query.is_empty() {
            return Ok(Outcome::Missing(Miss::CityRequired));
        }

        if let Some(hit) = self.reports.get(query) {
            tracing::debug!(query, "aqi cache hit");
            return Ok(Outcome::Found(hit));
        }

        let start = Instant::now();
        let Some(place) = self.geocode(query)? else {
            return Ok(Outcome::Missing(Miss::CityNotFound));
        };
        let Some(reading) = self.latest_near(place.coordinates)? else {
            tracing::info!(query, at = %place.coordinates, "no PM2.5 reading near city");
            return Ok(Outcome::Missing(Miss::NoReading));
        };

        let report = Arc::new(AqiReport::new(query, &place, &reading));
        self.reports.put(query, Arc::clone(&report));
        tracing::info!(
            query,
            resolved = %report.resolved,
            aqi = report.aqi,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "resolved"
        );
        Ok(Outcome::Found(report))
    }

    /// Latest PM2.5 for one station id, using the same lookback escalation. Not cached.
    pub fn station(&self, location_id: u64) -> Result<Outcome<StationReport>, UpstreamError> {
        if location_id == 0 {
            return Ok(Outcome::Missing(Miss::NoStationReading));
        }
        // Transient metadata failures fall back to a bare id.
        let metadata = probe(self.measurements.location(location_id))?.flatten();
        let candidate = [metadata
            .filter(|c| c.station_id == location_id)
            .unwrap_or_else(|| StationCandidate::new(location_id))];
        let selector =
            ReadingSelector::new(self.measurements.as_ref(), self.policy.max_sensors_per_station);

        for &days in &self.policy.lookback_days {
            if let Some(reading) = selector.select_latest(&candidate, days)? {
                return Ok(Outcome::Found(StationReport::new(location_id, &reading)));
            }
        }
        Ok(Outcome::Missing(Miss::NoStationReading))
    }

    /// Hourly PM2.5 forecast for a city, each hour converted to AQI.
    pub fn forecast(&self, city: &str) -> Result<Outcome<Arc<ForecastReport>>, UpstreamError> {
        let query = city.trim();
        if query.is_empty() {
            return Ok(Outcome::Missing(Miss::CityRequired));
        }
        let Some(backend) = &self.forecasts else {
            return Ok(Outcome::Missing(Miss::NoForecast));
        };

        if let Some(hit) = backend.cache.get(query) {
            tracing::debug!(query, "forecast cache hit");
            return Ok(Outcome::Found(hit));
        }

        let Some(place) = self.geocode(query)? else {
            return Ok(Outcome::Missing(Miss::CityNotFound));
        };
        let series = probe(
            backend
                .source
                .hourly_pm25(place.coordinates, self.policy.forecast_hours),
        )?
        .unwrap_or_default();
        if series.is_empty() {
            return Ok(Outcome::Missing(Miss::NoForecast));
        }

        let report = Arc::new(ForecastReport {
            query: query.to_string(),
            resolved: place.display_name,
            points: series
                .into_iter()
                .map(|(t, pm25)| ForecastPoint::new(t, pm25))
                .collect(),
        });
        backend.cache.put(query, Arc::clone(&report));
        Ok(Outcome::Found(report))
    }

    fn geocode(&self, query: &str) -> Result<Option<GeoResult>, UpstreamError> {
        let place = probe(self.geocoder.geocode(query))?.flatten();
        if place.is_none() {
            tracing::info!(query, "city not geocoded");
        }
        Ok(place)
    }

    /// Run the full locate-and-select sweep once per lookback window.
    fn latest_near(&self, center: Coordinates) -> Result<Option<Reading>, UpstreamError> {
        let source = self.measurements.as_ref();
        let locator = StationLocator::new(source, &self.policy.radii_m, self.policy.max_stations);
        let selector = ReadingSelector::new(source, self.policy.max_sensors_per_station);

        for &days in &self.policy.lookback_days {
            let candidates = locator.find_candidates(center)?;
            if candidates.is_empty() {
                continue;
            }
            if let Some(reading) = selector.select_latest(&candidates, days)? {
                return Ok(Some(reading));
            }
            tracing::debug!(lookback_days = days, "no reading in window, extending lookback");
        }
        Ok(None)
    }
}
