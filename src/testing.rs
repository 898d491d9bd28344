//! Scripted stand-ins for the upstream providers, shared by unit tests.

use crate::forecast::ForecastSource;
use crate::location::{Coordinates, GeoResult, Geocoder};
use crate::stations::{MeasurementSource, Observation, Sensor, StationCandidate, PM25_PARAMETER_ID};
use crate::upstream::UpstreamError;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

pub fn geo(name: &str, lat: f64, lon: f64) -> GeoResult {
    GeoResult {
        coordinates: Coordinates::new(lat, lon),
        display_name: name.to_string(),
        country_code: None,
    }
}

pub fn station(id: u64, name: &str) -> StationCandidate {
    StationCandidate {
        name: Some(name.to_string()),
        ..StationCandidate::new(id)
    }
}

pub fn observation(value: f64, at: DateTime<Utc>) -> Observation {
    Observation {
        value: Some(value),
        observed_at: Some(at),
        unit: None,
        coordinates: None,
    }
}

pub fn pm25_sensor(id: u64, latest: Option<Observation>) -> Sensor {
    Sensor {
        id,
        name: Some(format!("pm25-{}", id)),
        parameter_id: Some(PM25_PARAMETER_ID),
        units: Some("µg/m³".into()),
        latest,
    }
}

/// Geocoder that replays a script; the last entry repeats once the script runs out.
pub struct StubGeocoder {
    script: Vec<Result<Option<GeoResult>, UpstreamError>>,
    calls: AtomicUsize,
}

impl StubGeocoder {
    pub fn sequence(script: Vec<Result<Option<GeoResult>, UpstreamError>>) -> Self {
        assert!(!script.is_empty());
        Self {
            script,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn always(result: Result<Option<GeoResult>, UpstreamError>) -> Self {
        Self::sequence(vec![result])
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Geocoder for StubGeocoder {
    fn geocode(&self, _city: &str) -> Result<Option<GeoResult>, UpstreamError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        self.script[n.min(self.script.len() - 1)].clone()
    }
}

/// Measurement source with per-radius, per-station and per-sensor scripted answers.
/// Anything not scripted comes back empty.
#[derive(Default)]
pub struct StubSource {
    stations: HashMap<u32, Result<Vec<StationCandidate>, UpstreamError>>,
    locations: HashMap<u64, Result<Option<StationCandidate>, UpstreamError>>,
    sensors: HashMap<u64, Result<Vec<Sensor>, UpstreamError>>,
    measurements: HashMap<u64, Result<Option<Observation>, UpstreamError>>,
    radii: Mutex<Vec<u32>>,
    location_queries: Mutex<Vec<u64>>,
    sensor_queries: Mutex<Vec<u64>>,
    measurement_queries: Mutex<Vec<u64>>,
}

impl StubSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stations_at(
        mut self,
        radius_m: u32,
        result: Result<Vec<StationCandidate>, UpstreamError>,
    ) -> Self {
        self.stations.insert(radius_m, result);
        self
    }

    pub fn location_of(
        mut self,
        station_id: u64,
        result: Result<Option<StationCandidate>, UpstreamError>,
    ) -> Self {
        self.locations.insert(station_id, result);
        self
    }

    pub fn sensors_of(mut self, station_id: u64, result: Result<Vec<Sensor>, UpstreamError>) -> Self {
        self.sensors.insert(station_id, result);
        self
    }

    pub fn measurement_of(
        mut self,
        sensor_id: u64,
        result: Result<Option<Observation>, UpstreamError>,
    ) -> Self {
        self.measurements.insert(sensor_id, result);
        self
    }

    pub fn radii_queried(&self) -> Vec<u32> {
        self.radii.lock().unwrap().clone()
    }

    pub fn location_queries(&self) -> Vec<u64> {
        self.location_queries.lock().unwrap().clone()
    }

    pub fn sensor_queries(&self) -> Vec<u64> {
        self.sensor_queries.lock().unwrap().clone()
    }

    pub fn measurement_queries(&self) -> Vec<u64> {
        self.measurement_queries.lock().unwrap().clone()
    }

    pub fn total_calls(&self) -> usize {
        self.radii_queried().len()
            + self.location_queries().len()
            + self.sensor_queries().len()
            + self.measurement_queries().len()
    }
}

impl MeasurementSource for StubSource {
    fn nearby_stations(
        &self,
        _center: Coordinates,
        radius_m: u32,
        limit: usize,
    ) -> Result<Vec<StationCandidate>, UpstreamError> {
        self.radii.lock().unwrap().push(radius_m);
        self.stations
            .get(&radius_m)
            .cloned()
            .unwrap_or_else(|| Ok(Vec::new()))
            .map(|mut v| {
                v.truncate(limit);
                v
            })
    }

    fn location(&self, station_id: u64) -> Result<Option<StationCandidate>, UpstreamError> {
        self.location_queries.lock().unwrap().push(station_id);
        self.locations
            .get(&station_id)
            .cloned()
            .unwrap_or(Ok(None))
    }

    // Ignores `limit` so that callers' own per-station caps get exercised.
    fn station_sensors(&self, station_id: u64, _limit: usize) -> Result<Vec<Sensor>, UpstreamError> {
        self.sensor_queries.lock().unwrap().push(station_id);
        self.sensors
            .get(&station_id)
            .cloned()
            .unwrap_or_else(|| Ok(Vec::new()))
    }

    fn latest_measurement(
        &self,
        sensor_id: u64,
        _since: DateTime<Utc>,
    ) -> Result<Option<Observation>, UpstreamError> {
        self.measurement_queries.lock().unwrap().push(sensor_id);
        self.measurements
            .get(&sensor_id)
            .cloned()
            .unwrap_or(Ok(None))
    }
}

/// Forecast source returning a fixed series.
pub struct StubForecast {
    result: Result<Vec<(DateTime<Utc>, f64)>, UpstreamError>,
    calls: AtomicUsize,
}

impl StubForecast {
    pub fn new(result: Result<Vec<(DateTime<Utc>, f64)>, UpstreamError>) -> Self {
        Self {
            result,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ForecastSource for StubForecast {
    fn hourly_pm25(
        &self,
        _at: Coordinates,
        _hours: u32,
    ) -> Result<Vec<(DateTime<Utc>, f64)>, UpstreamError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.result.clone()
    }
}
