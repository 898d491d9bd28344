//! Monitoring stations, their sensors, and PM2.5 readings.
//!
//! `StationLocator` finds stations near a point, `ReadingSelector` walks their
//! sensors for the freshest usable PM2.5 value. Both talk to a
//! [`MeasurementSource`], which is OpenAQ in production and a stub in tests.

pub mod locator;
pub mod openaq;
pub mod selector;

pub use locator::StationLocator;
pub use openaq::OpenAqSource;
pub use selector::ReadingSelector;

use crate::location::Coordinates;
use crate::upstream::UpstreamError;
use chrono::{DateTime, Utc};

/// OpenAQ parameter id for PM2.5.
pub const PM25_PARAMETER_ID: u32 = 2;
pub const DEFAULT_PM25_UNIT: &str = "ug/m3";

/// A station near the query point, in provider (distance) order.
#[derive(Debug, Clone, PartialEq)]
pub struct StationCandidate {
    pub station_id: u64,
    pub name: Option<String>,
    pub coordinates: Option<Coordinates>,
    /// Distance from the query point, when known.
    pub distance_m: Option<f64>,
}

impl StationCandidate {
    pub fn new(station_id: u64) -> Self {
        Self {
            station_id,
            name: None,
            coordinates: None,
            distance_m: None,
        }
    }
}

/// A single value reported by a sensor. Fields are optional because providers
/// send nulls, strings, or nothing at all for stale sensors.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Observation {
    pub value: Option<f64>,
    pub observed_at: Option<DateTime<Utc>>,
    pub unit: Option<String>,
    pub coordinates: Option<Coordinates>,
}

impl Observation {
    /// Value and timestamp, if both are usable and no older than `threshold`.
    pub fn qualifying(&self, threshold: DateTime<Utc>) -> Option<(f64, DateTime<Utc>)> {
        let value = self.value.filter(|v| v.is_finite() && *v >= 0.0)?;
        let at = self.observed_at.filter(|t| *t >= threshold)?;
        Some((value, at))
    }
}

/// A sensor attached to a station.
#[derive(Debug, Clone, PartialEq)]
pub struct Sensor {
    pub id: u64,
    pub name: Option<String>,
    pub parameter_id: Option<u32>,
    pub units: Option<String>,
    /// The provider's own "latest" snapshot.
    pub latest: Option<Observation>,
}

impl Sensor {
    pub fn measures_pm25(&self) -> bool {
        self.parameter_id == Some(PM25_PARAMETER_ID)
    }
}

/// An accepted PM2.5 reading with whatever provenance was collected along the way.
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    pub value: f64,
    pub unit: String,
    pub observed_at: DateTime<Utc>,
    pub station_id: Option<u64>,
    pub sensor_id: Option<u64>,
    pub station_name: Option<String>,
    pub sensor_name: Option<String>,
    pub coordinates: Option<Coordinates>,
}

/// Where station, sensor and measurement data comes from.
///
/// Errors follow the crate-wide convention: fatal variants abort the current
/// resolution, transient ones are treated as "nothing here".
pub trait MeasurementSource: Send + Sync {
    /// Stations measuring PM2.5 within `radius_m` of `center`, nearest first.
    fn nearby_stations(
        &self,
        center: Coordinates,
        radius_m: u32,
        limit: usize,
    ) -> Result<Vec<StationCandidate>, UpstreamError>;

    /// Metadata of one station by id. `Ok(None)` when the provider does not know it.
    fn location(&self, station_id: u64) -> Result<Option<StationCandidate>, UpstreamError>;

    /// PM2.5 sensors of one station, in provider order.
    fn station_sensors(&self, station_id: u64, limit: usize) -> Result<Vec<Sensor>, UpstreamError>;

    /// The most recent measurement of one sensor taken at or after `since`.
    fn latest_measurement(
        &self,
        sensor_id: u64,
        since: DateTime<Utc>,
    ) -> Result<Option<Observation>, UpstreamError>;
}
