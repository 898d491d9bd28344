//! Freshest-reading selection across candidate stations.

use super::{MeasurementSource, Observation, Reading, Sensor, StationCandidate, DEFAULT_PM25_UNIT};
use crate::upstream::{probe, UpstreamError};
use chrono::{DateTime, Duration, Utc};

pub struct ReadingSelector<'a> {
    source: &'a dyn MeasurementSource,
    max_sensors_per_station: usize,
}

impl<'a> ReadingSelector<'a> {
    pub fn new(source: &'a dyn MeasurementSource, max_sensors_per_station: usize) -> Self {
        Self {
            source,
            max_sensors_per_station,
        }
    }

    /// The freshest usable PM2.5 reading no older than `lookback_days`.
    pub fn select_latest(
        &self,
        candidates: &[StationCandidate],
        lookback_days: u32,
    ) -> Result<Option<Reading>, UpstreamError> {
        self.select_latest_at(candidates, lookback_days, Utc::now())
    }

    /// Same as [`select_latest`](Self::select_latest) with an explicit "now".
    ///
    /// Stations are visited in the given order and their sensors in provider
    /// order; on equal timestamps the first reading seen is kept. A fatal
    /// upstream error aborts the sweep and discards anything found so far.
    pub fn select_latest_at(
        &self,
        candidates: &[StationCandidate],
        lookback_days: u32,
        now: DateTime<Utc>,
    ) -> Result<Option<Reading>, UpstreamError> {
        // Windows reaching past the representable range mean "no lower bound".
        let threshold = now
            .checked_sub_signed(Duration::days(i64::from(lookback_days)))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        let mut best: Option<Reading> = None;

        for station in candidates {
            let Some(sensors) = probe(
                self.source
                    .station_sensors(station.station_id, self.max_sensors_per_station),
            )?
            else {
                continue;
            };

            for sensor in sensors
                .iter()
                .filter(|s| s.measures_pm25())
                .take(self.max_sensors_per_station)
            {
                if let Some(reading) = self.probe_sensor(station, sensor, threshold)? {
                    best = Some(fresher(best, reading));
                }
            }
        }

        if let Some(r) = &best {
            tracing::debug!(
                lookback_days,
                station_id = ?r.station_id,
                sensor_id = ?r.sensor_id,
                observed_at = %r.observed_at,
                "selected reading"
            );
        }
        Ok(best)
    }

    /// Snapshot first, explicit measurement query second, otherwise nothing.
    fn probe_sensor(
        &self,
        station: &StationCandidate,
        sensor: &Sensor,
        threshold: DateTime<Utc>,
    ) -> Result<Option<Reading>, UpstreamError> {
        if let Some(latest) = &sensor.latest {
            if let Some((value, at)) = latest.qualifying(threshold) {
                return Ok(Some(build_reading(station, sensor, latest, value, at)));
            }
        }

        if sensor.id == 0 {
            return Ok(None);
        }
        let measured = probe(self.source.latest_measurement(sensor.id, threshold))?.flatten();
        Ok(measured.and_then(|obs| {
            let (value, at) = obs.qualifying(threshold)?;
            Some(build_reading(station, sensor, &obs, value, at))
        }))
    }
}

/// Keep the incumbent unless the challenger is strictly newer.
fn fresher(best: Option<Reading>, challenger: Reading) -> Reading {
    match best {
        Some(current) if current.observed_at >= challenger.observed_at => current,
        _ => challenger,
    }
}

fn build_reading(
    station: &StationCandidate,
    sensor: &Sensor,
    obs: &Observation,
    value: f64,
    observed_at: DateTime<Utc>,
) -> Reading {
    Reading {
        value,
        unit: obs
            .unit
            .clone()
            .or_else(|| sensor.units.clone())
            .unwrap_or_else(|| DEFAULT_PM25_UNIT.to_string()),
        observed_at,
        station_id: Some(station.station_id),
        sensor_id: Some(sensor.id),
        station_name: station.name.clone(),
        sensor_name: sensor.name.clone(),
        coordinates: obs.coordinates.or(station.coordinates),
    }
}
