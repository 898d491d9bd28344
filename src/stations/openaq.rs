//! OpenAQ v3 measurement source.
//!
//! Endpoints used:
//! - `/locations`: stations near a point (radius query) or inside a bounding box
//! - `/locations/{id}/sensors`: sensors of a station, each with a `latest` snapshot
//! - `/sensors/{id}/measurements`: explicit history query for one sensor
//!
//! A single radius query is capped at 25 km by the API. Wider search tiers are
//! served from a bounding-box query, filtered back down to the tier's circle.

use super::{MeasurementSource, Observation, Sensor, StationCandidate, PM25_PARAMETER_ID};
use crate::location::Coordinates;
use crate::upstream::{HttpClient, UpstreamError};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Deserialize;
use std::time::Duration;

pub const PROVIDER: &str = "OpenAQ";

/// Largest radius a single `/locations?coordinates=` query accepts.
pub const MAX_QUERY_RADIUS_M: u32 = 25_000;
/// Page size used for bounding-box queries before distance filtering.
const BBOX_PAGE_LIMIT: usize = 1_000;
/// Bounding-box results are unordered, so every page is read up to this many.
const BBOX_MAX_PAGES: u32 = 10;

#[derive(Deserialize, Debug)]
struct Page<T> {
    #[serde(default = "Vec::new")]
    results: Vec<T>,
}

#[derive(Deserialize, Debug, Clone, Copy)]
struct CoordinatesDto {
    latitude: Option<f64>,
    longitude: Option<f64>,
}

impl CoordinatesDto {
    fn into_coordinates(self) -> Option<Coordinates> {
        let c = Coordinates::new(self.latitude?, self.longitude?);
        c.is_valid().then_some(c)
    }
}

#[derive(Deserialize, Debug)]
struct LocationDto {
    id: u64,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    coordinates: Option<CoordinatesDto>,
    #[serde(default)]
    distance: Option<f64>,
}

#[derive(Deserialize, Debug)]
struct DatetimeDto {
    #[serde(default)]
    utc: Option<String>,
}

#[derive(Deserialize, Debug)]
struct ParameterDto {
    #[serde(default)]
    id: Option<u32>,
    #[serde(default)]
    units: Option<String>,
}

#[derive(Deserialize, Debug)]
struct LatestDto {
    #[serde(default)]
    datetime: Option<DatetimeDto>,
    #[serde(default)]
    value: serde_json::Value,
    #[serde(default)]
    coordinates: Option<CoordinatesDto>,
}

#[derive(Deserialize, Debug)]
struct SensorDto {
    id: u64,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    parameter: Option<ParameterDto>,
    #[serde(default)]
    latest: Option<LatestDto>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct PeriodDto {
    #[serde(default)]
    datetime_from: Option<DatetimeDto>,
    #[serde(default)]
    datetime_to: Option<DatetimeDto>,
}

#[derive(Deserialize, Debug)]
struct MeasurementDto {
    #[serde(default)]
    value: serde_json::Value,
    #[serde(default)]
    parameter: Option<ParameterDto>,
    #[serde(default)]
    period: Option<PeriodDto>,
    #[serde(default)]
    datetime: Option<DatetimeDto>,
    #[serde(default)]
    coordinates: Option<CoordinatesDto>,
}

fn parse_utc(dt: Option<&DatetimeDto>) -> Option<DateTime<Utc>> {
    let s = dt?.utc.as_deref()?.trim();
    if s.is_empty() {
        return None;
    }
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|d| d.with_timezone(&Utc))
}

impl From<LocationDto> for StationCandidate {
    fn from(dto: LocationDto) -> Self {
        StationCandidate {
            station_id: dto.id,
            name: dto.name.filter(|n| !n.trim().is_empty()),
            coordinates: dto.coordinates.and_then(CoordinatesDto::into_coordinates),
            distance_m: dto.distance,
        }
    }
}

impl From<SensorDto> for Sensor {
    fn from(dto: SensorDto) -> Self {
        let (parameter_id, units) = match dto.parameter {
            Some(p) => (p.id, p.units),
            None => (None, None),
        };
        let latest = dto.latest.map(|l| Observation {
            value: l.value.as_f64(),
            observed_at: parse_utc(l.datetime.as_ref()),
            unit: units.clone(),
            coordinates: l.coordinates.and_then(CoordinatesDto::into_coordinates),
        });
        Sensor {
            id: dto.id,
            name: dto.name,
            parameter_id,
            units,
            latest,
        }
    }
}

impl From<MeasurementDto> for Observation {
    fn from(dto: MeasurementDto) -> Self {
        // Averaged measurements carry a period; the end of it is when the value was current.
        let observed_at = dto
            .period
            .as_ref()
            .and_then(|p| {
                parse_utc(p.datetime_to.as_ref()).or_else(|| parse_utc(p.datetime_from.as_ref()))
            })
            .or_else(|| parse_utc(dto.datetime.as_ref()));
        Observation {
            value: dto.value.as_f64(),
            observed_at,
            unit: dto.parameter.and_then(|p| p.units),
            coordinates: dto.coordinates.and_then(CoordinatesDto::into_coordinates),
        }
    }
}

/// OpenAQ v3 client. Every request carries the `X-API-Key` header.
pub struct OpenAqSource {
    http: HttpClient,
}

impl OpenAqSource {
    pub fn new(base_url: &str, api_key: &str, user_agent: &str, timeout: Duration) -> Self {
        Self {
            http: HttpClient::new(PROVIDER, base_url, user_agent, timeout)
                .with_header("X-API-Key", api_key.trim()),
        }
    }

    fn radius_query(
        &self,
        center: Coordinates,
        radius_m: u32,
        limit: usize,
    ) -> Result<Vec<StationCandidate>, UpstreamError> {
        let page: Page<LocationDto> = self.http.get_json(
            "/locations",
            &[
                (
                    "coordinates",
                    format!("{:.6},{:.6}", center.latitude, center.longitude),
                ),
                ("radius", radius_m.min(MAX_QUERY_RADIUS_M).to_string()),
                ("limit", limit.to_string()),
                ("parameter_id", PM25_PARAMETER_ID.to_string()),
                ("order_by", "distance".into()),
                ("sort", "asc".into()),
            ],
        )?;
        Ok(page.results.into_iter().map(StationCandidate::from).collect())
    }

    fn bbox_query(
        &self,
        center: Coordinates,
        radius_m: u32,
        limit: usize,
    ) -> Result<Vec<StationCandidate>, UpstreamError> {
        let (min_lon, min_lat, max_lon, max_lat) = center.bounding_box(radius_m as f64);
        let bbox = format!("{:.6},{:.6},{:.6},{:.6}", min_lon, min_lat, max_lon, max_lat);

        let found = collect_pages(BBOX_PAGE_LIMIT, BBOX_MAX_PAGES, |n| {
            let page: Page<LocationDto> = self.http.get_json(
                "/locations",
                &[
                    ("bbox", bbox.clone()),
                    ("limit", BBOX_PAGE_LIMIT.to_string()),
                    ("page", n.to_string()),
                    ("parameter_id", PM25_PARAMETER_ID.to_string()),
                ],
            )?;
            Ok(page.results)
        })?;
        Ok(within_radius(
            found.into_iter().map(StationCandidate::from),
            center,
            radius_m,
            limit,
        ))
    }
}

/// Read numbered pages until one comes back short or `max_pages` have been read.
///
/// A transient failure after the first page keeps what was already collected.
fn collect_pages<T>(
    page_size: usize,
    max_pages: u32,
    mut fetch: impl FnMut(u32) -> Result<Vec<T>, UpstreamError>,
) -> Result<Vec<T>, UpstreamError> {
    let mut all = Vec::new();
    for page in 1..=max_pages {
        let batch = match fetch(page) {
            Ok(batch) => batch,
            Err(e) if page > 1 && !e.is_fatal() => {
                tracing::debug!(page, error = %e, "stopping bounding-box paging early");
                return Ok(all);
            }
            Err(e) => return Err(e),
        };
        let last = batch.len() < page_size;
        all.extend(batch);
        if last {
            return Ok(all);
        }
    }
    tracing::debug!(max_pages, "bounding-box results cut at page limit");
    Ok(all)
}

/// Keep candidates inside the circle, nearest first, at most `limit` of them.
fn within_radius(
    candidates: impl Iterator<Item = StationCandidate>,
    center: Coordinates,
    radius_m: u32,
    limit: usize,
) -> Vec<StationCandidate> {
    let mut kept: Vec<StationCandidate> = candidates
        .filter_map(|mut c| {
            let d = center.distance_m(&c.coordinates?);
            if d > radius_m as f64 {
                return None;
            }
            c.distance_m = Some(d);
            Some(c)
        })
        .collect();
    kept.sort_by(|a, b| {
        a.distance_m
            .partial_cmp(&b.distance_m)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    kept.truncate(limit);
    kept
}

impl MeasurementSource for OpenAqSource {
    fn nearby_stations(
        &self,
        center: Coordinates,
        radius_m: u32,
        limit: usize,
    ) -> Result<Vec<StationCandidate>, UpstreamError> {
        if radius_m <= MAX_QUERY_RADIUS_M {
            self.radius_query(center, radius_m, limit)
        } else {
            self.bbox_query(center, radius_m, limit)
        }
    }

    fn location(&self, station_id: u64) -> Result<Option<StationCandidate>, UpstreamError> {
        let page: Page<LocationDto> = self
            .http
            .get_json(&format!("/locations/{}", station_id), &[])?;
        Ok(page
            .results
            .into_iter()
            .map(StationCandidate::from)
            .find(|c| c.station_id == station_id))
    }

    fn station_sensors(&self, station_id: u64, limit: usize) -> Result<Vec<Sensor>, UpstreamError> {
        let page: Page<SensorDto> = self.http.get_json(
            &format!("/locations/{}/sensors", station_id),
            &[
                ("parameter_id", PM25_PARAMETER_ID.to_string()),
                ("limit", limit.to_string()),
            ],
        )?;
        Ok(page.results.into_iter().map(Sensor::from).collect())
    }

    fn latest_measurement(
        &self,
        sensor_id: u64,
        since: DateTime<Utc>,
    ) -> Result<Option<Observation>, UpstreamError> {
        let page: Page<MeasurementDto> = self.http.get_json(
            &format!("/sensors/{}/measurements", sensor_id),
            &[
                ("limit", "1".into()),
                ("order_by", "datetime".into()),
                ("sort", "desc".into()),
                ("date_from", since.to_rfc3339_opts(SecondsFormat::Secs, true)),
            ],
        )?;
        Ok(page.results.into_iter().next().map(Observation::from))
    }
}
