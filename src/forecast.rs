//! Hourly PM2.5 forecast from the Open-Meteo air-quality API.

use crate::aqi;
use crate::location::Coordinates;
use crate::upstream::{HttpClient, UpstreamError};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const PROVIDER: &str = "Open-Meteo";

/// Anything that can produce an hourly PM2.5 series for a point.
pub trait ForecastSource: Send + Sync {
    /// `(hour, concentration)` pairs in chronological order. Hours the provider
    /// has no value for are left out.
    fn hourly_pm25(
        &self,
        at: Coordinates,
        hours: u32,
    ) -> Result<Vec<(DateTime<Utc>, f64)>, UpstreamError>;
}

/// One forecast hour, ready to serialize.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastPoint {
    pub t: DateTime<Utc>,
    pub pm25: f64,
    pub aqi: u16,
}

impl ForecastPoint {
    pub fn new(t: DateTime<Utc>, pm25: f64) -> Self {
        Self {
            t,
            pm25,
            aqi: aqi::pm25_index(pm25),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastReport {
    pub query: String,
    pub resolved: String,
    pub points: Vec<ForecastPoint>,
}

#[derive(Deserialize, Debug)]
struct AirQualityResponse {
    #[serde(default)]
    hourly: Option<HourlyBlock>,
}

#[derive(Deserialize, Debug)]
struct HourlyBlock {
    #[serde(default)]
    time: Vec<String>,
    #[serde(default)]
    pm2_5: Vec<Option<f64>>,
}

pub struct OpenMeteoForecast {
    http: HttpClient,
}

impl OpenMeteoForecast {
    pub fn new(base_url: &str, user_agent: &str, timeout: Duration) -> Self {
        Self {
            http: HttpClient::new(PROVIDER, base_url, user_agent, timeout),
        }
    }
}

impl ForecastSource for OpenMeteoForecast {
    fn hourly_pm25(
        &self,
        at: Coordinates,
        hours: u32,
    ) -> Result<Vec<(DateTime<Utc>, f64)>, UpstreamError> {
        let response: AirQualityResponse = self.http.get_json(
            "/air-quality",
            &[
                ("latitude", format!("{:.4}", at.latitude)),
                ("longitude", format!("{:.4}", at.longitude)),
                ("hourly", "pm2_5".into()),
                ("timezone", "GMT".into()),
                ("forecast_hours", hours.to_string()),
            ],
        )?;
        Ok(response.hourly.map(series).unwrap_or_default())
    }
}

/// Zip the parallel `time`/`pm2_5` arrays, dropping nulls and unparseable hours.
fn series(block: HourlyBlock) -> Vec<(DateTime<Utc>, f64)> {
    block
        .time
        .iter()
        .zip(block.pm2_5)
        .filter_map(|(t, v)| {
            let value = v.filter(|v| v.is_finite() && *v >= 0.0)?;
            let hour = NaiveDateTime::parse_from_str(t, "%Y-%m-%dT%H:%M").ok()?;
            Some((hour.and_utc(), value))
        })
        .collect()
}
