//! Runtime settings.
//!
//! Built-in defaults, then an optional TOML file, then environment / CLI
//! overrides (applied by the binary). Call [`Settings::validate`] last.

use crate::resolution::SearchPolicy;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const API_KEY_ENV: &str = "OPENAQ_API_KEY";
pub const USER_AGENT_ENV: &str = "GEOCODING_USER_AGENT";
/// Longest accepted lookback window (about ten years).
pub const MAX_LOOKBACK_DAYS: u32 = 3_650;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("OPENAQ_API_KEY environment variable is required.")]
    MissingApiKey,

    #[error("cannot read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub aqi_ttl_secs: u64,
    pub forecast_ttl_secs: u64,
    /// Per cache. Zero disables caching.
    pub max_entries: usize,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            aqi_ttl_secs: 300,
            forecast_ttl_secs: 600,
            max_entries: 500,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub openaq_api_key: Option<String>,
    pub openaq_base_url: String,
    pub nominatim_base_url: String,
    pub forecast_base_url: String,
    pub geocoding_user_agent: String,
    pub request_timeout_secs: u64,
    pub cache: CacheSettings,
    pub search: SearchPolicy,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            openaq_api_key: None,
            openaq_base_url: "https://api.openaq.org/v3".into(),
            nominatim_base_url: "https://nominatim.openstreetmap.org".into(),
            forecast_base_url: "https://air-quality-api.open-meteo.com/v1".into(),
            geocoding_user_agent: "AirSense/1.0 (contact@example.com)".into(),
            request_timeout_secs: 10,
            cache: CacheSettings::default(),
            search: SearchPolicy::default(),
        }
    }
}

impl Settings {
    /// `<config_dir>/airsense/config.toml`, if the platform has a config dir.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("airsense").join("config.toml"))
    }

    /// Load settings from `path`, or from [`default_path`](Self::default_path)
    /// when it exists. An explicit path that cannot be read is an error; a
    /// missing default file just means defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => match Self::default_path().filter(|p| p.is_file()) {
                Some(p) => p,
                None => return Ok(Self::default()),
            },
        };

        let text = fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        let settings = Self::from_toml_str(&text).map_err(|source| ConfigError::Parse {
            path: path.clone(),
            source,
        })?;
        tracing::debug!(path = %path.display(), "loaded config file");
        Ok(settings)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Overlay values from the environment or command line. `None` keeps the current value.
    pub fn with_overrides(mut self, api_key: Option<String>, user_agent: Option<String>) -> Self {
        if let Some(key) = api_key.filter(|k| !k.trim().is_empty()) {
            self.openaq_api_key = Some(key);
        }
        if let Some(ua) = user_agent.filter(|u| !u.trim().is_empty()) {
            self.geocoding_user_agent = ua;
        }
        self
    }

    /// Check required values and put escalation tiers in ascending order.
    pub fn validate(mut self) -> Result<Self, ConfigError> {
        self.api_key()?;

        let search = &mut self.search;
        search.radii_m.retain(|r| *r > 0);
        search.radii_m.sort_unstable();
        search.radii_m.dedup();
        search.lookback_days.retain(|d| *d > 0);
        search.lookback_days.sort_unstable();
        search.lookback_days.dedup();

        if search.radii_m.is_empty() {
            return Err(ConfigError::Invalid("search.radii_m must list at least one radius".into()));
        }
        if search.lookback_days.is_empty() {
            return Err(ConfigError::Invalid(
                "search.lookback_days must list at least one window".into(),
            ));
        }
        if let Some(days) = search.lookback_days.last().filter(|d| **d > MAX_LOOKBACK_DAYS) {
            return Err(ConfigError::Invalid(format!(
                "search.lookback_days entry {} exceeds {} days",
                days, MAX_LOOKBACK_DAYS
            )));
        }
        if search.max_sensors_per_station == 0 || search.max_stations == 0 {
            return Err(ConfigError::Invalid("search limits must be positive".into()));
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid("request_timeout_secs must be positive".into()));
        }
        Ok(self)
    }

    pub fn api_key(&self) -> Result<&str, ConfigError> {
        self.openaq_api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or(ConfigError::MissingApiKey)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
