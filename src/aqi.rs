//! US EPA PM2.5 Air Quality Index.
//!
//! Concentrations (µg/m³) are truncated to 0.1 before interpolation, exactly as
//! the EPA reference calculator does. Anything at or above 500.5 saturates at 500.

use serde::{Serialize, Serializer};
use std::fmt;

/// One row of the PM2.5 breakpoint table: (C_low, C_high, I_low, I_high).
const PM25_BREAKPOINTS: [(f64, f64, f64, f64); 7] = [
    (0.0, 12.0, 0.0, 50.0),
    (12.1, 35.4, 51.0, 100.0),
    (35.5, 55.4, 101.0, 150.0),
    (55.5, 150.4, 151.0, 200.0),
    (150.5, 250.4, 201.0, 300.0),
    (250.5, 350.4, 301.0, 400.0),
    (350.5, 500.4, 401.0, 500.0),
];

const SATURATION: f64 = 500.5;
pub const MAX_AQI: u16 = 500;

/// Health category for an AQI value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Good,
    Moderate,
    UnhealthySensitive,
    Unhealthy,
    VeryUnhealthy,
    Hazardous,
}

impl Category {
    pub fn from_aqi(aqi: u16) -> Self {
        match aqi {
            0..=50 => Self::Good,
            51..=100 => Self::Moderate,
            101..=150 => Self::UnhealthySensitive,
            151..=200 => Self::Unhealthy,
            201..=300 => Self::VeryUnhealthy,
            _ => Self::Hazardous,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Good => "Good",
            Self::Moderate => "Moderate",
            Self::UnhealthySensitive => "Unhealthy for Sensitive Groups",
            Self::Unhealthy => "Unhealthy",
            Self::VeryUnhealthy => "Very Unhealthy",
            Self::Hazardous => "Hazardous",
        }
    }

    /// One-sentence public health advisory.
    pub fn advisory(self) -> &'static str {
        match self {
            Self::Good => "Good - air quality is satisfactory.",
            Self::Moderate => {
                "Moderate - unusually sensitive people should consider limiting prolonged exertion."
            }
            Self::UnhealthySensitive => {
                "USG - sensitive groups should reduce prolonged or heavy exertion."
            }
            Self::Unhealthy => "Unhealthy - everyone should consider limiting outdoor activities.",
            Self::VeryUnhealthy => "Very Unhealthy - avoid strenuous outdoor activities.",
            Self::Hazardous => "Hazardous - remain indoors and follow health guidance.",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl Serialize for Category {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

/// AQI value together with its category and advisory text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AqiResult {
    pub aqi: u16,
    pub category: Category,
}

impl AqiResult {
    pub fn advisory(&self) -> &'static str {
        self.category.advisory()
    }
}

/// Truncate (not round) to one decimal place.
fn truncate_tenths(concentration: f64) -> f64 {
    (concentration * 10.0).floor() / 10.0
}

/// Convert a PM2.5 concentration to its integer AQI.
pub fn pm25_index(concentration: f64) -> u16 {
    let c = truncate_tenths(concentration);
    if c >= SATURATION {
        return MAX_AQI;
    }

    for &(c_low, c_high, i_low, i_high) in PM25_BREAKPOINTS.iter() {
        if c <= c_high {
            let aqi = ((i_high - i_low) / (c_high - c_low)) * (c - c_low) + i_low;
            return aqi.round().clamp(0.0, MAX_AQI as f64) as u16;
        }
    }

    // Only reachable for 500.4 < c < 500.5, which truncation already excludes.
    MAX_AQI
}

/// Convert a PM2.5 concentration to AQI, category and advisory.
pub fn to_aqi(concentration: f64) -> AqiResult {
    let aqi = pm25_index(concentration);
    AqiResult {
        aqi,
        category: Category::from_aqi(aqi),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_boundaries() {
        assert_eq!(pm25_index(0.0), 0);
        assert_eq!(pm25_index(12.0), 50);
        assert_eq!(pm25_index(12.1), 51);
        assert_eq!(pm25_index(35.4), 100);
        assert_eq!(pm25_index(35.5), 101);
        assert_eq!(pm25_index(55.4), 150);
        assert_eq!(pm25_index(55.5), 151);
        assert_eq!(pm25_index(150.4), 200);
        assert_eq!(pm25_index(150.5), 201);
        assert_eq!(pm25_index(250.4), 300);
        assert_eq!(pm25_index(350.4), 400);
        assert_eq!(pm25_index(500.4), 500);
    }

    #[test]
    fn test_saturation() {
        assert_eq!(pm25_index(500.5), 500);
        assert_eq!(pm25_index(600.0), 500);
        assert_eq!(pm25_index(10_000.0), 500);
    }

    #[test]
    fn test_truncates_instead_of_rounding() {
        assert_eq!(pm25_index(12.04), pm25_index(12.0));
        assert_eq!(pm25_index(12.09), 50);
        assert_eq!(pm25_index(35.49), 100);
    }

    #[test]
    fn test_known_values() {
        // Cross-checked against the AirNow concentration calculator (pre-2024 table).
        assert_eq!(pm25_index(7.0), 29);
        assert_eq!(pm25_index(41.0), 115);
        assert_eq!(pm25_index(100.0), 174);
    }

    #[test]
    fn test_negative_clamps_to_zero() {
        assert_eq!(pm25_index(-3.0), 0);
    }

    #[test]
    fn test_monotonic_within_tiers() {
        for &(c_low, c_high, _, _) in PM25_BREAKPOINTS.iter() {
            let mut prev = pm25_index(c_low);
            let steps = ((c_high - c_low) * 10.0).round() as usize;
            for i in 0..=steps {
                let c = c_low + i as f64 / 10.0;
                let aqi = pm25_index(c);
                assert!(aqi >= prev, "AQI dropped at c={}: {} < {}", c, aqi, prev);
                prev = aqi;
            }
        }
    }

    #[test]
    fn test_category_table() {
        let cases = [
            (0, "Good", "Good - air quality is satisfactory."),
            (50, "Good", "Good - air quality is satisfactory."),
            (51, "Moderate", "Moderate - unusually sensitive people should consider limiting prolonged exertion."),
            (100, "Moderate", "Moderate - unusually sensitive people should consider limiting prolonged exertion."),
            (101, "Unhealthy for Sensitive Groups", "USG - sensitive groups should reduce prolonged or heavy exertion."),
            (150, "Unhealthy for Sensitive Groups", "USG - sensitive groups should reduce prolonged or heavy exertion."),
            (151, "Unhealthy", "Unhealthy - everyone should consider limiting outdoor activities."),
            (200, "Unhealthy", "Unhealthy - everyone should consider limiting outdoor activities."),
            (201, "Very Unhealthy", "Very Unhealthy - avoid strenuous outdoor activities."),
            (300, "Very Unhealthy", "Very Unhealthy - avoid strenuous outdoor activities."),
            (301, "Hazardous", "Hazardous - remain indoors and follow health guidance."),
            (500, "Hazardous", "Hazardous - remain indoors and follow health guidance."),
        ];
        for (aqi, label, advice) in cases {
            let cat = Category::from_aqi(aqi);
            assert_eq!(cat.label(), label, "label for {}", aqi);
            assert_eq!(cat.advisory(), advice, "advisory for {}", aqi);
        }
    }

    #[test]
    fn test_to_aqi_carries_category() {
        let r = to_aqi(40.0);
        assert_eq!(r.aqi, 112);
        assert_eq!(r.category, Category::UnhealthySensitive);
        assert_eq!(r.advisory(), Category::UnhealthySensitive.advisory());
    }

    #[test]
    fn test_category_serializes_as_label() {
        let json = serde_json::to_string(&Category::VeryUnhealthy).unwrap();
        assert_eq!(json, "\"Very Unhealthy\"");
    }
}
