//! Station discovery with radius escalation.
//!
//! Tiers are tried smallest first and the first tier that yields any station
//! wins outright. Results from different tiers are never merged.

use super::{MeasurementSource, StationCandidate};
use crate::location::Coordinates;
use crate::upstream::{probe, UpstreamError};

pub struct StationLocator<'a> {
    source: &'a dyn MeasurementSource,
    radii_m: &'a [u32],
    max_stations: usize,
}

impl<'a> StationLocator<'a> {
    pub fn new(source: &'a dyn MeasurementSource, radii_m: &'a [u32], max_stations: usize) -> Self {
        Self {
            source,
            radii_m,
            max_stations,
        }
    }

    /// Candidates from the smallest radius tier that has any, nearest first.
    ///
    /// Empty when every tier came back empty (or failed transiently).
    pub fn find_candidates(&self, center: Coordinates) -> Result<Vec<StationCandidate>, UpstreamError> {
        for &radius_m in self.radii_m {
            let found = probe(self.source.nearby_stations(center, radius_m, self.max_stations))?
                .unwrap_or_default();
            let candidates: Vec<StationCandidate> =
                found.into_iter().filter(|c| c.station_id > 0).collect();

            if !candidates.is_empty() {
                tracing::debug!(radius_m, count = candidates.len(), "stations found");
                return Ok(candidates);
            }
            tracing::debug!(radius_m, "no stations in tier, widening search");
        }
        Ok(Vec::new())
    }
}
