use std::collections::BTreeMap;

use chrono::Utc;

use crate::models::{ProcessedRecord, RawObservation};

/// Maps raw observations into the normalized output schema.
///
/// `transform` is total over validated input: every field copy and unit
/// conversion is defined for the ranges the reader admits. Malformed input
/// never reaches this stage.
#[derive(Debug, Clone, Default)]
pub struct RecordTransformer;

impl RecordTransformer {
    pub fn new() -> Self {
        Self
    }

    /// Transform one observation. `processing_time` is the wall clock at
    /// invocation, so each run's output carries its own timestamp.
    pub fn transform(&self, obs: &RawObservation) -> ProcessedRecord {
        ProcessedRecord {
            city_name: obs.city.clone(),
            region: obs.region.clone(),
            country: obs.country.clone(),
            latitude: obs.latitude,
            longitude: obs.longitude,
            timezone: obs.timezone.clone(),
            forecast_date: obs.forecast_date,
            timestamp_epoch: obs.timestamp_epoch,
            observation_time: obs.observation_time.clone(),
            temperature_c: obs.temperature_c,
            temperature_f: celsius_to_fahrenheit(obs.temperature_c),
            humidity: obs.humidity,
            pressure_mb: obs.pressure_mb,
            wind_speed_kph: obs.wind_speed_kph,
            precipitation_mm: obs.precipitation_mm,
            cloud_cover: obs.cloud_cover,
            visibility_km: obs.visibility_km,
            uv_index: obs.uv_index,
            processing_time: Utc::now(),
        }
    }

    /// Transform a unit's worth of observations, collapsing ingestion retries
    /// first: observations sharing a `timestamp_epoch` are duplicates of the
    /// same reading, and the last occurrence wins. Output is ordered by epoch
    /// so a partition's row order is deterministic.
    pub fn transform_batch(&self, observations: &[RawObservation]) -> Vec<ProcessedRecord> {
        let mut latest: BTreeMap<i64, &RawObservation> = BTreeMap::new();
        for obs in observations {
            latest.insert(obs.timestamp_epoch, obs);
        }

        latest.values().map(|obs| self.transform(obs)).collect()
    }
}

fn celsius_to_fahrenheit(celsius: f64) -> f64 {
    celsius * 9.0 / 5.0 + 32.0
}
