use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// One normalized output row: the raw observation enriched with the derived
/// Fahrenheit temperature and the processing timestamp of the run that wrote
/// it. Written once per partition, append-only from the consumer's view.
///
/// The partition values (source_date, city_id, hour) live in the output path,
/// not here, matching the catalog's partition projection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedRecord {
    pub city_name: String,
    pub region: String,
    pub country: String,
    pub latitude: f64,
    pub longitude: f64,
    pub timezone: String,
    pub forecast_date: NaiveDate,
    pub timestamp_epoch: i64,
    pub observation_time: String,
    pub temperature_c: f64,
    /// `temperature_c * 9/5 + 32`, computed once at transform time and frozen.
    pub temperature_f: f64,
    pub humidity: i64,
    pub pressure_mb: f64,
    pub wind_speed_kph: f64,
    pub precipitation_mm: f64,
    pub cloud_cover: i64,
    pub visibility_km: f64,
    pub uv_index: f64,
    /// Wall-clock time of the ETL run that produced this row, not the
    /// observation time. Distinguishes reprocessed partitions.
    pub processing_time: DateTime<Utc>,
}
