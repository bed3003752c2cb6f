use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// One raw weather reading for one city at one point in time, exactly as the
/// ingestion layer stored it. Immutable once fetched.
///
/// Decoding is strict: every field is required, and an object missing any of
/// them is rejected as a malformed record by the reader. Extra fields from
/// upstream API changes are tolerated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct RawObservation {
    /// Display city name, e.g. "New York". Normalized into the partition
    /// city identifier by the key deriver.
    pub city: String,
    pub region: String,
    pub country: String,

    #[validate(range(min = -90.0, max = 90.0))]
    pub latitude: f64,

    #[validate(range(min = -180.0, max = 180.0))]
    pub longitude: f64,

    /// IANA timezone identifier of the observation location.
    pub timezone: String,

    pub forecast_date: NaiveDate,

    /// Observation instant as epoch seconds (UTC).
    pub timestamp_epoch: i64,

    /// Observation instant as source-local wall clock, `YYYY-MM-DD HH:MM`.
    /// Partition hour derivation reads this field, never the epoch.
    pub observation_time: String,

    // Physical limits, not climatology: readings outside these are sensor
    // garbage and must not reach the transformer.
    #[validate(range(min = -90.0, max = 60.0))]
    pub temperature_c: f64,

    #[validate(range(min = 0, max = 100))]
    pub humidity: i64,

    #[validate(range(min = 0.0))]
    pub pressure_mb: f64,

    #[validate(range(min = 0.0))]
    pub wind_speed_kph: f64,

    #[validate(range(min = 0.0))]
    pub precipitation_mm: f64,

    #[validate(range(min = 0, max = 100))]
    pub cloud_cover: i64,

    #[validate(range(min = 0.0))]
    pub visibility_km: f64,

    #[validate(range(min = 0.0))]
    pub uv_index: f64,
}
