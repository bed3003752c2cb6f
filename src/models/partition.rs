use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{Days, NaiveDate, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

use crate::error::{EtlError, Result};
use crate::models::RawObservation;
use crate::utils::constants::{
    CITY_ID_PREFIX, DATE_FORMAT, HOUR_PREFIX, OBSERVATION_TIME_FORMAT, RAW_DATE_PREFIX,
    RAW_FILE_EXTENSION, SOURCE_DATE_PREFIX,
};

/// Canonical address of one (date, city, hour) partition.
///
/// The same key locates raw input (`dt=<date>/<city>_<HH>.json`) and processed
/// output (`source_date=<date>/city_id=<city>/hour=<HH>/`). Formatting and
/// parsing are exact inverses; the catalog's partition projection relies on
/// the processed form verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PartitionKey {
    pub source_date: NaiveDate,
    pub city_id: String,
    pub hour: u8,
}

impl PartitionKey {
    pub fn new(source_date: NaiveDate, city_id: impl Into<String>, hour: u8) -> Result<Self> {
        let city_id = city_id.into();

        if hour > 23 {
            return Err(EtlError::InvalidPartitionPath(format!(
                "hour {} out of range 0-23",
                hour
            )));
        }
        if city_id.is_empty() || city_id != Self::normalize_city(&city_id) {
            return Err(EtlError::InvalidPartitionPath(format!(
                "city id '{}' is not a normalized identifier",
                city_id
            )));
        }

        Ok(Self {
            source_date,
            city_id,
            hour,
        })
    }

    /// Normalize a display city name into its identifier: trimmed, lowercase,
    /// spaces replaced with underscores. Deterministic and idempotent.
    pub fn normalize_city(name: &str) -> String {
        name.trim().to_lowercase().replace(' ', "_")
    }

    /// Raw object file name: `<city_id>_<HH>.json`
    pub fn raw_file_name(&self) -> String {
        format!(
            "{}_{:02}.{}",
            self.city_id, self.hour, RAW_FILE_EXTENSION
        )
    }

    /// Raw date directory name: `dt=<YYYY-MM-DD>`
    pub fn raw_date_dir_name(date: NaiveDate) -> String {
        format!("{}{}", RAW_DATE_PREFIX, date.format(DATE_FORMAT))
    }

    /// Full raw object path under the raw store root.
    pub fn raw_object_path(&self, raw_root: &Path) -> PathBuf {
        raw_root
            .join(Self::raw_date_dir_name(self.source_date))
            .join(self.raw_file_name())
    }

    /// Processed partition directory under the processed store root:
    /// `source_date=<YYYY-MM-DD>/city_id=<city>/hour=<HH>/`
    pub fn processed_dir(&self, processed_root: &Path) -> PathBuf {
        processed_root
            .join(format!(
                "{}{}",
                SOURCE_DATE_PREFIX,
                self.source_date.format(DATE_FORMAT)
            ))
            .join(format!("{}{}", CITY_ID_PREFIX, self.city_id))
            .join(format!("{}{:02}", HOUR_PREFIX, self.hour))
    }

    /// Derive the key from a raw object path (`.../dt=<date>/<city>_<HH>.json`).
    ///
    /// Exact inverse of `raw_object_path`.
    pub fn from_raw_path(path: &Path) -> Result<Self> {
        let date_dir = path
            .parent()
            .and_then(|p| p.file_name())
            .and_then(|n| n.to_str())
            .ok_or_else(|| EtlError::InvalidPartitionPath(path.display().to_string()))?;

        let date = Self::parse_raw_date_dir(date_dir)
            .ok_or_else(|| EtlError::InvalidPartitionPath(path.display().to_string()))?;

        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| EtlError::InvalidPartitionPath(path.display().to_string()))?;

        let stem = file_name
            .strip_suffix(&format!(".{}", RAW_FILE_EXTENSION))
            .ok_or_else(|| EtlError::InvalidPartitionPath(path.display().to_string()))?;

        let (city_id, hour_part) = stem
            .rsplit_once('_')
            .ok_or_else(|| EtlError::InvalidPartitionPath(path.display().to_string()))?;

        let hour = hour_part
            .parse::<u8>()
            .map_err(|_| EtlError::InvalidPartitionPath(path.display().to_string()))?;

        Self::new(date, city_id, hour)
    }

    /// Derive the key from a processed partition directory path.
    pub fn from_processed_path(path: &Path) -> Result<Self> {
        let mut components = path
            .components()
            .rev()
            .filter_map(|c| c.as_os_str().to_str());

        let invalid = || EtlError::InvalidPartitionPath(path.display().to_string());

        let hour = components
            .next()
            .and_then(Self::parse_hour_dir)
            .ok_or_else(invalid)?;
        let city_id = components
            .next()
            .and_then(Self::parse_city_dir)
            .ok_or_else(invalid)?;
        let date = components
            .next()
            .and_then(Self::parse_source_date_dir)
            .ok_or_else(invalid)?;

        Self::new(date, city_id, hour)
    }

    /// Derive the key from record content, using the observation's
    /// source-local wall clock (`observation_time`) for date and hour.
    ///
    /// The UTC epoch is never consulted here: raw objects are named by the
    /// source-local hour, so only the local clock makes path-derived and
    /// content-derived keys agree.
    pub fn from_observation(obs: &RawObservation) -> Result<Self> {
        let local = NaiveDateTime::parse_from_str(&obs.observation_time, OBSERVATION_TIME_FORMAT)?;
        Self::new(
            local.date(),
            Self::normalize_city(&obs.city),
            local.hour() as u8,
        )
    }

    pub fn parse_raw_date_dir(name: &str) -> Option<NaiveDate> {
        let date_part = name.strip_prefix(RAW_DATE_PREFIX)?;
        NaiveDate::parse_from_str(date_part, DATE_FORMAT).ok()
    }

    pub fn parse_source_date_dir(name: &str) -> Option<NaiveDate> {
        let date_part = name.strip_prefix(SOURCE_DATE_PREFIX)?;
        NaiveDate::parse_from_str(date_part, DATE_FORMAT).ok()
    }

    pub fn parse_city_dir(name: &str) -> Option<String> {
        let city = name.strip_prefix(CITY_ID_PREFIX)?;
        (!city.is_empty()).then(|| city.to_string())
    }

    pub fn parse_hour_dir(name: &str) -> Option<u8> {
        let hour = name.strip_prefix(HOUR_PREFIX)?.parse::<u8>().ok()?;
        (hour <= 23).then_some(hour)
    }
}

impl fmt::Display for PartitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{:02}",
            self.source_date.format(DATE_FORMAT),
            self.city_id,
            self.hour
        )
    }
}

/// Inclusive calendar date range, newest-last.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if start > end {
            return Err(EtlError::Config(format!(
                "date range start {} is after end {}",
                start, end
            )));
        }
        Ok(Self { start, end })
    }

    /// The window ending at `end` and spanning `days` calendar days inclusive.
    pub fn lookback(end: NaiveDate, days: u32) -> Result<Self> {
        if days == 0 {
            return Err(EtlError::Config(
                "lookback window must cover at least one day".to_string(),
            ));
        }
        let start = end
            .checked_sub_days(Days::new(u64::from(days - 1)))
            .ok_or_else(|| EtlError::Config(format!("lookback of {} days underflows", days)))?;
        Self::new(start, end)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }

    pub fn iter(&self) -> impl Iterator<Item = NaiveDate> {
        let mut current = Some(self.start);
        let end = self.end;
        std::iter::from_fn(move || {
            let date = current?;
            if date > end {
                return None;
            }
            current = date.succ_opt();
            Some(date)
        })
    }
}
