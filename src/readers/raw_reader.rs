use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use validator::Validate;

use crate::error::{EtlError, Result};
use crate::models::{DateRange, PartitionKey, RawObservation};
use crate::utils::constants::RAW_FILE_EXTENSION;

/// One candidate raw object: a partition key plus the file that backs it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawUnit {
    pub key: PartitionKey,
    pub path: PathBuf,
}

/// Decoded content of one raw unit. `malformed` counts elements that were
/// rejected: bad JSON, failed range validation, or a content-derived key that
/// disagrees with the path. Rejects are logged and skipped, never fatal.
#[derive(Debug)]
pub struct RawBatch {
    pub key: PartitionKey,
    pub records: Vec<RawObservation>,
    pub malformed: usize,
}

/// Reads the date-partitioned raw store: `dt=<date>/<city>_<HH>.json`,
/// each file one JSON array of observations.
///
/// The reader does not deduplicate retried observations; that is the
/// transformer's job.
pub struct RawRecordReader {
    raw_root: PathBuf,
}

impl RawRecordReader {
    pub fn new(raw_root: impl Into<PathBuf>) -> Self {
        Self {
            raw_root: raw_root.into(),
        }
    }

    /// Enumerate candidate units inside the window for the configured cities,
    /// newest date first (then city, then hour) so fresh data lands first in
    /// bounded runs.
    ///
    /// A listing failure anywhere in the raw store is fatal: without a
    /// complete enumeration the run cannot account for every partition.
    pub fn enumerate_candidates(
        &self,
        range: &DateRange,
        city_ids: &[String],
    ) -> Result<Vec<RawUnit>> {
        let entries = std::fs::read_dir(&self.raw_root).map_err(|e| {
            EtlError::SourceUnreachable {
                path: self.raw_root.clone(),
                source: e,
            }
        })?;

        let mut units = Vec::new();

        for entry in entries {
            let entry = entry.map_err(|e| EtlError::SourceUnreachable {
                path: self.raw_root.clone(),
                source: e,
            })?;
            let dir_name = entry.file_name();
            let Some(dir_name) = dir_name.to_str() else {
                continue;
            };

            let Some(date) = PartitionKey::parse_raw_date_dir(dir_name) else {
                if !dir_name.starts_with('.') {
                    warn!(directory = dir_name, "skipping unrecognized raw directory");
                }
                continue;
            };
            if !range.contains(date) {
                continue;
            }

            self.collect_date_units(&entry.path(), city_ids, &mut units)?;
        }

        units.sort_by(|a, b| {
            b.key
                .source_date
                .cmp(&a.key.source_date)
                .then_with(|| a.key.city_id.cmp(&b.key.city_id))
                .then_with(|| a.key.hour.cmp(&b.key.hour))
        });

        debug!(candidates = units.len(), "enumerated raw candidates");
        Ok(units)
    }

    fn collect_date_units(
        &self,
        date_dir: &Path,
        city_ids: &[String],
        units: &mut Vec<RawUnit>,
    ) -> Result<()> {
        let entries = std::fs::read_dir(date_dir).map_err(|e| EtlError::SourceUnreachable {
            path: date_dir.to_path_buf(),
            source: e,
        })?;

        for entry in entries {
            let entry = entry.map_err(|e| EtlError::SourceUnreachable {
                path: date_dir.to_path_buf(),
                source: e,
            })?;
            let path = entry.path();

            if path.extension().and_then(|e| e.to_str()) != Some(RAW_FILE_EXTENSION) {
                continue;
            }

            match PartitionKey::from_raw_path(&path) {
                Ok(key) => {
                    if city_ids.contains(&key.city_id) {
                        units.push(RawUnit { key, path });
                    }
                }
                Err(_) => {
                    warn!(file = %path.display(), "skipping raw file with invalid name");
                }
            }
        }

        Ok(())
    }

    /// Read and strictly decode one raw unit.
    ///
    /// Element-level problems are tolerated and counted; a file that cannot
    /// be read or is not a JSON array fails the whole unit, which the
    /// coordinator records as a FAILED partition without stopping the run.
    pub fn read_unit(&self, unit: &RawUnit) -> Result<RawBatch> {
        let content =
            std::fs::read_to_string(&unit.path).map_err(|e| EtlError::MalformedRecord {
                unit: unit.path.display().to_string(),
                message: format!("unreadable raw object: {}", e),
            })?;

        let values: Vec<serde_json::Value> =
            serde_json::from_str(&content).map_err(|e| EtlError::MalformedRecord {
                unit: unit.path.display().to_string(),
                message: format!("not a JSON array of observations: {}", e),
            })?;

        let mut records = Vec::with_capacity(values.len());
        let mut malformed = 0;

        for (index, value) in values.into_iter().enumerate() {
            match Self::decode_observation(value, &unit.key) {
                Ok(obs) => records.push(obs),
                Err(reason) => {
                    malformed += 1;
                    warn!(
                        unit = %unit.path.display(),
                        index,
                        %reason,
                        "skipping malformed record"
                    );
                }
            }
        }

        Ok(RawBatch {
            key: unit.key.clone(),
            records,
            malformed,
        })
    }

    fn decode_observation(
        value: serde_json::Value,
        expected_key: &PartitionKey,
    ) -> std::result::Result<RawObservation, String> {
        let obs: RawObservation =
            serde_json::from_value(value).map_err(|e| format!("decode failed: {}", e))?;

        obs.validate()
            .map_err(|e| format!("range validation failed: {}", e))?;

        let derived = PartitionKey::from_observation(&obs)
            .map_err(|e| format!("key derivation failed: {}", e))?;
        if &derived != expected_key {
            return Err(format!(
                "observation key {} disagrees with unit key {}",
                derived, expected_key
            ));
        }

        Ok(obs)
    }
}
