use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{EtlError, Result};
use crate::models::{DateRange, PartitionKey};
use crate::utils::constants::PARQUET_FILE_EXTENSION;

/// The set of partitions that already have output, derived by listing the
/// processed store's directory tree. Nothing is persisted separately: the
/// store layout is the index.
///
/// A missing processed root is an empty index (first run). Any other listing
/// failure is fatal to the run: incremental skip is only correct when the
/// index can actually be consulted.
pub struct PartitionIndex {
    processed_root: PathBuf,
}

impl PartitionIndex {
    pub fn new(processed_root: impl Into<PathBuf>) -> Self {
        Self {
            processed_root: processed_root.into(),
        }
    }

    /// Whether `key` already has committed output: its final directory exists
    /// and holds at least one Parquet file. Staging directories never match
    /// because the final rename is the commit point.
    pub fn exists(&self, key: &PartitionKey) -> bool {
        Self::has_parquet_file(&key.processed_dir(&self.processed_root))
    }

    /// All committed partitions whose source date falls inside `range`.
    pub fn list(&self, range: &DateRange) -> Result<HashSet<PartitionKey>> {
        let mut keys = HashSet::new();

        let date_entries = match std::fs::read_dir(&self.processed_root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(keys),
            Err(e) => {
                return Err(EtlError::IndexUnavailable {
                    path: self.processed_root.clone(),
                    source: e,
                })
            }
        };

        for date_entry in date_entries {
            let date_entry = self.readable(date_entry, &self.processed_root)?;
            let Some(date) = date_entry
                .file_name()
                .to_str()
                .and_then(PartitionKey::parse_source_date_dir)
            else {
                continue;
            };
            if !range.contains(date) {
                continue;
            }

            for city_entry in self.read_dir(&date_entry.path())? {
                let city_entry = self.readable(city_entry, &date_entry.path())?;
                let Some(city_id) = city_entry
                    .file_name()
                    .to_str()
                    .and_then(PartitionKey::parse_city_dir)
                else {
                    continue;
                };

                for hour_entry in self.read_dir(&city_entry.path())? {
                    let hour_entry = self.readable(hour_entry, &city_entry.path())?;
                    let Some(hour) = hour_entry
                        .file_name()
                        .to_str()
                        .and_then(PartitionKey::parse_hour_dir)
                    else {
                        continue;
                    };

                    if Self::has_parquet_file(&hour_entry.path()) {
                        if let Ok(key) = PartitionKey::new(date, city_id.clone(), hour) {
                            keys.insert(key);
                        }
                    }
                }
            }
        }

        debug!(partitions = keys.len(), "listed processed partitions");
        Ok(keys)
    }

    fn read_dir(&self, path: &Path) -> Result<std::fs::ReadDir> {
        std::fs::read_dir(path).map_err(|e| EtlError::IndexUnavailable {
            path: path.to_path_buf(),
            source: e,
        })
    }

    fn readable(
        &self,
        entry: std::io::Result<std::fs::DirEntry>,
        parent: &Path,
    ) -> Result<std::fs::DirEntry> {
        entry.map_err(|e| EtlError::IndexUnavailable {
            path: parent.to_path_buf(),
            source: e,
        })
    }

    fn has_parquet_file(dir: &Path) -> bool {
        let Ok(entries) = std::fs::read_dir(dir) else {
            return false;
        };
        entries.flatten().any(|entry| {
            entry
                .path()
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| e == PARQUET_FILE_EXTENSION)
                .unwrap_or(false)
        })
    }
}
