use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{EtlError, Result};
use crate::models::PartitionKey;
use crate::utils::constants::{
    COMPRESSION_GZIP, COMPRESSION_LZ4, COMPRESSION_NONE, COMPRESSION_SNAPPY, COMPRESSION_ZSTD,
    DEFAULT_LOOKBACK_DAYS, DEFAULT_PARTITION_TIMEOUT_SECS, DEFAULT_ROW_GROUP_SIZE,
};

/// Everything the pipeline consumes from the outside, passed explicitly into
/// the run coordinator. No ambient state: a coordinator sees exactly the
/// configuration it was constructed with.
///
/// Layering, lowest precedence first: struct defaults, an optional config
/// file, `WEATHER_ETL_*` environment variables, CLI flags.
#[derive(Debug, Clone, Deserialize)]
pub struct EtlConfig {
    /// Root of the date-partitioned raw JSON store.
    #[serde(default)]
    pub raw_root: PathBuf,

    /// Root of the partitioned Parquet output store.
    #[serde(default)]
    pub processed_root: PathBuf,

    /// Display city names ("London", "New York"); normalized to city ids
    /// when filtering candidates.
    #[serde(default)]
    pub cities: Vec<String>,

    /// Inclusive lookback window length in days.
    #[serde(default = "default_lookback_days")]
    pub lookback_days: u32,

    /// Worker pool size for partition processing.
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,

    /// Per-partition processing deadline in seconds.
    #[serde(default = "default_partition_timeout_secs")]
    pub partition_timeout_secs: u64,

    /// Parquet compression codec: snappy, gzip, lz4, zstd or none.
    #[serde(default = "default_compression")]
    pub compression: String,

    /// Maximum Parquet row group size.
    #[serde(default = "default_row_group_size")]
    pub row_group_size: usize,
}

fn default_lookback_days() -> u32 {
    DEFAULT_LOOKBACK_DAYS
}

fn default_max_workers() -> usize {
    num_cpus::get()
}

fn default_partition_timeout_secs() -> u64 {
    DEFAULT_PARTITION_TIMEOUT_SECS
}

fn default_compression() -> String {
    COMPRESSION_SNAPPY.to_string()
}

fn default_row_group_size() -> usize {
    DEFAULT_ROW_GROUP_SIZE
}

impl Default for EtlConfig {
    fn default() -> Self {
        Self {
            raw_root: PathBuf::new(),
            processed_root: PathBuf::new(),
            cities: Vec::new(),
            lookback_days: default_lookback_days(),
            max_workers: default_max_workers(),
            partition_timeout_secs: default_partition_timeout_secs(),
            compression: default_compression(),
            row_group_size: default_row_group_size(),
        }
    }
}

impl EtlConfig {
    /// Load configuration from an optional file plus `WEATHER_ETL_*`
    /// environment variables (`WEATHER_ETL_CITIES` accepts a comma-separated
    /// list). CLI overrides are applied by the caller afterwards; validation
    /// runs once the full stack has been merged.
    pub fn load(config_file: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        builder = match config_file {
            Some(path) => builder.add_source(config::File::from(path.to_path_buf())),
            None => builder.add_source(config::File::with_name("weather-etl").required(false)),
        };

        builder = builder.add_source(
            config::Environment::with_prefix("WEATHER_ETL")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("cities"),
        );

        let cfg: EtlConfig = builder.build()?.try_deserialize()?;
        Ok(cfg)
    }

    /// Validate the merged configuration, reporting every problem at once.
    pub fn validate(&self) -> Result<()> {
        let mut errors = Vec::new();

        if self.raw_root.as_os_str().is_empty() {
            errors.push("raw_root is required".to_string());
        }
        if self.processed_root.as_os_str().is_empty() {
            errors.push("processed_root is required".to_string());
        }
        if self.cities.iter().all(|c| c.trim().is_empty()) {
            errors.push("cities must contain at least one city".to_string());
        }
        if self.lookback_days == 0 {
            errors.push("lookback_days must be at least 1".to_string());
        }
        if self.max_workers == 0 {
            errors.push("max_workers must be at least 1".to_string());
        }
        if self.row_group_size == 0 {
            errors.push("row_group_size must be at least 1".to_string());
        }
        if !matches!(
            self.compression.to_lowercase().as_str(),
            COMPRESSION_SNAPPY | COMPRESSION_GZIP | COMPRESSION_LZ4 | COMPRESSION_ZSTD
                | COMPRESSION_NONE
        ) {
            errors.push(format!("unsupported compression: {}", self.compression));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(EtlError::Config(format!(
                "configuration errors:\n- {}",
                errors.join("\n- ")
            )))
        }
    }

    /// Normalized city identifiers for candidate filtering.
    pub fn city_ids(&self) -> Vec<String> {
        self.cities
            .iter()
            .filter(|c| !c.trim().is_empty())
            .map(|c| PartitionKey::normalize_city(c))
            .collect()
    }

    pub fn partition_timeout(&self) -> Duration {
        Duration::from_secs(self.partition_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> EtlConfig {
        EtlConfig {
            raw_root: PathBuf::from("/data/raw"),
            processed_root: PathBuf::from("/data/processed"),
            cities: vec!["London".to_string(), "New York".to_string()],
            ..EtlConfig::default()
        }
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_validation_collects_all_errors() {
        let cfg = EtlConfig {
            lookback_days: 0,
            ..EtlConfig::default()
        };
        let err = cfg.validate().unwrap_err();
        let message = err.to_string();
        assert!(message.contains("raw_root is required"));
        assert!(message.contains("processed_root is required"));
        assert!(message.contains("at least one city"));
        assert!(message.contains("lookback_days"));
    }

    #[test]
    fn test_rejects_unknown_compression() {
        let cfg = EtlConfig {
            compression: "brotli".to_string(),
            ..valid_config()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_city_ids_are_normalized() {
        let cfg = valid_config();
        assert_eq!(cfg.city_ids(), vec!["london", "new_york"]);
    }

    #[test]
    fn test_defaults() {
        let cfg = EtlConfig::default();
        assert_eq!(cfg.lookback_days, DEFAULT_LOOKBACK_DAYS);
        assert_eq!(cfg.compression, COMPRESSION_SNAPPY);
        assert!(cfg.max_workers >= 1);
    }
}
