/// Raw store layout
pub const RAW_DATE_PREFIX: &str = "dt=";
pub const RAW_FILE_EXTENSION: &str = "json";

/// Processed store layout (must match the catalog's partition projection)
pub const SOURCE_DATE_PREFIX: &str = "source_date=";
pub const CITY_ID_PREFIX: &str = "city_id=";
pub const HOUR_PREFIX: &str = "hour=";
pub const PARTITION_FILE_NAME: &str = "part-00000.parquet";
pub const PARQUET_FILE_EXTENSION: &str = "parquet";
pub const STAGING_DIR_PREFIX: &str = ".staging-";

/// Date formats
pub const DATE_FORMAT: &str = "%Y-%m-%d";
pub const OBSERVATION_TIME_FORMAT: &str = "%Y-%m-%d %H:%M";

/// Processing defaults
pub const DEFAULT_LOOKBACK_DAYS: u32 = 7;
pub const DEFAULT_PARTITION_TIMEOUT_SECS: u64 = 300;
pub const DEFAULT_ROW_GROUP_SIZE: usize = 10000;

/// Parquet compression options
pub const COMPRESSION_SNAPPY: &str = "snappy";
pub const COMPRESSION_GZIP: &str = "gzip";
pub const COMPRESSION_LZ4: &str = "lz4";
pub const COMPRESSION_ZSTD: &str = "zstd";
pub const COMPRESSION_NONE: &str = "none";
