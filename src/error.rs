use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, EtlError>;

#[derive(Error, Debug)]
pub enum EtlError {
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Date parsing error: {0}")]
    DateParse(#[from] chrono::ParseError),

    #[error("Raw store unreachable at {path}: {source}")]
    SourceUnreachable {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Partition index unavailable at {path}: {source}")]
    IndexUnavailable {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Malformed record in {unit}: {message}")]
    MalformedRecord { unit: String, message: String },

    #[error("Invalid partition path: {0}")]
    InvalidPartitionPath(String),

    #[error("Partition write failed for {key}: {message}")]
    PartitionWrite { key: String, message: String },

    #[error("Partition {key} exceeded the {limit_secs}s deadline during {stage}")]
    PartitionTimeout {
        key: String,
        stage: &'static str,
        limit_secs: u64,
    },

    #[error("Parquet write error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Configuration load error: {0}")]
    ConfigLoad(#[from] config::ConfigError),

    #[error("Async task error: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),
}
