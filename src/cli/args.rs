use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "weather-etl")]
#[command(about = "Incremental partition-aware ETL for hourly city weather observations")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(short, long, global = true, help = "Enable verbose logging")]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Process unprocessed partitions inside the lookback window
    Run {
        #[arg(
            short,
            long,
            help = "Config file [default: weather-etl.{toml,yaml,json} if present]"
        )]
        config: Option<PathBuf>,

        #[arg(long, help = "Raw store root (overrides config)")]
        raw_root: Option<PathBuf>,

        #[arg(long, help = "Processed store root (overrides config)")]
        processed_root: Option<PathBuf>,

        #[arg(
            long,
            value_delimiter = ',',
            help = "Comma-separated city names (overrides config)"
        )]
        cities: Option<Vec<String>>,

        #[arg(long, help = "Lookback window length in days (overrides config)")]
        lookback_days: Option<u32>,

        #[arg(long, help = "Worker pool size (overrides config)")]
        max_workers: Option<usize>,

        #[arg(long, help = "Parquet compression codec (overrides config)")]
        compression: Option<String>,

        #[arg(long, help = "Window end date, YYYY-MM-DD [default: today UTC]")]
        as_of: Option<NaiveDate>,

        #[arg(long, default_value = "false", help = "Plan only; write nothing")]
        dry_run: bool,

        #[arg(long, default_value = "false", help = "Suppress progress output")]
        quiet: bool,
    },

    /// Display information about a written partition file
    Info {
        #[arg(short, long)]
        file: PathBuf,

        #[arg(short, long, default_value = "10")]
        sample: usize,
    },
}
