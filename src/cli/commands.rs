use std::sync::atomic::Ordering;

use crate::cli::args::{Cli, Commands};
use crate::config::EtlConfig;
use crate::error::Result;
use crate::processors::{RunCoordinator, RunOptions};
use crate::utils::progress::ProgressReporter;
use crate::writers::PartitionedWriter;

pub async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Run {
            config,
            raw_root,
            processed_root,
            cities,
            lookback_days,
            max_workers,
            compression,
            as_of,
            dry_run,
            quiet,
        } => {
            let mut cfg = EtlConfig::load(config.as_deref())?;
            if let Some(v) = raw_root {
                cfg.raw_root = v;
            }
            if let Some(v) = processed_root {
                cfg.processed_root = v;
            }
            if let Some(v) = cities {
                cfg.cities = v;
            }
            if let Some(v) = lookback_days {
                cfg.lookback_days = v;
            }
            if let Some(v) = max_workers {
                cfg.max_workers = v;
            }
            if let Some(v) = compression {
                cfg.compression = v;
            }

            let coordinator = RunCoordinator::new(cfg)?;

            // Ctrl-C requests a cooperative stop: in-flight partitions finish,
            // the rest are reported as cancelled.
            let cancel = coordinator.cancellation_flag();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    eprintln!("Cancellation requested; finishing in-flight partitions...");
                    cancel.store(true, Ordering::SeqCst);
                }
            });

            let progress = (!quiet && !dry_run)
                .then(|| ProgressReporter::new_spinner("Enumerating partitions...", false));

            let summary = coordinator.run(RunOptions { as_of, dry_run }, progress).await?;

            println!("{}", summary);
        }

        Commands::Info { file, sample } => {
            println!("Partition file: {}", file.display());

            let info = PartitionedWriter::file_info(&file)?;
            println!("\n{}", info.summary());

            if sample > 0 {
                let rows = PartitionedWriter::read_sample_rows(&file, sample)?;
                println!("\nSample rows (showing {}):", rows.len());
                for (i, row) in rows.iter().enumerate() {
                    println!(
                        "{}. {} at {}: {:.1}\u{00b0}C / {:.1}\u{00b0}F, humidity {}%",
                        i + 1,
                        row.city_name,
                        row.observation_time,
                        row.temperature_c,
                        row.temperature_f,
                        row.humidity
                    );
                }
            }
        }
    }

    Ok(())
}
