use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{NaiveDate, Utc};
use rayon::prelude::*;
use tracing::{error, info, warn};

use crate::config::EtlConfig;
use crate::error::{EtlError, Result};
use crate::models::{DateRange, PartitionKey};
use crate::processors::RecordTransformer;
use crate::readers::{PartitionIndex, RawRecordReader, RawUnit};
use crate::utils::progress::ProgressReporter;
use crate::writers::{PartitionedWriter, WriteResult};

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Window end date; defaults to today (UTC).
    pub as_of: Option<NaiveDate>,
    /// Enumerate and consult the index, but write nothing.
    pub dry_run: bool,
}

#[derive(Debug, Clone)]
pub struct PartitionFailure {
    pub key: PartitionKey,
    pub reason: String,
}

/// Terminal report of one run. Every candidate partition lands in exactly one
/// of the four buckets; anything else is a defect.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub candidates: usize,
    pub processed: usize,
    pub skipped: usize,
    pub failed: usize,
    pub cancelled: usize,
    pub rows_written: u64,
    pub malformed_records: u64,
    pub failures: Vec<PartitionFailure>,
    pub dry_run: bool,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = if self.dry_run { "Plan" } else { "Run" };
        writeln!(f, "{} summary: {} candidate partition(s)", label, self.candidates)?;
        writeln!(f, "  processed: {}", self.processed)?;
        writeln!(f, "  skipped:   {}", self.skipped)?;
        writeln!(f, "  failed:    {}", self.failed)?;
        if self.cancelled > 0 {
            writeln!(f, "  cancelled: {}", self.cancelled)?;
        }
        if !self.dry_run {
            writeln!(f, "  rows written: {}", self.rows_written)?;
        }
        if self.malformed_records > 0 {
            writeln!(f, "  malformed records skipped: {}", self.malformed_records)?;
        }
        for failure in &self.failures {
            writeln!(f, "  FAILED {}: {}", failure.key, failure.reason)?;
        }
        Ok(())
    }
}

enum PartitionOutcome {
    Written { rows: usize, malformed: usize },
    Skipped,
    Failed { reason: String },
    Cancelled,
}

/// Drives one incremental run: enumerate candidates in the lookback window,
/// skip partitions the index already knows, transform and write the rest on a
/// bounded worker pool, and report everything that happened.
///
/// Partitions never share mutable state, so failure isolation is per
/// partition: only an unreachable source or index aborts the run.
#[derive(Clone)]
pub struct RunCoordinator {
    config: EtlConfig,
    reader: Arc<RawRecordReader>,
    index: Arc<PartitionIndex>,
    transformer: RecordTransformer,
    writer: Arc<PartitionedWriter>,
    cancel: Arc<AtomicBool>,
}

impl RunCoordinator {
    pub fn new(config: EtlConfig) -> Result<Self> {
        config.validate()?;

        let writer = PartitionedWriter::new(&config.processed_root)
            .with_compression(&config.compression)?
            .with_row_group_size(config.row_group_size);

        Ok(Self {
            reader: Arc::new(RawRecordReader::new(&config.raw_root)),
            index: Arc::new(PartitionIndex::new(&config.processed_root)),
            transformer: RecordTransformer::new(),
            writer: Arc::new(writer),
            cancel: Arc::new(AtomicBool::new(false)),
            config,
        })
    }

    /// Cooperative cancellation handle: once set, in-flight partitions finish
    /// and the remaining ones are reported as cancelled. Never interrupts a
    /// write mid-partition.
    pub fn cancellation_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    pub async fn run(
        &self,
        options: RunOptions,
        progress: Option<ProgressReporter>,
    ) -> Result<RunSummary> {
        let this = self.clone();
        tokio::task::spawn_blocking(move || this.execute(options, progress)).await?
    }

    /// Synchronous run body; `run` drives this off the async executor.
    pub fn execute(
        &self,
        options: RunOptions,
        progress: Option<ProgressReporter>,
    ) -> Result<RunSummary> {
        let end = options.as_of.unwrap_or_else(|| Utc::now().date_naive());
        let range = DateRange::lookback(end, self.config.lookback_days)?;
        let city_ids = self.config.city_ids();

        info!(
            window_start = %range.start,
            window_end = %range.end,
            cities = city_ids.len(),
            "enumerating candidate partitions"
        );

        let candidates = self.reader.enumerate_candidates(&range, &city_ids)?;
        let existing = self.index.list(&range)?;

        if options.dry_run {
            return Ok(self.plan_summary(&candidates, &existing));
        }

        if let Some(p) = &progress {
            p.set_message(&format!("Processing {} partition(s)...", candidates.len()));
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.max_workers)
            .build()
            .map_err(|e| EtlError::Config(e.to_string()))?;

        let completed = AtomicUsize::new(0);
        let outcomes: Vec<(PartitionKey, PartitionOutcome)> = pool.install(|| {
            candidates
                .par_iter()
                .map(|unit| {
                    let outcome = self.partition_outcome(unit, &existing);

                    let count = completed.fetch_add(1, Ordering::Relaxed) + 1;
                    if let Some(p) = &progress {
                        p.update(count as u64);
                    }

                    (unit.key.clone(), outcome)
                })
                .collect()
        });

        let summary = self.summarize(candidates.len(), outcomes);

        if let Some(p) = &progress {
            p.finish_with_message(&format!(
                "Processed {}, skipped {}, failed {}",
                summary.processed, summary.skipped, summary.failed
            ));
        }
        if summary.cancelled > 0 {
            warn!(cancelled = summary.cancelled, "run cancelled before completion");
        }

        debug_assert_eq!(
            summary.processed + summary.skipped + summary.failed + summary.cancelled,
            summary.candidates
        );

        Ok(summary)
    }

    fn partition_outcome(
        &self,
        unit: &RawUnit,
        existing: &std::collections::HashSet<PartitionKey>,
    ) -> PartitionOutcome {
        if self.cancel.load(Ordering::SeqCst) {
            return PartitionOutcome::Cancelled;
        }

        // Incremental skip happens before any raw bytes are read.
        if existing.contains(&unit.key) {
            return PartitionOutcome::Skipped;
        }

        match self.process_partition(unit) {
            Ok((result, malformed)) => PartitionOutcome::Written {
                rows: result.rows_written,
                malformed,
            },
            Err(e) => {
                error!(partition = %unit.key, error = %e, "partition failed");
                PartitionOutcome::Failed {
                    reason: e.to_string(),
                }
            }
        }
    }

    fn process_partition(&self, unit: &RawUnit) -> Result<(WriteResult, usize)> {
        let deadline = Deadline::start(self.config.partition_timeout(), &unit.key);

        let batch = self.reader.read_unit(unit)?;
        deadline.check("read")?;

        // Zero decodable records must not commit an empty partition: the
        // index would then hide a corrected re-upload from every later run.
        if batch.records.is_empty() {
            return Err(EtlError::MalformedRecord {
                unit: unit.path.display().to_string(),
                message: format!("no decodable records ({} malformed)", batch.malformed),
            });
        }

        let records = self.transformer.transform_batch(&batch.records);
        deadline.check("transform")?;

        let result = self.writer.write(&unit.key, &records)?;
        Ok((result, batch.malformed))
    }

    fn plan_summary(
        &self,
        candidates: &[RawUnit],
        existing: &std::collections::HashSet<PartitionKey>,
    ) -> RunSummary {
        let skipped = candidates
            .iter()
            .filter(|u| existing.contains(&u.key))
            .count();
        RunSummary {
            candidates: candidates.len(),
            processed: candidates.len() - skipped,
            skipped,
            dry_run: true,
            ..RunSummary::default()
        }
    }

    fn summarize(
        &self,
        candidates: usize,
        outcomes: Vec<(PartitionKey, PartitionOutcome)>,
    ) -> RunSummary {
        let mut summary = RunSummary {
            candidates,
            ..RunSummary::default()
        };

        for (key, outcome) in outcomes {
            match outcome {
                PartitionOutcome::Written { rows, malformed } => {
                    summary.processed += 1;
                    summary.rows_written += rows as u64;
                    summary.malformed_records += malformed as u64;
                }
                PartitionOutcome::Skipped => summary.skipped += 1,
                PartitionOutcome::Failed { reason } => {
                    summary.failed += 1;
                    summary.failures.push(PartitionFailure { key, reason });
                }
                PartitionOutcome::Cancelled => summary.cancelled += 1,
            }
        }

        summary
    }
}

struct Deadline {
    started: Instant,
    limit: Duration,
    key: String,
}

impl Deadline {
    fn start(limit: Duration, key: &PartitionKey) -> Self {
        Self {
            started: Instant::now(),
            limit,
            key: key.to_string(),
        }
    }

    fn check(&self, stage: &'static str) -> Result<()> {
        if self.started.elapsed() > self.limit {
            return Err(EtlError::PartitionTimeout {
                key: self.key.clone(),
                stage,
                limit_secs: self.limit.as_secs(),
            });
        }
        Ok(())
    }
}
