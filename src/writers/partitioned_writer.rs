use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::array::{
    Date32Array, Float64Array, Int64Array, StringArray, TimestampMicrosecondArray,
};
use arrow::datatypes::{DataType, Field, Schema, TimeUnit};
use arrow::record_batch::RecordBatch;
use chrono::NaiveDate;
use parquet::arrow::ArrowWriter;
use parquet::basic::{Compression, GzipLevel};
use parquet::file::properties::WriterProperties;
use tracing::{debug, info};

use crate::error::{EtlError, Result};
use crate::models::{PartitionKey, ProcessedRecord};
use crate::utils::constants::{
    DEFAULT_ROW_GROUP_SIZE, PARTITION_FILE_NAME, STAGING_DIR_PREFIX,
};

/// Outcome of committing one partition.
#[derive(Debug, Clone)]
pub struct WriteResult {
    pub key: PartitionKey,
    pub rows_written: usize,
    pub bytes_written: u64,
    pub path: PathBuf,
}

/// Writes one self-contained compressed Parquet file group per partition
/// under `source_date=<date>/city_id=<city>/hour=<HH>/`.
///
/// Commit protocol: the file is produced inside a dot-prefixed staging
/// directory in the processed root, then the staging directory is renamed to
/// the final partition path. Consumers see either the complete partition or
/// nothing. Reprocessing removes the prior directory before the rename, so
/// content is replaced in full, never appended to.
pub struct PartitionedWriter {
    processed_root: PathBuf,
    compression: Compression,
    row_group_size: usize,
}

impl PartitionedWriter {
    pub fn new(processed_root: impl Into<PathBuf>) -> Self {
        Self {
            processed_root: processed_root.into(),
            compression: Compression::SNAPPY,
            row_group_size: DEFAULT_ROW_GROUP_SIZE,
        }
    }

    pub fn with_compression(mut self, compression: &str) -> Result<Self> {
        self.compression = match compression.to_lowercase().as_str() {
            "snappy" => Compression::SNAPPY,
            "gzip" => Compression::GZIP(GzipLevel::default()),
            "lz4" => Compression::LZ4,
            "zstd" => Compression::ZSTD(parquet::basic::ZstdLevel::default()),
            "none" => Compression::UNCOMPRESSED,
            _ => {
                return Err(EtlError::Config(format!(
                    "Unsupported compression: {}",
                    compression
                )))
            }
        };
        Ok(self)
    }

    pub fn with_row_group_size(mut self, size: usize) -> Self {
        self.row_group_size = size;
        self
    }

    /// Commit `records` as the full content of `key`'s partition.
    pub fn write(&self, key: &PartitionKey, records: &[ProcessedRecord]) -> Result<WriteResult> {
        if records.is_empty() {
            return Err(EtlError::PartitionWrite {
                key: key.to_string(),
                message: "refusing to commit an empty partition".to_string(),
            });
        }

        std::fs::create_dir_all(&self.processed_root)?;

        // Staged under a dot-prefixed name so the partition index never sees
        // an uncommitted file group; dropped (and removed) on any failure
        // before the rename below.
        let staging = tempfile::Builder::new()
            .prefix(STAGING_DIR_PREFIX)
            .tempdir_in(&self.processed_root)?;

        let staged_file = staging.path().join(PARTITION_FILE_NAME);
        self.write_parquet(&staged_file, records)?;
        let bytes_written = std::fs::metadata(&staged_file)?.len();

        let final_dir = key.processed_dir(&self.processed_root);
        if final_dir.exists() {
            info!(partition = %key, "replacing existing partition output");
            std::fs::remove_dir_all(&final_dir)?;
        }
        if let Some(parent) = final_dir.parent() {
            std::fs::create_dir_all(parent)?;
        }

        // Commit point.
        std::fs::rename(staging.path(), &final_dir)?;

        debug!(
            partition = %key,
            rows = records.len(),
            bytes = bytes_written,
            "committed partition"
        );

        Ok(WriteResult {
            key: key.clone(),
            rows_written: records.len(),
            bytes_written,
            path: final_dir,
        })
    }

    fn write_parquet(&self, path: &Path, records: &[ProcessedRecord]) -> Result<()> {
        let schema = Self::schema();
        let file = File::create(path)?;
        let props = WriterProperties::builder()
            .set_compression(self.compression)
            .set_max_row_group_size(self.row_group_size)
            .build();

        let mut writer = ArrowWriter::try_new(file, schema.clone(), Some(props))?;
        for chunk in records.chunks(self.row_group_size) {
            let batch = Self::records_to_batch(chunk, schema.clone())?;
            writer.write(&batch)?;
        }
        writer.close()?;

        Ok(())
    }

    /// The 19-column output schema. Partition values (source_date, city_id,
    /// hour) are carried by the directory path, exactly as the catalog's
    /// partition projection expects.
    pub fn schema() -> Arc<Schema> {
        let fields = vec![
            Field::new("city_name", DataType::Utf8, false),
            Field::new("region", DataType::Utf8, false),
            Field::new("country", DataType::Utf8, false),
            Field::new("latitude", DataType::Float64, false),
            Field::new("longitude", DataType::Float64, false),
            Field::new("timezone", DataType::Utf8, false),
            Field::new("forecast_date", DataType::Date32, false),
            Field::new("timestamp_epoch", DataType::Int64, false),
            Field::new("observation_time", DataType::Utf8, false),
            Field::new("temperature_c", DataType::Float64, false),
            Field::new("temperature_f", DataType::Float64, false),
            Field::new("humidity", DataType::Int64, false),
            Field::new("pressure_mb", DataType::Float64, false),
            Field::new("wind_speed_kph", DataType::Float64, false),
            Field::new("precipitation_mm", DataType::Float64, false),
            Field::new("cloud_cover", DataType::Int64, false),
            Field::new("visibility_km", DataType::Float64, false),
            Field::new("uv_index", DataType::Float64, false),
            Field::new(
                "processing_time",
                DataType::Timestamp(TimeUnit::Microsecond, Some("UTC".into())),
                false,
            ),
        ];

        Arc::new(Schema::new(fields))
    }

    fn records_to_batch(records: &[ProcessedRecord], schema: Arc<Schema>) -> Result<RecordBatch> {
        let city_names: Vec<String> = records.iter().map(|r| r.city_name.clone()).collect();
        let regions: Vec<String> = records.iter().map(|r| r.region.clone()).collect();
        let countries: Vec<String> = records.iter().map(|r| r.country.clone()).collect();
        let latitudes: Vec<f64> = records.iter().map(|r| r.latitude).collect();
        let longitudes: Vec<f64> = records.iter().map(|r| r.longitude).collect();
        let timezones: Vec<String> = records.iter().map(|r| r.timezone.clone()).collect();
        let forecast_dates: Vec<i32> = records
            .iter()
            .map(|r| days_since_epoch(r.forecast_date))
            .collect();
        let epochs: Vec<i64> = records.iter().map(|r| r.timestamp_epoch).collect();
        let observation_times: Vec<String> =
            records.iter().map(|r| r.observation_time.clone()).collect();
        let temps_c: Vec<f64> = records.iter().map(|r| r.temperature_c).collect();
        let temps_f: Vec<f64> = records.iter().map(|r| r.temperature_f).collect();
        let humidities: Vec<i64> = records.iter().map(|r| r.humidity).collect();
        let pressures: Vec<f64> = records.iter().map(|r| r.pressure_mb).collect();
        let wind_speeds: Vec<f64> = records.iter().map(|r| r.wind_speed_kph).collect();
        let precipitations: Vec<f64> = records.iter().map(|r| r.precipitation_mm).collect();
        let cloud_covers: Vec<i64> = records.iter().map(|r| r.cloud_cover).collect();
        let visibilities: Vec<f64> = records.iter().map(|r| r.visibility_km).collect();
        let uv_indexes: Vec<f64> = records.iter().map(|r| r.uv_index).collect();
        let processing_times: Vec<i64> = records
            .iter()
            .map(|r| r.processing_time.timestamp_micros())
            .collect();

        let batch = RecordBatch::try_new(
            schema,
            vec![
                Arc::new(StringArray::from(city_names)),
                Arc::new(StringArray::from(regions)),
                Arc::new(StringArray::from(countries)),
                Arc::new(Float64Array::from(latitudes)),
                Arc::new(Float64Array::from(longitudes)),
                Arc::new(StringArray::from(timezones)),
                Arc::new(Date32Array::from(forecast_dates)),
                Arc::new(Int64Array::from(epochs)),
                Arc::new(StringArray::from(observation_times)),
                Arc::new(Float64Array::from(temps_c)),
                Arc::new(Float64Array::from(temps_f)),
                Arc::new(Int64Array::from(humidities)),
                Arc::new(Float64Array::from(pressures)),
                Arc::new(Float64Array::from(wind_speeds)),
                Arc::new(Float64Array::from(precipitations)),
                Arc::new(Int64Array::from(cloud_covers)),
                Arc::new(Float64Array::from(visibilities)),
                Arc::new(Float64Array::from(uv_indexes)),
                Arc::new(TimestampMicrosecondArray::from(processing_times).with_timezone("UTC")),
            ],
        )?;

        Ok(batch)
    }

    /// File-level statistics for a written partition file. Compression is
    /// read back from the file's own metadata.
    pub fn file_info(path: &Path) -> Result<ParquetFileInfo> {
        use parquet::file::reader::{FileReader, SerializedFileReader};

        let file = File::open(path)?;
        let reader = SerializedFileReader::new(file)?;
        let metadata = reader.metadata();

        let total_rows = metadata.file_metadata().num_rows();
        let row_groups = metadata.num_row_groups();
        let row_group_sizes = (0..row_groups)
            .map(|i| metadata.row_group(i).num_rows())
            .collect();
        let compression = (row_groups > 0)
            .then(|| metadata.row_group(0).column(0).compression())
            .unwrap_or(Compression::UNCOMPRESSED);
        let file_size = std::fs::metadata(path)?.len();

        Ok(ParquetFileInfo {
            total_rows,
            row_groups: row_groups as i32,
            row_group_sizes,
            file_size,
            compression,
        })
    }

    /// Read up to `limit` rows back for display and verification.
    pub fn read_sample_rows(path: &Path, limit: usize) -> Result<Vec<SampleRow>> {
        use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

        let file = File::open(path)?;
        let reader = ParquetRecordBatchReaderBuilder::try_new(file)?
            .with_batch_size(limit.clamp(1, 8192))
            .build()?;

        let mut rows = Vec::new();

        for batch_result in reader {
            let batch = batch_result?;

            let city_names = downcast::<StringArray>(&batch, 0)?;
            let observation_times = downcast::<StringArray>(&batch, 8)?;
            let temps_c = downcast::<Float64Array>(&batch, 9)?;
            let temps_f = downcast::<Float64Array>(&batch, 10)?;
            let humidities = downcast::<Int64Array>(&batch, 11)?;

            for i in 0..batch.num_rows() {
                rows.push(SampleRow {
                    city_name: city_names.value(i).to_string(),
                    observation_time: observation_times.value(i).to_string(),
                    temperature_c: temps_c.value(i),
                    temperature_f: temps_f.value(i),
                    humidity: humidities.value(i),
                });
                if rows.len() >= limit {
                    return Ok(rows);
                }
            }
        }

        Ok(rows)
    }
}

fn downcast<'a, T: 'static>(batch: &'a RecordBatch, column: usize) -> Result<&'a T> {
    batch
        .column(column)
        .as_any()
        .downcast_ref::<T>()
        .ok_or_else(|| EtlError::Config(format!("unexpected type for column {}", column)))
}

fn days_since_epoch(date: NaiveDate) -> i32 {
    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).expect("valid epoch date");
    (date - epoch).num_days() as i32
}

/// A few display-oriented fields from a written row.
#[derive(Debug, Clone)]
pub struct SampleRow {
    pub city_name: String,
    pub observation_time: String,
    pub temperature_c: f64,
    pub temperature_f: f64,
    pub humidity: i64,
}

#[derive(Debug, Clone)]
pub struct ParquetFileInfo {
    pub total_rows: i64,
    pub row_groups: i32,
    pub row_group_sizes: Vec<i64>,
    pub file_size: u64,
    pub compression: Compression,
}

impl ParquetFileInfo {
    pub fn summary(&self) -> String {
        format!(
            "Rows: {}\nRow groups: {} {:?}\nFile size: {} bytes\nCompression: {:?}",
            self.total_rows, self.row_groups, self.row_group_sizes, self.file_size,
            self.compression
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tempfile::TempDir;

    fn key(hour: u8) -> PartitionKey {
        PartitionKey::new(
            NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            "london",
            hour,
        )
        .unwrap()
    }

    fn record(temperature_c: f64, timestamp_epoch: i64) -> ProcessedRecord {
        ProcessedRecord {
            city_name: "London".to_string(),
            region: "Greater London".to_string(),
            country: "United Kingdom".to_string(),
            latitude: 51.52,
            longitude: -0.11,
            timezone: "Europe/London".to_string(),
            forecast_date: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            timestamp_epoch,
            observation_time: "2024-06-01 14:00".to_string(),
            temperature_c,
            temperature_f: temperature_c * 9.0 / 5.0 + 32.0,
            humidity: 60,
            pressure_mb: 1012.0,
            wind_speed_kph: 13.0,
            precipitation_mm: 0.1,
            cloud_cover: 75,
            visibility_km: 10.0,
            uv_index: 4.0,
            processing_time: Utc::now(),
        }
    }

    #[test]
    fn test_write_creates_partition_layout() {
        let root = TempDir::new().unwrap();
        let writer = PartitionedWriter::new(root.path());

        let result = writer.write(&key(14), &[record(18.5, 1), record(18.7, 2)]).unwrap();

        assert_eq!(result.rows_written, 2);
        assert_eq!(
            result.path,
            root.path()
                .join("source_date=2024-06-01")
                .join("city_id=london")
                .join("hour=14")
        );
        let file = result.path.join(PARTITION_FILE_NAME);
        assert!(file.exists());

        let info = PartitionedWriter::file_info(&file).unwrap();
        assert_eq!(info.total_rows, 2);
        assert_eq!(info.compression, Compression::SNAPPY);
    }

    #[test]
    fn test_written_rows_round_trip() {
        let root = TempDir::new().unwrap();
        let writer = PartitionedWriter::new(root.path());
        let result = writer.write(&key(14), &[record(18.5, 1)]).unwrap();

        let rows =
            PartitionedWriter::read_sample_rows(&result.path.join(PARTITION_FILE_NAME), 10)
                .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].city_name, "London");
        assert!((rows[0].temperature_f - 65.3).abs() < 1e-9);
        assert_eq!(rows[0].humidity, 60);
    }

    #[test]
    fn test_overwrite_replaces_prior_content() {
        let root = TempDir::new().unwrap();
        let writer = PartitionedWriter::new(root.path());
        let k = key(14);

        writer.write(&k, &[record(18.5, 1), record(18.6, 2)]).unwrap();
        let result = writer.write(&k, &[record(19.0, 3)]).unwrap();

        let info = PartitionedWriter::file_info(&result.path.join(PARTITION_FILE_NAME)).unwrap();
        // Replaced, not appended: one row remains.
        assert_eq!(info.total_rows, 1);
    }

    #[test]
    fn test_no_staging_left_behind_after_commit() {
        let root = TempDir::new().unwrap();
        let writer = PartitionedWriter::new(root.path());
        writer.write(&key(14), &[record(18.5, 1)]).unwrap();

        let leftovers: Vec<_> = std::fs::read_dir(root.path())
            .unwrap()
            .flatten()
            .filter(|e| e.file_name().to_string_lossy().starts_with('.'))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_failed_write_leaves_no_partial_partition() {
        let root = TempDir::new().unwrap();
        let writer = PartitionedWriter::new(root.path());
        let k = key(14);

        // Block the final location's parent with a plain file so the commit
        // rename cannot succeed.
        let date_dir = root.path().join("source_date=2024-06-01");
        std::fs::write(&date_dir, b"not a directory").unwrap();

        assert!(writer.write(&k, &[record(18.5, 1)]).is_err());

        std::fs::remove_file(&date_dir).unwrap();
        // Nothing visible: no final dir, no staging leftovers.
        assert!(!k.processed_dir(root.path()).exists());
        let leftovers: Vec<_> = std::fs::read_dir(root.path()).unwrap().flatten().collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_rejects_empty_partition() {
        let root = TempDir::new().unwrap();
        let writer = PartitionedWriter::new(root.path());
        assert!(matches!(
            writer.write(&key(14), &[]),
            Err(EtlError::PartitionWrite { .. })
        ));
    }

    #[test]
    fn test_rejects_unknown_compression() {
        assert!(PartitionedWriter::new("/tmp/x").with_compression("brotli").is_err());
        assert!(PartitionedWriter::new("/tmp/x").with_compression("zstd").is_ok());
    }
}
