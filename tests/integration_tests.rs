use std::path::Path;

use chrono::NaiveDate;
use pretty_assertions::assert_eq;
use tempfile::TempDir;

use weather_etl::config::EtlConfig;
use weather_etl::models::PartitionKey;
use weather_etl::processors::{RunCoordinator, RunOptions};
use weather_etl::writers::PartitionedWriter;

fn observation_json(city: &str, time: &str, temperature_c: f64) -> serde_json::Value {
    serde_json::json!({
        "city": city,
        "region": "City of London, Greater London",
        "country": "United Kingdom",
        "latitude": 51.52,
        "longitude": -0.11,
        "timezone": "Europe/London",
        "forecast_date": time.split(' ').next().unwrap(),
        "timestamp_epoch": 1717250400i64,
        "observation_time": time,
        "temperature_c": temperature_c,
        "humidity": 60,
        "pressure_mb": 1012.0,
        "wind_speed_kph": 13.0,
        "precipitation_mm": 0.1,
        "cloud_cover": 75,
        "visibility_km": 10.0,
        "uv_index": 4.0
    })
}

fn seed_raw_unit(raw_root: &Path, date: &str, file: &str, body: &serde_json::Value) {
    let dir = raw_root.join(format!("dt={}", date));
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join(file), serde_json::to_string(body).unwrap()).unwrap();
}

fn config(raw: &Path, processed: &Path) -> EtlConfig {
    EtlConfig {
        raw_root: raw.to_path_buf(),
        processed_root: processed.to_path_buf(),
        cities: vec!["London".to_string()],
        max_workers: 2,
        ..EtlConfig::default()
    }
}

fn run_options(as_of: &str) -> RunOptions {
    RunOptions {
        as_of: Some(NaiveDate::parse_from_str(as_of, "%Y-%m-%d").unwrap()),
        dry_run: false,
    }
}

#[tokio::test]
async fn test_end_to_end_pipeline() {
    let raw = TempDir::new().unwrap();
    let processed = TempDir::new().unwrap();

    seed_raw_unit(
        raw.path(),
        "2024-06-01",
        "london_14.json",
        &serde_json::json!([observation_json("London", "2024-06-01 14:00", 18.5)]),
    );

    let coordinator = RunCoordinator::new(config(raw.path(), processed.path())).unwrap();
    let summary = coordinator.run(run_options("2024-06-01"), None).await.unwrap();

    assert_eq!(summary.processed, 1);
    assert_eq!(summary.skipped, 0);
    assert_eq!(summary.failed, 0);
    assert_eq!(summary.rows_written, 1);

    // Output lands at the exact path the catalog projection expects.
    let partition_file = processed
        .path()
        .join("source_date=2024-06-01")
        .join("city_id=london")
        .join("hour=14")
        .join("part-00000.parquet");
    assert!(partition_file.exists());

    let rows = PartitionedWriter::read_sample_rows(&partition_file, 10).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].city_name, "London");
    assert!((rows[0].temperature_c - 18.5).abs() < 1e-9);
    assert!((rows[0].temperature_f - 65.3).abs() < 1e-9);
}

#[tokio::test]
async fn test_second_run_skips_everything_byte_for_byte() {
    let raw = TempDir::new().unwrap();
    let processed = TempDir::new().unwrap();

    for hour in [9, 14] {
        seed_raw_unit(
            raw.path(),
            "2024-06-01",
            &format!("london_{:02}.json", hour),
            &serde_json::json!([observation_json(
                "London",
                &format!("2024-06-01 {:02}:00", hour),
                18.5
            )]),
        );
    }

    let coordinator = RunCoordinator::new(config(raw.path(), processed.path())).unwrap();

    let first = coordinator.run(run_options("2024-06-01"), None).await.unwrap();
    assert_eq!(first.processed, 2);

    let partition_file = processed
        .path()
        .join("source_date=2024-06-01")
        .join("city_id=london")
        .join("hour=14")
        .join("part-00000.parquet");
    let bytes_before = std::fs::read(&partition_file).unwrap();

    let second = coordinator.run(run_options("2024-06-01"), None).await.unwrap();
    assert_eq!(second.processed, 0);
    assert_eq!(second.skipped, 2);
    assert_eq!(second.failed, 0);

    // Skipped means untouched: identical bytes, no fresh processing_time.
    let bytes_after = std::fs::read(&partition_file).unwrap();
    assert_eq!(bytes_before, bytes_after);
}

#[tokio::test]
async fn test_malformed_record_does_not_block_valid_ones() {
    let raw = TempDir::new().unwrap();
    let processed = TempDir::new().unwrap();

    let mut missing_field = observation_json("London", "2024-06-01 14:00", 21.0);
    missing_field.as_object_mut().unwrap().remove("pressure_mb");

    let mut second = observation_json("London", "2024-06-01 14:00", 18.7);
    second["timestamp_epoch"] = serde_json::json!(1717254000i64);

    seed_raw_unit(
        raw.path(),
        "2024-06-01",
        "london_14.json",
        &serde_json::json!([
            observation_json("London", "2024-06-01 14:00", 18.5),
            missing_field,
            second,
        ]),
    );

    let coordinator = RunCoordinator::new(config(raw.path(), processed.path())).unwrap();
    let summary = coordinator.run(run_options("2024-06-01"), None).await.unwrap();

    assert_eq!(summary.processed, 1);
    assert_eq!(summary.failed, 0);
    assert_eq!(summary.rows_written, 2);
    assert_eq!(summary.malformed_records, 1);
}

#[tokio::test]
async fn test_failed_partition_leaves_no_output_and_retries_next_run() {
    let raw = TempDir::new().unwrap();
    let processed = TempDir::new().unwrap();

    // First run sees a corrupt unit: partition fails, nothing is committed.
    seed_raw_unit(
        raw.path(),
        "2024-06-01",
        "london_14.json",
        &serde_json::json!({"not": "an array"}),
    );

    let coordinator = RunCoordinator::new(config(raw.path(), processed.path())).unwrap();
    let summary = coordinator.run(run_options("2024-06-01"), None).await.unwrap();
    assert_eq!(summary.failed, 1);

    let key = PartitionKey::new(
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
        "london",
        14,
    )
    .unwrap();
    assert!(!key.processed_dir(processed.path()).exists());

    // The corrected re-upload is picked up because nothing was indexed.
    seed_raw_unit(
        raw.path(),
        "2024-06-01",
        "london_14.json",
        &serde_json::json!([observation_json("London", "2024-06-01 14:00", 18.5)]),
    );
    let retry = coordinator.run(run_options("2024-06-01"), None).await.unwrap();
    assert_eq!(retry.processed, 1);
    assert_eq!(retry.failed, 0);
}

#[tokio::test]
async fn test_lookback_scenario_counts() {
    let raw = TempDir::new().unwrap();
    let processed = TempDir::new().unwrap();

    let dates = [
        "2024-06-01",
        "2024-06-02",
        "2024-06-03",
        "2024-06-04",
        "2024-06-05",
        "2024-06-06",
        "2024-06-07",
    ];
    for date in dates {
        seed_raw_unit(
            raw.path(),
            date,
            "london_12.json",
            &serde_json::json!([observation_json("London", &format!("{} 12:00", date), 18.5)]),
        );
    }

    // Pre-process the three oldest days.
    let warm_up = RunCoordinator::new(EtlConfig {
        lookback_days: 3,
        ..config(raw.path(), processed.path())
    })
    .unwrap();
    warm_up.run(run_options("2024-06-03"), None).await.unwrap();

    let coordinator = RunCoordinator::new(config(raw.path(), processed.path())).unwrap();
    let summary = coordinator.run(run_options("2024-06-07"), None).await.unwrap();

    assert_eq!(summary.candidates, 7);
    assert_eq!(summary.processed, 4);
    assert_eq!(summary.skipped, 3);
    assert_eq!(summary.failed, 0);
}
