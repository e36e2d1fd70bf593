//! Integration tests for range queries and the partition catalog.

use chrono::{DateTime, NaiveDate, Utc};
use sensorlog::{Reading, SensorStore, StoreConfig};
use std::fs;
use tempfile::tempdir;

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 5, d).unwrap()
}

fn at(d: u32, h: u32, m: u32) -> DateTime<Utc> {
    day(d).and_hms_opt(h, m, 0).unwrap().and_utc()
}

fn cold_store(dir: &std::path::Path) -> SensorStore {
    SensorStore::open(StoreConfig::new(dir).with_warm_buffers(false)).unwrap()
}

#[test]
fn test_query_spans_gap_in_partitions() {
    let temp_dir = tempdir().unwrap();
    let store = cold_store(temp_dir.path());

    store.ingest_at("temp", "3", at(3, 9, 0)).unwrap();
    store.ingest_at("temp", "1", at(1, 18, 0)).unwrap();
    store.ingest_at("temp", "2", at(1, 6, 0)).unwrap();
    store.ingest_at("temp", "4", at(3, 7, 30)).unwrap();

    let result = store.query_series("temp", day(1), day(3)).unwrap();
    assert_eq!(result.partitions(), &[day(1), day(3)]);
    assert_eq!(
        result.readings(),
        &[
            Reading::new(at(1, 6, 0), 2.0),
            Reading::new(at(1, 18, 0), 1.0),
            Reading::new(at(3, 7, 30), 4.0),
            Reading::new(at(3, 9, 0), 3.0),
        ]
    );
}

#[test]
fn test_single_day_query_matches_sorted_partition() {
    let temp_dir = tempdir().unwrap();
    let store = cold_store(temp_dir.path());

    for (minute, value) in [(30, "3"), (10, "1"), (20, "2"), (5, "0")] {
        store.ingest_at("temp", value, at(2, 12, minute)).unwrap();
    }

    let mut expected = store.read_partition("temp", day(2)).unwrap();
    expected.sort_by_key(|r| r.timestamp);

    let result = store.query_series("temp", day(2), day(2)).unwrap();
    assert_eq!(result.readings(), expected.as_slice());
    assert_eq!(result.len(), 4);
}

#[test]
fn test_repeated_queries_are_identical() {
    let temp_dir = tempdir().unwrap();
    let store = cold_store(temp_dir.path());
    for d in 1..=5 {
        store.ingest_at("temp", &d.to_string(), at(d, 12, 0)).unwrap();
    }

    let first = store.query_series("temp", day(1), day(5)).unwrap();
    let second = store.query_series("temp", day(1), day(5)).unwrap();
    assert_eq!(first, second);

    let reversed = store.query_series("temp", day(5), day(1)).unwrap();
    assert_eq!(first, reversed);
}

#[test]
fn test_query_is_empty_without_data() {
    let temp_dir = tempdir().unwrap();
    let store = cold_store(temp_dir.path());
    store.ingest_at("temp", "1", at(10, 0, 0)).unwrap();

    let result = store.query_series("temp", day(1), day(9)).unwrap();
    assert!(result.is_empty());

    let unknown = store.query_series("pressure", day(1), day(31)).unwrap();
    assert!(unknown.is_empty());
}

#[test]
fn test_query_survives_malformed_and_foreign_files() {
    let temp_dir = tempdir().unwrap();
    let store = cold_store(temp_dir.path());
    store.ingest_at("temp", "1", at(1, 0, 0)).unwrap();

    // A hand-edited partition and some unrelated files in the data directory.
    fs::write(
        temp_dir.path().join("temp_2024-05-02.csv"),
        "2024-05-02T00:00:00Z,2\ngarbage\n2024-05-02T01:00:00Z,\n2024-05-02T02:00:00Z,3",
    )
    .unwrap();
    fs::write(temp_dir.path().join("README.txt"), "not a partition").unwrap();
    fs::write(temp_dir.path().join("temp_2024-13-01.csv"), "").unwrap();
    fs::create_dir(temp_dir.path().join("temp_2024-05-03.csv")).unwrap();

    let result = store.query_series("temp", day(1), day(3)).unwrap();
    let values: Vec<f64> = result.readings().iter().map(|r| r.value).collect();
    assert_eq!(values, vec![1.0, 2.0]);
    assert_eq!(result.partitions(), &[day(1), day(2)]);
}

#[test]
fn test_catalog_lists_sensors_and_dates() {
    let temp_dir = tempdir().unwrap();
    let store = cold_store(temp_dir.path());

    store.ingest_at("temp", "1", at(1, 0, 0)).unwrap();
    store.ingest_at("temp", "2", at(4, 0, 0)).unwrap();
    store.ingest_at("temp_outdoor", "3", at(2, 0, 0)).unwrap();
    store.ingest_at("humidity", "40", at(3, 0, 0)).unwrap();

    let sensors: Vec<String> = store.list_sensors().unwrap().into_iter().collect();
    assert_eq!(sensors, vec!["humidity", "temp", "temp_outdoor"]);

    assert_eq!(store.list_dates("temp").unwrap(), vec![day(4), day(1)]);
    assert_eq!(store.list_dates("temp_outdoor").unwrap(), vec![day(2)]);
    assert!(store.list_dates("wind").unwrap().is_empty());
}

#[test]
fn test_catalog_reflects_new_partitions_immediately() {
    let temp_dir = tempdir().unwrap();
    let store = cold_store(temp_dir.path());
    assert!(store.list_sensors().unwrap().is_empty());

    store.ingest_at("temp", "1", at(1, 0, 0)).unwrap();
    assert_eq!(store.list_dates("temp").unwrap(), vec![day(1)]);

    store.ingest_at("temp", "2", at(2, 0, 0)).unwrap();
    assert_eq!(store.list_dates("temp").unwrap(), vec![day(2), day(1)]);
}
