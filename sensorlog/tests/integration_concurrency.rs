//! Integration tests for concurrent ingestion and reads on a shared store.

#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss
)]

use chrono::{Duration, NaiveDate};
use sensorlog::{SensorStore, StoreConfig};
use std::collections::HashSet;
use std::sync::Arc;
use std::thread;
use tempfile::tempdir;

const THREADS: usize = 8;
const PER_THREAD: usize = 200;

fn day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
}

#[test]
fn test_concurrent_ingest_same_sensor() {
    let temp_dir = tempdir().unwrap();
    let config = StoreConfig::new(temp_dir.path()).with_warm_buffers(false);
    let store = Arc::new(SensorStore::open(config).unwrap());
    let base = day().and_hms_opt(0, 0, 0).unwrap().and_utc();

    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for i in 0..PER_THREAD {
                    let n = t * PER_THREAD + i;
                    let ts = base + Duration::milliseconds(n as i64);
                    store.ingest_at("temp", &n.to_string(), ts).unwrap();
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    let stored = store.read_partition("temp", day()).unwrap();
    assert_eq!(stored.len(), THREADS * PER_THREAD);

    // Every line is intact: each value appears exactly once.
    let values: HashSet<u64> = stored.iter().map(|r| r.value as u64).collect();
    assert_eq!(values.len(), THREADS * PER_THREAD);

    let recent = store.recent_series("temp");
    assert_eq!(recent.len(), THREADS * PER_THREAD);
    // Buffer order matches append order, so it agrees with the file.
    assert_eq!(recent, stored);
}

#[test]
fn test_concurrent_ingest_many_sensors() {
    let temp_dir = tempdir().unwrap();
    let config = StoreConfig::new(temp_dir.path())
        .with_max_points(50)
        .with_warm_buffers(false);
    let store = Arc::new(SensorStore::open(config).unwrap());
    let base = day().and_hms_opt(12, 0, 0).unwrap().and_utc();

    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                let sensor = format!("sensor_{t}");
                for i in 0..PER_THREAD {
                    let ts = base + Duration::seconds(i as i64);
                    store.ingest_at(&sensor, &i.to_string(), ts).unwrap();
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(store.list_sensors().unwrap().len(), THREADS);
    assert_eq!(store.buffered_sensors().len(), THREADS);

    for t in 0..THREADS {
        let sensor = format!("sensor_{t}");
        let recent = store.recent_series(&sensor);
        assert_eq!(recent.len(), 50);
        let oldest_kept = (PER_THREAD - 50) as f64;
        assert_eq!(recent[0].value, oldest_kept);

        let result = store.query_series(&sensor, day(), day()).unwrap();
        assert_eq!(result.len(), PER_THREAD);
    }
}

#[test]
fn test_queries_during_ingest_see_whole_lines() {
    let temp_dir = tempdir().unwrap();
    let config = StoreConfig::new(temp_dir.path()).with_warm_buffers(false);
    let store = Arc::new(SensorStore::open(config).unwrap());
    let base = day().and_hms_opt(0, 0, 0).unwrap().and_utc();

    let writer = {
        let store = Arc::clone(&store);
        thread::spawn(move || {
            for i in 0..1_000 {
                let ts = base + Duration::seconds(i);
                store.ingest_at("temp", "7.25", ts).unwrap();
            }
        })
    };

    let mut last_len = 0;
    while !writer.is_finished() {
        let result = store.query_series("temp", day(), day()).unwrap();
        assert!(result.len() >= last_len, "query results never shrink");
        assert!(result.readings().iter().all(|r| r.value == 7.25));
        last_len = result.len();
    }
    writer.join().unwrap();

    assert_eq!(store.query_series("temp", day(), day()).unwrap().len(), 1_000);
}
