//! The sensor store: ingestion, recent series, catalog, and range queries.
//!
//! [`SensorStore`] ties the modules together and is the boundary the HTTP
//! front end and the CLI talk to. Every method takes `&self`; share the
//! store between threads as an `Arc<SensorStore>`.
//!
//! # Ingestion
//!
//! [`SensorStore::ingest`] validates the sensor name and value, stamps the
//! reading with the server clock, records it in the sensor's retention
//! buffer, and appends it to that day's partition. All of this happens while
//! holding the sensor's buffer lock, so readings of one sensor are stamped,
//! buffered, and appended in a single order.
//!
//! If the append fails the caller gets the storage error. What happens to
//! the buffer depends on [`IngestMode`]: `BestEffort` keeps the reading,
//! `Transactional` undoes the buffer update.
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use sensorlog::{SensorStore, StoreConfig};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let store = SensorStore::open(StoreConfig::new("./sensor_data"))?;
//!
//! store.ingest("temp", "21.5")?;
//! store.ingest("temp", "22.0")?;
//!
//! for reading in store.recent_series("temp") {
//!     println!("{}: {}", reading.timestamp, reading.value);
//! }
//! # Ok(())
//! # }
//! ```

use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDate, Utc};

use crate::catalog::Catalog;
use crate::config::{IngestMode, StoreConfig};
use crate::error::{InputError, Result};
use crate::naming;
use crate::partition::PartitionStore;
use crate::query::{QueryResult, RangeQuery};
use crate::reading::{Reading, truncate_timestamp};
use crate::retention::RetentionMap;

/// Top-level handle over one data directory.
#[derive(Debug)]
pub struct SensorStore {
    /// The configuration the store was opened with.
    config: StoreConfig,
    /// Durable per-day partitions.
    partitions: PartitionStore,
    /// Recent readings per sensor.
    buffers: RetentionMap,
}

impl SensorStore {
    /// Opens the store described by `config`.
    ///
    /// Creates the data directory if needed. When `config.warm_buffers` is
    /// set, each sensor's retention buffer is seeded from today's partition.
    ///
    /// # Errors
    ///
    /// Returns a config error if `config` is invalid, or a storage error if
    /// the data directory cannot be created or today's partitions cannot be read.
    pub fn open(config: StoreConfig) -> Result<Self> {
        config.validate()?;

        let partitions =
            PartitionStore::open(&config.data_dir)?.with_sync_writes(config.sync_writes);
        let buffers = RetentionMap::new(config.max_points);

        let store = Self {
            config,
            partitions,
            buffers,
        };

        let warmed = if store.config.warm_buffers {
            store.warm_buffers(Utc::now().date_naive())?
        } else {
            0
        };

        tracing::info!(
            data_dir = %store.config.data_dir.display(),
            max_points = store.config.max_points,
            ingest_mode = ?store.config.ingest_mode,
            warmed_sensors = warmed,
            "sensor store opened"
        );

        Ok(store)
    }

    /// Seeds retention buffers from every partition dated `date`.
    ///
    /// Each buffer is replaced by the newest `max_points` readings of that
    /// partition in timestamp order. Returns the number of sensors seeded.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the directory or a partition cannot be read.
    pub fn warm_buffers(&self, date: NaiveDate) -> Result<usize> {
        let mut warmed = 0;
        for id in self.partitions.list_partitions()? {
            if id.date != date {
                continue;
            }
            let mut readings = self.partitions.read_all(&id.sensor, id.date)?;
            if readings.is_empty() {
                continue;
            }
            readings.sort_by_key(|reading| reading.timestamp);
            self.buffers.seed(&id.sensor, readings);
            warmed += 1;
        }
        Ok(warmed)
    }

    /// Ingests one reading for `sensor_name`, stamped with the current time.
    ///
    /// Returns the recorded reading.
    ///
    /// # Errors
    ///
    /// Returns an input error if the sensor name is empty or unsafe or if
    /// `raw_value` is not a finite number; nothing is recorded in that case.
    /// Returns a storage error if the partition append fails.
    pub fn ingest(&self, sensor_name: &str, raw_value: &str) -> Result<Reading> {
        naming::validate_sensor_name(sensor_name)?;
        let value = parse_value(raw_value)?;
        self.record(sensor_name, value, || truncate_timestamp(Utc::now()))
    }

    /// Ingests one reading for `sensor_name` with an explicit timestamp.
    ///
    /// The reading lands in the partition of `timestamp`'s UTC date. Used for
    /// backfills and imports; live ingestion goes through [`ingest`](Self::ingest).
    ///
    /// # Errors
    ///
    /// Same as [`ingest`](Self::ingest).
    pub fn ingest_at(
        &self,
        sensor_name: &str,
        raw_value: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<Reading> {
        naming::validate_sensor_name(sensor_name)?;
        let value = parse_value(raw_value)?;
        self.record(sensor_name, value, || truncate_timestamp(timestamp))
    }

    /// Buffers and appends a validated reading under the sensor's lock.
    fn record(
        &self,
        sensor: &str,
        value: f64,
        stamp: impl FnOnce() -> DateTime<Utc>,
    ) -> Result<Reading> {
        self.buffers.with_buffer(sensor, |buffer| {
            let reading = Reading::new(stamp(), value);
            let evicted = buffer.record(reading);

            match self
                .partitions
                .append(sensor, reading.timestamp.date_naive(), &reading)
            {
                Ok(()) => Ok(reading),
                Err(e) => {
                    match self.config.ingest_mode {
                        IngestMode::BestEffort => {
                            tracing::warn!(sensor, "append failed, reading kept in buffer: {e}");
                        }
                        IngestMode::Transactional => {
                            buffer.undo_record(evicted);
                            tracing::warn!(sensor, "append failed, buffer rolled back: {e}");
                        }
                    }
                    Err(e)
                }
            }
        })
    }

    /// Returns the buffered recent readings of `sensor_name`, oldest first.
    ///
    /// Unknown sensors yield an empty vector.
    pub fn recent_series(&self, sensor_name: &str) -> Vec<Reading> {
        self.buffers.snapshot(sensor_name)
    }

    /// Returns every sensor with buffered readings in this process.
    pub fn buffered_sensors(&self) -> BTreeSet<String> {
        self.buffers.sensors()
    }

    /// Returns every sensor with at least one partition on storage.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the data directory cannot be listed.
    pub fn list_sensors(&self) -> Result<BTreeSet<String>> {
        Catalog::new(&self.partitions).list_sensors()
    }

    /// Returns the partition dates of `sensor_name`, newest first.
    ///
    /// # Errors
    ///
    /// Returns an input error for an invalid sensor name, or a storage
    /// error if the data directory cannot be listed.
    pub fn list_dates(&self, sensor_name: &str) -> Result<Vec<NaiveDate>> {
        naming::validate_sensor_name(sensor_name)?;
        Catalog::new(&self.partitions).list_dates(sensor_name)
    }

    /// Returns the readings of `sensor_name` between `start` and `end`
    /// (inclusive days, either order), ascending by timestamp.
    ///
    /// # Errors
    ///
    /// Returns an input error for an invalid sensor name, or a storage
    /// error if a partition cannot be read.
    pub fn query_series(
        &self,
        sensor_name: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<QueryResult> {
        RangeQuery::new(&self.partitions).query(sensor_name, start, end)
    }

    /// Returns the raw records of one partition in file order.
    ///
    /// # Errors
    ///
    /// Returns an input error for an invalid sensor name, or a storage
    /// error if the partition exists but cannot be read.
    pub fn read_partition(&self, sensor_name: &str, date: NaiveDate) -> Result<Vec<Reading>> {
        self.partitions.read_all(sensor_name, date)
    }

    /// Returns the configuration the store was opened with.
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Returns the underlying partition store.
    pub fn partitions(&self) -> &PartitionStore {
        &self.partitions
    }
}

/// Parses a raw reading value as a finite `f64`.
///
/// # Errors
///
/// Returns [`InputError::InvalidValue`] if `raw` is empty, not a number, or
/// not finite.
pub fn parse_value(raw: &str) -> std::result::Result<f64, InputError> {
    let invalid = |reason: &str| InputError::InvalidValue {
        raw: raw.to_string(),
        reason: reason.to_string(),
    };

    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(invalid("value is empty"));
    }
    let value: f64 = trimmed.parse().map_err(|_| invalid("not a number"))?;
    if !value.is_finite() {
        return Err(invalid("value must be finite"));
    }
    Ok(value)
}
