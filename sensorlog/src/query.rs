//! Range queries over a sensor's daily partitions.
//!
//! A query names a sensor and an inclusive date range. The engine asks the
//! [`Catalog`] which of the sensor's partitions fall inside the range, reads
//! each one, concatenates the records, and sorts them by timestamp.
//!
//! Sorting is not optional. Rows are appended in arrival order, which is not
//! guaranteed to be timestamp order if the clock steps backwards, and rows
//! from adjacent days have to interleave correctly.
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use chrono::NaiveDate;
//! use sensorlog::partition::PartitionStore;
//! use sensorlog::query::RangeQuery;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let store = PartitionStore::open("./sensor_data")?;
//! let start = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
//! let end = NaiveDate::from_ymd_opt(2024, 5, 7).unwrap();
//!
//! let result = RangeQuery::new(&store).query("temp", start, end)?;
//! println!("{} readings from {} partitions", result.len(), result.partitions().len());
//! for reading in result {
//!     println!("{},{}", reading.timestamp, reading.value);
//! }
//! # Ok(())
//! # }
//! ```

use chrono::NaiveDate;

use crate::catalog::Catalog;
use crate::error::Result;
use crate::naming;
use crate::partition::PartitionStore;
use crate::reading::Reading;

/// Result of a range query.
///
/// Wraps the merged series together with the normalized range that was
/// searched and the dates of the partitions that were read.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResult {
    /// The sensor that was queried.
    sensor: String,
    /// The inclusive range searched, with `start <= end`.
    range: (NaiveDate, NaiveDate),
    /// Dates of the partitions read, ascending.
    partitions: Vec<NaiveDate>,
    /// The merged readings, ascending by timestamp.
    readings: Vec<Reading>,
}

impl QueryResult {
    /// Returns the sensor that was queried.
    pub fn sensor(&self) -> &str {
        &self.sensor
    }

    /// Returns the inclusive date range that was searched, `(start, end)`.
    ///
    /// This is the normalized range: a reversed request is reported in order.
    pub fn range(&self) -> (NaiveDate, NaiveDate) {
        self.range
    }

    /// Returns the dates of the partitions that were read, oldest first.
    pub fn partitions(&self) -> &[NaiveDate] {
        &self.partitions
    }

    /// Returns the merged readings, oldest first.
    pub fn readings(&self) -> &[Reading] {
        &self.readings
    }

    /// Returns the number of readings.
    pub fn len(&self) -> usize {
        self.readings.len()
    }

    /// Returns `true` if the query found no readings.
    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    /// Consumes the result and returns the readings.
    pub fn into_readings(self) -> Vec<Reading> {
        self.readings
    }
}

impl IntoIterator for QueryResult {
    type Item = Reading;
    type IntoIter = std::vec::IntoIter<Reading>;

    fn into_iter(self) -> Self::IntoIter {
        self.readings.into_iter()
    }
}

/// Range query engine over one partition store.
#[derive(Debug, Clone, Copy)]
pub struct RangeQuery<'a> {
    store: &'a PartitionStore,
}

impl<'a> RangeQuery<'a> {
    /// Creates a query engine over `store`.
    pub fn new(store: &'a PartitionStore) -> Self {
        Self { store }
    }

    /// Returns every reading of `sensor` between `start` and `end` (inclusive days),
    /// ascending by timestamp.
    ///
    /// The bounds may be given in either order. Missing partitions and
    /// malformed rows simply contribute nothing; finding no data is not an error.
    ///
    /// # Errors
    ///
    /// Returns an input error if `sensor` is not a valid sensor name, or a
    /// storage error if the directory or a partition cannot be read.
    pub fn query(&self, sensor: &str, start: NaiveDate, end: NaiveDate) -> Result<QueryResult> {
        naming::validate_sensor_name(sensor)?;

        let (start, end) = normalize_range(start, end);
        let partitions = Catalog::new(self.store).dates_in_range(sensor, start, end)?;

        let mut readings = Vec::new();
        for &date in &partitions {
            readings.extend(self.store.read_all(sensor, date)?);
        }
        readings.sort_by_key(|reading| reading.timestamp);

        tracing::debug!(
            sensor,
            %start,
            %end,
            partitions = partitions.len(),
            readings = readings.len(),
            "range query"
        );

        Ok(QueryResult {
            sensor: sensor.to_string(),
            range: (start, end),
            partitions,
            readings,
        })
    }
}

/// Orders a date range so that `start <= end`.
pub fn normalize_range(start: NaiveDate, end: NaiveDate) -> (NaiveDate, NaiveDate) {
    if start > end { (end, start) } else { (start, end) }
}
