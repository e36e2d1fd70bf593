//! Catalog of sensors and partition dates, derived from the data directory.
//!
//! Nothing here is cached: every call lists the directory again and parses
//! each file name with [`naming`](crate::naming). Files that are not
//! partitions are ignored. This is fine for directories of up to a few
//! thousand partitions.

use std::collections::BTreeSet;

use chrono::NaiveDate;

use crate::error::Result;
use crate::partition::PartitionStore;

/// Read-only view of which sensors and days have partitions.
#[derive(Debug, Clone, Copy)]
pub struct Catalog<'a> {
    store: &'a PartitionStore,
}

impl<'a> Catalog<'a> {
    /// Creates a catalog over the partitions of `store`.
    pub fn new(store: &'a PartitionStore) -> Self {
        Self { store }
    }

    /// Returns every sensor that has at least one partition.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the data directory cannot be listed.
    pub fn list_sensors(&self) -> Result<BTreeSet<String>> {
        Ok(self
            .store
            .list_partitions()?
            .into_iter()
            .map(|id| id.sensor)
            .collect())
    }

    /// Returns the partition dates of `sensor`, newest first.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the data directory cannot be listed.
    pub fn list_dates(&self, sensor: &str) -> Result<Vec<NaiveDate>> {
        let mut dates = self.dates(sensor)?;
        dates.reverse();
        Ok(dates)
    }

    /// Returns the partition dates of `sensor` within `[start, end]`, oldest first.
    ///
    /// `start` must not be after `end`; an inverted range is empty.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the data directory cannot be listed.
    pub fn dates_in_range(
        &self,
        sensor: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<NaiveDate>> {
        let mut dates = self.dates(sensor)?;
        dates.retain(|date| (start..=end).contains(date));
        Ok(dates)
    }

    /// Ascending, de-duplicated dates for one sensor.
    fn dates(&self, sensor: &str) -> Result<Vec<NaiveDate>> {
        let dates: BTreeSet<NaiveDate> = self
            .store
            .list_partitions()?
            .into_iter()
            .filter(|id| id.sensor == sensor)
            .map(|id| id.date)
            .collect();
        Ok(dates.into_iter().collect())
    }
}
