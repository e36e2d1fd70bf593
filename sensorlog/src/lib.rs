//! # sensorlog
//!
//! Embedded store for scalar sensor readings.
//!
//! sensorlog keeps a bounded window of the most recent readings of every
//! sensor in memory and appends every reading to a per-sensor, per-day
//! partition file. Range queries rebuild a time-ordered series over any span
//! of days by reading and merging the covering partitions.
//!
//! **Status**: This crate is in early development. The API is not yet stable.
//!
//! ## Key Properties
//!
//! - Bounded memory: at most `max_points` buffered readings per sensor
//! - Every reading is appended to disk before `ingest` returns
//! - Plain-text partitions: `<sensor>_<YYYY-MM-DD>.csv`, one `timestamp,value` line per reading
//! - Per-sensor locking; different sensors ingest in parallel
//! - No background threads, no index files, no compaction
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use chrono::NaiveDate;
//! use sensorlog::{SensorStore, StoreConfig};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let store = SensorStore::open(StoreConfig::new("./sensor_data"))?;
//!
//! // Ingest raw values as they arrive over the wire
//! store.ingest("temp", "21.5")?;
//!
//! // Recent window, straight from memory
//! let recent = store.recent_series("temp");
//!
//! // Any span of days, from the partitions on disk
//! let start = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
//! let end = NaiveDate::from_ymd_opt(2024, 5, 7).unwrap();
//! for reading in store.query_series("temp", start, end)? {
//!     println!("{},{}", reading.timestamp, reading.value);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`SensorStore`] — Top-level handle; ingestion, recent series, catalog, queries
//! - [`StoreConfig`] — Data directory, buffer capacity, failure policy, durability
//! - [`Reading`] — One timestamped value
//! - [`QueryResult`] — Merged series with the range and partitions it came from
//!
//! ## Modules
//!
//! - [`service`] — The [`SensorStore`] facade and ingestion
//! - [`naming`] — Partition identifiers and sensor-name validation
//! - [`partition`] — Append-only partition files
//! - [`retention`] — Bounded per-sensor buffers
//! - [`query`] — Range queries across partitions
//! - [`catalog`] — Sensor and date discovery from the data directory
//! - [`reading`] — The reading type and line encoding
//! - [`config`] — Store configuration
//! - [`locks`] — Striped keyed locks
//! - [`error`] — Error types

pub mod catalog;
pub mod config;
pub mod error;
pub mod locks;
pub mod naming;
pub mod partition;
pub mod query;
pub mod reading;
pub mod retention;
pub mod service;

// Re-export primary API types at crate root for convenience.
pub use config::{IngestMode, MAX_POINTS, StoreConfig};
pub use error::{Result, SensorlogError};
pub use query::QueryResult;
pub use reading::Reading;
pub use service::SensorStore;
