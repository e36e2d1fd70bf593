//! Store configuration.
//!
//! A [`StoreConfig`] names the data directory and sets the retention
//! capacity, the ingestion failure policy, and write durability. It can be
//! built in code or loaded from a JSON file; fields missing from the file
//! take their defaults.
//!
//! ```json
//! {
//!   "data_dir": "/var/lib/sensorlog",
//!   "max_points": 10000,
//!   "ingest_mode": "transactional",
//!   "sync_writes": false,
//!   "warm_buffers": true
//! }
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

/// Default capacity of each sensor's retention buffer.
pub const MAX_POINTS: usize = 10_000;

/// Default data directory, relative to the working directory.
pub const DEFAULT_DATA_DIR: &str = "sensor_data";

/// What ingestion does to the retention buffer when the partition append fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestMode {
    /// The buffered reading is kept even though it never reached storage.
    ///
    /// The caller still receives the storage error. The buffer may then hold
    /// readings that are absent from the partition.
    #[default]
    BestEffort,

    /// The buffer update is undone, so the buffer never holds a reading the
    /// partition does not.
    Transactional,
}

/// Configuration for a [`SensorStore`](crate::service::SensorStore).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Directory holding the partition files.
    pub data_dir: PathBuf,

    /// Capacity of each sensor's retention buffer.
    pub max_points: usize,

    /// Buffer policy on append failure.
    pub ingest_mode: IngestMode,

    /// Whether every append is followed by `sync_data`.
    pub sync_writes: bool,

    /// Whether opening the store seeds retention buffers from today's partitions.
    pub warm_buffers: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            max_points: MAX_POINTS,
            ingest_mode: IngestMode::default(),
            sync_writes: false,
            warm_buffers: true,
        }
    }
}

impl StoreConfig {
    /// Creates a default configuration rooted at `data_dir`.
    pub fn new<P: Into<PathBuf>>(data_dir: P) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Self::default()
        }
    }

    /// Sets the retention capacity.
    #[must_use]
    pub fn with_max_points(mut self, max_points: usize) -> Self {
        self.max_points = max_points;
        self
    }

    /// Sets the ingestion failure policy.
    #[must_use]
    pub fn with_ingest_mode(mut self, ingest_mode: IngestMode) -> Self {
        self.ingest_mode = ingest_mode;
        self
    }

    /// Enables or disables `sync_data` after every append.
    #[must_use]
    pub fn with_sync_writes(mut self, sync_writes: bool) -> Self {
        self.sync_writes = sync_writes;
        self
    }

    /// Enables or disables buffer warm-up on open.
    #[must_use]
    pub fn with_warm_buffers(mut self, warm_buffers: bool) -> Self {
        self.warm_buffers = warm_buffers;
        self
    }

    /// Loads a configuration from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ConfigRead`] if the file cannot be read,
    /// [`ConfigError::ConfigParse`] if it is not valid JSON, or a validation
    /// error from [`StoreConfig::validate`].
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path).map_err(|e| ConfigError::ConfigRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        let config: Self = serde_json::from_str(&data).map_err(|e| ConfigError::ConfigParse {
            path: path.to_path_buf(),
            source: e,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if `max_points` is zero or `data_dir` is empty.
    pub fn validate(&self) -> Result<()> {
        if self.max_points == 0 {
            return Err(ConfigError::InvalidMaxPoints {
                max_points: self.max_points,
            }
            .into());
        }

        if self.data_dir.as_os_str().is_empty() {
            return Err(ConfigError::EmptyDataDir.into());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SensorlogError;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let config = StoreConfig::default();
        assert_eq!(config.max_points, 10_000);
        assert_eq!(config.ingest_mode, IngestMode::BestEffort);
        assert!(!config.sync_writes);
        assert!(config.warm_buffers);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = StoreConfig::new("/tmp/sensors")
            .with_max_points(5)
            .with_ingest_mode(IngestMode::Transactional)
            .with_sync_writes(true)
            .with_warm_buffers(false);
        assert_eq!(config.data_dir, PathBuf::from("/tmp/sensors"));
        assert_eq!(config.max_points, 5);
        assert_eq!(config.ingest_mode, IngestMode::Transactional);
        assert!(config.sync_writes);
        assert!(!config.warm_buffers);
    }

    #[test]
    fn test_validate_rejects_zero_capacity() {
        let result = StoreConfig::default().with_max_points(0).validate();
        assert!(matches!(
            result,
            Err(SensorlogError::Config(ConfigError::InvalidMaxPoints { max_points: 0 }))
        ));
    }

    #[test]
    fn test_validate_rejects_empty_dir() {
        let result = StoreConfig::new("").validate();
        assert!(matches!(
            result,
            Err(SensorlogError::Config(ConfigError::EmptyDataDir))
        ));
    }

    #[test]
    fn test_load_partial_json() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sensorlog.json");
        fs::write(
            &path,
            r#"{ "data_dir": "/srv/sensors", "ingest_mode": "transactional" }"#,
        )
        .unwrap();

        let config = StoreConfig::from_json_file(&path).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/srv/sensors"));
        assert_eq!(config.ingest_mode, IngestMode::Transactional);
        assert_eq!(config.max_points, MAX_POINTS);
    }

    #[test]
    fn test_load_errors() {
        let dir = tempdir().unwrap();

        let missing = StoreConfig::from_json_file(dir.path().join("missing.json"));
        assert!(matches!(
            missing,
            Err(SensorlogError::Config(ConfigError::ConfigRead { .. }))
        ));

        let path = dir.path().join("bad.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            StoreConfig::from_json_file(&path),
            Err(SensorlogError::Config(ConfigError::ConfigParse { .. }))
        ));

        fs::write(&path, r#"{ "max_points": 0 }"#).unwrap();
        assert!(matches!(
            StoreConfig::from_json_file(&path),
            Err(SensorlogError::Config(ConfigError::InvalidMaxPoints { .. }))
        ));
    }
}
