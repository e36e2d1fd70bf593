//! Error types for the sensorlog reading store.

use std::path::PathBuf;

use thiserror::Error;

/// The main error type for all sensorlog operations.
///
/// Each variant wraps the error enum of one concern. Callers that only need
/// to map an error onto a response class can use [`SensorlogError::is_client_error`].
#[derive(Error, Debug)]
pub enum SensorlogError {
    /// A sensor name, value, or date supplied by the caller is invalid.
    #[error("invalid input: {0}")]
    Input(#[from] InputError),

    /// The storage medium rejected a read, write, or directory listing.
    #[error("storage unavailable: {0}")]
    Storage(#[from] StorageError),

    /// A partition identifier does not match the naming scheme.
    #[error("naming error: {0}")]
    Naming(#[from] NamingError),

    /// The store configuration is invalid or could not be loaded.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
}

impl SensorlogError {
    /// Returns `true` when the error was caused by the caller's input
    /// rather than by the store or its storage medium.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::Input(_))
    }
}

/// Errors raised while validating caller-supplied input.
///
/// None of these ever reach storage: validation happens before any mutation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InputError {
    /// The sensor name is empty.
    #[error("sensor name must not be empty")]
    EmptySensorName,

    /// The sensor name cannot be used as a partition path component.
    #[error("invalid sensor name '{name}': {reason}")]
    InvalidSensorName {
        /// The rejected name.
        name: String,
        /// Why the name was rejected.
        reason: String,
    },

    /// The raw value does not parse as a finite 64-bit float.
    #[error("invalid value '{raw}': {reason}")]
    InvalidValue {
        /// The raw value as received.
        raw: String,
        /// Why the value was rejected.
        reason: String,
    },

    /// A date argument is not in `YYYY-MM-DD` form.
    #[error("invalid date '{raw}': expected YYYY-MM-DD")]
    InvalidDate {
        /// The raw date string as received.
        raw: String,
    },
}

/// Errors raised when the storage medium fails.
///
/// These are operational faults. They are surfaced to the caller and never
/// retried by the store itself.
#[derive(Error, Debug)]
pub enum StorageError {
    /// The data directory could not be created or accessed.
    #[error("failed to access data directory '{}': {source}", path.display())]
    DirectoryAccess {
        /// The directory that could not be accessed.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Appending a record to a partition failed.
    #[error("failed to append to partition '{}': {source}", path.display())]
    AppendFailed {
        /// The partition file path.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Reading a partition failed for a reason other than it being absent.
    #[error("failed to read partition '{}': {source}", path.display())]
    ReadFailed {
        /// The partition file path.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Listing the data directory failed.
    #[error("failed to list data directory '{}': {source}", path.display())]
    ListFailed {
        /// The data directory path.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Errors raised when parsing partition identifiers.
///
/// Scanners skip identifiers that produce this error; it is never fatal to
/// a listing or a query.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NamingError {
    /// The identifier is not `<sensor>_<YYYY-MM-DD>` (with the expected extension
    /// when parsing file names).
    #[error("malformed partition identifier '{identifier}': {reason}")]
    MalformedIdentifier {
        /// The identifier that failed to parse.
        identifier: String,
        /// What did not match.
        reason: String,
    },
}

/// Errors raised while loading or validating a [`StoreConfig`](crate::config::StoreConfig).
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The retention capacity must hold at least one reading.
    #[error("invalid max_points: {max_points} (must be > 0)")]
    InvalidMaxPoints {
        /// The rejected capacity.
        max_points: usize,
    },

    /// The data directory path is empty.
    #[error("data_dir must not be empty")]
    EmptyDataDir,

    /// The configuration file could not be read.
    #[error("failed to read config file '{}': {source}", path.display())]
    ConfigRead {
        /// The config file path.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid JSON for a `StoreConfig`.
    #[error("failed to parse config file '{}': {source}", path.display())]
    ConfigParse {
        /// The config file path.
        path: PathBuf,
        /// The underlying JSON error.
        #[source]
        source: serde_json::Error,
    },
}

/// Type alias for `Result<T, SensorlogError>`.
pub type Result<T> = std::result::Result<T, SensorlogError>;
