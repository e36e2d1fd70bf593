//! Partition naming: `(sensor, date)` to identifier and back.
//!
//! A partition identifier is the sensor name followed by an underscore and
//! the calendar date in `YYYY-MM-DD` form. The file holding the partition
//! appends the [`PARTITION_EXTENSION`]:
//!
//! ```text
//! temp_2024-05-01.csv
//! boiler_outlet_2024-05-01.csv   <- sensor "boiler_outlet"
//! ```
//!
//! Parsing splits at the **last** underscore. The date suffix can never
//! contain an underscore, so every valid sensor name round-trips, including
//! names that themselves contain underscores or date-like text.
//!
//! Sensor names become path components, so [`validate_sensor_name`] rejects
//! anything that could escape the data directory or produce a hidden file.

use chrono::NaiveDate;

use crate::error::{InputError, NamingError};

/// File extension of partition files (without the leading dot).
pub const PARTITION_EXTENSION: &str = "csv";

/// Separator between the sensor name and the date.
const SEPARATOR: char = '_';

/// Date format used in identifiers.
const DATE_FORMAT: &str = "%Y-%m-%d";

/// Length of a `YYYY-MM-DD` date.
const DATE_LEN: usize = 10;

/// Longest accepted sensor name in bytes.
///
/// Leaves room for `_YYYY-MM-DD.csv` within a 255-byte file name.
pub const MAX_SENSOR_NAME_LEN: usize = 200;

/// A parsed partition identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PartitionId {
    /// The sensor the partition belongs to.
    pub sensor: String,
    /// The calendar day the partition covers.
    pub date: NaiveDate,
}

impl PartitionId {
    /// Creates a partition identifier.
    pub fn new(sensor: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            sensor: sensor.into(),
            date,
        }
    }
}

/// Composes the partition identifier for `(sensor, date)`.
pub fn partition_name(sensor: &str, date: NaiveDate) -> String {
    format!("{sensor}{SEPARATOR}{}", date.format(DATE_FORMAT))
}

/// Composes the partition file name for `(sensor, date)`.
pub fn partition_file_name(sensor: &str, date: NaiveDate) -> String {
    format!("{}.{PARTITION_EXTENSION}", partition_name(sensor, date))
}

/// Parses a partition identifier back into `(sensor, date)`.
///
/// # Errors
///
/// Returns [`NamingError::MalformedIdentifier`] if there is no underscore,
/// the suffix is not a `YYYY-MM-DD` date, or the sensor component is not a
/// valid sensor name.
pub fn parse_partition_name(identifier: &str) -> Result<PartitionId, NamingError> {
    let malformed = |reason: &str| NamingError::MalformedIdentifier {
        identifier: identifier.to_string(),
        reason: reason.to_string(),
    };

    let (sensor, date) = identifier
        .rsplit_once(SEPARATOR)
        .ok_or_else(|| malformed("missing '_' before the date"))?;

    if date.len() != DATE_LEN {
        return Err(malformed("date suffix is not YYYY-MM-DD"));
    }
    let date = NaiveDate::parse_from_str(date, DATE_FORMAT)
        .map_err(|_| malformed("date suffix is not YYYY-MM-DD"))?;

    validate_sensor_name(sensor).map_err(|e| malformed(&e.to_string()))?;

    Ok(PartitionId::new(sensor, date))
}

/// Parses a partition file name (with extension) back into `(sensor, date)`.
///
/// # Errors
///
/// Returns [`NamingError::MalformedIdentifier`] if the extension is missing
/// or the stem is not a valid identifier.
pub fn parse_partition_file_name(file_name: &str) -> Result<PartitionId, NamingError> {
    let stem = file_name
        .strip_suffix(PARTITION_EXTENSION)
        .and_then(|s| s.strip_suffix('.'))
        .ok_or_else(|| NamingError::MalformedIdentifier {
            identifier: file_name.to_string(),
            reason: format!("missing .{PARTITION_EXTENSION} extension"),
        })?;
    parse_partition_name(stem)
}

/// Parses a `YYYY-MM-DD` date argument.
///
/// # Errors
///
/// Returns [`InputError::InvalidDate`] if `raw` is not a valid calendar date.
pub fn parse_date(raw: &str) -> Result<NaiveDate, InputError> {
    let trimmed = raw.trim();
    if trimmed.len() != DATE_LEN {
        return Err(InputError::InvalidDate { raw: raw.to_string() });
    }
    NaiveDate::parse_from_str(trimmed, DATE_FORMAT)
        .map_err(|_| InputError::InvalidDate { raw: raw.to_string() })
}

/// Checks that a sensor name is safe to use as a path component.
///
/// Rejected: empty names, names over [`MAX_SENSOR_NAME_LEN`] bytes, names
/// containing `/`, `\`, NUL or any other control character, and names
/// starting with `.` (which covers `.` and `..`).
///
/// # Errors
///
/// Returns [`InputError::EmptySensorName`] or [`InputError::InvalidSensorName`].
pub fn validate_sensor_name(name: &str) -> Result<(), InputError> {
    let invalid = |reason: &str| InputError::InvalidSensorName {
        name: name.to_string(),
        reason: reason.to_string(),
    };

    if name.is_empty() {
        return Err(InputError::EmptySensorName);
    }
    if name.len() > MAX_SENSOR_NAME_LEN {
        return Err(invalid("name is too long"));
    }
    if name.starts_with('.') {
        return Err(invalid("name must not start with '.'"));
    }
    if name.contains(['/', '\\']) {
        return Err(invalid("name must not contain path separators"));
    }
    if name.chars().any(char::is_control) {
        return Err(invalid("name must not contain control characters"));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_name_format() {
        assert_eq!(partition_name("temp", day(2024, 5, 1)), "temp_2024-05-01");
        assert_eq!(
            partition_file_name("temp", day(2024, 12, 31)),
            "temp_2024-12-31.csv"
        );
    }

    #[test]
    fn test_round_trip() {
        let names = [
            "temp",
            "boiler_outlet",
            "sensor_2023-01-01",
            "a_b_c_",
            "kitchen temp #2",
            "température",
        ];
        for sensor in names {
            let date = day(2024, 2, 29);
            let parsed = parse_partition_name(&partition_name(sensor, date)).unwrap();
            assert_eq!(parsed, PartitionId::new(sensor, date), "sensor {sensor:?}");

            let parsed = parse_partition_file_name(&partition_file_name(sensor, date)).unwrap();
            assert_eq!(parsed, PartitionId::new(sensor, date), "sensor {sensor:?}");
        }
    }

    #[test]
    fn test_parse_rejects_malformed() {
        let cases = [
            "temp",
            "temp-2024-05-01",
            "_2024-05-01",
            "temp_2024-5-1",
            "temp_2024-13-01",
            "temp_2024-02-30",
            "temp_20240501",
            "temp_2024-05-01x",
            "../etc_2024-05-01",
        ];
        for identifier in cases {
            assert!(
                matches!(
                    parse_partition_name(identifier),
                    Err(NamingError::MalformedIdentifier { .. })
                ),
                "expected {identifier:?} to be rejected"
            );
        }
    }

    #[test]
    fn test_parse_file_name_requires_extension() {
        assert!(parse_partition_file_name("temp_2024-05-01").is_err());
        assert!(parse_partition_file_name("temp_2024-05-01.txt").is_err());
        assert!(parse_partition_file_name("temp_2024-05-01csv").is_err());
        assert!(parse_partition_file_name(".csv").is_err());
    }

    #[test]
    fn test_parse_date() {
        assert_eq!(parse_date("2024-05-01"), Ok(day(2024, 5, 1)));
        assert_eq!(parse_date(" 2024-05-01 "), Ok(day(2024, 5, 1)));
        for bad in ["", "2024-5-1", "2024-05-32", "05/01/2024", "2024-05-01T00:00:00"] {
            assert_eq!(
                parse_date(bad),
                Err(InputError::InvalidDate { raw: bad.to_string() })
            );
        }
    }

    #[test]
    fn test_validate_sensor_name() {
        assert!(validate_sensor_name("temp").is_ok());
        assert!(validate_sensor_name("temp.outdoor").is_ok());
        assert_eq!(validate_sensor_name(""), Err(InputError::EmptySensorName));

        for bad in [".", "..", ".hidden", "../escape", "a/b", "a\\b", "a\0b", "line\nbreak"] {
            assert!(
                matches!(
                    validate_sensor_name(bad),
                    Err(InputError::InvalidSensorName { .. })
                ),
                "expected {bad:?} to be rejected"
            );
        }

        let long = "x".repeat(MAX_SENSOR_NAME_LEN + 1);
        assert!(validate_sensor_name(&long).is_err());
        assert!(validate_sensor_name(&long[1..]).is_ok());
    }
}
