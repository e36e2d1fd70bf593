//! The [`Reading`] type and its on-disk line encoding.
//!
//! A partition file is a sequence of newline-terminated lines of the form
//!
//! ```text
//! <ISO-8601 timestamp>,<float value>
//! ```
//!
//! Timestamps are written as RFC 3339 in UTC with microsecond precision.
//! When reading, any RFC 3339 offset is accepted, as is a naive ISO-8601
//! timestamp without an offset (interpreted as UTC).

use chrono::{DateTime, NaiveDateTime, SecondsFormat, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

/// Number of sub-second digits kept on every stamped timestamp.
const TIMESTAMP_SUBSEC_DIGITS: u16 = 6;

/// Format used for timestamps that carry no offset.
const NAIVE_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

/// One timestamped scalar measurement.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    /// When the reading was ingested.
    pub timestamp: DateTime<Utc>,
    /// The measured value. Always finite.
    pub value: f64,
}

impl Reading {
    /// Creates a reading from a timestamp and value.
    pub fn new(timestamp: DateTime<Utc>, value: f64) -> Self {
        Self { timestamp, value }
    }

    /// Creates a reading stamped with the current server time.
    ///
    /// The timestamp is truncated to the precision stored on disk, so a
    /// reading read back from its partition compares equal to the one that
    /// was buffered.
    pub fn now(value: f64) -> Self {
        Self::new(truncate_timestamp(Utc::now()), value)
    }

    /// Encodes the reading as one partition line, including the trailing newline.
    pub fn to_line(&self) -> String {
        format!(
            "{},{}\n",
            self.timestamp.to_rfc3339_opts(SecondsFormat::Micros, true),
            self.value
        )
    }

    /// Decodes one partition line (without its trailing newline).
    ///
    /// Returns `None` for anything structurally invalid: a field count other
    /// than two, an unparsable timestamp, or a value that is not a finite float.
    pub fn parse_line(line: &str) -> Option<Self> {
        let line = line.trim_end_matches('\r');
        let (timestamp, value) = line.split_once(',')?;
        if value.contains(',') {
            return None;
        }

        let timestamp = parse_timestamp(timestamp.trim())?;
        let value: f64 = value.trim().parse().ok()?;
        if !value.is_finite() {
            return None;
        }

        Some(Self::new(timestamp, value))
    }
}

/// Truncates a timestamp to the sub-second precision stored on disk.
pub fn truncate_timestamp(timestamp: DateTime<Utc>) -> DateTime<Utc> {
    timestamp.trunc_subsecs(TIMESTAMP_SUBSEC_DIGITS)
}

/// Parses an ISO-8601 timestamp, with or without an offset.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(s, NAIVE_TIMESTAMP_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}
