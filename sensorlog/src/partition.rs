//! Append-only partition files on local storage.
//!
//! Every `(sensor, date)` pair maps to one file in the data directory (see
//! [`naming`](crate::naming)). Writers append one whole line per reading;
//! readers parse every complete line and skip anything malformed.
//!
//! # File Layout
//!
//! ```text
//! data_dir/
//! ├── temp_2024-05-01.csv
//! ├── temp_2024-05-02.csv
//! └── humidity_2024-05-02.csv
//! ```
//!
//! # Concurrency
//!
//! Appends to the same partition are serialized through a striped lock
//! table, and each record goes out as a single `write_all` on a file opened
//! with `O_APPEND`. Readers take no lock. A trailing line without its
//! newline belongs to an append still in flight and is ignored, so a reader
//! sees every line either whole or not at all.
//!
//! # Torn Tails
//!
//! A failed write is truncated back to the previous file length. If a crash
//! still leaves an unterminated fragment, the next append starts with a
//! newline so the fragment stays a single malformed line and the new record
//! remains readable.

use std::fs::{self, File, OpenOptions};
use std::io::{self, ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use chrono::NaiveDate;

use crate::error::{Result, StorageError};
use crate::locks::KeyedLocks;
use crate::naming::{self, PartitionId};
use crate::reading::Reading;

/// Read/append access to the partition files in one data directory.
#[derive(Debug)]
pub struct PartitionStore {
    /// Directory holding the partition files.
    dir: PathBuf,
    /// Whether appends are followed by `sync_data`.
    sync_writes: bool,
    /// Per-partition append locks.
    locks: KeyedLocks,
}

impl PartitionStore {
    /// Opens the partition store rooted at `dir`, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::DirectoryAccess`] if the directory cannot be created.
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).map_err(|e| StorageError::DirectoryAccess {
            path: dir.clone(),
            source: e,
        })?;

        Ok(Self {
            dir,
            sync_writes: false,
            locks: KeyedLocks::default(),
        })
    }

    /// Sets whether every append is followed by `sync_data`.
    #[must_use]
    pub fn with_sync_writes(mut self, sync_writes: bool) -> Self {
        self.sync_writes = sync_writes;
        self
    }

    /// Returns the data directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Returns the file path of the partition for `(sensor, date)`.
    pub fn partition_path(&self, sensor: &str, date: NaiveDate) -> PathBuf {
        self.dir.join(naming::partition_file_name(sensor, date))
    }

    /// Appends one reading to the partition for `(sensor, date)`.
    ///
    /// The partition is created if absent. The line is flushed (and synced
    /// when configured) before returning, so any read that opens the
    /// partition afterwards sees it.
    ///
    /// # Errors
    ///
    /// Returns an input error if `sensor` is not a valid sensor name, or
    /// [`StorageError::AppendFailed`] if the medium rejects the write.
    pub fn append(&self, sensor: &str, date: NaiveDate, reading: &Reading) -> Result<()> {
        naming::validate_sensor_name(sensor)?;

        let path = self.partition_path(sensor, date);
        let line = reading.to_line();
        let append_failed = |e: std::io::Error| StorageError::AppendFailed {
            path: path.clone(),
            source: e,
        };

        let _guard = self.locks.lock(&path);

        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&path)
            .map_err(append_failed)?;

        let len = file.metadata().map_err(append_failed)?.len();
        let mut record = Vec::with_capacity(line.len() + 1);
        // A torn tail from an interrupted append must stay its own line.
        if len > 0 && !ends_with_newline(&mut file, len).map_err(append_failed)? {
            record.push(b'\n');
        }
        record.extend_from_slice(line.as_bytes());

        write_or_rollback(&mut file, len, &record).map_err(append_failed)?;
        if self.sync_writes {
            file.sync_data().map_err(append_failed)?;
        }

        Ok(())
    }

    /// Reads every valid record of the partition for `(sensor, date)`, in file order.
    ///
    /// A missing partition yields an empty vector. Malformed lines and an
    /// unterminated trailing line are skipped.
    ///
    /// # Errors
    ///
    /// Returns an input error if `sensor` is not a valid sensor name, or
    /// [`StorageError::ReadFailed`] if the file exists but cannot be read.
    pub fn read_all(&self, sensor: &str, date: NaiveDate) -> Result<Vec<Reading>> {
        naming::validate_sensor_name(sensor)?;

        let path = self.partition_path(sensor, date);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StorageError::ReadFailed { path, source: e }.into()),
        };

        let complete = match bytes.iter().rposition(|&b| b == b'\n') {
            Some(last_newline) => &bytes[..=last_newline],
            None => &[][..],
        };
        let text = String::from_utf8_lossy(complete);

        let mut readings = Vec::new();
        let mut skipped = 0usize;
        for line in text.lines() {
            if line.trim().is_empty() {
                continue;
            }
            match Reading::parse_line(line) {
                Some(reading) => readings.push(reading),
                None => skipped += 1,
            }
        }

        if skipped > 0 {
            tracing::debug!(
                path = %path.display(),
                skipped,
                "skipped malformed partition records"
            );
        }

        Ok(readings)
    }

    /// Lists every partition in the data directory, sorted by sensor then date.
    ///
    /// File names that are not partition names are ignored. A missing data
    /// directory yields an empty list.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::ListFailed`] if the directory cannot be read.
    pub fn list_partitions(&self) -> Result<Vec<PartitionId>> {
        let list_failed = |e: std::io::Error| StorageError::ListFailed {
            path: self.dir.clone(),
            source: e,
        };

        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(list_failed(e).into()),
        };

        let mut partitions = Vec::new();
        for entry in entries {
            let entry = entry.map_err(list_failed)?;
            if !entry.file_type().map_err(list_failed)?.is_file() {
                continue;
            }
            let Some(file_name) = entry.file_name().to_str().map(str::to_owned) else {
                continue;
            };
            match naming::parse_partition_file_name(&file_name) {
                Ok(id) => partitions.push(id),
                Err(e) => tracing::trace!("ignoring {file_name}: {e}"),
            }
        }

        partitions.sort_unstable();
        Ok(partitions)
    }
}

/// Returns whether the last byte of a `len`-byte file is a newline.
fn ends_with_newline(file: &mut File, len: u64) -> io::Result<bool> {
    let mut last = [0u8; 1];
    file.seek(SeekFrom::Start(len - 1))?;
    file.read_exact(&mut last)?;
    Ok(last[0] == b'\n')
}

/// An append target that can be cut back to a previous length.
trait Truncate {
    fn truncate_to(&mut self, len: u64) -> io::Result<()>;
}

impl Truncate for File {
    fn truncate_to(&mut self, len: u64) -> io::Result<()> {
        self.set_len(len)
    }
}

/// Writes `record` with a single `write_all` and flushes it.
///
/// If either fails, the target is truncated back to `len` so no partial
/// record is left behind for the next append to run into.
fn write_or_rollback<F: Write + Truncate>(file: &mut F, len: u64, record: &[u8]) -> io::Result<()> {
    let result = file.write_all(record).and_then(|()| file.flush());
    if result.is_err()
        && let Err(e) = file.truncate_to(len)
    {
        tracing::warn!("failed to truncate partial append: {e}");
    }
    result
}
