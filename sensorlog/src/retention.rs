//! Bounded in-memory windows of the most recent readings per sensor.
//!
//! A [`RetentionBuffer`] holds at most `capacity` readings in insertion
//! order; recording past capacity evicts the oldest reading. A
//! [`RetentionMap`] owns one buffer per sensor, created lazily on first use.
//!
//! Buffers are a cache of the tail of each sensor's partitions. They are
//! never persisted and can be rebuilt from storage with [`RetentionMap::seed`].
//!
//! # Thread Safety
//!
//! [`RetentionMap`] is sharded: each shard is an `RwLock`ed map from sensor
//! name to an `Arc<Mutex<RetentionBuffer>>`. The shard lock is only held to
//! look up or insert a buffer; all buffer mutation happens under that
//! sensor's own mutex, so different sensors never serialize each other.

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::locks::shard_index;
use crate::reading::Reading;

/// Number of shards in a [`RetentionMap`].
const SHARD_COUNT: usize = 16;

/// A bounded, insertion-ordered window of readings.
#[derive(Debug, Clone)]
pub struct RetentionBuffer {
    readings: VecDeque<Reading>,
    capacity: usize,
}

impl RetentionBuffer {
    /// Creates an empty buffer holding at most `capacity` readings (at least one).
    pub fn new(capacity: usize) -> Self {
        Self {
            readings: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    /// Appends a reading, evicting the oldest one if the buffer is full.
    ///
    /// Returns the evicted reading, if any.
    pub fn record(&mut self, reading: Reading) -> Option<Reading> {
        self.readings.push_back(reading);
        if self.readings.len() > self.capacity {
            self.readings.pop_front()
        } else {
            None
        }
    }

    /// Reverts the most recent [`record`](Self::record).
    ///
    /// `evicted` must be the value that call returned.
    pub fn undo_record(&mut self, evicted: Option<Reading>) {
        self.readings.pop_back();
        if let Some(evicted) = evicted {
            self.readings.push_front(evicted);
        }
    }

    /// Replaces the contents with the last `capacity` of `readings`.
    pub fn replace<I>(&mut self, readings: I)
    where
        I: IntoIterator<Item = Reading>,
    {
        self.readings.clear();
        for reading in readings {
            self.record(reading);
        }
    }

    /// Returns the buffered readings, oldest first.
    pub fn snapshot(&self) -> Vec<Reading> {
        self.readings.iter().copied().collect()
    }

    /// Returns the number of buffered readings.
    pub fn len(&self) -> usize {
        self.readings.len()
    }

    /// Returns `true` if nothing is buffered.
    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    /// Returns the maximum number of buffered readings.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

type Shard = RwLock<HashMap<String, Arc<Mutex<RetentionBuffer>>>>;

/// Per-sensor retention buffers with per-sensor locking.
#[derive(Debug)]
pub struct RetentionMap {
    shards: Vec<Shard>,
    capacity: usize,
}

impl RetentionMap {
    /// Creates an empty map whose buffers each hold `capacity` readings.
    pub fn new(capacity: usize) -> Self {
        Self {
            shards: (0..SHARD_COUNT).map(|_| RwLock::new(HashMap::new())).collect(),
            capacity: capacity.max(1),
        }
    }

    /// Returns the capacity of each buffer.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Records a reading for `sensor`, creating its buffer if needed.
    ///
    /// Returns the evicted reading, if any.
    pub fn record(&self, sensor: &str, reading: Reading) -> Option<Reading> {
        self.with_buffer(sensor, |buffer| buffer.record(reading))
    }

    /// Runs `f` on the buffer for `sensor` while holding that sensor's lock.
    ///
    /// The buffer is created if it does not exist yet.
    pub fn with_buffer<R>(&self, sensor: &str, f: impl FnOnce(&mut RetentionBuffer) -> R) -> R {
        let buffer = self.buffer(sensor);
        let mut guard = buffer.lock();
        f(&mut *guard)
    }

    /// Returns the readings buffered for `sensor`, oldest first.
    ///
    /// Unknown sensors yield an empty vector.
    pub fn snapshot(&self, sensor: &str) -> Vec<Reading> {
        self.existing(sensor)
            .map(|buffer| buffer.lock().snapshot())
            .unwrap_or_default()
    }

    /// Returns the number of readings buffered for `sensor`.
    pub fn len(&self, sensor: &str) -> usize {
        self.existing(sensor).map_or(0, |buffer| buffer.lock().len())
    }

    /// Returns every sensor with at least one buffered reading.
    pub fn sensors(&self) -> BTreeSet<String> {
        let mut sensors = BTreeSet::new();
        for shard in &self.shards {
            for (name, buffer) in shard.read().iter() {
                if !buffer.lock().is_empty() {
                    sensors.insert(name.clone());
                }
            }
        }
        sensors
    }

    /// Rebuilds the buffer for `sensor` from `readings`, keeping the newest `capacity`.
    pub fn seed<I>(&self, sensor: &str, readings: I)
    where
        I: IntoIterator<Item = Reading>,
    {
        self.with_buffer(sensor, |buffer| buffer.replace(readings));
    }

    fn shard(&self, sensor: &str) -> &Shard {
        &self.shards[shard_index(sensor, self.shards.len())]
    }

    fn existing(&self, sensor: &str) -> Option<Arc<Mutex<RetentionBuffer>>> {
        self.shard(sensor).read().get(sensor).cloned()
    }

    fn buffer(&self, sensor: &str) -> Arc<Mutex<RetentionBuffer>> {
        if let Some(buffer) = self.existing(sensor) {
            return buffer;
        }
        let mut shard = self.shard(sensor).write();
        Arc::clone(
            shard
                .entry(sensor.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(RetentionBuffer::new(self.capacity)))),
        )
    }
}
