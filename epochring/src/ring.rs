//! Time-window ring buffer.
//!
//! This module maps records onto storage slots by wall-clock time and keeps
//! track of the newest record seen so far (the *frontier*).
//!
//! # Key Features
//!
//! - Slot and generation computed from the record's timestamp
//! - Merge-on-collision for late or duplicate arrivals in an occupied bucket
//! - Natural eviction: a newer generation overwrites its slot's previous occupant
//! - Explicit eviction of anything older than the previous generation ([`RingBuffer::vacuum`])
//! - Oldest-to-newest traversal over a physically circular layout
//!
//! # Design
//!
//! The ring buffer is a thin coordinator over a [`Storage`] backend:
//! - Slot computation: `index = (epoch % period) / resolution`
//! - Generation: `sequence = epoch / period`
//! - Frontier: epoch, slot and generation of the newest record, plus a cached
//!   copy of that record so [`RingBuffer::latest`] works even with
//!   [`StorageType::Null`]
//! - The backend slot stays the owner of every stored record; the cached copy
//!   is refreshed whenever a merge mutates the frontier slot

use std::fmt;
use std::time::Duration;

use tracing::{debug, trace};

use crate::config::BufferConfig;
use crate::error::Result;
use crate::record::{Timestamped, epoch_seconds};
use crate::span::{Position, Span};
use crate::storage::{Storage, StorageType, Window};

/// Position of the newest record observed by a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Frontier {
    /// Highest epoch second put so far.
    pub epoch: i64,
    /// Slot holding the record with that epoch.
    pub index: usize,
    /// Generation of that record.
    pub sequence: i64,
}

/// A fixed-capacity, time-indexed circular buffer.
///
/// Records are positioned by their timestamp, so the buffer always describes
/// the most recent `period` of wall-clock time regardless of how many records
/// arrive.
///
/// # Thread Safety
///
/// RingBuffer is single-threaded: it takes no locks and traversals
/// read slots in place. Wrap it in your own mutex to share it.
///
/// # Examples
///
/// ```rust
/// use std::time::{Duration, UNIX_EPOCH};
/// use epochring::{Datum, RingBuffer, StorageType};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let mut ring: RingBuffer<Datum> = RingBuffer::new(
///     Duration::from_secs(3600),
///     Duration::from_secs(1),
///     StorageType::Memory,
/// )?;
///
/// let base = UNIX_EPOCH + Duration::from_secs(1_700_000_000);
/// for i in 0..5 {
///     ring.put(Datum::new(base + Duration::from_secs(i)))?;
/// }
///
/// let mut count = 0;
/// ring.each(|_| count += 1);
/// assert_eq!(count, 5);
/// assert_eq!(ring.latest().map(|d| d.ts), Some(base + Duration::from_secs(4)));
/// # Ok(())
/// # }
/// ```
pub struct RingBuffer<T> {
    /// Newest position observed, `None` until the first non-collision put.
    frontier: Option<Frontier>,
    /// Copy of the record at the frontier.
    latest: Option<T>,
    /// Slot backend.
    storage: Box<dyn Storage<T>>,
}

impl<T: Timestamped + Clone + 'static> RingBuffer<T> {
    /// Creates a buffer covering `period` at `resolution`, backed by the
    /// selected storage type.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::UnknownStorage`](crate::error::ConfigError::UnknownStorage)
    ///   for a storage type with no backend
    /// - [`ConfigError::InvalidResolution`](crate::error::ConfigError::InvalidResolution)
    ///   if `resolution` is below one second
    /// - [`ConfigError::InvalidPeriod`](crate::error::ConfigError::InvalidPeriod)
    ///   if `resolution >= period`
    pub fn new(period: Duration, resolution: Duration, storage_type: StorageType) -> Result<Self> {
        let storage = storage_type.build::<T>(period, resolution)?;
        debug!(
            storage = %storage_type,
            period_secs = storage.span().period_secs(),
            resolution_secs = storage.span().resolution_secs(),
            capacity = storage.capacity(),
            "created ring buffer"
        );
        Ok(Self::with_storage(storage))
    }

    /// Creates a buffer from a [`BufferConfig`].
    ///
    /// # Errors
    ///
    /// Same as [`RingBuffer::new`].
    pub fn from_config(config: &BufferConfig) -> Result<Self> {
        Self::new(config.period, config.resolution, config.storage)
    }

    /// Creates an empty buffer over an existing backend.
    pub fn with_storage(storage: Box<dyn Storage<T>>) -> Self {
        Self {
            frontier: None,
            latest: None,
            storage,
        }
    }

    /// Returns the number of slots in the attached backend.
    pub fn capacity(&self) -> usize {
        self.storage.capacity()
    }

    /// Returns the span of the attached backend.
    pub fn span(&self) -> Span {
        self.storage.span()
    }

    /// Returns the newest record put so far, if any.
    pub fn latest(&self) -> Option<&T> {
        self.latest.as_ref()
    }

    /// Returns the position of the newest record, if any.
    pub fn frontier(&self) -> Option<Frontier> {
        self.frontier
    }

    /// Returns the attached backend.
    pub fn storage(&self) -> &dyn Storage<T> {
        self.storage.as_ref()
    }

    /// Swaps in a different backend and returns the previous one.
    ///
    /// Stored records are not migrated. The frontier and latest record are
    /// kept, so traversals continue to anchor at the same slot index.
    pub fn attach_storage(&mut self, storage: Box<dyn Storage<T>>) -> Box<dyn Storage<T>> {
        debug!(
            capacity = storage.capacity(),
            period_secs = storage.span().period_secs(),
            "attached storage"
        );
        std::mem::replace(&mut self.storage, storage)
    }

    /// Puts a record into the buffer.
    ///
    /// The record's sequence is overwritten with its generation. Then:
    ///
    /// - If the record is not newer than the frontier and its slot is
    ///   occupied, the occupant absorbs it through [`Timestamped::merge`].
    ///   The frontier does not move.
    /// - Otherwise the record is written to its slot, replacing any earlier
    ///   generation stored there. If it is newer than the frontier, it
    ///   becomes the new frontier.
    ///
    /// Timestamps are truncated to whole seconds before positioning, so two
    /// records within the same second always collide.
    ///
    /// # Errors
    ///
    /// - [`RecordError::OutOfRange`](crate::error::RecordError::OutOfRange) if
    ///   the timestamp is before the Unix epoch; the buffer is left unchanged
    /// - Whatever the occupant's `merge` returns, unchanged
    /// - Whatever the backend's slot write returns, unchanged; the frontier
    ///   is left unchanged
    pub fn put(&mut self, mut record: T) -> Result<()> {
        let epoch = epoch_seconds(record.timestamp());
        let Position { sequence, index } = self.storage.span().position(epoch)?;
        record.set_sequence(sequence);

        let advances = self.frontier.is_none_or(|frontier| epoch > frontier.epoch);
        if !advances {
            if let Some(occupant) = self.storage.at_mut(index) {
                trace!(epoch, index, sequence, "merging colliding record");
                let merged = occupant.merge(record);
                self.refresh_latest(index);
                return merged;
            }

            trace!(epoch, index, sequence, "storing late record behind frontier");
            return self.storage.put(index, record);
        }

        let latest = record.clone();
        self.storage.put(index, record)?;
        self.frontier = Some(Frontier {
            epoch,
            index,
            sequence,
        });
        self.latest = Some(latest);

        Ok(())
    }

    /// Re-reads the cached latest record after its slot was merged into.
    fn refresh_latest(&mut self, index: usize) {
        let Some(frontier) = self.frontier else {
            return;
        };
        if frontier.index != index {
            return;
        }

        if let Some(record) = self.storage.at(index)
            && record.sequence() == frontier.sequence
            && epoch_seconds(record.timestamp()) == frontier.epoch
        {
            self.latest = Some(record.clone());
        }
    }

    /// Removes every stored record older than the previous generation.
    ///
    /// Only the frontier's generation and the one immediately before it
    /// survive. Returns the number of records removed; zero before the first
    /// put.
    ///
    /// # Errors
    ///
    /// Reserved for backend failures; the bundled backends never fail here.
    pub fn vacuum(&mut self) -> Result<usize> {
        let Some(frontier) = self.frontier else {
            return Ok(0);
        };

        let removed = self.storage.removes_older(frontier.sequence - 1);
        debug!(
            removed,
            keep_from_sequence = frontier.sequence - 1,
            "vacuumed stale generations"
        );
        Ok(removed)
    }

    /// Calls `f` for every record in the live window, oldest first.
    ///
    /// The window covers the frontier's generation and the one before it,
    /// limited to records no more than one period older than the latest
    /// record. Does nothing before the first put.
    pub fn each<F: FnMut(&T)>(&self, mut f: F) {
        if let Some(window) = self.window() {
            self.storage.each(&window, &mut f);
        }
    }

    /// Like [`RingBuffer::each`], but stops as soon as `f` returns `false`.
    ///
    /// A stop ends the whole traversal: no later record is visited, whether it
    /// belongs to the same generation or the next.
    pub fn walk<F: FnMut(&T) -> bool>(&self, mut f: F) {
        if let Some(window) = self.window() {
            self.storage.walk(&window, &mut f);
        }
    }

    /// Builds the traversal window anchored at the frontier.
    fn window(&self) -> Option<Window> {
        let frontier = self.frontier?;
        let latest = self.latest.as_ref()?;
        Some(Window::new(
            &self.storage.span(),
            frontier.index,
            latest.sequence(),
            latest.timestamp(),
        ))
    }
}

impl<T> fmt::Debug for RingBuffer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RingBuffer")
            .field("frontier", &self.frontier)
            .field("has_latest", &self.latest.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{EpochRingError, RecordError};
    use crate::memory::MemoryStorage;
    use crate::record::Datum;
    use std::time::{SystemTime, UNIX_EPOCH};

    /// Test payload that counts merges and can be told to refuse them.
    #[derive(Debug, Clone)]
    struct Reading {
        datum: Datum,
        value: i64,
        merges: u32,
        refuse: bool,
    }

    impl Reading {
        fn new(secs: u64, value: i64) -> Self {
            Self {
                datum: Datum::new(at(secs)),
                value,
                merges: 0,
                refuse: false,
            }
        }
    }

    impl Timestamped for Reading {
        fn timestamp(&self) -> SystemTime {
            self.datum.timestamp()
        }

        fn sequence(&self) -> i64 {
            self.datum.sequence()
        }

        fn set_sequence(&mut self, sequence: i64) {
            self.datum.set_sequence(sequence);
        }

        fn merge(&mut self, other: Self) -> Result<()> {
            if self.refuse {
                return Err(RecordError::MergeRejected {
                    epoch: other.datum.epoch(),
                    reason: "refusing".to_string(),
                }
                .into());
            }
            self.value += other.value;
            self.merges += 1;
            Ok(())
        }
    }

    fn at(secs: u64) -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(secs)
    }

    /// 10 slots of 1 second.
    fn create_test_ring() -> RingBuffer<Reading> {
        RingBuffer::new(Duration::from_secs(10), Duration::from_secs(1), StorageType::Memory).unwrap()
    }

    fn values(ring: &RingBuffer<Reading>) -> Vec<i64> {
        let mut out = Vec::new();
        ring.each(|r| out.push(r.value));
        out
    }

    #[test]
    fn test_empty_buffer() {
        let ring = create_test_ring();
        assert_eq!(ring.capacity(), 10);
        assert!(ring.latest().is_none());
        assert!(ring.frontier().is_none());
        assert!(values(&ring).is_empty());

        let mut called = false;
        ring.walk(|_| {
            called = true;
            true
        });
        assert!(!called);
    }

    #[test]
    fn test_single_put() {
        let mut ring = create_test_ring();
        ring.put(Reading::new(103, 1)).unwrap();

        let latest = ring.latest().unwrap();
        assert_eq!(latest.value, 1);
        assert_eq!(latest.sequence(), 10);
        assert_eq!(
            ring.frontier(),
            Some(Frontier {
                epoch: 103,
                index: 3,
                sequence: 10
            })
        );
    }

    #[test]
    fn test_put_assigns_sequence() {
        let mut ring = create_test_ring();
        let mut reading = Reading::new(25, 1);
        reading.datum.seq = 999;
        ring.put(reading).unwrap();
        assert_eq!(ring.storage().at(5).unwrap().sequence(), 2);
    }

    #[test]
    fn test_out_of_range_leaves_state() {
        let mut ring = create_test_ring();
        ring.put(Reading::new(50, 1)).unwrap();

        let mut early = Reading::new(0, 2);
        early.datum.ts = UNIX_EPOCH - Duration::from_secs(1);
        let err = ring.put(early).unwrap_err();
        assert!(matches!(
            err,
            EpochRingError::Record(RecordError::OutOfRange { epoch: -1 })
        ));
        assert_eq!(ring.frontier().unwrap().epoch, 50);
        assert_eq!(values(&ring), vec![1]);
    }

    #[test]
    fn test_collision_merges() {
        let mut ring = create_test_ring();
        ring.put(Reading::new(101, 1)).unwrap();
        ring.put(Reading::new(102, 2)).unwrap();

        ring.put(Reading::new(101, 10)).unwrap();

        assert_eq!(values(&ring), vec![11, 2]);
        assert_eq!(ring.storage().at(1).unwrap().merges, 1);
        assert_eq!(ring.frontier().unwrap().epoch, 102);
        assert_eq!(ring.latest().unwrap().value, 2);
    }

    #[test]
    fn test_collision_at_frontier_refreshes_latest() {
        let mut ring = create_test_ring();
        ring.put(Reading::new(101, 1)).unwrap();
        ring.put(Reading::new(101, 5)).unwrap();

        let latest = ring.latest().unwrap();
        assert_eq!(latest.value, 6);
        assert_eq!(latest.merges, 1);
    }

    #[test]
    fn test_subsecond_records_collide() {
        let mut ring = create_test_ring();
        let mut first = Reading::new(0, 1);
        first.datum.ts = at(100) + Duration::from_millis(100);
        let mut second = Reading::new(0, 2);
        second.datum.ts = at(100) + Duration::from_millis(900);

        ring.put(first).unwrap();
        ring.put(second).unwrap();
        assert_eq!(values(&ring), vec![3]);
    }

    #[test]
    fn test_merge_error_propagates() {
        let mut ring = create_test_ring();
        let mut occupant = Reading::new(101, 1);
        occupant.refuse = true;
        ring.put(occupant).unwrap();
        ring.put(Reading::new(105, 2)).unwrap();

        let err = ring.put(Reading::new(101, 3)).unwrap_err();
        assert!(matches!(
            err,
            EpochRingError::Record(RecordError::MergeRejected { epoch: 101, .. })
        ));
        assert_eq!(ring.frontier().unwrap().epoch, 105);
        assert_eq!(values(&ring), vec![1, 2]);
    }

    #[test]
    fn test_late_record_in_empty_slot() {
        let mut ring = create_test_ring();
        ring.put(Reading::new(105, 5)).unwrap();
        ring.put(Reading::new(102, 2)).unwrap();

        assert_eq!(values(&ring), vec![2, 5]);
        assert_eq!(ring.frontier().unwrap().epoch, 105);
        assert_eq!(ring.latest().unwrap().value, 5);
    }

    #[test]
    fn test_wraparound_overwrites_older_generation() {
        let mut ring = create_test_ring();
        for secs in 100..110 {
            ring.put(Reading::new(secs, secs as i64)).unwrap();
        }
        // Generation 11 takes over slots 0..2.
        for secs in 110..113 {
            ring.put(Reading::new(secs, secs as i64)).unwrap();
        }

        assert_eq!(
            values(&ring),
            vec![103, 104, 105, 106, 107, 108, 109, 110, 111, 112]
        );
        assert_eq!(ring.storage().at(0).unwrap().value, 110);
    }

    #[test]
    fn test_older_generation_collision_merges_into_newer_occupant() {
        let mut ring = create_test_ring();
        ring.put(Reading::new(112, 1)).unwrap();
        // Same slot, previous generation, behind the frontier.
        ring.put(Reading::new(102, 7)).unwrap();

        assert_eq!(values(&ring), vec![8]);
        assert_eq!(ring.latest().unwrap().value, 8);
    }

    #[test]
    fn test_vacuum() {
        let mut ring = create_test_ring();
        assert_eq!(ring.vacuum().unwrap(), 0);

        ring.put(Reading::new(105, 1)).unwrap(); // seq 10, slot 5
        ring.put(Reading::new(117, 2)).unwrap(); // seq 11, slot 7
        ring.put(Reading::new(128, 3)).unwrap(); // seq 12, slot 8

        assert_eq!(ring.vacuum().unwrap(), 1);
        assert!(ring.storage().at(5).is_none());
        assert!(ring.storage().at(7).is_some());
        assert!(ring.storage().at(8).is_some());
        assert_eq!(ring.vacuum().unwrap(), 0);
    }

    #[test]
    fn test_walk_stops_early() {
        let mut ring = create_test_ring();
        for secs in 105..115 {
            ring.put(Reading::new(secs, secs as i64)).unwrap();
        }

        let mut seen = Vec::new();
        ring.walk(|r| {
            seen.push(r.value);
            r.value < 107
        });
        assert_eq!(seen, vec![105, 106, 107]);
    }

    #[test]
    fn test_null_storage_keeps_latest_only() {
        let mut ring: RingBuffer<Reading> =
            RingBuffer::new(Duration::from_secs(10), Duration::from_secs(1), StorageType::Null).unwrap();
        assert_eq!(ring.capacity(), usize::MAX);

        ring.put(Reading::new(101, 1)).unwrap();
        ring.put(Reading::new(102, 2)).unwrap();
        // Not newer and the slot reads back empty, so nothing to merge into.
        ring.put(Reading::new(101, 3)).unwrap();

        assert_eq!(ring.latest().unwrap().value, 2);
        assert!(values(&ring).is_empty());
        assert_eq!(ring.vacuum().unwrap(), 0);
    }

    #[test]
    fn test_unknown_storage() {
        let err = RingBuffer::<Reading>::new(
            Duration::from_secs(10),
            Duration::from_secs(1),
            StorageType::File,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            EpochRingError::Config(crate::error::ConfigError::UnknownStorage { .. })
        ));
    }

    #[test]
    fn test_attach_storage() {
        let mut ring = create_test_ring();
        ring.put(Reading::new(101, 1)).unwrap();

        let fresh = MemoryStorage::new(Duration::from_secs(20), Duration::from_secs(2)).unwrap();
        let previous = ring.attach_storage(Box::new(fresh));

        assert_eq!(previous.capacity(), 10);
        assert!(previous.at(1).is_some());
        assert_eq!(ring.capacity(), 10);
        assert_eq!(ring.span().period_secs(), 20);
        assert!(values(&ring).is_empty());
        assert_eq!(ring.latest().unwrap().value, 1);

        ring.put(Reading::new(104, 4)).unwrap();
        assert_eq!(values(&ring), vec![4]);
    }

    #[test]
    fn test_debug_output() {
        let ring = create_test_ring();
        let debug = format!("{ring:?}");
        assert!(debug.starts_with("RingBuffer"));
        assert!(debug.contains("frontier: None"));
    }
}
