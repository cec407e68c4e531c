//! Storage contract for ring buffer slots.
//!
//! A backend owns a fixed number of addressable slots sized by a [`Span`].
//! The ring buffer decides *which* slot a record goes to; the backend only
//! stores, clears, evicts and traverses. Backends are selected with a
//! [`StorageType`] tag:
//!
//! - [`StorageType::Memory`] → [`MemoryStorage`], an eagerly allocated array
//! - [`StorageType::Null`] → [`NullStorage`], retains nothing
//! - [`StorageType::File`] → reserved for a persistent backend; selecting it
//!   fails with [`ConfigError::UnknownStorage`]
//!
//! # Traversal order
//!
//! Traversals are anchored at the slot holding the newest record. Within one
//! generation, slots are visited from just after the anchor to the end of the
//! array, then from the start up to and including the anchor:
//!
//! ```text
//! anchor = 2, capacity = 6
//!
//!   index:   0   1   2   3   4   5
//!   visit:   3rd 4th 5th 0th 1st 2nd      → 3, 4, 5, 0, 1, 2
//! ```
//!
//! The previous generation is visited first, then the anchor's own, which
//! yields oldest-to-newest order across a physically circular layout.

use std::fmt;
use std::str::FromStr;
use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};
use crate::memory::MemoryStorage;
use crate::null::NullStorage;
use crate::record::Timestamped;
use crate::span::Span;

/// A fixed set of addressable slots holding records of type `T`.
///
/// Slot indices passed in by the ring buffer are always computed from this
/// backend's own [`Span`], so they fall in `[0, span().capacity())`.
pub trait Storage<T: Timestamped> {
    /// Returns the period/resolution this backend was sized for.
    fn span(&self) -> Span;

    /// Returns the number of slots the backend can hold.
    fn capacity(&self) -> usize;

    /// Returns the record in slot `index`, if any.
    fn at(&self, index: usize) -> Option<&T>;

    /// Returns the record in slot `index` for in-place mutation, if any.
    fn at_mut(&mut self, index: usize) -> Option<&mut T>;

    /// Stores `record` in slot `index`, replacing any occupant.
    ///
    /// # Errors
    ///
    /// Backend-specific; surfaced unchanged by the ring buffer.
    fn put(&mut self, index: usize, record: T) -> Result<()>;

    /// Clears slot `index`.
    ///
    /// # Errors
    ///
    /// Backend-specific; surfaced unchanged by the ring buffer.
    fn remove_at(&mut self, index: usize) -> Result<()>;

    /// Clears every record whose sequence is below `sequence`, returning how
    /// many were removed.
    fn removes_older(&mut self, sequence: i64) -> usize;

    /// Calls `f` for every record admitted by `window`, oldest first.
    fn each(&self, window: &Window, f: &mut dyn FnMut(&T));

    /// Calls `f` for every record admitted by `window`, oldest first, until
    /// `f` returns `false`.
    fn walk(&self, window: &Window, f: &mut dyn FnMut(&T) -> bool);
}

/// Selects the storage backend a ring buffer is created with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum StorageType {
    /// Keeps no history; only the buffer's latest record survives.
    Null,
    /// Array-backed in-memory slots.
    #[default]
    Memory,
    /// Persistent slots. Not implemented.
    File,
}

impl StorageType {
    /// Returns the lowercase name used in configs and on the command line.
    pub fn as_str(self) -> &'static str {
        match self {
            StorageType::Null => "null",
            StorageType::Memory => "memory",
            StorageType::File => "file",
        }
    }

    /// Creates the backend this tag names, sized for `(period, resolution)`.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::UnknownStorage`] for [`StorageType::File`]
    /// - [`ConfigError::InvalidResolution`] / [`ConfigError::InvalidPeriod`]
    ///   if the parameters are rejected by [`Span::new`]
    ///
    /// # Examples
    ///
    /// ```rust
    /// use std::time::Duration;
    /// use epochring::{Datum, Storage, StorageType};
    ///
    /// # fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let storage = StorageType::Memory
    ///     .build::<Datum>(Duration::from_secs(60), Duration::from_secs(5))?;
    /// assert_eq!(storage.capacity(), 12);
    /// # Ok(())
    /// # }
    /// ```
    pub fn build<T: Timestamped + 'static>(
        self,
        period: Duration,
        resolution: Duration,
    ) -> Result<Box<dyn Storage<T>>> {
        match self {
            StorageType::Null => Ok(Box::new(NullStorage::new(period, resolution)?)),
            StorageType::Memory => Ok(Box::new(MemoryStorage::new(period, resolution)?)),
            StorageType::File => Err(ConfigError::UnknownStorage {
                name: self.as_str().to_string(),
            }
            .into()),
        }
    }
}

impl fmt::Display for StorageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StorageType {
    type Err = ConfigError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "null" => Ok(StorageType::Null),
            "memory" | "mem" => Ok(StorageType::Memory),
            "file" => Ok(StorageType::File),
            _ => Err(ConfigError::UnknownStorage {
                name: s.to_string(),
            }),
        }
    }
}

impl TryFrom<String> for StorageType {
    type Error = ConfigError;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        value.parse()
    }
}

/// The live window a traversal reports, anchored at the newest record.
///
/// A record is admitted when its sequence is the anchor's generation or the
/// one before it, and its timestamp is strictly after [`Window::since`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    anchor: usize,
    sequence: i64,
    since: Option<SystemTime>,
}

impl Window {
    /// Builds the window ending at the newest record.
    ///
    /// # Arguments
    ///
    /// * `span` - Span of the storage being traversed
    /// * `anchor` - Slot index of the newest record
    /// * `sequence` - Generation of the newest record
    /// * `latest` - Timestamp of the newest record
    pub fn new(span: &Span, anchor: usize, sequence: i64, latest: SystemTime) -> Self {
        Self {
            anchor,
            sequence,
            since: span.window_start(latest),
        }
    }

    /// Returns the slot index the traversal is anchored at.
    pub fn anchor(&self) -> usize {
        self.anchor
    }

    /// Returns the newest generation in the window.
    pub fn sequence(&self) -> i64 {
        self.sequence
    }

    /// Returns the exclusive lower time bound, if representable.
    pub fn since(&self) -> Option<SystemTime> {
        self.since
    }

    /// Returns the generations to visit, oldest first.
    pub fn generations(&self) -> [i64; 2] {
        [self.sequence - 1, self.sequence]
    }

    /// Returns whether `record` belongs to `generation` and is recent enough.
    pub fn admits<T: Timestamped>(&self, record: &T, generation: i64) -> bool {
        record.sequence() == generation && self.since.is_none_or(|since| record.timestamp() > since)
    }

    /// Returns slot indices in traversal order for an array of `capacity`.
    ///
    /// An anchor beyond the array (after swapping in a smaller backend) is
    /// clamped to the last slot so every slot is still visited once.
    pub fn slot_order(&self, capacity: usize) -> impl Iterator<Item = usize> + use<> {
        let anchor = self.anchor.min(capacity.saturating_sub(1));
        let head = if capacity == 0 { 0..0 } else { 0..anchor + 1 };
        (anchor + 1..capacity).chain(head)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Datum;
    use std::time::UNIX_EPOCH;

    fn span() -> Span {
        Span::new(Duration::from_secs(10), Duration::from_secs(2)).unwrap()
    }

    #[test]
    fn test_storage_type_parse() {
        assert_eq!("memory".parse::<StorageType>().unwrap(), StorageType::Memory);
        assert_eq!("MEM".parse::<StorageType>().unwrap(), StorageType::Memory);
        assert_eq!("null".parse::<StorageType>().unwrap(), StorageType::Null);
        assert_eq!("file".parse::<StorageType>().unwrap(), StorageType::File);

        let err = "redis".parse::<StorageType>().unwrap_err();
        assert!(matches!(err, ConfigError::UnknownStorage { ref name } if name == "redis"));
    }

    #[test]
    fn test_storage_type_serde() {
        let json = serde_json::to_string(&StorageType::Null).unwrap();
        assert_eq!(json, "\"null\"");
        let parsed: StorageType = serde_json::from_str("\"memory\"").unwrap();
        assert_eq!(parsed, StorageType::Memory);
        assert!(serde_json::from_str::<StorageType>("\"tape\"").is_err());
    }

    #[test]
    fn test_build_backends() {
        let mem = StorageType::Memory
            .build::<Datum>(Duration::from_secs(10), Duration::from_secs(2))
            .unwrap();
        assert_eq!(mem.capacity(), 5);

        let null = StorageType::Null
            .build::<Datum>(Duration::from_secs(10), Duration::from_secs(2))
            .unwrap();
        assert_eq!(null.capacity(), usize::MAX);
    }

    #[test]
    fn test_build_file_is_unknown() {
        let err = StorageType::File
            .build::<Datum>(Duration::from_secs(10), Duration::from_secs(2))
            .err()
            .unwrap();
        assert!(matches!(
            err,
            crate::EpochRingError::Config(ConfigError::UnknownStorage { .. })
        ));
    }

    #[test]
    fn test_build_propagates_span_errors() {
        let err = StorageType::Null
            .build::<Datum>(Duration::from_secs(10), Duration::from_millis(10))
            .err()
            .unwrap();
        assert!(matches!(
            err,
            crate::EpochRingError::Config(ConfigError::InvalidResolution { .. })
        ));
    }

    #[test]
    fn test_slot_order_wraps_after_anchor() {
        let window = Window::new(&span(), 2, 0, UNIX_EPOCH + Duration::from_secs(100));
        let order: Vec<_> = window.slot_order(6).collect();
        assert_eq!(order, vec![3, 4, 5, 0, 1, 2]);

        let window = Window::new(&span(), 5, 0, UNIX_EPOCH + Duration::from_secs(100));
        let order: Vec<_> = window.slot_order(6).collect();
        assert_eq!(order, vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_slot_order_clamps_anchor() {
        let window = Window::new(&span(), 9, 0, UNIX_EPOCH + Duration::from_secs(100));
        let order: Vec<_> = window.slot_order(4).collect();
        assert_eq!(order, vec![0, 1, 2, 3]);
        assert_eq!(window.slot_order(0).count(), 0);
    }

    #[test]
    fn test_window_admits() {
        let latest = UNIX_EPOCH + Duration::from_secs(100);
        let window = Window::new(&span(), 0, 10, latest);
        assert_eq!(window.generations(), [9, 10]);
        assert_eq!(window.since(), Some(UNIX_EPOCH + Duration::from_secs(89)));

        let mut inside = Datum::new(UNIX_EPOCH + Duration::from_secs(90));
        inside.seq = 9;
        assert!(window.admits(&inside, 9));
        assert!(!window.admits(&inside, 10));

        let mut edge = Datum::new(UNIX_EPOCH + Duration::from_secs(89));
        edge.seq = 8;
        assert!(!window.admits(&edge, 8));
        edge.seq = 9;
        assert!(!window.admits(&edge, 9));
    }
}
