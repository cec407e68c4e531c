//! Record capability required of every payload stored in a ring buffer.
//!
//! The ring buffer knows nothing about payload fields. It only needs a
//! timestamp to position the record, a sequence (generation) number it can
//! assign, and a way to fold a colliding record into the one already stored.
//! [`Datum`] supplies the first three for payloads that embed it.
//!
//! # Precision
//!
//! Positioning works on whole epoch seconds. Two records whose timestamps
//! differ only below the second land on the same slot with the same
//! generation and are treated as a collision, so the later arrival is merged
//! into the earlier one rather than stored separately.

use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::Result;

/// A time-stamped sample that can live in a [`RingBuffer`](crate::RingBuffer).
///
/// `sequence` is owned by the buffer: it is overwritten on every put with
/// `floor(epoch_seconds / period)` and callers should not set it themselves.
///
/// # Example
///
/// ```rust
/// use std::time::SystemTime;
/// use epochring::{Datum, Timestamped};
///
/// #[derive(Debug, Clone)]
/// struct Reading {
///     datum: Datum,
///     celsius: f64,
///     samples: u32,
/// }
///
/// impl Timestamped for Reading {
///     fn timestamp(&self) -> SystemTime {
///         self.datum.timestamp()
///     }
///
///     fn sequence(&self) -> i64 {
///         self.datum.sequence()
///     }
///
///     fn set_sequence(&mut self, sequence: i64) {
///         self.datum.set_sequence(sequence);
///     }
///
///     fn merge(&mut self, other: Self) -> epochring::Result<()> {
///         // Running mean of every reading that fell into this bucket.
///         let total = self.celsius * f64::from(self.samples) + other.celsius;
///         self.samples += 1;
///         self.celsius = total / f64::from(self.samples);
///         Ok(())
///     }
/// }
/// ```
pub trait Timestamped: Sized {
    /// Absolute point in time this record describes.
    fn timestamp(&self) -> SystemTime;

    /// Generation number assigned by the buffer at insertion.
    fn sequence(&self) -> i64;

    /// Assigns the generation number. Called only by the buffer.
    fn set_sequence(&mut self, sequence: i64);

    /// Absorbs `other`, a record that mapped onto this record's slot.
    ///
    /// # Errors
    ///
    /// Any error returned here is handed back unchanged from
    /// [`RingBuffer::put`](crate::RingBuffer::put). Implementations that can
    /// fail should validate before mutating `self`, since the buffer does not
    /// roll back a partially applied merge.
    fn merge(&mut self, other: Self) -> Result<()>;
}

/// Minimal base record carrying the fields every [`Timestamped`] type needs.
///
/// Payload types embed a `Datum` and delegate the accessor methods to it.
/// On its own, a `Datum` keeps the first record of a bucket and ignores
/// later collisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Datum {
    /// Point in time of the sample.
    pub ts: SystemTime,
    /// Generation number, assigned by the buffer.
    pub seq: i64,
}

impl Datum {
    /// Creates a datum for the given timestamp with an unassigned sequence.
    pub fn new(ts: SystemTime) -> Self {
        Self { ts, seq: 0 }
    }

    /// Returns the timestamp as whole epoch seconds.
    pub fn epoch(&self) -> i64 {
        epoch_seconds(self.ts)
    }
}

impl Timestamped for Datum {
    fn timestamp(&self) -> SystemTime {
        self.ts
    }

    fn sequence(&self) -> i64 {
        self.seq
    }

    fn set_sequence(&mut self, sequence: i64) {
        self.seq = sequence;
    }

    fn merge(&mut self, _other: Self) -> Result<()> {
        Ok(())
    }
}

/// Converts a timestamp to whole seconds since 1970-01-01T00:00:00Z.
///
/// Sub-second precision is dropped by flooring, so any instant before the
/// epoch, however close, yields a negative value. Values beyond the `i64`
/// range saturate.
pub fn epoch_seconds(ts: SystemTime) -> i64 {
    match ts.duration_since(UNIX_EPOCH) {
        Ok(after) => i64::try_from(after.as_secs()).unwrap_or(i64::MAX),
        Err(err) => {
            let before = err.duration();
            let whole = i64::try_from(before.as_secs()).unwrap_or(i64::MAX);
            if before.subsec_nanos() > 0 {
                -whole.saturating_add(1)
            } else {
                -whole
            }
        }
    }
}
