//! Period/resolution arithmetic shared by every storage backend.
//!
//! A [`Span`] turns a `(period, resolution)` pair into a slot count and maps
//! epoch seconds onto `(generation, slot)` positions:
//!
//! ```text
//! capacity = ceil(period / resolution)
//! period'  = capacity * resolution          (rounded up when inexact)
//!
//! sequence = epoch / period'
//! index    = (epoch % period') / resolution
//! ```
//!
//! The slot array is reused every `period'` seconds; `sequence` is what
//! tells two writes to the same slot apart.

use std::time::{Duration, SystemTime};

use crate::error::{ConfigError, RecordError, Result};

/// Smallest supported resolution.
const MIN_RESOLUTION: Duration = Duration::from_secs(1);

/// Validated period and resolution, both in whole seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Span {
    /// Period in seconds, rounded up to a whole number of buckets.
    period: i64,
    /// Bucket width in seconds.
    resolution: i64,
    /// Number of buckets.
    capacity: usize,
}

/// Where an epoch second lands in the ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Position {
    /// Generation: how many full periods precede this epoch second.
    pub sequence: i64,
    /// Slot index in `[0, capacity)`.
    pub index: usize,
}

impl Span {
    /// Validates the parameters and derives the slot count.
    ///
    /// Both durations are truncated to whole seconds before the capacity is
    /// computed. If `period` is not a multiple of `resolution`, the period is
    /// rounded up so the last bucket has full width.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::InvalidResolution`] if `resolution` is below one second
    /// - [`ConfigError::InvalidPeriod`] if `resolution >= period`, or the
    ///   period is too large to address
    ///
    /// # Examples
    ///
    /// ```rust
    /// use std::time::Duration;
    /// use epochring::Span;
    ///
    /// # fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let span = Span::new(Duration::from_secs(7200), Duration::from_secs(2))?;
    /// assert_eq!(span.capacity(), 3600);
    ///
    /// // 10s at 3s resolution needs 4 buckets, so the period grows to 12s.
    /// let span = Span::new(Duration::from_secs(10), Duration::from_secs(3))?;
    /// assert_eq!(span.capacity(), 4);
    /// assert_eq!(span.period_secs(), 12);
    /// # Ok(())
    /// # }
    /// ```
    pub fn new(period: Duration, resolution: Duration) -> Result<Self> {
        if resolution < MIN_RESOLUTION {
            return Err(ConfigError::InvalidResolution { resolution }.into());
        }
        if resolution >= period {
            return Err(ConfigError::InvalidPeriod { period, resolution }.into());
        }

        let invalid_period = || ConfigError::InvalidPeriod { period, resolution };
        let mut period_secs = i64::try_from(period.as_secs()).map_err(|_| invalid_period())?;
        let resolution_secs =
            i64::try_from(resolution.as_secs()).map_err(|_| invalid_period())?;
        // Sub-second parts are dropped, which can collapse the two.
        if period_secs <= resolution_secs {
            return Err(invalid_period().into());
        }

        let mut buckets = period_secs / resolution_secs;
        if period_secs % resolution_secs != 0 {
            buckets += 1;
            period_secs = buckets
                .checked_mul(resolution_secs)
                .ok_or_else(invalid_period)?;
        }
        let capacity = usize::try_from(buckets).map_err(|_| invalid_period())?;

        Ok(Self {
            period: period_secs,
            resolution: resolution_secs,
            capacity,
        })
    }

    /// Returns the (rounded-up) period in seconds.
    pub fn period_secs(&self) -> i64 {
        self.period
    }

    /// Returns the bucket width in seconds.
    pub fn resolution_secs(&self) -> i64 {
        self.resolution
    }

    /// Returns the (rounded-up) period as a duration.
    pub fn period(&self) -> Duration {
        Duration::from_secs(self.period.unsigned_abs())
    }

    /// Returns the bucket width as a duration.
    pub fn resolution(&self) -> Duration {
        Duration::from_secs(self.resolution.unsigned_abs())
    }

    /// Returns the number of slots.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the unit the period and resolution are counted in.
    pub fn unit(&self) -> Duration {
        Duration::from_secs(1)
    }

    /// Maps an epoch second to its generation and slot.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::OutOfRange`] if `epoch` is negative.
    #[inline]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)] // Bounded by capacity (a usize)
    pub fn position(&self, epoch: i64) -> Result<Position> {
        if epoch < 0 {
            return Err(RecordError::OutOfRange { epoch }.into());
        }

        Ok(Position {
            sequence: epoch / self.period,
            index: ((epoch % self.period) / self.resolution) as usize,
        })
    }

    /// Returns the exclusive lower bound of the window ending at `latest`.
    ///
    /// The window is inclusive of the instant exactly one period before
    /// `latest`, so the bound sits one unit further back. Returns `None` when
    /// the bound is not representable, in which case nothing is excluded.
    pub fn window_start(&self, latest: SystemTime) -> Option<SystemTime> {
        latest.checked_sub(self.period() + self.unit())
    }
}
