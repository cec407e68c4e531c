//! Error types for the epochring time-window buffer.

use std::time::Duration;

use thiserror::Error;

/// The main error type for all epochring operations.
///
/// Construction failures arrive as [`ConfigError`], write-path failures as
/// [`RecordError`], and backend failures as [`StorageError`]. Errors returned
/// by a payload's own merge routine are passed through exactly as the payload
/// produced them.
#[derive(Error, Debug)]
pub enum EpochRingError {
    /// Error validating buffer parameters or selecting a storage backend.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// Error during a put (write path).
    #[error("record error: {0}")]
    Record(#[from] RecordError),

    /// Error reported by a storage backend.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Errors that can occur while validating parameters or constructing a buffer.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Resolution is finer than one second.
    #[error("invalid resolution {resolution:?}: must be at least 1s")]
    InvalidResolution {
        /// The rejected resolution.
        resolution: Duration,
    },

    /// Period does not exceed the resolution.
    #[error("invalid period {period:?}: must be greater than resolution {resolution:?}")]
    InvalidPeriod {
        /// The rejected period.
        period: Duration,
        /// The resolution it was compared against.
        resolution: Duration,
    },

    /// The requested storage type has no backend.
    #[error("unknown storage type '{name}'")]
    UnknownStorage {
        /// Name of the storage type that was requested.
        name: String,
    },

    /// A serialized configuration could not be parsed.
    #[error("failed to parse buffer config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Errors that can occur while putting a record into a buffer.
#[derive(Error, Debug)]
pub enum RecordError {
    /// The record's timestamp falls before the Unix epoch.
    #[error("timestamp out of range: epoch second {epoch} is before 1970-01-01T00:00:00Z")]
    OutOfRange {
        /// Whole epoch seconds of the rejected timestamp.
        epoch: i64,
    },

    /// A payload refused to absorb a colliding record.
    #[error("merge rejected at epoch second {epoch}: {reason}")]
    MergeRejected {
        /// Epoch second of the incoming record.
        epoch: i64,
        /// Why the payload refused the merge.
        reason: String,
    },
}

/// Errors that can occur inside a storage backend.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Slot index lies outside the backend's capacity.
    #[error("slot {index} out of bounds for capacity {capacity}")]
    SlotOutOfBounds {
        /// The requested slot.
        index: usize,
        /// The backend's slot count.
        capacity: usize,
    },
}

/// Type alias for `Result<T, EpochRingError>`.
pub type Result<T> = std::result::Result<T, EpochRingError>;
