//! # epochring
//!
//! Fixed-capacity time-window ring buffer with pluggable slot storage.
//!
//! epochring keeps the most recent stretch of wall-clock time for a telemetry
//! or sensor feed in bounded memory, without an external database. Records
//! are positioned by their timestamp at whole-second resolution, so the
//! buffer always covers a fixed window no matter how fast samples arrive.
//!
//! **Status**: This crate is in early development. The API is not yet stable.
//!
//! ## Key Properties
//!
//! - Slot and generation derived from the timestamp, no write cursor to manage
//! - Merge-on-collision for late or duplicate samples in the same bucket
//! - Bounded, predictable storage: size is set by `period / resolution`
//! - Chronological traversal across the physical wraparound
//! - No background threads, no locks, no hidden allocation after construction
//!
//! ## Quick Start
//!
//! ```rust
//! use std::time::{Duration, SystemTime};
//! use epochring::{Datum, RingBuffer, StorageType};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Two hours of history at 2s resolution: 3600 slots.
//! let mut ring: RingBuffer<Datum> = RingBuffer::new(
//!     Duration::from_secs(2 * 3600),
//!     Duration::from_secs(2),
//!     StorageType::Memory,
//! )?;
//! assert_eq!(ring.capacity(), 3600);
//!
//! ring.put(Datum::new(SystemTime::now()))?;
//! assert!(ring.latest().is_some());
//!
//! // Drop anything older than the previous generation.
//! ring.vacuum()?;
//!
//! ring.each(|datum| println!("{:?}", datum.ts));
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`RingBuffer`]: Positions records, tracks the newest one, merges collisions
//! - [`Timestamped`]: Capability every payload implements; [`Datum`] is the base record
//! - [`Storage`]: Slot backend contract; [`MemoryStorage`] and [`NullStorage`] implement it
//! - [`StorageType`]: Tag selecting a backend
//! - [`Span`]: Period/resolution validation and position math
//! - [`BufferConfig`]: Serializable construction parameters
//!
//! ## Modules
//!
//! - [`ring`]: Ring buffer orchestration and traversal
//! - [`record`]: Record capability and base type
//! - [`storage`]: Storage contract, backend selection, traversal window
//! - [`memory`]: Array-backed backend
//! - [`null`]: No-op backend
//! - [`span`]: Capacity derivation and position mapping
//! - [`config`]: Buffer configuration
//! - [`error`]: Error types

pub mod config;
pub mod error;
pub mod memory;
pub mod null;
pub mod record;
pub mod ring;
pub mod span;
pub mod storage;

// Re-export primary API types at crate root for convenience.
pub use config::BufferConfig;
pub use error::{ConfigError, EpochRingError, RecordError, Result, StorageError};
pub use memory::MemoryStorage;
pub use null::NullStorage;
pub use record::{Datum, Timestamped, epoch_seconds};
pub use ring::{Frontier, RingBuffer};
pub use span::{Position, Span};
pub use storage::{Storage, StorageType, Window};
