//! Buffer configuration.
//!
//! A [`BufferConfig`] names the period, resolution and storage backend of a
//! ring buffer. It is serde-friendly so it can live in a JSON file next to
//! the rest of an application's settings; durations are written as float
//! seconds.
//!
//! ```json
//! { "period": 7200.0, "resolution": 2.0, "storage": "memory" }
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};
use crate::span::Span;
use crate::storage::StorageType;

/// Configuration for a [`RingBuffer`](crate::RingBuffer).
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use epochring::{BufferConfig, Datum, RingBuffer, StorageType};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = BufferConfig::new(
///     Duration::from_secs(2 * 3600),
///     Duration::from_secs(2),
///     StorageType::Memory,
/// )?;
/// let ring: RingBuffer<Datum> = RingBuffer::from_config(&config)?;
/// assert_eq!(ring.capacity(), 3600);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BufferConfig {
    /// Length of the time window the buffer covers.
    #[serde(with = "duration_serde")]
    pub period: Duration,

    /// Width of one slot. Must be at least one second and below `period`.
    #[serde(with = "duration_serde")]
    pub resolution: Duration,

    /// Backend holding the slots.
    #[serde(default)]
    pub storage: StorageType,
}

impl BufferConfig {
    /// Creates a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if [`BufferConfig::validate`] fails.
    pub fn new(period: Duration, resolution: Duration, storage: StorageType) -> Result<Self> {
        let config = Self {
            period,
            resolution,
            storage,
        };
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration.
    ///
    /// The storage type is checked first, then the span rules.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::UnknownStorage`] if the storage type has no backend
    /// - [`ConfigError::InvalidResolution`] / [`ConfigError::InvalidPeriod`]
    pub fn validate(&self) -> Result<()> {
        if self.storage == StorageType::File {
            return Err(ConfigError::UnknownStorage {
                name: self.storage.to_string(),
            }
            .into());
        }
        self.span()?;
        Ok(())
    }

    /// Returns the span this configuration produces.
    ///
    /// # Errors
    ///
    /// Same as [`Span::new`].
    pub fn span(&self) -> Result<Span> {
        Span::new(self.period, self.resolution)
    }

    /// Parses and validates a JSON configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed JSON or unknown storage
    /// names, otherwise whatever [`BufferConfig::validate`] reports.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json).map_err(ConfigError::from)?;
        config.validate()?;
        Ok(config)
    }

    /// Serializes the configuration to pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self).map_err(ConfigError::from)?)
    }
}

/// Serde helper for Duration serialization as float seconds.
mod duration_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs_f64().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let seconds = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(seconds).map_err(serde::de::Error::custom)
    }
}
