//! Storage backend that retains nothing.
//!
//! Useful when a caller only needs [`RingBuffer::latest`](crate::RingBuffer::latest)
//! and wants the history switched off without changing any call sites.

use std::time::Duration;

use crate::error::Result;
use crate::record::Timestamped;
use crate::span::Span;
use crate::storage::{Storage, Window};

/// No-op backend: every write is dropped and every read comes back empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NullStorage {
    span: Span,
}

impl NullStorage {
    /// Creates a null backend, validating the parameters like any other.
    ///
    /// # Errors
    ///
    /// Returns the [`ConfigError`](crate::error::ConfigError) raised by
    /// [`Span::new`] if the parameters are invalid.
    pub fn new(period: Duration, resolution: Duration) -> Result<Self> {
        Ok(Self {
            span: Span::new(period, resolution)?,
        })
    }
}

impl<T: Timestamped> Storage<T> for NullStorage {
    fn span(&self) -> Span {
        self.span
    }

    fn capacity(&self) -> usize {
        usize::MAX
    }

    fn at(&self, _index: usize) -> Option<&T> {
        None
    }

    fn at_mut(&mut self, _index: usize) -> Option<&mut T> {
        None
    }

    fn put(&mut self, _index: usize, _record: T) -> Result<()> {
        Ok(())
    }

    fn remove_at(&mut self, _index: usize) -> Result<()> {
        Ok(())
    }

    fn removes_older(&mut self, _sequence: i64) -> usize {
        0
    }

    fn each(&self, _window: &Window, _f: &mut dyn FnMut(&T)) {}

    fn walk(&self, _window: &Window, _f: &mut dyn FnMut(&T) -> bool) {}
}
