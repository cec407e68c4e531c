//! Array-backed storage backend.
//!
//! All `capacity` slots are allocated up front, so memory use is fixed by the
//! span and never by the data. Slot operations are direct indexed reads and
//! writes; eviction and traversal are linear scans.

use std::time::Duration;

use crate::error::{Result, StorageError};
use crate::record::Timestamped;
use crate::span::Span;
use crate::storage::{Storage, Window};

/// In-memory slot array.
///
/// # Examples
///
/// ```rust
/// use std::time::{Duration, UNIX_EPOCH};
/// use epochring::{Datum, MemoryStorage, Storage};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let mut storage = MemoryStorage::new(Duration::from_secs(60), Duration::from_secs(1))?;
/// storage.put(3, Datum::new(UNIX_EPOCH + Duration::from_secs(3)))?;
/// assert_eq!(storage.len(), 1);
/// assert!(storage.at(3).is_some());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct MemoryStorage<T> {
    span: Span,
    slots: Vec<Option<T>>,
}

impl<T> MemoryStorage<T> {
    /// Allocates a backend for the given period and resolution.
    ///
    /// # Errors
    ///
    /// Returns the [`ConfigError`](crate::error::ConfigError) raised by
    /// [`Span::new`] if the parameters are invalid.
    pub fn new(period: Duration, resolution: Duration) -> Result<Self> {
        Ok(Self::with_span(Span::new(period, resolution)?))
    }

    /// Allocates a backend for an already validated span.
    pub fn with_span(span: Span) -> Self {
        let mut slots = Vec::with_capacity(span.capacity());
        slots.resize_with(span.capacity(), || None);
        Self { span, slots }
    }

    /// Returns the number of occupied slots.
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    /// Returns whether every slot is empty.
    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }

    fn check_index(&self, index: usize) -> Result<()> {
        if index >= self.slots.len() {
            return Err(StorageError::SlotOutOfBounds {
                index,
                capacity: self.slots.len(),
            }
            .into());
        }
        Ok(())
    }
}

impl<T: Timestamped> MemoryStorage<T> {
    /// Records of one generation in traversal order.
    fn generation<'a>(&'a self, window: &'a Window, generation: i64) -> impl Iterator<Item = &'a T> {
        window
            .slot_order(self.slots.len())
            .filter_map(move |index| self.slots[index].as_ref())
            .filter(move |record| window.admits(*record, generation))
    }
}

impl<T: Timestamped> Storage<T> for MemoryStorage<T> {
    fn span(&self) -> Span {
        self.span
    }

    fn capacity(&self) -> usize {
        self.slots.len()
    }

    fn at(&self, index: usize) -> Option<&T> {
        self.slots.get(index).and_then(Option::as_ref)
    }

    fn at_mut(&mut self, index: usize) -> Option<&mut T> {
        self.slots.get_mut(index).and_then(Option::as_mut)
    }

    fn put(&mut self, index: usize, record: T) -> Result<()> {
        self.check_index(index)?;
        self.slots[index] = Some(record);
        Ok(())
    }

    fn remove_at(&mut self, index: usize) -> Result<()> {
        self.check_index(index)?;
        self.slots[index] = None;
        Ok(())
    }

    fn removes_older(&mut self, sequence: i64) -> usize {
        let mut removed = 0;
        for slot in &mut self.slots {
            if slot.as_ref().is_some_and(|record| record.sequence() < sequence) {
                *slot = None;
                removed += 1;
            }
        }
        removed
    }

    fn each(&self, window: &Window, f: &mut dyn FnMut(&T)) {
        for generation in window.generations() {
            self.generation(window, generation).for_each(&mut *f);
        }
    }

    fn walk(&self, window: &Window, f: &mut dyn FnMut(&T) -> bool) {
        for generation in window.generations() {
            for record in self.generation(window, generation) {
                if !f(record) {
                    return;
                }
            }
        }
    }
}
