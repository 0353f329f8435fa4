//! Fixed-Capacity Ring Buffer Implementation

use crate::RingBufferError;

/// Fixed-capacity ring buffer that overwrites its oldest entry when full
#[derive(Debug, Clone)]
pub struct RingBuffer<T> {
    /// Pre-allocated storage
    storage: Vec<T>,
    /// Capacity of the buffer
    capacity: usize,
    /// Head position (next write slot)
    head: usize,
}

impl<T> RingBuffer<T> {
    /// Create a new ring buffer with given capacity
    pub fn new(capacity: usize) -> Result<Self, RingBufferError> {
        if capacity == 0 {
            return Err(RingBufferError::ZeroCapacity);
        }
        Ok(Self {
            storage: Vec::with_capacity(capacity),
            capacity,
            head: 0,
        })
    }

    /// Push a value into the buffer (overwrites oldest if full)
    ///
    /// Returns the evicted value, if any.
    pub fn push(&mut self, value: T) -> Option<T> {
        if self.storage.len() < self.capacity {
            self.storage.push(value);
            self.head = self.storage.len() % self.capacity;
            return None;
        }

        let evicted = std::mem::replace(&mut self.storage[self.head], value);
        self.head = (self.head + 1) % self.capacity;
        Some(evicted)
    }

    /// Get the number of values currently in the buffer
    pub fn len(&self) -> usize {
        self.storage.len()
    }

    /// Check if buffer is empty
    pub fn is_empty(&self) -> bool {
        self.storage.is_empty()
    }

    /// Check if buffer is full
    pub fn is_full(&self) -> bool {
        self.storage.len() == self.capacity
    }

    /// Index of the oldest stored value
    fn tail(&self) -> usize {
        if self.is_full() {
            self.head
        } else {
            0
        }
    }

    /// Iterate from oldest to most recent
    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        let tail = self.tail();
        let len = self.len();
        (0..len).map(move |i| &self.storage[(tail + i) % len])
    }

    /// Clear the buffer
    pub fn clear(&mut self) {
        self.storage.clear();
        self.head = 0;
    }
}
