// Copyright 2025 Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Fixed-capacity FIFO used for every bounded buffer in the pipeline: the
//! write-ingress queue, the read admission queue, the egress completion queue
//! and the per-port latency pipes. Single producer, single consumer; a full
//! buffer rejects the push and leaves the caller to apply its drop policy.

#[derive(Debug, Default, Clone)]
pub struct RingBuffer<T: std::fmt::Debug + Default + Clone> {
    items: Box<[T]>,
    start: usize,
    len: usize,
}

impl<T: std::fmt::Debug + Default + Clone> RingBuffer<T> {
    /// New buffer holding up to `capacity` items.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            items: vec![T::default(); capacity].into_boxed_slice(),
            start: 0,
            len: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.items.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    /// Number of free slots.
    pub fn free_len(&self) -> usize {
        self.items.len() - self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_full(&self) -> bool {
        self.len == self.items.len()
    }

    /// Push an item to the back of the ring. Returns `false` (and drops the
    /// item) if the ring is full.
    pub fn push(&mut self, item: T) -> bool {
        if self.is_full() {
            return false;
        }
        let index = (self.start + self.len) % self.items.len();
        self.items[index] = item;
        self.len += 1;
        true
    }

    /// Peek at the oldest item without removing it.
    pub fn front(&self) -> Option<&T> {
        if self.is_empty() {
            None
        } else {
            Some(&self.items[self.start])
        }
    }

    /// Remove and return the oldest item.
    pub fn pop_front(&mut self) -> Option<T> {
        if self.is_empty() {
            return None;
        }
        let item = std::mem::take(&mut self.items[self.start]);
        self.start = (self.start + 1) % self.items.len();
        self.len -= 1;
        Some(item)
    }

    /// Discard all buffered items. Capacity is unchanged.
    pub fn clear(&mut self) {
        self.start = 0;
        self.len = 0;
        self.items.iter_mut().for_each(|i| *i = T::default());
    }
}
