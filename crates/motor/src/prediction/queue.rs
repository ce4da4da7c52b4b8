use std::collections::VecDeque;

use crate::net::{tick_newer, InputSample};

pub const DEFAULT_QUEUE_CAPACITY: usize = 16;

/// Server-side inputs waiting to be consumed, ordered by tick. Bounded: when
/// full, the oldest entry is evicted.
#[derive(Debug, Clone)]
pub struct ReceivedInputQueue {
    entries: VecDeque<InputSample>,
    capacity: usize,
    evicted: u64,
}

impl Default for ReceivedInputQueue {
    fn default() -> Self {
        Self::new(DEFAULT_QUEUE_CAPACITY)
    }
}

impl ReceivedInputQueue {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity + 1),
            capacity,
            evicted: 0,
        }
    }

    /// Returns false if an input for the same tick is already queued.
    pub fn insert(&mut self, sample: InputSample) -> bool {
        let index = self
            .entries
            .iter()
            .position(|queued| !tick_newer(sample.tick, queued.tick))
            .unwrap_or(self.entries.len());

        if self
            .entries
            .get(index)
            .is_some_and(|queued| queued.tick == sample.tick)
        {
            return false;
        }

        self.entries.insert(index, sample);

        if self.entries.len() > self.capacity {
            if let Some(evicted) = self.entries.pop_front() {
                self.evicted += 1;
                log::debug!(
                    "input queue over capacity ({}), evicted tick {}",
                    self.capacity,
                    evicted.tick
                );
            }
        }
        true
    }

    pub fn pop(&mut self) -> Option<InputSample> {
        self.entries.pop_front()
    }

    pub fn contains(&self, tick: u32) -> bool {
        self.entries.iter().any(|queued| queued.tick == tick)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Total number of inputs lost to overflow.
    pub fn evicted(&self) -> u64 {
        self.evicted
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
