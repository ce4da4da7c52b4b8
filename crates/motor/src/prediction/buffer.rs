use std::collections::VecDeque;

use crate::net::{tick_at_or_before, InputSample};

pub const DEFAULT_PREDICTION_CAPACITY: usize = 128;

/// Inputs the owner has applied locally but the server has not yet
/// acknowledged, oldest first, one entry per tick.
#[derive(Debug, Clone)]
pub struct PredictionBuffer {
    samples: VecDeque<InputSample>,
    capacity: usize,
}

impl Default for PredictionBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_PREDICTION_CAPACITY)
    }
}

impl PredictionBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Appends a freshly applied input. An entry for the same or a later tick
    /// is replaced, which only happens after the clock was rewound.
    pub fn push(&mut self, sample: InputSample) {
        while self
            .samples
            .back()
            .is_some_and(|last| tick_at_or_before(sample.tick, last.tick))
        {
            self.samples.pop_back();
        }

        if self.samples.len() >= self.capacity {
            if let Some(dropped) = self.samples.pop_front() {
                log::warn!(
                    "prediction buffer full ({}), dropping unacknowledged input for tick {}",
                    self.capacity,
                    dropped.tick
                );
            }
        }

        self.samples.push_back(sample);
    }

    /// Drops every entry the server has confirmed, i.e. all with
    /// `tick <= acknowledged`. Returns how many were removed.
    pub fn acknowledge(&mut self, acknowledged: u32) -> usize {
        let mut removed = 0;
        while self
            .samples
            .front()
            .is_some_and(|first| tick_at_or_before(first.tick, acknowledged))
        {
            self.samples.pop_front();
            removed += 1;
        }
        removed
    }

    pub fn iter(&self) -> impl Iterator<Item = &InputSample> {
        self.samples.iter()
    }

    pub fn front(&self) -> Option<&InputSample> {
        self.samples.front()
    }

    pub fn back(&self) -> Option<&InputSample> {
        self.samples.back()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ticks(buffer: &PredictionBuffer) -> Vec<u32> {
        buffer.iter().map(|s| s.tick).collect()
    }

    #[test]
    fn acknowledge_prunes_front() {
        let mut buffer = PredictionBuffer::default();
        for tick in 10..15 {
            buffer.push(InputSample::idle(tick));
        }

        assert_eq!(buffer.acknowledge(12), 3);
        assert_eq!(ticks(&buffer), vec![13, 14]);

        // Acknowledging an older tick again changes nothing.
        assert_eq!(buffer.acknowledge(11), 0);
        assert_eq!(ticks(&buffer), vec![13, 14]);
    }

    #[test]
    fn acknowledge_across_wrap() {
        let mut buffer = PredictionBuffer::default();
        for tick in [u32::MAX - 1, u32::MAX, 0, 1] {
            buffer.push(InputSample::idle(tick));
        }

        assert_eq!(buffer.acknowledge(u32::MAX), 2);
        assert_eq!(ticks(&buffer), vec![0, 1]);
    }

    #[test]
    fn overflow_drops_oldest() {
        let mut buffer = PredictionBuffer::new(3);
        for tick in 0..5 {
            buffer.push(InputSample::idle(tick));
        }

        assert_eq!(buffer.len(), 3);
        assert_eq!(ticks(&buffer), vec![2, 3, 4]);
    }

    #[test]
    fn ticks_stay_unique() {
        let mut buffer = PredictionBuffer::default();
        buffer.push(InputSample::idle(1));
        buffer.push(InputSample::idle(2));
        buffer.push(InputSample::new(2, 1.0, 0.0, Default::default()));

        assert_eq!(ticks(&buffer), vec![1, 2]);
        assert_eq!(buffer.back().map(|s| s.horizontal), Some(1.0));
    }
}
