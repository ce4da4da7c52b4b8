use std::cmp::Ordering;
use std::collections::BinaryHeap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Conditions applied to every message pushed through a [`LossyLink`].
/// Latencies are in seconds of simulated time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkConditions {
    pub loss_percent: f32,
    pub min_latency: f64,
    pub max_latency: f64,
    pub jitter: f64,
}

impl Default for LinkConditions {
    fn default() -> Self {
        Self::perfect()
    }
}

impl LinkConditions {
    pub fn perfect() -> Self {
        Self {
            loss_percent: 0.0,
            min_latency: 0.0,
            max_latency: 0.0,
            jitter: 0.0,
        }
    }

    pub fn fixed_latency(latency: f64) -> Self {
        Self {
            min_latency: latency,
            max_latency: latency,
            ..Self::perfect()
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkStats {
    pub sent: u64,
    pub dropped: u64,
    pub delivered: u64,
}

#[derive(Debug)]
struct InFlight<T> {
    release_at: f64,
    seq: u64,
    message: T,
}

impl<T> PartialEq for InFlight<T> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<T> Eq for InFlight<T> {}

impl<T> PartialOrd for InFlight<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for InFlight<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed for a min-heap; equal release times keep send order.
        other
            .release_at
            .total_cmp(&self.release_at)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// One-directional unreliable channel running on simulated time. Messages
/// may be dropped, delayed and reordered by jitter.
#[derive(Debug)]
pub struct LossyLink<T> {
    conditions: LinkConditions,
    in_flight: BinaryHeap<InFlight<T>>,
    rng: StdRng,
    next_seq: u64,
    stats: LinkStats,
}

impl<T> LossyLink<T> {
    pub fn new(conditions: LinkConditions, seed: u64) -> Self {
        Self {
            conditions,
            in_flight: BinaryHeap::new(),
            rng: StdRng::seed_from_u64(seed),
            next_seq: 0,
            stats: LinkStats::default(),
        }
    }

    pub fn perfect() -> Self {
        Self::new(LinkConditions::perfect(), 0)
    }

    pub fn conditions(&self) -> &LinkConditions {
        &self.conditions
    }

    pub fn set_conditions(&mut self, conditions: LinkConditions) {
        self.conditions = conditions;
    }

    pub fn stats(&self) -> LinkStats {
        self.stats
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Returns false if the message was lost.
    pub fn send(&mut self, now: f64, message: T) -> bool {
        self.stats.sent += 1;

        if self.should_drop() {
            self.stats.dropped += 1;
            log::trace!("link dropped message at {now:.3}");
            return false;
        }

        let release_at = now + self.delay();
        let seq = self.next_seq;
        self.next_seq += 1;
        self.in_flight.push(InFlight {
            release_at,
            seq,
            message,
        });
        true
    }

    /// Everything due at or before `now`, in arrival order.
    pub fn receive(&mut self, now: f64) -> Vec<T> {
        let mut arrived = Vec::new();
        while self
            .in_flight
            .peek()
            .is_some_and(|next| next.release_at <= now)
        {
            if let Some(next) = self.in_flight.pop() {
                arrived.push(next.message);
            }
        }
        self.stats.delivered += arrived.len() as u64;
        arrived
    }

    fn should_drop(&mut self) -> bool {
        if self.conditions.loss_percent <= 0.0 {
            return false;
        }
        self.rng.gen_range(0.0..100.0) < self.conditions.loss_percent
    }

    fn delay(&mut self) -> f64 {
        let LinkConditions {
            min_latency,
            max_latency,
            jitter,
            ..
        } = self.conditions;

        let base = if max_latency > min_latency {
            self.rng.gen_range(min_latency..max_latency)
        } else {
            min_latency
        };
        let jitter = if jitter > 0.0 {
            self.rng.gen_range(0.0..jitter)
        } else {
            0.0
        };
        (base + jitter).max(0.0)
    }
}
