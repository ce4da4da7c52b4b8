use std::collections::HashSet;

use crate::error::Result;

use super::tick::ClockState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Pre,
    Step,
    Post,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

pub type PhaseCallback<W> = Box<dyn FnMut(&mut W, &mut PhaseContext<'_, W>) -> Result<()>>;

struct Subscriber<W> {
    id: SubscriptionId,
    phase: Phase,
    callback: PhaseCallback<W>,
}

/// Handed to every phase callback. Registry changes made through it are
/// deferred: removals stop delivery immediately, additions start with the
/// next dispatch.
pub struct PhaseContext<'a, W> {
    clock: &'a mut ClockState,
    added: &'a mut Vec<Subscriber<W>>,
    removed: &'a mut HashSet<SubscriptionId>,
    next_id: &'a mut u64,
}

impl<W> PhaseContext<'_, W> {
    pub fn clock(&self) -> &ClockState {
        self.clock
    }

    pub fn clock_mut(&mut self) -> &mut ClockState {
        self.clock
    }

    pub fn tick(&self) -> u32 {
        self.clock.tick()
    }

    pub fn adjust(&mut self, steps: i8) {
        self.clock.adjust(steps);
    }

    pub fn subscribe<F>(&mut self, phase: Phase, callback: F) -> SubscriptionId
    where
        F: FnMut(&mut W, &mut PhaseContext<'_, W>) -> Result<()> + 'static,
    {
        let id = SubscriptionId(*self.next_id);
        *self.next_id += 1;
        self.added.push(Subscriber {
            id,
            phase,
            callback: Box::new(callback),
        });
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) {
        self.removed.insert(id);
    }
}

pub struct PhaseRegistry<W> {
    subscribers: Vec<Subscriber<W>>,
    next_id: u64,
}

impl<W> Default for PhaseRegistry<W> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W> PhaseRegistry<W> {
    pub fn new() -> Self {
        Self {
            subscribers: Vec::new(),
            next_id: 0,
        }
    }

    pub fn subscribe<F>(&mut self, phase: Phase, callback: F) -> SubscriptionId
    where
        F: FnMut(&mut W, &mut PhaseContext<'_, W>) -> Result<()> + 'static,
    {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.subscribers.push(Subscriber {
            id,
            phase,
            callback: Box::new(callback),
        });
        id
    }

    /// Returns false if the subscription was already gone.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|s| s.id != id);
        self.subscribers.len() != before
    }

    pub fn is_subscribed(&self, id: SubscriptionId) -> bool {
        self.subscribers.iter().any(|s| s.id == id)
    }

    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }

    /// Invokes every callback registered for `phase` in subscription order.
    /// The first error stops the dispatch; registry changes requested before
    /// it are still applied.
    pub fn dispatch(&mut self, phase: Phase, world: &mut W, clock: &mut ClockState) -> Result<()> {
        let mut subscribers = std::mem::take(&mut self.subscribers);
        let mut added = Vec::new();
        let mut removed = HashSet::new();
        let mut result = Ok(());

        for subscriber in subscribers.iter_mut() {
            if subscriber.phase != phase || removed.contains(&subscriber.id) {
                continue;
            }

            let mut ctx = PhaseContext {
                clock: &mut *clock,
                added: &mut added,
                removed: &mut removed,
                next_id: &mut self.next_id,
            };

            if let Err(e) = (subscriber.callback)(world, &mut ctx) {
                result = Err(e);
                break;
            }
        }

        if !removed.is_empty() {
            subscribers.retain(|s| !removed.contains(&s.id));
            added.retain(|s| !removed.contains(&s.id));
        }
        subscribers.append(&mut added);

        self.subscribers = subscribers;
        result
    }
}
