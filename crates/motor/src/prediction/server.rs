use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::net::{
    tick_at_or_before, ActionFlags, AuthoritativeSnapshot, InputSample, TimingOnlyHint,
};
use crate::physics::{BodyId, PhysicsEngine};

use super::movement::{apply_input, MotorConfig};
use super::queue::{ReceivedInputQueue, DEFAULT_QUEUE_CAPACITY};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerPolicy {
    pub queue_capacity: usize,
    /// Extra ticks the last input may be re-applied while the queue is dry.
    /// Zero disables server-side prediction.
    pub prediction_budget: u32,
    /// When false every reply carries a timing step of zero.
    pub timing_feedback: bool,
}

impl Default for ServerPolicy {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            prediction_budget: 0,
            timing_feedback: true,
        }
    }
}

/// What the server sends back to the owner after a tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ServerReply {
    Snapshot(AuthoritativeSnapshot),
    Timing(TimingOnlyHint),
}

#[derive(Debug, Clone, Copy)]
enum Outcome {
    Consumed { tick: u32, timing_step: i8 },
    Dry { timing_step: i8 },
}

/// Authoritative side of the protocol for one entity. Consumes at most one
/// queued input per tick and tells the owner how to pace its sends.
#[derive(Debug)]
pub struct ServerMotor {
    body: BodyId,
    config: MotorConfig,
    policy: ServerPolicy,
    queue: ReceivedInputQueue,
    last_consumed: Option<u32>,
    last_input: Option<InputSample>,
    budget: u32,
    outcome: Option<Outcome>,
    is_local_owner: bool,
}

impl ServerMotor {
    pub fn bind<E: PhysicsEngine>(
        engine: &E,
        body: BodyId,
        config: MotorConfig,
        policy: ServerPolicy,
    ) -> Result<Self> {
        if !engine.contains(body) {
            return Err(Error::MissingBody(body));
        }
        log::info!(
            "server motor bound to {body:?} (queue {}, budget {})",
            policy.queue_capacity,
            policy.prediction_budget
        );

        Ok(Self {
            body,
            config,
            queue: ReceivedInputQueue::new(policy.queue_capacity),
            policy,
            last_consumed: None,
            last_input: None,
            budget: 0,
            outcome: None,
            is_local_owner: false,
        })
    }

    pub fn body(&self) -> BodyId {
        self.body
    }

    pub fn policy(&self) -> &ServerPolicy {
        &self.policy
    }

    pub fn queue(&self) -> &ReceivedInputQueue {
        &self.queue
    }

    pub fn last_consumed(&self) -> Option<u32> {
        self.last_consumed
    }

    pub fn remaining_budget(&self) -> u32 {
        self.budget
    }

    /// On a combined host the owner motor already simulates the body, so the
    /// server half stays idle.
    pub fn set_local_owner(&mut self, is_local_owner: bool) {
        self.is_local_owner = is_local_owner;
    }

    pub fn is_local_owner(&self) -> bool {
        self.is_local_owner
    }

    /// Returns false if the input was stale or already queued.
    pub fn receive_input(&mut self, sample: InputSample) -> bool {
        if let Some(last) = self.last_consumed {
            if tick_at_or_before(sample.tick, last) {
                log::trace!("stale input for tick {} (consumed {last})", sample.tick);
                return false;
            }
        }
        self.queue.insert(sample)
    }

    /// Step phase: consumes the oldest queued input, or re-applies the last
    /// one while the prediction budget lasts.
    pub fn step<E: PhysicsEngine>(&mut self, engine: &mut E) -> Result<()> {
        self.outcome = None;
        if self.is_local_owner {
            return Ok(());
        }

        match self.queue.pop() {
            Some(sample) => {
                apply_input(engine, self.body, &sample, &self.config)?;
                self.last_consumed = Some(sample.tick);
                self.last_input = Some(sample);
                self.budget = self.policy.prediction_budget;
                self.outcome = Some(Outcome::Consumed {
                    tick: sample.tick,
                    timing_step: self.timing_step(),
                });
            }
            None => {
                if self.budget > 0 {
                    if let Some(last) = self.last_input {
                        self.budget -= 1;
                        // Only the held axes carry over; actions fire once.
                        let held = last.with_flags(ActionFlags::empty());
                        apply_input(engine, self.body, &held, &self.config)?;
                        log::trace!("re-applied input {} ({} left)", last.tick, self.budget);
                    }
                }
                self.outcome = Some(Outcome::Dry {
                    timing_step: self.timing_step(),
                });
            }
        }
        Ok(())
    }

    /// Post phase: builds the reply from the state the physics step produced.
    pub fn finish<E: PhysicsEngine>(&mut self, engine: &E) -> Result<Option<ServerReply>> {
        let Some(outcome) = self.outcome.take() else {
            return Ok(None);
        };

        let reply = match outcome {
            Outcome::Consumed { tick, timing_step } => {
                let state = engine
                    .body_state(self.body)
                    .ok_or(Error::MissingBody(self.body))?;
                ServerReply::Snapshot(AuthoritativeSnapshot::from_state(tick, state, timing_step))
            }
            Outcome::Dry { timing_step } => ServerReply::Timing(TimingOnlyHint::new(timing_step)),
        };
        Ok(Some(reply))
    }

    /// Pacing hint derived from what is left in the queue after this tick's
    /// pop: dry asks the owner to speed up, a backlog asks it to slow down.
    fn timing_step(&self) -> i8 {
        if !self.policy.timing_feedback {
            return 0;
        }
        match self.queue.len() {
            0 => -1,
            1 => 0,
            _ => 1,
        }
    }
}
