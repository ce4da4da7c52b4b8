use crate::clock::ClockState;
use crate::error::{Error, Result};
use crate::net::{tick_newer, AuthoritativeSnapshot, InputSample, TimingOnlyHint};
use crate::physics::{BodyId, PhysicsEngine};

use super::buffer::PredictionBuffer;
use super::input::InputState;
use super::movement::{apply_input, MotorConfig};

/// Client side of the protocol for an entity this peer owns. Inputs are
/// applied immediately, remembered, and replayed on top of every
/// authoritative snapshot that arrives.
#[derive(Debug)]
pub struct OwnerMotor {
    body: BodyId,
    config: MotorConfig,
    input: InputState,
    buffer: PredictionBuffer,
    pending_snapshot: Option<AuthoritativeSnapshot>,
    last_snapshot_tick: Option<u32>,
    pending_timing: Vec<i8>,
}

impl OwnerMotor {
    /// Fails if `body` does not exist yet; the motor cannot run without it.
    pub fn bind<E: PhysicsEngine>(engine: &E, body: BodyId, config: MotorConfig) -> Result<Self> {
        Self::with_buffer(engine, body, config, PredictionBuffer::default())
    }

    pub fn with_buffer<E: PhysicsEngine>(
        engine: &E,
        body: BodyId,
        config: MotorConfig,
        buffer: PredictionBuffer,
    ) -> Result<Self> {
        if !engine.contains(body) {
            return Err(Error::MissingBody(body));
        }
        log::info!("owner motor bound to {body:?}");

        Ok(Self {
            body,
            config,
            input: InputState::new(),
            buffer,
            pending_snapshot: None,
            last_snapshot_tick: None,
            pending_timing: Vec::new(),
        })
    }

    pub fn body(&self) -> BodyId {
        self.body
    }

    pub fn input_mut(&mut self) -> &mut InputState {
        &mut self.input
    }

    pub fn buffer(&self) -> &PredictionBuffer {
        &self.buffer
    }

    /// Tick of the newest snapshot accepted so far.
    pub fn last_snapshot_tick(&self) -> Option<u32> {
        self.last_snapshot_tick
    }

    /// Returns false when the snapshot is not newer than one already accepted.
    pub fn receive_snapshot(&mut self, snapshot: AuthoritativeSnapshot) -> bool {
        if let Some(last) = self.last_snapshot_tick {
            if !tick_newer(snapshot.tick, last) {
                log::trace!("stale snapshot for tick {} (have {last})", snapshot.tick);
                return false;
            }
        }

        self.last_snapshot_tick = Some(snapshot.tick);
        self.pending_snapshot = Some(snapshot);
        true
    }

    pub fn receive_timing(&mut self, hint: TimingOnlyHint) {
        self.pending_timing.push(hint.timing_step);
    }

    /// Runs before input sampling each tick. Applies any timing feedback, then
    /// rolls the body back to the newest snapshot and replays the inputs the
    /// server has not seen yet. Returns the number of replayed inputs.
    pub fn reconcile<E: PhysicsEngine>(
        &mut self,
        clock: &mut ClockState,
        engine: &mut E,
    ) -> Result<usize> {
        for step in self.pending_timing.drain(..) {
            clock.adjust(step);
        }

        let Some(snapshot) = self.pending_snapshot.take() else {
            return Ok(0);
        };

        clock.adjust(snapshot.timing_step());
        self.buffer.acknowledge(snapshot.tick);

        if !engine.contains(self.body) {
            return Err(Error::MissingBody(self.body));
        }
        engine.set_body_state(self.body, snapshot.body_state());
        engine.force_transform_sync();

        let dt = clock.adjusted_tick_duration();
        for sample in self.buffer.iter() {
            apply_input(engine, self.body, sample, &self.config)?;
            engine.manual_step(dt);
        }

        log::trace!(
            "reconciled to tick {}, replayed {} inputs",
            snapshot.tick,
            self.buffer.len()
        );
        Ok(self.buffer.len())
    }

    /// Samples, records and applies this tick's input. The returned sample is
    /// what must be sent to the server.
    pub fn step<E: PhysicsEngine>(
        &mut self,
        clock: &ClockState,
        engine: &mut E,
    ) -> Result<InputSample> {
        let sample = self.input.sample(clock.tick());
        apply_input(engine, self.body, &sample, &self.config)?;
        self.buffer.push(sample);
        Ok(sample)
    }
}
