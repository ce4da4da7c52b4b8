use serde::{Deserialize, Serialize};

use crate::error::Result;

use super::phase::{Phase, PhaseContext, PhaseRegistry, SubscriptionId};

/// Anything that can be advanced by exactly one fixed step of a given length.
pub trait ManualStep {
    fn manual_step(&mut self, dt: f32);
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClockConfig {
    /// Tick length when no timing adjustment is active, in seconds.
    pub nominal_tick_duration: f32,
    /// Largest fraction the adjusted duration may deviate from nominal.
    pub max_offset_percent: f32,
    /// Fraction of nominal added or removed per timing step.
    pub step_percent: f32,
    /// Seconds of tick duration recovered toward nominal per real second.
    pub recovery_rate: f32,
    /// Optional cap on the real delta a single `advance` accumulates. Off by
    /// default: a capped hitch drops ticks and this peer falls behind.
    pub max_frame_delta: Option<f32>,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            nominal_tick_duration: 1.0 / 60.0,
            max_offset_percent: 0.35,
            step_percent: 0.015,
            recovery_rate: 0.0025,
            max_frame_delta: None,
        }
    }
}

impl ClockConfig {
    pub fn from_tick_rate(tick_rate: u32) -> Self {
        Self {
            nominal_tick_duration: 1.0 / tick_rate.max(1) as f32,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClockState {
    tick: u32,
    nominal: f32,
    adjusted: f32,
    min_duration: f32,
    max_duration: f32,
    per_step_delta: f32,
    recovery_rate: f32,
    max_frame_delta: Option<f32>,
    accumulator: f32,
    real_time: f64,
}

impl ClockState {
    pub fn new(config: ClockConfig) -> Self {
        let nominal = config.nominal_tick_duration;
        Self {
            tick: 0,
            nominal,
            adjusted: nominal,
            min_duration: nominal * (1.0 - config.max_offset_percent),
            max_duration: nominal * (1.0 + config.max_offset_percent),
            per_step_delta: nominal * config.step_percent,
            recovery_rate: config.recovery_rate,
            max_frame_delta: config.max_frame_delta,
            accumulator: 0.0,
            real_time: 0.0,
        }
    }

    pub fn tick(&self) -> u32 {
        self.tick
    }

    /// Jumps the counter, e.g. to line a joining client up with the server.
    pub fn set_tick(&mut self, tick: u32) {
        self.tick = tick;
    }

    pub fn nominal_tick_duration(&self) -> f32 {
        self.nominal
    }

    pub fn adjusted_tick_duration(&self) -> f32 {
        self.adjusted
    }

    pub fn per_step_delta(&self) -> f32 {
        self.per_step_delta
    }

    pub fn duration_range(&self) -> (f32, f32) {
        (self.min_duration, self.max_duration)
    }

    /// Real seconds fed into the clock so far.
    pub fn real_time(&self) -> f64 {
        self.real_time
    }

    /// Steers the tick rate. Negative steps shorten ticks (tick faster),
    /// positive steps lengthen them.
    pub fn adjust(&mut self, steps: i8) {
        if steps == 0 {
            return;
        }

        self.adjusted = (self.adjusted + steps as f32 * self.per_step_delta)
            .clamp(self.min_duration, self.max_duration);
        log::trace!("tick duration adjusted by {} to {}", steps, self.adjusted);
    }

    fn accumulate(&mut self, delta: f32) {
        let delta = match self.max_frame_delta {
            Some(cap) => delta.clamp(0.0, cap),
            None => delta.max(0.0),
        };
        self.accumulator += delta;
        self.real_time += delta as f64;
    }

    fn consume_tick(&mut self) -> bool {
        if self.accumulator >= self.adjusted {
            self.accumulator -= self.adjusted;
            self.tick = self.tick.wrapping_add(1);
            true
        } else {
            false
        }
    }

    fn recover(&mut self, delta: f32) {
        let max_change = self.recovery_rate * delta;
        let diff = self.nominal - self.adjusted;
        if diff.abs() <= max_change {
            self.adjusted = self.nominal;
        } else {
            self.adjusted += max_change.copysign(diff);
        }
    }
}

/// Fixed-rate scheduler with a feedback-steerable tick length. Owns the phase
/// registry; the embedding application calls `advance` once per real frame.
pub struct FixedClock<W> {
    state: ClockState,
    phases: PhaseRegistry<W>,
}

impl<W: ManualStep> FixedClock<W> {
    pub fn new(config: ClockConfig) -> Self {
        Self {
            state: ClockState::new(config),
            phases: PhaseRegistry::new(),
        }
    }

    pub fn state(&self) -> &ClockState {
        &self.state
    }

    pub fn tick(&self) -> u32 {
        self.state.tick
    }

    pub fn set_tick(&mut self, tick: u32) {
        self.state.set_tick(tick);
    }

    pub fn adjusted_tick_duration(&self) -> f32 {
        self.state.adjusted
    }

    pub fn adjust(&mut self, steps: i8) {
        self.state.adjust(steps);
    }

    pub fn phases(&self) -> &PhaseRegistry<W> {
        &self.phases
    }

    pub fn subscribe<F>(&mut self, phase: Phase, callback: F) -> SubscriptionId
    where
        F: FnMut(&mut W, &mut PhaseContext<'_, W>) -> Result<()> + 'static,
    {
        self.phases.subscribe(phase, callback)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.phases.unsubscribe(id)
    }

    /// Runs every tick that fits into the accumulated real time and returns
    /// how many ran. A callback error aborts the remaining ticks of this call.
    pub fn advance(&mut self, real_delta: f32, world: &mut W) -> Result<u32> {
        self.state.accumulate(real_delta);

        let mut ticks_run = 0;
        while self.state.consume_tick() {
            self.phases.dispatch(Phase::Pre, world, &mut self.state)?;
            self.phases.dispatch(Phase::Step, world, &mut self.state)?;
            world.manual_step(self.state.adjusted);
            self.phases.dispatch(Phase::Post, world, &mut self.state)?;
            ticks_run += 1;
        }

        self.state.recover(real_delta.max(0.0));
        Ok(ticks_run)
    }
}
