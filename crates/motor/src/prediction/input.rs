use crate::net::{ActionFlags, InputSample};

use super::movement::axis_sign;

const AXIS_DEAD_ZONE: f32 = 0.1;

/// Latest raw input for one owned entity. Axes are levels and persist
/// between samples; action flags are edges and are consumed by `sample`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct InputState {
    horizontal: f32,
    forward: f32,
    pending: ActionFlags,
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_axes(&mut self, horizontal: f32, forward: f32) {
        self.horizontal = horizontal;
        self.forward = forward;
    }

    pub fn press(&mut self, flags: ActionFlags) {
        self.pending |= flags;
    }

    pub fn pending(&self) -> ActionFlags {
        self.pending
    }

    pub fn sample(&mut self, tick: u32) -> InputSample {
        let flags = std::mem::take(&mut self.pending);
        InputSample::new(
            tick,
            axis_sign(self.horizontal, AXIS_DEAD_ZONE),
            axis_sign(self.forward, AXIS_DEAD_ZONE),
            flags,
        )
    }
}
