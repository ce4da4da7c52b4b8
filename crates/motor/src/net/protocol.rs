use bitflags::bitflags;
use glam::{Quat, Vec3};
use rkyv::{rancor, Archive, Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::physics::{BodyState, Pose, Transform, Velocities};

const TICK_WRAP_THRESHOLD: u32 = u32::MAX / 2;

/// Wrap-aware "a is newer than b" for tick stamps.
#[inline]
pub fn tick_newer(a: u32, b: u32) -> bool {
    ((a > b) && (a - b <= TICK_WRAP_THRESHOLD)) || ((a < b) && (b - a > TICK_WRAP_THRESHOLD))
}

#[inline]
pub fn tick_at_or_before(a: u32, b: u32) -> bool {
    !tick_newer(a, b)
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ActionFlags: u8 {
        const JUMP = 1 << 0;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub struct InputSample {
    pub tick: u32,
    pub horizontal: f32,
    pub forward: f32,
    pub action_flags: u8,
}

impl InputSample {
    pub fn new(tick: u32, horizontal: f32, forward: f32, flags: ActionFlags) -> Self {
        Self {
            tick,
            horizontal,
            forward,
            action_flags: flags.bits(),
        }
    }

    pub fn idle(tick: u32) -> Self {
        Self::new(tick, 0.0, 0.0, ActionFlags::empty())
    }

    pub fn flags(&self) -> ActionFlags {
        ActionFlags::from_bits_truncate(self.action_flags)
    }

    /// Same axes with the given one-shot actions.
    pub fn with_flags(&self, flags: ActionFlags) -> Self {
        Self {
            action_flags: flags.bits(),
            ..*self
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub struct AuthoritativeSnapshot {
    pub tick: u32,
    pub position: [f32; 3],
    pub rotation: [f32; 4],
    pub linear_velocity: [f32; 3],
    pub angular_velocity: [f32; 3],
    pub timing_step: i8,
}

impl AuthoritativeSnapshot {
    pub fn from_state(tick: u32, state: BodyState, timing_step: i8) -> Self {
        Self {
            tick,
            position: state.pose.position.to_array(),
            rotation: state.pose.rotation.to_array(),
            linear_velocity: state.velocities.linear.to_array(),
            angular_velocity: state.velocities.angular.to_array(),
            timing_step: clamp_timing_step(timing_step),
        }
    }

    pub fn body_state(&self) -> BodyState {
        BodyState {
            pose: Pose::new(Vec3::from(self.position), Quat::from_array(self.rotation)),
            velocities: Velocities {
                linear: Vec3::from(self.linear_velocity),
                angular: Vec3::from(self.angular_velocity),
            },
        }
    }

    pub fn timing_step(&self) -> i8 {
        clamp_timing_step(self.timing_step)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub struct TimingOnlyHint {
    pub timing_step: i8,
}

impl TimingOnlyHint {
    pub fn new(timing_step: i8) -> Self {
        Self {
            timing_step: clamp_timing_step(timing_step),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub struct RemotePoseUpdate {
    pub position: [f32; 3],
    pub rotation: [f32; 4],
    pub scale: [f32; 3],
}

impl RemotePoseUpdate {
    pub fn from_transform(transform: &Transform) -> Self {
        Self {
            position: transform.position.to_array(),
            rotation: transform.rotation.to_array(),
            scale: transform.scale.to_array(),
        }
    }

    pub fn transform(&self) -> Transform {
        Transform {
            position: Vec3::from(self.position),
            rotation: Quat::from_array(self.rotation).normalize(),
            scale: Vec3::from(self.scale),
        }
    }
}

/// Timing steps outside [-1, 1] are never produced; anything else on the
/// wire is saturated into range.
pub fn clamp_timing_step(step: i8) -> i8 {
    step.clamp(-1, 1)
}

#[derive(Debug, Clone, Copy, PartialEq, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub enum Message {
    Input(InputSample),
    Snapshot(AuthoritativeSnapshot),
    Timing(TimingOnlyHint),
    Pose(RemotePoseUpdate),
}

#[derive(Debug, Clone, Copy, PartialEq, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub struct Packet {
    pub entity_id: u32,
    pub payload: Message,
}

impl Packet {
    pub fn new(entity_id: u32, payload: Message) -> Self {
        Self { entity_id, payload }
    }

    pub fn serialize(&self) -> Result<Vec<u8>> {
        rkyv::to_bytes::<rancor::Error>(self)
            .map(|aligned| aligned.into_vec())
            .map_err(Error::Serialize)
    }

    pub fn deserialize(data: &[u8]) -> Result<Self> {
        rkyv::from_bytes::<Self, rancor::Error>(data).map_err(Error::Deserialize)
    }
}
