use glam::{Quat, Vec3};
use rapier3d::dynamics::RigidBodyHandle;
use serde::{Deserialize, Serialize};

use crate::clock::ManualStep;

pub type BodyId = RigidBodyHandle;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub position: Vec3,
    pub rotation: Quat,
}

impl Default for Pose {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
        }
    }
}

impl Pose {
    pub fn new(position: Vec3, rotation: Quat) -> Self {
        Self { position, rotation }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Velocities {
    pub linear: Vec3,
    pub angular: Vec3,
}

impl Velocities {
    pub const ZERO: Self = Self {
        linear: Vec3::ZERO,
        angular: Vec3::ZERO,
    };
}

/// Full dynamic state of one body. Two states compare equal only when every
/// component is bit-identical.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BodyState {
    pub pose: Pose,
    pub velocities: Velocities,
}

/// Displayed pose of an entity that is not simulated locally.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Transform {
    pub const IDENTITY: Self = Self {
        position: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: Vec3::ONE,
    };

    pub fn from_pose(pose: Pose) -> Self {
        Self {
            position: pose.position,
            rotation: pose.rotation,
            scale: Vec3::ONE,
        }
    }

    pub fn pose(&self) -> Pose {
        Pose::new(self.position, self.rotation)
    }
}

/// The subset of a physics engine the motors drive. Stepping is manual: the
/// engine never advances on its own.
pub trait PhysicsEngine: ManualStep {
    fn contains(&self, body: BodyId) -> bool;

    fn pose(&self, body: BodyId) -> Option<Pose>;

    fn set_pose(&mut self, body: BodyId, pose: Pose);

    fn velocities(&self, body: BodyId) -> Option<Velocities>;

    fn set_velocities(&mut self, body: BodyId, velocities: Velocities);

    fn apply_impulse(&mut self, body: BodyId, impulse: Vec3);

    fn apply_torque_impulse(&mut self, body: BodyId, impulse: Vec3);

    /// Pushes poses written through `set_pose` to colliders right away instead
    /// of waiting for the next step.
    fn force_transform_sync(&mut self);

    fn body_state(&self, body: BodyId) -> Option<BodyState> {
        Some(BodyState {
            pose: self.pose(body)?,
            velocities: self.velocities(body)?,
        })
    }

    fn set_body_state(&mut self, body: BodyId, state: BodyState) {
        self.set_pose(body, state.pose);
        self.set_velocities(body, state.velocities);
    }
}
