use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::net::{ActionFlags, InputSample};
use crate::physics::{BodyId, PhysicsEngine, Velocities};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MotorConfig {
    /// Horizontal speed in units per second at full axis deflection.
    pub move_rate: f32,
    pub jump_impulse: f32,
    pub axis_dead_zone: f32,
}

impl Default for MotorConfig {
    fn default() -> Self {
        Self {
            move_rate: 5.0,
            jump_impulse: 5.0,
            axis_dead_zone: 0.1,
        }
    }
}

/// Collapses an analog axis into -1, 0 or 1.
pub fn axis_sign(value: f32, dead_zone: f32) -> f32 {
    if value > dead_zone {
        1.0
    } else if value < -dead_zone {
        -1.0
    } else {
        0.0
    }
}

/// Applies one tick of input to `body`. Vertical velocity is left to the
/// physics engine.
pub fn apply_input<E: PhysicsEngine>(
    engine: &mut E,
    body: BodyId,
    sample: &InputSample,
    config: &MotorConfig,
) -> Result<()> {
    let mut velocities = engine.velocities(body).ok_or(Error::MissingBody(body))?;

    velocities.linear.x = axis_sign(sample.horizontal, config.axis_dead_zone) * config.move_rate;
    velocities.linear.z = axis_sign(sample.forward, config.axis_dead_zone) * config.move_rate;
    engine.set_velocities(body, velocities);

    if sample.flags().contains(ActionFlags::JUMP) {
        engine.apply_impulse(body, Vec3::Y * config.jump_impulse);
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CancelMode {
    #[default]
    Direct,
    Impulse,
}

/// Stops a proxy body the local peer neither owns nor simulates
/// authoritatively, so local physics does not fight incoming poses.
pub fn cancel_velocity<E: PhysicsEngine>(
    engine: &mut E,
    body: BodyId,
    mode: CancelMode,
) -> Result<()> {
    match mode {
        CancelMode::Direct => {
            if !engine.contains(body) {
                return Err(Error::MissingBody(body));
            }
            engine.set_velocities(body, Velocities::ZERO);
        }
        CancelMode::Impulse => {
            let velocities = engine.velocities(body).ok_or(Error::MissingBody(body))?;
            engine.apply_impulse(body, -velocities.linear);
            engine.apply_torque_impulse(body, -velocities.angular);
        }
    }
    Ok(())
}
