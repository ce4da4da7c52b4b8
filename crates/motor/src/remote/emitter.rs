use serde::{Deserialize, Serialize};

use crate::net::RemotePoseUpdate;
use crate::physics::Transform;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmitterConfig {
    pub position_sensitivity: f32,
    /// Degrees.
    pub rotation_sensitivity: f32,
    pub scale_sensitivity: f32,
    /// Minimum seconds between two updates, if any.
    pub min_interval: Option<f64>,
}

impl Default for EmitterConfig {
    fn default() -> Self {
        Self {
            position_sensitivity: 0.01,
            rotation_sensitivity: 0.01,
            scale_sensitivity: 0.01,
            min_interval: None,
        }
    }
}

/// Authority-side filter that only lets a pose through when it moved, turned
/// or scaled by more than the configured sensitivity since the last one sent.
#[derive(Debug, Clone, Default)]
pub struct PoseEmitter {
    config: EmitterConfig,
    last_sent: Option<Transform>,
    last_sent_at: Option<f64>,
}

impl PoseEmitter {
    pub fn new(config: EmitterConfig) -> Self {
        Self {
            config,
            last_sent: None,
            last_sent_at: None,
        }
    }

    pub fn last_sent(&self) -> Option<&Transform> {
        self.last_sent.as_ref()
    }

    pub fn has_changed(&self, transform: &Transform) -> bool {
        let Some(last) = self.last_sent else {
            return true;
        };

        let moved = last.position.distance(transform.position) > self.config.position_sensitivity;
        let scaled = last.scale.distance(transform.scale) > self.config.scale_sensitivity;
        let rotated = last.rotation.angle_between(transform.rotation).to_degrees()
            > self.config.rotation_sensitivity;
        moved || rotated || scaled
    }

    pub fn poll(&mut self, now: f64, transform: &Transform) -> Option<RemotePoseUpdate> {
        if let (Some(interval), Some(last_at)) = (self.config.min_interval, self.last_sent_at) {
            if now - last_at < interval {
                return None;
            }
        }

        if !self.has_changed(transform) {
            return None;
        }

        self.last_sent = Some(*transform);
        self.last_sent_at = Some(now);
        Some(RemotePoseUpdate::from_transform(transform))
    }
}
