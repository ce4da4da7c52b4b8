use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::net::RemotePoseUpdate;
use crate::physics::Transform;

const MIN_ELAPSED: f64 = 1e-3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EstimatorConfig {
    /// Nominal interval between pose updates from the authority, in seconds.
    pub send_interval: f64,
    /// Snap to the goal once it is this many start-to-goal spans old.
    pub teleport_factor: f64,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            send_interval: 0.1,
            teleport_factor: 5.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RemotePoseSample {
    pub timestamp: f64,
    pub transform: Transform,
    /// Estimated speed in units per second, never negative.
    pub speed: f32,
}

/// Dead reckoning for an entity this peer does not simulate. Keeps the two
/// most recent reference samples and moves the displayed pose toward the
/// newest one.
#[derive(Debug, Clone, Default)]
pub struct RemoteStateEstimator {
    config: EstimatorConfig,
    start: Option<RemotePoseSample>,
    goal: Option<RemotePoseSample>,
}

impl RemoteStateEstimator {
    pub fn new(config: EstimatorConfig) -> Self {
        Self {
            config,
            start: None,
            goal: None,
        }
    }

    pub fn config(&self) -> &EstimatorConfig {
        &self.config
    }

    pub fn start(&self) -> Option<&RemotePoseSample> {
        self.start.as_ref()
    }

    pub fn goal(&self) -> Option<&RemotePoseSample> {
        self.goal.as_ref()
    }

    pub fn reset(&mut self) {
        self.start = None;
        self.goal = None;
    }

    /// Feeds an update that arrived at `now` while the entity was shown at
    /// `displayed`.
    pub fn receive(&mut self, update: &RemotePoseUpdate, now: f64, displayed: &Transform) {
        let transform = update.transform();
        let speed = self.estimate_speed(transform.position, now, displayed);
        let incoming = RemotePoseSample {
            timestamp: now,
            transform,
            speed,
        };

        match (self.start, self.goal) {
            (Some(old_start), Some(old_goal)) => {
                let old_span = old_start
                    .transform
                    .position
                    .distance(old_goal.transform.position);
                let new_span = old_goal.transform.position.distance(transform.position);

                let mut start = old_goal;
                if displayed.position.distance(start.transform.position) < old_span + new_span {
                    start.transform = *displayed;
                }
                self.start = Some(start);
            }
            _ => {
                self.start = Some(RemotePoseSample {
                    timestamp: now - self.config.send_interval,
                    transform: *displayed,
                    speed,
                });
            }
        }

        self.goal = Some(incoming);
    }

    /// Pose to display this frame. `dt` is the real time since the previous
    /// call. Returns `displayed` untouched until a sample has arrived.
    pub fn extrapolate(&mut self, now: f64, dt: f32, displayed: &Transform) -> Transform {
        if self.needs_teleport(now) {
            log::debug!("remote pose stalled, snapping to goal");
            if let Some(goal) = self.snap_to_goal() {
                return goal;
            }
        }

        let (Some(start), Some(goal)) = (self.start, self.goal) else {
            return *displayed;
        };

        let speed = start.speed.max(goal.speed);
        let position = move_towards(displayed.position, goal.transform.position, speed * dt);

        let t = interpolation_factor(&start, &goal, now);
        Transform {
            position,
            rotation: start.transform.rotation.slerp(goal.transform.rotation, t),
            scale: start.transform.scale.lerp(goal.transform.scale, t),
        }
    }

    /// True once the goal has been outstanding for longer than
    /// `teleport_factor` start-to-goal spans.
    pub fn needs_teleport(&self, now: f64) -> bool {
        let (Some(start), Some(goal)) = (self.start, self.goal) else {
            return false;
        };
        let span = goal.timestamp - start.timestamp;
        now - goal.timestamp > span * self.config.teleport_factor
    }

    /// Jumps straight to the goal and forgets both references, so the next
    /// update is treated as the first one.
    pub fn snap_to_goal(&mut self) -> Option<Transform> {
        let goal = self.goal.take()?;
        self.start = None;
        Some(goal.transform)
    }

    fn estimate_speed(&self, position: Vec3, now: f64, displayed: &Transform) -> f32 {
        let (from, elapsed) = match self.goal {
            Some(goal) => (goal.transform.position, now - goal.timestamp),
            None => (displayed.position, self.config.send_interval),
        };
        let elapsed = elapsed.max(MIN_ELAPSED);
        (f64::from(position.distance(from)) / elapsed) as f32
    }
}

fn interpolation_factor(start: &RemotePoseSample, goal: &RemotePoseSample, now: f64) -> f32 {
    let span = goal.timestamp - start.timestamp;
    if span <= 0.0 {
        return 0.0;
    }
    ((now - goal.timestamp) / span).clamp(0.0, 1.0) as f32
}

fn move_towards(current: Vec3, target: Vec3, max_delta: f32) -> Vec3 {
    let delta = target - current;
    let distance = delta.length();
    if distance <= max_delta || distance <= f32::EPSILON {
        target
    } else {
        current + delta / distance * max_delta
    }
}

#[cfg(test)]
mod tests {
    use glam::Quat;

    use super::*;

    fn update_at(x: f32) -> RemotePoseUpdate {
        RemotePoseUpdate::from_transform(&Transform {
            position: Vec3::new(x, 0.0, 0.0),
            ..Transform::IDENTITY
        })
    }

    #[test]
    fn first_sample_synthesizes_start() {
        let mut estimator = RemoteStateEstimator::default();
        let displayed = Transform::IDENTITY;

        estimator.receive(&update_at(1.0), 2.0, &displayed);

        let start = estimator.start().unwrap();
        let goal = estimator.goal().unwrap();
        assert_eq!(start.transform, displayed);
        assert!((start.timestamp - 1.9).abs() < 1e-9);
        assert_eq!(goal.timestamp, 2.0);
        // One unit over one send interval.
        assert!((goal.speed - 10.0).abs() < 1e-3);
    }

    #[test]
    fn nothing_happens_before_first_sample() {
        let mut estimator = RemoteStateEstimator::default();
        let displayed = Transform {
            position: Vec3::new(4.0, 5.0, 6.0),
            ..Transform::IDENTITY
        };

        assert_eq!(estimator.extrapolate(1.0, 0.016, &displayed), displayed);
        assert!(!estimator.needs_teleport(100.0));
    }

    #[test]
    fn lagging_display_reanchors_start() {
        let mut estimator = RemoteStateEstimator::default();
        let mut displayed = Transform::IDENTITY;
        estimator.receive(&update_at(1.0), 0.1, &displayed);

        displayed.position = Vec3::new(0.5, 0.0, 0.0);
        estimator.receive(&update_at(2.0), 0.2, &displayed);

        let start = estimator.start().unwrap();
        assert_eq!(start.transform.position, displayed.position);
        assert_eq!(start.timestamp, 0.1);
        assert_eq!(estimator.goal().unwrap().transform.position.x, 2.0);
    }

    #[test]
    fn far_display_keeps_old_goal_as_start() {
        let mut estimator = RemoteStateEstimator::default();
        let mut displayed = Transform::IDENTITY;
        estimator.receive(&update_at(1.0), 0.1, &displayed);

        displayed.position = Vec3::new(50.0, 0.0, 0.0);
        estimator.receive(&update_at(2.0), 0.2, &displayed);

        assert_eq!(estimator.start().unwrap().transform.position.x, 1.0);
    }

    #[test]
    fn converges_without_overshoot() {
        let mut estimator = RemoteStateEstimator::new(EstimatorConfig {
            teleport_factor: 1000.0,
            ..EstimatorConfig::default()
        });
        let goal_rotation = Quat::from_rotation_y(1.0);
        let update = RemotePoseUpdate::from_transform(&Transform {
            position: Vec3::new(3.0, 0.0, 0.0),
            rotation: goal_rotation,
            scale: Vec3::splat(2.0),
        });

        let mut displayed = Transform::IDENTITY;
        let mut now = 1.0;
        estimator.receive(&update, now, &displayed);

        let dt = 1.0 / 60.0;
        let mut last_x = displayed.position.x;
        for _ in 0..240 {
            now += f64::from(dt);
            displayed = estimator.extrapolate(now, dt, &displayed);
            assert!(displayed.position.x >= last_x);
            assert!(displayed.position.x <= 3.0);
            last_x = displayed.position.x;
        }

        assert_eq!(displayed.position, Vec3::new(3.0, 0.0, 0.0));
        assert!(displayed.rotation.angle_between(goal_rotation) < 1e-4);
        assert!((displayed.scale - Vec3::splat(2.0)).length() < 1e-5);
    }

    #[test]
    fn teleport_only_after_five_spans() {
        let mut estimator = RemoteStateEstimator::default();
        let displayed = Transform::IDENTITY;
        // First sample: start is one send interval (0.1 s) before the goal.
        estimator.receive(&update_at(1.0), 1.0, &displayed);
        let span = 0.1;

        assert!(!estimator.needs_teleport(1.0 + 5.0 * span - 1e-6));
        let moved = estimator.extrapolate(1.0 + 5.0 * span - 1e-6, 0.0, &displayed);
        assert_eq!(moved.position, Vec3::ZERO);
        assert!(estimator.goal().is_some());

        let snapped = estimator.extrapolate(1.0 + 5.0 * span + 1e-6, 0.0, &displayed);
        assert_eq!(snapped.position, Vec3::new(1.0, 0.0, 0.0));
        assert!(estimator.start().is_none());
        assert!(estimator.goal().is_none());
    }

    #[test]
    fn snap_to_goal_resets() {
        let mut estimator = RemoteStateEstimator::default();
        assert!(estimator.snap_to_goal().is_none());

        estimator.receive(&update_at(7.0), 0.0, &Transform::IDENTITY);
        let snapped = estimator.snap_to_goal().unwrap();

        assert_eq!(snapped.position.x, 7.0);
        assert!(estimator.goal().is_none());
    }
}
