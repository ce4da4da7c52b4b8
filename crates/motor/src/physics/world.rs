use glam::{Quat, Vec3};
use rapier3d::prelude::*;
use serde::{Deserialize, Serialize};

use crate::clock::ManualStep;

use super::body::{BodyId, PhysicsEngine, Pose as BodyPose, Velocities};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhysicsConfig {
    pub gravity: Vec3,
    pub default_dt: f32,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            gravity: Vec3::new(0.0, -9.81, 0.0),
            default_dt: 1.0 / 60.0,
        }
    }
}

impl PhysicsConfig {
    pub fn zero_gravity() -> Self {
        Self {
            gravity: Vec3::ZERO,
            ..Self::default()
        }
    }
}

/// Everything a rigid body lives in. Removing a body touches all of it.
struct BodySets {
    bodies: RigidBodySet,
    colliders: ColliderSet,
    islands: IslandManager,
    impulse_joints: ImpulseJointSet,
    multibody_joints: MultibodyJointSet,
}

/// rapier world that only moves when the owning clock steps it. The step
/// length is whatever the clock's adjusted tick duration is at that moment,
/// so integration parameters are rewritten on every step rather than fixed
/// at construction.
pub struct PhysicsWorld {
    sets: BodySets,
    pipeline: PhysicsPipeline,
    broad_phase: DefaultBroadPhase,
    narrow_phase: NarrowPhase,
    ccd_solver: CCDSolver,
    params: IntegrationParameters,
    gravity: Vector,
    steps: u64,
}

impl BodySets {
    fn new() -> Self {
        Self {
            bodies: RigidBodySet::new(),
            colliders: ColliderSet::new(),
            islands: IslandManager::new(),
            impulse_joints: ImpulseJointSet::new(),
            multibody_joints: MultibodyJointSet::new(),
        }
    }
}

impl Default for PhysicsWorld {
    fn default() -> Self {
        Self::new(PhysicsConfig::default())
    }
}

impl PhysicsWorld {
    pub fn new(config: PhysicsConfig) -> Self {
        let mut world = Self {
            sets: BodySets::new(),
            pipeline: PhysicsPipeline::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            ccd_solver: CCDSolver::new(),
            params: IntegrationParameters::default(),
            gravity: Vector::new(config.gravity.x, config.gravity.y, config.gravity.z),
            steps: 0,
        };
        world.set_step_length(config.default_dt);
        world
    }

    /// Number of manual steps taken since creation.
    pub fn steps(&self) -> u64 {
        self.steps
    }

    fn set_step_length(&mut self, dt: f32) {
        self.params.dt = dt;
        // CCD substeps scale with the step so shortened ticks stay consistent.
        self.params.min_ccd_dt = dt / 100.0;
    }

    /// Static slab whose top face sits at `top`.
    pub fn add_ground(&mut self, top: f32, half_size: f32) -> ColliderHandle {
        let thickness = 0.1;
        self.sets.colliders.insert(
            ColliderBuilder::cuboid(half_size, thickness, half_size)
                .translation(Vector::new(0.0, top - thickness, 0.0))
                .friction(0.0),
        )
    }

    /// Motor-driven body. Never sleeps, so velocities written between steps
    /// always take effect.
    pub fn add_dynamic_sphere(&mut self, position: Vec3, radius: f32, mass: f32) -> BodyId {
        let BodySets {
            bodies, colliders, ..
        } = &mut self.sets;
        let handle = bodies.insert(
            RigidBodyBuilder::dynamic()
                .translation(Vector::new(position.x, position.y, position.z))
                .can_sleep(false),
        );
        colliders.insert_with_parent(
            ColliderBuilder::ball(radius).mass(mass).restitution(0.0),
            handle,
            bodies,
        );
        handle
    }

    pub fn remove_body(&mut self, handle: BodyId) {
        let sets = &mut self.sets;
        sets.bodies.remove(
            handle,
            &mut sets.islands,
            &mut sets.colliders,
            &mut sets.impulse_joints,
            &mut sets.multibody_joints,
            true,
        );
    }
}

impl ManualStep for PhysicsWorld {
    fn manual_step(&mut self, dt: f32) {
        self.set_step_length(dt);

        let sets = &mut self.sets;
        self.pipeline.step(
            self.gravity,
            &self.params,
            &mut sets.islands,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut sets.bodies,
            &mut sets.colliders,
            &mut sets.impulse_joints,
            &mut sets.multibody_joints,
            &mut self.ccd_solver,
            &(),
            &(),
        );
        self.steps += 1;
    }
}

impl PhysicsEngine for PhysicsWorld {
    fn contains(&self, body: BodyId) -> bool {
        self.sets.bodies.contains(body)
    }

    fn pose(&self, body: BodyId) -> Option<BodyPose> {
        self.sets.bodies.get(body).map(|b| {
            let t = b.translation();
            let r = b.rotation();
            BodyPose::new(
                Vec3::new(t.x, t.y, t.z),
                Quat::from_xyzw(r.x, r.y, r.z, r.w),
            )
        })
    }

    fn set_pose(&mut self, body: BodyId, pose: BodyPose) {
        if let Some(b) = self.sets.bodies.get_mut(body) {
            let rot = Rotation::from_xyzw(
                pose.rotation.x,
                pose.rotation.y,
                pose.rotation.z,
                pose.rotation.w,
            )
            .normalize();
            let position = Vector::new(pose.position.x, pose.position.y, pose.position.z);
            b.set_position(Pose::from_parts(position, rot), true);
        }
    }

    fn velocities(&self, body: BodyId) -> Option<Velocities> {
        self.sets.bodies.get(body).map(|b| {
            let v = b.linvel();
            let w = b.angvel();
            Velocities {
                linear: Vec3::new(v.x, v.y, v.z),
                angular: Vec3::new(w.x, w.y, w.z),
            }
        })
    }

    fn set_velocities(&mut self, body: BodyId, velocities: Velocities) {
        if let Some(b) = self.sets.bodies.get_mut(body) {
            let v = velocities.linear;
            let w = velocities.angular;
            b.set_linvel(Vector::new(v.x, v.y, v.z), true);
            b.set_angvel(Vector::new(w.x, w.y, w.z), true);
        }
    }

    fn apply_impulse(&mut self, body: BodyId, impulse: Vec3) {
        if let Some(b) = self.sets.bodies.get_mut(body) {
            b.apply_impulse(Vector::new(impulse.x, impulse.y, impulse.z), true);
        }
    }

    fn apply_torque_impulse(&mut self, body: BodyId, impulse: Vec3) {
        if let Some(b) = self.sets.bodies.get_mut(body) {
            b.apply_torque_impulse(Vector::new(impulse.x, impulse.y, impulse.z), true);
        }
    }

    fn force_transform_sync(&mut self) {
        let sets = &mut self.sets;
        sets.bodies
            .propagate_modified_body_positions_to_colliders(&mut sets.colliders);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_gravity_body_keeps_velocity() {
        let mut world = PhysicsWorld::new(PhysicsConfig::zero_gravity());
        let body = world.add_dynamic_sphere(Vec3::ZERO, 0.5, 1.0);

        world.set_velocities(
            body,
            Velocities {
                linear: Vec3::new(60.0, 0.0, 0.0),
                angular: Vec3::ZERO,
            },
        );
        world.manual_step(1.0 / 60.0);

        let pose = world.pose(body).unwrap();
        assert!((pose.position.x - 1.0).abs() < 1e-4);
        assert_eq!(world.steps(), 1);
    }

    #[test]
    fn step_length_follows_each_call() {
        let mut world = PhysicsWorld::new(PhysicsConfig::zero_gravity());
        let body = world.add_dynamic_sphere(Vec3::ZERO, 0.5, 1.0);
        world.set_velocities(
            body,
            Velocities {
                linear: Vec3::X,
                angular: Vec3::ZERO,
            },
        );

        world.manual_step(0.01);
        world.manual_step(0.03);

        let pose = world.pose(body).unwrap();
        assert!((pose.position.x - 0.04).abs() < 1e-5);
    }

    #[test]
    fn set_pose_round_trips() {
        let mut world = PhysicsWorld::new(PhysicsConfig::zero_gravity());
        let body = world.add_dynamic_sphere(Vec3::ZERO, 0.5, 1.0);

        let rotation = Quat::from_rotation_y(0.5);
        world.set_pose(body, BodyPose::new(Vec3::new(3.0, 1.0, -2.0), rotation));
        world.force_transform_sync();

        let pose = world.pose(body).unwrap();
        assert!((pose.position - Vec3::new(3.0, 1.0, -2.0)).length() < 1e-6);
        assert!(pose.rotation.angle_between(rotation) < 1e-4);
    }

    #[test]
    fn removed_body_is_gone() {
        let mut world = PhysicsWorld::default();
        world.add_ground(0.0, 10.0);
        let body = world.add_dynamic_sphere(Vec3::Y, 0.5, 1.0);
        assert!(world.contains(body));

        world.remove_body(body);
        assert!(!world.contains(body));
        assert!(world.pose(body).is_none());
    }
}
