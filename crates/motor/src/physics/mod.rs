mod body;
mod world;

pub use body::{BodyId, BodyState, PhysicsEngine, Pose, Transform, Velocities};
pub use world::{PhysicsConfig, PhysicsWorld};
