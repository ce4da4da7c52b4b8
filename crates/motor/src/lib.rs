pub mod clock;
pub mod error;
pub mod net;
pub mod physics;
pub mod prediction;
pub mod remote;

pub use clock::{ClockConfig, ClockState, FixedClock, ManualStep, Phase, PhaseContext, SubscriptionId};
pub use error::{Error, Result};
pub use net::{
    ActionFlags, AuthoritativeSnapshot, InputSample, LinkConditions, LossyLink, Message, Packet,
    RemotePoseUpdate, TimingOnlyHint,
};
pub use physics::{BodyId, BodyState, PhysicsConfig, PhysicsEngine, PhysicsWorld, Pose, Transform, Velocities};
pub use prediction::{
    CancelMode, InputState, MotorConfig, OwnerMotor, PredictionBuffer, ReceivedInputQueue,
    ServerMotor, ServerPolicy, ServerReply,
};
pub use remote::{EmitterConfig, EstimatorConfig, PoseEmitter, RemoteStateEstimator};
