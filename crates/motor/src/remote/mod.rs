mod emitter;
mod estimator;

pub use emitter::{EmitterConfig, PoseEmitter};
pub use estimator::{EstimatorConfig, RemotePoseSample, RemoteStateEstimator};
