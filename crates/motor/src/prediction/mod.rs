mod buffer;
mod input;
mod movement;
mod owner;
mod queue;
mod server;

pub use buffer::{PredictionBuffer, DEFAULT_PREDICTION_CAPACITY};
pub use input::InputState;
pub use movement::{apply_input, axis_sign, cancel_velocity, CancelMode, MotorConfig};
pub use owner::OwnerMotor;
pub use queue::{ReceivedInputQueue, DEFAULT_QUEUE_CAPACITY};
pub use server::{ServerMotor, ServerPolicy, ServerReply};
