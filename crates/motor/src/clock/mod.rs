mod phase;
mod tick;

pub use phase::{Phase, PhaseCallback, PhaseContext, PhaseRegistry, SubscriptionId};
pub use tick::{ClockConfig, ClockState, FixedClock, ManualStep};
