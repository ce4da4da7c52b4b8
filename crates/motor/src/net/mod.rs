mod link;
mod protocol;

pub use link::{LinkConditions, LinkStats, LossyLink};
pub use protocol::{
    clamp_timing_step, tick_at_or_before, tick_newer, ActionFlags, ArchivedMessage, ArchivedPacket,
    AuthoritativeSnapshot, InputSample, Message, Packet, RemotePoseUpdate, TimingOnlyHint,
};
