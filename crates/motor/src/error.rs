use rkyv::rancor;

use crate::physics::BodyId;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("physics body {0:?} is not present in the physics world")]
    MissingBody(BodyId),
    #[error("message serialization failed: {0}")]
    Serialize(rancor::Error),
    #[error("message deserialization failed: {0}")]
    Deserialize(rancor::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
