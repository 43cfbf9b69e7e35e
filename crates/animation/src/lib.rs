use serde::{Deserialize, Serialize};
use thiserror::Error;

mod angle;
pub use angle::Angle;
mod track;
pub use track::*;
mod params;
pub use params::*;
mod store;
pub use store::*;

/// 1-based time in frames, supports negatives for offsets.
pub type Frame = i64;

#[derive(Debug, Error)]
pub enum AnimationError {
    #[error("degenerate keyframe interval at frame {0}: two keyframes share a time")]
    DegenerateInterval(Frame),
    #[error("parameter not found: {0:?}")]
    ParameterNotFound(ParameterId),
}

/// Parameter identifiers, one per animatable track the host registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParameterId {
    HueSaturation,
    Brightness,
}
