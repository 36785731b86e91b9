//! Error types for the animation core.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum AnimationError {
    /// A bone's parent index must be strictly smaller than its own index
    /// (parents come first; this also rules out cycles).
    #[error("bone '{name}' at index {index} has invalid parent index {parent}")]
    InvalidBoneParent {
        name: String,
        index: usize,
        parent: usize,
    },

    /// Bone indices are 16-bit.
    #[error("skeleton has {count} bones, more than the supported {max}")]
    TooManyBones { count: usize, max: usize },

    /// The clip handle is stale or was never registered in the library.
    #[error("animation clip handle does not resolve")]
    UnresolvedClip,

    /// Playback slot index out of range.
    #[error("no playback slot at index {index} (slot count {len})")]
    SlotOutOfRange { index: usize, len: usize },
}
