//! Marrow animation core (engine-agnostic).
//!
//! Skeletal pose blending: bind-pose skeletons, posable instances with
//! lazily cached combined/final bone transforms, and per-slot playback
//! state machines mixing several clips into one pose. Renderers consume
//! [`SkeletonInstance::final_bone_transforms`]; scene hierarchies fold
//! [`SkeletonInstance::combined_bone_transforms`] into bone-attached nodes.
//!
//! Clips are opaque: anything implementing [`AnimationClip`] can drive
//! playback, registered in an explicit [`ClipLibrary`] and referenced by
//! generation-checked handles.

pub mod clip;
pub mod error;
pub mod instance;
pub mod library;
pub mod mixer;
pub mod skeleton;
pub mod transform;

// Re-exports for consumers (scene layer, adapters).
pub use clip::{AnimationClip, BonePose, KeyframeClip};
pub use error::AnimationError;
pub use instance::SkeletonInstance;
pub use library::{ClipHandle, ClipLibrary};
pub use mixer::{AnimationMixer, ClipPlayer, PlaybackState};
pub use skeleton::{Bone, Skeleton};
pub use transform::{Transform, EPSILON};
