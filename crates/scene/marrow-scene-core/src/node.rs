//! Scene nodes: generation-checked ids, kind payloads, cached transform state.

use std::sync::Arc;

use glam::{Mat4, Quat, Vec3};
use serde::{Deserialize, Serialize};

use marrow_animation_core::{AnimationMixer, Skeleton};

/// Stable, generation-checked node id.
///
/// Ids survive unrelated removals; an id whose node was removed resolves to
/// nothing instead of dangling, even after the slot is reused.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct NodeId {
    pub(crate) index: u32,
    pub(crate) generation: u32,
}

/// World-space bounding sphere, refreshed by the per-kind update hook at
/// the end of transform resolution.
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BoundingSphere {
    pub center: Vec3,
    pub radius: f32,
}

/// Per-kind payload. Subtype dispatch is a tagged enum: the scene runs the
/// matching update hook after resolving a node's world transform.
#[derive(Debug, Default)]
pub enum NodeKind {
    /// Plain transform node with no extra behavior.
    #[default]
    Group,
    /// Skinned entity driving a skeleton through an animation mixer. A
    /// rigid actor carries no mixer.
    Actor {
        mixer: Option<AnimationMixer>,
        local_radius: f32,
        bounds: BoundingSphere,
    },
    Light {
        range: f32,
        bounds: BoundingSphere,
    },
    Camera {
        /// View matrix, the inverse of the node's world matrix.
        view: Mat4,
    },
    ParticleSystem {
        local_radius: f32,
        bounds: BoundingSphere,
    },
}

impl NodeKind {
    /// A skinned actor posed by `skeleton`.
    pub fn actor(skeleton: &Arc<Skeleton>, local_radius: f32) -> Self {
        NodeKind::Actor {
            mixer: Some(AnimationMixer::new(skeleton)),
            local_radius,
            bounds: BoundingSphere::default(),
        }
    }
}

/// One node of the hierarchy. Local values are what callers author; world
/// values and the matrix are caches guarded by `updated`.
#[derive(Debug)]
pub(crate) struct Node {
    pub name: String,
    pub kind: NodeKind,

    pub local_position: Vec3,
    pub local_rotation: Quat,
    pub local_scale: Vec3,

    pub world_position: Vec3,
    pub world_rotation: Quat,
    pub world_scale: Vec3,
    pub world_matrix: Mat4,
    pub updated: bool,

    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    /// Bone in the parent actor's skeleton this node follows, if any.
    pub bone_index: Option<u16>,
}

impl Node {
    pub(crate) fn new(name: &str, kind: NodeKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            local_position: Vec3::ZERO,
            local_rotation: Quat::IDENTITY,
            local_scale: Vec3::ONE,
            world_position: Vec3::ZERO,
            world_rotation: Quat::IDENTITY,
            world_scale: Vec3::ONE,
            world_matrix: Mat4::IDENTITY,
            updated: false,
            parent: None,
            children: Vec::new(),
            bone_index: None,
        }
    }
}
