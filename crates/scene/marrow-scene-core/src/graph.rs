//! Scene graph: arena storage plus pull-based world-transform resolution.
//!
//! Writes mark a node and its whole subtree stale; world values are
//! recomputed on the first read afterwards, parent before child, then
//! cached until the next write. Bone attachment adds one out-of-band
//! dependency: a child can follow a bone of its parent actor's animated
//! skeleton instead of the parent's rigid transform alone.

use glam::{Mat4, Quat, Vec3};

use marrow_animation_core::{AnimationMixer, ClipLibrary, Transform};

use crate::error::SceneError;
use crate::node::{BoundingSphere, Node, NodeId, NodeKind};

#[derive(Debug, Default)]
struct Slot {
    generation: u32,
    node: Option<Node>,
}

/// Hierarchical transform graph.
///
/// Parent and child links are plain generational ids; the graph models
/// relationships, never ownership or lifetime. All accessors that can
/// trigger resolution take `&mut self`, keeping the cache single-writer.
#[derive(Debug, Default)]
pub struct SceneGraph {
    slots: Vec<Slot>,
    free: Vec<u32>,
}

impl SceneGraph {
    pub fn new() -> Self {
        Self::default()
    }

    fn node(&self, id: NodeId) -> Option<&Node> {
        let slot = self.slots.get(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.node.as_ref()
    }

    fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.node.as_mut()
    }

    /// Inserts a detached node and returns its id.
    pub fn insert(&mut self, name: &str, kind: NodeKind) -> NodeId {
        let node = Node::new(name, kind);
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.node = Some(node);
            NodeId {
                index,
                generation: slot.generation,
            }
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(Slot {
                generation: 0,
                node: Some(node),
            });
            NodeId {
                index,
                generation: 0,
            }
        }
    }

    /// Removes a node: detaches it from its parent and orphans its
    /// children, which stay in the graph as roots.
    pub fn remove(&mut self, id: NodeId) -> bool {
        if self.node(id).is_none() {
            return false;
        }
        self.detach(id);

        let children = self
            .node(id)
            .map(|node| node.children.clone())
            .unwrap_or_default();
        for child in children {
            if let Some(node) = self.node_mut(child) {
                node.parent = None;
                node.bone_index = None;
            }
            self.invalidate(child);
        }

        let slot = &mut self.slots[id.index as usize];
        slot.node = None;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        true
    }

    #[inline]
    pub fn contains(&self, id: NodeId) -> bool {
        self.node(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.node.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Live node ids, in slot order.
    pub fn ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.node.as_ref().map(|_| NodeId {
                index: index as u32,
                generation: slot.generation,
            })
        })
    }

    pub fn name(&self, id: NodeId) -> Option<&str> {
        self.node(id).map(|node| node.name.as_str())
    }

    /// First node carrying the given name.
    pub fn find(&self, name: &str) -> Option<NodeId> {
        self.slots.iter().enumerate().find_map(|(index, slot)| {
            slot.node
                .as_ref()
                .filter(|node| node.name == name)
                .map(|_| NodeId {
                    index: index as u32,
                    generation: slot.generation,
                })
        })
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id)?.parent
    }

    pub fn children(&self, id: NodeId) -> Option<&[NodeId]> {
        self.node(id).map(|node| node.children.as_slice())
    }

    /// Bone this node follows in its parent actor's skeleton, if any.
    pub fn bone_attachment(&self, id: NodeId) -> Option<u16> {
        self.node(id)?.bone_index
    }

    pub fn kind(&self, id: NodeId) -> Option<&NodeKind> {
        self.node(id).map(|node| &node.kind)
    }

    pub fn kind_mut(&mut self, id: NodeId) -> Option<&mut NodeKind> {
        self.node_mut(id).map(|node| &mut node.kind)
    }

    /// The animation mixer of an actor node, when it carries one.
    pub fn mixer_mut(&mut self, id: NodeId) -> Option<&mut AnimationMixer> {
        match self.node_mut(id).map(|node| &mut node.kind) {
            Some(NodeKind::Actor {
                mixer: Some(mixer), ..
            }) => Some(mixer),
            _ => None,
        }
    }

    pub fn set_position(&mut self, id: NodeId, position: Vec3) {
        let Some(node) = self.node_mut(id) else {
            return;
        };
        node.local_position = position;
        self.invalidate(id);
    }

    pub fn set_rotation(&mut self, id: NodeId, rotation: Quat) {
        let Some(node) = self.node_mut(id) else {
            return;
        };
        node.local_rotation = rotation.normalize();
        self.invalidate(id);
    }

    pub fn set_scale(&mut self, id: NodeId, scale: Vec3) {
        let Some(node) = self.node_mut(id) else {
            return;
        };
        node.local_scale = scale;
        self.invalidate(id);
    }

    pub fn local_position(&self, id: NodeId) -> Option<Vec3> {
        self.node(id).map(|node| node.local_position)
    }

    pub fn local_rotation(&self, id: NodeId) -> Option<Quat> {
        self.node(id).map(|node| node.local_rotation)
    }

    pub fn local_scale(&self, id: NodeId) -> Option<Vec3> {
        self.node(id).map(|node| node.local_scale)
    }

    /// True when `ancestor` is `node` itself or sits on its parent chain.
    pub fn is_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.node(id).and_then(|n| n.parent);
        }
        false
    }

    /// Attaches `child` under `parent`, detaching it from any prior parent.
    ///
    /// With `bone`, the child follows that bone of the parent actor's
    /// skeleton; a name that does not resolve attaches the child rigidly.
    /// Self-attachment and attachment to a descendant fail with no side
    /// effects.
    pub fn attach(
        &mut self,
        child: NodeId,
        parent: NodeId,
        bone: Option<&str>,
    ) -> Result<(), SceneError> {
        if self.node(child).is_none() || self.node(parent).is_none() {
            return Err(SceneError::DeadNode);
        }
        if child == parent {
            return Err(SceneError::SelfAttach);
        }
        if self.is_ancestor(child, parent) {
            return Err(SceneError::CyclicAttach);
        }

        self.detach(child);

        let bone_index = match bone {
            Some(name) => {
                let index = self.parent_actor_bone(parent, name);
                if index.is_none() {
                    log::warn!("bone '{name}' not found on attach; node follows the parent rigidly");
                }
                index
            }
            None => None,
        };

        if let Some(parent_node) = self.node_mut(parent) {
            parent_node.children.push(child);
        }
        if let Some(child_node) = self.node_mut(child) {
            child_node.parent = Some(parent);
            child_node.bone_index = bone_index;
        }
        self.invalidate(child);
        Ok(())
    }

    /// Detaches `child` from its parent, clearing any bone attachment.
    pub fn detach(&mut self, child: NodeId) {
        let Some(node) = self.node(child) else {
            return;
        };
        if let Some(parent) = node.parent {
            if let Some(parent_node) = self.node_mut(parent) {
                parent_node.children.retain(|c| *c != child);
            }
        }
        if let Some(node) = self.node_mut(child) {
            node.parent = None;
            node.bone_index = None;
        }
        self.invalidate(child);
    }

    /// Bone index resolved against the parent actor's current skeleton
    /// instance; `None` when the parent is no actor or the name is unknown.
    fn parent_actor_bone(&self, id: NodeId, name: &str) -> Option<u16> {
        match self.node(id).map(|node| &node.kind) {
            Some(NodeKind::Actor {
                mixer: Some(mixer), ..
            }) => mixer.instance().bone_index(name),
            _ => None,
        }
    }

    /// Clears the cached world state of `id` and every descendant.
    ///
    /// A node that is already stale short-circuits: staleness always covers
    /// the whole subtree below it.
    fn invalidate(&mut self, id: NodeId) {
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let Some(node) = self.node_mut(current) else {
                continue;
            };
            if !node.updated {
                continue;
            }
            node.updated = false;
            stack.extend(node.children.iter().copied());
        }
    }

    /// True while the node's cached world state is current.
    pub fn is_resolved(&self, id: NodeId) -> bool {
        self.node(id).map(|node| node.updated).unwrap_or(false)
    }

    /// Resolves the cached world transform of `id`, parents first.
    pub fn resolve(&mut self, id: NodeId) {
        let (parent, updated) = match self.node(id) {
            Some(node) => (node.parent, node.updated),
            None => return,
        };
        if updated {
            return;
        }

        if let Some(parent) = parent {
            self.resolve(parent);
        }

        // The animated bone pose folds in before the parent's rigid
        // transform; fetching it may itself refresh the instance's cache.
        let bone_transform: Option<Transform> =
            match (parent, self.node(id).and_then(|node| node.bone_index)) {
                (Some(parent), Some(bone)) => self.combined_bone_transform(parent, bone),
                _ => None,
            };

        let parent_state = parent
            .and_then(|p| self.node(p))
            .map(|p| (p.world_position, p.world_rotation, p.world_scale));

        let Some(node) = self.node_mut(id) else {
            return;
        };
        let mut position = node.local_position;
        let mut rotation = node.local_rotation;
        let mut scale = node.local_scale;

        if let Some((parent_position, parent_rotation, parent_scale)) = parent_state {
            if let Some(bone) = bone_transform {
                position = bone.position + bone.rotation * position;
                rotation = bone.rotation * rotation;
            }
            position *= parent_scale;
            position = parent_position + parent_rotation * position;
            rotation = parent_rotation * rotation;
            scale *= parent_scale;
        }

        node.world_position = position;
        node.world_rotation = rotation;
        node.world_scale = scale;
        node.world_matrix = Mat4::from_scale_rotation_translation(scale, rotation, position);
        node.updated = true;

        self.run_update_hook(id);
    }

    /// Resolves every live node; the once-per-frame flush.
    pub fn resolve_all(&mut self) {
        let ids: Vec<NodeId> = self.ids().collect();
        for id in ids {
            self.resolve(id);
        }
    }

    fn combined_bone_transform(&mut self, id: NodeId, bone: u16) -> Option<Transform> {
        match self.node_mut(id).map(|node| &mut node.kind) {
            Some(NodeKind::Actor {
                mixer: Some(mixer), ..
            }) => mixer
                .instance_mut()
                .combined_bone_transforms()
                .get(usize::from(bone))
                .copied(),
            _ => None,
        }
    }

    fn run_update_hook(&mut self, id: NodeId) {
        let Some(node) = self.node_mut(id) else {
            return;
        };
        let world_position = node.world_position;
        let world_matrix = node.world_matrix;
        let max_scale = node.world_scale.abs().max_element();
        match &mut node.kind {
            NodeKind::Group => {}
            NodeKind::Actor {
                local_radius,
                bounds,
                ..
            } => {
                *bounds = BoundingSphere {
                    center: world_position,
                    radius: *local_radius * max_scale,
                };
            }
            NodeKind::Light { range, bounds } => {
                *bounds = BoundingSphere {
                    center: world_position,
                    radius: *range,
                };
            }
            NodeKind::Camera { view } => {
                *view = world_matrix.inverse();
            }
            NodeKind::ParticleSystem {
                local_radius,
                bounds,
            } => {
                *bounds = BoundingSphere {
                    center: world_position,
                    radius: *local_radius * max_scale,
                };
            }
        }
    }

    pub fn world_position(&mut self, id: NodeId) -> Option<Vec3> {
        self.resolve(id);
        self.node(id).map(|node| node.world_position)
    }

    pub fn world_rotation(&mut self, id: NodeId) -> Option<Quat> {
        self.resolve(id);
        self.node(id).map(|node| node.world_rotation)
    }

    pub fn world_scale(&mut self, id: NodeId) -> Option<Vec3> {
        self.resolve(id);
        self.node(id).map(|node| node.world_scale)
    }

    /// World matrix as scale, then rotation, then translation.
    pub fn world_matrix(&mut self, id: NodeId) -> Option<Mat4> {
        self.resolve(id);
        self.node(id).map(|node| node.world_matrix)
    }

    /// Kind-specific bounding sphere, resolved first. `None` for kinds
    /// without bounds.
    pub fn bounds(&mut self, id: NodeId) -> Option<BoundingSphere> {
        self.resolve(id);
        match self.node(id).map(|node| &node.kind) {
            Some(NodeKind::Actor { bounds, .. })
            | Some(NodeKind::Light { bounds, .. })
            | Some(NodeKind::ParticleSystem { bounds, .. }) => Some(*bounds),
            _ => None,
        }
    }

    /// View matrix of a camera node, resolved first.
    pub fn view_matrix(&mut self, id: NodeId) -> Option<Mat4> {
        self.resolve(id);
        match self.node(id).map(|node| &node.kind) {
            Some(NodeKind::Camera { view }) => Some(*view),
            _ => None,
        }
    }

    /// Advances every actor's animation mixer, then invalidates the
    /// bone-attached children of any actor whose pose changed so their next
    /// read folds the fresh pose in.
    pub fn advance_animations(&mut self, elapsed_time: f32, library: &ClipLibrary) {
        let ids: Vec<NodeId> = self.ids().collect();
        for id in ids {
            let mut pose_dirty = false;
            if let Some(node) = self.node_mut(id) {
                if let NodeKind::Actor {
                    mixer: Some(mixer), ..
                } = &mut node.kind
                {
                    mixer.advance(elapsed_time, library);
                    pose_dirty = mixer.instance().is_dirty();
                }
            }
            if !pose_dirty {
                continue;
            }

            let children = self
                .node(id)
                .map(|node| node.children.clone())
                .unwrap_or_default();
            for child in children {
                if self.node(child).and_then(|node| node.bone_index).is_some() {
                    self.invalidate(child);
                }
            }
        }
    }
}
