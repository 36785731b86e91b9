//! Per-actor mutable pose over a shared [`Skeleton`].

use std::sync::{Arc, Weak};

use crate::clip::BonePose;
use crate::skeleton::Skeleton;
use crate::transform::Transform;

/// A posable instance of a shared skeleton.
///
/// Local bone transforms are written by pose blending; combined and final
/// transforms are caches recomputed lazily on the first read after a write
/// (the accessors take `&mut self`, so the cache never mutates behind a
/// shared reference). When the skeleton has been dropped the instance turns
/// inert: writes are ignored and reads return the last cached data.
#[derive(Clone, Debug)]
pub struct SkeletonInstance {
    skeleton: Weak<Skeleton>,
    local_transforms: Vec<Transform>,
    combined_transforms: Vec<Transform>,
    final_transforms: Vec<Transform>,
    dirty: bool,
}

impl SkeletonInstance {
    /// Creates an instance posed at the skeleton's rest pose.
    pub fn new(skeleton: &Arc<Skeleton>) -> Self {
        let local_transforms = skeleton.initial_local_transforms().to_vec();
        let count = local_transforms.len();
        Self {
            skeleton: Arc::downgrade(skeleton),
            local_transforms,
            combined_transforms: vec![Transform::IDENTITY; count],
            final_transforms: vec![Transform::IDENTITY; count],
            dirty: true,
        }
    }

    /// The backing skeleton, provided it is still alive and still matches
    /// this instance's bone count.
    fn live_skeleton(&self) -> Option<Arc<Skeleton>> {
        let skeleton = self.skeleton.upgrade()?;
        if skeleton.bone_count() == self.local_transforms.len() {
            Some(skeleton)
        } else {
            None
        }
    }

    #[inline]
    pub fn is_live(&self) -> bool {
        self.live_skeleton().is_some()
    }

    #[inline]
    pub fn bone_count(&self) -> usize {
        self.local_transforms.len()
    }

    /// Forwards to [`Skeleton::bone_index`]; `None` once the skeleton is
    /// gone.
    pub fn bone_index(&self, name: &str) -> Option<u16> {
        self.live_skeleton()?.bone_index(name)
    }

    /// Blends `poses` into the current local transforms.
    ///
    /// Bone names with no match in the skeleton are skipped; mismatched
    /// authoring data between a model and a clip is expected during
    /// iteration. A factor of one (or more) overwrites outright, anything
    /// below interpolates rotation (renormalized) and position.
    pub fn blend_pose(&mut self, poses: &[BonePose], blend_factor: f32) {
        if poses.is_empty() {
            return;
        }
        let Some(skeleton) = self.live_skeleton() else {
            log::debug!("blend_pose on an instance whose skeleton is gone; ignored");
            return;
        };

        if blend_factor >= 1.0 {
            for pose in poses {
                let Some(index) = skeleton.bone_index(&pose.bone) else {
                    continue;
                };
                self.local_transforms[usize::from(index)] = pose.transform;
            }
        } else {
            for pose in poses {
                let Some(index) = skeleton.bone_index(&pose.bone) else {
                    continue;
                };
                let local = &mut self.local_transforms[usize::from(index)];
                *local = local.blend(&pose.transform, blend_factor);
            }
        }

        self.dirty = true;
    }

    /// Restores the skeleton's rest pose.
    pub fn set_initial_pose(&mut self) {
        let Some(skeleton) = self.live_skeleton() else {
            return;
        };
        self.local_transforms
            .copy_from_slice(skeleton.initial_local_transforms());
        self.dirty = true;
    }

    #[inline]
    pub fn local_transforms(&self) -> &[Transform] {
        &self.local_transforms
    }

    /// Writes one local bone transform directly (tools, procedural poses).
    pub fn set_local_transform(&mut self, index: u16, transform: Transform) {
        if let Some(slot) = self.local_transforms.get_mut(usize::from(index)) {
            *slot = transform;
            self.dirty = true;
        }
    }

    /// Model-space bone transforms, hierarchy resolved but without the bind
    /// offset applied. Bone-attached scene nodes fold these in.
    pub fn combined_bone_transforms(&mut self) -> &[Transform] {
        self.refresh();
        &self.combined_transforms
    }

    /// Skinning-ready transforms: combined transforms with the bind offset
    /// re-applied. Consumed read-only by renderers, once per visible actor.
    pub fn final_bone_transforms(&mut self) -> &[Transform] {
        self.refresh();
        &self.final_transforms
    }

    /// True while a pose write has not yet been folded into the caches.
    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    fn refresh(&mut self) {
        if !self.dirty {
            return;
        }
        // A dead skeleton keeps the last caches; stale output beats a crash.
        let Some(skeleton) = self.live_skeleton() else {
            return;
        };
        let bones = skeleton.bones();
        for index in 0..self.local_transforms.len() {
            let combined = match bones[index].parent {
                Some(parent) => self.combined_transforms[usize::from(parent)]
                    .compose(&self.local_transforms[index]),
                None => self.local_transforms[index],
            };
            self.combined_transforms[index] = combined;
            self.final_transforms[index] = combined.compose(&bones[index].offset_transform);
        }
        self.dirty = false;
    }
}
