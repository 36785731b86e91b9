//! Bind-pose skeleton data shared read-only by every posable instance.

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use crate::error::AnimationError;
use crate::transform::Transform;

/// One bone of the bind pose.
///
/// `offset_transform` maps model space into the bone's local space (the
/// inverse bind transform), which is exactly what vertex skinning needs
/// re-applied at the end of pose resolution.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Bone {
    pub name: String,
    /// Parent bone index; `None` for roots. Always smaller than the bone's
    /// own index.
    pub parent: Option<u16>,
    pub offset_transform: Transform,
}

/// Immutable bind-pose skeleton: the bone list plus the derived rest-pose
/// local transforms. Built once at mesh-load time and shared (`Arc`) by any
/// number of instances, each posed independently.
#[derive(Clone, Debug)]
pub struct Skeleton {
    bones: Vec<Bone>,
    initial_local_transforms: Vec<Transform>,
    bones_by_name: HashMap<String, u16>,
}

impl Skeleton {
    /// Builds a skeleton, deriving rest-pose local transforms from the
    /// inverse bind transforms.
    ///
    /// Bones must be ordered parent-before-child; the bottom-up resolution
    /// in [`crate::SkeletonInstance`] relies on it. An `Err` leaves nothing
    /// behind.
    pub fn new(bones: Vec<Bone>) -> Result<Self, AnimationError> {
        let max = usize::from(u16::MAX);
        if bones.len() > max {
            return Err(AnimationError::TooManyBones {
                count: bones.len(),
                max,
            });
        }
        for (index, bone) in bones.iter().enumerate() {
            if let Some(parent) = bone.parent {
                if usize::from(parent) >= index {
                    return Err(AnimationError::InvalidBoneParent {
                        name: bone.name.clone(),
                        index,
                        parent: usize::from(parent),
                    });
                }
            }
        }

        let mut bones_by_name = HashMap::with_capacity(bones.len());
        for (index, bone) in bones.iter().enumerate() {
            // First occurrence wins for duplicated names.
            bones_by_name
                .entry(bone.name.clone())
                .or_insert(index as u16);
        }

        // Bind transform of every bone in model space, then re-expressed
        // relative to its parent to get the rest pose.
        let bind: Vec<Transform> = bones
            .iter()
            .map(|bone| bone.offset_transform.inverse())
            .collect();
        let initial_local_transforms = bones
            .iter()
            .enumerate()
            .map(|(index, bone)| match bone.parent {
                Some(parent) => bind[index].difference(&bind[usize::from(parent)]),
                None => bind[index],
            })
            .collect();

        Ok(Self {
            bones,
            initial_local_transforms,
            bones_by_name,
        })
    }

    /// Index of the bone with the given name, if any. Unknown names are
    /// expected (clip/model authoring mismatches), not an error.
    #[inline]
    pub fn bone_index(&self, name: &str) -> Option<u16> {
        self.bones_by_name.get(name).copied()
    }

    #[inline]
    pub fn bones(&self) -> &[Bone] {
        &self.bones
    }

    #[inline]
    pub fn bone_count(&self) -> usize {
        self.bones.len()
    }

    /// Rest-pose local transforms, parent-relative, one per bone.
    #[inline]
    pub fn initial_local_transforms(&self) -> &[Transform] {
        &self.initial_local_transforms
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{Quat, Vec3};

    fn bone(name: &str, parent: Option<u16>) -> Bone {
        Bone {
            name: name.to_string(),
            parent,
            offset_transform: Transform::new(Quat::IDENTITY, Vec3::new(0.0, -1.0, 0.0)),
        }
    }

    #[test]
    fn rejects_parent_at_or_after_child() {
        let err = Skeleton::new(vec![bone("a", None), bone("b", Some(1))]).unwrap_err();
        assert!(matches!(err, AnimationError::InvalidBoneParent { index: 1, .. }));
        let err = Skeleton::new(vec![bone("a", Some(0))]).unwrap_err();
        assert!(matches!(err, AnimationError::InvalidBoneParent { index: 0, .. }));
    }

    #[test]
    fn duplicate_names_resolve_to_first_index() {
        let skeleton = Skeleton::new(vec![bone("x", None), bone("x", Some(0))]).unwrap();
        assert_eq!(skeleton.bone_index("x"), Some(0));
        assert_eq!(skeleton.bone_index("missing"), None);
    }

    #[test]
    fn root_rest_pose_is_the_bind_transform() {
        let offset = Transform::new(Quat::from_rotation_z(0.5), Vec3::new(1.0, 2.0, 3.0));
        let skeleton = Skeleton::new(vec![Bone {
            name: "root".to_string(),
            parent: None,
            offset_transform: offset,
        }])
        .unwrap();
        let rest = skeleton.initial_local_transforms()[0];
        let expected = offset.inverse();
        assert!((rest.position - expected.position).length() < 1e-6);
        assert!(rest.rotation.dot(expected.rotation).abs() > 1.0 - 1e-6);
    }
}
