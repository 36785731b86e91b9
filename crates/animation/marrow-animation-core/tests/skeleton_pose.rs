use std::sync::Arc;

use glam::{Quat, Vec3};
use marrow_animation_core::{Bone, BonePose, Skeleton, SkeletonInstance, Transform};

fn approx(a: f32, b: f32, eps: f32) {
    assert!((a - b).abs() <= eps, "left={a} right={b} eps={eps}");
}

fn approx_vec(a: Vec3, b: Vec3, eps: f32) {
    approx(a.x, b.x, eps);
    approx(a.y, b.y, eps);
    approx(a.z, b.z, eps);
}

fn approx_quat(a: Quat, b: Quat, eps: f32) {
    // q and -q describe the same rotation.
    approx(a.dot(b).abs(), 1.0, eps);
}

fn approx_transform(a: &Transform, b: &Transform, eps: f32) {
    approx_vec(a.position, b.position, eps);
    approx_quat(a.rotation, b.rotation, eps);
}

fn bone(name: &str, parent: Option<u16>, bind: Transform) -> Bone {
    Bone {
        name: name.to_string(),
        parent,
        offset_transform: bind.inverse(),
    }
}

/// Two-bone chain with non-trivial bind rotations and translations.
fn arm_skeleton() -> (Arc<Skeleton>, Transform, Transform) {
    let bind_root = Transform::new(Quat::from_rotation_z(0.3), Vec3::new(1.0, 2.0, 3.0));
    let bind_child = Transform::new(Quat::from_rotation_x(-0.7), Vec3::new(4.0, 0.0, -2.0));
    let skeleton = Skeleton::new(vec![
        bone("shoulder", None, bind_root),
        bone("elbow", Some(0), bind_child),
    ])
    .unwrap();
    (Arc::new(skeleton), bind_root, bind_child)
}

/// it should reproduce the bind transforms when composing the rest pose bottom-up
#[test]
fn rest_pose_round_trips_to_bind() {
    let (skeleton, bind_root, bind_child) = arm_skeleton();
    let mut instance = SkeletonInstance::new(&skeleton);

    let combined = instance.combined_bone_transforms();
    approx_transform(&combined[0], &bind_root, 1e-5);
    approx_transform(&combined[1], &bind_child, 1e-5);

    // At the rest pose, final transforms (combined composed with the
    // inverse bind) collapse to identity.
    let finals = instance.final_bone_transforms();
    approx_transform(&finals[0], &Transform::IDENTITY, 1e-5);
    approx_transform(&finals[1], &Transform::IDENTITY, 1e-5);
}

/// it should overwrite locals at blend factor one and lerp below
#[test]
fn blend_pose_overwrite_and_lerp() {
    let (skeleton, _, _) = arm_skeleton();
    let mut instance = SkeletonInstance::new(&skeleton);

    let target = Transform::new(Quat::from_rotation_y(1.0), Vec3::new(0.0, 9.0, 0.0));
    let pose = vec![BonePose {
        bone: "shoulder".to_string(),
        transform: target,
    }];

    instance.blend_pose(&pose, 1.0);
    approx_transform(&instance.local_transforms()[0], &target, 1e-6);

    // Halfway blend from a known state: position is the midpoint and the
    // rotation stays unit length.
    let before = instance.local_transforms()[0];
    let further = Transform::new(Quat::from_rotation_y(-1.0), Vec3::new(0.0, 1.0, 0.0));
    instance.blend_pose(
        &[BonePose {
            bone: "shoulder".to_string(),
            transform: further,
        }],
        0.5,
    );
    let after = instance.local_transforms()[0];
    approx_vec(after.position, (before.position + further.position) * 0.5, 1e-6);
    approx(after.rotation.length(), 1.0, 1e-5);
}

/// it should silently skip bone names the skeleton does not know
#[test]
fn unknown_bones_are_skipped() {
    let (skeleton, _, _) = arm_skeleton();
    let mut instance = SkeletonInstance::new(&skeleton);
    let before = instance.local_transforms().to_vec();

    instance.blend_pose(
        &[BonePose {
            bone: "tail".to_string(),
            transform: Transform::new(Quat::IDENTITY, Vec3::splat(99.0)),
        }],
        1.0,
    );

    assert_eq!(instance.local_transforms(), before.as_slice());
    assert_eq!(instance.bone_index("tail"), None);
    assert_eq!(instance.bone_index("elbow"), Some(1));
}

/// it should restore the rest pose via set_initial_pose
#[test]
fn set_initial_pose_restores_rest() {
    let (skeleton, bind_root, _) = arm_skeleton();
    let mut instance = SkeletonInstance::new(&skeleton);

    instance.blend_pose(
        &[BonePose {
            bone: "shoulder".to_string(),
            transform: Transform::new(Quat::from_rotation_z(2.0), Vec3::splat(5.0)),
        }],
        1.0,
    );
    instance.set_initial_pose();

    let combined = instance.combined_bone_transforms();
    approx_transform(&combined[0], &bind_root, 1e-5);
}

/// it should cache resolved transforms until the next pose write
#[test]
fn dirty_flag_tracks_writes() {
    let (skeleton, _, _) = arm_skeleton();
    let mut instance = SkeletonInstance::new(&skeleton);
    assert!(instance.is_dirty());

    let first = instance.combined_bone_transforms().to_vec();
    assert!(!instance.is_dirty());

    // Reading again without a write returns identical data.
    assert_eq!(instance.combined_bone_transforms(), first.as_slice());
    assert!(!instance.is_dirty());

    instance.blend_pose(
        &[BonePose {
            bone: "elbow".to_string(),
            transform: Transform::new(Quat::IDENTITY, Vec3::new(0.0, 1.0, 0.0)),
        }],
        1.0,
    );
    assert!(instance.is_dirty());
    let _ = instance.final_bone_transforms();
    assert!(!instance.is_dirty());
}

/// it should degrade to an inert object once the skeleton is dropped
#[test]
fn instance_goes_inert_without_skeleton() {
    let (skeleton, _, _) = arm_skeleton();
    let mut instance = SkeletonInstance::new(&skeleton);
    let cached = instance.combined_bone_transforms().to_vec();
    drop(skeleton);

    assert!(!instance.is_live());
    assert_eq!(instance.bone_index("shoulder"), None);

    // Writes are ignored; reads keep returning the last cached data.
    instance.blend_pose(
        &[BonePose {
            bone: "shoulder".to_string(),
            transform: Transform::new(Quat::IDENTITY, Vec3::splat(7.0)),
        }],
        1.0,
    );
    instance.set_initial_pose();
    assert_eq!(instance.combined_bone_transforms(), cached.as_slice());
}

/// it should round-trip bones through serde
#[test]
fn bone_serde_round_trip() {
    let original = Bone {
        name: "spine".to_string(),
        parent: Some(3),
        offset_transform: Transform::new(Quat::from_rotation_x(0.25), Vec3::new(0.5, -1.0, 2.0)),
    };
    let json = serde_json::to_string(&original).unwrap();
    let back: Bone = serde_json::from_str(&json).unwrap();
    assert_eq!(original, back);
}
