//! Animation clip abstraction and the built-in keyframe clip.

use serde::{Deserialize, Serialize};

use crate::transform::Transform;

/// A named bone's local transform inside a sampled pose.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BonePose {
    pub bone: String,
    pub transform: Transform,
}

/// A pose source resolvable at any normalized time.
///
/// The core is blind to storage and file layout; anything that can produce
/// an ordered pose for a time in `[0, 1]` can drive playback.
pub trait AnimationClip: Send + Sync + std::fmt::Debug {
    /// Samples the clip at `time`, writing the pose into `out` (cleared
    /// first). Times outside `[0, 1]` wrap; the pose order is stable across
    /// calls.
    fn sample_into(&self, time: f32, out: &mut Vec<BonePose>);
}

/// Uniform keyframe sequence: every key carries the same ordered bone set.
///
/// Sampling maps normalized time across the whole key range and wraps the
/// last key back to the first, so a looping playback never snaps.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct KeyframeClip {
    keys: Vec<Vec<BonePose>>,
}

impl KeyframeClip {
    pub fn new(keys: Vec<Vec<BonePose>>) -> Self {
        Self { keys }
    }

    #[inline]
    pub fn key_count(&self) -> usize {
        self.keys.len()
    }
}

impl AnimationClip for KeyframeClip {
    fn sample_into(&self, time: f32, out: &mut Vec<BonePose>) {
        out.clear();
        let count = self.keys.len();
        match count {
            0 => {}
            1 => out.extend_from_slice(&self.keys[0]),
            _ => {
                let mut time = time.max(0.0);
                if time >= 1.0 {
                    time = time.fract();
                }

                let length = count as f32;
                let mut frame0 = (length * time) as usize;
                if frame0 >= count {
                    frame0 = 0;
                }
                let frame1 = (frame0 + 1) % count;
                let local = time * length - frame0 as f32;

                let key0 = &self.keys[frame0];
                let key1 = &self.keys[frame1];
                if key0.len() != key1.len() {
                    // Ragged keys cannot be lerped pairwise; hold the left key.
                    out.extend_from_slice(key0);
                    return;
                }

                out.reserve(key0.len());
                for (a, b) in key0.iter().zip(key1.iter()) {
                    out.push(BonePose {
                        bone: a.bone.clone(),
                        transform: a.transform.blend(&b.transform, local),
                    });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{Quat, Vec3};

    fn key(y: f32) -> Vec<BonePose> {
        vec![BonePose {
            bone: "root".to_string(),
            transform: Transform::new(Quat::IDENTITY, Vec3::new(0.0, y, 0.0)),
        }]
    }

    #[test]
    fn empty_and_single_key_clips() {
        let mut out = Vec::new();
        KeyframeClip::default().sample_into(0.5, &mut out);
        assert!(out.is_empty());

        let clip = KeyframeClip::new(vec![key(3.0)]);
        clip.sample_into(0.0, &mut out);
        assert_eq!(out[0].transform.position.y, 3.0);
        clip.sample_into(0.9, &mut out);
        assert_eq!(out[0].transform.position.y, 3.0);
    }

    #[test]
    fn interpolates_between_frames_and_wraps() {
        let clip = KeyframeClip::new(vec![key(0.0), key(1.0)]);
        let mut out = Vec::new();

        // Midway through the first segment: halfway between the keys.
        clip.sample_into(0.25, &mut out);
        assert!((out[0].transform.position.y - 0.5).abs() < 1e-6);

        // Past the last key the sequence wraps back to the first.
        clip.sample_into(0.75, &mut out);
        assert!((out[0].transform.position.y - 0.5).abs() < 1e-6);

        // Time one is a full cycle.
        clip.sample_into(1.0, &mut out);
        assert!((out[0].transform.position.y - 0.0).abs() < 1e-6);

        // Negative times clamp to the start.
        clip.sample_into(-2.0, &mut out);
        assert!((out[0].transform.position.y - 0.0).abs() < 1e-6);
    }

    #[test]
    fn serde_round_trip() {
        let clip = KeyframeClip::new(vec![key(0.0), key(2.0)]);
        let json = serde_json::to_string(&clip).unwrap();
        let back: KeyframeClip = serde_json::from_str(&json).unwrap();
        assert_eq!(clip, back);
    }
}
