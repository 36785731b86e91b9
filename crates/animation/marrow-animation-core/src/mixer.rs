//! Playback slots and the mixer driving them.
//!
//! Each slot is a small state machine around one clip:
//!
//! ```text
//! Stopped -> Starting -> Playing -> Stopping -> Stopped
//! ```
//!
//! Starting and Stopping are timed windows that ramp the slot's blend
//! contribution in and out; Playing wraps elapsed time modulo the slot's
//! duration and counts repeats. Slots blend into the shared instance in
//! insertion order, so a later slot at blend factor one overrides earlier
//! slots on the bones it touches, while lower factors accumulate as lerps.

use std::sync::Arc;

use crate::clip::{AnimationClip, BonePose};
use crate::error::AnimationError;
use crate::instance::SkeletonInstance;
use crate::library::{ClipHandle, ClipLibrary};
use crate::skeleton::Skeleton;
use crate::transform::EPSILON;

/// Playback state of one slot.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PlaybackState {
    Stopped,
    /// Ramping in over the start transition window.
    Starting,
    Playing,
    /// Ramping out over the stop transition window.
    Stopping,
}

/// Two-point linear ramp sampled by a scalar in `[0, 1]`.
#[derive(Copy, Clone, Debug)]
struct LinearRamp {
    from: f32,
    to: f32,
}

impl LinearRamp {
    fn value_at(&self, scalar: f32) -> f32 {
        if scalar <= 0.0 {
            self.from
        } else if scalar >= 1.0 {
            self.to
        } else {
            self.from + (self.to - self.from) * scalar
        }
    }
}

/// One playback slot: a clip handle plus transition state.
///
/// `play`, `stop` and `set_blend_factor` are pure bookkeeping and work even
/// while the clip handle does not resolve; only processing is inert then.
#[derive(Clone, Debug)]
pub struct ClipPlayer {
    clip: ClipHandle,
    state: PlaybackState,

    /// Caller-chosen playback duration in seconds, independent of the
    /// clip's native key count.
    duration: f32,
    blend_transition: f32,
    start_transition: f32,
    stop_transition: f32,

    elapsed: f32,
    /// Normalized clip position sampled while a transition window runs.
    hold_position: f32,

    blend: LinearRamp,
    blend_scalar: f32,

    repeat_target: u32,
    repeat_count: u32,
}

impl ClipPlayer {
    fn new(
        clip: ClipHandle,
        blend_transition: f32,
        start_transition: f32,
        stop_transition: f32,
        duration: f32,
        blend_factor: f32,
    ) -> Self {
        let clamp = |value: f32| if value > EPSILON { value } else { 0.0 };
        let blend_factor = clamp(blend_factor);
        Self {
            clip,
            state: PlaybackState::Stopped,
            duration: if duration > EPSILON { duration } else { 1.0 },
            blend_transition: clamp(blend_transition),
            start_transition: clamp(start_transition),
            stop_transition: clamp(stop_transition),
            elapsed: 0.0,
            hold_position: 0.0,
            blend: LinearRamp {
                from: blend_factor,
                to: blend_factor,
            },
            blend_scalar: 1.0,
            repeat_target: 0,
            repeat_count: 0,
        }
    }

    #[inline]
    pub fn state(&self) -> PlaybackState {
        self.state
    }

    #[inline]
    pub fn clip(&self) -> ClipHandle {
        self.clip
    }

    /// Requested repeat target (zero means endless) and completed plays.
    #[inline]
    pub fn repeat_counts(&self) -> (u32, u32) {
        (self.repeat_target, self.repeat_count)
    }

    /// Blend factor after the transition ramp, as applied this tick.
    #[inline]
    pub fn blend_factor(&self) -> f32 {
        self.blend.value_at(self.blend_scalar)
    }

    /// Starts playback, or updates the repeat target when already running.
    ///
    /// From Stopping, playback re-enters forward motion: ramp-out progress
    /// is rescaled into the equivalent ramp-in point and the frozen clip
    /// position is resumed.
    pub fn play(&mut self, repeat: u32) {
        self.repeat_target = repeat;
        self.repeat_count = 0;

        match self.state {
            PlaybackState::Stopping => {
                if self.start_transition < EPSILON {
                    self.elapsed = 0.0;
                    self.state = PlaybackState::Playing;
                } else {
                    // Stopping implies a non-zero stop window.
                    self.elapsed *= self.start_transition / self.stop_transition;
                    self.state = PlaybackState::Starting;
                }
            }
            PlaybackState::Starting | PlaybackState::Playing => {}
            PlaybackState::Stopped => {
                self.elapsed = 0.0;
                self.hold_position = 0.0;
                self.state = if self.start_transition < EPSILON {
                    PlaybackState::Playing
                } else {
                    PlaybackState::Starting
                };
            }
        }
    }

    /// `set_blend_factor` followed by `play`.
    pub fn play_with_blend(&mut self, blend_factor: f32, repeat: u32) {
        self.set_blend_factor(blend_factor);
        self.play(repeat);
    }

    /// Begins the ramp-out; a zero stop window stops immediately.
    pub fn stop(&mut self) {
        if matches!(self.state, PlaybackState::Stopped | PlaybackState::Stopping) {
            return;
        }

        if self.stop_transition < EPSILON {
            self.state = PlaybackState::Stopped;
            return;
        }

        match self.state {
            PlaybackState::Starting => {
                // Map ramp-in progress into the ramp-out window. A zero
                // start window never reaches Starting; guard the ratio
                // regardless.
                self.elapsed = if self.start_transition > EPSILON {
                    self.elapsed * self.stop_transition / self.start_transition
                } else {
                    0.0
                };
            }
            _ => {
                self.hold_position = self.elapsed / self.duration;
                self.elapsed = self.stop_transition;
            }
        }

        self.state = PlaybackState::Stopping;
    }

    /// Retargets the blend factor. The change fades over the blend
    /// transition window instead of snapping: the currently ramped value
    /// becomes the new starting endpoint.
    pub fn set_blend_factor(&mut self, blend_factor: f32) {
        let target = if blend_factor > EPSILON { blend_factor } else { 0.0 };
        self.blend = LinearRamp {
            from: self.blend.value_at(self.blend_scalar),
            to: target,
        };
        self.blend_scalar = 0.0;
    }

    pub(crate) fn process(
        &mut self,
        elapsed_time: f32,
        clip: &dyn AnimationClip,
        instance: &mut SkeletonInstance,
        scratch: &mut Vec<BonePose>,
    ) {
        if self.state == PlaybackState::Stopped || self.duration < EPSILON {
            return;
        }

        // The blend ramp advances in every live state.
        if self.blend_scalar < 1.0 {
            if self.blend_transition >= EPSILON {
                self.blend_scalar += elapsed_time / self.blend_transition;
            } else {
                self.blend_scalar = 1.0;
            }
        }
        let blend_factor = self.blend.value_at(self.blend_scalar);

        if self.state == PlaybackState::Stopping {
            self.elapsed -= elapsed_time;
            if self.elapsed > 0.0 {
                clip.sample_into(self.hold_position, scratch);
                instance.blend_pose(
                    scratch,
                    blend_factor * self.elapsed / self.stop_transition,
                );
            } else {
                self.state = PlaybackState::Stopped;
            }
            return;
        }

        self.elapsed += elapsed_time;

        if self.state == PlaybackState::Starting {
            if self.elapsed < self.start_transition {
                clip.sample_into(self.hold_position, scratch);
                instance.blend_pose(
                    scratch,
                    blend_factor * self.elapsed / self.start_transition,
                );
            } else {
                // Carry the overshoot into clip time, resuming from the
                // held position.
                self.elapsed -= self.start_transition;
                self.elapsed += self.hold_position * self.duration;
                self.state = PlaybackState::Playing;
            }
        }

        if self.state == PlaybackState::Playing {
            if self.elapsed > self.duration {
                let wraps = (self.elapsed / self.duration).floor();
                self.elapsed -= wraps * self.duration;
                if self.repeat_target != 0 {
                    self.repeat_count += wraps as u32;
                }
            }

            clip.sample_into(self.elapsed / self.duration, scratch);
            instance.blend_pose(scratch, blend_factor);

            if self.repeat_target != 0 && self.repeat_count >= self.repeat_target {
                self.stop();
            }
        }
    }
}

/// Owns one skeleton instance and an ordered list of playback slots, and
/// drives the blend each tick.
#[derive(Debug)]
pub struct AnimationMixer {
    instance: SkeletonInstance,
    players: Vec<ClipPlayer>,
    scratch: Vec<BonePose>,
}

impl AnimationMixer {
    pub fn new(skeleton: &Arc<Skeleton>) -> Self {
        Self {
            instance: SkeletonInstance::new(skeleton),
            players: Vec::new(),
            scratch: Vec::new(),
        }
    }

    /// Adds a playback slot for `clip`, returning its positional index.
    ///
    /// Transition windows below the epsilon collapse to zero, skipping that
    /// phase entirely; a duration that small normalizes to one second. The
    /// handle must resolve at registration time.
    pub fn add_animation(
        &mut self,
        library: &ClipLibrary,
        clip: ClipHandle,
        blend_transition: f32,
        start_transition: f32,
        stop_transition: f32,
        duration: f32,
        blend_factor: f32,
    ) -> Result<usize, AnimationError> {
        if library.resolve(clip).is_none() {
            return Err(AnimationError::UnresolvedClip);
        }
        self.players.push(ClipPlayer::new(
            clip,
            blend_transition,
            start_transition,
            stop_transition,
            duration,
            blend_factor,
        ));
        Ok(self.players.len() - 1)
    }

    /// Removes the slot at `index`; later indices shift down by one.
    pub fn remove_animation(&mut self, index: usize) -> Result<(), AnimationError> {
        if index >= self.players.len() {
            return Err(AnimationError::SlotOutOfRange {
                index,
                len: self.players.len(),
            });
        }
        self.players.remove(index);
        Ok(())
    }

    #[inline]
    pub fn animation(&self, index: usize) -> Option<&ClipPlayer> {
        self.players.get(index)
    }

    #[inline]
    pub fn animation_mut(&mut self, index: usize) -> Option<&mut ClipPlayer> {
        self.players.get_mut(index)
    }

    #[inline]
    pub fn animation_count(&self) -> usize {
        self.players.len()
    }

    /// Advances every slot strictly in insertion order. Order is
    /// observable: each slot blends relative to the bone state left by the
    /// slots before it.
    pub fn advance(&mut self, elapsed_time: f32, library: &ClipLibrary) {
        for player in &mut self.players {
            let Some(clip) = library.resolve(player.clip) else {
                log::debug!("skipping playback slot whose clip handle no longer resolves");
                continue;
            };
            player.process(
                elapsed_time,
                clip.as_ref(),
                &mut self.instance,
                &mut self.scratch,
            );
        }
    }

    #[inline]
    pub fn instance(&self) -> &SkeletonInstance {
        &self.instance
    }

    #[inline]
    pub fn instance_mut(&mut self) -> &mut SkeletonInstance {
        &mut self.instance
    }
}
