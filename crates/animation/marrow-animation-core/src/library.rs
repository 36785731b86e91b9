//! Clip storage with generation-checked handles.
//!
//! An explicit context object passed to call sites rather than a global
//! registry. Mixers resolve their handles against the library every tick,
//! so removing a clip turns dependent playback slots inert instead of
//! leaving them dangling.

use std::sync::Arc;

use crate::clip::AnimationClip;

/// Stable handle into a [`ClipLibrary`]. A handle taken before a removal
/// stays safe to use: its generation no longer matches and it resolves to
/// `None`.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct ClipHandle {
    index: u32,
    generation: u32,
}

#[derive(Debug, Default)]
struct Slot {
    generation: u32,
    clip: Option<Arc<dyn AnimationClip>>,
}

#[derive(Debug, Default)]
pub struct ClipLibrary {
    slots: Vec<Slot>,
    free: Vec<u32>,
}

impl ClipLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a clip, reusing a freed slot when one exists.
    pub fn insert(&mut self, clip: Arc<dyn AnimationClip>) -> ClipHandle {
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.clip = Some(clip);
            ClipHandle {
                index,
                generation: slot.generation,
            }
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(Slot {
                generation: 0,
                clip: Some(clip),
            });
            ClipHandle {
                index,
                generation: 0,
            }
        }
    }

    /// Removes the clip behind `handle`, returning it. The slot's
    /// generation is bumped, invalidating every copy of the handle.
    pub fn remove(&mut self, handle: ClipHandle) -> Option<Arc<dyn AnimationClip>> {
        let slot = self.slots.get_mut(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        let clip = slot.clip.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(handle.index);
        Some(clip)
    }

    /// Resolves a handle to its clip; `None` for stale or unknown handles.
    pub fn resolve(&self, handle: ClipHandle) -> Option<&Arc<dyn AnimationClip>> {
        let slot = self.slots.get(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.clip.as_ref()
    }

    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.clip.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
