// bias_tracker.rs: one bit per bias source, recording changes not yet consumed

use crate::bias_source::MAX_BIAS_LIGHTS;

/// Number of 32-bit words needed to hold one bit per source slot.
pub const BIAS_TRACKER_WORDS: usize = MAX_BIAS_LIGHTS.div_ceil(32);

/// Fixed-size bitset indexed by source slot. Every instance has the same
/// word count, so word-wise operations never go out of step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BiasTracker {
    changes: [u32; BIAS_TRACKER_WORDS],
}

impl BiasTracker {
    pub const fn new() -> Self {
        Self {
            changes: [0; BIAS_TRACKER_WORDS],
        }
    }

    /// Set the bit for `index`. Indices outside the source capacity are ignored.
    pub fn mark(&mut self, index: usize) {
        if index >= MAX_BIAS_LIGHTS {
            return;
        }
        self.changes[index >> 5] |= 1u32 << (index & 0x1f);
    }

    pub fn is_marked(&self, index: usize) -> bool {
        if index >= MAX_BIAS_LIGHTS {
            return false;
        }
        self.changes[index >> 5] & (1u32 << (index & 0x1f)) != 0
    }

    /// `self |= src`
    pub fn apply(&mut self, src: &BiasTracker) {
        for (dst, s) in self.changes.iter_mut().zip(src.changes.iter()) {
            *dst |= *s;
        }
    }

    /// `self &= !src`
    pub fn clear(&mut self, src: &BiasTracker) {
        for (dst, s) in self.changes.iter_mut().zip(src.changes.iter()) {
            *dst &= !*s;
        }
    }

    pub fn is_empty(&self) -> bool {
        self.changes.iter().all(|w| *w == 0)
    }

    pub fn reset(&mut self) {
        self.changes = [0; BIAS_TRACKER_WORDS];
    }

    /// Indices of all set bits, lowest first.
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        (0..MAX_BIAS_LIGHTS).filter(move |&i| self.is_marked(i))
    }
}
