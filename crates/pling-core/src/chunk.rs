//! Fixed-size audio chunks.
//!
//! A [`Chunk`] is the unit of audio exchanged by every render call: the
//! audio callback asks for exactly one chunk at a time, programs accumulate
//! their voices into it, and the scope captures it afterwards.

use core::ops::{Deref, DerefMut};

/// Number of mono samples in one chunk.
pub const CHUNK_SIZE: usize = 128;

/// A block of [`CHUNK_SIZE`] mono samples.
///
/// Renderers add into the chunk rather than overwrite it, so several
/// programs and voices mix additively. Call [`Chunk::clear`] before the
/// first renderer of each cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Chunk {
    /// The samples.
    pub samples: [f32; CHUNK_SIZE],
}

impl Chunk {
    /// Create a silent chunk.
    pub const fn new() -> Self {
        Self {
            samples: [0.0; CHUNK_SIZE],
        }
    }

    /// Zero every sample.
    #[inline]
    pub fn clear(&mut self) {
        self.samples.fill(0.0);
    }

    /// Multiply every sample by `gain` and clamp to [-1, 1].
    #[inline]
    pub fn scale_and_clamp(&mut self, gain: f32) {
        for sample in &mut self.samples {
            *sample = (*sample * gain).clamp(-1.0, 1.0);
        }
    }

    /// Sum of squared samples.
    #[inline]
    pub fn energy(&self) -> f32 {
        self.samples.iter().map(|s| s * s).sum()
    }
}

impl Default for Chunk {
    fn default() -> Self {
        Self::new()
    }
}

impl Deref for Chunk {
    type Target = [f32; CHUNK_SIZE];

    fn deref(&self) -> &Self::Target {
        &self.samples
    }
}

impl DerefMut for Chunk {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.samples
    }
}
