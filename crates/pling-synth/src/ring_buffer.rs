//! Lock-free scope capture of the rendered output.
//!
//! The render thread writes one chunk at a time; any number of readers
//! take snapshots without locking. Samples are stored as bit-cast `f32`s in
//! `AtomicU32`s, so a reader racing the writer can see a mix of old and new
//! chunks but never a torn sample.

use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

use pling_core::{CHUNK_SIZE, Chunk};

/// Default scope length in samples.
pub const SCOPE_SIZE: usize = 16384;

/// Weight of the previous average in the smoothed RMS.
const RMS_SMOOTHING: f32 = 0.95;

#[derive(Debug)]
struct AtomicF32(AtomicU32);

impl AtomicF32 {
    fn new(value: f32) -> Self {
        Self(AtomicU32::new(value.to_bits()))
    }

    #[inline]
    fn load(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Acquire))
    }

    #[inline]
    fn store(&self, value: f32) {
        self.0.store(value.to_bits(), Ordering::Release);
    }
}

/// Fixed-capacity sample ring written once per chunk.
#[derive(Debug)]
pub struct RingBuffer {
    samples: Box<[AtomicU32]>,
    tail: AtomicUsize,
    crossing: AtomicF32,
    base_frequency: AtomicF32,
    rms: AtomicF32,
}

impl Default for RingBuffer {
    fn default() -> Self {
        Self::new(SCOPE_SIZE)
    }
}

impl RingBuffer {
    /// Create a silent ring of `capacity` samples, rounded up to a whole
    /// number of chunks.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1).div_ceil(CHUNK_SIZE) * CHUNK_SIZE;
        Self {
            samples: (0..capacity).map(|_| AtomicU32::new(0.0f32.to_bits())).collect(),
            tail: AtomicUsize::new(0),
            crossing: AtomicF32::new(0.0),
            base_frequency: AtomicF32::new(0.0),
            rms: AtomicF32::new(0.0),
        }
    }

    /// Capacity in samples.
    pub fn capacity(&self) -> usize {
        self.samples.len()
    }

    /// Append a chunk.
    ///
    /// `zero_crossing` is relative to the end of the chunk (usually
    /// negative) and is stored as an absolute ring position.
    pub fn add(&self, chunk: &Chunk, zero_crossing: f32, base_frequency: f32) {
        let start = self.tail.load(Ordering::Relaxed);
        let end = start + CHUNK_SIZE;

        for (slot, sample) in self.samples[start..end].iter().zip(chunk.iter()) {
            slot.store(sample.to_bits(), Ordering::Relaxed);
        }

        self.crossing.store(zero_crossing + end as f32);
        self.base_frequency.store(base_frequency);

        let rms = chunk.energy().sqrt() / 8.0;
        self.rms.store(self.rms.load() * RMS_SMOOTHING + rms * (1.0 - RMS_SMOOTHING));

        self.tail.store(end % self.samples.len(), Ordering::Release);
    }

    /// Ring position of the most recent rising zero crossing. May be negative
    /// or past the end; readers wrap it.
    pub fn crossing(&self) -> f32 {
        self.crossing.load()
    }

    /// Frequency of the lowest sounding voice when the last chunk was added.
    pub fn base_frequency(&self) -> f32 {
        self.base_frequency.load()
    }

    /// Smoothed RMS level.
    pub fn rms(&self) -> f32 {
        self.rms.load()
    }

    /// Position the next chunk will be written to.
    pub fn tail(&self) -> usize {
        self.tail.load(Ordering::Acquire)
    }

    /// Copy of the whole ring, in storage order.
    pub fn samples(&self) -> Vec<f32> {
        self.samples
            .iter()
            .map(|s| f32::from_bits(s.load(Ordering::Relaxed)))
            .collect()
    }

    /// The most recent `len` samples, oldest first.
    pub fn latest(&self, len: usize) -> Vec<f32> {
        let capacity = self.samples.len();
        let len = len.min(capacity);
        let tail = self.tail();
        (0..len)
            .map(|i| {
                let index = (tail + capacity - len + i) % capacity;
                f32::from_bits(self.samples[index].load(Ordering::Relaxed))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(start: f32) -> Chunk {
        let mut chunk = Chunk::new();
        for (i, sample) in chunk.iter_mut().enumerate() {
            *sample = start + i as f32;
        }
        chunk
    }

    #[test]
    fn test_capacity_rounds_to_chunks() {
        assert_eq!(RingBuffer::new(16384).capacity(), 16384);
        assert_eq!(RingBuffer::new(200).capacity(), 256);
        assert_eq!(RingBuffer::new(0).capacity(), CHUNK_SIZE);
    }

    #[test]
    fn test_add_advances_tail_and_wraps() {
        let ring = RingBuffer::new(256);
        ring.add(&ramp(0.0), 0.0, 0.0);
        assert_eq!(ring.tail(), 128);
        ring.add(&ramp(128.0), 0.0, 0.0);
        assert_eq!(ring.tail(), 0);
        ring.add(&ramp(256.0), 0.0, 0.0);
        assert_eq!(ring.tail(), 128);

        let samples = ring.samples();
        assert_eq!(samples[0], 256.0);
        assert_eq!(samples[128], 128.0);
        assert_eq!(ring.latest(3), vec![381.0, 382.0, 383.0]);
    }

    #[test]
    fn test_crossing_is_absolute() {
        let ring = RingBuffer::new(1024);
        ring.add(&Chunk::new(), -100.0, 220.0);
        assert_eq!(ring.crossing(), 28.0);
        ring.add(&Chunk::new(), -100.0, 110.0);
        assert_eq!(ring.crossing(), 156.0);
        assert_eq!(ring.base_frequency(), 110.0);
    }

    #[test]
    fn test_rms_smoothing() {
        let ring = RingBuffer::default();
        let mut chunk = Chunk::new();
        chunk.fill(1.0);
        // sqrt(128) / 8 = sqrt(2)
        ring.add(&chunk, 0.0, 0.0);
        assert!((ring.rms() - 0.05 * core::f32::consts::SQRT_2).abs() < 1e-6);
        for _ in 0..500 {
            ring.add(&chunk, 0.0, 0.0);
        }
        assert!((ring.rms() - core::f32::consts::SQRT_2).abs() < 1e-3);
    }
}
