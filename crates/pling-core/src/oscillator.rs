//! Phase-accumulator oscillators.
//!
//! Waveforms are naive (not band-limited) pure functions of a phase in
//! `[0, 1)`. [`Oscillator`] owns its increment and is driven by a bend
//! ratio; [`Operator`] only keeps a phase and is advanced by a
//! caller-provided increment, which is what FM operators need since their
//! frequency depends on ratio, detune and bend at every sample.

use core::f32::consts::PI;
use libm::{copysignf, fabsf, floorf, roundf, sinf};

/// Wrap a phase into `[0, 1)`.
#[inline]
fn wrap(phase: f32) -> f32 {
    phase - floorf(phase)
}

#[inline]
fn sine_at(phase: f32) -> f32 {
    sinf(2.0 * PI * phase)
}

/// Branch-free parabolic approximation of a sine that is half a cycle out
/// of phase with [`sine_at`].
#[inline]
fn fast_sine_at(phase: f32) -> f32 {
    let x1 = phase - 0.5;
    let x2 = fabsf(x1) * 4.0 - 1.0;
    copysignf(1.0 - x2 * x2, x1)
}

#[inline]
fn triangle_at(phase: f32) -> f32 {
    fabsf(phase - 0.5) * 4.0 - 1.0
}

#[inline]
fn square_at(phase: f32) -> f32 {
    1.0 - 2.0 * roundf(phase)
}

#[inline]
fn saw_at(phase: f32) -> f32 {
    1.0 - 2.0 * phase
}

/// Time in samples from `offset` back to the most recent upward phase wrap.
///
/// `step` is the phase advance per sample.
#[inline]
fn crossing(phase: f32, offset: f32, step: f32) -> f32 {
    if step <= 0.0 {
        return offset;
    }
    let p = wrap(phase + offset * step);
    offset - p / step
}

/// Oscillator with a fixed phase increment.
///
/// # Example
///
/// ```rust
/// use pling_core::Oscillator;
///
/// let mut osc = Oscillator::new(48000.0);
/// osc.init(440.0);
/// let first = osc.sine();
/// osc.update(1.0);
/// assert_eq!(first, 0.0);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct Oscillator {
    phase: f32,
    increment: f32,
    sample_rate: f32,
}

impl Default for Oscillator {
    fn default() -> Self {
        Self::new(48000.0)
    }
}

impl Oscillator {
    /// Create a stopped oscillator.
    pub fn new(sample_rate: f32) -> Self {
        Self {
            phase: 0.0,
            increment: 0.0,
            sample_rate,
        }
    }

    /// Restart at phase 0 with the given frequency.
    pub fn init(&mut self, frequency: f32) {
        self.phase = 0.0;
        self.increment = frequency / self.sample_rate;
    }

    /// Change frequency without resetting phase.
    pub fn set_frequency(&mut self, frequency: f32) {
        self.increment = frequency / self.sample_rate;
    }

    /// Advance one sample, scaling the increment by `bend`.
    #[inline]
    pub fn update(&mut self, bend: f32) {
        self.phase = wrap(self.phase + self.increment * bend);
    }

    /// Current phase in `[0, 1)`.
    pub fn phase(&self) -> f32 {
        self.phase
    }

    /// Effective frequency in Hz for a bend ratio.
    pub fn frequency(&self, bend: f32) -> f32 {
        self.increment * self.sample_rate * bend
    }

    /// Sample offset of the most recent rising zero crossing before `offset`.
    pub fn zero_crossing(&self, offset: f32, bend: f32) -> f32 {
        crossing(self.phase, offset, self.increment * bend)
    }

    /// Sine.
    #[inline]
    pub fn sine(&self) -> f32 {
        sine_at(self.phase)
    }

    /// Parabolic sine approximation, inverted relative to [`Oscillator::sine`].
    #[inline]
    pub fn fast_sine(&self) -> f32 {
        fast_sine_at(self.phase)
    }

    /// Triangle.
    #[inline]
    pub fn triangle(&self) -> f32 {
        triangle_at(self.phase)
    }

    /// Square, 50% duty.
    #[inline]
    pub fn square(&self) -> f32 {
        square_at(self.phase)
    }

    /// Falling sawtooth.
    #[inline]
    pub fn saw(&self) -> f32 {
        saw_at(self.phase)
    }
}

/// Phase-modulation operator.
///
/// Every waveform takes a phase offset `pm` in cycles that is added to the
/// running phase before evaluation.
#[derive(Debug, Clone, Copy, Default)]
pub struct Operator {
    phase: f32,
}

impl Operator {
    /// Create an operator at phase 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset phase to 0.
    pub fn init(&mut self) {
        self.phase = 0.0;
    }

    /// Current phase in `[0, 1)`.
    pub fn phase(&self) -> f32 {
        self.phase
    }

    /// Advance by `delta` cycles.
    #[inline]
    pub fn update(&mut self, delta: f32) {
        self.phase = wrap(self.phase + delta);
    }

    /// Advance by `delta` cycles and return how far past the wrap point the
    /// phase landed, or 0 when it did not wrap.
    #[inline]
    pub fn update_sync(&mut self, delta: f32) -> f32 {
        let next = self.phase + delta;
        self.phase = wrap(next);
        if next >= 1.0 { self.phase } else { 0.0 }
    }

    /// Sample offset of the most recent rising zero crossing before `offset`.
    pub fn zero_crossing(&self, offset: f32, delta: f32) -> f32 {
        crossing(self.phase, offset, delta)
    }

    /// Sine.
    #[inline]
    pub fn sine(&self, pm: f32) -> f32 {
        sine_at(self.phase + pm)
    }

    /// Parabolic sine approximation.
    #[inline]
    pub fn fast_sine(&self, pm: f32) -> f32 {
        fast_sine_at(wrap(self.phase + pm))
    }

    /// Square: 1 in the first half cycle, -1 in the second.
    #[inline]
    pub fn square(&self, pm: f32) -> f32 {
        if wrap(self.phase + pm) < 0.5 { 1.0 } else { -1.0 }
    }

    /// Triangle, in phase with [`Operator::sine`].
    #[inline]
    pub fn triangle(&self, pm: f32) -> f32 {
        triangle_at(wrap(self.phase + pm - 0.25))
    }

    /// Falling sawtooth.
    #[inline]
    pub fn saw(&self, pm: f32) -> f32 {
        saw_at(wrap(self.phase + pm))
    }

    /// Rising sawtooth.
    #[inline]
    pub fn revsaw(&self, pm: f32) -> f32 {
        -saw_at(wrap(self.phase + pm))
    }
}
