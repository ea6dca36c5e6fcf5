//! Biquad (bi-quadratic) filter.
//!
//! A second-order IIR filter in transposed direct form II. Coefficients
//! live in [`BiquadParameters`], separate from the two state registers in
//! [`Biquad`], so one parameter set can drive every voice of a program.
//!
//! Coefficient design follows the bilinear-transform formulas with the
//! pre-warped `K = tan(π·f/fs)`; shelving and peaking types have separate
//! boost and cut branches so the response stays symmetric in dB.

use core::f32::consts::{PI, SQRT_2};
use libm::{fabsf, powf, sqrtf, tanf};

/// Biquad response type.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BiquadType {
    /// Low-pass: passes frequencies below the cutoff.
    #[default]
    Lowpass,
    /// High-pass: passes frequencies above the cutoff.
    Highpass,
    /// Band-pass: passes frequencies around the centre, 0 dB peak gain.
    Bandpass,
    /// Peaking EQ: boosts or cuts around the centre by `gain` dB.
    Peak,
    /// Notch: rejects frequencies around the centre.
    Notch,
    /// High shelf: boosts or cuts above the corner by `gain` dB.
    Highshelf,
    /// Low shelf: boosts or cuts below the corner by `gain` dB.
    Lowshelf,
}

impl BiquadType {
    /// All types in selector order.
    pub const ALL: [BiquadType; 7] = [
        BiquadType::Lowpass,
        BiquadType::Highpass,
        BiquadType::Bandpass,
        BiquadType::Peak,
        BiquadType::Notch,
        BiquadType::Highshelf,
        BiquadType::Lowshelf,
    ];

    /// Type for a selector index, wrapping out-of-range values.
    pub fn from_index(index: usize) -> Self {
        Self::ALL[index % Self::ALL.len()]
    }
}

/// Normalized biquad coefficients.
///
/// `a0..a2` are the feedforward taps and `b1, b2` the feedback taps:
/// ```text
/// y[n] = a0·x[n] + a1·x[n-1] + a2·x[n-2] - b1·y[n-1] - b2·y[n-2]
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BiquadParameters {
    /// Feedforward tap for x[n].
    pub a0: f32,
    /// Feedforward tap for x[n-1].
    pub a1: f32,
    /// Feedforward tap for x[n-2].
    pub a2: f32,
    /// Feedback tap for y[n-1].
    pub b1: f32,
    /// Feedback tap for y[n-2].
    pub b2: f32,
    sample_rate: f32,
}

impl Default for BiquadParameters {
    fn default() -> Self {
        Self::new(48000.0)
    }
}

impl BiquadParameters {
    /// Passthrough coefficients for the given sample rate.
    pub fn new(sample_rate: f32) -> Self {
        Self {
            a0: 1.0,
            a1: 0.0,
            a2: 0.0,
            b1: 0.0,
            b2: 0.0,
            sample_rate,
        }
    }

    /// Sample rate the coefficients are designed for.
    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    /// Design coefficients.
    ///
    /// * `kind` - Response type
    /// * `freq` - Cutoff, centre or corner frequency in Hz
    /// * `q` - Quality factor (ignored by the shelving types)
    /// * `gain` - Gain in dB for peak and shelf types
    pub fn set(&mut self, kind: BiquadType, freq: f32, q: f32, gain: f32) {
        let v = powf(10.0, fabsf(gain) / 20.0);
        let k = tanf(PI * freq / self.sample_rate);
        let kk = k * k;
        let sqrt_2v = sqrtf(2.0 * v);

        match kind {
            BiquadType::Lowpass => {
                let norm = 1.0 / (1.0 + k / q + kk);
                self.a0 = kk * norm;
                self.a1 = 2.0 * self.a0;
                self.a2 = self.a0;
                self.b1 = 2.0 * (kk - 1.0) * norm;
                self.b2 = (1.0 - k / q + kk) * norm;
            }
            BiquadType::Highpass => {
                let norm = 1.0 / (1.0 + k / q + kk);
                self.a0 = norm;
                self.a1 = -2.0 * self.a0;
                self.a2 = self.a0;
                self.b1 = 2.0 * (kk - 1.0) * norm;
                self.b2 = (1.0 - k / q + kk) * norm;
            }
            BiquadType::Bandpass => {
                let norm = 1.0 / (1.0 + k / q + kk);
                self.a0 = k / q * norm;
                self.a1 = 0.0;
                self.a2 = -self.a0;
                self.b1 = 2.0 * (kk - 1.0) * norm;
                self.b2 = (1.0 - k / q + kk) * norm;
            }
            BiquadType::Peak => {
                if gain >= 0.0 {
                    let norm = 1.0 / (1.0 + k / q + kk);
                    self.a0 = (1.0 + v / q * k + kk) * norm;
                    self.a1 = 2.0 * (kk - 1.0) * norm;
                    self.a2 = (1.0 - v / q * k + kk) * norm;
                    self.b1 = self.a1;
                    self.b2 = (1.0 - k / q + kk) * norm;
                } else {
                    let norm = 1.0 / (1.0 + v / q * k + kk);
                    self.a0 = (1.0 + k / q + kk) * norm;
                    self.a1 = 2.0 * (kk - 1.0) * norm;
                    self.a2 = (1.0 - k / q + kk) * norm;
                    self.b1 = self.a1;
                    self.b2 = (1.0 - v / q * k + kk) * norm;
                }
            }
            BiquadType::Notch => {
                let norm = 1.0 / (1.0 + k / q + kk);
                self.a0 = (1.0 + kk) * norm;
                self.a1 = 2.0 * (kk - 1.0) * norm;
                self.a2 = self.a0;
                self.b1 = self.a1;
                self.b2 = (1.0 - k / q + kk) * norm;
            }
            BiquadType::Highshelf => {
                if gain >= 0.0 {
                    let norm = 1.0 / (1.0 + SQRT_2 * k + kk);
                    self.a0 = (v + sqrt_2v * k + kk) * norm;
                    self.a1 = 2.0 * (kk - v) * norm;
                    self.a2 = (v - sqrt_2v * k + kk) * norm;
                    self.b1 = 2.0 * (kk - 1.0) * norm;
                    self.b2 = (1.0 - SQRT_2 * k + kk) * norm;
                } else {
                    let norm = 1.0 / (v + sqrt_2v * k + kk);
                    self.a0 = (1.0 + SQRT_2 * k + kk) * norm;
                    self.a1 = 2.0 * (kk - 1.0) * norm;
                    self.a2 = (1.0 - SQRT_2 * k + kk) * norm;
                    self.b1 = 2.0 * (kk - v) * norm;
                    self.b2 = (v - sqrt_2v * k + kk) * norm;
                }
            }
            BiquadType::Lowshelf => {
                if gain >= 0.0 {
                    let norm = 1.0 / (1.0 + SQRT_2 * k + kk);
                    self.a0 = (1.0 + sqrt_2v * k + v * kk) * norm;
                    self.a1 = 2.0 * (v * kk - 1.0) * norm;
                    self.a2 = (1.0 - sqrt_2v * k + v * kk) * norm;
                    self.b1 = 2.0 * (kk - 1.0) * norm;
                    self.b2 = (1.0 - SQRT_2 * k + kk) * norm;
                } else {
                    let norm = 1.0 / (1.0 + sqrt_2v * k + v * kk);
                    self.a0 = (1.0 + SQRT_2 * k + kk) * norm;
                    self.a1 = 2.0 * (kk - 1.0) * norm;
                    self.a2 = (1.0 - SQRT_2 * k + kk) * norm;
                    self.b1 = 2.0 * (v * kk - 1.0) * norm;
                    self.b2 = (1.0 - sqrt_2v * k + v * kk) * norm;
                }
            }
        }
    }
}

/// Biquad filter state (two registers).
#[derive(Debug, Clone, Copy, Default)]
pub struct Biquad {
    z1: f32,
    z2: f32,
}

impl Biquad {
    /// Create a filter with cleared state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Process one sample with the given coefficients.
    #[inline]
    pub fn filter(&mut self, params: &BiquadParameters, input: f32) -> f32 {
        let output = input * params.a0 + self.z1;
        self.z1 = input * params.a1 - params.b1 * output + self.z2;
        self.z2 = input * params.a2 - params.b2 * output;
        output
    }

    /// Clear the state registers.
    pub fn clear(&mut self) {
        self.z1 = 0.0;
        self.z2 = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SR: f32 = 48000.0;

    fn settle(kind: BiquadType, input: f32, gain: f32) -> f32 {
        let mut params = BiquadParameters::new(SR);
        params.set(kind, 1000.0, 0.707, gain);
        let mut biquad = Biquad::new();
        let mut output = 0.0;
        for _ in 0..4000 {
            output = biquad.filter(&params, input);
        }
        output
    }

    #[test]
    fn test_passthrough_by_default() {
        let params = BiquadParameters::new(SR);
        let mut biquad = Biquad::new();
        for i in 0..10 {
            let input = i as f32 * 0.1;
            assert!((biquad.filter(&params, input) - input).abs() < 1e-6);
        }
    }

    #[test]
    fn test_lowpass_passes_dc() {
        let output = settle(BiquadType::Lowpass, 0.8, 0.0);
        assert!((output - 0.8).abs() < 1e-3, "lowpass DC output {output}");
    }

    #[test]
    fn test_highpass_blocks_dc() {
        let output = settle(BiquadType::Highpass, 0.8, 0.0);
        assert!(output.abs() < 1e-3, "highpass DC output {output}");
    }

    #[test]
    fn test_bandpass_blocks_dc() {
        assert!(settle(BiquadType::Bandpass, 1.0, 0.0).abs() < 1e-3);
    }

    #[test]
    fn test_notch_passes_dc() {
        assert!((settle(BiquadType::Notch, 1.0, 0.0) - 1.0).abs() < 1e-3);
    }

    #[test]
    fn test_lowshelf_gain_at_dc() {
        let boost = settle(BiquadType::Lowshelf, 1.0, 6.0);
        assert!((boost - db(6.0)).abs() < 1e-2, "boost {boost}");
        let cut = settle(BiquadType::Lowshelf, 1.0, -6.0);
        assert!((cut - db(-6.0)).abs() < 1e-2, "cut {cut}");
    }

    #[test]
    fn test_highshelf_leaves_dc() {
        assert!((settle(BiquadType::Highshelf, 1.0, 6.0) - 1.0).abs() < 1e-2);
        assert!((settle(BiquadType::Highshelf, 1.0, -6.0) - 1.0).abs() < 1e-2);
    }

    #[test]
    fn test_peak_leaves_dc() {
        assert!((settle(BiquadType::Peak, 1.0, 12.0) - 1.0).abs() < 1e-2);
        assert!((settle(BiquadType::Peak, 1.0, -12.0) - 1.0).abs() < 1e-2);
    }

    #[test]
    fn test_clear() {
        let mut params = BiquadParameters::new(SR);
        params.set(BiquadType::Lowpass, 500.0, 1.0, 0.0);
        let mut biquad = Biquad::new();
        for _ in 0..10 {
            biquad.filter(&params, 1.0);
        }
        biquad.clear();
        assert_eq!(biquad.z1, 0.0);
        assert_eq!(biquad.z2, 0.0);
    }

    #[test]
    fn test_type_index_wraps() {
        assert_eq!(BiquadType::from_index(0), BiquadType::Lowpass);
        assert_eq!(BiquadType::from_index(6), BiquadType::Lowshelf);
        assert_eq!(BiquadType::from_index(7), BiquadType::Lowpass);
    }

    fn db(gain: f32) -> f32 {
        libm::powf(10.0, gain / 20.0)
    }
}
