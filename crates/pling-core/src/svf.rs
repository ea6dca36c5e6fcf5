//! State variable filter.
//!
//! Topology-preserving transform (TPT) SVF after Zavalishin, "The Art of VA
//! Filter Design". One pass yields lowpass, highpass, bandpass and notch;
//! [`SvfParameters::kind`] picks which one [`StateVariable::filter`] returns.
//!
//! # Parameters and state
//!
//! Coefficients live in [`SvfParameters`] so a program can share one set
//! across all its voices. Each voice owns a [`StateVariable`] holding only
//! the two integrator states. [`SvfParameters::set_freq`] recomputes the
//! frequency-dependent terms and leaves the resonance coefficient alone,
//! which makes per-sample cutoff modulation by an envelope affordable.
//!
//! # Four-pole mode
//!
//! [`StateVariable24`] runs the same parameters through two cascaded stages
//! for a 24 dB/oct slope.
//!
//! # Reference
//!
//! Zavalishin, "The Art of VA Filter Design", rev. 2.1.2 (2018), Chapter 3.

use core::f32::consts::PI;
use libm::tanf;

use crate::math::flush_denormal;

/// Which output of the filter to use.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SvfType {
    /// Low-pass output.
    #[default]
    Lowpass,
    /// High-pass output.
    Highpass,
    /// Band-pass output.
    Bandpass,
    /// Notch (low + high).
    Notch,
}

impl SvfType {
    /// All types in selector order.
    pub const ALL: [SvfType; 4] = [
        SvfType::Lowpass,
        SvfType::Highpass,
        SvfType::Bandpass,
        SvfType::Notch,
    ];

    /// Type for a selector index, wrapping out-of-range values.
    pub fn from_index(index: usize) -> Self {
        Self::ALL[index % Self::ALL.len()]
    }

    /// Selector index of this type.
    pub fn index(self) -> usize {
        self as usize
    }
}

/// All four outputs of one filter step.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SvfOutputs {
    /// Low-pass output.
    pub low: f32,
    /// High-pass output.
    pub high: f32,
    /// Band-pass output.
    pub band: f32,
    /// Notch output.
    pub notch: f32,
}

impl SvfOutputs {
    /// The output selected by `kind`.
    #[inline]
    pub fn select(&self, kind: SvfType) -> f32 {
        match kind {
            SvfType::Lowpass => self.low,
            SvfType::Highpass => self.high,
            SvfType::Bandpass => self.band,
            SvfType::Notch => self.notch,
        }
    }
}

/// Precomputed SVF coefficients.
///
/// `g` is the frequency coefficient `tan(π·fc/fs)` and `k = 1/Q` the
/// resonance coefficient; `a1..a3` are derived from both.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SvfParameters {
    /// Output returned by [`StateVariable::filter`].
    pub kind: SvfType,
    g: f32,
    k: f32,
    a1: f32,
    a2: f32,
    a3: f32,
    sample_rate: f32,
}

impl Default for SvfParameters {
    fn default() -> Self {
        Self::new(48000.0)
    }
}

impl SvfParameters {
    /// Lowpass at a quarter of the sample rate with Q = 0.707.
    pub fn new(sample_rate: f32) -> Self {
        let mut params = Self {
            kind: SvfType::Lowpass,
            g: 0.0,
            k: 1.0,
            a1: 1.0,
            a2: 0.0,
            a3: 0.0,
            sample_rate,
        };
        params.set(SvfType::Lowpass, sample_rate / 4.0, core::f32::consts::FRAC_1_SQRT_2);
        params
    }

    /// Sample rate the coefficients are designed for.
    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    /// Set output type, cutoff in Hz and resonance.
    ///
    /// `q` is clamped to at least 0.05.
    pub fn set(&mut self, kind: SvfType, freq: f32, q: f32) {
        self.kind = kind;
        self.k = 1.0 / q.max(0.05);
        self.set_freq(freq);
    }

    /// Change only the cutoff frequency.
    ///
    /// Cutoff is clamped to 1 Hz ..= 0.49·fs.
    #[inline]
    pub fn set_freq(&mut self, freq: f32) {
        let cutoff = freq.clamp(1.0, self.sample_rate * 0.49);
        let arg = PI * cutoff / self.sample_rate;
        self.g = if cutoff < 10_000.0 { fast_tan(arg) } else { tanf(arg) };
        self.a1 = 1.0 / (1.0 + self.g * (self.g + self.k));
        self.a2 = self.g * self.a1;
        self.a3 = self.g * self.a2;
    }

    /// Frequency coefficient.
    pub fn g(&self) -> f32 {
        self.g
    }

    /// Resonance coefficient (1/Q).
    pub fn k(&self) -> f32 {
        self.k
    }
}

/// Two-pole (12 dB/oct) state variable filter state.
#[derive(Debug, Clone, Copy, Default)]
pub struct StateVariable {
    ic1eq: f32,
    ic2eq: f32,
}

impl StateVariable {
    /// Create a filter with cleared state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Process one sample and return every output.
    #[inline]
    pub fn filter_all(&mut self, params: &SvfParameters, input: f32) -> SvfOutputs {
        let v3 = input - self.ic2eq;
        let v1 = params.a1 * self.ic1eq + params.a2 * v3;
        let v2 = self.ic2eq + params.a2 * self.ic1eq + params.a3 * v3;

        self.ic1eq = flush_denormal(2.0 * v1 - self.ic1eq);
        self.ic2eq = flush_denormal(2.0 * v2 - self.ic2eq);

        let high = input - params.k * v1 - v2;
        SvfOutputs {
            low: v2,
            high,
            band: v1,
            notch: v2 + high,
        }
    }

    /// Process one sample and return the output chosen by `params.kind`.
    #[inline]
    pub fn filter(&mut self, params: &SvfParameters, input: f32) -> f32 {
        self.filter_all(params, input).select(params.kind)
    }

    /// Clear the integrator states.
    pub fn clear(&mut self) {
        self.ic1eq = 0.0;
        self.ic2eq = 0.0;
    }
}

/// Four-pole (24 dB/oct) state variable filter.
///
/// Two [`StateVariable`] stages driven by the same parameters.
#[derive(Debug, Clone, Copy, Default)]
pub struct StateVariable24 {
    stages: [StateVariable; 2],
}

impl StateVariable24 {
    /// Create a filter with cleared state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Process one sample through both stages.
    #[inline]
    pub fn filter(&mut self, params: &SvfParameters, input: f32) -> f32 {
        let mid = self.stages[0].filter(params, input);
        self.stages[1].filter(params, mid)
    }

    /// Clear both stages.
    pub fn clear(&mut self) {
        for stage in &mut self.stages {
            stage.clear();
        }
    }
}

/// Padé approximation of `tan`, accurate to 0.1% below fs/4.
#[inline]
fn fast_tan(x: f32) -> f32 {
    let x2 = x * x;
    x * (15.0 - x2) / (15.0 - 6.0 * x2)
}
