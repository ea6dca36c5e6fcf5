//! Envelope generators.
//!
//! Four state machines share one contract: `init` restarts the attack,
//! `release` enters the release stage from wherever the envelope is,
//! `update` advances one sample and returns the linear level, and
//! `is_active` turns false only once the release has finished.
//!
//! | Envelope | Shape | Parameters |
//! |----------|-------|------------|
//! | [`LinearAdsr`] | Straight ramps | [`AdsrParameters`] |
//! | [`ExponentialAdsr`] | Linear attack, exponential decay and release | [`AdsrParameters`] |
//! | [`ExponentialDx7`] | Four dB breakpoints, linear in dB | [`Dx7Parameters`] |
//! | [`BimodalDx7`] | Four dB breakpoints at a fixed rate per segment | [`Dx7Parameters`] |
//!
//! Parameters are held by the program and passed to every `update`, so all
//! voices of a program follow a control change on their next sample.

mod bimodal_dx7;
mod exponential_adsr;
mod exponential_dx7;
mod linear_adsr;

pub use bimodal_dx7::BimodalDx7;
pub use exponential_adsr::ExponentialAdsr;
pub use exponential_dx7::ExponentialDx7;
pub use linear_adsr::LinearAdsr;

use libm::powf;

/// Level below which an ADSR release is considered silent.
pub const SILENCE: f32 = 1.0e-4;

/// ADSR settings in seconds and linear sustain level.
///
/// This is the persisted form; [`AdsrParameters`] derives per-sample
/// coefficients from it.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct AdsrTimes {
    /// Attack time in seconds.
    pub attack: f32,
    /// Decay time in seconds.
    pub decay: f32,
    /// Sustain level (linear, 0..=1).
    pub sustain: f32,
    /// Release time in seconds.
    pub release: f32,
}

impl Default for AdsrTimes {
    fn default() -> Self {
        Self {
            attack: 0.0,
            decay: 1.0,
            sustain: 1.0,
            release: 0.1,
        }
    }
}

/// Per-sample ADSR coefficients.
///
/// Linear envelopes read `attack`, `decay` and `release` as increments per
/// sample; exponential ones read `decay` and `release` as multipliers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdsrParameters {
    times: AdsrTimes,
    sample_rate: f32,
    /// Attack increment per sample.
    pub attack: f32,
    /// Linear decay increment per sample.
    pub decay: f32,
    /// Exponential decay multiplier per sample.
    pub decay_coeff: f32,
    /// Sustain level.
    pub sustain: f32,
    /// Linear release decrement per sample.
    pub release: f32,
    /// Exponential release multiplier per sample.
    pub release_coeff: f32,
}

impl Default for AdsrParameters {
    fn default() -> Self {
        Self::new(48000.0)
    }
}

/// `1/(sr·t)`, or a single-sample step when the time is shorter than a sample.
fn linear_step(sample_rate: f32, time: f32) -> f32 {
    let samples = sample_rate * time;
    if samples > 1.0 { 1.0 / samples } else { 1.0 }
}

/// Multiplier that falls by 40 dB over `time` seconds.
fn exponential_coeff(sample_rate: f32, time: f32) -> f32 {
    if time <= 0.0 {
        return 0.0;
    }
    powf(10.0, -2.0 / (time * sample_rate))
}

impl AdsrParameters {
    /// Default settings at the given sample rate.
    pub fn new(sample_rate: f32) -> Self {
        Self::from_times(sample_rate, AdsrTimes::default())
    }

    /// Derive coefficients from settings.
    pub fn from_times(sample_rate: f32, times: AdsrTimes) -> Self {
        let mut params = Self {
            times,
            sample_rate,
            attack: 1.0,
            decay: 1.0,
            decay_coeff: 0.0,
            sustain: 1.0,
            release: 1.0,
            release_coeff: 0.0,
        };
        params.set(times.attack, times.decay, times.sustain, times.release);
        params
    }

    /// Settings these coefficients were derived from.
    pub fn times(&self) -> AdsrTimes {
        self.times
    }

    /// Set all four stages at once.
    pub fn set(&mut self, attack: f32, decay: f32, sustain: f32, release: f32) {
        self.set_attack(attack);
        self.set_decay(decay);
        self.set_sustain(sustain);
        self.set_release(release);
    }

    /// Attack time in seconds.
    pub fn set_attack(&mut self, seconds: f32) {
        self.times.attack = seconds;
        self.attack = linear_step(self.sample_rate, seconds);
    }

    /// Decay time in seconds.
    pub fn set_decay(&mut self, seconds: f32) {
        self.times.decay = seconds;
        self.decay = linear_step(self.sample_rate, seconds);
        self.decay_coeff = exponential_coeff(self.sample_rate, seconds);
    }

    /// Sustain level, linear.
    pub fn set_sustain(&mut self, level: f32) {
        self.times.sustain = level;
        self.sustain = level;
    }

    /// Release time in seconds.
    pub fn set_release(&mut self, seconds: f32) {
        self.times.release = seconds;
        self.release = linear_step(self.sample_rate, seconds);
        self.release_coeff = exponential_coeff(self.sample_rate, seconds);
    }
}

/// Stage of an ADSR envelope.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AdsrStage {
    /// Silent.
    #[default]
    Off,
    /// Rising towards full level.
    Attack,
    /// Falling towards the sustain level, then holding it.
    Decay,
    /// Falling towards silence.
    Release,
}

/// Breakpoint envelope in the style of the DX7.
///
/// `level[0]` is both the start and the end level; the attack passes
/// through `level[1]` and `level[2]` to the sustain level `level[3]`.
/// `duration[i]` is the time from `level[i]` to the next breakpoint, with
/// `duration[3]` the release time back to `level[0]`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Dx7Parameters {
    /// Breakpoint levels in dB.
    pub level: [f32; 4],
    /// Segment durations in seconds.
    pub duration: [f32; 4],
}

/// Stage of a DX7-style envelope.
///
/// The discriminants of the attack stages index the breakpoint they move
/// towards.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Dx7Stage {
    /// Holding `level[0]`.
    #[default]
    Off,
    /// Towards `level[1]`.
    Attack1,
    /// Towards `level[2]`.
    Attack2,
    /// Towards `level[3]`.
    Attack3,
    /// Holding `level[3]`.
    Sustain,
    /// Towards `level[0]`.
    Release,
}

impl Dx7Stage {
    fn attack(index: usize) -> Self {
        match index {
            1 => Dx7Stage::Attack1,
            2 => Dx7Stage::Attack2,
            3 => Dx7Stage::Attack3,
            _ => Dx7Stage::Sustain,
        }
    }
}
