//! The built-in sound engines.
//!
//! | Engine           | Voice                                               |
//! |------------------|-----------------------------------------------------|
//! | `Simple`         | saw, tremolo, ADSR, enveloped state variable filter |
//! | `Karplus-Strong` | noise-excited delay line with an averaging loop     |
//! | `Octalope`       | eight phase-modulation operators with DX7 envelopes |
//!
//! Each engine keeps its runtime parameters in one struct shared by all
//! voices, and a serializable settings struct that is what patches store.

mod karplus_strong;
mod octalope;
mod simple;

pub use karplus_strong::{KarplusStrong, KarplusStrongSettings};
pub use octalope::{
    CutoffSettings, OPERATORS, Octalope, OctalopeSettings, OperatorSettings, PitchSettings, Waveform,
};
pub use simple::{Simple, SimpleSettings};

use pling_core::{
    AdsrParameters, SvfParameters, SvfType, cc_exponential_clamped, cc_linear, cc_select,
    db_to_amplitude,
};
use serde::{Deserialize, Serialize};

/// Voices per program.
pub const POLYPHONY: usize = 32;

/// Envelope time in seconds for a fader: 0 is instant, 127 is ten seconds.
pub(crate) fn envelope_time(value: u8) -> f32 {
    cc_exponential_clamped(value, 0.0, 1e-2, 1e1, 1e1)
}

/// Sustain level for a fader, -48 dB ..= 0 dB.
pub(crate) fn sustain_level(value: u8) -> f32 {
    db_to_amplitude(cc_linear(value, -48.0, 0.0))
}

/// Faders 0..=3 set attack, decay, sustain and release.
pub(crate) fn set_adsr_fader(envelope: &mut AdsrParameters, stage: usize, value: u8) {
    match stage {
        0 => envelope.set_attack(envelope_time(value)),
        1 => envelope.set_decay(envelope_time(value)),
        2 => envelope.set_sustain(sustain_level(value)),
        3 => envelope.set_release(envelope_time(value)),
        _ => {}
    }
}

/// Persisted state variable filter settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterSettings {
    /// Cutoff in Hz.
    pub frequency: f32,
    /// Resonance.
    #[serde(rename = "Q")]
    pub q: f32,
    /// Output selector: 0 lowpass, 1 highpass, 2 bandpass, 3 notch.
    #[serde(rename = "type")]
    pub kind: u8,
}

impl Default for FilterSettings {
    fn default() -> Self {
        Self {
            frequency: 12000.0,
            q: core::f32::consts::FRAC_1_SQRT_2,
            kind: 0,
        }
    }
}

impl FilterSettings {
    /// Selected output type; out-of-range selectors wrap.
    pub fn kind(&self) -> SvfType {
        SvfType::from_index(usize::from(self.kind))
    }

    /// Apply to filter coefficients.
    pub(crate) fn apply(&self, svf: &mut SvfParameters) {
        svf.set(self.kind(), self.frequency, self.q);
    }

    /// Pots 0, 1 and 3 set cutoff, resonance and type. Returns whether the
    /// pot was one of them.
    pub(crate) fn set_pot(&mut self, col: usize, value: u8, sample_rate: f32) -> bool {
        match col {
            0 => self.frequency = cc_exponential_clamped(value, 0.0, 1.0, sample_rate / 6.0, sample_rate / 6.0),
            1 => self.q = cc_exponential_clamped(value, 1.0, 1.0, 100.0, 100.0),
            3 => self.kind = cc_select(value, 4) as u8,
            _ => return false,
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_time_range() {
        assert_eq!(envelope_time(0), 0.0);
        assert_eq!(envelope_time(127), 10.0);
        assert!((envelope_time(1) - 0.0106).abs() < 1e-3);
    }

    #[test]
    fn test_sustain_level_range() {
        assert!((sustain_level(127) - 1.0).abs() < 1e-6);
        assert!((sustain_level(0) - db_to_amplitude(-48.0)).abs() < 1e-6);
    }

    #[test]
    fn test_filter_pots() {
        let mut filter = FilterSettings::default();
        assert!(filter.set_pot(0, 127, 48000.0));
        assert_eq!(filter.frequency, 8000.0);
        assert!(filter.set_pot(1, 0, 48000.0));
        assert_eq!(filter.q, 1.0);
        assert!(filter.set_pot(3, 127, 48000.0));
        assert_eq!(filter.kind(), SvfType::Notch);
        assert!(!filter.set_pot(2, 64, 48000.0));
    }

    #[test]
    fn test_out_of_range_type_wraps() {
        let filter = FilterSettings { kind: 6, ..FilterSettings::default() };
        assert_eq!(filter.kind(), SvfType::Bandpass);
    }
}
