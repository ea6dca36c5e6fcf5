//! Subtractive engine: one saw per voice through an enveloped filter.

use libm::expf;
use pling_core::{
    AdsrParameters, AdsrTimes, Chunk, ExponentialAdsr, Oscillator, StateVariable, SvfParameters,
    cc_linear, key_to_frequency, pitch_bend_ratio,
};
use serde::{Deserialize, Serialize};

use super::{FilterSettings, POLYPHONY, set_adsr_fader};
use crate::control::Control;
use crate::error::LoadError;
use crate::program::{Program, decode, encode};
use crate::voice_manager::{Trigger, Voice, VoiceManager};

/// Tremolo rate in Hz.
const LFO_FREQUENCY: f32 = 10.0;

/// What a `Simple` patch stores.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SimpleSettings {
    /// Amplitude envelope.
    pub amplitude_envelope: AdsrTimes,
    /// Filter cutoff envelope, scaling the cutoff.
    pub filter_envelope: AdsrTimes,
    /// Filter.
    pub filter: FilterSettings,
}

#[derive(Debug, Clone)]
struct Parameters {
    bend: f32,
    modulation: f32,
    amplitude_envelope: AdsrParameters,
    filter_envelope: AdsrParameters,
    filter: FilterSettings,
    svf: SvfParameters,
}

#[derive(Debug, Clone, Copy)]
struct SimpleVoice {
    osc: Oscillator,
    lfo: Oscillator,
    amp: f32,
    amplitude_envelope: ExponentialAdsr,
    filter_envelope: ExponentialAdsr,
    svf: StateVariable,
}

impl SimpleVoice {
    fn new(sample_rate: f32) -> Self {
        Self {
            osc: Oscillator::new(sample_rate),
            lfo: Oscillator::new(sample_rate),
            amp: 0.0,
            amplitude_envelope: ExponentialAdsr::new(),
            filter_envelope: ExponentialAdsr::new(),
            svf: StateVariable::new(),
        }
    }

    fn init(&mut self, key: u8, velocity: u8, trigger: Trigger) {
        let frequency = key_to_frequency(key);
        match trigger {
            Trigger::New => {
                self.osc.init(frequency);
                self.lfo.init(LFO_FREQUENCY);
                self.svf.clear();
            }
            Trigger::Retrigger => self.osc.set_frequency(frequency),
        }
        self.amp = expf((f32::from(velocity) - 127.0) / 32.0);
        self.amplitude_envelope.init();
        self.filter_envelope.init();
    }

    fn render(&mut self, chunk: &mut Chunk, params: &mut Parameters) {
        for sample in chunk.iter_mut() {
            let cutoff = self.filter_envelope.update(&params.filter_envelope) * params.filter.frequency;
            params.svf.set_freq(cutoff);

            let tremolo = 1.0 - (self.lfo.fast_sine() * 0.5 + 0.5) * params.modulation;
            let amplitude = self.amp * self.amplitude_envelope.update(&params.amplitude_envelope);
            *sample += self.svf.filter(&params.svf, self.osc.saw() * amplitude * tremolo);

            self.lfo.update(1.0);
            self.osc.update(params.bend);
        }
    }
}

impl Voice for SimpleVoice {
    type Params = Parameters;

    fn release(&mut self, _params: &Parameters) {
        self.amplitude_envelope.release();
        self.filter_envelope.release();
    }

    fn is_active(&self) -> bool {
        self.amplitude_envelope.is_active()
    }
}

/// Subtractive synth engine.
///
/// Faders 0-3 set the amplitude envelope and 4-7 the filter envelope. Pots
/// 0, 1 and 3 set filter cutoff, resonance and type. The modulation wheel
/// sets tremolo depth.
#[derive(Debug, Clone)]
pub struct Simple {
    voices: VoiceManager<SimpleVoice, POLYPHONY>,
    params: Parameters,
    sample_rate: f32,
}

impl Simple {
    /// Engine name.
    pub const NAME: &'static str = "Simple";

    /// Create the engine with default settings.
    pub fn new(sample_rate: f32) -> Self {
        let filter = FilterSettings {
            frequency: sample_rate / 4.0,
            ..FilterSettings::default()
        };

        let mut simple = Self {
            voices: VoiceManager::new(|| SimpleVoice::new(sample_rate)),
            params: Parameters {
                bend: 1.0,
                modulation: 0.0,
                amplitude_envelope: AdsrParameters::new(sample_rate),
                filter_envelope: AdsrParameters::new(sample_rate),
                filter,
                svf: SvfParameters::new(sample_rate),
            },
            sample_rate,
        };
        simple.apply(SimpleSettings {
            filter,
            ..SimpleSettings::default()
        });
        simple
    }

    /// Current settings.
    pub fn settings(&self) -> SimpleSettings {
        SimpleSettings {
            amplitude_envelope: self.params.amplitude_envelope.times(),
            filter_envelope: self.params.filter_envelope.times(),
            filter: self.params.filter,
        }
    }

    /// Replace the settings.
    pub fn apply(&mut self, settings: SimpleSettings) {
        self.params.amplitude_envelope = AdsrParameters::from_times(self.sample_rate, settings.amplitude_envelope);
        self.params.filter_envelope = AdsrParameters::from_times(self.sample_rate, settings.filter_envelope);
        self.params.filter = settings.filter;
        self.params.filter.apply(&mut self.params.svf);
    }
}

impl Program for Simple {
    fn engine_name(&self) -> &'static str {
        Self::NAME
    }

    fn render(&mut self, chunk: &mut Chunk) -> bool {
        let params = &mut self.params;
        let mut active = false;
        for voice in self.voices.active_voices() {
            voice.render(chunk, params);
            active = true;
        }
        active
    }

    fn note_on(&mut self, key: u8, velocity: u8) {
        if let Some((voice, trigger)) = self.voices.press(key) {
            voice.init(key, velocity, trigger);
        }
    }

    fn note_off(&mut self, key: u8, _velocity: u8) {
        self.voices.release(key, &self.params);
    }

    fn pitch_bend(&mut self, value: i16) {
        self.params.bend = pitch_bend_ratio(value, 2.0);
    }

    fn modulation(&mut self, value: u8) {
        self.params.modulation = cc_linear(value, 0.0, 1.0);
    }

    fn sustain(&mut self, on: bool) {
        self.voices.set_sustain(on, &self.params);
    }

    fn set_fader(&mut self, control: Control, value: u8) {
        match control.column() {
            Some(col @ 0..=3) => set_adsr_fader(&mut self.params.amplitude_envelope, col, value),
            Some(col @ 4..=7) => set_adsr_fader(&mut self.params.filter_envelope, col - 4, value),
            _ => {}
        }
    }

    fn set_pot(&mut self, control: Control, value: u8) {
        if let Some(col) = control.column()
            && self.params.filter.set_pot(col, value, self.sample_rate)
        {
            self.params.filter.apply(&mut self.params.svf);
        }
    }

    fn release_all(&mut self) {
        self.voices.release_all(&self.params);
    }

    fn zero_crossing(&self, offset: f32) -> f32 {
        self.voices
            .lowest()
            .map_or(offset, |voice| voice.osc.zero_crossing(offset, self.params.bend))
    }

    fn base_frequency(&self) -> f32 {
        self.voices
            .lowest()
            .map_or(0.0, |voice| voice.osc.frequency(self.params.bend))
    }

    fn load(&mut self, parameters: &toml::Table) -> Result<(), LoadError> {
        let settings = decode(Self::NAME, parameters)?;
        self.apply(settings);
        Ok(())
    }

    fn save(&self) -> toml::Table {
        encode(&self.settings())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::Command;

    const SR: f32 = 48000.0;

    fn render_chunks(program: &mut Simple, chunks: usize) -> (bool, f32) {
        let mut active = false;
        let mut peak: f32 = 0.0;
        for _ in 0..chunks {
            let mut chunk = Chunk::new();
            active = program.render(&mut chunk);
            peak = chunk.iter().fold(peak, |p, s| p.max(s.abs()));
        }
        (active, peak)
    }

    #[test]
    fn test_note_produces_sound() {
        let mut simple = Simple::new(SR);
        simple.note_on(57, 127);
        let (active, peak) = render_chunks(&mut simple, 40);
        assert!(active);
        assert!(peak > 0.1, "peak {peak}");
        assert!((simple.base_frequency() - 220.0).abs() < 0.01);
    }

    #[test]
    fn test_release_goes_silent() {
        let mut simple = Simple::new(SR);
        simple.note_on(60, 100);
        render_chunks(&mut simple, 4);
        simple.note_off(60, 0);
        // 0.1 s release falls 40 dB per 0.1 s, silent within 0.3 s.
        let (active, _) = render_chunks(&mut simple, 120);
        assert!(!active);
        assert_eq!(simple.base_frequency(), 0.0);
    }

    #[test]
    fn test_velocity_scales_amplitude() {
        let mut loud = Simple::new(SR);
        let mut soft = Simple::new(SR);
        loud.note_on(60, 127);
        soft.note_on(60, 95);
        let (_, loud_peak) = render_chunks(&mut loud, 20);
        let (_, soft_peak) = render_chunks(&mut soft, 20);
        let ratio = soft_peak / loud_peak;
        assert!((ratio - expf(-1.0)).abs() < 0.05, "ratio {ratio}");
    }

    #[test]
    fn test_pitch_bend_two_semitones() {
        let mut simple = Simple::new(SR);
        simple.note_on(69, 100);
        simple.pitch_bend(8191);
        let expected = 440.0 * libm::exp2f(2.0 / 12.0);
        assert!((simple.base_frequency() - expected).abs() < 0.1);
    }

    #[test]
    fn test_faders_and_pots() {
        let mut simple = Simple::new(SR);
        simple.set_fader(Control::new(Command::Fader, 0), 127);
        simple.set_fader(Control::new(Command::Fader, 6), 127);
        simple.set_pot(Control::new(Command::Pot, 1), 127);
        simple.set_pot(Control::new(Command::Pot, 3), 40);

        let settings = simple.settings();
        assert_eq!(settings.amplitude_envelope.attack, 10.0);
        assert!((settings.filter_envelope.sustain - 1.0).abs() < 1e-6);
        assert_eq!(settings.filter.q, 100.0);
        assert_eq!(settings.filter.kind, 1);
    }

    #[test]
    fn test_save_load_round_trip() {
        let mut simple = Simple::new(SR);
        simple.set_fader(Control::new(Command::Fader, 3), 90);
        simple.set_pot(Control::new(Command::Pot, 0), 70);
        let saved = simple.save();

        let mut other = Simple::new(SR);
        other.load(&saved).unwrap();
        assert_eq!(other.settings(), simple.settings());
    }

    #[test]
    fn test_load_partial_table() {
        let patch: toml::Table = toml::from_str("[amplitude_envelope]\nrelease = 2.0\n").unwrap();
        let mut simple = Simple::new(SR);
        simple.load(&patch).unwrap();
        assert_eq!(simple.settings().amplitude_envelope.release, 2.0);
        assert_eq!(simple.settings().amplitude_envelope.decay, 1.0);
    }

    #[test]
    fn test_sustain_pedal() {
        let mut simple = Simple::new(SR);
        simple.sustain(true);
        simple.note_on(60, 100);
        simple.note_off(60, 0);
        let (active, _) = render_chunks(&mut simple, 120);
        assert!(active, "pedal should hold the note");
        simple.sustain(false);
        let (active, _) = render_chunks(&mut simple, 120);
        assert!(!active);
    }
}
