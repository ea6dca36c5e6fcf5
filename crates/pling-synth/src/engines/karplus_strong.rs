//! Plucked string engine.
//!
//! Each voice owns a delay line one period long, filled with noise at
//! note-on. A phase accumulator reads it with linear interpolation; every
//! time the read position moves past a sample, that sample is replaced by a
//! blend of itself and the average of its neighbours. The blend factor sets
//! how quickly high frequencies die away.

use pling_core::{
    AdsrParameters, AdsrTimes, Chunk, ExponentialAdsr, Oscillator, cc_exponential,
    cc_exponential_clamped, cc_linear, key_to_frequency, pitch_bend_ratio,
};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::{POLYPHONY, envelope_time, set_adsr_fader};
use crate::control::Control;
use crate::error::LoadError;
use crate::program::{Program, decode, encode};
use crate::voice_manager::{Voice, VoiceManager};

/// Tremolo rate in Hz.
const LFO_FREQUENCY: f32 = 10.0;

/// What a `Karplus-Strong` patch stores.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KarplusStrongSettings {
    /// Amplitude envelope.
    pub amplitude_envelope: AdsrTimes,
    /// Envelope scaling the decay factor over the note.
    pub filter_envelope: AdsrTimes,
    /// Share of each sample kept when the loop passes it; the rest is the
    /// neighbour average.
    pub decay: f32,
}

impl Default for KarplusStrongSettings {
    fn default() -> Self {
        Self {
            amplitude_envelope: AdsrTimes::default(),
            filter_envelope: AdsrTimes::default(),
            decay: 0.9,
        }
    }
}

/// Decay factor for a controller value; fine resolution close to 1.
fn decay_factor(value: u8) -> f32 {
    1.0 - cc_exponential(127 - value.min(127), 0.001, 1.0)
}

#[derive(Debug, Clone)]
struct Parameters {
    bend: f32,
    modulation: f32,
    amplitude_envelope: AdsrParameters,
    filter_envelope: AdsrParameters,
    decay: f32,
}

#[derive(Debug, Clone)]
struct StringVoice {
    osc: Oscillator,
    lfo: Oscillator,
    amplitude_envelope: ExponentialAdsr,
    filter_envelope: ExponentialAdsr,
    buffer: Vec<f32>,
    len: usize,
}

impl StringVoice {
    fn new(sample_rate: f32) -> Self {
        let capacity = (sample_rate / key_to_frequency(0)).round() as usize + 1;
        Self {
            osc: Oscillator::new(sample_rate),
            lfo: Oscillator::new(sample_rate),
            amplitude_envelope: ExponentialAdsr::new(),
            filter_envelope: ExponentialAdsr::new(),
            buffer: vec![0.0; capacity],
            len: 1,
        }
    }

    fn init(&mut self, key: u8, amp: f32, sample_rate: f32, rng: &mut SmallRng) {
        let frequency = key_to_frequency(key);
        self.len = ((sample_rate / frequency).round() as usize).clamp(1, self.buffer.len());

        self.lfo.init(LFO_FREQUENCY);
        self.osc.init(frequency);
        self.amplitude_envelope.init();
        self.filter_envelope.init();

        for sample in &mut self.buffer[..self.len] {
            *sample = rng.gen_range(-1.0..1.0) * amp * 2.0;
        }
    }

    fn render(&mut self, chunk: &mut Chunk, params: &Parameters) {
        let len = self.len;
        let buffer = &mut self.buffer[..len];

        for sample in chunk.iter_mut() {
            let decay_envelope = self.filter_envelope.update(&params.filter_envelope);

            let rp = self.osc.phase() * len as f32;
            let rp1 = (rp as usize).min(len - 1);
            let rp2 = if rp1 + 1 >= len { 0 } else { rp1 + 1 };
            let a = rp - rp1 as f32;

            let tremolo = 1.0 - (self.lfo.fast_sine() * 0.5 + 0.5) * params.modulation;
            let out = (1.0 - a) * buffer[rp1] + a * buffer[rp2];
            *sample += out * self.amplitude_envelope.update(&params.amplitude_envelope) * tremolo;

            self.lfo.update(1.0);
            self.osc.update(params.bend);

            if (self.osc.phase() * len as f32) as usize == rp1 {
                continue;
            }

            // The read position moved on; damp the sample it left behind.
            let rp3 = if rp1 == 0 { len - 1 } else { rp1 - 1 };
            let d = params.decay * decay_envelope;
            buffer[rp1] = buffer[rp1] * d + (buffer[rp2] + buffer[rp3]) * 0.5 * (1.0 - d);
        }
    }
}

impl Voice for StringVoice {
    type Params = Parameters;

    fn release(&mut self, _params: &Parameters) {
        self.amplitude_envelope.release();
        self.filter_envelope.release();
    }

    fn is_active(&self) -> bool {
        self.amplitude_envelope.is_active()
    }
}

/// Karplus-Strong plucked string engine.
///
/// Responds to controller numbers directly: 1 modulation, 12-15 (or 38-41)
/// amplitude envelope, 16-19 (or 42-45) decay envelope, 30 (or 60) decay
/// factor, 64 sustain. Faders 0-7 set the two envelopes and pot 2 the decay
/// factor.
#[derive(Debug, Clone)]
pub struct KarplusStrong {
    voices: VoiceManager<StringVoice, POLYPHONY>,
    params: Parameters,
    sample_rate: f32,
    rng: SmallRng,
}

impl KarplusStrong {
    /// Engine name.
    pub const NAME: &'static str = "Karplus-Strong";

    /// Create the engine with default settings and an entropy-seeded noise
    /// source.
    pub fn new(sample_rate: f32) -> Self {
        Self::with_rng(sample_rate, SmallRng::from_entropy())
    }

    /// Create the engine with a fixed noise seed.
    pub fn with_seed(sample_rate: f32, seed: u64) -> Self {
        Self::with_rng(sample_rate, SmallRng::seed_from_u64(seed))
    }

    fn with_rng(sample_rate: f32, rng: SmallRng) -> Self {
        let settings = KarplusStrongSettings::default();
        Self {
            voices: VoiceManager::new(|| StringVoice::new(sample_rate)),
            params: Parameters {
                bend: 1.0,
                modulation: 0.0,
                amplitude_envelope: AdsrParameters::from_times(sample_rate, settings.amplitude_envelope),
                filter_envelope: AdsrParameters::from_times(sample_rate, settings.filter_envelope),
                decay: settings.decay,
            },
            sample_rate,
            rng,
        }
    }

    /// Current settings.
    pub fn settings(&self) -> KarplusStrongSettings {
        KarplusStrongSettings {
            amplitude_envelope: self.params.amplitude_envelope.times(),
            filter_envelope: self.params.filter_envelope.times(),
            decay: self.params.decay,
        }
    }

    /// Replace the settings.
    pub fn apply(&mut self, settings: KarplusStrongSettings) {
        self.params.amplitude_envelope = AdsrParameters::from_times(self.sample_rate, settings.amplitude_envelope);
        self.params.filter_envelope = AdsrParameters::from_times(self.sample_rate, settings.filter_envelope);
        self.params.decay = settings.decay.clamp(0.0, 1.0);
    }
}

impl Program for KarplusStrong {
    fn engine_name(&self) -> &'static str {
        Self::NAME
    }

    fn render(&mut self, chunk: &mut Chunk) -> bool {
        let params = &self.params;
        let mut active = false;
        for voice in self.voices.active_voices() {
            voice.render(chunk, params);
            active = true;
        }
        active
    }

    fn note_on(&mut self, key: u8, velocity: u8) {
        let amp = cc_exponential(velocity.min(127), 1.0 / 32.0, 1.0);
        if let Some((voice, _)) = self.voices.press(key) {
            voice.init(key, amp, self.sample_rate, &mut self.rng);
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

    fn control_change(&mut self, controller: u8, value: u8) {
        let amplitude = &mut self.params.amplitude_envelope;
        let filter = &mut self.params.filter_envelope;

        match controller {
            1 => self.params.modulation = cc_linear(value, 0.0, 1.0),
            12 | 38 => amplitude.set_attack(envelope_time(value)),
            13 | 39 => amplitude.set_decay(envelope_time(value)),
            14 | 40 => amplitude.set_sustain(cc_exponential_clamped(value, 0.0, 1e-2, 1.0, 1.0)),
            15 | 41 => amplitude.set_release(envelope_time(value)),
            16 | 42 => filter.set_attack(envelope_time(value)),
            17 | 43 => filter.set_decay(envelope_time(value)),
            18 | 44 => filter.set_sustain(decay_factor(value)),
            19 | 45 => filter.set_release(envelope_time(value)),
            30 | 60 => self.params.decay = decay_factor(value),
            64 => self.voices.set_sustain(value >= 64, &self.params),
            _ => {}
        }
    }

    fn set_fader(&mut self, control: Control, value: u8) {
        match control.column() {
            Some(col @ 0..=3) => set_adsr_fader(&mut self.params.amplitude_envelope, col, value),
            Some(col @ 4..=7) => set_adsr_fader(&mut self.params.filter_envelope, col - 4, value),
            _ => {}
        }
    }

    fn set_pot(&mut self, control: Control, value: u8) {
        if control.column() == Some(2) {
            self.params.decay = decay_factor(value);
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
