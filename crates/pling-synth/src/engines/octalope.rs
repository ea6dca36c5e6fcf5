//! Eight-operator phase modulation engine.
//!
//! Every operator can modulate every other through an 8×8 matrix, so the
//! classic stacks, feedback loops and parallel carriers are all just
//! different matrix contents. Operator 8 doubles as the LFO for pitch,
//! cutoff and amplitude modulation; give it a fixed low frequency and no
//! output level to use it that way.

use core::f32::consts::FRAC_1_SQRT_2;

use libm::exp2f;
use pling_core::{
    BimodalDx7, Chunk, Dx7Parameters, ExponentialDx7, KeyboardScaling, Operator, StateVariable,
    SvfParameters, SvfType, VelocityScaling, cc_exponential, cc_exponential_clamped, cc_linear,
    cc_select, db_to_amplitude, key_to_frequency, pitch_bend_ratio,
};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::{POLYPHONY, envelope_time};
use crate::control::Control;
use crate::error::LoadError;
use crate::program::{Program, decode, encode};
use crate::voice_manager::{Trigger, Voice, VoiceManager};

/// Number of operators.
pub const OPERATORS: usize = 8;

/// Index of the operator used as LFO.
const LFO: usize = OPERATORS - 1;

/// Selector value of the global page.
const GLOBAL: usize = OPERATORS;

/// Frequency ratio for a coarse controller value: 64 is unity, above it the
/// integer harmonics, below it the subharmonics.
fn coarse_ratio(value: u8) -> f32 {
    let value = value.min(127);
    if value >= 64 {
        f32::from(value - 63)
    } else {
        1.0 / f32::from(64 - value)
    }
}

/// Operator output or modulation level for a fader; 0 is off.
fn fader_level(value: u8) -> f32 {
    if value == 0 {
        0.0
    } else {
        db_to_amplitude(cc_linear(value, -48.0, 0.0))
    }
}

/// Waveform of one operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Waveform {
    /// Sine.
    #[default]
    Sine,
    /// Triangle.
    Triangle,
    /// Square.
    Square,
    /// Falling saw.
    Saw,
    /// Rising saw.
    ReverseSaw,
}

impl Waveform {
    /// Waveform for a stored selector; out-of-range selectors wrap.
    pub fn from_index(index: u8) -> Self {
        match index % 5 {
            0 => Waveform::Sine,
            1 => Waveform::Triangle,
            2 => Waveform::Square,
            3 => Waveform::Saw,
            _ => Waveform::ReverseSaw,
        }
    }

    #[inline]
    fn evaluate(self, op: &Operator, pm: f32) -> f32 {
        match self {
            Waveform::Sine => op.sine(pm),
            Waveform::Triangle => op.triangle(pm),
            Waveform::Square => op.square(pm),
            Waveform::Saw => op.saw(pm),
            Waveform::ReverseSaw => op.revsaw(pm),
        }
    }
}

/// Settings of one operator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OperatorSettings {
    /// Ratio to the note frequency, or Hz when `fixed`.
    pub frequency: f32,
    /// Offset in Hz added after the ratio.
    pub detune: f32,
    /// Level in the output mix.
    pub output_level: f32,
    /// Waveform selector: 0 sine, 1 triangle, 2 square, 3 saw, 4 reverse saw.
    pub waveform: u8,
    /// Coarse frequency, 64 is ratio 1.
    pub coarse: u8,
    /// Fine frequency, 0 ..= 127 adds up to one times the coarse ratio.
    pub fine: u8,
    /// Ignore the note and run at `frequency` Hz.
    pub fixed: bool,
    /// Modulation received from each operator.
    pub fm_level: [f32; OPERATORS],
    /// Depth of amplitude modulation by the LFO operator.
    pub am_level: f32,
    /// How far the modulation wheel scales this operator's level.
    pub mod_sensitivity: f32,
    /// Level envelope.
    pub envelope: Dx7Parameters,
    /// Level scaling in dB across the keyboard.
    pub keyboard_level: KeyboardScaling,
    /// Envelope rate scaling in octaves across the keyboard.
    pub keyboard_rate: KeyboardScaling,
    /// Level multiplier for velocity.
    pub velocity_level: VelocityScaling,
    /// Envelope rate multiplier for velocity.
    pub velocity_rate: VelocityScaling,
}

impl Default for OperatorSettings {
    fn default() -> Self {
        Self {
            frequency: 1.0,
            detune: 0.0,
            output_level: 0.0,
            waveform: 0,
            coarse: 64,
            fine: 0,
            fixed: false,
            fm_level: [0.0; OPERATORS],
            am_level: 0.0,
            mod_sensitivity: 0.0,
            envelope: Dx7Parameters::default(),
            keyboard_level: KeyboardScaling::default(),
            keyboard_rate: KeyboardScaling::default(),
            velocity_level: VelocityScaling {
                left_exponential: true,
                left_depth: -6.0,
                ..VelocityScaling::default()
            },
            velocity_rate: VelocityScaling::default(),
        }
    }
}

impl OperatorSettings {
    /// Set the coarse frequency and recompute the ratio.
    pub fn set_coarse(&mut self, value: u8) {
        self.coarse = value.min(127);
        self.update_frequency();
    }

    /// Set the fine frequency and recompute the ratio.
    pub fn set_fine(&mut self, value: u8) {
        self.fine = value.min(127);
        self.update_frequency();
    }

    fn update_frequency(&mut self) {
        self.frequency = coarse_ratio(self.coarse) * (1.0 + f32::from(self.fine) / 127.0);
    }

    /// Operator waveform.
    pub fn waveform(&self) -> Waveform {
        Waveform::from_index(self.waveform)
    }
}

/// Pitch settings shared by every operator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PitchSettings {
    /// Ratio applied to every note.
    pub transpose: f32,
    /// Random detune per note, in semitones either way.
    pub randomize: f32,
    /// Vibrato depth from the LFO operator, in semitones.
    pub lfo_depth: f32,
    /// Pitch bend range in semitones.
    pub bend_sensitivity: f32,
    /// Vibrato depth added by the modulation wheel, in semitones.
    pub mod_sensitivity: f32,
    /// Pitch envelope in dB around 0; 6 dB is roughly an octave.
    pub envelope: Dx7Parameters,
}

impl Default for PitchSettings {
    fn default() -> Self {
        Self {
            transpose: 1.0,
            randomize: 0.0,
            lfo_depth: 0.0,
            bend_sensitivity: 2.0,
            mod_sensitivity: 0.0,
            envelope: Dx7Parameters::default(),
        }
    }
}

/// Voice filter settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CutoffSettings {
    /// Cutoff as a ratio to the note frequency, or Hz when `fixed`.
    pub frequency: f32,
    /// Resonance.
    #[serde(rename = "Q")]
    pub q: f32,
    /// Output selector: 0 lowpass, 1 highpass, 2 bandpass, 3 notch.
    #[serde(rename = "type")]
    pub kind: u8,
    /// Ignore the note and use `frequency` Hz.
    pub fixed: bool,
    /// Random cutoff offset per note, in octaves either way.
    pub randomize: f32,
    /// Cutoff modulation depth from the LFO operator.
    pub lfo_depth: f32,
    /// Cutoff modulation depth added by the modulation wheel.
    pub mod_sensitivity: f32,
    /// Cutoff envelope in dB around 0.
    pub envelope: Dx7Parameters,
}

impl Default for CutoffSettings {
    fn default() -> Self {
        Self {
            frequency: 8.0,
            q: FRAC_1_SQRT_2,
            kind: 0,
            fixed: false,
            randomize: 0.0,
            lfo_depth: 0.0,
            mod_sensitivity: 0.0,
            envelope: Dx7Parameters::default(),
        }
    }
}

impl CutoffSettings {
    /// Selected output type; out-of-range selectors wrap.
    pub fn kind(&self) -> SvfType {
        SvfType::from_index(usize::from(self.kind))
    }
}

/// What an `Octalope` patch stores.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OctalopeSettings {
    /// Operators 1 to 8.
    pub operators: [OperatorSettings; OPERATORS],
    /// Pitch settings.
    pub pitch: PitchSettings,
    /// Voice filter.
    pub cutoff: CutoffSettings,
}

impl Default for OctalopeSettings {
    /// A single sine on operator 1.
    fn default() -> Self {
        let mut operators = [OperatorSettings::default(); OPERATORS];
        operators[0].output_level = 1.0;
        Self {
            operators,
            pitch: PitchSettings::default(),
            cutoff: CutoffSettings::default(),
        }
    }
}

#[derive(Debug, Clone)]
struct Parameters {
    settings: OctalopeSettings,
    bend: f32,
    modulation: f32,
    svf: SvfParameters,
}

impl Parameters {
    fn update_svf(&mut self) {
        let cutoff = &self.settings.cutoff;
        self.svf.set(cutoff.kind(), cutoff.frequency, cutoff.q);
    }
}

#[derive(Debug, Clone, Copy)]
struct OperatorState {
    osc: Operator,
    envelope: ExponentialDx7,
    /// Level after keyboard and velocity scaling.
    level: f32,
    /// Envelope rate after keyboard and velocity scaling.
    rate: f32,
    value: f32,
}

#[derive(Debug, Clone)]
struct FmVoice {
    ops: [OperatorState; OPERATORS],
    pitch_envelope: BimodalDx7,
    cutoff_envelope: ExponentialDx7,
    svf: StateVariable,
    /// Note frequency including transpose and random detune.
    frequency: f32,
    cutoff: f32,
    sample_rate: f32,
}

impl FmVoice {
    fn new(sample_rate: f32) -> Self {
        let op = OperatorState {
            osc: Operator::new(),
            envelope: ExponentialDx7::new(sample_rate),
            level: 1.0,
            rate: 1.0,
            value: 0.0,
        };
        Self {
            ops: [op; OPERATORS],
            pitch_envelope: BimodalDx7::new(sample_rate),
            cutoff_envelope: ExponentialDx7::new(sample_rate),
            svf: StateVariable::new(),
            frequency: 0.0,
            cutoff: 0.0,
            sample_rate,
        }
    }

    fn init(&mut self, key: u8, velocity: u8, trigger: Trigger, params: &Parameters, rng: &mut SmallRng) {
        let settings = &params.settings;
        let key_frequency = key_to_frequency(key);
        let velocity = f32::from(velocity.min(127)) / 127.0;

        let detune = settings.pitch.randomize * rng.gen_range(-1.0..1.0);
        self.frequency = key_frequency * settings.pitch.transpose * exp2f(detune / 12.0);

        let spread = settings.cutoff.randomize * rng.gen_range(-1.0..1.0);
        let base = if settings.cutoff.fixed {
            settings.cutoff.frequency
        } else {
            key_frequency * settings.cutoff.frequency
        };
        self.cutoff = base * exp2f(spread);

        for (op, op_settings) in self.ops.iter_mut().zip(&settings.operators) {
            op.level = db_to_amplitude(op_settings.keyboard_level.evaluate(key_frequency))
                * op_settings.velocity_level.evaluate(velocity);
            op.rate = exp2f(op_settings.keyboard_rate.evaluate(key_frequency))
                * op_settings.velocity_rate.evaluate(velocity);

            match trigger {
                Trigger::New => {
                    op.osc.init();
                    op.value = 0.0;
                    op.envelope.init(&op_settings.envelope);
                }
                Trigger::Retrigger => op.envelope.reinit(&op_settings.envelope),
            }
        }

        match trigger {
            Trigger::New => {
                self.svf.clear();
                self.cutoff_envelope.init(&settings.cutoff.envelope);
            }
            Trigger::Retrigger => self.cutoff_envelope.reinit(&settings.cutoff.envelope),
        }
        self.pitch_envelope.init(&settings.pitch.envelope);
    }

    /// Evaluate all operators for one sample, advance their phases, and
    /// return the operator mix.
    #[inline]
    fn operators(&mut self, params: &Parameters, bend: f32) -> f32 {
        let settings = &params.settings;
        let delta = self.frequency / self.sample_rate;
        let mut accum = 0.0;

        for i in (0..OPERATORS).rev() {
            let op_settings = &settings.operators[i];

            let mut pm = 0.0;
            for (level, source) in op_settings.fm_level.iter().zip(&self.ops) {
                pm += level * source.value;
            }

            let op = &mut self.ops[i];
            let waveform = op_settings.waveform().evaluate(&op.osc, pm);
            let wheel = 1.0 - op_settings.mod_sensitivity * (1.0 - params.modulation);
            let mut value = op.envelope.update(&op_settings.envelope, op.rate) * waveform * op.level * wheel;

            if i != LFO && op_settings.am_level != 0.0 {
                let lfo = self.ops[LFO].value;
                value *= 1.0 - op_settings.am_level * (1.0 - (lfo * 0.5 + 0.5));
            }

            let op = &mut self.ops[i];
            op.value = value;
            accum += value * op_settings.output_level;

            let step = if op_settings.fixed {
                op_settings.frequency / self.sample_rate
            } else {
                delta * op_settings.frequency
            };
            op.osc.update(step * bend + op_settings.detune / self.sample_rate);
        }

        accum
    }

    fn render(&mut self, chunk: &mut Chunk, params: &mut Parameters) {
        let pitch = params.settings.pitch;
        let cutoff = params.settings.cutoff;

        for sample in chunk.iter_mut() {
            let lfo = self.ops[LFO].value;

            let vibrato = exp2f((pitch.lfo_depth + pitch.mod_sensitivity * params.modulation) * lfo / 12.0);
            let bend = params.bend * self.pitch_envelope.update(&pitch.envelope) * vibrato;
            let mix = self.operators(params, bend);

            let wobble = 1.0 + (cutoff.lfo_depth + cutoff.mod_sensitivity * params.modulation) * lfo;
            let envelope = self.cutoff_envelope.update(&cutoff.envelope, 1.0);
            params.svf.set_freq(self.cutoff * envelope * wobble);
            *sample += self.svf.filter(&params.svf, mix);
        }
    }

    fn zero_crossing(&self, offset: f32, params: &Parameters) -> f32 {
        let op = &params.settings.operators[0];
        let delta = if op.fixed {
            op.frequency / self.sample_rate
        } else {
            self.frequency / self.sample_rate * op.frequency
        };
        self.ops[0]
            .osc
            .zero_crossing(offset, delta * params.bend * self.pitch_envelope.amplitude())
    }

    fn base_frequency(&self, params: &Parameters) -> f32 {
        self.frequency * params.bend * self.pitch_envelope.amplitude()
    }
}

impl Voice for FmVoice {
    type Params = Parameters;

    fn release(&mut self, params: &Parameters) {
        let settings = &params.settings;
        for (op, op_settings) in self.ops.iter_mut().zip(&settings.operators) {
            op.envelope.release(&op_settings.envelope);
        }
        self.pitch_envelope.release();
        self.cutoff_envelope.release(&settings.cutoff.envelope);
    }

    fn is_active(&self) -> bool {
        self.ops[0].envelope.is_active()
    }
}

/// Eight-operator FM engine.
///
/// Buttons select an operator (columns 0-7) or the global page (any master
/// button). Pressing the selected button again toggles whether it is held.
///
/// | Selection       | Faders                          | Pots                                   |
/// |-----------------|---------------------------------|----------------------------------------|
/// | operator        | output level of operator `col`  | modulation from operator `col`         |
/// | operator, held  | operator envelope               | ratio, detune, fine, AM, wheel, waveform, fixed |
/// | global          | cutoff envelope                 | cutoff, Q, cutoff LFO, type, vibrato, transpose, randomize pitch, randomize cutoff |
/// | global, held    | pitch envelope                  | as global                              |
///
/// Envelope faders 0-3 set the four levels and 4-7 the four durations.
#[derive(Debug, Clone)]
pub struct Octalope {
    voices: VoiceManager<FmVoice, POLYPHONY>,
    params: Parameters,
    sample_rate: f32,
    rng: SmallRng,
    selected: usize,
    held: bool,
}

impl Octalope {
    /// Engine name.
    pub const NAME: &'static str = "Octalope";

    /// Create the engine with default settings and an entropy-seeded
    /// generator for the per-note randomization.
    pub fn new(sample_rate: f32) -> Self {
        Self::with_rng(sample_rate, SmallRng::from_entropy())
    }

    /// Create the engine with a fixed randomization seed.
    pub fn with_seed(sample_rate: f32, seed: u64) -> Self {
        Self::with_rng(sample_rate, SmallRng::seed_from_u64(seed))
    }

    fn with_rng(sample_rate: f32, rng: SmallRng) -> Self {
        let mut params = Parameters {
            settings: OctalopeSettings::default(),
            bend: 1.0,
            modulation: 0.0,
            svf: SvfParameters::new(sample_rate),
        };
        params.update_svf();

        Self {
            voices: VoiceManager::new(|| FmVoice::new(sample_rate)),
            params,
            sample_rate,
            rng,
            selected: 0,
            held: false,
        }
    }

    /// Current settings.
    pub fn settings(&self) -> OctalopeSettings {
        self.params.settings
    }

    /// Replace the settings.
    pub fn apply(&mut self, settings: OctalopeSettings) {
        self.params.settings = settings;
        self.params.update_svf();
    }

    /// Selected operator, or `None` for the global page, and whether the
    /// selection is held.
    pub fn selection(&self) -> (Option<usize>, bool) {
        let op = (self.selected < OPERATORS).then_some(self.selected);
        (op, self.held)
    }

    fn envelope_fader(envelope: &mut Dx7Parameters, col: usize, value: u8, from: f32, to: f32) {
        match col {
            0..=3 => envelope.level[col] = cc_linear(value, from, to),
            4..=7 => envelope.duration[col - 4] = envelope_time(value),
            _ => {}
        }
    }

    fn operator_pot(&mut self, col: usize, value: u8) {
        let op = &mut self.params.settings.operators[self.selected];
        match col {
            0 => op.set_coarse(value),
            1 => op.detune = cc_linear(value, -10.0, 10.0),
            2 => op.set_fine(value),
            3 => op.am_level = cc_linear(value, 0.0, 1.0),
            4 => op.mod_sensitivity = cc_linear(value, 0.0, 1.0),
            5 => op.waveform = cc_select(value, 5) as u8,
            6 => op.fixed = value >= 64,
            _ => {}
        }
    }

    fn global_pot(&mut self, col: usize, value: u8) {
        let settings = &mut self.params.settings;
        match col {
            0 => {
                settings.cutoff.frequency = if settings.cutoff.fixed {
                    cc_exponential_clamped(value, 0.0, 1.0, self.sample_rate / 6.0, self.sample_rate / 6.0)
                } else {
                    cc_exponential(value, 0.5, 32.0)
                };
            }
            1 => settings.cutoff.q = cc_exponential_clamped(value, 1.0, 1.0, 100.0, 100.0),
            2 => settings.cutoff.lfo_depth = cc_linear(value, 0.0, 1.0),
            3 => settings.cutoff.kind = cc_select(value, 4) as u8,
            4 => settings.pitch.lfo_depth = cc_linear(value, 0.0, 12.0),
            5 => settings.pitch.transpose = exp2f(libm::roundf(cc_linear(value, -24.0, 24.0)) / 12.0),
            6 => settings.pitch.randomize = cc_linear(value, 0.0, 1.0),
            7 => settings.cutoff.randomize = cc_linear(value, 0.0, 1.0),
            _ => return,
        }
        self.params.update_svf();
    }
}

impl Program for Octalope {
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
            voice.init(key, velocity, trigger, &self.params, &mut self.rng);
        }
    }

    fn note_off(&mut self, key: u8, _velocity: u8) {
        self.voices.release(key, &self.params);
    }

    fn pitch_bend(&mut self, value: i16) {
        self.params.bend = pitch_bend_ratio(value, self.params.settings.pitch.bend_sensitivity);
    }

    fn modulation(&mut self, value: u8) {
        self.params.modulation = cc_linear(value, 0.0, 1.0);
    }

    fn sustain(&mut self, on: bool) {
        self.voices.set_sustain(on, &self.params);
    }

    fn set_fader(&mut self, control: Control, value: u8) {
        let Some(col) = control.column().filter(|&col| col < OPERATORS) else {
            return;
        };
        let settings = &mut self.params.settings;

        match (self.selected, self.held) {
            (GLOBAL, true) => Self::envelope_fader(&mut settings.pitch.envelope, col, value, -24.0, 24.0),
            (GLOBAL, false) => Self::envelope_fader(&mut settings.cutoff.envelope, col, value, -24.0, 24.0),
            (op, true) => Self::envelope_fader(&mut settings.operators[op].envelope, col, value, -48.0, 0.0),
            (_, false) => settings.operators[col].output_level = fader_level(value),
        }
    }

    fn set_pot(&mut self, control: Control, value: u8) {
        let Some(col) = control.column().filter(|&col| col < OPERATORS) else {
            return;
        };

        match (self.selected, self.held) {
            (GLOBAL, _) => self.global_pot(col, value),
            (_, true) => self.operator_pot(col, value),
            (op, false) => self.params.settings.operators[op].fm_level[col] = fader_level(value),
        }
    }

    fn set_button(&mut self, control: Control, value: u8) {
        if value < 64 {
            return;
        }
        let Some(col) = control.column().filter(|&col| col < OPERATORS) else {
            return;
        };

        let selection = if control.master { GLOBAL } else { col };
        self.held = if selection == self.selected { !self.held } else { true };
        self.selected = selection;
    }

    fn release_all(&mut self) {
        self.voices.release_all(&self.params);
    }

    fn zero_crossing(&self, offset: f32) -> f32 {
        self.voices
            .lowest()
            .map_or(offset, |voice| voice.zero_crossing(offset, &self.params))
    }

    fn base_frequency(&self) -> f32 {
        self.voices
            .lowest()
            .map_or(0.0, |voice| voice.base_frequency(&self.params))
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
