//! The sound engine interface.
//!
//! A [`Program`] owns one engine's parameters and voices. Every method is
//! called from the render thread: the MIDI thread never touches a program
//! directly but sends [`ProgramEvent`](crate::ProgramEvent)s that the
//! render thread applies before rendering the next chunk.
//!
//! Only [`Program::render`], [`Program::note_on`] and [`Program::note_off`]
//! are required; the rest of the event surface defaults to doing nothing.

use pling_core::Chunk;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::control::Control;
use crate::error::LoadError;

/// A polyphonic sound engine.
pub trait Program: Send {
    /// Name the engine is registered under.
    fn engine_name(&self) -> &'static str;

    /// Add every sounding voice into `chunk`.
    ///
    /// Returns `false` once no voice produces sound.
    fn render(&mut self, chunk: &mut Chunk) -> bool;

    /// Start a note.
    fn note_on(&mut self, key: u8, velocity: u8);

    /// Release a note.
    fn note_off(&mut self, key: u8, velocity: u8);

    /// Pitch bend, centred at 0 (-8192..=8191).
    fn pitch_bend(&mut self, _value: i16) {}

    /// Channel aftertouch.
    fn channel_pressure(&mut self, _pressure: u8) {}

    /// Polyphonic aftertouch.
    fn poly_pressure(&mut self, _key: u8, _pressure: u8) {}

    /// Modulation wheel.
    fn modulation(&mut self, _value: u8) {}

    /// Sustain pedal.
    fn sustain(&mut self, _on: bool) {}

    /// Any controller the MIDI layer does not handle itself.
    fn control_change(&mut self, _controller: u8, _value: u8) {}

    /// A mapped fader moved.
    fn set_fader(&mut self, _control: Control, _value: u8) {}

    /// A mapped pot moved.
    fn set_pot(&mut self, _control: Control, _value: u8) {}

    /// A mapped button was pressed or released.
    fn set_button(&mut self, _control: Control, _value: u8) {}

    /// Release every voice, ignoring the sustain pedal.
    fn release_all(&mut self) {}

    /// Sample offset of the lowest voice's most recent rising zero crossing
    /// before `offset`, for phase-locking a scope.
    fn zero_crossing(&self, offset: f32) -> f32 {
        offset
    }

    /// Frequency of the lowest sounding voice, or 0.
    fn base_frequency(&self) -> f32 {
        0.0
    }

    /// Replace the parameters with those of a patch.
    fn load(&mut self, _parameters: &toml::Table) -> Result<(), LoadError> {
        Ok(())
    }

    /// Current parameters as a patch table.
    fn save(&self) -> toml::Table {
        toml::Table::new()
    }
}

/// Deserialize engine parameters from a patch table.
pub fn decode<T: DeserializeOwned>(engine: &'static str, parameters: &toml::Table) -> Result<T, LoadError> {
    toml::Value::Table(parameters.clone())
        .try_into()
        .map_err(|e| LoadError::invalid(engine, e))
}

/// Serialize engine parameters into a patch table.
///
/// Parameters are plain numbers and tables, so serialization only fails on
/// values TOML cannot represent; those yield an empty table.
pub fn encode<T: Serialize>(parameters: &T) -> toml::Table {
    match toml::Value::try_from(parameters) {
        Ok(toml::Value::Table(table)) => table,
        _ => toml::Table::new(),
    }
}

/// The silent program used when no patch could be loaded.
#[derive(Debug, Default, Clone, Copy)]
pub struct Silent;

impl Silent {
    /// Engine name of the silent program.
    pub const NAME: &'static str = "None";
}

impl Program for Silent {
    fn engine_name(&self) -> &'static str {
        Self::NAME
    }

    fn render(&mut self, _chunk: &mut Chunk) -> bool {
        false
    }

    fn note_on(&mut self, _key: u8, _velocity: u8) {}

    fn note_off(&mut self, _key: u8, _velocity: u8) {}
}
