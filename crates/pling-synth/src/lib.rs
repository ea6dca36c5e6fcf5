//! Pling Synth - Sound engines and the real-time render path
//!
//! This crate turns MIDI-level events into audio. It sits between
//! `pling-io`, which owns the audio and MIDI devices, and `pling-core`,
//! which provides the DSP building blocks.
//!
//! # Core Components
//!
//! ## Programs
//!
//! A [`Program`] is one sound engine instance with its own parameters and
//! voices. Three engines are built in, plus a silent fallback:
//!
//! - [`Simple`] - saw oscillator through an enveloped state variable filter
//! - [`KarplusStrong`] - plucked string
//! - [`Octalope`] - eight-operator phase modulation
//!
//! The [`EngineRegistry`] creates programs by the engine name stored in
//! patches.
//!
//! ```rust
//! use pling_core::Chunk;
//! use pling_synth::{EngineRegistry, Program};
//!
//! let registry = EngineRegistry::new();
//! let mut program = registry.create("Simple", 48000.0).unwrap();
//!
//! program.note_on(69, 100);
//! let mut chunk = Chunk::new();
//! assert!(program.render(&mut chunk));
//! ```
//!
//! ## Voice Management
//!
//! - [`VoiceManager`] - fixed-capacity allocation with stealing and sustain
//! - [`Voice`] - what an engine voice exposes to the allocator
//!
//! ## Program Management
//!
//! [`ProgramManager`] loads patches from a [`pling_config::PatchStore`],
//! swaps them into per-channel [`ProgramSlot`]s and renders every sounding
//! program into one chunk. The MIDI thread talks to programs only through
//! [`ProgramEvent`]s, so engines are never touched off the render thread.
//!
//! ## Performance State
//!
//! - [`State`] - master volume, transport and mapped control dispatch
//! - [`Clock`] - beat clock driven by transport buttons
//! - [`Control`] / [`Command`] / [`Message`] - controller mapping vocabulary
//! - [`RingBuffer`] - lock-free scope capture of the output

pub mod clock;
pub mod control;
pub mod engines;
pub mod error;
pub mod manager;
pub mod program;
pub mod registry;
pub mod ring_buffer;
pub mod state;
pub mod voice_manager;

pub use clock::{Clock, Metre, Position};
pub use control::{Command, Control, ControlParseError, Message};
pub use engines::{KarplusStrong, KarplusStrongSettings, Octalope, OctalopeSettings, POLYPHONY, Simple, SimpleSettings};
pub use error::LoadError;
pub use manager::{ProgramEvent, ProgramManager, ProgramSlot, SharedProgram};
pub use program::{Program, Silent};
pub use registry::{EngineDescriptor, EngineRegistry};
pub use ring_buffer::{RingBuffer, SCOPE_SIZE};
pub use state::State;
pub use voice_manager::{Trigger, Voice, VoiceManager};
