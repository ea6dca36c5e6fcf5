//! Audio and MIDI I/O for pling.
//!
//! This crate provides:
//!
//! - **Audio output**: [`AudioOutput`] drives a cpal output stream from a
//!   [`Renderer`], which renders the program manager chunk by chunk into
//!   whatever buffer size the device asks for
//! - **MIDI input**: [`MidiThread`] connects midir input ports and routes
//!   every message on its own thread through a [`Dispatcher`]
//! - **Controller mappings**: [`Controller`] turns raw messages into
//!   [`Control`](pling_synth::Control)s
//! - **WAV output**: [`write_wav`] for offline rendering
//!
//! ## Threads
//!
//! ```text
//! midir callback ──bytes──▶ MIDI thread ──ProgramEvent──▶ program inbox
//!                                                              │
//! cpal callback ◀── Renderer ◀── ProgramManager::render ◀──────┘
//! ```
//!
//! The cpal callback never blocks and never allocates; the MIDI thread does
//! all loading and freeing of programs.

mod audio;
mod controller;
mod midi;
mod wav;

pub use audio::{
    AudioDevice, AudioOutput, OUTPUT_GAIN, OutputConfig, Renderer, SCOPE_OFFSET, default_device, list_devices,
};
pub use controller::Controller;
pub use midi::{Dispatcher, MidiMessage, MidiThread, decode, list_ports};
pub use wav::{WavSpec, read_wav, write_wav};

/// Error types for audio and MIDI I/O.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// WAV file read/write error.
    #[error("WAV file error: {0}")]
    Wav(#[from] hound::Error),

    /// No audio output device available on the system.
    #[error("No audio device available")]
    NoDevice,

    /// The requested audio device was not found.
    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    /// The device could not report or accept a stream configuration.
    #[error("Stream configuration error: {0}")]
    StreamConfig(String),

    /// The output stream could not be built.
    #[error("Failed to build audio stream: {0}")]
    BuildStream(String),

    /// The output stream could not be started.
    #[error("Failed to start audio stream: {0}")]
    PlayStream(String),

    /// The MIDI subsystem could not be initialized.
    #[error("MIDI init error: {0}")]
    MidiInit(String),

    /// A MIDI port could not be opened.
    #[error("Failed to connect to MIDI port {port}: {reason}")]
    MidiConnect {
        /// Port name.
        port: String,
        /// Why the connection failed.
        reason: String,
    },

    /// A worker thread could not be started.
    #[error("Failed to spawn thread: {0}")]
    ThreadSpawn(#[source] std::io::Error),

    /// Standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result type for audio and MIDI I/O.
pub type Result<T> = std::result::Result<T, Error>;
