//! MIDI input: decoding, routing and the MIDI thread.
//!
//! midir delivers raw bytes on its own callback thread. They are forwarded
//! over a bounded channel to one MIDI thread, which owns the [`Dispatcher`]
//! and is the only place programs are loaded, swapped and freed.

use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender, bounded, select};
use midir::{Ignore, MidiInput, MidiInputConnection};
use pling_synth::{ProgramEvent, ProgramManager, ProgramSlot, SharedProgram, State};

use crate::controller::Controller;
use crate::{Error, Result};

/// Raw messages buffered between midir and the MIDI thread.
const MESSAGE_CAPACITY: usize = 1024;

/// How often the MIDI thread frees retired programs while idle.
const GARBAGE_INTERVAL: Duration = Duration::from_millis(100);

/// Client name shown to other MIDI software.
const CLIENT_NAME: &str = "pling";

/// A decoded channel voice message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MidiMessage {
    /// Key released, including note-on with velocity 0.
    NoteOff {
        /// Key number.
        key: u8,
        /// Release velocity.
        velocity: u8,
    },
    /// Key pressed.
    NoteOn {
        /// Key number.
        key: u8,
        /// Velocity, never 0.
        velocity: u8,
    },
    /// Polyphonic aftertouch.
    PolyPressure {
        /// Key number.
        key: u8,
        /// Pressure.
        pressure: u8,
    },
    /// Control change.
    ControlChange {
        /// Controller number.
        controller: u8,
        /// Value.
        value: u8,
    },
    /// Program change.
    ProgramChange(u8),
    /// Channel aftertouch.
    ChannelPressure(u8),
    /// Pitch bend centred at 0 (-8192..=8191).
    PitchBend(i16),
}

/// Decode a channel voice message into its zero-based channel and content.
///
/// System messages and truncated messages give `None`.
pub fn decode(bytes: &[u8]) -> Option<(u8, MidiMessage)> {
    let (&status, data) = bytes.split_first()?;
    let channel = status & 0x0f;
    let byte = |i: usize| data.get(i).map(|b| b & 0x7f);

    let message = match status & 0xf0 {
        0x80 => MidiMessage::NoteOff {
            key: byte(0)?,
            velocity: byte(1)?,
        },
        0x90 => match (byte(0)?, byte(1)?) {
            (key, 0) => MidiMessage::NoteOff { key, velocity: 0 },
            (key, velocity) => MidiMessage::NoteOn { key, velocity },
        },
        0xa0 => MidiMessage::PolyPressure {
            key: byte(0)?,
            pressure: byte(1)?,
        },
        0xb0 => MidiMessage::ControlChange {
            controller: byte(0)?,
            value: byte(1)?,
        },
        0xc0 => MidiMessage::ProgramChange(byte(0)?),
        0xd0 => MidiMessage::ChannelPressure(byte(0)?),
        0xe0 => {
            let value = (i16::from(byte(1)?) << 7) | i16::from(byte(0)?);
            MidiMessage::PitchBend(value - 8192)
        }
        _ => return None,
    };
    Some((channel, message))
}

#[derive(Debug)]
struct Channel {
    slot: ProgramSlot,
    bank_lsb: u8,
    bank_msb: u8,
}

/// Routes MIDI messages to programs and mapped controls.
///
/// Each of the 16 channels has its own program slot and bank select state.
pub struct Dispatcher {
    programs: Arc<ProgramManager>,
    state: Arc<State>,
    controller: Controller,
    channels: [Channel; 16],
}

impl Dispatcher {
    /// Create a dispatcher; every channel starts on program 0 of bank 0.
    pub fn new(programs: Arc<ProgramManager>, state: Arc<State>, controller: Controller) -> Self {
        let channels = std::array::from_fn(|_| Channel {
            slot: programs.open_slot(),
            bank_lsb: 0,
            bank_msb: 0,
        });
        Self {
            programs,
            state,
            controller,
            channels,
        }
    }

    /// The program currently on a zero-based channel.
    pub fn program(&self, channel: u8) -> Arc<SharedProgram> {
        self.channels[usize::from(channel & 0x0f)].slot.load_full()
    }

    /// Handle one raw message.
    pub fn handle(&mut self, bytes: &[u8]) {
        let Some(&status) = bytes.first() else {
            return;
        };

        if let Some(&data) = bytes.get(1)
            && let Some(control) = self.controller.lookup(status, data)
        {
            let value = match status & 0xf0 {
                0x80 => 0,
                _ => bytes.get(2).copied().unwrap_or(0),
            };
            tracing::debug!(?control, value, "mapped control");
            self.state.process_control(&self.programs, control, value);
            return;
        }

        match decode(bytes) {
            Some((_, message)) => {
                let channel = self.controller.channel(status);
                tracing::debug!(channel, ?message, "midi message");
                self.route(channel, message);
            }
            None => tracing::trace!(?bytes, "ignoring midi message"),
        }
    }

    fn route(&mut self, channel: u8, message: MidiMessage) {
        let index = usize::from(channel & 0x0f);
        let program = self.channels[index].slot.load_full();

        let event = match message {
            MidiMessage::NoteOn { key, velocity } => {
                self.state.note_on(key, velocity);
                self.programs.dispatch(&program, ProgramEvent::NoteOn { key, velocity });
                self.programs.activate(&program);
                return;
            }
            MidiMessage::NoteOff { key, velocity } => {
                self.state.note_off(key);
                ProgramEvent::NoteOff { key, velocity }
            }
            MidiMessage::PolyPressure { key, pressure } => ProgramEvent::PolyPressure { key, pressure },
            MidiMessage::ControlChange { controller, value } => match controller {
                0 => {
                    self.channels[index].bank_msb = value;
                    return;
                }
                32 => {
                    self.channels[index].bank_lsb = value;
                    return;
                }
                1 => ProgramEvent::Modulation(value),
                64 => ProgramEvent::Sustain(value >= 64),
                _ => ProgramEvent::ControlChange { controller, value },
            },
            MidiMessage::ProgramChange(number) => {
                let Channel {
                    slot,
                    bank_lsb,
                    bank_msb,
                } = &self.channels[index];
                self.programs.change(slot, number, *bank_lsb, *bank_msb);
                self.state.set_active_channel(channel);
                return;
            }
            MidiMessage::ChannelPressure(pressure) => ProgramEvent::ChannelPressure(pressure),
            MidiMessage::PitchBend(value) => {
                self.state.set_bend(value);
                ProgramEvent::PitchBend(value)
            }
        };

        self.programs.dispatch(&program, event);
    }

    /// Free programs the render thread has finished with.
    pub fn collect_garbage(&self) -> usize {
        let freed = self.programs.collect_garbage();
        if freed > 0 {
            tracing::debug!(freed, "retired programs freed");
        }
        freed
    }
}

/// Names of the available MIDI input ports.
pub fn list_ports() -> Result<Vec<String>> {
    let input = MidiInput::new(CLIENT_NAME).map_err(|e| Error::MidiInit(e.to_string()))?;
    Ok(input
        .ports()
        .iter()
        .filter_map(|port| input.port_name(port).ok())
        .collect())
}

/// Connect every input port whose name contains `filter` (case-insensitive).
fn connect_ports(filter: Option<&str>, messages: &Sender<Vec<u8>>) -> Result<Vec<(String, MidiInputConnection<()>)>> {
    let filter = filter.map(str::to_lowercase);
    let mut connections = Vec::new();

    for name in list_ports()? {
        if let Some(filter) = &filter
            && !name.to_lowercase().contains(filter)
        {
            continue;
        }

        // A connection consumes its MidiInput, so every port gets its own.
        let mut input = MidiInput::new(CLIENT_NAME).map_err(|e| Error::MidiInit(e.to_string()))?;
        input.ignore(Ignore::TimeAndActiveSense);
        let Some(port) = input
            .ports()
            .into_iter()
            .find(|port| input.port_name(port).is_ok_and(|n| n == name))
        else {
            continue;
        };

        let tx = messages.clone();
        let callback = move |_stamp: u64, bytes: &[u8], _: &mut ()| {
            if tx.try_send(bytes.to_vec()).is_err() {
                tracing::warn!("midi queue full, dropping message");
            }
        };

        match input.connect(&port, "pling-in", callback, ()) {
            Ok(connection) => {
                tracing::info!(port = %name, "midi port connected");
                connections.push((name, connection));
            }
            Err(e) => {
                let error = Error::MidiConnect {
                    port: name,
                    reason: e.to_string(),
                };
                tracing::warn!(%error, "skipping midi port");
            }
        }
    }

    if connections.is_empty() {
        tracing::warn!(filter = ?filter, "no midi input ports connected");
    }
    Ok(connections)
}

fn run(mut dispatcher: Dispatcher, messages: &Receiver<Vec<u8>>, shutdown: &Receiver<()>) {
    loop {
        select! {
            recv(messages) -> bytes => match bytes {
                Ok(bytes) => dispatcher.handle(&bytes),
                Err(_) => break,
            },
            recv(shutdown) -> _ => {
                for bytes in messages.try_iter() {
                    dispatcher.handle(&bytes);
                }
                break;
            },
            default(GARBAGE_INTERVAL) => {},
        }
        dispatcher.collect_garbage();
    }
    dispatcher.collect_garbage();
    tracing::debug!("midi thread stopped");
}

/// The MIDI thread and the port connections feeding it.
///
/// Dropping it stops the thread after handling every message already
/// received.
pub struct MidiThread {
    ports: Vec<String>,
    connections: Vec<MidiInputConnection<()>>,
    shutdown: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl MidiThread {
    /// Connect the matching input ports and start the MIDI thread.
    pub fn start(port_filter: Option<&str>, dispatcher: Dispatcher) -> Result<Self> {
        let (tx, rx) = bounded(MESSAGE_CAPACITY);
        let connected = connect_ports(port_filter, &tx)?;
        let mut thread = Self::spawn(dispatcher, rx)?;
        for (name, connection) in connected {
            thread.ports.push(name);
            thread.connections.push(connection);
        }
        Ok(thread)
    }

    /// Start the MIDI thread on an existing message source.
    ///
    /// The thread also stops when every sender of `messages` is dropped.
    pub fn spawn(dispatcher: Dispatcher, messages: Receiver<Vec<u8>>) -> Result<Self> {
        let (shutdown_tx, shutdown_rx) = bounded(1);
        let handle = std::thread::Builder::new()
            .name("midi".to_string())
            .spawn(move || run(dispatcher, &messages, &shutdown_rx))
            .map_err(Error::ThreadSpawn)?;

        Ok(Self {
            ports: Vec::new(),
            connections: Vec::new(),
            shutdown: Some(shutdown_tx),
            handle: Some(handle),
        })
    }

    /// Names of the connected ports.
    pub fn ports(&self) -> &[String] {
        &self.ports
    }

    /// Stop the thread and wait for it.
    pub fn shutdown(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            // The thread may already have stopped on its own.
            let _ = shutdown.send(());
        }
        if let Some(handle) = self.handle.take()
            && handle.join().is_err()
        {
            tracing::error!("midi thread panicked");
        }
        self.connections.clear();
    }
}

impl Drop for MidiThread {
    fn drop(&mut self) {
        self.shutdown();
    }
}
