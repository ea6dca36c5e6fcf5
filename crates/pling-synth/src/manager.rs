//! Program manager: loading, hot swapping and the render entry point.
//!
//! # Threading
//!
//! - The MIDI thread loads programs, swaps channel slots and sends
//!   [`ProgramEvent`]s. It never touches an engine.
//! - The render thread drains each program's events right before rendering
//!   it, so every engine mutation happens on the render thread in arrival
//!   order.
//! - The render set is locked briefly by both threads for push and
//!   removal; rendering itself runs on a snapshot without the set lock.
//! - Programs leaving the render set with no other owner are handed back
//!   through a bounded channel and freed by [`ProgramManager::collect_garbage`].

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use arc_swap::{ArcSwap, ArcSwapOption};
use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};
use parking_lot::Mutex;
use pling_config::{ConfigError, Patch, PatchStore, bank_number};
use pling_core::Chunk;

use crate::control::Control;
use crate::error::LoadError;
use crate::program::{Program, Silent};
use crate::registry::EngineRegistry;

/// Events queued per program before new ones are dropped.
pub const EVENT_CAPACITY: usize = 1024;

/// Programs that can sound at the same time without growing the render set.
const RENDER_CAPACITY: usize = 64;

/// Name of the fallback program for patches naming an unknown engine.
pub const INVALID_PROGRAM: &str = "Invalid program";

/// Name of the fallback program for patches that could not be loaded.
pub const NO_PROGRAM: &str = "None";

/// Everything the MIDI thread can tell a program.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProgramEvent {
    /// Note on with non-zero velocity.
    NoteOn {
        /// Key.
        key: u8,
        /// Velocity.
        velocity: u8,
    },
    /// Note off.
    NoteOff {
        /// Key.
        key: u8,
        /// Release velocity.
        velocity: u8,
    },
    /// Pitch bend centred at 0.
    PitchBend(i16),
    /// Channel aftertouch.
    ChannelPressure(u8),
    /// Polyphonic aftertouch.
    PolyPressure {
        /// Key.
        key: u8,
        /// Pressure.
        pressure: u8,
    },
    /// Modulation wheel.
    Modulation(u8),
    /// Sustain pedal.
    Sustain(bool),
    /// Unhandled controller.
    ControlChange {
        /// Controller number.
        controller: u8,
        /// Value.
        value: u8,
    },
    /// Release every voice.
    ReleaseAll,
    /// Mapped fader.
    Fader(Control, u8),
    /// Mapped pot.
    Pot(Control, u8),
    /// Mapped button.
    Button(Control, u8),
}

impl ProgramEvent {
    /// Apply to an engine.
    pub fn apply(self, program: &mut dyn Program) {
        match self {
            ProgramEvent::NoteOn { key, velocity } => program.note_on(key, velocity),
            ProgramEvent::NoteOff { key, velocity } => program.note_off(key, velocity),
            ProgramEvent::PitchBend(value) => program.pitch_bend(value),
            ProgramEvent::ChannelPressure(pressure) => program.channel_pressure(pressure),
            ProgramEvent::PolyPressure { key, pressure } => program.poly_pressure(key, pressure),
            ProgramEvent::Modulation(value) => program.modulation(value),
            ProgramEvent::Sustain(on) => program.sustain(on),
            ProgramEvent::ControlChange { controller, value } => program.control_change(controller, value),
            ProgramEvent::ReleaseAll => program.release_all(),
            ProgramEvent::Fader(control, value) => program.set_fader(control, value),
            ProgramEvent::Pot(control, value) => program.set_pot(control, value),
            ProgramEvent::Button(control, value) => program.set_button(control, value),
        }
    }
}

/// A loaded program with its identity and event inbox.
pub struct SharedProgram {
    name: String,
    engine_name: &'static str,
    midi_program: u8,
    bank_lsb: u8,
    bank_msb: u8,
    active: AtomicBool,
    sounding: AtomicBool,
    events_tx: Sender<ProgramEvent>,
    events_rx: Receiver<ProgramEvent>,
    engine: Mutex<Box<dyn Program>>,
}

impl std::fmt::Debug for SharedProgram {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedProgram")
            .field("name", &self.name)
            .field("engine", &self.engine_name)
            .field("midi_program", &self.midi_program)
            .field("bank_lsb", &self.bank_lsb)
            .field("bank_msb", &self.bank_msb)
            .field("active", &self.is_active())
            .finish_non_exhaustive()
    }
}

impl SharedProgram {
    /// Wrap an engine.
    pub fn new(name: impl Into<String>, engine: Box<dyn Program>, midi_program: u8, bank_lsb: u8, bank_msb: u8) -> Self {
        let (events_tx, events_rx) = bounded(EVENT_CAPACITY);
        Self {
            name: name.into(),
            engine_name: engine.engine_name(),
            midi_program,
            bank_lsb,
            bank_msb,
            active: AtomicBool::new(false),
            sounding: AtomicBool::new(false),
            events_tx,
            events_rx,
            engine: Mutex::new(engine),
        }
    }

    /// Patch name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Engine name.
    pub fn engine_name(&self) -> &'static str {
        self.engine_name
    }

    /// MIDI program number.
    pub fn midi_program(&self) -> u8 {
        self.midi_program
    }

    /// Bank select (LSB, MSB).
    pub fn bank(&self) -> (u8, u8) {
        (self.bank_lsb, self.bank_msb)
    }

    /// Whether this is the given program in the given bank.
    pub fn is(&self, midi_program: u8, bank_lsb: u8, bank_msb: u8) -> bool {
        self.midi_program == midi_program && self.bank_lsb == bank_lsb && self.bank_msb == bank_msb
    }

    /// Whether the program is in the render set.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Whether events are waiting for the next render.
    pub fn has_pending_events(&self) -> bool {
        !self.events_rx.is_empty()
    }

    /// Queue an event for the render thread. Never blocks; when the inbox is
    /// full the event is dropped.
    pub fn send(&self, event: ProgramEvent) -> bool {
        match self.events_tx.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(event)) => {
                tracing::warn!(program = %self.name, ?event, "event queue full, dropping event");
                false
            }
            Err(TrySendError::Disconnected(_)) => false,
        }
    }

    /// Apply pending events and add the program's voices into `chunk`.
    ///
    /// Returns `false` once the program is silent. If another thread holds
    /// the engine the chunk is skipped and the program reported as sounding.
    pub fn render(&self, chunk: &mut Chunk) -> bool {
        let Some(mut engine) = self.engine.try_lock() else {
            return true;
        };
        while let Ok(event) = self.events_rx.try_recv() {
            event.apply(engine.as_mut());
        }
        let sounding = engine.render(chunk);
        self.sounding.store(sounding, Ordering::Release);
        sounding
    }

    /// Scope trigger position of the engine, or `offset` while it is busy.
    pub fn zero_crossing(&self, offset: f32) -> f32 {
        self.engine
            .try_lock()
            .map_or(offset, |engine| engine.zero_crossing(offset))
    }

    /// Frequency of the lowest sounding voice, or 0 while the engine is busy.
    pub fn base_frequency(&self) -> f32 {
        self.engine.try_lock().map_or(0.0, |engine| engine.base_frequency())
    }

    /// Snapshot of the current parameters as a patch.
    ///
    /// Locks the engine, so a render running at the same time skips one
    /// chunk of this program.
    pub fn to_patch(&self) -> Patch {
        let parameters = self.engine.lock().save();
        Patch::new(self.name.clone(), self.engine_name).with_parameters(parameters)
    }

    /// Run `f` with exclusive access to the engine.
    pub fn with_engine<R>(&self, f: impl FnOnce(&mut dyn Program) -> R) -> R {
        f(self.engine.lock().as_mut())
    }
}

/// Slot holding the program of one MIDI channel.
pub type ProgramSlot = ArcSwap<SharedProgram>;

/// Loads programs and owns the render set.
pub struct ProgramManager {
    registry: EngineRegistry,
    store: PatchStore,
    sample_rate: f32,
    active: Mutex<VecDeque<Arc<SharedProgram>>>,
    scratch: Mutex<Vec<Arc<SharedProgram>>>,
    selected: ArcSwapOption<SharedProgram>,
    last_activated: ArcSwapOption<SharedProgram>,
    retired_tx: Sender<Arc<SharedProgram>>,
    retired_rx: Receiver<Arc<SharedProgram>>,
}

impl std::fmt::Debug for ProgramManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgramManager")
            .field("sample_rate", &self.sample_rate)
            .field("active", &self.active_count())
            .finish_non_exhaustive()
    }
}

impl ProgramManager {
    /// Create a manager loading patches from `store`.
    pub fn new(store: PatchStore, sample_rate: f32) -> Self {
        let (retired_tx, retired_rx) = bounded(RENDER_CAPACITY);
        Self {
            registry: EngineRegistry::new(),
            store,
            sample_rate,
            active: Mutex::new(VecDeque::with_capacity(RENDER_CAPACITY)),
            scratch: Mutex::new(Vec::with_capacity(RENDER_CAPACITY)),
            selected: ArcSwapOption::empty(),
            last_activated: ArcSwapOption::empty(),
            retired_tx,
            retired_rx,
        }
    }

    /// Output sample rate programs are built for.
    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    /// The engine registry.
    pub fn registry(&self) -> &EngineRegistry {
        &self.registry
    }

    /// The patch store.
    pub fn store(&self) -> &PatchStore {
        &self.store
    }

    /// Build a program from a patch.
    pub fn build(&self, patch: &Patch) -> Result<Box<dyn Program>, LoadError> {
        self.registry.build(&patch.engine, self.sample_rate, &patch.parameters)
    }

    /// Load a program from the patch store.
    pub fn try_load(&self, midi_program: u8, bank_lsb: u8, bank_msb: u8) -> Result<SharedProgram, LoadError> {
        let patch = self.store.load(bank_number(bank_lsb, bank_msb), midi_program)?;
        let engine = self.build(&patch)?;
        Ok(SharedProgram::new(patch.name, engine, midi_program, bank_lsb, bank_msb))
    }

    /// Load a program, falling back to a silent one.
    ///
    /// A patch naming an unknown engine gives a silent program named
    /// [`INVALID_PROGRAM`]; any other failure one named [`NO_PROGRAM`].
    pub fn load(&self, midi_program: u8, bank_lsb: u8, bank_msb: u8) -> Arc<SharedProgram> {
        let bank = bank_number(bank_lsb, bank_msb);
        let program = match self.try_load(midi_program, bank_lsb, bank_msb) {
            Ok(program) => {
                tracing::info!(bank, program = midi_program, name = %program.name(), engine = program.engine_name(), "program loaded");
                program
            }
            Err(LoadError::UnknownEngine(engine)) => {
                tracing::warn!(bank, program = midi_program, %engine, "patch names an unknown engine");
                SharedProgram::new(INVALID_PROGRAM, Box::new(Silent), midi_program, bank_lsb, bank_msb)
            }
            Err(err) => {
                tracing::warn!(bank, program = midi_program, error = %err, "could not load program");
                SharedProgram::new(NO_PROGRAM, Box::new(Silent), midi_program, bank_lsb, bank_msb)
            }
        };
        Arc::new(program)
    }

    /// A new channel slot holding program 0 of bank 0.
    pub fn open_slot(&self) -> ProgramSlot {
        let program = self.load(0, 0, 0);
        self.select(&program);
        ArcSwap::new(program)
    }

    /// Switch a channel slot to another program.
    ///
    /// Does nothing when the slot already holds that program. Otherwise the
    /// outgoing program's voices are released and the new program becomes
    /// both selected and last activated.
    pub fn change(&self, slot: &ProgramSlot, midi_program: u8, bank_lsb: u8, bank_msb: u8) {
        let current = slot.load_full();
        if current.is(midi_program, bank_lsb, bank_msb) {
            return;
        }
        current.send(ProgramEvent::ReleaseAll);

        let program = self.load(midi_program, bank_lsb, bank_msb);
        slot.store(Arc::clone(&program));
        self.select(&program);
    }

    fn select(&self, program: &Arc<SharedProgram>) {
        self.selected.store(Some(Arc::clone(program)));
        self.last_activated.store(Some(Arc::clone(program)));
    }

    /// Add a program to the render set and make it the target of mapped
    /// controls.
    pub fn activate(&self, program: &Arc<SharedProgram>) {
        self.last_activated.store(Some(Arc::clone(program)));
        self.ensure_active(program);
    }

    /// Queue an event for a program and make sure it gets rendered so the
    /// event is applied.
    pub fn dispatch(&self, program: &Arc<SharedProgram>, event: ProgramEvent) {
        program.send(event);
        self.ensure_active(program);
    }

    fn ensure_active(&self, program: &Arc<SharedProgram>) {
        let mut active = self.active.lock();
        if !program.active.swap(true, Ordering::AcqRel) {
            // Not rendered yet, so not known to be silent.
            program.sounding.store(true, Ordering::Release);
            active.push_back(Arc::clone(program));
        }
    }

    /// Render one chunk of every active program.
    ///
    /// Clears the chunk first. Programs that report silence and have no
    /// pending events leave the render set.
    pub fn render(&self, chunk: &mut Chunk) {
        chunk.clear();

        // Programs still waiting for room in the retire queue stay at the
        // front of the scratch list.
        let mut scratch = self.scratch.lock();
        let waiting = scratch.len();
        scratch.extend(self.active.lock().iter().cloned());

        let mut any_silent = false;
        for program in &scratch[waiting..] {
            if !program.render(chunk) {
                any_silent = true;
            }
        }

        if any_silent {
            self.active.lock().retain(|program| {
                let finished = !program.sounding.load(Ordering::Acquire) && !program.has_pending_events();
                if finished {
                    program.active.store(false, Ordering::Release);
                }
                !finished
            });
        }

        // The render set holds a reference to every active program, so only
        // programs that left it can lose their last reference here. Those go
        // to the retire queue and are dropped by `collect_garbage`.
        scratch.retain(|program| {
            !program.is_active() && self.retired_tx.try_send(Arc::clone(program)).is_err()
        });
    }

    /// Drop programs the render thread handed back and return how many were
    /// freed. Call from a non-audio thread.
    pub fn collect_garbage(&self) -> usize {
        self.retired_rx.try_iter().filter_map(Arc::into_inner).count()
    }

    /// Number of retired programs the render thread is holding until the
    /// retire queue has room.
    pub fn retiring_count(&self) -> usize {
        self.scratch.lock().len()
    }

    /// Number of programs in the render set.
    pub fn active_count(&self) -> usize {
        self.active.lock().len()
    }

    /// Scope trigger position of the last activated program, or `offset`.
    pub fn zero_crossing(&self, offset: f32) -> f32 {
        self.last_activated
            .load()
            .as_ref()
            .map_or(offset, |program| program.zero_crossing(offset))
    }

    /// Base frequency of the last activated program, or 0.
    pub fn base_frequency(&self) -> f32 {
        self.last_activated
            .load()
            .as_ref()
            .map_or(0.0, |program| program.base_frequency())
    }

    /// Program most recently loaded by a program change.
    pub fn selected(&self) -> Option<Arc<SharedProgram>> {
        self.selected.load_full()
    }

    /// Program most recently played or loaded; target of mapped controls.
    pub fn last_activated(&self) -> Option<Arc<SharedProgram>> {
        self.last_activated.load_full()
    }

    /// Store a program's current parameters under its bank and program
    /// number.
    pub fn save(&self, program: &SharedProgram) -> Result<PathBuf, ConfigError> {
        let (lsb, msb) = program.bank();
        self.store
            .save(bank_number(lsb, msb), program.midi_program(), &program.to_patch())
    }
}
