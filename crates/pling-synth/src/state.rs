//! Global performance state.
//!
//! Holds what is not owned by any single program: master volume, the
//! transport clock, the keys currently held and the last pitch bend. Every
//! field is atomic or internally locked so the MIDI, audio and control
//! threads can share one `State`.

use std::sync::atomic::{AtomicI16, AtomicU8, AtomicU32, Ordering};

use pling_core::db_to_amplitude;

use crate::clock::Clock;
use crate::control::{Command, Control};
use crate::manager::{ProgramEvent, ProgramManager};

/// Master fader range in dB below unity.
const MASTER_RANGE_DB: f32 = 48.0;

/// Master volume for a fader value; 0 is silence.
pub fn master_fader_volume(value: u8) -> f32 {
    if value == 0 {
        0.0
    } else {
        db_to_amplitude(f32::from(value.min(127)) / 127.0 * MASTER_RANGE_DB - MASTER_RANGE_DB)
    }
}

/// Shared performance state.
#[derive(Debug)]
pub struct State {
    master_volume: AtomicU32,
    clock: Clock,
    keys: [AtomicU8; 128],
    bend: AtomicI16,
    active_channel: AtomicU8,
}

impl Default for State {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl State {
    /// Create with a master volume.
    pub fn new(master_volume: f32) -> Self {
        Self {
            master_volume: AtomicU32::new(master_volume.to_bits()),
            clock: Clock::new(),
            keys: std::array::from_fn(|_| AtomicU8::new(0)),
            bend: AtomicI16::new(0),
            active_channel: AtomicU8::new(0),
        }
    }

    /// Linear master gain.
    pub fn master_volume(&self) -> f32 {
        f32::from_bits(self.master_volume.load(Ordering::Relaxed))
    }

    /// Set the linear master gain; negative and non-finite values mute.
    pub fn set_master_volume(&self, volume: f32) {
        let volume = if volume.is_finite() { volume.max(0.0) } else { 0.0 };
        self.master_volume.store(volume.to_bits(), Ordering::Relaxed);
    }

    /// The transport clock.
    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    /// Record a pressed key.
    pub fn note_on(&self, key: u8, velocity: u8) {
        if let Some(slot) = self.keys.get(usize::from(key)) {
            slot.store(velocity, Ordering::Relaxed);
        }
    }

    /// Record a released key.
    pub fn note_off(&self, key: u8) {
        self.note_on(key, 0);
    }

    /// Forget every held key.
    pub fn release_all(&self) {
        for key in &self.keys {
            key.store(0, Ordering::Relaxed);
        }
    }

    /// Velocity of every key, 0 for keys not held.
    pub fn keys(&self) -> [u8; 128] {
        std::array::from_fn(|i| self.keys[i].load(Ordering::Relaxed))
    }

    /// Record the last pitch bend.
    pub fn set_bend(&self, value: i16) {
        self.bend.store(value, Ordering::Relaxed);
    }

    /// Last pitch bend.
    pub fn bend(&self) -> i16 {
        self.bend.load(Ordering::Relaxed)
    }

    /// Record the channel of the last program change.
    pub fn set_active_channel(&self, channel: u8) {
        self.active_channel.store(channel & 0x0f, Ordering::Relaxed);
    }

    /// Channel of the last program change.
    pub fn active_channel(&self) -> u8 {
        self.active_channel.load(Ordering::Relaxed)
    }

    /// Act on a mapped control.
    ///
    /// Pots, faders and buttons go to the last activated program, except
    /// the master fader which sets the master volume. Rewind, stop and play
    /// drive the clock. Everything else is accepted and ignored.
    pub fn process_control(&self, programs: &ProgramManager, control: Control, value: u8) {
        let event = match control.command {
            Command::Fader if control.master => {
                self.set_master_volume(master_fader_volume(value));
                return;
            }
            Command::Pot => ProgramEvent::Pot(control, value),
            Command::Fader => ProgramEvent::Fader(control, value),
            Command::Button => ProgramEvent::Button(control, value),
            Command::Rewind => return self.clock.reset(),
            Command::Stop => return self.clock.stop(),
            Command::Play => return self.clock.start(),
            command => {
                tracing::debug!(%command, value, "ignoring control");
                return;
            }
        };

        if let Some(program) = programs.last_activated() {
            programs.dispatch(&program, event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pling_config::{PatchStore, SearchPath};
    use tempfile::TempDir;

    fn manager() -> (TempDir, ProgramManager) {
        let dir = TempDir::new().unwrap();
        let store = PatchStore::new(SearchPath::new(dir.path().join("a"), dir.path().join("b")));
        (dir, ProgramManager::new(store, 48000.0))
    }

    #[test]
    fn test_master_fader_curve() {
        assert_eq!(master_fader_volume(0), 0.0);
        assert!((master_fader_volume(127) - 1.0).abs() < 1e-6);
        let mid = master_fader_volume(64);
        assert!(mid > db_to_amplitude(-25.0) && mid < db_to_amplitude(-23.0), "mid {mid}");
    }

    #[test]
    fn test_master_fader_sets_volume() {
        let (_dir, programs) = manager();
        let state = State::default();
        state.process_control(&programs, Control::new(Command::Fader, 0).master(), 0);
        assert_eq!(state.master_volume(), 0.0);
        state.process_control(&programs, Control::new(Command::Fader, 0).master(), 127);
        assert!((state.master_volume() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_transport_commands() {
        let (_dir, programs) = manager();
        let state = State::default();
        state.process_control(&programs, Control::new(Command::Play, 0), 127);
        assert!(state.clock().is_running());
        state.process_control(&programs, Control::new(Command::Stop, 0), 127);
        assert!(!state.clock().is_running());
        state.clock().set_beat_position(8.0);
        state.process_control(&programs, Control::new(Command::Rewind, 0), 127);
        assert_eq!(state.clock().beat_position(), 0.0);
    }

    #[test]
    fn test_program_controls_reach_last_activated() {
        let (_dir, programs) = manager();
        let state = State::default();
        state.process_control(&programs, Control::new(Command::Pot, 0), 64);
        assert_eq!(programs.active_count(), 0, "no program to send to");

        let slot = programs.open_slot();
        state.process_control(&programs, Control::new(Command::Pot, 0), 64);
        assert!(slot.load().has_pending_events());
        assert_eq!(programs.active_count(), 1);

        state.process_control(&programs, Control::new(Command::Mixer, 0), 64);
        state.process_control(&programs, Control::new(Command::Pass, 0), 64);
    }

    #[test]
    fn test_keys_and_bend() {
        let state = State::default();
        state.note_on(60, 100);
        state.note_on(64, 90);
        state.note_off(60);
        let keys = state.keys();
        assert_eq!(keys[60], 0);
        assert_eq!(keys[64], 90);
        state.release_all();
        assert!(state.keys().iter().all(|&v| v == 0));

        state.set_bend(-8192);
        assert_eq!(state.bend(), -8192);
        state.set_active_channel(17);
        assert_eq!(state.active_channel(), 1);
    }

    #[test]
    fn test_invalid_volume_mutes() {
        let state = State::new(0.5);
        assert_eq!(state.master_volume(), 0.5);
        state.set_master_volume(f32::NAN);
        assert_eq!(state.master_volume(), 0.0);
    }
}
