//! Fixed-capacity polyphonic voice allocation.
//!
//! [`VoiceManager`] owns exactly `N` voices in a fixed array and tracks, per
//! slot, which key it plays and whether that key is physically held or
//! held by the sustain pedal. It never allocates, so engines can call it
//! from the render thread.
//!
//! # Allocation
//!
//! [`VoiceManager::press`] picks a slot in this order:
//!
//! 1. the slot already playing the same key (a retrigger),
//! 2. the first slot that is not sounding,
//! 3. the first slot whose key is no longer held down (stealing).
//!
//! When every slot is sounding a held key the note is dropped.
//!
//! # Sustain
//!
//! While the pedal is down, releasing a key only clears its `pressed` flag.
//! Lifting the pedal releases every voice whose key is up.

/// A voice that a [`VoiceManager`] can allocate.
pub trait Voice {
    /// Program parameters the voice needs to enter its release stage.
    type Params;

    /// Enter the release stage.
    fn release(&mut self, params: &Self::Params);

    /// Whether the voice still produces sound.
    fn is_active(&self) -> bool;
}

/// How [`VoiceManager::press`] obtained its slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Trigger {
    /// The slot was free or stolen; start the voice from scratch.
    New,
    /// The slot was still sounding the same key; continue from where it is.
    Retrigger,
}

#[derive(Clone, Copy, Debug, Default)]
struct Slot {
    key: u8,
    active: bool,
    pressed: bool,
    sustained: bool,
}

impl Slot {
    fn is_released(self) -> bool {
        !self.pressed && !self.sustained
    }
}

/// Polyphonic allocator for `N` voices.
///
/// # Example
///
/// ```rust
/// use pling_synth::{Trigger, Voice, VoiceManager};
///
/// #[derive(Default)]
/// struct Beep { on: bool }
///
/// impl Voice for Beep {
///     type Params = ();
///     fn release(&mut self, _: &()) { self.on = false; }
///     fn is_active(&self) -> bool { self.on }
/// }
///
/// let mut voices: VoiceManager<Beep, 2> = VoiceManager::new(Beep::default);
/// let (voice, trigger) = voices.press(60).unwrap();
/// voice.on = true;
/// assert_eq!(trigger, Trigger::New);
/// assert_eq!(voices.active_voices().count(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct VoiceManager<V, const N: usize> {
    slots: [Slot; N],
    voices: [V; N],
    sustain: bool,
}

impl<V: Voice, const N: usize> VoiceManager<V, N> {
    /// Create `N` voices with `make`.
    pub fn new(mut make: impl FnMut() -> V) -> Self {
        Self {
            slots: [Slot::default(); N],
            voices: core::array::from_fn(|_| make()),
            sustain: false,
        }
    }

    /// Number of slots.
    pub const fn capacity(&self) -> usize {
        N
    }

    fn is_sounding(&self, index: usize) -> bool {
        self.slots[index].active && self.voices[index].is_active()
    }

    /// Allocate a voice for `key`, or `None` when every slot is sounding a
    /// held key.
    pub fn press(&mut self, key: u8) -> Option<(&mut V, Trigger)> {
        let same_key = (0..N).find(|&i| self.slots[i].active && self.slots[i].key == key);

        let (index, trigger) = if let Some(i) = same_key {
            let trigger = if self.voices[i].is_active() {
                Trigger::Retrigger
            } else {
                Trigger::New
            };
            (i, trigger)
        } else {
            let free = (0..N).find(|&i| !self.is_sounding(i));
            let stolen = || (0..N).find(|&i| !self.slots[i].pressed);
            (free.or_else(stolen)?, Trigger::New)
        };

        self.slots[index] = Slot {
            key,
            active: true,
            pressed: true,
            sustained: self.sustain,
        };

        Some((&mut self.voices[index], trigger))
    }

    /// Key-up for `key`. The voice keeps sounding while the pedal holds it.
    ///
    /// Returns whether a voice was playing the key.
    pub fn release(&mut self, key: u8, params: &V::Params) -> bool {
        let Some(i) = (0..N).find(|&i| self.slots[i].active && self.slots[i].key == key) else {
            return false;
        };

        self.slots[i].pressed = false;
        if !self.slots[i].sustained {
            self.voices[i].release(params);
        }
        true
    }

    /// Release every voice regardless of the pedal.
    pub fn release_all(&mut self, params: &V::Params) {
        for (slot, voice) in self.slots.iter_mut().zip(&mut self.voices) {
            slot.pressed = false;
            slot.sustained = false;
            voice.release(params);
        }
    }

    /// Engage or lift the sustain pedal.
    pub fn set_sustain(&mut self, on: bool, params: &V::Params) {
        self.sustain = on;

        for (slot, voice) in self.slots.iter_mut().zip(&mut self.voices) {
            if on {
                if slot.active && slot.pressed {
                    slot.sustained = true;
                }
            } else {
                if slot.active && slot.sustained && !slot.pressed {
                    voice.release(params);
                }
                slot.sustained = false;
            }
        }
    }

    /// Whether the sustain pedal is down.
    pub fn sustain(&self) -> bool {
        self.sustain
    }

    /// Free the slot playing `key` immediately.
    pub fn stop(&mut self, key: u8, params: &V::Params) {
        for (slot, voice) in self.slots.iter_mut().zip(&mut self.voices) {
            if slot.active && slot.key == key {
                *slot = Slot { key, ..Slot::default() };
                voice.release(params);
            }
        }
    }

    /// The sounding voice with the lowest key, preferring voices whose key
    /// is still held (or sustained) over ones already releasing.
    pub fn lowest(&self) -> Option<&V> {
        (0..N)
            .filter(|&i| self.is_sounding(i))
            .min_by_key(|&i| (self.slots[i].is_released(), self.slots[i].key))
            .map(|i| &self.voices[i])
    }

    /// Iterate the sounding voices.
    ///
    /// Slots whose voice has finished are marked free as the iterator passes
    /// them.
    pub fn active_voices(&mut self) -> impl Iterator<Item = &mut V> {
        self.slots
            .iter_mut()
            .zip(self.voices.iter_mut())
            .filter_map(|(slot, voice)| {
                if !slot.active {
                    return None;
                }
                if voice.is_active() {
                    Some(voice)
                } else {
                    slot.active = false;
                    None
                }
            })
    }

    /// Keys of the occupied slots, in slot order.
    pub fn keys(&self) -> impl Iterator<Item = u8> + '_ {
        self.slots.iter().filter(|slot| slot.active).map(|slot| slot.key)
    }

    /// Number of occupied slots.
    pub fn active_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.active).count()
    }
}
