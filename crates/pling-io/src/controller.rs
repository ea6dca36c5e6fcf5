//! Hardware controller mappings.

use std::collections::HashMap;

use pling_config::ControllerFile;
use pling_synth::control::{CONTROL_CHANGE, NOTE_ON};
use pling_synth::{Control, Message};

/// Status of note-off messages.
const NOTE_OFF: u8 = 0x80;

/// A parsed controller mapping.
///
/// Looks up the control for the first two bytes of a MIDI message. Note-off
/// messages share the entry of the note-on for the same key.
#[derive(Debug, Clone, Default)]
pub struct Controller {
    name: String,
    omni: bool,
    mapping: HashMap<Message, Control>,
}

impl Controller {
    /// Parse a mapping file. Entries that fail to parse are skipped with a
    /// warning.
    pub fn from_file(file: &ControllerFile) -> Self {
        let mut mapping = HashMap::with_capacity(file.mapping.len());
        for (message, control) in &file.mapping {
            match (message.parse::<Message>(), control.parse::<Control>()) {
                (Ok(message), Ok(control)) => {
                    mapping.insert(message, control);
                }
                (Err(e), _) | (_, Err(e)) => {
                    tracing::warn!(%message, %control, error = %e, "skipping controller mapping");
                }
            }
        }

        tracing::debug!(brand = %file.brand, model = %file.model, entries = mapping.len(), "controller mapping loaded");
        Self {
            name: format!("{} {}", file.brand, file.model),
            omni: file.omni,
            mapping,
        }
    }

    /// Brand and model.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether notes on every channel are treated as channel 1.
    pub fn is_omni(&self) -> bool {
        self.omni
    }

    /// Number of mapped messages.
    pub fn len(&self) -> usize {
        self.mapping.len()
    }

    /// Whether nothing is mapped.
    pub fn is_empty(&self) -> bool {
        self.mapping.is_empty()
    }

    /// Channel a message should be routed on.
    pub fn channel(&self, status: u8) -> u8 {
        let kind = status & 0xf0;
        if self.omni && (kind == NOTE_ON || kind == NOTE_OFF) {
            0
        } else {
            status & 0x0f
        }
    }

    /// The control mapped to a message, if any.
    pub fn lookup(&self, status: u8, data: u8) -> Option<Control> {
        let kind = status & 0xf0;
        let kind = match kind {
            NOTE_OFF | NOTE_ON => NOTE_ON,
            CONTROL_CHANGE => CONTROL_CHANGE,
            _ => return None,
        };
        let message = Message {
            status: kind | self.channel(status),
            data,
        };
        self.mapping.get(&message).copied()
    }
}
