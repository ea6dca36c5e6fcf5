//! Abstract controls and the textual mapping language.
//!
//! Hardware controllers send raw MIDI messages. A controller mapping file
//! translates each [`Message`] into a [`Control`]: a command such as
//! `pot` or `play` plus the position of the physical element that sent it.
//!
//! # Message strings
//!
//! ```text
//! [channel/]key/N    note messages for key N (channel 1-16, default 1)
//! [channel/]cc/N     control change N
//! sysex              system exclusive
//! ```
//!
//! # Control strings
//!
//! ```text
//! command[suffix][/position]
//! ```
//!
//! Only the first of several comma-separated alternatives is used.
//! Suffixes: `~` toggle, `+` increment, `-` decrement, `*` endless encoder.
//! Positions:
//!
//! | Position      | Meaning                              |
//! |---------------|--------------------------------------|
//! | `master`      | the master strip                     |
//! | `top/N`       | master strip, row -1, column N-1     |
//! | `bottom/N`    | master strip, row 1, column N-1      |
//! | `left/N`      | master strip, column -1, row N-1     |
//! | `right/N`     | master strip, column 1, row N-1      |
//! | `N`           | column N-1                           |
//! | `R/C`         | row R-1, column C-1                  |

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Error from parsing a message or control string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ControlParseError {
    /// The string is empty.
    #[error("empty string")]
    Empty,
    /// The command name is not known.
    #[error("unknown command '{0}'")]
    UnknownCommand(String),
    /// The message type is not `key`, `cc` or `sysex`.
    #[error("unknown message type '{0}'")]
    UnknownMessage(String),
    /// A number is malformed or out of range.
    #[error("invalid number '{0}'")]
    InvalidNumber(String),
    /// A required field is missing.
    #[error("missing {0}")]
    Missing(&'static str),
}

macro_rules! commands {
    ($($variant:ident => $name:literal),* $(,)?) => {
        /// What a mapped control does.
        #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
        pub enum Command {
            /// Not mapped; the message is passed on to the channel's program.
            #[default]
            Pass,
            $(
                #[doc = concat!("`", $name, "`")]
                $variant,
            )*
        }

        impl Command {
            /// Every command, in declaration order.
            pub const ALL: &'static [Command] = &[Command::Pass, $(Command::$variant),*];

            /// Name used in mapping files.
            pub fn name(self) -> &'static str {
                match self {
                    Command::Pass => "pass",
                    $(Command::$variant => $name,)*
                }
            }
        }

        impl FromStr for Command {
            type Err = ControlParseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($name => Ok(Command::$variant),)*
                    _ => Err(ControlParseError::UnknownCommand(s.to_string())),
                }
            }
        }
    };
}

commands! {
    Ignore => "ignore",
    Pot => "pot",
    Fader => "fader",
    Button => "button",
    Pad => "pad",
    Grid => "grid",
    Loop => "loop",
    Rewind => "rewind",
    Forward => "forward",
    Stop => "stop",
    Play => "play",
    Record => "record",
    Home => "home",
    SetLeft => "set_left",
    SetRight => "set_right",
    Undo => "undo",
    Click => "click",
    Mode => "mode",
    Mixer => "mixer",
    Instrument => "instrument",
    Preset => "preset",
    Bank => "bank",
    Clips => "clips",
    Scenes => "scenes",
    Pages => "pages",
    Shift => "shift",
    Track => "track",
    Pattern => "pattern",
    Tempo => "tempo",
    Crossfade => "crossfade",
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A mapped physical control.
///
/// `row` doubles as the step of a `modify` control (`+1` or `-1`).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Control {
    /// What the control does.
    pub command: Command,
    /// Row, or step for increment/decrement controls.
    pub row: i8,
    /// Column.
    pub col: i8,
    /// Latching button.
    pub toggle: bool,
    /// Endless encoder.
    pub infinite: bool,
    /// Sends relative changes.
    pub modify: bool,
    /// Part of the master strip.
    pub master: bool,
}

impl Control {
    /// Control with a command at column `col`.
    pub fn new(command: Command, col: i8) -> Self {
        Self {
            command,
            col,
            ..Self::default()
        }
    }

    /// Same control on the master strip.
    pub fn master(mut self) -> Self {
        self.master = true;
        self
    }

    /// Step of a relative control.
    pub fn value(&self) -> i8 {
        self.row
    }

    /// Column as an index, if it is not negative.
    pub fn column(&self) -> Option<usize> {
        usize::try_from(self.col).ok()
    }
}

fn parse_number<T: FromStr>(token: &str) -> Result<T, ControlParseError> {
    token
        .parse()
        .map_err(|_| ControlParseError::InvalidNumber(token.to_string()))
}

/// One-based position to a zero-based index.
fn parse_index(token: &str) -> Result<i8, ControlParseError> {
    let n: i16 = parse_number(token)?;
    i8::try_from(n - 1).map_err(|_| ControlParseError::InvalidNumber(token.to_string()))
}

impl FromStr for Control {
    type Err = ControlParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let first = s.split(',').next().unwrap_or_default().trim();
        if first.is_empty() {
            return Err(ControlParseError::Empty);
        }

        let mut tokens = first.split('/');
        let mut control = Control::default();

        let mut name = tokens.next().ok_or(ControlParseError::Empty)?;
        if let Some(rest) = name.strip_suffix('~') {
            control.toggle = true;
            name = rest;
        }
        if let Some(rest) = name.strip_suffix('+') {
            control.modify = true;
            control.row = 1;
            name = rest;
        }
        if let Some(rest) = name.strip_suffix('-') {
            control.modify = true;
            control.row = -1;
            name = rest;
        }
        if let Some(rest) = name.strip_suffix('*') {
            control.modify = true;
            control.infinite = true;
            name = rest;
        }
        control.command = name.parse()?;

        let Some(position) = tokens.next() else {
            return Ok(control);
        };

        let mut index = || tokens.next().ok_or(ControlParseError::Missing("position"));

        match position {
            "master" => control.master = true,
            "top" => {
                control.master = true;
                control.row = -1;
                control.col = parse_index(index()?)?;
            }
            "bottom" => {
                control.master = true;
                control.row = 1;
                control.col = parse_index(index()?)?;
            }
            "left" => {
                control.master = true;
                control.col = -1;
                control.row = parse_index(index()?)?;
            }
            "right" => {
                control.master = true;
                control.col = 1;
                control.row = parse_index(index()?)?;
            }
            first => {
                control.col = parse_index(first)?;
                if let Ok(second) = index() {
                    control.row = control.col;
                    control.col = parse_index(second)?;
                }
            }
        }

        Ok(control)
    }
}

/// Status byte and first data byte of a raw MIDI message.
///
/// This is the key of a controller mapping. Note messages are normalized to
/// note-on status so both note-on and note-off find the same entry.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Message {
    /// Status byte including the channel.
    pub status: u8,
    /// Key or controller number.
    pub data: u8,
}

/// Status of note-on messages.
pub const NOTE_ON: u8 = 0x90;
/// Status of control change messages.
pub const CONTROL_CHANGE: u8 = 0xb0;
/// Status of system exclusive messages.
pub const SYSEX: u8 = 0xf0;

impl Message {
    /// Note message for `key` on zero-based `channel`.
    pub fn key(channel: u8, key: u8) -> Self {
        Self {
            status: NOTE_ON | (channel & 0x0f),
            data: key,
        }
    }

    /// Control change `controller` on zero-based `channel`.
    pub fn cc(channel: u8, controller: u8) -> Self {
        Self {
            status: CONTROL_CHANGE | (channel & 0x0f),
            data: controller,
        }
    }
}

impl FromStr for Message {
    type Err = ControlParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut tokens = s.trim().split('/').peekable();
        let mut channel = 0u8;

        match tokens.peek() {
            None | Some(&"") => return Err(ControlParseError::Empty),
            Some(token) if token.starts_with(|c: char| c.is_ascii_digit()) => {
                let n: u8 = parse_number(token)?;
                if !(1..=16).contains(&n) {
                    return Err(ControlParseError::InvalidNumber((*token).to_string()));
                }
                channel = n - 1;
                tokens.next();
            }
            Some(_) => {}
        }

        let kind = tokens.next().ok_or(ControlParseError::Missing("message type"))?;
        let status = match kind {
            "key" => NOTE_ON | channel,
            "cc" => CONTROL_CHANGE | channel,
            "sysex" => return Ok(Message { status: SYSEX, data: 0 }),
            other => return Err(ControlParseError::UnknownMessage(other.to_string())),
        };

        let data = tokens.next().ok_or(ControlParseError::Missing("key or controller number"))?;
        let data: u8 = parse_number(data)?;
        if data > 127 {
            return Err(ControlParseError::InvalidNumber(data.to_string()));
        }

        Ok(Message { status, data })
    }
}
