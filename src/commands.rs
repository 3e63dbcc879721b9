//! Line commands read by the CLI's control loop.

use std::str::FromStr;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Note-on for a MIDI note number.
    On(u8),
    Off(u8),
    /// Note-on, short hold, note-off.
    Tap(u8),
    /// Tap each character of a computer-keyboard row in turn.
    Keys(String),
    Program(usize),
    Programs,
    Info,
    Help,
    Quit,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum CommandError {
    #[error("empty command")]
    Empty,

    #[error("unknown command '{0}' (try 'help')")]
    Unknown(String),

    #[error("'{0}' needs an argument")]
    MissingArgument(&'static str),

    #[error("invalid number '{0}'")]
    InvalidNumber(String),

    #[error("note {0} out of range (0-127)")]
    NoteOutOfRange(u32),
}

pub const HELP: &str = "\
commands:
  on N        note-on for MIDI note N
  off N       note-off for MIDI note N
  tap N       play note N briefly
  keys ROW    play a computer-keyboard row (z = C3, q = C4)
  program N   select program N
  programs    list programs
  info        show plugin info
  quit        stop and exit";

fn note_arg(name: &'static str, arg: Option<&str>) -> Result<u8, CommandError> {
    let raw = arg.ok_or(CommandError::MissingArgument(name))?;
    let value: u32 = raw
        .parse()
        .map_err(|_| CommandError::InvalidNumber(raw.to_string()))?;
    u8::try_from(value)
        .ok()
        .filter(|&n| n < 128)
        .ok_or(CommandError::NoteOutOfRange(value))
}

impl FromStr for Command {
    type Err = CommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut parts = line.split_whitespace();
        let name = parts.next().ok_or(CommandError::Empty)?;
        let arg = parts.next();

        match name.to_ascii_lowercase().as_str() {
            "on" => Ok(Command::On(note_arg("on", arg)?)),
            "off" => Ok(Command::Off(note_arg("off", arg)?)),
            "tap" => Ok(Command::Tap(note_arg("tap", arg)?)),
            "keys" => arg
                .map(|row| Command::Keys(row.to_string()))
                .ok_or(CommandError::MissingArgument("keys")),
            "program" => {
                let raw = arg.ok_or(CommandError::MissingArgument("program"))?;
                raw.parse()
                    .map(Command::Program)
                    .map_err(|_| CommandError::InvalidNumber(raw.to_string()))
            }
            "programs" => Ok(Command::Programs),
            "info" => Ok(Command::Info),
            "help" | "?" => Ok(Command::Help),
            "quit" | "exit" | "q" => Ok(Command::Quit),
            other => Err(CommandError::Unknown(other.to_string())),
        }
    }
}
