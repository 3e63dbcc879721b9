//! Centralized error type for the solo umbrella crate.
//!
//! Wraps all subsystem errors so `?` propagates naturally across crate boundaries.

use thiserror::Error;

use crate::commands::CommandError;

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Core(#[from] solo_core::Error),

    #[error("Plugin: {0}")]
    Plugin(#[from] solo_plugin::HostError),

    #[error("Not an instrument: '{name}' does not report the synth flag")]
    NotAnInstrument { name: String },

    #[error("Command: {0}")]
    Command(#[from] CommandError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
