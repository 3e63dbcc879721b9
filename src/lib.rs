//! # Solo - single-instrument VST2 host
//!
//! Loads one VST 2.4 instrument, plays it from a virtual keyboard and streams the
//! result to an audio device.
//!
//! ## Architecture
//!
//! Solo is an umbrella crate that coordinates:
//! - **solo-plugin** - Plugin lifecycle, host callbacks and the control/render event bridge
//! - **solo-core** - Audio output (CPAL), host configuration, sample conversion
//!
//! ## Quick Start
//!
//! ```ignore
//! use solo::prelude::*;
//!
//! let mut session = Session::builder()
//!     .plugin("/path/to/synth.so")
//!     .build()?;
//! session.start_audio()?;
//!
//! let mut keys = session.keyboard();
//! keys.press(12)?; // C4
//! keys.release()?;
//! ```

/// Re-export of solo-core for direct access
pub use solo_core as core;
/// Re-export of solo-plugin for direct access
pub use solo_plugin as plugin;

pub mod error;
pub use error::{Error, Result};

pub mod commands;
pub use commands::{Command, CommandError};

pub mod keyboard;
pub use keyboard::Keyboard;

mod session;
pub use session::{render_interleaved, PluginSource, Session, SessionBuilder};

pub use solo_core::HostConfig;
pub use solo_plugin::{MidiEvent, PluginInfo, PluginInstance};

pub mod prelude {
    pub use crate::keyboard::Keyboard;
    pub use crate::session::{PluginSource, Session, SessionBuilder};
    pub use crate::{Error, HostConfig, MidiEvent, PluginInfo, Result};
}
