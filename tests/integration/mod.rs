//! Integration test modules for Solo
//!
//! - session: Session lifecycle, instrument check, plugin info
//! - render: Render cycles through the i16 device path
//! - keyboard: Virtual keyboard to audio
//! - config: Configuration files

pub mod config;
pub mod keyboard;
pub mod render;
pub mod session;
