//! Audio-side collaborators of the Solo host.
//!
//! # Primary API
//!
//! - [`AudioEngine`]: CPAL output stream pulling interleaved 16-bit audio from a
//!   [`RenderSource`] in block-sized chunks
//! - [`HostConfig`]: sample rate, block size, output device and host identity
//! - [`interleave_i16`]: planar float channels to interleaved device samples
//!
//! # Example
//!
//! ```ignore
//! use solo_core::{AudioEngine, AudioEngineConfig};
//!
//! let mut engine = AudioEngine::new(AudioEngineConfig {
//!     block_size: 1024,
//!     ..Default::default()
//! })?;
//! engine.start(|out: &mut [i16], _channels: usize, _frames: usize| out.fill(0))?;
//! ```

pub mod error;
pub use error::{Error, Result};

mod config;
pub use config::{HostConfig, MAX_IDENTITY_LEN};

mod convert;
pub use convert::{interleave_i16, sample_to_i16};

mod block;
pub use block::render_in_blocks;

mod output;
pub use output::{AudioEngine, AudioEngineConfig};

/// Per-cycle audio producer driven by the output stream.
pub trait RenderSource: Send {
    /// Fill `out` with `frames` interleaved frames of `channels` samples each.
    fn render(&mut self, out: &mut [i16], channels: usize, frames: usize);
}

impl<F> RenderSource for F
where
    F: FnMut(&mut [i16], usize, usize) + Send,
{
    fn render(&mut self, out: &mut [i16], channels: usize, frames: usize) {
        self(out, channels, frames)
    }
}
