//! A running instrument: one plugin, one output stream.

use std::path::PathBuf;
use std::sync::Arc;

use solo_core::{interleave_i16, AudioEngine, AudioEngineConfig, HostConfig};
use solo_plugin::abi::PluginMain;
use solo_plugin::builtin::builtin_module;
use solo_plugin::{
    EventSender, HostIdentity, InstanceSettings, PluginInfo, PluginInstance, PluginModule,
};

use crate::keyboard::Keyboard;
use crate::{Error, Result};

/// Where the instrument comes from.
#[derive(Debug, Clone)]
pub enum PluginSource {
    Path(PathBuf),
    /// The reference synth compiled into the host.
    Builtin,
    /// An entry point linked into the calling binary.
    Static { name: String, entry: PluginMain },
}

/// Configures and loads a [`Session`].
///
/// # Example
///
/// ```ignore
/// use solo::Session;
///
/// let mut session = Session::builder()
///     .plugin("/path/to/synth.so")
///     .block_size(512)
///     .build()?;
/// session.start_audio()?;
/// session.keyboard().press(12)?;
/// ```
pub struct SessionBuilder {
    config: HostConfig,
    source: PluginSource,
    program: Option<usize>,
}

impl Default for SessionBuilder {
    fn default() -> Self {
        Self {
            config: HostConfig::default(),
            source: PluginSource::Builtin,
            program: None,
        }
    }
}

impl SessionBuilder {
    pub fn config(mut self, config: HostConfig) -> Self {
        self.config = config;
        self
    }

    pub fn plugin(mut self, path: impl Into<PathBuf>) -> Self {
        self.source = PluginSource::Path(path.into());
        self
    }

    /// Default
    pub fn builtin(mut self) -> Self {
        self.source = PluginSource::Builtin;
        self
    }

    pub fn source(mut self, source: PluginSource) -> Self {
        self.source = source;
        self
    }

    pub fn sample_rate(mut self, sample_rate: u32) -> Self {
        self.config.sample_rate = sample_rate;
        self
    }

    pub fn block_size(mut self, block_size: usize) -> Self {
        self.config.block_size = block_size;
        self
    }

    pub fn output_device(mut self, index: usize) -> Self {
        self.config.output_device = Some(index);
        self
    }

    /// Program selected before processing starts.
    pub fn program(mut self, index: usize) -> Self {
        self.program = Some(index);
        self
    }

    /// Load the plugin, check it is an instrument and start processing.
    ///
    /// Audio output is not opened until [`Session::start_audio`].
    pub fn build(self) -> Result<Session> {
        self.config.validate()?;

        let module = match &self.source {
            PluginSource::Path(path) => PluginModule::load(path)?,
            PluginSource::Builtin => builtin_module(),
            PluginSource::Static { name, entry } => PluginModule::from_entry(name, *entry),
        };
        let settings = InstanceSettings {
            sample_rate: self.config.sample_rate as f32,
            block_size: self.config.block_size,
            identity: HostIdentity {
                vendor: self.config.vendor.clone(),
                product: self.config.product.clone(),
            },
        };
        let instance = PluginInstance::from_module(module, settings)?;

        if !instance.is_synth() {
            return Err(Error::NotAnInstrument {
                name: instance.name().to_string(),
            });
        }
        if let Some(program) = self.program {
            instance.set_program(program)?;
        }
        instance.start()?;

        Ok(Session {
            engine: None,
            instance: Arc::new(instance),
            config: self.config,
        })
    }
}

/// Render one cycle of `instance` into an interleaved device buffer.
///
/// Any render failure yields silence; this runs on the audio thread.
pub fn render_interleaved(instance: &PluginInstance, out: &mut [i16], channels: usize, frames: usize) {
    match instance.render(frames) {
        Ok(block) => interleave_i16(block.channels(), out, channels, frames),
        Err(_) => out.fill(0),
    }
}

pub struct Session {
    // Stopped before the instance shuts down.
    engine: Option<AudioEngine>,
    instance: Arc<PluginInstance>,
    config: HostConfig,
}

impl Session {
    pub fn builder() -> SessionBuilder {
        SessionBuilder::default()
    }

    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    pub fn instance(&self) -> &Arc<PluginInstance> {
        &self.instance
    }

    pub fn info(&self) -> &PluginInfo {
        self.instance.info()
    }

    pub fn sender(&self) -> EventSender {
        self.instance.event_sender()
    }

    pub fn keyboard(&self) -> Keyboard {
        Keyboard::new(self.sender())
    }

    /// Render one cycle without an output device.
    pub fn render_into(&self, out: &mut [i16], channels: usize, frames: usize) {
        render_interleaved(&self.instance, out, channels, frames);
    }

    /// Open the output device and start pulling audio from the plugin.
    pub fn start_audio(&mut self) -> Result<()> {
        if self.engine.is_some() {
            return Ok(());
        }
        let mut engine = AudioEngine::new(AudioEngineConfig {
            output_device_index: self.config.output_device,
            sample_rate: Some(self.config.sample_rate),
            block_size: self.config.block_size,
        })?;

        let instance = Arc::clone(&self.instance);
        engine.start(move |out: &mut [i16], channels: usize, frames: usize| {
            render_interleaved(&instance, out, channels, frames)
        })?;

        self.engine = Some(engine);
        Ok(())
    }

    pub fn stop_audio(&mut self) {
        if let Some(mut engine) = self.engine.take() {
            engine.stop();
        }
    }

    pub fn is_audio_running(&self) -> bool {
        self.engine.as_ref().is_some_and(AudioEngine::is_running)
    }

    /// Output device channel count, once audio is started.
    pub fn device_channels(&self) -> Option<usize> {
        self.engine.as_ref().map(AudioEngine::channels)
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.stop_audio();
        self.instance.shutdown();
    }
}
