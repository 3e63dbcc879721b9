//! CPAL audio output.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

use crate::block::render_in_blocks;
use crate::{Error, RenderSource, Result};

// Scratch size in render blocks. Larger device buffers are filled in several passes.
const SCRATCH_BLOCKS: usize = 8;

#[derive(Debug, Clone, Default)]
pub struct AudioEngineConfig {
    pub output_device_index: Option<usize>,
    /// Requested stream rate; `None` keeps the device default.
    pub sample_rate: Option<u32>,
    /// Largest chunk handed to the render source.
    pub block_size: usize,
}

/// Wrapper to hold a `cpal::Stream` in a `Send` context.
///
/// `cpal::Stream` is `!Send` due to platform internals. The stream is created,
/// played and dropped by whoever owns the `AudioEngine`, never touched elsewhere.
struct StreamHandle(#[allow(dead_code)] cpal::Stream);

// SAFETY: the stream is only ever accessed through its owning AudioEngine.
unsafe impl Send for StreamHandle {}

pub struct AudioEngine {
    sample_rate: u32,
    channels: usize,
    block_size: usize,
    is_running: bool,
    output_device_index: Option<usize>,
    _stream: Option<StreamHandle>,
}

impl AudioEngine {
    pub fn new(config: AudioEngineConfig) -> Result<Self> {
        let device = Self::get_device(config.output_device_index)?;
        let output_config = device.default_output_config()?;

        Ok(Self {
            sample_rate: config
                .sample_rate
                .unwrap_or(output_config.sample_rate().0),
            channels: output_config.channels() as usize,
            block_size: config.block_size,
            is_running: false,
            output_device_index: config.output_device_index,
            _stream: None,
        })
    }

    /// Open the stream and start pulling audio from `source`.
    pub fn start<S: RenderSource + 'static>(&mut self, source: S) -> Result<()> {
        if self.is_running {
            return Ok(());
        }

        let device = Self::get_device(self.output_device_index)?;
        let default = device.default_output_config()?;
        let config = cpal::StreamConfig {
            channels: self.channels as u16,
            sample_rate: cpal::SampleRate(self.sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let stream = match default.sample_format() {
            cpal::SampleFormat::F32 => self.build_stream::<f32, S>(&device, &config, source)?,
            cpal::SampleFormat::I16 => self.build_stream::<i16, S>(&device, &config, source)?,
            cpal::SampleFormat::U16 => self.build_stream::<u16, S>(&device, &config, source)?,
            format => {
                return Err(Error::InvalidConfig(format!(
                    "Unsupported sample format: {:?}",
                    format
                )));
            }
        };

        stream.play()?;
        tracing::info!(
            device = %device.name().unwrap_or_default(),
            sample_rate = self.sample_rate,
            channels = self.channels,
            "audio output started"
        );

        self._stream = Some(StreamHandle(stream));
        self.is_running = true;

        Ok(())
    }

    /// Stop and drop the stream. The render source is dropped with it.
    pub fn stop(&mut self) {
        if self._stream.take().is_some() {
            tracing::info!("audio output stopped");
        }
        self.is_running = false;
    }

    fn get_device(index: Option<usize>) -> Result<cpal::Device> {
        let host = cpal::default_host();

        if let Some(idx) = index {
            let devices: Vec<_> = host.output_devices()?.collect();

            let device_count = devices.len();
            devices.into_iter().nth(idx).ok_or_else(|| {
                Error::InvalidDevice(format!(
                    "Output device index {} out of range (available: {})",
                    idx, device_count
                ))
            })
        } else {
            host.default_output_device()
                .ok_or_else(|| Error::InvalidDevice("No output device available".to_string()))
        }
    }

    fn build_stream<T, S>(
        &self,
        device: &cpal::Device,
        config: &cpal::StreamConfig,
        mut source: S,
    ) -> Result<cpal::Stream>
    where
        T: cpal::SizedSample + cpal::FromSample<i16>,
        S: RenderSource + 'static,
    {
        let channels = config.channels as usize;
        let block_size = self.block_size;
        let mut scratch = vec![0i16; block_size.max(1) * channels * SCRATCH_BLOCKS];

        let stream = device.build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                    fill_device_buffer(data, &mut scratch, &mut source, channels, block_size);
                }));

                if result.is_err() {
                    // Panic in callback - output silence
                    for sample in data.iter_mut() {
                        *sample = T::from_sample(0i16);
                    }
                }
            },
            |err| {
                tracing::warn!("audio stream error: {err}");
            },
            None,
        )?;

        Ok(stream)
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    pub fn is_running(&self) -> bool {
        self.is_running
    }

    /// List available output devices.
    pub fn list_output_devices() -> Result<Vec<String>> {
        let host = cpal::default_host();
        let devices: Result<Vec<String>> = host
            .output_devices()?
            .enumerate()
            .map(|(idx, device)| Ok(format!("{}: {}", idx, device.name()?)))
            .collect();
        devices
    }

    /// Get the name of the current output device.
    pub fn current_output_device_name(&self) -> Result<String> {
        let device = Self::get_device(self.output_device_index)?;
        Ok(device.name()?)
    }
}

impl Drop for AudioEngine {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Render into a device buffer of any length through a fixed `scratch` buffer.
///
/// `scratch` holds a whole number of blocks, so block boundaries survive the
/// passes. Never allocates.
pub(crate) fn fill_device_buffer<T, S>(
    data: &mut [T],
    scratch: &mut [i16],
    source: &mut S,
    channels: usize,
    block_size: usize,
) where
    T: cpal::SizedSample + cpal::FromSample<i16>,
    S: RenderSource + ?Sized,
{
    let pass = if channels == 0 || block_size == 0 {
        scratch.len()
    } else {
        scratch.len() / (block_size * channels) * (block_size * channels)
    };
    if pass == 0 {
        data.fill(T::from_sample(0i16));
        return;
    }

    for out in data.chunks_mut(pass) {
        let interleaved = &mut scratch[..out.len()];
        render_in_blocks(source, interleaved, channels, block_size);
        for (sample, &value) in out.iter_mut().zip(interleaved.iter()) {
            *sample = T::from_sample(value);
        }
    }
}
