//! Error types for solo-core.

use thiserror::Error;

/// Error type for solo-core operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Invalid device: {0}")]
    InvalidDevice(String),

    #[error("Audio device not available")]
    DeviceNotAvailable(#[from] cpal::DefaultStreamConfigError),

    #[error("Failed to build audio stream")]
    BuildStream(#[from] cpal::BuildStreamError),

    #[error("Failed to play audio stream")]
    PlayStream(#[from] cpal::PlayStreamError),

    #[error("Failed to enumerate devices")]
    DevicesError(#[from] cpal::DevicesError),

    #[error("Failed to get device name")]
    DeviceNameError(#[from] cpal::DeviceNameError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),
}

/// Result type alias.
pub type Result<T> = core::result::Result<T, Error>;
