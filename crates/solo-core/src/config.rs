//! Host configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Longest vendor/product string the plugin ABI can carry (64 bytes incl. terminator).
pub const MAX_IDENTITY_LEN: usize = 63;

/// Configuration for the host and its audio output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    pub sample_rate: u32,
    /// Frames per render cycle, fixed for the plugin's lifetime.
    pub block_size: usize,
    /// Output device index; `None` is the system default.
    pub output_device: Option<usize>,
    pub vendor: String,
    pub product: String,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            block_size: 1024,
            output_device: None,
            vendor: "solo".to_string(),
            product: "Solo Host".to_string(),
        }
    }
}

impl HostConfig {
    pub fn validate(&self) -> Result<()> {
        if !(8000..=384000).contains(&self.sample_rate) {
            return Err(Error::InvalidConfig(format!(
                "sample_rate {} out of range (8000-384000 Hz)",
                self.sample_rate
            )));
        }
        if !(16..=8192).contains(&self.block_size) {
            return Err(Error::InvalidConfig(format!(
                "block_size {} out of range (16-8192 frames)",
                self.block_size
            )));
        }
        for (field, value) in [("vendor", &self.vendor), ("product", &self.product)] {
            if value.len() > MAX_IDENTITY_LEN {
                return Err(Error::InvalidConfig(format!(
                    "{field} is {} bytes (max {MAX_IDENTITY_LEN})",
                    value.len()
                )));
            }
        }
        Ok(())
    }

    /// Parse and validate a TOML document. Missing keys take their defaults.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&text)?;
        tracing::debug!(path = %path.display(), ?config, "config loaded");
        Ok(config)
    }
}
