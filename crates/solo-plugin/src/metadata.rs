//! Plugin description reported after load.

use serde::{Deserialize, Serialize};

use crate::abi::flags;

/// Static capability flags, read once at load.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginCapabilities {
    /// Instrument rather than effect.
    pub is_synth: bool,
    /// Has a custom GUI.
    pub has_editor: bool,
    /// Implements `processReplacing`.
    pub can_replacing: bool,
}

impl PluginCapabilities {
    pub fn from_flags(raw: i32) -> Self {
        Self {
            is_synth: raw & flags::IS_SYNTH != 0,
            has_editor: raw & flags::HAS_EDITOR != 0,
            can_replacing: raw & flags::CAN_REPLACING != 0,
        }
    }
}

/// Audio I/O configuration
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioIO {
    pub inputs: usize,
    pub outputs: usize,
}

/// What a loaded plugin reports about itself.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PluginInfo {
    /// Effect name (`effGetEffectName`), empty if unanswered
    pub name: String,

    pub vendor: String,

    pub product: String,

    /// Four-character registration id
    pub unique_id: i32,

    /// Plugin-defined version number
    pub version: i32,

    pub audio_io: AudioIO,

    /// One entry per program; "unknown" where the plugin gave no name
    pub programs: Vec<String>,

    pub capabilities: PluginCapabilities,
}

impl PluginInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn vendor(mut self, vendor: impl Into<String>) -> Self {
        self.vendor = vendor.into();
        self
    }

    pub fn product(mut self, product: impl Into<String>) -> Self {
        self.product = product.into();
        self
    }

    pub fn unique_id(mut self, unique_id: i32) -> Self {
        self.unique_id = unique_id;
        self
    }

    pub fn version(mut self, version: i32) -> Self {
        self.version = version;
        self
    }

    pub fn audio_io(mut self, inputs: usize, outputs: usize) -> Self {
        self.audio_io = AudioIO { inputs, outputs };
        self
    }

    pub fn programs(mut self, programs: Vec<String>) -> Self {
        self.programs = programs;
        self
    }

    pub fn capabilities(mut self, capabilities: PluginCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// The unique id as its four ASCII characters, when printable.
    pub fn unique_id_fourcc(&self) -> Option<String> {
        let bytes = self.unique_id.to_be_bytes();
        bytes
            .iter()
            .all(|b| b.is_ascii_graphic() || *b == b' ')
            .then(|| bytes.iter().map(|&b| b as char).collect())
    }
}
