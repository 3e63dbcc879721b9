//! In-process VST2 instrument hosting for Solo
//!
//! This crate loads a VST 2.4 instrument into the host process and bridges it to a
//! real-time render thread:
//!
//! - **Lifecycle**: `Unloaded -> Opened -> Running -> Stopped -> Closed`, with
//!   out-of-order transitions rejected
//! - **Host callbacks**: plugin queries are answered lock-free and without allocation,
//!   routed per instance through a token in the effect's host-reserved field
//! - **Event bridge**: note events queued on the control thread reach the plugin as
//!   one batch at the start of the next render cycle, in order and without loss up
//!   to [`EVENT_CAPACITY`] per cycle
//!
//! ## Usage
//!
//! ```ignore
//! use solo_plugin::{InstanceSettings, PluginInstance};
//!
//! let instance = PluginInstance::load("/path/to/synth.so".as_ref(), InstanceSettings::default())?;
//! instance.start()?;
//!
//! // Control thread
//! let keys = instance.event_sender();
//! keys.note_on(60)?;
//!
//! // Render thread, once per cycle
//! let block = instance.render(1024)?;
//! for channel in block.channels() {
//!     // ...
//! }
//! ```

pub mod abi;

pub mod error;
pub use error::{HostError, LoadStage, Result};

mod module;
pub use module::{PluginModule, ENTRY_POINTS};

mod dispatcher;
pub use dispatcher::{host_callback, HostDispatcher, HostIdentity, Registration, HOST_CAN_DO, MAX_INSTANCES};

mod events;
pub use events::{EventBatch, EventQueue, EventSender, MidiEvent, EVENT_CAPACITY, NOTE_VELOCITY};

mod editor;
pub use editor::{EditorState, EditorWindow};

mod metadata;
pub use metadata::{AudioIO, PluginCapabilities, PluginInfo};

mod instance;
pub use instance::{InstanceSettings, LifecycleState, PluginInstance, RenderedBlock, UNKNOWN_PROGRAM};

pub mod builtin;

#[cfg(test)]
pub(crate) mod test_utils;
