//! Editor window seam.
//!
//! The host never creates native windows itself. Whoever owns the UI toolkit
//! implements [`EditorWindow`] and hands it to
//! [`PluginInstance::open_editor`](crate::PluginInstance::open_editor).

use std::ffi::c_void;

/// A native window able to parent a plugin editor.
pub trait EditorWindow: Send + Sync {
    /// Platform handle passed to `effEditOpen` (HWND, NSView*, X11 window id).
    fn native_handle(&self) -> *mut c_void;

    /// Resize the client area. Only ever called on the control thread, after
    /// opening and from `editor_idle` when the plugin asked for a new size.
    fn resize(&self, width: u32, height: u32);

    fn show(&self);
}

/// Editor sub-state of an instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EditorState {
    #[default]
    Closed,
    Open { width: u32, height: u32 },
}

impl EditorState {
    pub fn is_open(&self) -> bool {
        matches!(self, EditorState::Open { .. })
    }
}
