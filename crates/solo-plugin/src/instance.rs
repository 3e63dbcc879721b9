//! A loaded VST2 instrument and its lifecycle.

use std::ffi::c_void;
use std::ptr;
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};

use crate::abi::{self, effect_op, AEffect, ERect, VST_MAGIC};
use crate::dispatcher::{host_callback, HostDispatcher, HostIdentity, Registration};
use crate::editor::{EditorState, EditorWindow};
use crate::error::{HostError, LoadStage, Result};
use crate::events::{EventBatch, EventQueue, EventSender, MidiEvent};
use crate::metadata::{PluginCapabilities, PluginInfo};
use crate::module::PluginModule;

/// Name reported for programs the plugin does not name.
pub const UNKNOWN_PROGRAM: &str = "unknown";

// Plugins are known to overrun the documented name lengths.
const NAME_BUFFER_LEN: usize = 256;

/// Plugin lifecycle.
///
/// `Unloaded -> Opened -> Running -> Stopped -> Closed -> Unloaded`. `Opened` may
/// also go straight to `Closed` when the instance never rendered. `Unloaded` is
/// reached again by [`PluginInstance::shutdown`], after which nothing can be
/// dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Unloaded,
    Opened,
    Running,
    Stopped,
    Closed,
}

impl LifecycleState {
    pub fn can_transition(self, to: LifecycleState) -> bool {
        use LifecycleState::*;
        matches!(
            (self, to),
            (Unloaded, Opened)
                | (Opened, Running)
                | (Opened, Closed)
                | (Running, Stopped)
                | (Stopped, Closed)
                | (Closed, Unloaded)
        )
    }
}

/// Settings negotiated with the plugin at load.
#[derive(Debug, Clone)]
pub struct InstanceSettings {
    pub sample_rate: f32,
    pub block_size: usize,
    pub identity: HostIdentity,
}

impl Default for InstanceSettings {
    fn default() -> Self {
        Self {
            sample_rate: 44100.0,
            block_size: 1024,
            identity: HostIdentity::default(),
        }
    }
}

/// State touched by plugin calls, guarded by the coarse plugin lock.
struct PluginState {
    effect: *mut AEffect,
    lifecycle: LifecycleState,
    editor: EditorState,
    window: Option<Arc<dyn EditorWindow>>,
    inputs: Vec<Vec<f32>>,
    outputs: Vec<Vec<f32>>,
    input_ptrs: Vec<*mut f32>,
    output_ptrs: Vec<*mut f32>,
    batch: EventBatch,
}

// SAFETY: the effect pointer and channel pointers are only dereferenced while
// the plugin lock is held.
unsafe impl Send for PluginState {}

impl PluginState {
    fn transition(&mut self, to: LifecycleState) -> Result<()> {
        if !self.lifecycle.can_transition(to) {
            return Err(HostError::InvalidState {
                from: self.lifecycle,
                to,
            });
        }
        tracing::debug!(from = ?self.lifecycle, ?to, "plugin lifecycle");
        self.lifecycle = to;
        Ok(())
    }

    /// # Safety
    /// `self.effect` must be a live effect (any state before `Closed`).
    unsafe fn dispatch(
        &self,
        opcode: i32,
        index: i32,
        value: isize,
        ptr: *mut c_void,
        opt: f32,
    ) -> isize {
        dispatch(self.effect, opcode, index, value, ptr, opt)
    }
}

unsafe fn dispatch(
    effect: *mut AEffect,
    opcode: i32,
    index: i32,
    value: isize,
    ptr: *mut c_void,
    opt: f32,
) -> isize {
    match (*effect).dispatcher {
        Some(dispatcher) => dispatcher(effect, opcode, index, value, ptr, opt),
        None => 0,
    }
}

unsafe fn dispatch_string(effect: *mut AEffect, opcode: i32, index: i32) -> Option<String> {
    let mut buf = [0u8; NAME_BUFFER_LEN];
    let answered = dispatch(effect, opcode, index, 0, buf.as_mut_ptr() as *mut c_void, 0.0);
    (answered != 0).then(|| abi::read_c_string(&buf))
}

/// A VST2 plugin driven by one control thread and one render thread.
///
/// All calls into the plugin are serialized by a single lock. Events travel
/// through a separate queue whose lock is never held across a plugin call.
pub struct PluginInstance {
    state: Mutex<PluginState>,
    events: Arc<EventQueue>,
    info: PluginInfo,
    sample_rate: f32,
    block_size: usize,
    // Dropped after the plugin is closed and before the module is unmapped.
    registration: Registration,
    module: PluginModule,
}

impl PluginInstance {
    /// Load the plugin binary at `path` and bring it to `Opened`.
    pub fn load(path: &std::path::Path, settings: InstanceSettings) -> Result<Self> {
        Self::from_module(PluginModule::load(path)?, settings)
    }

    /// Instantiate the plugin in `module` and bring it to `Opened`.
    pub fn from_module(module: PluginModule, settings: InstanceSettings) -> Result<Self> {
        let path = module.path().to_path_buf();
        let dispatcher = Arc::new(HostDispatcher::new(
            settings.sample_rate,
            settings.block_size,
            settings.identity,
            module.directory(),
        ));
        let registration = Registration::register(dispatcher)?;

        // SAFETY: the entry point follows the VST2 ABI; the host callback is valid
        // before attachment and answers only the version query until then.
        let effect = unsafe { (module.entry())(host_callback) };
        if effect.is_null() {
            return Err(HostError::NotAPlugin {
                path,
                stage: LoadStage::Instantiation,
            });
        }
        // SAFETY: non-null pointer returned by the entry point.
        let (magic, has_dispatcher) = unsafe { ((*effect).magic, (*effect).dispatcher.is_some()) };
        if magic != VST_MAGIC {
            return Err(HostError::NotAPlugin {
                path,
                stage: LoadStage::Instantiation,
            });
        }
        if !has_dispatcher {
            return Err(HostError::NotAPlugin {
                path,
                stage: LoadStage::Setup,
            });
        }

        // SAFETY: validated effect with a dispatcher.
        unsafe {
            (*effect).reserved1 = registration.token() as isize;
            dispatch(effect, effect_op::OPEN, 0, 0, ptr::null_mut(), 0.0);
            dispatch(effect, effect_op::SET_SAMPLE_RATE, 0, 0, ptr::null_mut(), settings.sample_rate);
            dispatch(effect, effect_op::SET_BLOCK_SIZE, 0, settings.block_size as isize, ptr::null_mut(), 0.0);
            dispatch(
                effect,
                effect_op::SET_PROCESS_PRECISION,
                0,
                abi::PROCESS_PRECISION_32,
                ptr::null_mut(),
                0.0,
            );
            dispatch(effect, effect_op::MAINS_CHANGED, 0, 1, ptr::null_mut(), 0.0);
        }

        let info = unsafe { read_info(effect) };
        let block_size = settings.block_size;
        let inputs = vec![vec![0.0f32; block_size]; info.audio_io.inputs];
        let mut outputs = vec![vec![0.0f32; block_size]; info.audio_io.outputs];
        let input_ptrs = vec![ptr::null_mut(); inputs.len()];
        let output_ptrs = outputs.iter_mut().map(|b| b.as_mut_ptr()).collect();

        if !info.capabilities.can_replacing {
            tracing::warn!(plugin = %info.name, "plugin lacks processReplacing, output will be silent");
        }
        tracing::info!(
            plugin = %info.name,
            path = %path.display(),
            outputs = info.audio_io.outputs,
            programs = info.programs.len(),
            synth = info.capabilities.is_synth,
            "plugin loaded"
        );

        let mut state = PluginState {
            effect,
            lifecycle: LifecycleState::Unloaded,
            editor: EditorState::Closed,
            window: None,
            inputs,
            outputs,
            input_ptrs,
            output_ptrs,
            batch: EventBatch::new(),
        };
        state.transition(LifecycleState::Opened)?;

        Ok(Self {
            state: Mutex::new(state),
            events: Arc::new(EventQueue::new()),
            info,
            sample_rate: settings.sample_rate,
            block_size,
            registration,
            module,
        })
    }

    pub fn info(&self) -> &PluginInfo {
        &self.info
    }

    pub fn name(&self) -> &str {
        &self.info.name
    }

    pub fn capabilities(&self) -> PluginCapabilities {
        self.info.capabilities
    }

    pub fn is_synth(&self) -> bool {
        self.info.capabilities.is_synth
    }

    pub fn has_editor(&self) -> bool {
        self.info.capabilities.has_editor
    }

    pub fn num_inputs(&self) -> usize {
        self.info.audio_io.inputs
    }

    pub fn num_outputs(&self) -> usize {
        self.info.audio_io.outputs
    }

    pub fn program_names(&self) -> &[String] {
        &self.info.programs
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    pub fn module(&self) -> &PluginModule {
        &self.module
    }

    pub fn state(&self) -> LifecycleState {
        self.state.lock().lifecycle
    }

    pub fn editor_state(&self) -> EditorState {
        self.state.lock().editor
    }

    /// Producer handle for queuing events from the control thread.
    pub fn event_sender(&self) -> EventSender {
        EventSender::new(Arc::clone(&self.events))
    }

    pub fn send_event(&self, event: MidiEvent) -> Result<()> {
        self.events.push(event)
    }

    pub fn note_on(&self, note: u8) -> Result<()> {
        self.send_event(MidiEvent::note_on(note))
    }

    pub fn note_off(&self, note: u8) -> Result<()> {
        self.send_event(MidiEvent::note_off(note))
    }

    /// `Opened -> Running`.
    pub fn start(&self) -> Result<()> {
        let mut state = self.state.lock();
        state.transition(LifecycleState::Running)?;
        unsafe { state.dispatch(effect_op::START_PROCESS, 0, 0, ptr::null_mut(), 0.0) };
        Ok(())
    }

    /// `Running -> Stopped`. Closes the editor first if it is open.
    pub fn stop(&self) -> Result<()> {
        let mut state = self.state.lock();
        Self::stop_locked(&mut state, &self.registration)
    }

    fn stop_locked(state: &mut PluginState, registration: &Registration) -> Result<()> {
        state.transition(LifecycleState::Stopped)?;
        Self::close_editor_locked(state, registration);
        unsafe {
            state.dispatch(effect_op::STOP_PROCESS, 0, 0, ptr::null_mut(), 0.0);
            state.dispatch(effect_op::MAINS_CHANGED, 0, 0, ptr::null_mut(), 0.0);
        }
        Ok(())
    }

    /// `Opened | Stopped -> Closed`. Closes the editor first if it is open.
    pub fn close(&self) -> Result<()> {
        let mut state = self.state.lock();
        Self::close_locked(&mut state, &self.registration)
    }

    fn close_locked(state: &mut PluginState, registration: &Registration) -> Result<()> {
        let from = state.lifecycle;
        state.transition(LifecycleState::Closed)?;
        Self::close_editor_locked(state, registration);
        unsafe {
            if from == LifecycleState::Opened {
                state.dispatch(effect_op::MAINS_CHANGED, 0, 0, ptr::null_mut(), 0.0);
            }
            state.dispatch(effect_op::CLOSE, 0, 0, ptr::null_mut(), 0.0);
        }
        // The plugin frees its effect on close.
        state.effect = ptr::null_mut();
        Ok(())
    }

    /// Orderly teardown from any state: editor, stop-process, mains off, close.
    ///
    /// Ends in `Unloaded`; the module is unmapped when the instance is dropped.
    pub fn shutdown(&self) {
        let mut state = self.state.lock();
        match state.lifecycle {
            LifecycleState::Unloaded => return,
            LifecycleState::Running => {
                if let Err(e) = Self::stop_locked(&mut state, &self.registration) {
                    tracing::warn!("plugin shutdown: {e}");
                    return;
                }
            }
            LifecycleState::Opened | LifecycleState::Stopped | LifecycleState::Closed => {}
        }
        if state.lifecycle != LifecycleState::Closed {
            if let Err(e) = Self::close_locked(&mut state, &self.registration) {
                tracing::warn!("plugin shutdown: {e}");
                return;
            }
            tracing::info!(plugin = %self.info.name, "plugin closed");
        }
        if let Err(e) = state.transition(LifecycleState::Unloaded) {
            tracing::warn!("plugin shutdown: {e}");
        }
    }

    /// Run one render cycle of `frames` samples.
    ///
    /// Pending events are delivered as one batch before `processReplacing`. The
    /// returned block keeps the plugin locked until it is dropped.
    pub fn render(&self, frames: usize) -> Result<RenderedBlock<'_>> {
        if frames > self.block_size {
            return Err(HostError::BlockSizeExceeded {
                requested: frames,
                block_size: self.block_size,
            });
        }

        let mut guard = self.state.lock();
        if guard.lifecycle != LifecycleState::Running {
            return Err(HostError::InvalidState {
                from: guard.lifecycle,
                to: LifecycleState::Running,
            });
        }

        let state = &mut *guard;
        if state.batch.fill_from(&self.events) > 0 {
            let batch = state.batch.as_vst_events() as *mut c_void;
            unsafe { dispatch(state.effect, effect_op::PROCESS_EVENTS, 0, 0, batch, 0.0) };
        }

        for (slot, buf) in state.input_ptrs.iter_mut().zip(state.inputs.iter_mut()) {
            buf[..frames].fill(0.0);
            *slot = buf.as_mut_ptr();
        }
        for (slot, buf) in state.output_ptrs.iter_mut().zip(state.outputs.iter_mut()) {
            buf[..frames].fill(0.0);
            *slot = buf.as_mut_ptr();
        }

        // SAFETY: running effect; channel pointers address `block_size` floats each.
        unsafe {
            if let Some(process) = (*state.effect).process_replacing {
                process(
                    state.effect,
                    state.input_ptrs.as_mut_ptr(),
                    state.output_ptrs.as_mut_ptr(),
                    frames as i32,
                );
            }
        }

        Ok(RenderedBlock { guard, frames })
    }

    /// Select program `index` (`effSetProgram`).
    pub fn set_program(&self, index: usize) -> Result<()> {
        let count = self.info.programs.len();
        if index >= count {
            return Err(HostError::InvalidProgram { index, count });
        }
        let state = self.live_state()?;
        unsafe { state.dispatch(effect_op::SET_PROGRAM, 0, index as isize, ptr::null_mut(), 0.0) };
        tracing::debug!(index, name = %self.info.programs[index], "program selected");
        Ok(())
    }

    /// Current program (`effGetProgram`).
    pub fn program(&self) -> Result<usize> {
        let state = self.live_state()?;
        let index = unsafe { state.dispatch(effect_op::GET_PROGRAM, 0, 0, ptr::null_mut(), 0.0) };
        Ok(index.max(0) as usize)
    }

    /// Open the plugin editor inside `window`, sized to the plugin's rect.
    ///
    /// Only while `Opened` or `Running`. Control thread only.
    pub fn open_editor(&self, window: Arc<dyn EditorWindow>) -> Result<(u32, u32)> {
        if !self.has_editor() {
            return Err(HostError::NoEditor);
        }
        let mut state = self.live_state()?;
        if state.lifecycle == LifecycleState::Stopped {
            return Err(HostError::EditorError("plugin is stopped".into()));
        }
        if state.editor.is_open() {
            return Err(HostError::EditorError("editor already open".into()));
        }

        // Size requests made while opening must already be accepted.
        self.registration.dispatcher().attach_window(Arc::clone(&window));
        let mut rect: *mut ERect = ptr::null_mut();
        unsafe {
            state.dispatch(effect_op::EDIT_OPEN, 0, 0, window.native_handle(), 0.0);
            state.dispatch(
                effect_op::EDIT_GET_RECT,
                0,
                0,
                &mut rect as *mut *mut ERect as *mut c_void,
                0.0,
            );
        }

        if rect.is_null() {
            unsafe { state.dispatch(effect_op::EDIT_CLOSE, 0, 0, ptr::null_mut(), 0.0) };
            self.registration.dispatcher().detach_window();
            return Err(HostError::EditorError("plugin reported no editor rect".into()));
        }

        // SAFETY: the plugin owns the rect and keeps it alive while the editor is open.
        let (width, height) = unsafe { ((*rect).width(), (*rect).height()) };
        // The rect already reflects anything requested while opening.
        self.registration.dispatcher().clear_size_request();
        window.resize(width, height);
        window.show();

        state.window = Some(window);
        state.editor = EditorState::Open { width, height };
        tracing::debug!(width, height, "editor opened");
        Ok((width, height))
    }

    pub fn close_editor(&self) {
        let mut state = self.state.lock();
        Self::close_editor_locked(&mut state, &self.registration);
    }

    fn close_editor_locked(state: &mut PluginState, registration: &Registration) {
        if !state.editor.is_open() || state.effect.is_null() {
            return;
        }
        unsafe { state.dispatch(effect_op::EDIT_CLOSE, 0, 0, ptr::null_mut(), 0.0) };
        registration.dispatcher().detach_window();
        state.window = None;
        state.editor = EditorState::Closed;
        tracing::debug!("editor closed");
    }

    /// Give an open editor time to repaint and apply any size it asked for.
    /// Control thread only.
    pub fn editor_idle(&self) {
        let mut state = self.state.lock();
        if !state.editor.is_open() || state.effect.is_null() {
            return;
        }
        unsafe { state.dispatch(effect_op::EDIT_IDLE, 0, 0, ptr::null_mut(), 0.0) };
        if let Some((width, height)) = self.registration.dispatcher().apply_size_request() {
            state.editor = EditorState::Open { width, height };
            tracing::debug!(width, height, "editor resized");
        }
    }

    fn live_state(&self) -> Result<MutexGuard<'_, PluginState>> {
        let state = self.state.lock();
        match state.lifecycle {
            LifecycleState::Opened | LifecycleState::Running | LifecycleState::Stopped => Ok(state),
            from => Err(HostError::InvalidState {
                from,
                to: LifecycleState::Running,
            }),
        }
    }
}

impl Drop for PluginInstance {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for PluginInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginInstance")
            .field("name", &self.info.name)
            .field("module", &self.module)
            .field("block_size", &self.block_size)
            .finish()
    }
}

/// Output of one render cycle. Holds the plugin lock until dropped.
pub struct RenderedBlock<'a> {
    guard: MutexGuard<'a, PluginState>,
    frames: usize,
}

impl<'a> RenderedBlock<'a> {
    pub fn frames(&self) -> usize {
        self.frames
    }

    pub fn num_channels(&self) -> usize {
        self.guard.outputs.len()
    }

    pub fn channel(&self, index: usize) -> Option<&[f32]> {
        self.guard.outputs.get(index).map(|c| &c[..self.frames])
    }

    pub fn channels(&self) -> impl Iterator<Item = &[f32]> + '_ {
        self.guard.outputs.iter().map(move |c| &c[..self.frames])
    }
}

/// Read the name, identity, program list and flags of a freshly opened effect.
unsafe fn read_info(effect: *mut AEffect) -> PluginInfo {
    let e = &*effect;
    let name = dispatch_string(effect, effect_op::GET_EFFECT_NAME, 0).unwrap_or_default();
    let vendor = dispatch_string(effect, effect_op::GET_VENDOR_STRING, 0).unwrap_or_default();
    let product = dispatch_string(effect, effect_op::GET_PRODUCT_STRING, 0).unwrap_or_default();

    let programs = (0..e.num_programs.max(0))
        .map(|i| {
            dispatch_string(effect, effect_op::GET_PROGRAM_NAME_INDEXED, i)
                .unwrap_or_else(|| UNKNOWN_PROGRAM.to_string())
        })
        .collect();

    PluginInfo::new(name)
        .vendor(vendor)
        .product(product)
        .unique_id(e.unique_id)
        .version(e.version)
        .audio_io(e.num_inputs.max(0) as usize, e.num_outputs.max(0) as usize)
        .programs(programs)
        .capabilities(PluginCapabilities::from_flags(e.flags))
}
