//! Recording mock plugin speaking the raw VST2 ABI.
//!
//! A test describes the plugin with [`MockConfig`], then loads it through
//! [`MockConfig::module`]. The config is handed to the entry point through a
//! thread-local, so the load must happen on the same thread.

use std::cell::RefCell;
use std::ffi::c_void;
use std::ptr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::abi::{
    self, effect_op, flags, host_op, AEffect, ERect, HostCallbackProc, VstEventsHeader,
    VstMidiEvent, VstTimeInfo,
};
use crate::dispatcher::host_callback;
use crate::editor::EditorWindow;
use crate::events::MidiEvent;
use crate::module::PluginModule;

/// One observed plugin call.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    /// Entry point ran; answers the host gave before attachment.
    Entry { version: isize, sample_rate: isize },
    Dispatch {
        opcode: i32,
        index: i32,
        value: isize,
        opt: f32,
    },
    /// `effProcessEvents`, decoded.
    Events(Vec<MidiEvent>),
    /// `processReplacing`, with what the host reported from inside it.
    Process {
        frames: usize,
        host_block_size: isize,
        host_tempo: f64,
    },
}

#[derive(Clone)]
pub struct MockConfig {
    magic: i32,
    flags: i32,
    inputs: i32,
    outputs: i32,
    name: Option<String>,
    programs: Vec<Option<String>>,
    editor_rect: Option<ERect>,
    null_effect: bool,
    level: f32,
}

#[derive(Default)]
struct Shared {
    calls: Mutex<Vec<Call>>,
    effect: AtomicUsize,
    editor_parent: AtomicUsize,
}

/// Test-side view of a mock's recorded calls.
#[derive(Clone)]
pub struct MockHandle {
    shared: Arc<Shared>,
}

#[repr(C)]
struct MockPlugin {
    effect: AEffect,
    host: HostCallbackProc,
    config: MockConfig,
    shared: Arc<Shared>,
    program: isize,
    rect: ERect,
}

thread_local! {
    static NEXT_MOCK: RefCell<Option<(MockConfig, Arc<Shared>)>> = const { RefCell::new(None) };
}

impl MockConfig {
    /// Two-output instrument with two named programs and no editor.
    pub fn synth() -> Self {
        Self {
            magic: abi::VST_MAGIC,
            flags: flags::IS_SYNTH | flags::CAN_REPLACING,
            inputs: 0,
            outputs: 2,
            name: Some("Mock Synth".into()),
            programs: vec![Some("Init".into()), Some("Bass".into())],
            editor_rect: None,
            null_effect: false,
            level: 0.0,
        }
    }

    pub fn name(mut self, name: &str) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn no_name(mut self) -> Self {
        self.name = None;
        self
    }

    pub fn programs(mut self, programs: &[Option<&str>]) -> Self {
        self.programs = programs.iter().map(|p| p.map(str::to_string)).collect();
        self
    }

    pub fn flags(mut self, flags: i32) -> Self {
        self.flags = flags;
        self
    }

    pub fn magic(mut self, magic: i32) -> Self {
        self.magic = magic;
        self
    }

    pub fn null_effect(mut self) -> Self {
        self.null_effect = true;
        self
    }

    /// Channel `c` renders the constant `level * (c + 1)`.
    pub fn level(mut self, level: f32) -> Self {
        self.level = level;
        self
    }

    pub fn editor(mut self, width: i16, height: i16) -> Self {
        self.flags |= flags::HAS_EDITOR;
        self.editor_rect = Some(ERect {
            top: 0,
            left: 0,
            bottom: height,
            right: width,
        });
        self
    }

    /// Arm the next entry call on this thread and wrap it as a module.
    pub fn module(self) -> (PluginModule, MockHandle) {
        let shared = Arc::new(Shared::default());
        NEXT_MOCK.with(|next| *next.borrow_mut() = Some((self, Arc::clone(&shared))));
        (
            PluginModule::from_entry("/mock/plugins/mock-synth", mock_entry),
            MockHandle { shared },
        )
    }
}

impl MockHandle {
    pub fn calls(&self) -> Vec<Call> {
        self.shared.calls.lock().clone()
    }

    /// Dispatcher opcodes in call order; event deliveries count as `effProcessEvents`.
    pub fn dispatched(&self) -> Vec<i32> {
        self.calls()
            .iter()
            .filter_map(|call| match call {
                Call::Dispatch { opcode, .. } => Some(*opcode),
                Call::Events(_) => Some(effect_op::PROCESS_EVENTS),
                _ => None,
            })
            .collect()
    }

    /// Opcodes dispatched after the last `opcode`.
    pub fn dispatched_after(&self, opcode: i32) -> Vec<i32> {
        let all = self.dispatched();
        match all.iter().rposition(|&op| op == opcode) {
            Some(pos) => all[pos + 1..].to_vec(),
            None => Vec::new(),
        }
    }

    /// Every call recorded after the last dispatch of `opcode`.
    pub fn calls_after(&self, opcode: i32) -> Vec<Call> {
        let all = self.calls();
        let pos = all
            .iter()
            .rposition(|call| matches!(call, Call::Dispatch { opcode: op, .. } if *op == opcode));
        match pos {
            Some(pos) => all[pos + 1..].to_vec(),
            None => Vec::new(),
        }
    }

    pub fn event_batches(&self) -> Vec<Vec<MidiEvent>> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Events(events) => Some(events),
                _ => None,
            })
            .collect()
    }

    pub fn process_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, Call::Process { .. }))
            .count()
    }

    pub fn editor_parent(&self) -> Option<usize> {
        match self.shared.editor_parent.load(Ordering::Acquire) {
            0 => None,
            handle => Some(handle),
        }
    }

    /// Ask the host to resize the editor, as the plugin would. The plugin must be open.
    pub fn request_size(&self, width: i32, height: isize) -> isize {
        self.host_call(host_op::SIZE_WINDOW, width, height)
    }

    /// Issue a parameterless host query through the plugin's effect.
    pub fn host_query(&self, opcode: i32) -> isize {
        self.host_call(opcode, 0, 0)
    }

    fn host_call(&self, opcode: i32, index: i32, value: isize) -> isize {
        let effect = self.shared.effect.load(Ordering::Acquire) as *mut AEffect;
        host_callback(effect, opcode, index, value, ptr::null_mut(), 0.0)
    }
}

unsafe extern "C" fn mock_entry(host: HostCallbackProc) -> *mut AEffect {
    let (config, shared) = NEXT_MOCK
        .with(|next| next.borrow_mut().take())
        .unwrap_or_else(|| (MockConfig::synth(), Arc::new(Shared::default())));

    let version = host(ptr::null_mut(), host_op::VERSION, 0, 0, ptr::null_mut(), 0.0);
    let sample_rate = host(ptr::null_mut(), host_op::GET_SAMPLE_RATE, 0, 0, ptr::null_mut(), 0.0);
    shared.calls.lock().push(Call::Entry {
        version,
        sample_rate,
    });

    if config.null_effect {
        return ptr::null_mut();
    }

    let mut effect: AEffect = std::mem::zeroed();
    effect.magic = config.magic;
    effect.dispatcher = Some(mock_dispatcher);
    effect.num_programs = config.programs.len() as i32;
    effect.num_inputs = config.inputs;
    effect.num_outputs = config.outputs;
    effect.flags = config.flags;
    effect.unique_id = i32::from_be_bytes(*b"Mock");
    effect.version = 1;
    effect.process_replacing = Some(mock_process);

    let plugin = Box::new(MockPlugin {
        effect,
        host,
        config,
        shared,
        program: 0,
        rect: ERect::default(),
    });
    let raw = Box::into_raw(plugin);
    (*raw).effect.object = raw as *mut c_void;
    (&(*raw).shared)
        .effect
        .store(raw as usize, Ordering::Release);
    raw as *mut AEffect
}

unsafe extern "C" fn mock_dispatcher(
    effect: *mut AEffect,
    opcode: i32,
    index: i32,
    value: isize,
    ptr: *mut c_void,
    opt: f32,
) -> isize {
    let plugin = &mut *(effect as *mut MockPlugin);

    if opcode == effect_op::PROCESS_EVENTS {
        let header = ptr as *const VstEventsHeader;
        let first = ptr::addr_of!((*header).events) as *const *mut abi::VstEvent;
        let events = (0..(*header).num_events as usize)
            .filter_map(|i| MidiEvent::from_vst(&*(*first.add(i) as *const VstMidiEvent)))
            .collect();
        plugin.shared.calls.lock().push(Call::Events(events));
        return 1;
    }

    plugin.shared.calls.lock().push(Call::Dispatch {
        opcode,
        index,
        value,
        opt,
    });

    match opcode {
        effect_op::CLOSE => {
            plugin.shared.effect.store(0, Ordering::Release);
            drop(Box::from_raw(effect as *mut MockPlugin));
            1
        }
        effect_op::GET_EFFECT_NAME => match &plugin.config.name {
            Some(name) => {
                abi::copy_c_string(name, ptr as *mut u8, abi::MAX_EFFECT_NAME_LEN);
                1
            }
            None => 0,
        },
        effect_op::GET_VENDOR_STRING => {
            abi::copy_c_string("Mock Audio", ptr as *mut u8, abi::MAX_VENDOR_STR_LEN);
            1
        }
        effect_op::GET_PRODUCT_STRING => {
            abi::copy_c_string("Mock Product", ptr as *mut u8, abi::MAX_PRODUCT_STR_LEN);
            1
        }
        effect_op::GET_PROGRAM_NAME_INDEXED => {
            match plugin.config.programs.get(index as usize).cloned().flatten() {
                Some(name) => {
                    abi::copy_c_string(&name, ptr as *mut u8, abi::MAX_PROG_NAME_LEN);
                    1
                }
                None => 0,
            }
        }
        effect_op::SET_PROGRAM => {
            plugin.program = value;
            0
        }
        effect_op::GET_PROGRAM => plugin.program,
        effect_op::EDIT_OPEN => {
            plugin
                .shared
                .editor_parent
                .store(ptr as usize, Ordering::Release);
            1
        }
        effect_op::EDIT_GET_RECT => match plugin.config.editor_rect {
            Some(rect) => {
                plugin.rect = rect;
                *(ptr as *mut *mut ERect) = &mut plugin.rect;
                1
            }
            None => 0,
        },
        _ => 0,
    }
}

unsafe extern "C" fn mock_process(
    effect: *mut AEffect,
    _inputs: *mut *mut f32,
    outputs: *mut *mut f32,
    frames: i32,
) {
    let plugin = &mut *(effect as *mut MockPlugin);
    let host_block_size = (plugin.host)(effect, host_op::GET_BLOCK_SIZE, 0, 0, ptr::null_mut(), 0.0);
    let time = (plugin.host)(effect, host_op::GET_TIME, 0, 0, ptr::null_mut(), 0.0) as *const VstTimeInfo;
    let host_tempo = if time.is_null() { 0.0 } else { (*time).tempo };

    for channel in 0..plugin.effect.num_outputs as usize {
        let out = std::slice::from_raw_parts_mut(*outputs.add(channel), frames as usize);
        out.fill(plugin.config.level * (channel + 1) as f32);
    }

    plugin.shared.calls.lock().push(Call::Process {
        frames: frames as usize,
        host_block_size,
        host_tempo,
    });
}

/// Editor window that records what the host asks of it.
#[derive(Default)]
pub struct RecordingWindow {
    sizes: Mutex<Vec<(u32, u32)>>,
    shown: AtomicUsize,
}

impl RecordingWindow {
    pub const HANDLE: usize = 0xBEEF;

    pub fn sizes(&self) -> Vec<(u32, u32)> {
        self.sizes.lock().clone()
    }

    pub fn shown(&self) -> usize {
        self.shown.load(Ordering::Acquire)
    }
}

impl EditorWindow for RecordingWindow {
    fn native_handle(&self) -> *mut c_void {
        Self::HANDLE as *mut c_void
    }

    fn resize(&self, width: u32, height: u32) {
        self.sizes.lock().push((width, height));
    }

    fn show(&self) {
        self.shown.fetch_add(1, Ordering::AcqRel);
    }
}
