//! Raw VST 2.4 binary interface.
//!
//! Layouts and constants mirror `aeffect.h` / `aeffectx.h`. Nothing here is safe to use
//! directly; `PluginInstance` is the only consumer of the effect pointer.

use std::ffi::c_void;

/// `'VstP'`
pub const VST_MAGIC: i32 = 0x5673_7450;

/// Host protocol version reported to plugins (2.4).
pub const VST_VERSION: isize = 2400;

pub const MAX_PROG_NAME_LEN: usize = 24;
pub const MAX_EFFECT_NAME_LEN: usize = 32;
pub const MAX_VENDOR_STR_LEN: usize = 64;
pub const MAX_PRODUCT_STR_LEN: usize = 64;

/// Plugin -> host callback.
pub type HostCallbackProc = extern "C" fn(
    effect: *mut AEffect,
    opcode: i32,
    index: i32,
    value: isize,
    ptr: *mut c_void,
    opt: f32,
) -> isize;

/// Module entry point (`VSTPluginMain` / `main`).
pub type PluginMain = unsafe extern "C" fn(callback: HostCallbackProc) -> *mut AEffect;

pub type DispatcherProc = unsafe extern "C" fn(
    effect: *mut AEffect,
    opcode: i32,
    index: i32,
    value: isize,
    ptr: *mut c_void,
    opt: f32,
) -> isize;

pub type ProcessProc =
    unsafe extern "C" fn(effect: *mut AEffect, inputs: *mut *mut f32, outputs: *mut *mut f32, frames: i32);

pub type ProcessF64Proc =
    unsafe extern "C" fn(effect: *mut AEffect, inputs: *mut *mut f64, outputs: *mut *mut f64, frames: i32);

pub type SetParameterProc = unsafe extern "C" fn(effect: *mut AEffect, index: i32, value: f32);

pub type GetParameterProc = unsafe extern "C" fn(effect: *mut AEffect, index: i32) -> f32;

/// The plugin's C-side object.
#[repr(C)]
pub struct AEffect {
    pub magic: i32,
    pub dispatcher: Option<DispatcherProc>,
    /// Deprecated accumulating process.
    pub process: Option<ProcessProc>,
    pub set_parameter: Option<SetParameterProc>,
    pub get_parameter: Option<GetParameterProc>,
    pub num_programs: i32,
    pub num_params: i32,
    pub num_inputs: i32,
    pub num_outputs: i32,
    pub flags: i32,
    /// Reserved for the host. Holds the dispatcher token.
    pub reserved1: isize,
    pub reserved2: isize,
    pub initial_delay: i32,
    pub real_qualities: i32,
    pub off_qualities: i32,
    pub io_ratio: f32,
    /// Plugin-side object pointer.
    pub object: *mut c_void,
    pub user: *mut c_void,
    pub unique_id: i32,
    pub version: i32,
    pub process_replacing: Option<ProcessProc>,
    pub process_replacing_f64: Option<ProcessF64Proc>,
    pub future: [u8; 56],
}

/// Static plugin flags (`effFlags*`).
pub mod flags {
    pub const HAS_EDITOR: i32 = 1 << 0;
    pub const CAN_REPLACING: i32 = 1 << 4;
    pub const PROGRAM_CHUNKS: i32 = 1 << 5;
    pub const IS_SYNTH: i32 = 1 << 8;
    pub const NO_SOUND_IN_STOP: i32 = 1 << 9;
    pub const CAN_DOUBLE_REPLACING: i32 = 1 << 12;
}

/// Host -> plugin opcodes (`eff*`).
pub mod effect_op {
    pub const OPEN: i32 = 0;
    pub const CLOSE: i32 = 1;
    pub const SET_PROGRAM: i32 = 2;
    pub const GET_PROGRAM: i32 = 3;
    pub const GET_PROGRAM_NAME: i32 = 5;
    pub const SET_SAMPLE_RATE: i32 = 10;
    pub const SET_BLOCK_SIZE: i32 = 11;
    pub const MAINS_CHANGED: i32 = 12;
    pub const EDIT_GET_RECT: i32 = 13;
    pub const EDIT_OPEN: i32 = 14;
    pub const EDIT_CLOSE: i32 = 15;
    pub const EDIT_IDLE: i32 = 19;
    pub const PROCESS_EVENTS: i32 = 25;
    pub const GET_PROGRAM_NAME_INDEXED: i32 = 29;
    pub const GET_EFFECT_NAME: i32 = 45;
    pub const GET_VENDOR_STRING: i32 = 47;
    pub const GET_PRODUCT_STRING: i32 = 48;
    pub const GET_VENDOR_VERSION: i32 = 49;
    pub const CAN_DO: i32 = 51;
    pub const GET_VST_VERSION: i32 = 58;
    pub const START_PROCESS: i32 = 71;
    pub const STOP_PROCESS: i32 = 72;
    pub const SET_PROCESS_PRECISION: i32 = 77;
}

/// Plugin -> host opcodes (`audioMaster*`).
pub mod host_op {
    pub const AUTOMATE: i32 = 0;
    pub const VERSION: i32 = 1;
    pub const CURRENT_ID: i32 = 2;
    pub const IDLE: i32 = 3;
    pub const WANT_MIDI: i32 = 6;
    pub const GET_TIME: i32 = 7;
    pub const PROCESS_EVENTS: i32 = 8;
    pub const IO_CHANGED: i32 = 13;
    pub const SIZE_WINDOW: i32 = 15;
    pub const GET_SAMPLE_RATE: i32 = 16;
    pub const GET_BLOCK_SIZE: i32 = 17;
    pub const GET_INPUT_LATENCY: i32 = 18;
    pub const GET_OUTPUT_LATENCY: i32 = 19;
    pub const GET_CURRENT_PROCESS_LEVEL: i32 = 23;
    pub const GET_AUTOMATION_STATE: i32 = 24;
    pub const OFFLINE_START: i32 = 25;
    pub const OFFLINE_READ: i32 = 26;
    pub const OFFLINE_WRITE: i32 = 27;
    pub const OFFLINE_GET_CURRENT_PASS: i32 = 28;
    pub const OFFLINE_GET_CURRENT_META_PASS: i32 = 29;
    pub const GET_VENDOR_STRING: i32 = 32;
    pub const GET_PRODUCT_STRING: i32 = 33;
    pub const GET_VENDOR_VERSION: i32 = 34;
    pub const VENDOR_SPECIFIC: i32 = 35;
    pub const CAN_DO: i32 = 37;
    pub const GET_LANGUAGE: i32 = 38;
    pub const GET_DIRECTORY: i32 = 41;
    pub const UPDATE_DISPLAY: i32 = 42;
    pub const BEGIN_EDIT: i32 = 43;
    pub const END_EDIT: i32 = 44;
    pub const OPEN_FILE_SELECTOR: i32 = 45;
    pub const CLOSE_FILE_SELECTOR: i32 = 46;
}

pub const PROCESS_PRECISION_32: isize = 0;
pub const PROCESS_LEVEL_UNKNOWN: isize = 0;
pub const AUTOMATION_OFF: isize = 1;
pub const LANG_ENGLISH: isize = 1;

pub const MIDI_TYPE: i32 = 1;
pub const MIDI_EVENT_IS_REALTIME: i32 = 1;

/// `VstTimeInfo` flag bits.
pub mod time_flags {
    pub const TRANSPORT_CHANGED: i32 = 1 << 0;
    pub const TRANSPORT_PLAYING: i32 = 1 << 1;
    pub const NANOS_VALID: i32 = 1 << 8;
    pub const PPQ_POS_VALID: i32 = 1 << 9;
    pub const TEMPO_VALID: i32 = 1 << 10;
    pub const BARS_VALID: i32 = 1 << 11;
    pub const TIME_SIG_VALID: i32 = 1 << 13;
}

pub const SMPTE_24FPS: i32 = 0;

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct VstTimeInfo {
    pub sample_pos: f64,
    pub sample_rate: f64,
    pub nano_seconds: f64,
    pub ppq_pos: f64,
    pub tempo: f64,
    pub bar_start_pos: f64,
    pub cycle_start_pos: f64,
    pub cycle_end_pos: f64,
    pub time_sig_numerator: i32,
    pub time_sig_denominator: i32,
    pub smpte_offset: i32,
    pub smpte_frame_rate: i32,
    pub samples_to_next_clock: i32,
    pub flags: i32,
}

/// Generic event header; every concrete event starts with these fields.
#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct VstEvent {
    pub event_type: i32,
    pub byte_size: i32,
    pub delta_frames: i32,
    pub flags: i32,
    pub data: [u8; 16],
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct VstMidiEvent {
    pub event_type: i32,
    pub byte_size: i32,
    pub delta_frames: i32,
    pub flags: i32,
    pub note_length: i32,
    pub note_offset: i32,
    pub midi_data: [u8; 4],
    pub detune: i8,
    pub note_off_velocity: u8,
    pub reserved1: u8,
    pub reserved2: u8,
}

/// `VstEvents` with a caller-chosen pointer array length.
///
/// The SDK declares `events[2]` as a variable-length tail; any `N` shares the prefix
/// layout, so a pointer to this struct can be passed where `VstEvents*` is expected.
#[repr(C)]
pub struct VstEvents<const N: usize> {
    pub num_events: i32,
    pub reserved: isize,
    pub events: [*mut VstEvent; N],
}

/// The prefix every plugin reads.
pub type VstEventsHeader = VstEvents<2>;

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ERect {
    pub top: i16,
    pub left: i16,
    pub bottom: i16,
    pub right: i16,
}

impl ERect {
    pub fn width(&self) -> u32 {
        (i32::from(self.right) - i32::from(self.left)).max(0) as u32
    }

    pub fn height(&self) -> u32 {
        (i32::from(self.bottom) - i32::from(self.top)).max(0) as u32
    }
}

/// Copy `src` into a NUL-terminated C buffer of `capacity` bytes, truncating if needed.
///
/// Returns the number of bytes written excluding the terminator.
///
/// # Safety
/// `dst` must be valid for writes of `capacity` bytes.
pub unsafe fn copy_c_string(src: &str, dst: *mut u8, capacity: usize) -> usize {
    if dst.is_null() || capacity == 0 {
        return 0;
    }
    let len = src.len().min(capacity - 1);
    std::ptr::copy_nonoverlapping(src.as_ptr(), dst, len);
    *dst.add(len) = 0;
    len
}

/// Read a NUL-terminated string the plugin wrote into `buf`.
pub fn read_c_string(buf: &[u8]) -> String {
    let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    String::from_utf8_lossy(&buf[..end]).into_owned()
}
