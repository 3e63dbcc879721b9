//! Plugin -> host callback dispatch.
//!
//! Plugins call [`host_callback`] synchronously from whatever thread they like,
//! including from inside `processReplacing`. The callback resolves the calling
//! instance through a token the host writes into the effect's host-reserved field
//! and a fixed-size table of per-instance dispatchers. Resolution and every
//! opcode handler are lock-free and allocation-free.

use std::cell::Cell;
use std::ffi::{c_char, c_void, CStr, CString};
use std::path::Path;
use std::ptr;
use std::sync::atomic::{AtomicPtr, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use arc_swap::ArcSwapOption;

use crate::abi::{
    self, host_op, time_flags, AEffect, VstTimeInfo, MAX_PRODUCT_STR_LEN, MAX_VENDOR_STR_LEN,
};
use crate::editor::EditorWindow;
use crate::error::{HostError, Result};

/// Capacity of the token table.
pub const MAX_INSTANCES: usize = 64;

/// Capabilities answered with 1 by the can-do query; everything else is 0.
pub const HOST_CAN_DO: [&str; 5] = [
    "sendVstEvents",
    "sendVstMidiEvents",
    "sizeWindow",
    "startStopProcess",
    "sendVstMidiEventFlagIsRealtime",
];

const VENDOR_VERSION: isize = 1;

const EMPTY_SLOT: AtomicPtr<HostDispatcher> = AtomicPtr::new(ptr::null_mut());

static SLOTS: [AtomicPtr<HostDispatcher>; MAX_INSTANCES] = [EMPTY_SLOT; MAX_INSTANCES];

const EMPTY_TIME_INFO: VstTimeInfo = VstTimeInfo {
    sample_pos: 0.0,
    sample_rate: 0.0,
    nano_seconds: 0.0,
    ppq_pos: 0.0,
    tempo: 0.0,
    bar_start_pos: 0.0,
    cycle_start_pos: 0.0,
    cycle_end_pos: 0.0,
    time_sig_numerator: 0,
    time_sig_denominator: 0,
    smpte_offset: 0,
    smpte_frame_rate: 0,
    samples_to_next_clock: 0,
    flags: 0,
};

thread_local! {
    // Storage behind the pointer returned from get-time. Valid until the next
    // get-time on the same thread.
    static TIME_INFO: Cell<VstTimeInfo> = const { Cell::new(EMPTY_TIME_INFO) };
}

/// Constant transport answered to get-time.
pub const TEMPO_BPM: f64 = 120.0;
pub const TIME_SIG: (i32, i32) = (4, 4);

/// Host-side answers for one plugin instance.
///
/// Every field except the editor window is fixed at construction, so the render
/// thread can read them without synchronization.
pub struct HostDispatcher {
    sample_rate: f32,
    block_size: usize,
    vendor: String,
    product: String,
    directory: CString,
    epoch: Instant,
    window: ArcSwapOption<WindowSlot>,
}

struct WindowSlot {
    window: Arc<dyn EditorWindow>,
    // Latest size request, `width << 32 | height`, or `NO_SIZE_REQUEST`.
    requested: AtomicU64,
}

const NO_SIZE_REQUEST: u64 = u64::MAX;

/// Identity strings the host reports about itself.
#[derive(Debug, Clone)]
pub struct HostIdentity {
    pub vendor: String,
    pub product: String,
}

impl Default for HostIdentity {
    fn default() -> Self {
        Self {
            vendor: "solo".to_string(),
            product: "Solo Host".to_string(),
        }
    }
}

impl HostDispatcher {
    pub fn new(
        sample_rate: f32,
        block_size: usize,
        identity: HostIdentity,
        plugin_directory: &Path,
    ) -> Self {
        // Interior NULs cannot be represented; fall back to an empty directory.
        let directory =
            CString::new(plugin_directory.to_string_lossy().into_owned()).unwrap_or_default();
        Self {
            sample_rate,
            block_size,
            vendor: identity.vendor,
            product: identity.product,
            directory,
            epoch: Instant::now(),
            window: ArcSwapOption::empty(),
        }
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Accept size-window requests for `window` until [`detach_window`](Self::detach_window).
    ///
    /// Requests are only recorded here; [`apply_size_request`](Self::apply_size_request)
    /// resizes the window on the control thread.
    pub fn attach_window(&self, window: Arc<dyn EditorWindow>) {
        self.window.store(Some(Arc::new(WindowSlot {
            window,
            requested: AtomicU64::new(NO_SIZE_REQUEST),
        })));
    }

    /// Detach the window, discarding any unapplied request.
    pub fn detach_window(&self) {
        self.window.store(None);
    }

    /// Resize the attached window to the latest requested size, if any. Control thread only.
    pub fn apply_size_request(&self) -> Option<(u32, u32)> {
        let guard = self.window.load();
        let slot = (*guard).as_ref()?;
        let packed = slot.requested.swap(NO_SIZE_REQUEST, Ordering::AcqRel);
        if packed == NO_SIZE_REQUEST {
            return None;
        }
        let (width, height) = ((packed >> 32) as u32, packed as u32);
        slot.window.resize(width, height);
        Some((width, height))
    }

    /// Drop an unapplied size request.
    pub fn clear_size_request(&self) {
        if let Some(slot) = &*self.window.load() {
            slot.requested.store(NO_SIZE_REQUEST, Ordering::Release);
        }
    }

    /// Answer one plugin -> host call for an attached effect.
    pub fn handle(
        &self,
        effect: *mut AEffect,
        opcode: i32,
        index: i32,
        value: isize,
        ptr: *mut c_void,
        _opt: f32,
    ) -> isize {
        match opcode {
            host_op::VERSION => abi::VST_VERSION,
            host_op::CURRENT_ID => {
                if effect.is_null() {
                    0
                } else {
                    // SAFETY: non-null effect pointers come from the plugin itself.
                    unsafe { (*effect).unique_id as isize }
                }
            }
            host_op::GET_TIME => self.time_info() as isize,
            host_op::SIZE_WINDOW => self.size_window(index, value),
            host_op::GET_SAMPLE_RATE => self.sample_rate as isize,
            host_op::GET_BLOCK_SIZE => self.block_size as isize,
            host_op::GET_INPUT_LATENCY | host_op::GET_OUTPUT_LATENCY => 0,
            host_op::GET_CURRENT_PROCESS_LEVEL => abi::PROCESS_LEVEL_UNKNOWN,
            host_op::GET_AUTOMATION_STATE => abi::AUTOMATION_OFF,
            host_op::GET_VENDOR_STRING => {
                // SAFETY: the ABI documents a caller buffer of at least 64 bytes.
                unsafe { copy_identity(&self.vendor, ptr, MAX_VENDOR_STR_LEN) }
            }
            host_op::GET_PRODUCT_STRING => {
                // SAFETY: as above.
                unsafe { copy_identity(&self.product, ptr, MAX_PRODUCT_STR_LEN) }
            }
            host_op::GET_VENDOR_VERSION => VENDOR_VERSION,
            host_op::CAN_DO => {
                // SAFETY: can-do passes a NUL-terminated string or null.
                unsafe { can_do(ptr as *const c_char) }
            }
            host_op::GET_LANGUAGE => abi::LANG_ENGLISH,
            host_op::GET_DIRECTORY => self.directory.as_ptr() as isize,
            // Notifications the host accepts and ignores.
            host_op::AUTOMATE
            | host_op::IDLE
            | host_op::WANT_MIDI
            | host_op::PROCESS_EVENTS
            | host_op::IO_CHANGED
            | host_op::UPDATE_DISPLAY
            | host_op::BEGIN_EDIT
            | host_op::END_EDIT
            | host_op::VENDOR_SPECIFIC
            | host_op::OFFLINE_START
            | host_op::OFFLINE_READ
            | host_op::OFFLINE_WRITE
            | host_op::OFFLINE_GET_CURRENT_PASS
            | host_op::OFFLINE_GET_CURRENT_META_PASS
            | host_op::OPEN_FILE_SELECTOR
            | host_op::CLOSE_FILE_SELECTOR => 0,
            _ => 0,
        }
    }

    fn time_info(&self) -> *mut VstTimeInfo {
        let snapshot = VstTimeInfo {
            sample_pos: 0.0,
            sample_rate: self.sample_rate as f64,
            nano_seconds: self.epoch.elapsed().as_nanos() as f64,
            ppq_pos: 0.0,
            tempo: TEMPO_BPM,
            bar_start_pos: 0.0,
            cycle_start_pos: 0.0,
            cycle_end_pos: 0.0,
            time_sig_numerator: TIME_SIG.0,
            time_sig_denominator: TIME_SIG.1,
            smpte_offset: 0,
            smpte_frame_rate: abi::SMPTE_24FPS,
            samples_to_next_clock: 0,
            flags: time_flags::NANOS_VALID
                | time_flags::PPQ_POS_VALID
                | time_flags::TEMPO_VALID
                | time_flags::TIME_SIG_VALID,
        };
        TIME_INFO.with(|cell| {
            cell.set(snapshot);
            cell.as_ptr()
        })
    }

    // Any thread, including the render thread: record only, never touch the window.
    fn size_window(&self, width: i32, height: isize) -> isize {
        let window = self.window.load();
        match &*window {
            Some(slot) => {
                let width = width.max(0) as u64;
                let height = height.clamp(0, u32::MAX as isize) as u64;
                slot.requested.store(width << 32 | height, Ordering::Release);
                1
            }
            None => 0,
        }
    }
}

/// Binds a dispatcher to a table slot for as long as it lives.
///
/// The token is written into the effect's host-reserved field; dropping the
/// registration empties the slot, after which callbacks carrying the token get
/// the pre-attach answers.
pub struct Registration {
    token: usize,
    dispatcher: Arc<HostDispatcher>,
}

impl Registration {
    pub fn register(dispatcher: Arc<HostDispatcher>) -> Result<Self> {
        let raw = Arc::as_ptr(&dispatcher) as *mut HostDispatcher;
        for (slot_index, slot) in SLOTS.iter().enumerate() {
            if slot
                .compare_exchange(ptr::null_mut(), raw, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                tracing::debug!(token = slot_index + 1, "host dispatcher registered");
                return Ok(Self {
                    token: slot_index + 1,
                    dispatcher,
                });
            }
        }
        Err(HostError::TooManyInstances(MAX_INSTANCES))
    }

    /// Opaque non-zero value stored in `AEffect::reserved1`.
    pub fn token(&self) -> usize {
        self.token
    }

    pub fn dispatcher(&self) -> &Arc<HostDispatcher> {
        &self.dispatcher
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        SLOTS[self.token - 1].store(ptr::null_mut(), Ordering::Release);
        tracing::debug!(token = self.token, "host dispatcher released");
    }
}

fn lookup(token: isize) -> Option<&'static HostDispatcher> {
    if token <= 0 || token as usize > MAX_INSTANCES {
        return None;
    }
    let raw = SLOTS[token as usize - 1].load(Ordering::Acquire);
    // SAFETY: a non-null slot points into the Arc held by a live `Registration`.
    // Plugins only call back between open and close, which the registration spans.
    unsafe { raw.as_ref() }
}

/// The callback handed to every plugin entry point.
pub extern "C" fn host_callback(
    effect: *mut AEffect,
    opcode: i32,
    index: i32,
    value: isize,
    ptr: *mut c_void,
    opt: f32,
) -> isize {
    let dispatcher = if effect.is_null() {
        None
    } else {
        // SAFETY: the plugin passes its own effect pointer.
        lookup(unsafe { (*effect).reserved1 })
    };

    match dispatcher {
        Some(dispatcher) => dispatcher.handle(effect, opcode, index, value, ptr, opt),
        // Not attached yet (or already detached): only the version query is answered.
        None if opcode == host_op::VERSION => abi::VST_VERSION,
        None => 0,
    }
}

unsafe fn copy_identity(text: &str, dst: *mut c_void, capacity: usize) -> isize {
    if dst.is_null() {
        return 0;
    }
    abi::copy_c_string(text, dst as *mut u8, capacity);
    1
}

unsafe fn can_do(query: *const c_char) -> isize {
    if query.is_null() {
        return 0;
    }
    let query = CStr::from_ptr(query).to_bytes();
    HOST_CAN_DO
        .iter()
        .any(|capability| capability.as_bytes() == query) as isize
}
