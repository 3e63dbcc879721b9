//! Built-in reference instrument.
//!
//! A small polyphonic oscillator compiled into the host and exposed through the
//! same VST2 ABI as any third-party plugin, so the whole bridge can be exercised
//! without a plugin binary on disk.

use std::f32::consts::TAU;
use std::ffi::c_void;
use std::ptr;

use crate::abi::{self, effect_op, flags, AEffect, HostCallbackProc, VstEventsHeader, VstMidiEvent};
use crate::events::MidiEvent;
use crate::module::PluginModule;

pub const BUILTIN_NAME: &str = "Solo Sine";
pub const BUILTIN_VENDOR: &str = "solo";
pub const BUILTIN_PRODUCT: &str = "Solo Reference Synth";
pub const BUILTIN_UNIQUE_ID: i32 = i32::from_be_bytes(*b"SoSn");

/// Peak level of one voice.
pub const VOICE_GAIN: f32 = 0.2;

const MAX_VOICES: usize = 16;
const NUM_OUTPUTS: i32 = 2;

/// Programs, one per waveform.
pub const PROGRAMS: [&str; 4] = ["Sine", "Square", "Saw", "Triangle"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Waveform {
    Sine,
    Square,
    Saw,
    Triangle,
}

impl Waveform {
    fn from_program(program: usize) -> Self {
        match program {
            1 => Waveform::Square,
            2 => Waveform::Saw,
            3 => Waveform::Triangle,
            _ => Waveform::Sine,
        }
    }

    /// One sample at `phase` in cycles, `[0, 1)`.
    fn sample(self, phase: f32) -> f32 {
        match self {
            Waveform::Sine => (TAU * phase).sin(),
            Waveform::Square => {
                if phase < 0.5 {
                    1.0
                } else {
                    -1.0
                }
            }
            Waveform::Saw => 2.0 * phase - 1.0,
            Waveform::Triangle => 1.0 - 4.0 * (phase - 0.5).abs(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Voice {
    note: Option<u8>,
    phase: f32,
    increment: f32,
}

#[repr(C)]
struct SineSynth {
    effect: AEffect,
    sample_rate: f32,
    program: usize,
    voices: [Voice; MAX_VOICES],
}

impl SineSynth {
    fn note_on(&mut self, note: u8) {
        let increment = note_frequency(note) / self.sample_rate;
        let slot = self
            .voices
            .iter()
            .position(|v| v.note == Some(note))
            .or_else(|| self.voices.iter().position(|v| v.note.is_none()))
            .unwrap_or(0);
        self.voices[slot] = Voice {
            note: Some(note),
            phase: 0.0,
            increment,
        };
    }

    fn note_off(&mut self, note: u8) {
        for voice in self.voices.iter_mut().filter(|v| v.note == Some(note)) {
            voice.note = None;
        }
    }

    fn render(&mut self, left: &mut [f32], right: &mut [f32]) {
        let waveform = Waveform::from_program(self.program);
        for (l, r) in left.iter_mut().zip(right.iter_mut()) {
            let mut sum = 0.0;
            for voice in self.voices.iter_mut().filter(|v| v.note.is_some()) {
                sum += waveform.sample(voice.phase) * VOICE_GAIN;
                voice.phase += voice.increment;
                if voice.phase >= 1.0 {
                    voice.phase -= 1.0;
                }
            }
            *l = sum;
            *r = sum;
        }
    }
}

/// Equal-tempered frequency, A4 (69) = 440 Hz.
pub fn note_frequency(note: u8) -> f32 {
    440.0 * 2f32.powf((note as f32 - 69.0) / 12.0)
}

/// The built-in instrument as a loadable module.
pub fn builtin_module() -> PluginModule {
    PluginModule::from_entry("builtin/solo-sine", builtin_main)
}

/// Entry point of the built-in instrument.
///
/// # Safety
/// Same contract as any VST2 `VSTPluginMain`.
pub unsafe extern "C" fn builtin_main(host: HostCallbackProc) -> *mut AEffect {
    // Hosts that do not speak 2.4 get nothing.
    if host(ptr::null_mut(), abi::host_op::VERSION, 0, 0, ptr::null_mut(), 0.0) == 0 {
        return ptr::null_mut();
    }

    let mut effect: AEffect = std::mem::zeroed();
    effect.magic = abi::VST_MAGIC;
    effect.dispatcher = Some(dispatch);
    effect.num_programs = PROGRAMS.len() as i32;
    effect.num_inputs = 0;
    effect.num_outputs = NUM_OUTPUTS;
    effect.flags = flags::IS_SYNTH | flags::CAN_REPLACING;
    effect.unique_id = BUILTIN_UNIQUE_ID;
    effect.version = 1;
    effect.io_ratio = 1.0;
    effect.process_replacing = Some(process_replacing);

    let raw = Box::into_raw(Box::new(SineSynth {
        effect,
        sample_rate: 44100.0,
        program: 0,
        voices: [Voice::default(); MAX_VOICES],
    }));
    (*raw).effect.object = raw as *mut c_void;
    raw as *mut AEffect
}

unsafe extern "C" fn dispatch(
    effect: *mut AEffect,
    opcode: i32,
    index: i32,
    value: isize,
    ptr: *mut c_void,
    opt: f32,
) -> isize {
    let synth = effect as *mut SineSynth;

    match opcode {
        effect_op::CLOSE => {
            drop(Box::from_raw(synth));
            1
        }
        effect_op::SET_SAMPLE_RATE => {
            if opt > 0.0 {
                (*synth).sample_rate = opt;
            }
            0
        }
        effect_op::MAINS_CHANGED => {
            for voice in (*synth).voices.iter_mut() {
                voice.note = None;
            }
            0
        }
        effect_op::SET_PROGRAM => {
            if (0..PROGRAMS.len() as isize).contains(&value) {
                (*synth).program = value as usize;
            }
            0
        }
        effect_op::GET_PROGRAM => (*synth).program as isize,
        effect_op::GET_PROGRAM_NAME => write_string(PROGRAMS[(*synth).program], ptr, abi::MAX_PROG_NAME_LEN),
        effect_op::GET_PROGRAM_NAME_INDEXED => match PROGRAMS.get(index as usize) {
            Some(name) => write_string(name, ptr, abi::MAX_PROG_NAME_LEN),
            None => 0,
        },
        effect_op::GET_EFFECT_NAME => write_string(BUILTIN_NAME, ptr, abi::MAX_EFFECT_NAME_LEN),
        effect_op::GET_VENDOR_STRING => write_string(BUILTIN_VENDOR, ptr, abi::MAX_VENDOR_STR_LEN),
        effect_op::GET_PRODUCT_STRING => write_string(BUILTIN_PRODUCT, ptr, abi::MAX_PRODUCT_STR_LEN),
        effect_op::GET_VENDOR_VERSION => 1,
        effect_op::GET_VST_VERSION => abi::VST_VERSION,
        effect_op::CAN_DO => {
            if ptr.is_null() {
                return 0;
            }
            let query = std::ffi::CStr::from_ptr(ptr as *const std::ffi::c_char).to_bytes();
            matches!(query, b"receiveVstEvents" | b"receiveVstMidiEvent") as isize
        }
        effect_op::PROCESS_EVENTS => {
            if ptr.is_null() {
                return 0;
            }
            let header = ptr as *const VstEventsHeader;
            let first = ptr::addr_of!((*header).events) as *const *mut abi::VstEvent;
            for i in 0..(*header).num_events.max(0) as usize {
                let event = *first.add(i) as *const VstMidiEvent;
                match MidiEvent::from_vst(&*event) {
                    Some(MidiEvent::NoteOn { note }) => (*synth).note_on(note),
                    Some(MidiEvent::NoteOff { note }) => (*synth).note_off(note),
                    None => {}
                }
            }
            1
        }
        _ => 0,
    }
}

unsafe fn write_string(text: &str, dst: *mut c_void, capacity: usize) -> isize {
    if dst.is_null() {
        return 0;
    }
    abi::copy_c_string(text, dst as *mut u8, capacity);
    1
}

unsafe extern "C" fn process_replacing(
    effect: *mut AEffect,
    _inputs: *mut *mut f32,
    outputs: *mut *mut f32,
    frames: i32,
) {
    let synth = &mut *(effect as *mut SineSynth);
    let frames = frames.max(0) as usize;
    let left = std::slice::from_raw_parts_mut(*outputs, frames);
    let right = std::slice::from_raw_parts_mut(*outputs.add(1), frames);
    synth.render(left, right);
}
