//! Session lifecycle tests

use std::ffi::c_void;

use solo::plugin::abi::{self, effect_op, flags, AEffect, HostCallbackProc};
use solo::plugin::builtin::{BUILTIN_NAME, PROGRAMS};
use solo::prelude::*;

use crate::helpers::*;

const EFFECT_NAME: &str = "Test Delay";

unsafe extern "C" fn effect_dispatch(
    effect: *mut AEffect,
    opcode: i32,
    _index: i32,
    _value: isize,
    ptr: *mut c_void,
    _opt: f32,
) -> isize {
    match opcode {
        effect_op::CLOSE => {
            drop(Box::from_raw(effect));
            1
        }
        effect_op::GET_EFFECT_NAME if !ptr.is_null() => {
            abi::copy_c_string(EFFECT_NAME, ptr as *mut u8, abi::MAX_EFFECT_NAME_LEN);
            1
        }
        _ => 0,
    }
}

/// A stereo effect without the synth flag.
unsafe extern "C" fn effect_main(_host: HostCallbackProc) -> *mut AEffect {
    let mut effect: AEffect = std::mem::zeroed();
    effect.magic = abi::VST_MAGIC;
    effect.dispatcher = Some(effect_dispatch);
    effect.num_inputs = 2;
    effect.num_outputs = 2;
    effect.flags = flags::CAN_REPLACING;
    Box::into_raw(Box::new(effect))
}

#[test]
fn test_builtin_session_creation() {
    let session = test_session();

    assert_eq!(session.info().name, BUILTIN_NAME);
    assert!(session.info().capabilities.is_synth);
    assert_eq!(session.config().sample_rate, TEST_SAMPLE_RATE);
    assert_eq!(session.config().block_size, TEST_BLOCK_SIZE);
    assert!(!session.is_audio_running());
    assert_eq!(session.device_channels(), None);
}

#[test]
fn test_instance_settings_follow_config() {
    let session = Session::builder()
        .sample_rate(48000)
        .block_size(256)
        .build()
        .unwrap();

    assert_eq!(session.instance().sample_rate(), 48000.0);
    assert_eq!(session.instance().block_size(), 256);
}

#[test]
fn test_effect_is_rejected() {
    let result = Session::builder()
        .source(PluginSource::Static {
            name: "test/delay".to_string(),
            entry: effect_main,
        })
        .build();

    match result {
        Err(Error::NotAnInstrument { name }) => assert_eq!(name, EFFECT_NAME),
        Err(e) => panic!("expected NotAnInstrument, got {e}"),
        Ok(_) => panic!("effect accepted as an instrument"),
    }
}

#[test]
fn test_missing_plugin_file() {
    let result = Session::builder()
        .plugin("/nonexistent/solo/plugin.so")
        .build();
    assert!(matches!(result, Err(Error::Plugin(_))));
}

#[test]
fn test_invalid_config_rejected_before_load() {
    let result = Session::builder().block_size(0).build();
    assert!(matches!(result, Err(Error::Core(_))));

    let result = Session::builder().sample_rate(1).build();
    assert!(matches!(result, Err(Error::Core(_))));
}

#[test]
fn test_program_option() {
    let session = Session::builder().program(2).build().unwrap();
    assert_eq!(session.instance().program().unwrap(), 2);
    assert_eq!(session.info().programs, PROGRAMS);
}

#[test]
fn test_program_out_of_range() {
    let result = Session::builder().program(PROGRAMS.len()).build();
    assert!(matches!(result, Err(Error::Plugin(_))));
}

#[test]
fn test_info_serializes_for_listing() {
    let session = test_session();
    let json = serde_json::to_value(session.info()).unwrap();
    assert_eq!(json["name"], BUILTIN_NAME);
    assert_eq!(json["audio_io"]["outputs"], 2);
    assert_eq!(json["programs"].as_array().unwrap().len(), PROGRAMS.len());
}

#[test]
fn test_sessions_are_independent() {
    let a = test_session();
    let b = test_session();

    a.sender().note_on(69).unwrap();
    let out_a = pull_cycle(&a, TEST_CHANNELS, TEST_BLOCK_SIZE);
    let out_b = pull_cycle(&b, TEST_CHANNELS, TEST_BLOCK_SIZE);

    assert_has_audio(&deinterleave(&out_a, TEST_CHANNELS, 0), 0.05);
    assert_silence(&deinterleave(&out_b, TEST_CHANNELS, 0), 0.0);
}
