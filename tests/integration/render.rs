//! Render cycles through the 16-bit device path

use approx::assert_abs_diff_eq;
use solo::plugin::builtin::{note_frequency, VOICE_GAIN};

use crate::helpers::tolerances::*;
use crate::helpers::*;

#[test]
fn test_silent_without_notes() {
    let session = test_session();
    let out = pull_cycle(&session, TEST_CHANNELS, TEST_BLOCK_SIZE);
    assert!(out.iter().all(|&s| s == 0));
}

#[test]
fn test_note_reaches_device_buffer() {
    let session = test_session();
    session.sender().note_on(69).unwrap();

    let out = pull_cycle(&session, TEST_CHANNELS, TEST_BLOCK_SIZE);
    let left = deinterleave(&out, TEST_CHANNELS, 0);
    let right = deinterleave(&out, TEST_CHANNELS, 1);

    let expected = generate_sine(note_frequency(69) as f64, TEST_SAMPLE_RATE as f64, 256);
    for (actual, reference) in left.iter().zip(expected.iter()) {
        assert_abs_diff_eq!(*actual, reference * VOICE_GAIN, epsilon = DSP_EPSILON + INT16_EPSILON);
    }
    assert_eq!(left, right);
    assert_abs_diff_eq!(rms(&left), VOICE_GAIN / 2f32.sqrt(), epsilon = 0.01);
}

#[test]
fn test_note_off_silences_next_cycle() {
    let session = test_session();
    let sender = session.sender();

    sender.note_on(60).unwrap();
    let on = pull_cycle(&session, TEST_CHANNELS, TEST_BLOCK_SIZE);
    assert_has_audio(&deinterleave(&on, TEST_CHANNELS, 0), 0.05);

    sender.note_off(60).unwrap();
    let off = pull_cycle(&session, TEST_CHANNELS, TEST_BLOCK_SIZE);
    assert_silence(&deinterleave(&off, TEST_CHANNELS, 0), SILENCE_THRESHOLD);
}

#[test]
fn test_events_wait_for_next_cycle() {
    let session = test_session();
    let _ = pull_cycle(&session, TEST_CHANNELS, TEST_BLOCK_SIZE);

    session.sender().note_on(72).unwrap();
    assert!(peak(&deinterleave(&pull_cycle(&session, TEST_CHANNELS, 64), TEST_CHANNELS, 0)) > 0.0);
}

#[test]
fn test_note_on_and_off_in_same_cycle() {
    let session = test_session();
    let sender = session.sender();
    sender.note_on(60).unwrap();
    sender.note_off(60).unwrap();

    // Both arrive in one batch, in order, so the voice is gone before rendering.
    let out = pull_cycle(&session, TEST_CHANNELS, TEST_BLOCK_SIZE);
    assert!(out.iter().all(|&s| s == 0));
}

#[test]
fn test_mono_device_takes_first_channel() {
    let session = test_session();
    session.sender().note_on(69).unwrap();

    let out = pull_cycle(&session, 1, 128);
    assert_eq!(out.len(), 128);
    assert_has_audio(&deinterleave(&out, 1, 0), 0.05);
}

#[test]
fn test_extra_device_channels_are_zeroed() {
    let session = test_session();
    session.sender().note_on(69).unwrap();

    let out = pull_cycle(&session, 4, 256);
    assert_has_audio(&deinterleave(&out, 4, 0), 0.05);
    assert_has_audio(&deinterleave(&out, 4, 1), 0.05);
    assert!(deinterleave(&out, 4, 2).iter().all(|&s| s == 0.0));
    assert!(deinterleave(&out, 4, 3).iter().all(|&s| s == 0.0));
}

#[test]
fn test_oversized_cycle_renders_silence() {
    let session = test_session();
    session.sender().note_on(69).unwrap();

    let frames = TEST_BLOCK_SIZE + 1;
    let out = pull_cycle(&session, TEST_CHANNELS, frames);
    assert!(out.iter().all(|&s| s == 0));

    // The queued note is still pending for a cycle the plugin accepts.
    let out = pull_cycle(&session, TEST_CHANNELS, TEST_BLOCK_SIZE);
    assert_has_audio(&deinterleave(&out, TEST_CHANNELS, 0), 0.05);
}

#[test]
fn test_stopped_instance_renders_silence() {
    let session = test_session();
    session.sender().note_on(69).unwrap();
    session.instance().stop().unwrap();

    let out = pull_cycle(&session, TEST_CHANNELS, TEST_BLOCK_SIZE);
    assert!(out.iter().all(|&s| s == 0));
}

#[test]
fn test_render_interleaved_matches_session() {
    let session = test_session();
    let mut out = vec![0i16; TEST_CHANNELS * 64];
    solo::render_interleaved(session.instance(), &mut out, TEST_CHANNELS, 64);
    assert!(out.iter().all(|&s| s == 0));
}
