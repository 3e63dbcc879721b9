//! Virtual keyboard driving the built-in synth

use approx::assert_abs_diff_eq;
use solo::keyboard::{key_at, key_for_char, note_for_key, BASE_NOTE, NUM_KEYS};

use crate::helpers::tolerances::*;
use crate::helpers::*;

/// Upward zero crossings.
fn zero_crossings(samples: &[f32]) -> usize {
    samples
        .windows(2)
        .filter(|w| w[0] < 0.0 && w[1] >= 0.0)
        .count()
}

#[test]
fn test_press_plays_note() {
    let session = test_session();
    let mut keys = session.keyboard();

    keys.press(12).unwrap();
    assert_eq!(keys.held(), Some(12));

    let out = pull_cycle(&session, TEST_CHANNELS, TEST_BLOCK_SIZE);
    assert_has_audio(&deinterleave(&out, TEST_CHANNELS, 0), 0.05);
}

#[test]
fn test_release_silences() {
    let session = test_session();
    let mut keys = session.keyboard();

    keys.press(0).unwrap();
    let _ = pull_cycle(&session, TEST_CHANNELS, TEST_BLOCK_SIZE);
    keys.release().unwrap();
    assert_eq!(keys.held(), None);

    let out = pull_cycle(&session, TEST_CHANNELS, TEST_BLOCK_SIZE);
    assert_silence(&deinterleave(&out, TEST_CHANNELS, 0), SILENCE_THRESHOLD);
}

#[test]
fn test_slide_moves_single_note() {
    let session = test_session();
    let mut keys = session.keyboard();

    keys.press(9).unwrap();
    keys.slide(Some(21)).unwrap();
    assert_eq!(keys.held(), Some(21));

    // Only one voice sounds: the peak stays within a single voice's gain.
    let out = pull_cycle(&session, TEST_CHANNELS, TEST_BLOCK_SIZE);
    let left = deinterleave(&out, TEST_CHANNELS, 0);
    assert!(peak(&left) <= solo::plugin::builtin::VOICE_GAIN + INT16_EPSILON);

    // A4 is key 21 from C3; one cycle of 1024 frames holds ~10 periods of 440 Hz.
    assert_eq!(note_for_key(21), Some(69));
    let crossings = zero_crossings(&left) as f32;
    assert_abs_diff_eq!(crossings, 440.0 * TEST_BLOCK_SIZE as f32 / TEST_SAMPLE_RATE as f32, epsilon = 1.5);
}

#[test]
fn test_slide_off_keyboard_releases() {
    let session = test_session();
    let mut keys = session.keyboard();

    keys.press(5).unwrap();
    keys.slide(None).unwrap();
    assert_eq!(keys.held(), None);

    let out = pull_cycle(&session, TEST_CHANNELS, TEST_BLOCK_SIZE);
    assert!(out.iter().all(|&s| s == 0));
}

#[test]
fn test_focus_lost_releases() {
    let session = test_session();
    let mut keys = session.keyboard();

    keys.press(30).unwrap();
    keys.focus_lost().unwrap();

    let out = pull_cycle(&session, TEST_CHANNELS, TEST_BLOCK_SIZE);
    assert!(out.iter().all(|&s| s == 0));
}

#[test]
fn test_dropping_keyboard_releases() {
    let session = test_session();
    {
        let mut keys = session.keyboard();
        keys.press(3).unwrap();
    }
    let out = pull_cycle(&session, TEST_CHANNELS, TEST_BLOCK_SIZE);
    assert!(out.iter().all(|&s| s == 0));
}

#[test]
fn test_layout_covers_keyboard() {
    assert_eq!(key_for_char('z'), Some(0));
    assert_eq!(key_for_char('q'), Some(12));
    assert_eq!(key_for_char('Q'), Some(12));
    assert_eq!(note_for_key(0), Some(BASE_NOTE));
    assert_eq!(note_for_key(NUM_KEYS), None);
    assert_eq!(key_at(0, 20), Some(0));
    assert_eq!(key_at(20 * NUM_KEYS as u32, 20), None);
}
